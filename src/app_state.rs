use std::sync::Arc;

use crate::{config::Config, replication::ReplicationController, transport::HttpPeerTransport};

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<ReplicationController>,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let membership = config.membership()?;
        let transport = Arc::new(HttpPeerTransport::new());
        let controller = Arc::new(ReplicationController::new(membership, transport));

        Ok(Self { controller, config })
    }
}
