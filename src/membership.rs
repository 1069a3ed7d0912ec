// The fixed, statically configured peer set a node replicates with.

use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct Membership {
    self_id: String,
    peer_urls: BTreeMap<String, String>,
}

impl Membership {
    /// `peer_urls` must include an entry for `self_id` (its URL is never
    /// dialed, but its presence keeps the vector clock's zero-entry set
    /// consistent across the cluster).
    pub fn new(self_id: String, peer_urls: BTreeMap<String, String>) -> anyhow::Result<Self> {
        anyhow::ensure!(
            peer_urls.contains_key(&self_id),
            "NODE_ID {self_id:?} is not present in the peer map"
        );
        Ok(Self {
            self_id,
            peer_urls,
        })
    }

    pub fn self_id(&self) -> &str {
        &self.self_id
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.peer_urls.contains_key(node_id)
    }

    pub fn all_ids(&self) -> impl Iterator<Item = &str> {
        self.peer_urls.keys().map(String::as_str)
    }

    /// Every member except this node, paired with its base URL.
    pub fn other_peers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.peer_urls
            .iter()
            .filter(move |(id, _)| id.as_str() != self.self_id)
            .map(|(id, url)| (id.as_str(), url.as_str()))
    }
}
