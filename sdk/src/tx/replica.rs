//! Replica set and the single-replica selection rule.
//!
//! Every request goes to exactly one replica: the one with the lowest
//! identifier. No quorum fan-out, no leader discovery. Ordering by ID keeps
//! the choice reproducible across runs and processes.

use std::collections::BTreeMap;

use url::Url;

use super::error::TxError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplicaSet {
    replicas: BTreeMap<String, Url>,
}

impl ReplicaSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replica(mut self, id: impl Into<String>, url: Url) -> Self {
        self.insert(id, url);
        self
    }

    /// Adds or replaces a replica. Returns the previous address, if any.
    pub fn insert(&mut self, id: impl Into<String>, url: Url) -> Option<Url> {
        self.replicas.insert(id.into(), url)
    }

    pub fn get(&self, id: &str) -> Option<&Url> {
        self.replicas.get(id)
    }

    pub fn len(&self) -> usize {
        self.replicas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.replicas.keys().map(String::as_str)
    }

    /// Picks the replica to target: lowest ID wins.
    pub fn select(&self) -> Result<(&str, &Url), TxError> {
        self.replicas
            .iter()
            .next()
            .map(|(id, url)| (id.as_str(), url))
            .ok_or(TxError::NoReplicas)
    }

    /// Selects a replica and resolves `endpoint` against its base URL.
    ///
    /// Absolute paths replace the base path, as with any URL reference.
    pub fn resolve(&self, endpoint: &str) -> Result<(&str, Url), TxError> {
        let (id, base) = self.select()?;
        let url = base.join(endpoint).map_err(|e| TxError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        Ok((id, url))
    }
}

impl FromIterator<(String, Url)> for ReplicaSet {
    fn from_iter<I: IntoIterator<Item = (String, Url)>>(iter: I) -> Self {
        Self {
            replicas: iter.into_iter().collect(),
        }
    }
}
