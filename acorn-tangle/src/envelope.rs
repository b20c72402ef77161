use acorn_core::{Nut, VersionVector};

/// What actually crosses the wire between two Tangles: the nut plus
/// replication metadata used for loop suppression (§4.7.4). `hop_set`
/// accumulates every tangle id the nut has already passed through.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(bound(serialize = "T: serde::Serialize", deserialize = "T: serde::de::DeserializeOwned"))]
pub struct TangleEnvelope<T> {
    pub nut: Nut<T>,
    pub origin: String,
    pub hop_set: Vec<String>,
}

impl<T> TangleEnvelope<T> {
    pub fn new(nut: Nut<T>, origin: impl Into<String>) -> Self {
        let origin = origin.into();
        TangleEnvelope {
            nut,
            hop_set: vec![origin.clone()],
            origin,
        }
    }

    /// Whether forwarding this envelope onward through `self_id` would
    /// be an echo: it already passed through us.
    pub fn already_visited(&self, self_id: &str) -> bool {
        self.hop_set.iter().any(|hop| hop == self_id)
    }

    pub fn visited_by(mut self, self_id: impl Into<String>) -> Self {
        self.hop_set.push(self_id.into());
        self
    }
}

/// Wire response to a version-vector exchange during reconciliation.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct VectorExchange {
    pub vector: VersionVector,
}
