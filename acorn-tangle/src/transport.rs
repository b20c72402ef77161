use acorn_core::VersionVector;

use crate::envelope::TangleEnvelope;

/// Transport-level failure, distinct from `AcornError` so a Tangle can
/// distinguish "the peer rejected this" from "the peer is unreachable"
/// when deciding whether to back off (§7).
#[derive(Debug, Clone, thiserror::Error)]
pub enum TangleError {
    #[error("network error: {0}")]
    Network(String),
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// What a Tangle needs from its counterpart, whether that's an
/// in-process `Tree` or an HTTP peer (§4.7.1-3). Both directions move
/// [`TangleEnvelope`]s rather than bare nuts so `origin`/`hop_set` make
/// it across process boundaries for echo suppression (§4.7.4).
pub trait TangleTransport<T>: Send + Sync {
    /// Step 1 of the handshake: the peer's current version vector.
    fn exchange_vector(&self) -> Result<VersionVector, TangleError>;

    /// Everything the peer has newer than `since`.
    fn fetch_since(&self, since: &VersionVector) -> Result<Vec<TangleEnvelope<T>>, TangleError>;

    /// Dispatches locally-originated nuts to the peer (single emission
    /// or a reconciliation batch).
    fn push_changes(&self, envelopes: Vec<TangleEnvelope<T>>) -> Result<(), TangleError>;
}
