use acorn_core::{AcornResult, Trunk};
use acorn_tangle::{ReconcileSummary, Tangle, TangleStatus};

/// Read-only snapshot of one tangle, the shape `GetTangleStats` and the
/// `/describe` response's `tangles[]` entries return (§6).
#[derive(Debug, Clone, serde::Serialize)]
pub struct TangleStatsEntry {
    pub from_tree_id: String,
    pub to_tree_id: String,
    pub url: String,
    pub status: String,
}

/// Type-erased handle to a `Tangle<T, S>`, hiding the payload type so a
/// `Grove` can hold tangles across unrelated trees in one list.
pub trait ErasedTangle: Send + Sync + std::fmt::Debug {
    fn id(&self) -> &str;
    fn status(&self) -> TangleStatus;
    fn reconcile_once(&self) -> AcornResult<ReconcileSummary>;
}

impl<T, S> ErasedTangle for Tangle<T, S>
where
    T: Clone + Send + Sync + 'static,
    S: Trunk<T>,
{
    fn id(&self) -> &str {
        Tangle::id(self)
    }

    fn status(&self) -> TangleStatus {
        Tangle::status(self)
    }

    fn reconcile_once(&self) -> AcornResult<ReconcileSummary> {
        Tangle::reconcile_once(self)
    }
}
