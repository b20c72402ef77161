use std::sync::Arc;

use acorn_core::{Tree, Trunk, VersionVector};

use crate::envelope::TangleEnvelope;
use crate::transport::{TangleError, TangleTransport};

/// Direct, in-memory counterpart for two Trees living in the same
/// process: reconciliation calls straight into `export_changes` /
/// `import_changes`, no serialization round-trip.
pub struct InProcessTransport<T, S: Trunk<T>> {
    remote: Arc<Tree<T, S>>,
}

impl<T, S: Trunk<T>> InProcessTransport<T, S> {
    pub fn new(remote: Arc<Tree<T, S>>) -> Self {
        InProcessTransport { remote }
    }
}

impl<T, S> TangleTransport<T> for InProcessTransport<T, S>
where
    T: Clone + Send + Sync + 'static,
    S: Trunk<T>,
{
    fn exchange_vector(&self) -> Result<VersionVector, TangleError> {
        let mut vector = VersionVector::new();
        let nuts = self
            .remote
            .export_changes(None)
            .map_err(|e| TangleError::Protocol(e.to_string()))?;
        for nut in nuts {
            vector.set(nut.id, nut.version);
        }
        Ok(vector)
    }

    fn fetch_since(&self, since: &VersionVector) -> Result<Vec<TangleEnvelope<T>>, TangleError> {
        let nuts = self
            .remote
            .export_changes(Some(since))
            .map_err(|e| TangleError::Protocol(e.to_string()))?;
        // The remote is a bare Tree, not itself a Tangle, so these
        // nuts have no prior hop history; "remote" is as close to an
        // origin id as a Tree can offer.
        Ok(nuts.into_iter().map(|nut| TangleEnvelope::new(nut, "remote")).collect())
    }

    fn push_changes(&self, envelopes: Vec<TangleEnvelope<T>>) -> Result<(), TangleError> {
        let nuts = envelopes.into_iter().map(|envelope| envelope.nut).collect::<Vec<_>>();
        self.remote
            .import_changes(nuts)
            .map(|_| ())
            .map_err(|e| TangleError::Protocol(e.to_string()))
    }
}
