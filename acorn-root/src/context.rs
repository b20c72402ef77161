/// Which direction a pipeline run is going: `Stash` builds bytes for
/// storage, `Crack` recovers the original payload bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootOperation {
    Stash,
    Crack,
}

/// Threaded through a pipeline run so individual roots can see what
/// document they're operating on and what's already been applied.
#[derive(Debug, Clone)]
pub struct RootContext {
    pub document_id: String,
    pub operation: RootOperation,
    pub applied_signatures: Vec<String>,
}

impl RootContext {
    pub fn new(document_id: impl Into<String>, operation: RootOperation) -> Self {
        RootContext {
            document_id: document_id.into(),
            operation,
            applied_signatures: Vec::new(),
        }
    }
}
