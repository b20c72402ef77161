use std::fmt;

/// Result alias used throughout the engine core.
pub type AcornResult<T> = Result<T, AcornError>;

/// The error taxonomy for the engine core (kinds, not exception types).
///
/// Background activities never propagate these upward; per the §7
/// propagation policy they are logged and turned into a `fault` event
/// instead (see [`crate::events`]).
#[derive(Debug, thiserror::Error)]
pub enum AcornError {
    #[error("not implemented yet")]
    NotImplemented,
    #[error("missing key: {0}")]
    NotFound(String),
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("policy denied: {0}")]
    PolicyDenied(String),
    #[error("root signature mismatch: expected one of {expected:?}, found {found:?}")]
    RootMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error("duplicate type planted in grove: {0}")]
    DuplicateType(String),
    #[error("conflict rejected by judge for id {0}")]
    ConflictRejected(String),
    #[error("transport failed: {0}")]
    TransportFailed(String),
    #[error("version conflict (expected: {expected:?}, actual: {actual:?})")]
    VersionConflict {
        expected: Option<u64>,
        actual: Option<u64>,
    },
    #[error("trunk operation failed: {0}")]
    Trunk(String),
    #[error("serialization failed: {0}")]
    Serialization(String),
    #[error("empty id rejected")]
    EmptyId,
}

impl AcornError {
    /// Stable, lowercase tag used in `fault` events and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            AcornError::NotImplemented => "not_implemented",
            AcornError::NotFound(_) => "not_found",
            AcornError::StorageUnavailable(_) => "storage_unavailable",
            AcornError::PolicyDenied(_) => "policy_denied",
            AcornError::RootMismatch { .. } => "root_mismatch",
            AcornError::DuplicateType(_) => "duplicate_type",
            AcornError::ConflictRejected(_) => "conflict_rejected",
            AcornError::TransportFailed(_) => "transport_failed",
            AcornError::VersionConflict { .. } => "version_conflict",
            AcornError::Trunk(_) => "trunk",
            AcornError::Serialization(_) => "serialization",
            AcornError::EmptyId => "empty_id",
        }
    }
}

/// Component tag attached to a `fault` event, identifying which layer
/// swallowed the error before continuing or backing off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultComponent {
    Tree,
    Trunk,
    Root,
    Tangle,
    Grove,
    Canopy,
}

impl fmt::Display for FaultComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FaultComponent::Tree => "tree",
            FaultComponent::Trunk => "trunk",
            FaultComponent::Root => "root",
            FaultComponent::Tangle => "tangle",
            FaultComponent::Grove => "grove",
            FaultComponent::Canopy => "canopy",
        };
        f.write_str(s)
    }
}
