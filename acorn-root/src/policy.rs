use std::fmt;
use std::sync::Arc;

use acorn_core::AcornResult;

use crate::context::RootContext;

/// What a [`PolicyEngine`] decides for a given write or read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    Allow,
    Redact(Vec<u8>),
    Deny(String),
}

/// Injected by the caller; consulted on stash (and, for symmetry, on
/// crack) by a `Policy` root, which temporarily deserializes the
/// envelope to evaluate it (§4.2).
pub trait PolicyEngine: Send + Sync + fmt::Debug {
    fn evaluate(&self, ctx: &RootContext, bytes: &[u8]) -> AcornResult<PolicyDecision>;
}

/// A policy engine that allows everything; the default when no policy
/// is configured.
#[derive(Debug, Default)]
pub struct AllowAllPolicy;

impl PolicyEngine for AllowAllPolicy {
    fn evaluate(&self, _ctx: &RootContext, _bytes: &[u8]) -> AcornResult<PolicyDecision> {
        Ok(PolicyDecision::Allow)
    }
}

pub type SharedPolicyEngine = Arc<dyn PolicyEngine>;
