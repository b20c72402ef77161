use acorn_core::{AcornError, AcornResult};

use crate::compression::CompressionAlgo;
use crate::context::RootContext;
use crate::encryption::EncryptionKey;
use crate::policy::{PolicyDecision, SharedPolicyEngine};

/// A root, modeled as a tagged variant with a fixed dispatch table
/// rather than a virtual interface, so the on-disk signature audit
/// (`RootPipeline::expected_signatures`) stays trivial to reason about
/// (§9 "extension roots via sum type").
#[derive(Clone)]
pub enum RootKind {
    Compression(CompressionAlgo),
    Encryption(EncryptionKey),
    Policy(SharedPolicyEngine),
}

impl std::fmt::Debug for RootKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RootKind::Compression(algo) => f.debug_tuple("Compression").field(algo).finish(),
            RootKind::Encryption(key) => f.debug_tuple("Encryption").field(key).finish(),
            RootKind::Policy(_) => f.debug_tuple("Policy").finish(),
        }
    }
}

impl RootKind {
    /// Fixed ordering policy(0) < compression(10) < encryption(20), so
    /// pipelines run policy -> compression -> encryption on stash and
    /// invert cleanly on crack.
    pub fn sequence(&self) -> i32 {
        match self {
            RootKind::Policy(_) => 0,
            RootKind::Compression(_) => 10,
            RootKind::Encryption(_) => 20,
        }
    }

    pub fn signature(&self) -> String {
        match self {
            RootKind::Policy(_) => "policy:v1".to_string(),
            RootKind::Compression(algo) => algo.signature().to_string(),
            RootKind::Encryption(key) => key.signature(),
        }
    }

    fn on_stash(&self, bytes: Vec<u8>, ctx: &RootContext) -> AcornResult<Vec<u8>> {
        match self {
            RootKind::Compression(algo) => algo.compress(bytes),
            RootKind::Encryption(key) => key.encrypt(bytes),
            RootKind::Policy(engine) => match engine.evaluate(ctx, &bytes)? {
                PolicyDecision::Allow => Ok(bytes),
                PolicyDecision::Redact(redacted) => Ok(redacted),
                PolicyDecision::Deny(reason) => Err(AcornError::PolicyDenied(reason)),
            },
        }
    }

    fn on_crack(&self, bytes: Vec<u8>, ctx: &RootContext) -> AcornResult<Vec<u8>> {
        match self {
            RootKind::Compression(algo) => algo.decompress(bytes),
            RootKind::Encryption(key) => key.decrypt(bytes),
            RootKind::Policy(engine) => match engine.evaluate(ctx, &bytes)? {
                PolicyDecision::Deny(reason) => Err(AcornError::PolicyDenied(reason)),
                _ => Ok(bytes),
            },
        }
    }
}

/// Envelope persisted to the underlying byte trunk: the signature
/// chain recorded as each root ran, outermost (last-applied) last in
/// write order, so a reader can check it against its own configured
/// pipeline before running any transform (§4.2 "fail closed with
/// RootMismatch").
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RootEnvelope {
    pub signatures: Vec<String>,
    pub bytes: Vec<u8>,
}

/// Ordered pipeline of roots wrapping a byte-oriented trunk.
pub struct RootPipeline {
    ascending: Vec<RootKind>,
}

impl RootPipeline {
    pub fn new(mut roots: Vec<RootKind>) -> Self {
        roots.sort_by_key(|r| r.sequence());
        RootPipeline { ascending: roots }
    }

    fn expected_signatures(&self) -> Vec<String> {
        self.ascending.iter().map(RootKind::signature).collect()
    }

    /// Runs every root in ascending sequence, producing the envelope
    /// to persist.
    pub fn encode(&self, document_id: &str, payload: Vec<u8>) -> AcornResult<RootEnvelope> {
        let mut ctx = RootContext::new(document_id, crate::context::RootOperation::Stash);
        let mut bytes = payload;
        for root in &self.ascending {
            bytes = root.on_stash(bytes, &ctx)?;
            ctx.applied_signatures.push(root.signature());
        }
        Ok(RootEnvelope {
            signatures: ctx.applied_signatures,
            bytes,
        })
    }

    /// Checks the envelope's recorded signature chain against this
    /// pipeline's configuration, then runs every root in descending
    /// sequence to recover the original payload bytes.
    pub fn decode(&self, document_id: &str, envelope: RootEnvelope) -> AcornResult<Vec<u8>> {
        let expected = self.expected_signatures();
        if envelope.signatures != expected {
            return Err(AcornError::RootMismatch {
                expected,
                found: envelope.signatures,
            });
        }
        let mut ctx = RootContext::new(document_id, crate::context::RootOperation::Crack);
        ctx.applied_signatures = envelope.signatures;
        let mut bytes = envelope.bytes;
        for root in self.ascending.iter().rev() {
            bytes = root.on_crack(bytes, &ctx)?;
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::AllowAllPolicy;
    use std::sync::Arc;

    #[test]
    fn round_trips_through_policy_compression_encryption() {
        let pipeline = RootPipeline::new(vec![
            RootKind::Policy(Arc::new(AllowAllPolicy)),
            RootKind::Compression(CompressionAlgo::Gzip),
            RootKind::Encryption(EncryptionKey::new("k1", [3u8; 32])),
        ]);
        let original = b"hello acorn".to_vec();
        let envelope = pipeline.encode("doc-1", original.clone()).unwrap();
        assert_eq!(
            envelope.signatures,
            vec!["policy:v1", "compression:gzip", "encryption:k1"]
        );
        let recovered = pipeline.decode("doc-1", envelope).unwrap();
        assert_eq!(recovered, original);
    }

    #[test]
    fn unknown_signature_fails_closed() {
        let pipeline = RootPipeline::new(vec![RootKind::Compression(CompressionAlgo::Gzip)]);
        let envelope = RootEnvelope {
            signatures: vec!["compression:brotli".to_string()],
            bytes: vec![],
        };
        let err = pipeline.decode("doc-1", envelope).unwrap_err();
        assert!(matches!(err, AcornError::RootMismatch { .. }));
    }

    #[test]
    fn denying_policy_rejects_stash() {
        #[derive(Debug)]
        struct DenyAll;
        impl crate::policy::PolicyEngine for DenyAll {
            fn evaluate(&self, _ctx: &RootContext, _bytes: &[u8]) -> AcornResult<PolicyDecision> {
                Ok(PolicyDecision::Deny("blocked".to_string()))
            }
        }
        let pipeline = RootPipeline::new(vec![RootKind::Policy(Arc::new(DenyAll))]);
        let err = pipeline.encode("doc-1", b"x".to_vec()).unwrap_err();
        assert!(matches!(err, AcornError::PolicyDenied(_)));
    }
}
