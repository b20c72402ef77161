//! `acorn-root` — the Root pipeline: ordered byte-to-byte transforms
//! (compression, encryption, policy enforcement) wrapping a byte
//! trunk, composed in ascending sequence on write and descending on
//! read so the stack inverts cleanly.

mod compression;
mod context;
mod encryption;
mod pipeline;
mod policy;
mod rooted_trunk;

pub use compression::CompressionAlgo;
pub use context::{RootContext, RootOperation};
pub use encryption::EncryptionKey;
pub use pipeline::{RootEnvelope, RootKind, RootPipeline};
pub use policy::{AllowAllPolicy, PolicyDecision, PolicyEngine, SharedPolicyEngine};
pub use rooted_trunk::RootedTrunk;
