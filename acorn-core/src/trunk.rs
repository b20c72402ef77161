use std::fmt;

use crate::error::AcornResult;
use crate::nut::Nut;

/// Static-after-construction capability advertisement for a [`Trunk`]
/// (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrunkCapabilities {
    pub is_durable: bool,
    pub supports_history: bool,
    pub supports_sync: bool,
    pub supports_async: bool,
    pub type_id: &'static str,
}

impl TrunkCapabilities {
    pub const fn new(type_id: &'static str) -> Self {
        TrunkCapabilities {
            is_durable: false,
            supports_history: false,
            supports_sync: true,
            supports_async: false,
            type_id,
        }
    }

    pub const fn durable(mut self) -> Self {
        self.is_durable = true;
        self
    }

    pub const fn durable_if(mut self, durable: bool) -> Self {
        self.is_durable = durable;
        self
    }

    pub const fn with_history(mut self) -> Self {
        self.supports_history = true;
        self
    }
}

/// Opaque storage over `id -> Nut<T>`.
///
/// Invariants (§4.1): a successful `save` implies `load` returns an
/// equal nut until a later `save`/`delete`; `delete` returns the prior
/// existence state; `load_all` enumerates every live id exactly once.
pub trait Trunk<T>: Send + Sync + fmt::Debug {
    /// Persists `nut` under `id`, replacing any prior value. Must be
    /// durable on return for trunks whose capabilities advertise
    /// `is_durable`.
    fn save(&self, id: &str, nut: Nut<T>) -> AcornResult<()>;

    /// Returns the current nut or `None`. Never fails on a missing key.
    fn load(&self, id: &str) -> AcornResult<Option<Nut<T>>>;

    /// Removes `id`, returning whether it previously existed. Idempotent.
    fn delete(&self, id: &str) -> AcornResult<bool>;

    /// A snapshot over every live id, unspecified order.
    fn load_all(&self) -> AcornResult<Vec<Nut<T>>>;

    /// Ordered oldest -> newest prior versions of `id`, or `None` when
    /// the trunk does not support history.
    fn history(&self, _id: &str) -> AcornResult<Option<Vec<Nut<T>>>> {
        Ok(None)
    }

    fn capabilities(&self) -> TrunkCapabilities;
}

/// Optional extension for trunks that can demote/promote entries
/// without going through a full tiered wrapper (used by `Tree::crunch`
/// when the backing trunk is itself tiering-aware).
pub trait Demotable<T>: Trunk<T> {
    /// Forces the entry for `id` out of the hot path. No-op if already
    /// demoted or absent.
    fn demote(&self, id: &str) -> AcornResult<()>;
}
