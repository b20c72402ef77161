//! `acorn-tangle` — the conflict-arbitrated replication link between
//! two Trees (§4.7). Conflict arbitration itself stays inside the
//! local `Tree`'s configured `Judge`; a Tangle's job is moving nuts
//! across the wire and deciding when to retry.

mod backoff;
mod direction;
mod envelope;
#[cfg(feature = "http-client")]
mod http;
mod in_process;
mod status;
mod tangle;
mod transport;

pub use backoff::ExponentialBackoff;
pub use direction::Direction;
pub use envelope::{TangleEnvelope, VectorExchange};
#[cfg(feature = "http-client")]
pub use http::HttpTransport;
pub use in_process::InProcessTransport;
pub use status::TangleStatus;
pub use tangle::{ReconcileSummary, Tangle};
pub use transport::{TangleError, TangleTransport};
