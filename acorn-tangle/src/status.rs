/// Reported by a [`crate::Tangle`] (§4.7.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TangleStatus {
    Connected,
    Reconnecting,
    Dead,
}
