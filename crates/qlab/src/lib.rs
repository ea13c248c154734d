//! QLab connectivity for cuegraph: OSC messages framed with SLIP over TCP.

pub use transport::OscTransport;

pub mod slip;
mod transport;

/// QLab's OSC TCP port.
pub const DEFAULT_PORT: u16 = 53000;
