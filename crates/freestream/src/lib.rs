//! Top-level facade crate for Freestream.
//!
//! Re-exports the envelope codec, the gateway and the client so users can
//! depend on a single crate.

pub mod core {
    pub use freestream_core::*;
}

pub mod gateway {
    pub use freestream_gateway::*;
}

pub mod client {
    pub use freestream_client::*;
}
