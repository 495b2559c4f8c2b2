//! Built-in listener services.

pub mod echo;

pub use echo::EchoService;
