mod backoff;
mod client;
mod session;
mod transport;

pub use backoff::*;
pub use client::*;
pub use session::*;
pub use transport::*;

/// The only topic weather stations publish to.
pub const TOPIC: &str = "awsData";
