//! Cancellation and coordinated shutdown.

mod coordinator;
mod token;

pub use coordinator::{shutdown_all, ShutdownReport};
pub use token::ShutdownToken;
