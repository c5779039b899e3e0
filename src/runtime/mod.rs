//! Application lifecycle

pub mod server;
pub mod shutdown;

pub use server::run_server;
