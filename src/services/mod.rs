//! Service layer
//!
//! Business operations shared by the HTTP front end and the tests.

pub mod batch_decode;
mod shortener;

pub use batch_decode::{MAX_WORKERS_PER_REQUEST, UNLIMITED_WORKERS, decode_keys};
pub use shortener::*;
