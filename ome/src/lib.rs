pub mod crd;
pub mod error;
pub mod metrics;
pub mod server;
pub mod storage;
pub mod validation;
pub mod webhook;

pub use error::Error;
