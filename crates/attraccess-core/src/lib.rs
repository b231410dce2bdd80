pub mod constants;
pub mod error;
pub mod subscribers;
pub mod types;

pub use error::{Error, Result};
pub use subscribers::SubscriberList;
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
