pub mod config;
pub mod types;
pub mod error;

pub use config::{Config, CoordinatorConfig};
pub use error::{DispatchError, Result};
