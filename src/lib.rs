// Library exports for the CLI and integration tests

pub mod arb;
pub mod cli;
pub mod common;
pub mod coordinator;
pub mod store;
pub mod translate;
pub mod worker;

pub use common::{Config, CoordinatorConfig, DispatchError};
pub use coordinator::Coordinator;
pub use translate::{TranslateError, Translator};
pub use worker::Worker;
