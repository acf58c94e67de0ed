pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{DispatchError, StoreError};
pub use models::*;
pub use services::*;
