pub mod agent;
pub mod audio;
pub mod config;
pub mod error;
pub mod kernel;
pub mod outputs;
pub mod services;

pub use config::ClientConfig;
pub use error::{ClientError, Result};
