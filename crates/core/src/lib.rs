pub mod config;
pub mod errors;
pub mod models;
pub mod traits;

pub use self::config::{
    ApiConfig, AppConfig, DatabaseConfig, DispatcherConfig, ObservabilityConfig, TransportConfig,
};
pub use errors::*;
pub use models::*;
pub use traits::*;
