pub mod database;
pub mod observability;
pub mod transport;

pub use database::*;
pub use observability::*;
pub use transport::*;
