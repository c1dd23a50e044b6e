pub mod http_executor_transport;

pub use http_executor_transport::HttpExecutorTransport;
