// proxy module - CORS relay service

pub mod auth;
pub mod config;
pub mod key_store;
pub mod router;
pub mod server;

pub mod common; // Common tools
pub mod handlers; // Endpoint handlers
pub mod mappers; // Response mappers
pub mod middleware; // Axum middleware
pub mod upstream; // Upstream client

pub use config::ProxyConfig;
pub use server::AxumServer;
