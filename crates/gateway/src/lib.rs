pub mod catalog;
pub mod config;
pub mod filter;
pub mod http;
pub mod metrics;
pub mod projector;
pub mod signer;
pub mod sigv4;
pub mod store;
