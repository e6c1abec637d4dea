pub mod config;
pub mod customize;
pub mod error;
pub mod library;
pub mod metrics;
pub mod optimizer;
// cmd and reports are modules of the binary crate (main.rs).
