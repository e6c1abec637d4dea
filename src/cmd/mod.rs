pub mod customize;
pub mod metrics;
pub mod optimize;
pub mod validate;
