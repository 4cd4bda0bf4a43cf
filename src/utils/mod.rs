pub mod config;
pub mod env;
pub mod errors;
pub mod geo;
pub mod logging;
pub mod progress_config;
pub mod signature;
