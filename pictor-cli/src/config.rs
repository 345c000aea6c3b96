//! Configuration module

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the images API
    pub api_base: String,
}
