use std::time::Duration;

/// Control-channel configuration
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Baud rate for the UART control channel
    pub baudrate: u32,
    /// Echo every consumed control-channel byte back to the host
    pub echo: bool,
    /// Sleep duration between multiplexer iterations in milliseconds
    pub poll_interval_ms: u64,
    /// TCP port of the host console that stands in for the UART
    pub console_port: u16,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            baudrate: 115_200,
            echo: false,
            poll_interval_ms: 1,
            console_port: 5023,
        }
    }
}

/// Diagnostics reporter configuration
#[derive(Debug, Clone)]
pub struct DiagConfig {
    /// Port of the status page; the AT server may not bind to this one
    pub port: u16,
}

impl Default for DiagConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Control-channel configuration
    pub link: LinkConfig,
    /// Diagnostics reporter configuration
    pub diag: DiagConfig,
    /// Upper bound on the synchronous access-point association wait
    pub join_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            link: LinkConfig::default(),
            diag: DiagConfig::default(),
            join_timeout: Duration::from_secs(15),
        }
    }
}

/// Create a new application configuration with default values
pub fn create_config() -> AppConfig {
    AppConfig::default()
}
