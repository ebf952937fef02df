use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid IP address {address:?} for backend {backend}: {source}")]
    InvalidIp {
        backend: String,
        address: String,
        #[source]
        source: std::net::AddrParseError,
    },
}
