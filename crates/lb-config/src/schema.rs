use serde::Deserialize;

/// Top-level declarative config (§6): MACs, packet I/O, and the pool list.
/// Packet I/O is parsed and preserved but otherwise inert here — the
/// pcap/framing layer that consumes it lives outside this crate.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub src_mac: String,
    pub dst_mac: String,
    pub src_ip: String,
    pub input: IoSpec,
    pub output: IoSpec,
    pub pools: Vec<PoolConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum IoSpec {
    Pcap { pcap_file: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    pub vip: String,
    pub maglev_size: u64,
    pub backends: Vec<BackendConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub name: String,
    pub ip: String,
    pub health_check: HealthCheckConfig,
}

/// An unrecognized `type` tag fails to deserialize — `serde`'s own
/// "unknown variant" error becomes the fatal `ConfigError::Parse` (§4.G).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HealthCheckConfig {
    Mock { healthy: bool },
    Http { http_address: String },
}
