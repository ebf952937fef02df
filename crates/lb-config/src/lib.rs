//! The declarative pool/backend configuration schema and its loader
//! (§6, §4.G): JSON via `serde_json`, fatal on any unrecognized
//! discriminant or malformed address.

mod error;
mod schema;

use std::fs;
use std::net::IpAddr;
use std::path::Path;

pub use error::ConfigError;
pub use schema::{BackendConfig, Config, HealthCheckConfig, IoSpec, PoolConfig};

/// Reads and parses a config file. `maglev_size` primality is deliberately
/// *not* re-checked here — `lb_maglev::MaglevTable::new` is the single
/// source of truth for that invariant.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&data)
}

/// Parses an already-read config document.
pub fn parse(data: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(data)?;
    Ok(config)
}

/// Parses a dotted-decimal IPv4 or colon-hex IPv6 literal into its natural
/// byte representation (4 or 16 bytes) — the same shape `lb_hash::Backend`
/// stores its address in.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidIp`] if `address` doesn't parse as an IP
/// literal.
pub fn parse_ip(backend_name: &str, address: &str) -> Result<Box<[u8]>, ConfigError> {
    let parsed: IpAddr = address.parse().map_err(|source| ConfigError::InvalidIp {
        backend: backend_name.to_string(),
        address: address.to_string(),
        source,
    })?;
    Ok(match parsed {
        IpAddr::V4(v4) => Box::from(v4.octets()),
        IpAddr::V6(v6) => Box::from(v6.octets()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
    {
        "src_mac": "aa:bb:cc:dd:ee:ff",
        "dst_mac": "11:22:33:44:55:66",
        "src_ip": "10.0.0.1",
        "input": { "type": "pcap", "pcap_file": "in.pcap" },
        "output": { "type": "pcap", "pcap_file": "out.pcap" },
        "pools": [
            {
                "vip": "10.0.0.100",
                "maglev_size": 65537,
                "backends": [
                    { "name": "b0", "ip": "10.0.0.2", "health_check": { "type": "mock", "healthy": true } },
                    { "name": "b1", "ip": "10.0.0.3", "health_check": { "type": "http", "http_address": "http://10.0.0.3/health" } }
                ]
            }
        ]
    }
    "#;

    #[test]
    fn test_parses_full_sample() {
        let cfg = parse(SAMPLE).expect("valid config");
        assert_eq!(cfg.pools.len(), 1);
        let pool = &cfg.pools[0];
        assert_eq!(pool.maglev_size, 65537);
        assert_eq!(pool.backends.len(), 2);
        assert_eq!(
            pool.backends[0].health_check,
            HealthCheckConfig::Mock { healthy: true }
        );
        match &pool.backends[1].health_check {
            HealthCheckConfig::Http { http_address } => {
                assert_eq!(http_address, "http://10.0.0.3/health");
            }
            HealthCheckConfig::Mock { .. } => panic!("expected http"),
        }
    }

    #[test]
    fn test_unknown_health_check_type_is_fatal() {
        let bad = SAMPLE.replace("\"type\": \"mock\"", "\"type\": \"bogus\"");
        assert!(parse(&bad).is_err());
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = load(Path::new("/nonexistent/does/not/exist.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_load_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        use std::io::Write;
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let cfg = load(file.path()).expect("valid config on disk");
        assert_eq!(cfg.pools[0].vip, "10.0.0.100");
    }

    #[test]
    fn test_parse_ip_v4_and_v6() {
        let v4 = parse_ip("b0", "10.0.0.1").unwrap();
        assert_eq!(&*v4, &[10, 0, 0, 1]);
        let v6 = parse_ip("b1", "fe80::1").unwrap();
        assert_eq!(v6.len(), 16);
    }

    #[test]
    fn test_parse_ip_rejects_garbage() {
        assert!(parse_ip("b0", "not-an-ip").is_err());
    }
}
