//! Operator REPL: reconfigures and probes a running lookup core from
//! stdin. There is no subcommand parser here by design — three verbs,
//! one `System`, no need for `clap`.

use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

use lb_core::{AddressFamily, FiveTuple, System};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let system = Arc::new(System::new());
    let mut worker = system.spawn_worker();

    info!("lb-cli ready; commands: reconfig <path>, lookup <src_ip> <dst_ip> <src_port> <dst_port> <proto>, exit");

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    loop {
        let Ok(Some(line)) = lines.next_line().await else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut words = line.split_whitespace();
        match words.next() {
            Some("reconfig") => {
                let Some(path) = words.next() else {
                    warn!("usage: reconfig <path>");
                    continue;
                };
                match system.reconfig_from_file(Path::new(path)) {
                    Ok(()) => info!(path, "reconfig applied"),
                    Err(err) => error!(path, %err, "reconfig failed"),
                }
            }
            Some("lookup") => {
                let args: Vec<&str> = words.collect();
                match build_tuple(&args) {
                    Ok(tuple) => match worker.lookup(&tuple) {
                        Some(backend) => println!("{} {}", backend.name, format_ip(&backend.ip)),
                        None => println!("miss"),
                    },
                    Err(msg) => warn!("{msg}"),
                }
            }
            Some("exit" | "quit") => break,
            Some(other) => warn!(command = other, "unknown command"),
            None => {}
        }
    }

    info!("lb-cli shutting down");
}

fn build_tuple(args: &[&str]) -> Result<FiveTuple, String> {
    let [src_ip, dst_ip, src_port, dst_port, proto] = args else {
        return Err("usage: lookup <src_ip> <dst_ip> <src_port> <dst_port> <proto>".to_string());
    };

    let src: IpAddr = src_ip.parse().map_err(|_| format!("bad src_ip {src_ip}"))?;
    let dst: IpAddr = dst_ip.parse().map_err(|_| format!("bad dst_ip {dst_ip}"))?;
    let family = match (src, dst) {
        (IpAddr::V4(_), IpAddr::V4(_)) => AddressFamily::Ipv4,
        (IpAddr::V6(_), IpAddr::V6(_)) => AddressFamily::Ipv6,
        _ => return Err("src_ip and dst_ip must be the same address family".to_string()),
    };
    let src_port: u16 = src_port.parse().map_err(|_| format!("bad src_port {src_port}"))?;
    let dst_port: u16 = dst_port.parse().map_err(|_| format!("bad dst_port {dst_port}"))?;
    let proto: u16 = proto.parse().map_err(|_| format!("bad proto {proto}"))?;

    let (src_bytes, dst_bytes) = match (src, dst) {
        (IpAddr::V4(a), IpAddr::V4(b)) => (a.octets().to_vec(), b.octets().to_vec()),
        (IpAddr::V6(a), IpAddr::V6(b)) => (a.octets().to_vec(), b.octets().to_vec()),
        _ => unreachable!("family mismatch already rejected above"),
    };

    Ok(FiveTuple::new(family, &src_bytes, &dst_bytes, src_port, dst_port, proto))
}

fn format_ip(bytes: &[u8]) -> String {
    match bytes.len() {
        4 => IpAddr::from([bytes[0], bytes[1], bytes[2], bytes[3]]).to_string(),
        16 => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(bytes);
            IpAddr::from(octets).to_string()
        }
        _ => format!("{bytes:?}"),
    }
}
