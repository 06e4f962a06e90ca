//! Configuration loading for the feed channel.
//!
//! Two external sources feed the process at startup: a flat `key: value`
//! channel file (endpoints and recovery bounds) and a JSON schema file (the
//! message catalog). Both load exactly once; the resulting `AppConfig` is
//! immutable for the life of the process and shared read-only by every
//! component. Loading failures are fatal and carry enough context to point
//! at the offending file and key.

pub mod schema;

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use codec::MsgCatalog;
use tracing::info;

/// Channel endpoints.
#[derive(Debug, Clone)]
pub struct NetConfig {
    pub mcast_ip: Ipv4Addr,
    pub mcast_port: u16,
    /// Non-empty requests source-specific multicast.
    pub mcast_source_ip: Option<Ipv4Addr>,
    pub interface_ip: Ipv4Addr,
    /// Absent when the channel has no retransmission service.
    pub rerequest_ip: Option<Ipv4Addr>,
    pub rerequest_port: u16,
}

/// Retransmission bounds and socket tuning.
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Peer-side cap on messages per request round.
    pub max_recovery_message_count: u16,
    pub rerequest_rcvbuf: usize,
    pub rerequest_timeout_ms: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        RecoveryConfig {
            max_recovery_message_count: 1000,
            rerequest_rcvbuf: 1024 * 1024,
            rerequest_timeout_ms: 500,
        }
    }
}

/// Everything the process needs, populated once during startup.
#[derive(Debug)]
pub struct AppConfig {
    pub net: NetConfig,
    pub recovery: RecoveryConfig,
    pub catalog: MsgCatalog,
}

/// Load the channel file and the schema it points at.
///
/// The channel file is flat `key: value` lines; `#` and `;` start comments,
/// section headers namespace the keys that follow, and unknown keys are
/// ignored so channels can carry operator annotations. The schema path is
/// resolved relative to the channel file's directory.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot open channel file {}", path.display()))?;

    let mut mcast_ip = None;
    let mut mcast_port = None;
    let mut mcast_source_ip = None;
    let mut interface_ip = None;
    let mut rerequest_ip = None;
    let mut rerequest_port = 0u16;
    let mut spec_rel: Option<PathBuf> = None;
    let mut recovery = RecoveryConfig::default();

    let mut section = String::new();

    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            section = name.trim().to_string();
            continue;
        }

        let Some((key, val)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let val = val.trim();
        let at = || format!("{}:{}", path.display(), lineno + 1);

        match (section.as_str(), key) {
            (_, "mcast_ip") => {
                mcast_ip = Some(parse_addr(val).with_context(at)?);
            }
            (_, "mcast_port") => {
                mcast_port = Some(val.parse::<u16>().context("bad mcast_port").with_context(at)?);
            }
            (_, "mcast_source_ip") => {
                if !val.is_empty() {
                    mcast_source_ip = Some(parse_addr(val).with_context(at)?);
                }
            }
            (_, "interface_ip") => {
                interface_ip = Some(parse_addr(val).with_context(at)?);
            }
            (_, "mcast_rerequester_ip") => {
                if !val.is_empty() {
                    rerequest_ip = Some(parse_addr(val).with_context(at)?);
                }
            }
            (_, "mcast_rerequester_port") => {
                rerequest_port = val
                    .parse::<u16>()
                    .context("bad mcast_rerequester_port")
                    .with_context(at)?;
            }
            (_, "protocol_spec") => {
                spec_rel = Some(PathBuf::from(val));
            }
            ("" | "recovery_settings", "max_recovery_message_count") => {
                let n = val
                    .parse::<u16>()
                    .context("max_recovery_message_count must fit in 16 bits")
                    .with_context(at)?;
                if n == 0 {
                    bail!("{}: max_recovery_message_count must be positive", at());
                }
                recovery.max_recovery_message_count = n;
            }
            ("" | "recovery_settings", "rerequest_rcvbuf") => {
                recovery.rerequest_rcvbuf =
                    val.parse().context("bad rerequest_rcvbuf").with_context(at)?;
            }
            ("" | "recovery_settings", "rerequest_timeout_ms") => {
                recovery.rerequest_timeout_ms =
                    val.parse().context("bad rerequest_timeout_ms").with_context(at)?;
            }
            _ => {} // unknown keys are operator annotations
        }
    }

    let spec_rel = spec_rel.context("protocol_spec not found in channel file")?;
    let spec_path = path.parent().unwrap_or(Path::new(".")).join(spec_rel);
    let catalog = schema::load_schema(&spec_path)?;

    let net = NetConfig {
        mcast_ip: mcast_ip.context("mcast_ip not found in channel file")?,
        mcast_port: mcast_port.context("mcast_port not found in channel file")?,
        mcast_source_ip,
        interface_ip: interface_ip.context("interface_ip not found in channel file")?,
        rerequest_ip,
        rerequest_port,
    };

    info!(
        group = %net.mcast_ip,
        port = net.mcast_port,
        ssm = net.mcast_source_ip.is_some(),
        message_types = catalog.len(),
        "configuration loaded"
    );

    Ok(AppConfig {
        net,
        recovery,
        catalog,
    })
}

fn parse_addr(val: &str) -> Result<Ipv4Addr> {
    val.parse::<Ipv4Addr>()
        .with_context(|| format!("bad IPv4 address {val:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const SCHEMA: &str = r#"{
        "G": { "fields": [ { "name": "MsgCount", "type": "uint64", "size": 8 } ] }
    }"#;

    fn write_channel(dir: &Path, body: &str) -> PathBuf {
        fs::write(dir.join("spec.json"), SCHEMA).unwrap();
        let path = dir.join("channel.ini");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn loads_full_channel_file() {
        let dir = tempdir().unwrap();
        let path = write_channel(
            dir.path(),
            "# production channel\n\
             mcast_ip: 239.192.1.2\n\
             mcast_port: 26400\n\
             mcast_source_ip: 10.0.0.5\n\
             interface_ip: 10.0.0.9\n\
             mcast_rerequester_ip: 10.0.0.6\n\
             mcast_rerequester_port: 26401\n\
             protocol_spec: spec.json\n\
             \n\
             [recovery_settings]\n\
             max_recovery_message_count: 400\n",
        );

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.net.mcast_ip, "239.192.1.2".parse::<Ipv4Addr>().unwrap());
        assert_eq!(cfg.net.mcast_port, 26400);
        assert_eq!(
            cfg.net.mcast_source_ip,
            Some("10.0.0.5".parse::<Ipv4Addr>().unwrap())
        );
        assert_eq!(
            cfg.net.rerequest_ip,
            Some("10.0.0.6".parse::<Ipv4Addr>().unwrap())
        );
        assert_eq!(cfg.net.rerequest_port, 26401);
        assert_eq!(cfg.recovery.max_recovery_message_count, 400);
        assert!(cfg.catalog.get(b'G').is_some());
    }

    #[test]
    fn empty_source_means_any_source_multicast() {
        let dir = tempdir().unwrap();
        let path = write_channel(
            dir.path(),
            "mcast_ip: 239.192.1.2\n\
             mcast_port: 26400\n\
             mcast_source_ip:\n\
             interface_ip: 0.0.0.0\n\
             protocol_spec: spec.json\n",
        );

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.net.mcast_source_ip, None);
        assert_eq!(cfg.net.rerequest_ip, None);
    }

    #[test]
    fn missing_protocol_spec_is_fatal() {
        let dir = tempdir().unwrap();
        let path = write_channel(
            dir.path(),
            "mcast_ip: 239.192.1.2\n\
             mcast_port: 26400\n\
             interface_ip: 0.0.0.0\n",
        );

        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("protocol_spec"));
    }

    #[test]
    fn zero_recovery_bound_is_rejected() {
        let dir = tempdir().unwrap();
        let path = write_channel(
            dir.path(),
            "mcast_ip: 239.192.1.2\n\
             mcast_port: 26400\n\
             interface_ip: 0.0.0.0\n\
             protocol_spec: spec.json\n\
             max_recovery_message_count: 0\n",
        );

        assert!(load_config(&path).is_err());
    }

    #[test]
    fn unknown_keys_and_comments_are_tolerated() {
        let dir = tempdir().unwrap();
        let path = write_channel(
            dir.path(),
            "; legacy block\n\
             [channel]\n\
             operator_note: keep until Q3\n\
             mcast_ip: 239.192.1.2\n\
             mcast_port: 26400\n\
             interface_ip: 0.0.0.0\n\
             protocol_spec: spec.json\n",
        );

        assert!(load_config(&path).is_ok());
    }
}
