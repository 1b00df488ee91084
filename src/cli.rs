use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::mib2::KernelCapabilities;
use crate::model::ConnectionRecord;
use crate::snapshot::{DEFAULT_DEVICE, DEFAULT_MODULES, DrainBudget, SnapshotConfig};

#[derive(Parser, Debug)]
#[command(
    name = "natstat",
    version,
    about = "List active TCP and UDP connections on Solaris and illumos"
)]
pub struct Cli {
    /// STREAMS control device to open
    #[arg(long, default_value = DEFAULT_DEVICE)]
    pub device: String,

    /// Output format
    #[arg(long, default_value = "pretty")]
    pub format: OutputFormat,

    /// Give up if the kernel has not finished replying within this many seconds
    #[arg(long, value_parser = validate_timeout)]
    pub timeout: Option<f64>,

    /// Maximum number of table replies to accept
    #[arg(long, value_parser = validate_max_messages)]
    pub max_messages: Option<usize>,

    /// Ignore the IPv6 connection tables
    #[arg(long)]
    pub no_ipv6: bool,

    /// Whether kernel entries carry the creating process id
    #[arg(long, default_value = "auto")]
    pub process_ids: ProcessIds,

    /// Show TCP connections (default: TCP and UDP)
    #[arg(long)]
    pub tcp: bool,

    /// Show UDP endpoints (default: TCP and UDP)
    #[arg(long)]
    pub udp: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Tsv,
    Json,
    Pretty,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessIds {
    /// Use the build target's default
    Auto,
    On,
    Off,
}

fn validate_timeout(s: &str) -> Result<f64, String> {
    let val: f64 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;
    if !(0.1..=300.0).contains(&val) {
        Err("timeout must be between 0.1 and 300 seconds".to_string())
    } else {
        Ok(val)
    }
}

fn validate_max_messages(s: &str) -> Result<usize, String> {
    let val: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid integer"))?;
    if val == 0 {
        Err("max-messages must be at least 1".to_string())
    } else {
        Ok(val)
    }
}

impl Cli {
    /// Resolve the flags into a snapshot configuration.
    pub fn snapshot_config(&self) -> SnapshotConfig {
        let detected = KernelCapabilities::detect();
        let capabilities = KernelCapabilities {
            ipv6_tables: detected.ipv6_tables && !self.no_ipv6,
            process_id: match self.process_ids {
                ProcessIds::Auto => detected.process_id,
                ProcessIds::On => true,
                ProcessIds::Off => false,
            },
        };

        let mut budget = DrainBudget::unlimited();
        if let Some(secs) = self.timeout {
            budget = budget.with_timeout(Duration::from_secs_f64(secs));
        }
        if let Some(max) = self.max_messages {
            budget = budget.with_max_messages(max);
        }

        SnapshotConfig {
            device: self.device.clone(),
            modules: DEFAULT_MODULES.iter().map(|m| m.to_string()).collect(),
            capabilities,
            budget,
        }
    }

    /// Whether `record` passes the `--tcp` / `--udp` filter.
    pub fn wants(&self, record: &ConnectionRecord) -> bool {
        if !self.tcp && !self.udp {
            return true;
        }
        (self.tcp && record.protocol.is_tcp()) || (self.udp && record.protocol.is_udp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConnectionState, Protocol};

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(args)
    }

    fn record(protocol: Protocol) -> ConnectionRecord {
        ConnectionRecord {
            protocol,
            local_address: "0.0.0.0".to_string(),
            local_port: 1,
            remote_address: "0.0.0.0".to_string(),
            remote_port: 0,
            state: ConnectionState::NotApplicable,
            owning_process_id: None,
        }
    }

    // UT-9.1: No arguments -> defaults
    #[test]
    fn test_no_arguments() {
        let cli = parse(&["natstat"]).unwrap();
        assert_eq!(cli.device, "/dev/arp");
        assert_eq!(cli.format, OutputFormat::Pretty);
        assert_eq!(cli.process_ids, ProcessIds::Auto);
        let config = cli.snapshot_config();
        assert_eq!(config.capabilities, KernelCapabilities::detect());
        assert_eq!(config.budget, DrainBudget::unlimited());
        assert_eq!(config.modules, ["tcp", "udp"]);
    }

    // UT-9.2: Formats
    #[test]
    fn test_formats() {
        assert_eq!(
            parse(&["natstat", "--format", "json"]).unwrap().format,
            OutputFormat::Json
        );
        assert_eq!(
            parse(&["natstat", "--format", "tsv"]).unwrap().format,
            OutputFormat::Tsv
        );
        assert!(parse(&["natstat", "--format", "xml"]).is_err());
    }

    // UT-9.3: Device override
    #[test]
    fn test_device_flag() {
        let cli = parse(&["natstat", "--device", "/dev/ip"]).unwrap();
        assert_eq!(cli.snapshot_config().device, "/dev/ip");
    }

    // UT-9.4: Timeout valid and sets a deadline
    #[test]
    fn test_timeout_valid() {
        let cli = parse(&["natstat", "--timeout", "2.5"]).unwrap();
        assert_eq!(cli.timeout, Some(2.5));
        assert!(cli.snapshot_config().budget.deadline.is_some());
    }

    // UT-9.5: Timeout out of range
    #[test]
    fn test_timeout_out_of_range() {
        assert!(parse(&["natstat", "--timeout", "0.05"]).is_err());
        assert!(parse(&["natstat", "--timeout", "301"]).is_err());
        assert!(parse(&["natstat", "--timeout", "soon"]).is_err());
    }

    // UT-9.6: Max messages
    #[test]
    fn test_max_messages() {
        let cli = parse(&["natstat", "--max-messages", "64"]).unwrap();
        assert_eq!(cli.snapshot_config().budget.max_messages, Some(64));
        assert!(parse(&["natstat", "--max-messages", "0"]).is_err());
        assert!(parse(&["natstat", "--max-messages", "-3"]).is_err());
    }

    // UT-9.7: Capability overrides
    #[test]
    fn test_capability_overrides() {
        let caps = parse(&["natstat", "--no-ipv6", "--process-ids", "on"])
            .unwrap()
            .snapshot_config()
            .capabilities;
        assert!(!caps.ipv6_tables);
        assert!(caps.process_id);

        let caps = parse(&["natstat", "--process-ids", "off"])
            .unwrap()
            .snapshot_config()
            .capabilities;
        assert!(!caps.process_id);
        assert!(parse(&["natstat", "--process-ids", "maybe"]).is_err());
    }

    // UT-9.8: Protocol filters
    #[test]
    fn test_protocol_filters() {
        let all = parse(&["natstat"]).unwrap();
        assert!(all.wants(&record(Protocol::Tcp4)));
        assert!(all.wants(&record(Protocol::Udp6)));

        let tcp = parse(&["natstat", "--tcp"]).unwrap();
        assert!(tcp.wants(&record(Protocol::Tcp6)));
        assert!(!tcp.wants(&record(Protocol::Udp4)));

        let udp = parse(&["natstat", "--udp"]).unwrap();
        assert!(!udp.wants(&record(Protocol::Tcp4)));
        assert!(udp.wants(&record(Protocol::Udp4)));

        let both = parse(&["natstat", "--tcp", "--udp"]).unwrap();
        assert!(both.wants(&record(Protocol::Tcp4)));
        assert!(both.wants(&record(Protocol::Udp6)));
    }
}
