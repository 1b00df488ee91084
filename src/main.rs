use std::io::{self, Write};

use clap::Parser;

use natstat::cli::Cli;
use natstat::error::NatstatError;
use natstat::model::ConnectionRecord;
use natstat::output;
use natstat::snapshot;

fn exit_code(err: &NatstatError) -> i32 {
    match err {
        NatstatError::ChannelUnavailable { .. } | NatstatError::ModuleStack { .. } => 2,
        NatstatError::RequestSend(_) | NatstatError::ProtocolViolation(_) => 3,
        NatstatError::UnsupportedPlatform(_) => 5,
        _ => 4,
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(exit_code(&e));
        }
    }
}

fn run(cli: &Cli) -> Result<(), NatstatError> {
    let config = cli.snapshot_config();
    log::info!(
        "snapshot via {} (ipv6 tables: {}, process ids: {})",
        config.device,
        config.capabilities.ipv6_tables,
        config.capabilities.process_id
    );

    let records: Vec<ConnectionRecord> = snapshot::snapshot(&config)?
        .into_iter()
        .filter(|r| cli.wants(r))
        .collect();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    output::write_records(&records, cli.format, &mut out)?;
    out.flush().map_err(NatstatError::Serialization)
}
