use std::io::Write;

use crate::error::NatstatError;
use crate::model::{ConnectionRecord, Protocol};

const WIDTH: usize = 96;

/// Write records as an aligned table followed by per-protocol counts.
pub fn write_pretty(
    records: &[ConnectionRecord],
    writer: &mut impl Write,
) -> Result<(), NatstatError> {
    write_pretty_inner(records, writer).map_err(NatstatError::Serialization)
}

fn write_pretty_inner(records: &[ConnectionRecord], w: &mut impl Write) -> Result<(), std::io::Error> {
    writeln!(
        w,
        "{:<5} {:<30} {:<30} {:<12} {:>8}",
        "PROTO", "LOCAL ADDRESS", "REMOTE ADDRESS", "STATE", "PID"
    )?;
    writeln!(w, "{}", "-".repeat(WIDTH))?;

    for r in records {
        writeln!(
            w,
            "{:<5} {:<30} {:<30} {:<12} {:>8}",
            r.protocol.to_string(),
            endpoint(&r.local_address, r.local_port),
            endpoint(&r.remote_address, r.remote_port),
            r.state.label(),
            r.pid_label(),
        )?;
    }

    if records.is_empty() {
        writeln!(w, "(no connections)")?;
    }

    writeln!(w, "{}", "-".repeat(WIDTH))?;

    let count = |p: Protocol| records.iter().filter(|r| r.protocol == p).count();
    writeln!(
        w,
        "tcp4 {}  tcp6 {}  udp4 {}  udp6 {}  total {}",
        count(Protocol::Tcp4),
        count(Protocol::Tcp6),
        count(Protocol::Udp4),
        count(Protocol::Udp6),
        records.len()
    )?;

    Ok(())
}

/// `addr:port`, with IPv6 addresses bracketed.
fn endpoint(addr: &str, port: u16) -> String {
    if addr.contains(':') {
        format!("[{addr}]:{port}")
    } else {
        format!("{addr}:{port}")
    }
}
