use std::io::Write;

use crate::error::NatstatError;
use crate::model::ConnectionRecord;

const HEADER: &str = "proto\tlocal_address\tlocal_port\tremote_address\tremote_port\tstate\tpid";

/// Write records as TSV: header row, then one row per record in snapshot order.
pub fn write_tsv(records: &[ConnectionRecord], writer: &mut impl Write) -> Result<(), NatstatError> {
    writeln!(writer, "{HEADER}").map_err(NatstatError::Serialization)?;

    for r in records {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            r.protocol,
            escape_tsv(&r.local_address),
            r.local_port,
            escape_tsv(&r.remote_address),
            r.remote_port,
            r.state,
            r.pid_label(),
        )
        .map_err(NatstatError::Serialization)?;
    }

    Ok(())
}

/// Escape tabs and newlines in a string for TSV output.
fn escape_tsv(s: &str) -> String {
    s.replace(['\t', '\n', '\r'], " ")
}
