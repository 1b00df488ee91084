pub mod json;
pub mod pretty;
pub mod tsv;

use std::io::Write;

use crate::cli::OutputFormat;
use crate::error::NatstatError;
use crate::model::ConnectionRecord;

/// Write snapshot records in the specified format.
pub fn write_records(
    records: &[ConnectionRecord],
    format: OutputFormat,
    writer: &mut impl Write,
) -> Result<(), NatstatError> {
    match format {
        OutputFormat::Tsv => tsv::write_tsv(records, writer),
        OutputFormat::Json => json::write_json(records, writer),
        OutputFormat::Pretty => pretty::write_pretty(records, writer),
    }
}
