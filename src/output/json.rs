use std::io::Write;

use crate::error::NatstatError;
use crate::model::ConnectionRecord;

/// Write the records as a pretty-printed JSON array.
pub fn write_json(records: &[ConnectionRecord], writer: &mut impl Write) -> Result<(), NatstatError> {
    serde_json::to_writer_pretty(&mut *writer, records)
        .map_err(|e| NatstatError::Serialization(std::io::Error::other(e.to_string())))?;
    writeln!(writer).map_err(NatstatError::Serialization)
}
