use crate::error::PipelineError;
use crate::intake::{IntakeSender, Shutdown};
use crate::models::row::{EmailColumn, Row, Schema};
use csv::{ByteRecord, ReaderBuilder};
use std::io;
use std::sync::Arc;
use tracing::{debug, info, warn};

const BOM: char = '\u{feff}';

/// Streams data rows from a CSV source with a header line.
///
/// Records are decoded one at a time; nothing beyond the current record and
/// the reader's internal buffer is held in memory. Rows with fewer fields
/// than the header are accepted as-is.
pub struct RowReader<R> {
    reader: csv::Reader<R>,
    schema: Arc<Schema>,
    record: ByteRecord,
    next_index: u64,
}

impl<R: io::Read> RowReader<R> {
    /// Reads the header and locates the email column.
    ///
    /// Returns `Ok(None)` when the input is empty (no header line).
    pub fn new(input: R, column: &EmailColumn) -> Result<Option<Self>, PipelineError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(input);

        let raw_headers = reader.byte_headers().map_err(PipelineError::Input)?.clone();
        if raw_headers.is_empty() {
            return Ok(None);
        }

        let mut headers: Vec<String> = raw_headers
            .iter()
            .map(|field| String::from_utf8_lossy(field).into_owned())
            .collect();
        if let Some(first) = headers.first_mut() {
            if let Some(stripped) = first.strip_prefix(BOM) {
                *first = stripped.to_string();
            }
        }

        let schema = Schema::new(headers, column)
            .ok_or_else(|| PipelineError::MissingEmailColumn(column.clone()))?;
        debug!(
            columns = schema.headers().len(),
            email_column = schema.email_index(),
            "input header read"
        );

        Ok(Some(Self {
            reader,
            schema: Arc::new(schema),
            record: ByteRecord::new(),
            next_index: 0,
        }))
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Reads the next row.
    ///
    /// I/O failures are fatal. Records that can be read but not decoded
    /// become rows carrying a fault, so they are reported instead of lost.
    pub fn next_row(&mut self) -> Result<Option<Row>, PipelineError> {
        let index = self.next_index;
        match self.reader.read_byte_record(&mut self.record) {
            Ok(false) => Ok(None),
            Ok(true) => {
                self.next_index += 1;
                let line = self.record.position().map(|p| p.line()).unwrap_or(0);
                Ok(Some(decode_record(index, line, &self.record)))
            }
            Err(e) if e.is_io_error() => Err(PipelineError::Input(e)),
            Err(e) => {
                self.next_index += 1;
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                warn!(line, error = %e, "malformed input record");
                Ok(Some(Row::faulted(index, line, Vec::new(), e.to_string())))
            }
        }
    }

    /// Pushes every row into the intake until the input ends, the intake
    /// closes or a shutdown is requested.
    ///
    /// Returns the number of rows admitted. Runs on a blocking thread.
    pub fn feed(mut self, intake: IntakeSender, shutdown: Shutdown) -> Result<u64, PipelineError> {
        let mut admitted = 0u64;
        loop {
            if shutdown.is_requested() {
                info!(admitted, "shutdown requested, no further rows will be read");
                break;
            }
            let Some(row) = self.next_row()? else {
                break;
            };
            if intake.blocking_admit(row).is_err() {
                debug!(admitted, "intake closed, stopping reader");
                break;
            }
            admitted += 1;
        }
        Ok(admitted)
    }
}

impl<R: io::Read> Iterator for RowReader<R> {
    type Item = Result<Row, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row().transpose()
    }
}

fn decode_record(index: u64, line: u64, record: &ByteRecord) -> Row {
    let mut invalid = false;
    let fields = record
        .iter()
        .map(|field| match std::str::from_utf8(field) {
            Ok(text) => text.to_string(),
            Err(_) => {
                invalid = true;
                String::from_utf8_lossy(field).into_owned()
            }
        })
        .collect();

    if invalid {
        warn!(line, "input record is not valid UTF-8");
        Row::faulted(index, line, fields, format!("line {} is not valid UTF-8", line))
    } else {
        Row::new(index, line, fields)
    }
}
