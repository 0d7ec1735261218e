use crate::error::PipelineError;
use crate::intake::Admitted;
use crate::models::result::{APPENDED_COLUMNS, Destination, Status, ValidationResult};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Per-status row counts for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub accepted: u64,
    pub rejected: u64,
    pub valid: u64,
    pub invalid_syntax: u64,
    pub invalid_domain: u64,
    pub errors: u64,
}

impl Tally {
    pub fn written(&self) -> u64 {
        self.accepted + self.rejected
    }

    fn record(&mut self, status: Status) {
        match status.destination() {
            Destination::Accepted => self.accepted += 1,
            Destination::Rejected => self.rejected += 1,
        }
        match status {
            Status::Valid => self.valid += 1,
            Status::InvalidSyntax => self.invalid_syntax += 1,
            Status::InvalidDomain => self.invalid_domain += 1,
            Status::Error => self.errors += 1,
        }
    }
}

/// Routes results to the accepted and rejected tables in input order.
///
/// Results arrive in completion order. Each is parked until every row with
/// a lower index has been written, then written and flushed. The number of
/// parked results is bounded by the intake window, since a parked result
/// still holds its slot.
pub struct StreamWriter<A: io::Write, B: io::Write> {
    accepted: csv::Writer<A>,
    rejected: csv::Writer<B>,
    width: usize,
    pending: BTreeMap<u64, Admitted<ValidationResult>>,
    next_index: u64,
    tally: Tally,
    progress_every: u64,
}

impl<A: io::Write, B: io::Write> StreamWriter<A, B> {
    /// Writes the extended header to both tables.
    pub fn new(accepted: A, rejected: B, headers: &[String], progress_every: u64) -> Result<Self, PipelineError> {
        let mut writer = Self {
            accepted: csv::WriterBuilder::new().flexible(true).from_writer(accepted),
            rejected: csv::WriterBuilder::new().flexible(true).from_writer(rejected),
            width: headers.len(),
            pending: BTreeMap::new(),
            next_index: 0,
            tally: Tally::default(),
            progress_every,
        };

        let header: Vec<&str> = headers
            .iter()
            .map(String::as_str)
            .chain(APPENDED_COLUMNS)
            .collect();
        writer.accepted.write_record(&header).map_err(PipelineError::Output)?;
        writer.rejected.write_record(&header).map_err(PipelineError::Output)?;
        writer.accepted.flush().map_err(PipelineError::OutputIo)?;
        writer.rejected.flush().map_err(PipelineError::OutputIo)?;

        Ok(writer)
    }

    /// Accepts a result in any order and writes every result that is now
    /// next in line.
    pub fn push(&mut self, result: Admitted<ValidationResult>) -> Result<(), PipelineError> {
        let index = result.get().index();
        if index < self.next_index || self.pending.contains_key(&index) {
            warn!(index, "duplicate result ignored");
            return Ok(());
        }
        self.pending.insert(index, result);

        while let Some(ready) = self.pending.remove(&self.next_index) {
            self.write(ready.get())?;
            self.next_index += 1;
        }
        Ok(())
    }

    /// Results waiting for an earlier row.
    pub fn parked(&self) -> usize {
        self.pending.len()
    }

    pub fn tally(&self) -> &Tally {
        &self.tally
    }

    fn write(&mut self, result: &ValidationResult) -> Result<(), PipelineError> {
        let fields = &result.row.fields;
        let padding = self.width.saturating_sub(fields.len());
        let record: Vec<&str> = fields
            .iter()
            .map(String::as_str)
            .chain(std::iter::repeat("").take(padding))
            .chain(result.appended_values())
            .collect();

        match result.destination() {
            Destination::Accepted => {
                self.accepted.write_record(&record).map_err(PipelineError::Output)?;
                self.accepted.flush().map_err(PipelineError::OutputIo)?;
            }
            Destination::Rejected => {
                self.rejected.write_record(&record).map_err(PipelineError::Output)?;
                self.rejected.flush().map_err(PipelineError::OutputIo)?;
            }
        }

        self.tally.record(result.status);
        let written = self.tally.written();
        if self.progress_every > 0 && written % self.progress_every == 0 {
            info!(
                processed = written,
                accepted = self.tally.accepted,
                rejected = self.tally.rejected,
                "progress"
            );
        }
        Ok(())
    }

    /// Writes anything still parked, flushes both tables and hands the
    /// sinks back.
    ///
    /// Parked results only remain if an earlier row never arrived; they are
    /// written in index order rather than dropped.
    pub fn finish(mut self) -> Result<(A, B, Tally), PipelineError> {
        if !self.pending.is_empty() {
            warn!(
                missing_from = self.next_index,
                parked = self.pending.len(),
                "rows missing from the result stream, writing the rest in order"
            );
            let parked = std::mem::take(&mut self.pending);
            for ready in parked.into_values() {
                self.write(ready.get())?;
            }
        }

        let accepted = self
            .accepted
            .into_inner()
            .map_err(|e| PipelineError::OutputIo(e.into_error()))?;
        let rejected = self
            .rejected
            .into_inner()
            .map_err(|e| PipelineError::OutputIo(e.into_error()))?;
        Ok((accepted, rejected, self.tally))
    }

    /// Drains `results` until every worker has stopped, then finishes.
    ///
    /// Runs on a blocking thread. On a write failure the channel is dropped,
    /// which stops the workers.
    pub fn consume(
        mut self,
        mut results: mpsc::Receiver<Admitted<ValidationResult>>,
    ) -> Result<(A, B, Tally), PipelineError> {
        while let Some(result) = results.blocking_recv() {
            self.push(result)?;
        }
        self.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake;
    use crate::models::result::Classification;
    use crate::models::row::Row;

    fn headers() -> Vec<String> {
        vec!["Name".to_string(), "Email".to_string()]
    }

    fn result(index: u64, email: &str, classification: Classification) -> ValidationResult {
        let row = Row::new(index, index + 2, vec![format!("user{}", index), email.to_string()]);
        ValidationResult::new(row, classification)
    }

    /// Admits results through a real intake so they carry window slots.
    async fn admitted(results: Vec<ValidationResult>) -> Vec<Admitted<ValidationResult>> {
        let (tx, rx) = intake::channel(results.len().max(1), results.len().max(1));
        let mut out = Vec::new();
        for result in results {
            tx.admit(result.row.clone()).await.unwrap();
            let slot = rx.next().await.unwrap();
            out.push(slot.then(|_| async move { result }).await);
        }
        out
    }

    fn text(bytes: Vec<u8>) -> String {
        String::from_utf8(bytes).unwrap()
    }

    #[tokio::test]
    async fn test_routes_by_status_with_headers() {
        let mut writer = StreamWriter::new(Vec::new(), Vec::new(), &headers(), 0).unwrap();
        let results = admitted(vec![
            result(0, "john@example.com", Classification::valid()),
            result(1, "foo@invalid_email", Classification::invalid_syntax("foo@invalid_email")),
            result(2, "jane@fake-domain.tld", Classification::invalid_domain()),
        ])
        .await;
        for r in results {
            writer.push(r).unwrap();
        }
        let (accepted, rejected, tally) = writer.finish().unwrap();

        assert_eq!(
            text(accepted),
            "Name,Email,syntax_ok,mx_ok,status,invalid_email_echo\n\
             user0,john@example.com,True,True,Valid,\n"
        );
        assert_eq!(
            text(rejected),
            "Name,Email,syntax_ok,mx_ok,status,invalid_email_echo\n\
             user1,foo@invalid_email,False,False,InvalidSyntax,foo@invalid_email\n\
             user2,jane@fake-domain.tld,True,False,InvalidDomain,\n"
        );
        assert_eq!(tally.accepted, 1);
        assert_eq!(tally.rejected, 2);
        assert_eq!(tally.invalid_domain, 1);
    }

    #[tokio::test]
    async fn test_out_of_order_results_are_written_in_order() {
        let mut writer = StreamWriter::new(Vec::new(), Vec::new(), &headers(), 0).unwrap();
        let mut results = admitted(
            (0..6)
                .map(|i| result(i, &format!("u{}@example.com", i), Classification::valid()))
                .collect(),
        )
        .await;

        // Completion order: 3, 1, 5, 0, 4, 2
        let order = [3usize, 1, 5, 0, 4, 2];
        let mut taken: Vec<Option<Admitted<ValidationResult>>> = results.drain(..).map(Some).collect();
        let mut parked_after = Vec::new();
        for i in order {
            writer.push(taken[i].take().unwrap()).unwrap();
            parked_after.push(writer.parked());
        }
        assert_eq!(parked_after, vec![1, 2, 3, 2, 3, 0]);

        let (accepted, _, _) = writer.finish().unwrap();
        let names: Vec<String> = text(accepted)
            .lines()
            .skip(1)
            .map(|line| line.split(',').next().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["user0", "user1", "user2", "user3", "user4", "user5"]);
    }

    #[tokio::test]
    async fn test_short_rows_are_padded_to_header_width() {
        let mut writer = StreamWriter::new(Vec::new(), Vec::new(), &headers(), 0).unwrap();
        let row = Row::new(0, 2, vec!["only-name".to_string()]);
        let results = admitted(vec![ValidationResult::new(
            row,
            Classification::error(false, "missing email"),
        )])
        .await;
        for r in results {
            writer.push(r).unwrap();
        }
        let (_, rejected, tally) = writer.finish().unwrap();

        assert!(text(rejected).ends_with("only-name,,False,False,Error,\n"));
        assert_eq!(tally.errors, 1);
    }

    #[tokio::test]
    async fn test_fields_needing_quotes_survive() {
        let mut writer = StreamWriter::new(Vec::new(), Vec::new(), &headers(), 0).unwrap();
        let row = Row::new(0, 2, vec!["Doe, John".to_string(), "john@example.com".to_string()]);
        let results = admitted(vec![ValidationResult::new(row, Classification::valid())]).await;
        for r in results {
            writer.push(r).unwrap();
        }
        let (accepted, _, _) = writer.finish().unwrap();
        assert!(text(accepted).contains("\"Doe, John\",john@example.com,True,True,Valid,"));
    }

    #[tokio::test]
    async fn test_finish_writes_rows_after_a_gap() {
        let mut writer = StreamWriter::new(Vec::new(), Vec::new(), &headers(), 0).unwrap();
        let mut results = admitted(vec![
            result(0, "a@example.com", Classification::valid()),
            result(1, "b@example.com", Classification::valid()),
            result(2, "c@example.com", Classification::valid()),
        ])
        .await;
        let third = results.pop().unwrap();
        let _lost = results.pop().unwrap();
        writer.push(results.pop().unwrap()).unwrap();
        writer.push(third).unwrap();
        assert_eq!(writer.parked(), 1);

        let (accepted, _, tally) = writer.finish().unwrap();
        assert_eq!(tally.accepted, 2);
        assert!(text(accepted).ends_with("user2,c@example.com,True,True,Valid,\n"));
    }

    #[test]
    fn test_empty_run_still_has_headers() {
        let writer = StreamWriter::new(Vec::new(), Vec::new(), &headers(), 0).unwrap();
        let (accepted, rejected, tally) = writer.finish().unwrap();
        let expected = "Name,Email,syntax_ok,mx_ok,status,invalid_email_echo\n";
        assert_eq!(text(accepted), expected);
        assert_eq!(text(rejected), expected);
        assert_eq!(tally, Tally::default());
    }
}
