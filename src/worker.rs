use crate::intake::{Admitted, IntakeReceiver};
use crate::models::result::{Classification, ValidationResult};
use crate::models::row::Row;
use crate::validation::dnsmx::MxLookup;
use crate::validation::resolver::MxResolver;
use crate::validation::syntax::{domain_of, is_valid_email};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

/// Fixed set of workers turning rows into [`ValidationResult`]s.
pub struct WorkerPool<L> {
    resolver: Arc<MxResolver<L>>,
    email_index: usize,
    workers: usize,
}

impl<L: MxLookup + 'static> WorkerPool<L> {
    pub fn new(resolver: Arc<MxResolver<L>>, email_index: usize, workers: usize) -> Self {
        Self {
            resolver,
            email_index,
            workers: workers.max(1),
        }
    }

    /// Spawns the workers. Each one runs until the intake is drained or the
    /// result channel is closed.
    pub fn spawn(
        &self,
        intake: IntakeReceiver,
        results: mpsc::Sender<Admitted<ValidationResult>>,
    ) -> JoinSet<()> {
        let mut set = JoinSet::new();
        for id in 0..self.workers {
            set.spawn(Self::run_worker(
                id,
                intake.clone(),
                results.clone(),
                self.resolver.clone(),
                self.email_index,
            ));
        }
        set
    }

    async fn run_worker(
        id: usize,
        intake: IntakeReceiver,
        results: mpsc::Sender<Admitted<ValidationResult>>,
        resolver: Arc<MxResolver<L>>,
        email_index: usize,
    ) {
        let mut handled = 0u64;
        while let Some(admitted) = intake.next().await {
            let result = admitted
                .then(|row| validate_row(&resolver, email_index, row))
                .await;
            if results.send(result).await.is_err() {
                debug!(worker = id, "result channel closed, stopping");
                break;
            }
            handled += 1;
        }
        debug!(worker = id, handled, "worker finished");
    }
}

/// Classifies a single row. Never fails: every problem becomes a status.
pub async fn validate_row<L: MxLookup>(
    resolver: &MxResolver<L>,
    email_index: usize,
    row: Row,
) -> ValidationResult {
    let classification = match AssertUnwindSafe(classify(resolver, email_index, &row))
        .catch_unwind()
        .await
    {
        Ok(classification) => classification,
        Err(_) => {
            error!(line = row.line, "validation panicked, marking row as error");
            Classification::error(false, "internal error while validating row")
        }
    };

    if let Some(detail) = &classification.detail {
        warn!(line = row.line, detail = %detail, "row rejected with error");
    }

    ValidationResult::new(row, classification)
}

async fn classify<L: MxLookup>(
    resolver: &MxResolver<L>,
    email_index: usize,
    row: &Row,
) -> Classification {
    if let Some(fault) = &row.fault {
        return Classification::error(false, fault.clone());
    }

    let email = match row.field(email_index).map(str::trim) {
        Some(email) if !email.is_empty() => email,
        _ => return Classification::error(false, "missing email"),
    };

    // Never spend DNS work on a malformed address
    if !is_valid_email(email) {
        return Classification::invalid_syntax(email);
    }

    let Some(domain) = domain_of(email) else {
        return Classification::invalid_syntax(email);
    };

    match resolver.resolve(domain).await {
        Ok(true) => Classification::valid(),
        Ok(false) => Classification::invalid_domain(),
        Err(fault) => Classification::error(true, fault.to_string()),
    }
}
