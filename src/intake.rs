//! Bounded intake between the row reader and the worker pool.
//!
//! Two limits apply. The queue holds at most `queue_capacity` rows waiting
//! for a worker. The window caps the rows admitted but not yet written: a
//! row takes a slot when it is read and gives it back when the writer has
//! flushed it. Together they bound memory regardless of input size.

use crate::models::row::Row;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore, mpsc};

/// A value occupying one slot of the in-flight window.
///
/// The slot is released when the value is dropped.
#[derive(Debug)]
pub struct Admitted<T> {
    value: T,
    _slot: OwnedSemaphorePermit,
}

impl<T> Admitted<T> {
    pub fn get(&self) -> &T {
        &self.value
    }

    /// Transforms the value while keeping its slot.
    pub async fn then<U, F, Fut>(self, f: F) -> Admitted<U>
    where
        F: FnOnce(T) -> Fut,
        Fut: Future<Output = U>,
    {
        Admitted {
            value: f(self.value).await,
            _slot: self._slot,
        }
    }
}

/// The intake was closed because every worker has stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntakeClosed;

pub struct IntakeSender {
    tx: mpsc::Sender<Admitted<Row>>,
    window: Arc<Semaphore>,
}

impl IntakeSender {
    /// Waits for a window slot and queue space, then enqueues the row.
    pub async fn admit(&self, row: Row) -> Result<(), IntakeClosed> {
        let slot = self
            .window
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| IntakeClosed)?;
        self.tx
            .send(Admitted { value: row, _slot: slot })
            .await
            .map_err(|_| IntakeClosed)
    }

    /// Blocking variant of [`IntakeSender::admit`] for the reader thread.
    ///
    /// Must not be called from within an async context.
    pub fn blocking_admit(&self, row: Row) -> Result<(), IntakeClosed> {
        futures::executor::block_on(self.admit(row))
    }

    /// Slots currently free in the window.
    pub fn available(&self) -> usize {
        self.window.available_permits()
    }
}

/// Shared by all workers; each `next` hands a row to exactly one of them.
#[derive(Clone)]
pub struct IntakeReceiver {
    rx: Arc<Mutex<mpsc::Receiver<Admitted<Row>>>>,
}

impl IntakeReceiver {
    /// Returns `None` once the sender is gone and the queue is drained.
    pub async fn next(&self) -> Option<Admitted<Row>> {
        self.rx.lock().await.recv().await
    }
}

/// Creates an intake holding at most `queue_capacity` queued rows and
/// `window` rows in flight overall. Both are raised to at least 1.
pub fn channel(queue_capacity: usize, window: usize) -> (IntakeSender, IntakeReceiver) {
    let (tx, rx) = mpsc::channel(queue_capacity.max(1));
    let sender = IntakeSender {
        tx,
        window: Arc::new(Semaphore::new(window.max(1))),
    };
    let receiver = IntakeReceiver {
        rx: Arc::new(Mutex::new(rx)),
    };
    (sender, receiver)
}

/// Cooperative stop signal, checked by the reader before each row.
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
