//! Bounded hand-off between the packet transformer and the writer.
//!
//! Single producer, single consumer, one lock and one condition. A
//! `None` sentinel signals graceful shutdown; the consumer polls with a
//! timeout so it stays responsive to flush. No busy spinning.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::error::WriterError;
use crate::row::DataRow;

/// Result of a timed dequeue.
#[derive(Debug)]
pub enum Dequeued {
    Row(Box<DataRow>),
    /// The shutdown sentinel was consumed.
    Sentinel,
    /// Timed out with nothing queued.
    Empty,
}

struct Inner {
    items: VecDeque<Option<DataRow>>,
    consumer_active: bool,
    failed: bool,
}

/// Bounded FIFO of rows.
pub struct RowQueue {
    inner: Mutex<Inner>,
    cond: Condvar,
    capacity: usize,
}

impl RowQueue {
    /// Create a queue with the given backlog cap.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                consumer_active: false,
                failed: false,
            }),
            cond: Condvar::new(),
            capacity: capacity.max(2),
        }
    }

    /// Enqueue a row, blocking while the backlog is at capacity until
    /// it has drained to half. Fails once the consumer has died.
    pub fn enqueue(&self, row: DataRow) -> Result<(), WriterError> {
        let mut inner = self.inner.lock();
        if inner.failed {
            return Err(WriterError::ConsumerFailed);
        }
        if inner.items.len() >= self.capacity {
            while inner.items.len() > self.capacity / 2 {
                self.cond.wait(&mut inner);
                if inner.failed {
                    return Err(WriterError::ConsumerFailed);
                }
            }
        }
        inner.items.push_back(Some(row));
        self.cond.notify_all();
        Ok(())
    }

    /// Enqueue the shutdown sentinel.
    pub fn enqueue_sentinel(&self) {
        let mut inner = self.inner.lock();
        inner.items.push_back(None);
        self.cond.notify_all();
    }

    /// Dequeue with a timeout.
    pub fn dequeue(&self, timeout: Duration) -> Dequeued {
        let mut inner = self.inner.lock();
        if inner.items.is_empty() {
            self.cond.wait_for(&mut inner, timeout);
        }
        match inner.items.pop_front() {
            Some(Some(row)) => {
                self.cond.notify_all();
                Dequeued::Row(Box::new(row))
            }
            Some(None) => Dequeued::Sentinel,
            None => Dequeued::Empty,
        }
    }

    /// Mark the consumer as failed; pending and future enqueues error.
    pub fn mark_failed(&self) {
        let mut inner = self.inner.lock();
        inner.failed = true;
        self.cond.notify_all();
    }

    pub fn is_failed(&self) -> bool {
        self.inner.lock().failed
    }

    pub fn set_consumer_active(&self, active: bool) {
        let mut inner = self.inner.lock();
        inner.consumer_active = active;
        self.cond.notify_all();
    }

    pub fn consumer_active(&self) -> bool {
        self.inner.lock().consumer_active
    }

    /// Current backlog depth (sentinels included).
    pub fn depth(&self) -> usize {
        self.inner.lock().items.len()
    }
}
