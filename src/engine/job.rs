//! Background save/load jobs and the document they share.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Mutex, MutexGuard};

use crate::graph::Document;
use crate::types::{QnmsError, QnmsResult};

/// How a save or load ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Finished,
    /// The operation could not complete.
    Failed(String),
    /// The user declined to continue.
    Aborted(String),
}

impl Outcome {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished)
    }
}

impl<T> From<QnmsResult<T>> for Outcome {
    fn from(result: QnmsResult<T>) -> Self {
        match result {
            Ok(_) => Self::Finished,
            Err(QnmsError::Aborted(reason)) => Self::Aborted(reason),
            Err(e) => Self::Failed(e.to_string()),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finished => write!(f, "finished"),
            Self::Failed(msg) => write!(f, "failed: {}", msg),
            Self::Aborted(reason) => write!(f, "aborted: {}", reason),
        }
    }
}

/// Signals sent by a running job. The last one is always a terminal event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerializerEvent {
    Progress(u8),
    Finished,
    Failed(String),
    Aborted(String),
}

impl From<Outcome> for SerializerEvent {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Finished => Self::Finished,
            Outcome::Failed(msg) => Self::Failed(msg),
            Outcome::Aborted(reason) => Self::Aborted(reason),
        }
    }
}

/// A save or load running on its own thread.
pub struct Job {
    events: Receiver<SerializerEvent>,
    handle: Option<JoinHandle<Outcome>>,
    immediate: Option<Outcome>,
}

impl Job {
    pub(crate) fn spawned(events: Receiver<SerializerEvent>, handle: JoinHandle<Outcome>) -> Self {
        Self {
            events,
            handle: Some(handle),
            immediate: None,
        }
    }

    /// A job that ended before a worker was started (e.g. busy document).
    pub(crate) fn rejected(events: Receiver<SerializerEvent>, outcome: Outcome) -> Self {
        Self {
            events,
            handle: None,
            immediate: Some(outcome),
        }
    }

    /// Progress and terminal events, in the order they happened.
    pub fn events(&self) -> &Receiver<SerializerEvent> {
        &self.events
    }

    /// Block until the job ends.
    pub fn wait(self) -> Outcome {
        if let Some(outcome) = self.immediate {
            return outcome;
        }
        match self.handle.map(JoinHandle::join) {
            Some(Ok(outcome)) => outcome,
            Some(Err(_)) => Outcome::Failed("serializer thread panicked".into()),
            None => Outcome::Failed("job has no worker".into()),
        }
    }
}

/// A document shared between its owner and background jobs.
///
/// At most one save or load runs against it at a time.
#[derive(Clone)]
pub struct SharedDocument {
    doc: Arc<Mutex<Document>>,
    busy: Arc<AtomicBool>,
}

impl SharedDocument {
    pub fn new(doc: Document) -> Self {
        Self {
            doc: Arc::new(Mutex::new(doc)),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, Document> {
        self.doc.lock()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Claim the document for one save or load.
    pub fn try_begin(&self) -> QnmsResult<BusyGuard> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(QnmsError::Busy);
        }
        Ok(BusyGuard {
            flag: Arc::clone(&self.busy),
        })
    }
}

impl Default for SharedDocument {
    fn default() -> Self {
        Self::new(Document::new())
    }
}

/// Releases the document when dropped.
pub struct BusyGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
