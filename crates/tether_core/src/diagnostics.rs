//! Runtime fault reporting
//!
//! Failures that must not stop the runtime (native method errors, invalid
//! flushed responses, failed commits, panicking queue tasks) are turned into a
//! [`Fault`] and handed to one [`DiagnosticsSink`].

use parking_lot::Mutex;
use std::fmt;

/// Where a fault originated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultSource {
    /// A native module method returned an error or panicked
    NativeMethod,
    /// The script engine or the flushed-call protocol failed
    Transport,
    /// A UI batch failed to commit
    Commit,
    /// A queue task panicked
    Queue,
    /// Event delivery failed
    Event,
}

impl fmt::Display for FaultSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NativeMethod => "native-method",
            Self::Transport => "transport",
            Self::Commit => "commit",
            Self::Queue => "queue",
            Self::Event => "event",
        };
        f.write_str(name)
    }
}

/// A reported runtime fault
#[derive(Debug, Clone, PartialEq)]
pub struct Fault {
    /// Origin of the fault
    pub source: FaultSource,
    /// What was being done, e.g. `"Timing.createTimer"`
    pub context: String,
    /// Error message
    pub message: String,
}

impl Fault {
    /// Create a new fault
    pub fn new(source: FaultSource, context: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source,
            context: context.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.source, self.context, self.message)
    }
}

/// Destination for runtime faults
pub trait DiagnosticsSink: Send + Sync {
    /// Report a fault
    fn report(&self, fault: Fault);
}

/// Sink that writes faults to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDiagnostics;

impl DiagnosticsSink for LogDiagnostics {
    fn report(&self, fault: Fault) {
        log::error!("{}", fault);
    }
}

/// Sink that keeps faults in memory
#[derive(Debug, Default)]
pub struct CollectingDiagnostics {
    faults: Mutex<Vec<Fault>>,
}

impl CollectingDiagnostics {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of collected faults
    pub fn faults(&self) -> Vec<Fault> {
        self.faults.lock().clone()
    }

    /// Remove and return collected faults
    pub fn take(&self) -> Vec<Fault> {
        std::mem::take(&mut *self.faults.lock())
    }

    /// Number of collected faults
    pub fn len(&self) -> usize {
        self.faults.lock().len()
    }

    /// Check if no fault was collected
    pub fn is_empty(&self) -> bool {
        self.faults.lock().is_empty()
    }
}

impl DiagnosticsSink for CollectingDiagnostics {
    fn report(&self, fault: Fault) {
        log::debug!("collected fault {}", fault);
        self.faults.lock().push(fault);
    }
}
