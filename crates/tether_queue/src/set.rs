//! The runtime's three queues

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::queue::{DisposePolicy, ExecutionQueue, FailureHandler, QueueSpec, QueueState};
use crate::QueueResult;

/// Which of the three runtime queues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueKind {
    /// Runs the script engine
    Script,
    /// Runs native module methods
    NativeModules,
    /// Owns the view tree and applies UI commits
    Layout,
}

impl QueueKind {
    /// All kinds, in teardown order
    pub const ALL: [QueueKind; 3] = [Self::Script, Self::NativeModules, Self::Layout];

    /// Default worker name
    pub fn default_name(self) -> &'static str {
        match self {
            Self::Script => "tether.script",
            Self::NativeModules => "tether.native_modules",
            Self::Layout => "tether.layout",
        }
    }
}

impl fmt::Display for QueueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_name())
    }
}

/// Specs for the three queues
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSetSpec {
    pub script: QueueSpec,
    pub native_modules: QueueSpec,
    pub layout: QueueSpec,
}

impl Default for QueueSetSpec {
    fn default() -> Self {
        Self {
            script: QueueSpec::new(QueueKind::Script.default_name()),
            native_modules: QueueSpec::new(QueueKind::NativeModules.default_name()),
            layout: QueueSpec::new(QueueKind::Layout.default_name()),
        }
    }
}

/// Script, native-module and layout queues
#[derive(Debug, Clone)]
pub struct QueueSet {
    pub script: ExecutionQueue,
    pub native_modules: ExecutionQueue,
    pub layout: ExecutionQueue,
}

impl QueueSet {
    /// Create and start all three queues
    pub fn spawn(spec: &QueueSetSpec) -> QueueResult<Self> {
        let set = Self {
            script: ExecutionQueue::new(spec.script.clone()),
            native_modules: ExecutionQueue::new(spec.native_modules.clone()),
            layout: ExecutionQueue::new(spec.layout.clone()),
        };

        for kind in QueueKind::ALL {
            if let Err(e) = set.get(kind).start() {
                let _ = set.dispose_all(DisposePolicy::Discard);
                return Err(e);
            }
        }
        Ok(set)
    }

    /// Get a queue by kind
    pub fn get(&self, kind: QueueKind) -> &ExecutionQueue {
        match kind {
            QueueKind::Script => &self.script,
            QueueKind::NativeModules => &self.native_modules,
            QueueKind::Layout => &self.layout,
        }
    }

    /// Which queue, if any, the calling thread is running
    pub fn current_kind(&self) -> Option<QueueKind> {
        QueueKind::ALL
            .into_iter()
            .find(|kind| self.get(*kind).is_current())
    }

    /// Install the same failure handler on every queue
    pub fn set_failure_handler(&self, handler: FailureHandler) {
        for kind in QueueKind::ALL {
            self.get(kind).set_failure_handler(handler.clone());
        }
    }

    /// Check if every queue is disposed
    pub fn is_disposed(&self) -> bool {
        QueueKind::ALL
            .into_iter()
            .all(|kind| self.get(kind).state() == QueueState::Disposed)
    }

    /// Dispose script, then native-module, then layout queue.
    ///
    /// Every queue is disposed even if an earlier one fails; the first error
    /// is returned.
    pub fn dispose_all(&self, policy: DisposePolicy) -> QueueResult<()> {
        let mut first_error = None;
        for kind in QueueKind::ALL {
            if let Err(e) = self.get(kind).drain_and_dispose(policy) {
                log::warn!("Failed to dispose queue '{}': {}", kind, e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_and_dispose() {
        let set = QueueSet::spawn(&QueueSetSpec::default()).unwrap();
        assert_eq!(set.script.name(), "tether.script");
        assert_eq!(set.current_kind(), None);

        let probe = set.clone();
        let kind = set
            .native_modules
            .call_and_wait(move || probe.current_kind())
            .unwrap();
        assert_eq!(kind, Some(QueueKind::NativeModules));

        set.dispose_all(DisposePolicy::Drain).unwrap();
        assert!(set.is_disposed());
    }

    #[test]
    fn test_queues_run_independently() {
        let set = QueueSet::spawn(&QueueSetSpec::default()).unwrap();
        let layout = set.layout.clone();

        // A native-module task may block on the layout queue
        let value = set
            .native_modules
            .call_and_wait(move || layout.call_and_wait(|| 7))
            .unwrap()
            .unwrap();
        assert_eq!(value, 7);

        set.dispose_all(DisposePolicy::Drain).unwrap();
    }
}
