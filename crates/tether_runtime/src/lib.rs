//! # Tether Runtime
//!
//! Wires the queues, the bridge, native modules, the UI operation queue and
//! the event dispatcher into one runtime instance.
//!
//! ```text
//!                 ┌──────────────── Runtime ────────────────┐
//!  host ─call───► │ script queue ── Bridge ── ScriptExecutor │
//!                 │      │ flushed calls                    │
//!                 │      ▼                                  │
//!                 │ native-modules queue ── ModuleRegistry  │
//!                 │      │ UIManager                        │
//!                 │      ▼                                  │
//!                 │ layout queue ── UiOperationQueue        │
//!                 └──────────────────────────────────────────┘
//!  frame tick ──► Choreographer: DispatchUi → ScriptEvents → Idle
//! ```

pub mod config;
pub mod logging;
pub mod package;
pub mod choreographer;
pub mod instance;
pub mod modules;

pub use choreographer::{Choreographer, FramePhase, FrameReport, IdleCallback};
pub use config::RuntimeConfig;
pub use instance::{Runtime, RuntimeBuilder};
pub use logging::init_logging;
pub use modules::{PlatformConstantsModule, UiManagerModule};
pub use package::{Package, PackageContext};

use tether_bridge::BridgeError;
use tether_core::CodecError;
use tether_event::EventError;
use tether_modules::ModuleError;
use tether_queue::QueueError;
use tether_ui::UiError;
use thiserror::Error;

/// Runtime errors
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Module error: {0}")]
    Module(#[from] ModuleError),

    #[error("UI error: {0}")]
    Ui(#[from] UiError),

    #[error("Event error: {0}")]
    Event(#[from] EventError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Runtime disposed")]
    Disposed,
}

/// Result type for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::RuntimeConfig;
    pub use crate::instance::{Runtime, RuntimeBuilder};
    pub use crate::package::{Package, PackageContext};
    pub use crate::{RuntimeError, RuntimeResult};
    pub use tether_core::prelude::*;
    pub use tether_event::{Event, TouchEventType};
    pub use tether_modules::prelude::*;
    pub use tether_ui::prelude::*;
}
