//! Built-in native modules

pub mod platform_constants;
pub mod ui_manager;

pub use platform_constants::PlatformConstantsModule;
pub use ui_manager::UiManagerModule;
