//! `PlatformConstants` native module

use tether_core::{Value, ValueMap};
use tether_modules::{MethodSpec, NativeModule};

/// Constants-only module exporting the runtime version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformConstantsModule {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Default for PlatformConstantsModule {
    fn default() -> Self {
        Self {
            major: env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or(0),
            minor: env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or(0),
            patch: env!("CARGO_PKG_VERSION_PATCH").parse().unwrap_or(0),
        }
    }
}

impl NativeModule for PlatformConstantsModule {
    fn name(&self) -> &str {
        "PlatformConstants"
    }

    fn methods(&self) -> Vec<MethodSpec<Self>> {
        Vec::new()
    }

    fn constants(&self) -> Option<ValueMap> {
        let version: Value = [
            ("major", self.major),
            ("minor", self.minor),
            ("patch", self.patch),
        ]
        .into_iter()
        .collect();

        let mut constants = ValueMap::new();
        constants.insert("reactNativeVersion".to_string(), version);
        Some(constants)
    }
}
