//! Environment capability probe used to pick a countdown driver

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Which driver the caller asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverPreference {
    /// Decide from the detected capabilities
    #[default]
    Auto,
    Local,
    Background,
}

/// Driver actually chosen for a facade's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    Local,
    Background,
}

/// What the host environment can do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// Running as an installed, app-like process rather than an ad hoc session
    pub installed_app: bool,
    /// The caller's own timers may be throttled or suspended
    pub constrained_platform: bool,
    /// An isolated background execution context can be created
    pub background_execution: bool,
}

impl Capabilities {
    /// Probe the current process, combined with caller-provided hints
    pub fn detect(installed_app: bool, constrained_platform: bool) -> Self {
        Self {
            installed_app,
            constrained_platform,
            background_execution: cfg!(not(target_family = "wasm")),
        }
    }

    /// Whether the background driver should be preferred
    pub fn prefers_background(&self) -> bool {
        (self.installed_app || self.constrained_platform) && self.background_execution
    }
}

/// Resolve a preference against the detected capabilities
pub fn select_driver(preference: DriverPreference, capabilities: &Capabilities) -> DriverKind {
    match preference {
        DriverPreference::Local => DriverKind::Local,
        DriverPreference::Background if capabilities.background_execution => DriverKind::Background,
        DriverPreference::Background => DriverKind::Local,
        DriverPreference::Auto if capabilities.prefers_background() => DriverKind::Background,
        DriverPreference::Auto => DriverKind::Local,
    }
}
