//! Configuration and CLI argument handling

use clap::Parser;
use std::time::Duration;

use crate::{
    services::{Capabilities, DriverPreference},
    state::SessionProfile,
    tasks::TimerOptions,
};

/// CLI argument parsing structure
#[derive(Debug, Parser)]
#[command(name = "focus-timer")]
#[command(about = "A drift-corrected countdown timer served over HTTP")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Initial countdown duration in seconds
    #[arg(short, long, default_value = "1500")]
    pub duration: u64,

    /// Which countdown driver to use
    #[arg(long, value_enum, default_value_t = DriverPreference::Auto)]
    pub driver: DriverPreference,

    /// How often a running countdown is recomputed, in milliseconds
    #[arg(long, default_value = "100", value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval_ms: u64,

    /// Treat this process as an installed app (prefers the background driver)
    #[arg(long, env = "FOCUS_TIMER_INSTALLED_APP")]
    pub installed_app: bool,

    /// Host may throttle in-process timers (prefers the background driver)
    #[arg(long, env = "FOCUS_TIMER_CONSTRAINED")]
    pub constrained_platform: bool,

    /// Identifier attached to recorded sessions
    #[arg(long, default_value = "default")]
    pub profile_id: String,

    /// Display name attached to recorded sessions
    #[arg(long, default_value = "Focus")]
    pub profile_name: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    pub fn timer_options(&self) -> TimerOptions {
        TimerOptions {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            ..TimerOptions::default()
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities::detect(self.installed_app, self.constrained_platform)
    }

    pub fn profile(&self) -> SessionProfile {
        SessionProfile::new(self.profile_id.clone(), self.profile_name.clone())
    }
}
