/*
[INPUT]:  YAML configuration file
[OUTPUT]: Parsed session-duration configuration
[POS]:    Configuration layer - session setup
[UPDATE]: When adding new configuration options
*/

use serde::{Deserialize, Serialize};

use crate::model::TaskKind;

/// Session durations and cycle policy for the timer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimerConfig {
    /// Length of a focus session in minutes
    #[serde(default = "default_focus_minutes")]
    pub focus_minutes: u64,
    /// Length of a short break in minutes
    #[serde(default = "default_short_break_minutes")]
    pub short_break_minutes: u64,
    /// Length of a long break in minutes
    #[serde(default = "default_long_break_minutes")]
    pub long_break_minutes: u64,
    /// Completed focus sessions between long breaks
    #[serde(default = "default_cycles_per_long_break")]
    pub cycles_per_long_break: u32,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            focus_minutes: default_focus_minutes(),
            short_break_minutes: default_short_break_minutes(),
            long_break_minutes: default_long_break_minutes(),
            cycles_per_long_break: default_cycles_per_long_break(),
        }
    }
}

fn default_focus_minutes() -> u64 {
    25
}

fn default_short_break_minutes() -> u64 {
    5
}

fn default_long_break_minutes() -> u64 {
    15
}

fn default_cycles_per_long_break() -> u32 {
    4
}

impl TimerConfig {
    /// Load configuration from YAML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Configured duration in seconds for a session kind.
    pub fn duration_secs(&self, kind: TaskKind) -> u64 {
        let minutes = match kind {
            TaskKind::Focus => self.focus_minutes,
            TaskKind::ShortBreak => self.short_break_minutes,
            TaskKind::LongBreak => self.long_break_minutes,
        };
        minutes.saturating_mul(60)
    }
}
