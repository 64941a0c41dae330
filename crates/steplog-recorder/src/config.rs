//! Recorder configuration.
//!
//! Reads configuration from environment variables:
//! - `STEPLOG_EMOTICONS`: `0`/`false`/`off` renders `@tag` labels instead of
//!   emoticons (default: emoticons on)
//! - `STEPLOG_COLOR_SEED`: u64 seed for the random color phase (default: OS
//!   entropy)
//! - `STEPLOG_PALETTE`: `;`-separated colors, each `#rrggbb` or
//!   `rgb(r, g, b)` (default: the built-in palette)

use steplog_core::{ColorAllocator, ColorToken, DEFAULT_PALETTE};

use crate::error::RecorderError;

/// Configuration for a [`Recorder`](crate::Recorder).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecorderConfig {
    /// Label events with emoticons rather than `@tag` text.
    pub use_emoticons: bool,
    /// Colors handed to the first methods, in order.
    pub palette: Vec<ColorToken>,
    /// Seed for the random color phase. `None` seeds from OS entropy.
    pub color_seed: Option<u64>,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        RecorderConfig {
            use_emoticons: true,
            palette: DEFAULT_PALETTE.to_vec(),
            color_seed: None,
        }
    }
}

impl RecorderConfig {
    /// Builds a configuration from `STEPLOG_*` environment variables, falling
    /// back to defaults for unset ones.
    pub fn from_env() -> Result<Self, RecorderError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RecorderError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = RecorderConfig::default();

        if let Some(raw) = lookup("STEPLOG_EMOTICONS") {
            config.use_emoticons = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "on" | "yes" => true,
                "0" | "false" | "off" | "no" => false,
                other => {
                    return Err(RecorderError::InvalidConfig {
                        key: "STEPLOG_EMOTICONS",
                        reason: format!("expected a boolean, got '{other}'"),
                    })
                }
            };
        }

        if let Some(raw) = lookup("STEPLOG_COLOR_SEED") {
            let seed = raw
                .trim()
                .parse::<u64>()
                .map_err(|e| RecorderError::InvalidConfig {
                    key: "STEPLOG_COLOR_SEED",
                    reason: e.to_string(),
                })?;
            config.color_seed = Some(seed);
        }

        if let Some(raw) = lookup("STEPLOG_PALETTE") {
            config.palette = raw
                .split(';')
                .map(str::trim)
                .filter(|literal| !literal.is_empty())
                .map(str::parse::<ColorToken>)
                .collect::<Result<Vec<_>, _>>()?;
        }

        Ok(config)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.color_seed = Some(seed);
        self
    }

    pub fn with_emoticons(mut self, use_emoticons: bool) -> Self {
        self.use_emoticons = use_emoticons;
        self
    }

    /// Creates the color allocator described by this configuration.
    pub fn allocator(&self) -> ColorAllocator {
        match self.color_seed {
            Some(seed) => ColorAllocator::seeded(self.palette.clone(), seed),
            None => ColorAllocator::new(self.palette.clone()),
        }
    }
}
