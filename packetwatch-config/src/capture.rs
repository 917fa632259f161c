//! Packet capture configuration for live, replayed and synthetic traffic.
//!
//! Defines parameters for network packet acquisition across different modes:
//! - Live capture (pcap)
//! - File‑based replay of a saved pcap
//! - Synthetic traffic generation

use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};
use validator::{self, Validate};

use crate::validation;
use crate::ConfigError;

/// Where packets come from.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    /// Live capture from a network interface.
    #[default]
    Pcap,
    /// Replay of a saved capture file.
    File,
    /// Seeded traffic generator, no privileges required.
    Synthetic,
}

/// Packet capture configuration.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct CaptureConfig {
    /// Capture mode (pcap, file, synthetic).
    #[serde(default)]
    pub mode: CaptureMode,

    /// Interface to capture from. `None` lets the interface selector decide.
    #[validate(custom(function = validation::validate_interface))]
    #[serde(default)]
    pub interface: Option<String>,

    /// Capture file for `file` mode.
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Run in promiscuous mode?
    #[serde(default = "default_promiscuous")]
    pub promiscuous: bool,

    /// Snapshot length in bytes.
    #[validate(range(min = 64, max = 262144))]
    #[serde(default = "default_snaplen", deserialize_with = "deserialize_size")]
    pub snaplen: usize,

    /// Upper bound on a single blocking read (milliseconds).
    #[validate(range(min = 1, max = 5000))]
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u32,

    /// Optional BPF expression, e.g. `tcp`.
    #[validate(custom(function = validation::validate_filter))]
    #[serde(default)]
    pub protocol_filter: Option<String>,

    /// Seed for the synthetic generator.
    #[serde(default = "default_seed")]
    pub synthetic_seed: u64,
}

fn default_promiscuous() -> bool {
    true
}

fn default_snaplen() -> usize {
    65535
}

fn default_read_timeout() -> u32 {
    200
}

fn default_seed() -> u64 {
    42
}

impl CaptureConfig {
    /// Cross-field checks that `validator` cannot express.
    pub(crate) fn check_mode_requirements(&self) -> Result<(), ConfigError> {
        if self.mode == CaptureMode::File && self.file.is_none() {
            return Err(ConfigError::MissingCaptureFile);
        }
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SizeValue {
    Num(usize),
    Str(String),
}

/// Custom deserializer to allow human‑friendly sizes (e.g. "64KiB") or direct numbers.
fn deserialize_size<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let sv = SizeValue::deserialize(deserializer)?;
    match sv {
        SizeValue::Num(n) => Ok(n),
        SizeValue::Str(s) => {
            let s = s.trim();
            let mut num_part = String::new();
            let mut unit_part = String::new();
            for c in s.chars() {
                if c.is_ascii_digit() || c == '.' {
                    num_part.push(c);
                } else {
                    unit_part.push(c);
                }
            }
            let number: f64 = num_part.parse().map_err(serde::de::Error::custom)?;
            let multiplier = match unit_part.trim().to_lowercase().as_str() {
                "kb" | "kib" => 1024.0,
                "mb" | "mib" => 1024.0 * 1024.0,
                "" | "b" => 1.0,
                _ => return Err(serde::de::Error::custom("Unknown size unit")),
            };
            Ok((number * multiplier) as usize)
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            mode: CaptureMode::default(),
            interface: None,
            file: None,
            promiscuous: default_promiscuous(),
            snaplen: default_snaplen(),
            read_timeout_ms: default_read_timeout(),
            protocol_filter: None,
            synthetic_seed: default_seed(),
        }
    }
}
