//! Assembler configuration: downsample factor, failure policy, the
//! documented ratio-test constant, and the intermediate-artifact path.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::features::DEFAULT_RATIO_THRESHOLD;

/// What the Assembler does when a pairwise combine fails.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Halt and return the mosaic as of the last successful frame. Default.
    #[default]
    Halt,
    /// Skip the failing frame and continue, using the previous frame as
    /// both "previous" and "newly placed" for the next comparison.
    Skip,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AssemblerConfig {
    /// Decimation factor applied to both dimensions before rectification
    /// (a performance knob, not a correctness property).
    pub downsample_factor: u32,
    pub on_alignment_failure: FailurePolicy,
    pub ratio_threshold: f32,
    pub intermediate_path: PathBuf,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            downsample_factor: 2,
            on_alignment_failure: FailurePolicy::default(),
            ratio_threshold: DEFAULT_RATIO_THRESHOLD,
            intermediate_path: PathBuf::from("results/intermediateResult.png"),
        }
    }
}

impl AssemblerConfig {
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        serde_yaml::from_str(s).map_err(|e| Error::Io(e.to_string()))
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_documented_constants() {
        let cfg = AssemblerConfig::default();
        assert_eq!(cfg.downsample_factor, 2);
        assert_eq!(cfg.on_alignment_failure, FailurePolicy::Halt);
        assert_eq!(cfg.ratio_threshold, 0.55);
        assert_eq!(cfg.intermediate_path, PathBuf::from("results/intermediateResult.png"));
    }

    #[test]
    fn round_trips_through_yaml() {
        let cfg = AssemblerConfig {
            downsample_factor: 1,
            on_alignment_failure: FailurePolicy::Skip,
            ratio_threshold: 0.7,
            intermediate_path: PathBuf::from("out/progress.png"),
        };
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let back = AssemblerConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(cfg, back);
    }

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let cfg = AssemblerConfig::from_yaml_str("downsample_factor: 1\n").unwrap();
        assert_eq!(cfg.downsample_factor, 1);
        assert_eq!(cfg.ratio_threshold, DEFAULT_RATIO_THRESHOLD);
    }
}
