// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Trace engine configuration
//!
//! [`TraceBoundaryConfig`] governs one detector instance and is immutable once
//! the detector is built. [`TraceEngineConfig`] bundles it with the weight
//! table of the default scorer so both can be loaded from one TOML document:
//!
//! ```toml
//! [boundary]
//! time_proximity_ms = 60000
//! max_trace_size = 25
//!
//! [scoring]
//! default_weight = 0.1
//! [scoring.tool_overrides]
//! deploy = 0.9
//! ```

use crate::error::{TraceError, TraceResult};
use crate::scoring::ScoringWeights;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for trace boundary detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceBoundaryConfig {
    /// Maximum gap between consecutive tool calls of one trace.
    #[serde(default = "default_time_proximity_ms")]
    pub time_proximity_ms: u64,

    /// Split when consecutive calls touch disjoint directories.
    #[serde(default = "default_true")]
    pub same_dir_threshold: bool,

    /// Split when a failed call is not followed by a fix attempt.
    #[serde(default = "default_true")]
    pub causal_relationship: bool,

    /// Hard cap on tool calls per trace.
    #[serde(default = "default_max_trace_size")]
    pub max_trace_size: usize,

    /// Traces older than this are compressed as soon as they are finalized.
    #[serde(default = "default_compression_threshold_hours")]
    pub compression_threshold_hours: f64,
}

fn default_time_proximity_ms() -> u64 {
    30_000
}

fn default_true() -> bool {
    true
}

fn default_max_trace_size() -> usize {
    50
}

fn default_compression_threshold_hours() -> f64 {
    24.0
}

impl Default for TraceBoundaryConfig {
    fn default() -> Self {
        Self {
            time_proximity_ms: default_time_proximity_ms(),
            same_dir_threshold: true,
            causal_relationship: true,
            max_trace_size: default_max_trace_size(),
            compression_threshold_hours: default_compression_threshold_hours(),
        }
    }
}

impl TraceBoundaryConfig {
    /// Only the temporal and size rules; directory and causal splitting off.
    pub fn temporal_only() -> Self {
        Self {
            same_dir_threshold: false,
            causal_relationship: false,
            ..Default::default()
        }
    }

    /// Set the time proximity window.
    pub fn with_time_proximity(mut self, window: Duration) -> Self {
        self.time_proximity_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the time proximity window in milliseconds.
    pub fn with_time_proximity_ms(mut self, ms: u64) -> Self {
        self.time_proximity_ms = ms;
        self
    }

    /// Enable or disable directory-locality splitting.
    pub fn with_same_dir_threshold(mut self, enabled: bool) -> Self {
        self.same_dir_threshold = enabled;
        self
    }

    /// Enable or disable causal-chain splitting.
    pub fn with_causal_relationship(mut self, enabled: bool) -> Self {
        self.causal_relationship = enabled;
        self
    }

    /// Set the maximum trace size.
    pub fn with_max_trace_size(mut self, size: usize) -> Self {
        self.max_trace_size = size;
        self
    }

    /// Set the compression age threshold.
    pub fn with_compression_threshold_hours(mut self, hours: f64) -> Self {
        self.compression_threshold_hours = hours;
        self
    }

    /// Reject configurations no detector can honor.
    pub fn validate(&self) -> TraceResult<()> {
        if self.max_trace_size == 0 {
            return Err(TraceError::Config(
                "max_trace_size must be at least 1".to_string(),
            ));
        }
        if !self.compression_threshold_hours.is_finite() || self.compression_threshold_hours < 0.0
        {
            return Err(TraceError::Config(format!(
                "compression_threshold_hours must be a non-negative number, got {}",
                self.compression_threshold_hours
            )));
        }
        if i64::try_from(self.time_proximity_ms).is_err() {
            return Err(TraceError::Config(format!(
                "time_proximity_ms out of range: {}",
                self.time_proximity_ms
            )));
        }
        Ok(())
    }
}

/// Complete engine configuration: boundary rules plus default scorer weights.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceEngineConfig {
    #[serde(default)]
    pub boundary: TraceBoundaryConfig,

    #[serde(default)]
    pub scoring: ScoringWeights,
}

impl TraceEngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> TraceResult<Self> {
        let config: TraceEngineConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> TraceResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> TraceResult<()> {
        self.boundary.validate()?;
        self.scoring.validate()
    }
}
