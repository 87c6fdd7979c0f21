//! Run profiles: the run-time parameters the outer harness supplies.
//!
//! The engine owns no CLI or test-selection surface; it accepts a
//! [`RunOptions`] (seed plus thread/iteration multipliers) per run. Profiles
//! bundle options under a name, with built-ins for common intensities and
//! TOML loading for custom ones.
//!
//! # Example
//!
//! ```ignore
//! use scrimmage::profiles::{load_profile, RunProfile};
//!
//! // Load a named profile
//! let profile = load_profile("stress").unwrap();
//!
//! // Or load from a TOML file
//! let profile = RunProfile::from_file("custom.toml").unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Run-time parameters for one workload run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    /// Global seed; every worker's RNG derives from it.
    pub seed: u64,
    /// Multiplier applied to the workload's declared `thread_count`
    /// (result clamped to at least 1).
    pub thread_multiplier: f64,
    /// Multiplier applied to the workload's declared `iterations`
    /// (result clamped to at least 1).
    pub iteration_multiplier: f64,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            seed: 0,
            thread_multiplier: 1.0,
            iteration_multiplier: 1.0,
        }
    }
}

impl RunOptions {
    /// Options with a specific seed and unit multipliers.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }
}

/// A named bundle of run options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunProfile {
    /// Profile name.
    pub name: String,
    /// Description of the intensity this profile targets.
    pub description: String,
    /// The options a run under this profile uses.
    pub options: RunOptions,
}

impl Default for RunProfile {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            description: "Workload intensities as declared".to_string(),
            options: RunOptions::default(),
        }
    }
}

impl RunProfile {
    /// Load a profile from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ProfileError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| ProfileError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;
        Self::from_toml(&contents)
    }

    /// Parse a profile from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML cannot be parsed.
    pub fn from_toml(toml: &str) -> Result<Self, ProfileError> {
        toml::from_str(toml).map_err(|e| ProfileError::Parse {
            message: e.to_string(),
        })
    }

    /// Serialize the profile to a TOML string.
    #[must_use]
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

/// Error type for profile operations.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    /// I/O error reading profile file.
    #[error("failed to read profile from {path}: {source}")]
    Io {
        /// File path.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },
    /// Parse error in TOML.
    #[error("failed to parse profile: {message}")]
    Parse {
        /// Error message.
        message: String,
    },
    /// Profile not found.
    #[error("profile not found: {name}")]
    NotFound {
        /// Profile name.
        name: String,
    },
}

fn profile(name: &str, desc: &str, threads: f64, iterations: f64) -> RunProfile {
    RunProfile {
        name: name.to_string(),
        description: desc.to_string(),
        options: RunOptions {
            seed: 0,
            thread_multiplier: threads,
            iteration_multiplier: iterations,
        },
    }
}

/// Built-in profiles for common run intensities.
#[must_use]
pub fn builtin_profiles() -> HashMap<&'static str, RunProfile> {
    HashMap::from([
        ("smoke", profile("smoke", "Quick sanity pass with minimal load", 0.5, 0.25)),
        ("default", profile("default", "Workload intensities as declared", 1.0, 1.0)),
        ("stress", profile("stress", "Double threads and iterations to widen contention", 2.0, 2.0)),
        ("soak", profile("soak", "Extended iterations for stability validation", 1.0, 8.0)),
    ])
}

/// Load a built-in profile by name.
///
/// # Errors
///
/// Returns an error if the profile name is not found.
pub fn load_profile(name: &str) -> Result<RunProfile, ProfileError> {
    builtin_profiles()
        .remove(name)
        .ok_or_else(|| ProfileError::NotFound {
            name: name.to_string(),
        })
}

/// List all available built-in profile names.
#[must_use]
pub fn list_profiles() -> Vec<&'static str> {
    let mut names: Vec<_> = builtin_profiles().keys().copied().collect();
    names.sort_unstable();
    names
}
