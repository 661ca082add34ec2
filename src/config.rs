//! Build and query configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config.
use crate::error::{GeolocateError, Result};
use geolocate_types::Level;
use serde::{Deserialize, Serialize};

/// How states find their country.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StateLinking {
    /// Look the country up by the state's group code (`shapeGroup`).
    #[default]
    ByCode,
    /// Assign by intersection area against country polygons.
    Geometric,
}

/// Per-level Douglas-Peucker tolerance (degrees) applied to stored geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimplifyConfig {
    #[serde(default)]
    pub country: Option<f64>,
    #[serde(default)]
    pub state: Option<f64>,
    #[serde(default = "SimplifyConfig::default_municipality")]
    pub municipality: Option<f64>,
}

impl SimplifyConfig {
    const fn default_municipality() -> Option<f64> {
        Some(0.001)
    }

    /// No simplification at any level.
    pub const fn exact() -> Self {
        Self {
            country: None,
            state: None,
            municipality: None,
        }
    }

    pub fn tolerance(&self, level: Level) -> Option<f64> {
        match level {
            Level::Country => self.country,
            Level::State => self.state,
            Level::Municipality => self.municipality,
        }
    }

    pub fn with_tolerance(mut self, level: Level, tolerance: Option<f64>) -> Self {
        match level {
            Level::Country => self.country = tolerance,
            Level::State => self.state = tolerance,
            Level::Municipality => self.municipality = tolerance,
        }
        self
    }
}

impl Default for SimplifyConfig {
    fn default() -> Self {
        Self {
            country: None,
            state: None,
            municipality: Self::default_municipality(),
        }
    }
}

/// Index build and lookup configuration
///
/// # Example
///
/// ```rust
/// use geolocate::Config;
///
/// let config = Config::from_json_str(r#"{
///     "node_capacity": 8,
///     "parallel": false,
///     "simplify": { "municipality": null }
/// }"#).unwrap();
/// assert_eq!(config.node_capacity, 8);
/// assert_eq!(config.unknown_marker, "UNKNOWN");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Fanout of the bulk-loaded R-tree nodes
    #[serde(default = "Config::default_node_capacity")]
    pub node_capacity: usize,

    /// Run geometry preparation and assignment on the rayon pool
    #[serde(default = "Config::default_parallel")]
    pub parallel: bool,

    /// Name reported for every field of a lookup that hits no boundary
    #[serde(default = "Config::default_unknown_marker")]
    pub unknown_marker: String,

    /// Name stored for features that carry no name
    #[serde(default = "Config::default_unnamed_marker")]
    pub unnamed_marker: String,

    /// Log build progress every N records (0 disables)
    #[serde(default = "Config::default_progress_interval")]
    pub progress_interval: usize,

    #[serde(default)]
    pub state_linking: StateLinking,

    #[serde(default)]
    pub simplify: SimplifyConfig,
}

impl Config {
    const fn default_node_capacity() -> usize {
        16
    }

    const fn default_parallel() -> bool {
        true
    }

    fn default_unknown_marker() -> String {
        "UNKNOWN".to_string()
    }

    fn default_unnamed_marker() -> String {
        "UNKNOWN NAME".to_string()
    }

    const fn default_progress_interval() -> usize {
        50
    }

    pub fn with_node_capacity(mut self, capacity: usize) -> Self {
        self.node_capacity = capacity;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_unknown_marker(mut self, marker: impl Into<String>) -> Self {
        self.unknown_marker = marker.into();
        self
    }

    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn with_state_linking(mut self, linking: StateLinking) -> Self {
        self.state_linking = linking;
        self
    }

    pub fn with_simplify(mut self, simplify: SimplifyConfig) -> Self {
        self.simplify = simplify;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.node_capacity < 2 {
            return Err(GeolocateError::InvalidConfig(format!(
                "node_capacity must be at least 2, got {}",
                self.node_capacity
            )));
        }

        for level in Level::ALL {
            if let Some(tolerance) = self.simplify.tolerance(level)
                && (!tolerance.is_finite() || tolerance < 0.0)
            {
                return Err(GeolocateError::InvalidConfig(format!(
                    "{} simplify tolerance must be finite and non-negative, got {}",
                    level, tolerance
                )));
            }
        }

        if self.unknown_marker.is_empty() {
            return Err(GeolocateError::InvalidConfig(
                "unknown_marker must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(toml_str)
            .map_err(|e| GeolocateError::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| GeolocateError::Serialization(e.to_string()))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_capacity: Self::default_node_capacity(),
            parallel: Self::default_parallel(),
            unknown_marker: Self::default_unknown_marker(),
            unnamed_marker: Self::default_unnamed_marker(),
            progress_interval: Self::default_progress_interval(),
            state_linking: StateLinking::default(),
            simplify: SimplifyConfig::default(),
        }
    }
}
