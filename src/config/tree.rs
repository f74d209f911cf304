use super::traits::ConfigSection;
use crate::error::{GpError, Result};
use crate::types::Operator;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    pub max_depth: usize,
    /// Sensor names available as terminals
    pub sensors: Vec<String>,
    /// Bounds for constant terminals; `None` disables constants
    pub constant_range: Option<(f64, f64)>,
    /// Draw each initial tree's depth limit from `1..=max_depth`
    pub ramped_depth: bool,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 5,
            sensors: vec!["G".to_string(), "P".to_string(), "W".to_string(), "F".to_string()],
            constant_range: Some((-10.0, 10.0)),
            ramped_depth: false,
        }
    }
}

impl ConfigSection for TreeConfig {
    fn section_name() -> &'static str {
        "tree"
    }

    fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(GpError::Configuration(
                "Maximum tree depth must be at least 1".to_string()
            ));
        }
        if self.sensors.is_empty() && self.constant_range.is_none() {
            return Err(GpError::Configuration(
                "Terminal alphabet is empty".to_string()
            ));
        }
        if let Some((low, high)) = self.constant_range {
            if !(low.is_finite() && high.is_finite()) || low > high {
                return Err(GpError::Configuration(format!(
                    "Invalid constant range [{}, {}]",
                    low, high
                )));
            }
        }
        for name in &self.sensors {
            if name.is_empty()
                || name.starts_with('|')
                || name.chars().any(char::is_whitespace)
                || Operator::from_symbol(name).is_some()
                || name.parse::<f64>().is_ok()
            {
                return Err(GpError::Configuration(format!(
                    "Sensor name '{}' is not a valid terminal",
                    name
                )));
            }
        }
        Ok(())
    }
}
