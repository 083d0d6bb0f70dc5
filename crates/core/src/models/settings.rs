use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// Presentation and export settings.
///
/// None of these affect the aggregation itself; totals and ratios are always
/// computed at full decimal precision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Round exported ratios to this many decimal places. `None` keeps full precision.
    pub ratio_scale: Option<u32>,

    /// Field delimiter for CSV import and export.
    pub csv_delimiter: u8,

    /// Vault label written into the `vault` column of snapshot exports.
    pub vault: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ratio_scale: None,
            csv_delimiter: b',',
            vault: None,
        }
    }
}

impl Settings {
    /// Parse settings from JSON. Missing fields fall back to defaults.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        // rust_decimal supports at most 28 fractional digits
        if let Some(scale) = self.ratio_scale {
            if scale > 28 {
                return Err(CoreError::ValidationError(format!(
                    "ratio_scale {scale} exceeds the maximum of 28 decimal places"
                )));
            }
        }
        if !self.csv_delimiter.is_ascii() || matches!(self.csv_delimiter, b'"' | b'\n' | b'\r') {
            return Err(CoreError::ValidationError(format!(
                "Invalid CSV delimiter byte {:#04x}",
                self.csv_delimiter
            )));
        }
        Ok(())
    }
}
