/* Run configuration of the sampling engine */

use crate::{
    error::{Result, SampleError},
    geo::projection::{Crs, WGS84},
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PROGRESS_INTERVAL: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMode {
    /// per-band value lists under `properties.spatial_fields`
    List,
    /// majority code of the first band under `properties[field_name]`
    Categorical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Property to populate. Not needed when lists are keyed by band name.
    pub field_name: Option<String>,
    pub categorical: bool,
    /// Negative pixel values are no-data and read as zero.
    pub clamp_negative: bool,
    /// Keep a feature only if the sum of absolute sampled values exceeds this.
    pub rejection_threshold: Option<f64>,
    /// Write one list per band, keyed by the band description.
    pub band_keyed: bool,
    /// Also write `properties.deltas`, the distances between consecutive points.
    pub with_deltas: bool,
    /// CRS of the feature coordinates.
    pub source_crs: Crs,
    /// Overrides the CRS declared by the raster.
    pub raster_crs: Option<Crs>,
    pub progress_interval: usize,
    pub threads: Option<usize>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            field_name: None,
            categorical: false,
            clamp_negative: false,
            rejection_threshold: None,
            band_keyed: false,
            with_deltas: false,
            source_crs: WGS84,
            raster_crs: None,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            threads: None,
        }
    }
}

impl SamplingConfig {
    pub fn list(field_name: impl Into<String>) -> Self {
        Self {
            field_name: Some(field_name.into()),
            ..Default::default()
        }
    }

    pub fn categorical(field_name: impl Into<String>) -> Self {
        Self {
            field_name: Some(field_name.into()),
            categorical: true,
            ..Default::default()
        }
    }

    pub fn mode(&self) -> AggregationMode {
        if self.categorical {
            AggregationMode::Categorical
        } else {
            AggregationMode::List
        }
    }

    pub fn validate(&self) -> Result<()> {
        let has_field = self.field_name.as_deref().is_some_and(|name| !name.trim().is_empty());

        if self.categorical && self.band_keyed {
            return Err(SampleError::Config(
                "categorical mode writes a single property and cannot be keyed by band".into(),
            ));
        }
        if !self.band_keyed && !has_field {
            return Err(SampleError::Config("a field name is required".into()));
        }
        if let Some(threshold) = self.rejection_threshold {
            if !threshold.is_finite() || threshold < 0.0 {
                return Err(SampleError::Config(format!(
                    "rejection threshold must be a non-negative number, got {threshold}"
                )));
            }
        }
        if self.threads == Some(0) {
            return Err(SampleError::Config("thread count must be at least 1".into()));
        }
        Ok(())
    }

    pub fn thread_count(&self) -> usize {
        self.threads.unwrap_or_else(num_cpus::get)
    }
}
