/* Write sampled values into feature properties */

use crate::{
    config::{AggregationMode, SamplingConfig},
    sampling::sampler::Sampled,
};
use geojson::JsonObject;
use ndarray::{Array2, ArrayView1};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

pub const SPATIAL_FIELDS: &str = "spatial_fields";
pub const DELTAS: &str = "deltas";

// round half to even at 3 decimals, like numpy.round
#[inline]
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round_ties_even() / 1000.0
}

/// Most frequent non-negative integer code, ties going to the smallest code.
///
/// Values are truncated to integers; negative and NaN values do not vote.
pub fn majority_code(values: ArrayView1<f64>) -> Option<u64> {
    let mut counts: BTreeMap<u64, usize> = BTreeMap::new();
    for &v in values.iter() {
        if v.is_finite() && v >= 0.0 {
            *counts.entry(v as u64).or_default() += 1;
        }
    }

    // ascending codes, replace only on a strictly higher count
    counts
        .into_iter()
        .fold(None, |best: Option<(u64, usize)>, (code, n)| match best {
            Some((_, m)) if m >= n => best,
            _ => Some((code, n)),
        })
        .map(|(code, _)| code)
}

pub struct FeatureAggregator<'a> {
    config: &'a SamplingConfig,
    band_names: &'a [String],
}

impl<'a> FeatureAggregator<'a> {
    pub fn new(config: &'a SamplingConfig, band_names: &'a [String]) -> Self {
        Self { config, band_names }
    }

    /// Rejection predicate. Always passes when no threshold is configured.
    pub fn accepts(&self, sampled: &Sampled) -> bool {
        match self.config.rejection_threshold {
            Some(threshold) => sampled.magnitude() > threshold,
            None => true,
        }
    }

    pub fn apply(&self, properties: &mut JsonObject, values: &Array2<f64>, feature: &str) {
        match self.config.mode() {
            AggregationMode::List => self.write_lists(properties, values, feature),
            AggregationMode::Categorical => self.write_category(properties, values, feature),
        }
    }

    fn write_lists(&self, properties: &mut JsonObject, values: &Array2<f64>, feature: &str) {
        let mut fields = match properties.remove(SPATIAL_FIELDS) {
            Some(Value::Object(map)) => map,
            Some(other) => {
                warn!(feature, found = %other, "`{SPATIAL_FIELDS}` is not an object, replaced");
                JsonObject::new()
            }
            None => JsonObject::new(),
        };

        let bands: Vec<Vec<Value>> = values
            .outer_iter()
            .map(|band| band.iter().map(|v| Value::from(round3(*v))).collect())
            .collect();

        if self.config.band_keyed {
            for (name, band) in self.band_names.iter().zip(bands) {
                append_flat(&mut fields, name, band, feature);
            }
        } else {
            let name = self.config.field_name.as_deref().unwrap_or_default();
            match <[Vec<Value>; 1]>::try_from(bands) {
                Ok([band]) => append_flat(&mut fields, name, band, feature),
                Err(bands) => append_nested(&mut fields, name, bands, feature),
            }
        }

        properties.insert(SPATIAL_FIELDS.to_string(), Value::Object(fields));
    }

    fn write_category(&self, properties: &mut JsonObject, values: &Array2<f64>, feature: &str) {
        let name = self.config.field_name.clone().unwrap_or_default();
        let code = if values.nrows() > 0 {
            majority_code(values.row(0))
        } else {
            None
        };

        match code {
            Some(code) => {
                properties.insert(name, Value::from(code));
            }
            None => {
                warn!(feature, field = %name, "no valid category code sampled, writing null");
                properties.insert(name, Value::Null);
            }
        }
    }
}

// single list of per-point values, appended after any existing values
fn append_flat(fields: &mut JsonObject, name: &str, band: Vec<Value>, feature: &str) {
    let merged = match fields.remove(name) {
        Some(Value::Array(mut existing)) => {
            existing.extend(band);
            existing
        }
        Some(other) => {
            warn!(feature, field = name, found = %other, "existing field is not a list, replaced");
            band
        }
        None => band,
    };
    fields.insert(name.to_string(), Value::Array(merged));
}

// one list per band, each band appended to its own existing list
fn append_nested(fields: &mut JsonObject, name: &str, bands: Vec<Vec<Value>>, feature: &str) {
    let fresh = || Value::Array(bands.iter().cloned().map(Value::Array).collect());

    let merged = match fields.remove(name) {
        Some(Value::Array(existing))
            if existing.len() == bands.len() && existing.iter().all(Value::is_array) =>
        {
            let merged = existing
                .into_iter()
                .zip(bands.iter().cloned())
                .map(|(old, new)| match old {
                    Value::Array(mut old) => {
                        old.extend(new);
                        Value::Array(old)
                    }
                    other => other,
                })
                .collect();
            Value::Array(merged)
        }
        Some(other) => {
            warn!(
                feature,
                field = name,
                bands = bands.len(),
                found = %other,
                "existing field does not hold one list per band, replaced"
            );
            fresh()
        }
        None => fresh(),
    };
    fields.insert(name.to_string(), merged);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use serde_json::json;

    fn props(value: Value) -> JsonObject {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn band_names(n: usize) -> Vec<String> {
        crate::geo::raster::default_band_names(n)
    }

    #[test]
    fn rounding_is_half_to_even() {
        assert_eq!(round3(1.23449), 1.234);
        assert_eq!(round3(0.0625), 0.062);
        assert_eq!(round3(0.1875), 0.188);
        assert_eq!(round3(-2.71828), -2.718);
        assert_eq!(round3(5.0), 5.0);
    }

    #[test]
    fn majority_with_ties_to_smallest_code() {
        assert_eq!(majority_code(array![3.0, 3.0, 3.0, 7.0, 7.0].view()), Some(3));
        assert_eq!(majority_code(array![7.0, 7.0, 3.0, 3.0].view()), Some(3));
        assert_eq!(majority_code(array![9.0, 2.0, 9.0, 2.0, 5.0].view()), Some(2));
        assert_eq!(majority_code(array![4.9, 4.1, 1.0].view()), Some(4));
        assert_eq!(majority_code(array![-1.0, f64::NAN].view()), None);
    }

    #[test]
    fn single_band_list_is_flat_and_rounded() {
        let config = SamplingConfig::list("depth");
        let names = band_names(1);
        let mut properties = JsonObject::new();

        FeatureAggregator::new(&config, &names).apply(&mut properties, &array![[1.23456, 0.0]], "f");
        assert_eq!(Value::Object(properties), json!({"spatial_fields": {"depth": [1.235, 0.0]}}));
    }

    #[test]
    fn append_is_order_preserving_and_idempotent() {
        let config = SamplingConfig::list("depth");
        let names = band_names(1);
        let aggregator = FeatureAggregator::new(&config, &names);
        let values = array![[0.5, 1.5, 2.5]];

        let mut once = props(json!({"name": "road", "spatial_fields": {}}));
        aggregator.apply(&mut once, &values, "f");
        let mut twice = once.clone();
        aggregator.apply(&mut twice, &values, "f");

        let first = once["spatial_fields"]["depth"].as_array().unwrap().clone();
        let both = twice["spatial_fields"]["depth"].as_array().unwrap().clone();
        assert_eq!(both.len(), 2 * first.len());
        assert_eq!(both[..first.len()], first[..]);
        assert_eq!(both[first.len()..], first[..]);
        assert_eq!(twice["name"], json!("road"));
    }

    #[test]
    fn multi_band_lists_are_appended_band_wise() {
        let config = SamplingConfig::list("flood");
        let names = band_names(2);
        let aggregator = FeatureAggregator::new(&config, &names);

        let mut properties = JsonObject::new();
        aggregator.apply(&mut properties, &array![[1.0, 2.0], [10.0, 20.0]], "f");
        assert_eq!(properties["spatial_fields"]["flood"], json!([[1.0, 2.0], [10.0, 20.0]]));

        aggregator.apply(&mut properties, &array![[3.0, 4.0], [30.0, 40.0]], "f");
        assert_eq!(
            properties["spatial_fields"]["flood"],
            json!([[1.0, 2.0, 3.0, 4.0], [10.0, 20.0, 30.0, 40.0]])
        );
    }

    #[test]
    fn incompatible_existing_values_are_replaced() {
        let config = SamplingConfig::list("flood");
        let names = band_names(2);
        let mut properties = props(json!({"spatial_fields": {"flood": [1.0, 2.0, 3.0]}}));

        FeatureAggregator::new(&config, &names).apply(&mut properties, &array![[1.0], [2.0]], "f");
        assert_eq!(properties["spatial_fields"]["flood"], json!([[1.0], [2.0]]));

        let config = SamplingConfig::list("depth");
        let names = band_names(1);
        let mut properties = props(json!({"spatial_fields": "oops"}));
        FeatureAggregator::new(&config, &names).apply(&mut properties, &array![[7.0]], "f");
        assert_eq!(properties["spatial_fields"], json!({"depth": [7.0]}));
    }

    #[test]
    fn band_keyed_lists() {
        let config = SamplingConfig {
            band_keyed: true,
            ..Default::default()
        };
        let names = vec!["depth".to_string(), "velocity".to_string()];
        let mut properties = props(json!({"spatial_fields": {"depth": [9.0]}}));

        FeatureAggregator::new(&config, &names).apply(&mut properties, &array![[1.0, 2.0], [0.25, 0.5]], "f");
        assert_eq!(
            properties["spatial_fields"],
            json!({"depth": [9.0, 1.0, 2.0], "velocity": [0.25, 0.5]})
        );
    }

    #[test]
    fn categorical_writes_scalar_from_first_band() {
        let config = SamplingConfig::categorical("landuse");
        let names = band_names(2);
        let mut properties = JsonObject::new();

        FeatureAggregator::new(&config, &names).apply(
            &mut properties,
            &array![[2.0, 2.0, 2.0, 5.0, 5.0], [5.0, 5.0, 5.0, 5.0, 5.0]],
            "f",
        );
        assert_eq!(Value::Object(properties), json!({"landuse": 2}));
    }

    #[test]
    fn categorical_without_votes_is_null() {
        let config = SamplingConfig::categorical("landuse");
        let names = band_names(1);
        let mut properties = JsonObject::new();

        FeatureAggregator::new(&config, &names).apply(&mut properties, &array![[-9999.0]], "f");
        assert_eq!(properties["landuse"], Value::Null);
    }

    #[test]
    fn rejection_threshold() {
        let sampled = |values: Array2<f64>| Sampled { values, excluded: 0 };
        let names = band_names(1);

        let none = SamplingConfig::list("depth");
        assert!(FeatureAggregator::new(&none, &names).accepts(&sampled(array![[0.0, 0.0]])));

        let strict = SamplingConfig {
            rejection_threshold: Some(0.0),
            ..SamplingConfig::list("depth")
        };
        let aggregator = FeatureAggregator::new(&strict, &names);
        assert!(!aggregator.accepts(&sampled(array![[0.0, 0.0]])));
        assert!(aggregator.accepts(&sampled(array![[0.0, -0.1]])));

        let loose = SamplingConfig {
            rejection_threshold: Some(1.0),
            ..SamplingConfig::list("depth")
        };
        assert!(!FeatureAggregator::new(&loose, &names).accepts(&sampled(array![[0.5, 0.5]])));
    }
}
