/* Per-feature sampling pipeline and its parallel driver */

use crate::{
    config::SamplingConfig,
    error::{GeometryError, Result, SampleError},
    geo::{
        extent::ExtentFilter,
        parse_geometry::PointSet,
        projection::{Crs, Reprojector},
        raster::{check_raster, RasterInfo, RasterSource},
    },
    sampling::{
        aggregate::{FeatureAggregator, DELTAS},
        sampler::BoundsSafeSampler,
    },
};
use geojson::{feature::Id, Feature, FeatureCollection, JsonObject};
use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

/// Cumulative statistics of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunStats {
    pub processed: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub skipped: usize,
    pub filtered: usize,
    /// accepted features with at least one point outside the raster
    pub recovered: usize,
    /// summed polyline length of accepted features, in raster CRS units
    pub total_length: f64,
}

impl RunStats {
    fn record(&mut self, outcome: &Outcome) {
        self.processed += 1;
        match outcome {
            Outcome::Accepted { length, recovered, .. } => {
                self.accepted += 1;
                self.recovered += usize::from(*recovered);
                self.total_length += length;
            }
            Outcome::Rejected => self.rejected += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Filtered => self.filtered += 1,
        }
    }
}

/// What happened to a single feature.
#[derive(Debug, Clone)]
pub enum Outcome {
    Accepted {
        feature: Box<Feature>,
        length: f64,
        recovered: bool,
    },
    Rejected,
    Skipped,
    Filtered,
}

// run-scoped progress counter shared by the workers
pub struct RunContext {
    processed: AtomicUsize,
    total: usize,
    interval: usize,
}

impl RunContext {
    pub fn new(total: usize, interval: usize) -> Self {
        Self {
            processed: AtomicUsize::new(0),
            total,
            interval,
        }
    }

    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::Relaxed)
    }

    fn tick(&self) {
        let n = self.processed.fetch_add(1, Ordering::Relaxed) + 1;
        if self.interval > 0 && n % self.interval == 0 {
            info!(processed = n, total = self.total, "sampling progress");
        }
    }
}

pub struct SamplingEngine<'r, R: RasterSource + ?Sized> {
    raster: &'r R,
    reprojector: Reprojector,
    config: SamplingConfig,
    extent: Option<ExtentFilter>,
}

impl<'r, R: RasterSource + ?Sized> SamplingEngine<'r, R> {
    /// Validate the configuration and resolve the projection into the raster CRS.
    pub fn new(raster: &'r R, config: SamplingConfig) -> Result<Self> {
        config.validate()?;
        let info = raster.info();
        check_raster(info)?;

        let target = resolve_raster_crs(info, config.raster_crs.as_ref())?;
        let reprojector = Reprojector::new(&config.source_crs, &target)?;

        debug!(
            source = %config.source_crs,
            target = %target,
            identity = reprojector.is_identity(),
            bands = info.nbands,
            rows = info.nrows,
            cols = info.ncols,
            "sampling engine ready"
        );

        Ok(Self {
            raster,
            reprojector,
            config,
            extent: None,
        })
    }

    pub fn with_extent_filter(mut self, filter: ExtentFilter) -> Self {
        self.extent = Some(filter);
        self
    }

    pub fn config(&self) -> &SamplingConfig {
        &self.config
    }

    /// Run the full pipeline on one feature.
    pub fn process_feature(&self, index: usize, mut feature: Feature) -> Result<Outcome> {
        let label = feature_label(&feature, index);

        let points = match parse_points(&feature) {
            Ok(points) => points,
            Err(err) => {
                warn!(feature = %label, %err, "skipping malformed feature");
                return Ok(Outcome::Skipped);
            }
        };

        if let Some(filter) = &self.extent {
            if !filter.intersects(&points) {
                debug!(feature = %label, "outside every extent box, filtered");
                return Ok(Outcome::Filtered);
            }
        }

        let projected = match self.reprojector.project(&points).and_then(PointSet::new) {
            Ok(projected) => projected,
            Err(err) => {
                warn!(feature = %label, %err, "skipping unprojectable feature");
                return Ok(Outcome::Skipped);
            }
        };

        let info = self.raster.info();
        let indices = info.transform.index_points(&projected);
        let sampled = BoundsSafeSampler::new(self.raster, self.config.clamp_negative).sample(&indices)?;

        if sampled.is_recovered() {
            warn!(
                feature = %label,
                excluded = sampled.excluded,
                points = indices.len(),
                "points outside the raster extent, sampled as zero"
            );
        }

        let aggregator = FeatureAggregator::new(&self.config, &info.band_names);
        if !aggregator.accepts(&sampled) {
            debug!(feature = %label, magnitude = sampled.magnitude(), "rejected");
            return Ok(Outcome::Rejected);
        }

        let properties = feature.properties.get_or_insert_with(JsonObject::new);
        aggregator.apply(properties, &sampled.values, &label);
        if self.config.with_deltas {
            properties.insert(DELTAS.to_string(), Value::from(projected.deltas()));
        }

        Ok(Outcome::Accepted {
            feature: Box::new(feature),
            length: projected.length(),
            recovered: sampled.is_recovered(),
        })
    }

    /// Sample every feature of the collection in parallel.
    ///
    /// The output keeps the input order and holds the accepted features only.
    pub fn run(&self, collection: FeatureCollection) -> Result<(FeatureCollection, RunStats)> {
        let FeatureCollection {
            bbox,
            features,
            foreign_members,
        } = collection;

        let ctx = RunContext::new(features.len(), self.config.progress_interval);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.thread_count())
            .build()?;

        info!(features = features.len(), threads = pool.current_num_threads(), "sampling started");

        let outcomes: Vec<Outcome> = pool.install(|| {
            features
                .into_par_iter()
                .enumerate()
                .map(|(index, feature)| {
                    let outcome = self.process_feature(index, feature);
                    ctx.tick();
                    outcome
                })
                .collect::<Result<Vec<_>>>()
        })?;

        let mut stats = RunStats::default();
        let mut accepted = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            stats.record(&outcome);
            if let Outcome::Accepted { feature, .. } = outcome {
                accepted.push(*feature);
            }
        }

        info!(
            processed = stats.processed,
            accepted = stats.accepted,
            rejected = stats.rejected,
            skipped = stats.skipped,
            filtered = stats.filtered,
            recovered = stats.recovered,
            total_length = stats.total_length,
            "sampling finished"
        );

        Ok((
            FeatureCollection {
                bbox,
                features: accepted,
                foreign_members,
            },
            stats,
        ))
    }
}

/// CRS the features are projected into: the override when given, else the raster's own.
pub fn resolve_raster_crs(info: &RasterInfo, override_crs: Option<&Crs>) -> Result<Crs> {
    override_crs
        .or(info.crs.as_ref())
        .cloned()
        .ok_or_else(|| SampleError::projection("raster", "no CRS declared by the raster and no override given"))
}

fn parse_points(feature: &Feature) -> std::result::Result<PointSet, GeometryError> {
    feature
        .geometry
        .as_ref()
        .ok_or(GeometryError::Missing)
        .and_then(|geometry| PointSet::try_from(geometry))
}

// feature id when present, position in the collection otherwise
fn feature_label(feature: &Feature, index: usize) -> String {
    match &feature.id {
        Some(Id::String(id)) => id.clone(),
        Some(Id::Number(id)) => id.to_string(),
        None => format!("#{index}"),
    }
}
