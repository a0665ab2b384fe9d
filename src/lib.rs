/*
Sample raster values along point and line features.
Features are reprojected into the raster CRS, indexed into the pixel grid and sampled
over the smallest window covering them. Points falling outside the raster read as zero.
 */

pub mod config;
pub mod error;
pub mod logging;
pub mod prelude;

pub mod geo {
    pub mod extent;
    pub mod parse_geometry;
    pub mod projection;
    pub mod raster;
    pub mod transform;
}
pub mod io {
    pub mod geotiff;
}
pub mod encoding {
    pub mod features;
}
pub mod sampling {
    pub mod aggregate;
    pub mod engine;
    pub mod sampler;
    pub mod window;
}

#[cfg(feature = "python")]
mod python;

pub use crate::{
    config::{AggregationMode, SamplingConfig},
    error::{GeometryError, Result, SampleError},
    geo::{
        extent::ExtentFilter,
        parse_geometry::PointSet,
        projection::{Crs, Reprojector, WGS84},
        raster::{InMemoryRaster, RasterInfo, RasterSource},
        transform::GeoTransform,
    },
    io::geotiff::GeoTiffRaster,
    sampling::{
        engine::{Outcome, RunStats, SamplingEngine},
        sampler::{BoundsSafeSampler, Sampled},
        window::{plan_window, PixelIndex, Window, WindowPlan},
    },
};

use geojson::FeatureCollection;

/// Sample `raster` along every feature of `collection` and write the values into
/// the feature properties. Returns the accepted features in input order.
pub fn assign_field_from_raster<R>(
    collection: FeatureCollection,
    raster: &R,
    config: SamplingConfig,
) -> Result<(FeatureCollection, RunStats)>
where
    R: RasterSource + ?Sized,
{
    SamplingEngine::new(raster, config)?.run(collection)
}
