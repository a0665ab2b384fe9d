/* Error taxonomy of a sampling run */

use std::path::PathBuf;
use thiserror::Error;

// fatal conditions, a run returning one of these produced no output
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("cannot resolve coordinate reference system `{crs}`: {reason}")]
    Projection { crs: String, reason: String },

    #[error("cannot read raster {}: {source}", path.display())]
    RasterIo {
        path: PathBuf,
        #[source]
        source: tiff::TiffError,
    },

    #[error("unsupported raster {}: {reason}", path.display())]
    RasterFormat { path: PathBuf, reason: String },

    #[error("raster read over {window} returned shape {got:?}, expected {expected:?}")]
    ShortRead {
        window: String,
        got: (usize, usize, usize),
        expected: (usize, usize, usize),
    },

    #[error("invalid geometry: {0}")]
    Geometry(#[from] GeometryError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid GeoJSON input: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("cannot serialize features: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("cannot build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl SampleError {
    pub fn projection(crs: impl Into<String>, reason: impl ToString) -> Self {
        SampleError::Projection {
            crs: crs.into(),
            reason: reason.to_string(),
        }
    }

    pub fn raster_format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        SampleError::RasterFormat {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SampleError>;

// local conditions, the offending feature is skipped and the run goes on
#[derive(Debug, Error, PartialEq)]
pub enum GeometryError {
    #[error("feature has no geometry")]
    Missing,

    #[error("geometry has no coordinates")]
    Empty,

    #[error("unsupported geometry type {0}, expected Point, MultiPoint or LineString")]
    Unsupported(String),

    #[error("coordinate {index} has {len} component(s), expected at least 2")]
    ShortPosition { index: usize, len: usize },

    #[error("cannot project coordinate {index} ({x}, {y}): {reason}")]
    Unprojectable { index: usize, x: f64, y: f64, reason: String },
}
