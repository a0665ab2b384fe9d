/* Python bindings */

use crate::{
    config::SamplingConfig,
    encoding::features::parse_feature_collection,
    error::{Result, SampleError},
    geo::{projection::{Crs, Reprojector, WGS84}, raster::RasterSource},
    io::geotiff::GeoTiffRaster,
    sampling::{
        engine::{resolve_raster_crs, SamplingEngine},
        sampler::BoundsSafeSampler,
    },
};
use geo_types::Coord;
use numpy::{ndarray::Array2, IntoPyArray, PyArray2};
use pyo3::{
    exceptions::{PyIOError, PyRuntimeError, PyValueError},
    prelude::*,
};
use std::path::PathBuf;

impl From<SampleError> for PyErr {
    fn from(err: SampleError) -> PyErr {
        let msg = err.to_string();
        match err {
            SampleError::Config(_) | SampleError::Projection { .. } | SampleError::Geometry(_) => {
                PyValueError::new_err(msg)
            }
            SampleError::GeoJson(_) | SampleError::Json(_) => PyValueError::new_err(msg),
            SampleError::Io(_) | SampleError::RasterIo { .. } => PyIOError::new_err(msg),
            _ => PyRuntimeError::new_err(msg),
        }
    }
}

fn parse_crs(crs: Option<&str>) -> Result<Option<Crs>> {
    crs.map(str::parse::<Crs>).transpose()
}

fn assign_field_rust(geojson: String, raster_path: PathBuf, config: SamplingConfig) -> Result<String> {
    let collection = parse_feature_collection(&geojson)?;
    let raster = GeoTiffRaster::open(&raster_path)?;
    let (output, _) = SamplingEngine::new(&raster, config)?.run(collection)?;
    Ok(serde_json::to_string(&output)?)
}

fn sample_rust(
    raster_path: PathBuf,
    coords: Vec<(f64, f64)>,
    source_crs: Crs,
    raster_crs: Option<Crs>,
    clamp_negative: bool,
) -> Result<Array2<f64>> {
    let raster = GeoTiffRaster::open(&raster_path)?;
    let info = raster.info();
    let target = resolve_raster_crs(info, raster_crs.as_ref())?;

    let coords: Vec<Coord<f64>> = coords.into_iter().map(|(x, y)| Coord { x, y }).collect();
    let projected = Reprojector::new(&source_crs, &target)?.project(&coords)?;
    let indices = info.transform.index_points(&projected);

    Ok(BoundsSafeSampler::new(&raster, clamp_negative).sample(&indices)?.values)
}

#[pyfunction]
#[pyo3(
    name = "_assign_field",
    signature = (
        geojson,
        raster_path,
        field_name = None,
        categorical = false,
        clamp_negative = false,
        rejection_threshold = None,
        band_keyed = false,
        with_deltas = false,
        source_crs = None,
        raster_crs = None,
        threads = None
    )
)]
#[allow(clippy::too_many_arguments)]
fn assign_field_py(
    py: Python<'_>,
    geojson: String,
    raster_path: PathBuf,
    field_name: Option<String>,
    categorical: bool,
    clamp_negative: bool,
    rejection_threshold: Option<f64>,
    band_keyed: bool,
    with_deltas: bool,
    source_crs: Option<&str>,
    raster_crs: Option<&str>,
    threads: Option<usize>,
) -> PyResult<String> {
    let config = SamplingConfig {
        field_name,
        categorical,
        clamp_negative,
        rejection_threshold,
        band_keyed,
        with_deltas,
        source_crs: parse_crs(source_crs)?.unwrap_or(WGS84),
        raster_crs: parse_crs(raster_crs)?,
        threads,
        ..Default::default()
    };

    let output = py.allow_threads(|| assign_field_rust(geojson, raster_path, config))?;
    Ok(output)
}

#[pyfunction]
#[pyo3(
    name = "_sample",
    signature = (raster_path, coords, source_crs = None, raster_crs = None, clamp_negative = false)
)]
fn sample_py<'py>(
    py: Python<'py>,
    raster_path: PathBuf,
    coords: Vec<(f64, f64)>,
    source_crs: Option<&str>,
    raster_crs: Option<&str>,
    clamp_negative: bool,
) -> PyResult<Bound<'py, PyArray2<f64>>> {
    let source_crs = parse_crs(source_crs)?.unwrap_or(WGS84);
    let raster_crs = parse_crs(raster_crs)?;

    let values = py.allow_threads(|| sample_rust(raster_path, coords, source_crs, raster_crs, clamp_negative))?;
    Ok(values.into_pyarray(py))
}

#[pymodule]
fn rusterfield(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(assign_field_py, m)?)?;
    m.add_function(wrap_pyfunction!(sample_py, m)?)?;
    Ok(())
}
