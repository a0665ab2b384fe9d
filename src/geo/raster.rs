/* Structure to contain information on raster data and windowed access to it */

use crate::{
    error::{Result, SampleError},
    geo::{projection::Crs, transform::GeoTransform},
    sampling::window::Window,
};
use ndarray::{s, Array3};

#[derive(Debug, Clone)]
pub struct RasterInfo {
    pub nrows: usize,
    pub ncols: usize,
    pub nbands: usize,
    pub transform: GeoTransform,
    pub crs: Option<Crs>,
    pub band_names: Vec<String>,
}

impl RasterInfo {
    pub fn new(nrows: usize, ncols: usize, nbands: usize, transform: GeoTransform, crs: Option<Crs>) -> Self {
        Self {
            nrows,
            ncols,
            nbands,
            transform,
            crs,
            band_names: default_band_names(nbands),
        }
    }

    // descriptions that are missing or blank fall back to `band_<n>`
    pub fn with_band_names(mut self, names: Vec<String>) -> Self {
        for (i, name) in names.into_iter().enumerate().take(self.nbands) {
            if !name.trim().is_empty() {
                self.band_names[i] = name;
            }
        }
        self
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (self.nbands, self.nrows, self.ncols)
    }
}

pub fn default_band_names(nbands: usize) -> Vec<String> {
    (1..=nbands).map(|i| format!("band_{i}")).collect()
}

/// Read-only raster dataset with banded windowed reads.
///
/// `read_window` clips the window to the raster extent and returns the clipped
/// block as `(bands, rows, cols)` in `f64`, whatever the storage type. Every call is
/// independent so one source can serve concurrent readers.
pub trait RasterSource: Sync {
    fn info(&self) -> &RasterInfo;

    fn read_window(&self, window: &Window) -> Result<Array3<f64>>;
}

impl<R: RasterSource + ?Sized> RasterSource for &R {
    fn info(&self) -> &RasterInfo {
        (**self).info()
    }

    fn read_window(&self, window: &Window) -> Result<Array3<f64>> {
        (**self).read_window(window)
    }
}

/// Raster held entirely in memory.
#[derive(Debug, Clone)]
pub struct InMemoryRaster {
    info: RasterInfo,
    data: Array3<f64>,
}

impl InMemoryRaster {
    /// `data` is laid out as `(bands, rows, cols)`.
    pub fn new(data: Array3<f64>, transform: GeoTransform, crs: Option<Crs>) -> Self {
        let (nbands, nrows, ncols) = data.dim();
        Self {
            info: RasterInfo::new(nrows, ncols, nbands, transform, crs),
            data,
        }
    }

    pub fn with_band_names(mut self, names: Vec<String>) -> Self {
        self.info = self.info.with_band_names(names);
        self
    }

    pub fn data(&self) -> &Array3<f64> {
        &self.data
    }
}

impl RasterSource for InMemoryRaster {
    fn info(&self) -> &RasterInfo {
        &self.info
    }

    fn read_window(&self, window: &Window) -> Result<Array3<f64>> {
        let (nbands, nrows, ncols) = self.info.shape();
        let Some(clipped) = window.clip(nrows, ncols) else {
            return Ok(Array3::zeros((nbands, 0, 0)));
        };

        let r0 = clipped.row_off as usize;
        let c0 = clipped.col_off as usize;
        Ok(self
            .data
            .slice(s![.., r0..r0 + clipped.height, c0..c0 + clipped.width])
            .to_owned())
    }
}

// raster dimensions must be usable before any sampling happens
pub fn check_raster(info: &RasterInfo) -> Result<()> {
    if info.nrows == 0 || info.ncols == 0 || info.nbands == 0 {
        return Err(SampleError::Config(format!(
            "raster has an empty grid: {} band(s) of {}x{} pixels",
            info.nbands, info.nrows, info.ncols
        )));
    }
    Ok(())
}
