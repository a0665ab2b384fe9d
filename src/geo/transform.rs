/* Affine transform between pixel grid and projected coordinates */

use crate::sampling::window::PixelIndex;
use geo_types::Coord;

const SINGULAR_EPSILON: f64 = 1e-12;

/// Affine coefficients in GDAL order.
///
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// North-up rasters have zero rotations and a negative `pixel_height`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub pixel_width: f64,
    pub row_rotation: f64,
    pub origin_y: f64,
    pub col_rotation: f64,
    pub pixel_height: f64,
    det: f64,
}

impl GeoTransform {
    /// Build from `[origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height]`.
    ///
    /// Returns `None` for a singular transform, which cannot be inverted.
    pub fn from_gdal(coeffs: [f64; 6]) -> Option<Self> {
        let det = coeffs[1] * coeffs[5] - coeffs[2] * coeffs[4];
        if !det.is_finite() || det.abs() < SINGULAR_EPSILON {
            return None;
        }

        Some(Self {
            origin_x: coeffs[0],
            pixel_width: coeffs[1],
            row_rotation: coeffs[2],
            origin_y: coeffs[3],
            col_rotation: coeffs[4],
            pixel_height: coeffs[5],
            det,
        })
    }

    /// North-up transform anchored at the upper-left corner.
    pub fn north_up(xmin: f64, ymax: f64, xres: f64, yres: f64) -> Option<Self> {
        Self::from_gdal([xmin, xres, 0.0, ymax, 0.0, -yres.abs()])
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.col_rotation,
            self.pixel_height,
        ]
    }

    // upper-left corner of a pixel
    pub fn pixel_to_geo(&self, row: f64, col: f64) -> Coord<f64> {
        Coord {
            x: self.origin_x + col * self.pixel_width + row * self.row_rotation,
            y: self.origin_y + col * self.col_rotation + row * self.pixel_height,
        }
    }

    /// Fractional `(row, col)` of a projected coordinate.
    #[inline]
    pub fn geo_to_pixel(&self, coord: Coord<f64>) -> (f64, f64) {
        let dx = coord.x - self.origin_x;
        let dy = coord.y - self.origin_y;

        let col = (self.pixel_height * dx - self.row_rotation * dy) / self.det;
        let row = (-self.col_rotation * dx + self.pixel_width * dy) / self.det;

        (row, col)
    }

    /// Integer pixel holding the coordinate. May lie outside the grid.
    #[inline]
    pub fn rowcol(&self, coord: Coord<f64>) -> PixelIndex {
        let (row, col) = self.geo_to_pixel(coord);
        PixelIndex::new(row.floor() as isize, col.floor() as isize)
    }

    /// Index every coordinate of a projected point set, keeping order.
    pub fn index_points(&self, coords: &[Coord<f64>]) -> Vec<PixelIndex> {
        coords.iter().map(|&c| self.rowcol(c)).collect()
    }

    /// `(xmin, ymin, xmax, ymax)` covered by a grid of the given shape.
    pub fn bounds(&self, nrows: usize, ncols: usize) -> (f64, f64, f64, f64) {
        let (nrows, ncols) = (nrows as f64, ncols as f64);
        let corners = [
            self.pixel_to_geo(0.0, 0.0),
            self.pixel_to_geo(0.0, ncols),
            self.pixel_to_geo(nrows, 0.0),
            self.pixel_to_geo(nrows, ncols),
        ];

        corners.iter().fold(
            (f64::MAX, f64::MAX, f64::MIN, f64::MIN),
            |(xmin, ymin, xmax, ymax), c| (xmin.min(c.x), ymin.min(c.y), xmax.max(c.x), ymax.max(c.y)),
        )
    }
}
