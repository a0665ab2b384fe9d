/*
Extract pixel values at a sequence of pixel indices.
Points outside the raster grid are excluded before reading and come back as zeros,
so the result always has one column per input point.
 */

use crate::{
    error::{Result, SampleError},
    geo::raster::RasterSource,
    sampling::window::{plan_window, PixelIndex, WindowPlan},
};
use ndarray::{Array2, Array3};

/// Values of every band at every point, shaped `(bands, points)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Sampled {
    pub values: Array2<f64>,
    /// Points that fell outside the raster and were zero-filled.
    pub excluded: usize,
}

impl Sampled {
    pub fn is_recovered(&self) -> bool {
        self.excluded > 0
    }

    /// Sum of absolute values over all bands and points.
    pub fn magnitude(&self) -> f64 {
        self.values.iter().map(|v| v.abs()).sum()
    }
}

pub struct BoundsSafeSampler<'a, R: RasterSource + ?Sized> {
    raster: &'a R,
    clamp_negative: bool,
}

impl<'a, R: RasterSource + ?Sized> BoundsSafeSampler<'a, R> {
    pub fn new(raster: &'a R, clamp_negative: bool) -> Self {
        Self { raster, clamp_negative }
    }

    pub fn sample(&self, indices: &[PixelIndex]) -> Result<Sampled> {
        let info = self.raster.info();
        let contained: Vec<bool> = indices.iter().map(|idx| idx.is_inside(info.nrows, info.ncols)).collect();
        let excluded = contained.iter().filter(|inside| !**inside).count();

        // common case: a single read over the full window
        if excluded == 0 {
            let values = match plan_window(indices) {
                Some(plan) => self.read_plan(&plan)?,
                None => Array2::zeros((info.nbands, 0)),
            };
            return Ok(Sampled { values, excluded });
        }

        // re-plan over the contained points only, the rest stays zero
        let mut values = Array2::zeros((info.nbands, indices.len()));
        let inside: Vec<PixelIndex> = indices
            .iter()
            .zip(&contained)
            .filter_map(|(idx, inside)| inside.then_some(*idx))
            .collect();

        if let Some(plan) = plan_window(&inside) {
            let partial = self.read_plan(&plan)?;
            let positions = contained.iter().enumerate().filter_map(|(i, inside)| inside.then_some(i));
            for (column, position) in positions.enumerate() {
                values.column_mut(position).assign(&partial.column(column));
            }
        }

        Ok(Sampled { values, excluded })
    }

    fn read_plan(&self, plan: &WindowPlan) -> Result<Array2<f64>> {
        let nbands = self.raster.info().nbands;
        let mut block: Array3<f64> = self.raster.read_window(&plan.window)?;

        let expected = (nbands, plan.window.height, plan.window.width);
        if block.dim() != expected {
            return Err(SampleError::ShortRead {
                window: plan.window.to_string(),
                got: block.dim(),
                expected,
            });
        }

        if self.clamp_negative {
            block.mapv_inplace(|v| if v < 0.0 { 0.0 } else { v });
        }

        Ok(Array2::from_shape_fn((nbands, plan.local.len()), |(b, p)| {
            let (row, col) = plan.local[p];
            block[[b, row, col]]
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        geo::{raster::InMemoryRaster, transform::GeoTransform},
        sampling::window::Window,
    };
    use ndarray::{array, Array};

    fn ramp(nbands: usize) -> InMemoryRaster {
        let data = Array::from_shape_fn((nbands, 3, 3), |(b, r, c)| (b * 100 + r * 10 + c) as f64 + 1.0);
        InMemoryRaster::new(data, GeoTransform::north_up(0.0, 3.0, 1.0, 1.0).unwrap(), None)
    }

    fn idx(pairs: &[(isize, isize)]) -> Vec<PixelIndex> {
        pairs.iter().map(|&(r, c)| PixelIndex::new(r, c)).collect()
    }

    #[test]
    fn inside_points_match_direct_indexing() {
        let raster = ramp(2);
        let points = idx(&[(0, 0), (2, 1), (1, 2), (2, 1)]);
        let sampled = BoundsSafeSampler::new(&raster, false).sample(&points).unwrap();

        assert!(!sampled.is_recovered());
        for (p, point) in points.iter().enumerate() {
            for b in 0..2 {
                let direct = raster.data()[[b, point.row as usize, point.col as usize]];
                assert_eq!(sampled.values[[b, p]], direct);
            }
        }
    }

    #[test]
    fn partially_outside_points_are_zero_filled_in_place() {
        let raster = ramp(2);
        let points = idx(&[(1, 1), (0, -1), (2, 2), (5, 0)]);
        let sampled = BoundsSafeSampler::new(&raster, false).sample(&points).unwrap();

        assert_eq!(sampled.excluded, 2);
        assert_eq!(sampled.values, array![[12.0, 0.0, 23.0, 0.0], [112.0, 0.0, 123.0, 0.0]]);
    }

    #[test]
    fn entirely_outside_points_are_all_zero() {
        let raster = ramp(3);
        let points = idx(&[(-1, -1), (3, 3), (0, 7)]);
        let sampled = BoundsSafeSampler::new(&raster, false).sample(&points).unwrap();

        assert_eq!(sampled.values.dim(), (3, 3));
        assert!(sampled.values.iter().all(|v| *v == 0.0));
        assert_eq!(sampled.magnitude(), 0.0);
    }

    #[test]
    fn clamp_applies_to_primary_and_recovery_reads() {
        let data = array![[[-2.0, 4.0], [-0.5, 1.5]]];
        let raster = InMemoryRaster::new(data, GeoTransform::north_up(0.0, 2.0, 1.0, 1.0).unwrap(), None);

        let inside = idx(&[(0, 0), (1, 1)]);
        let clamped = BoundsSafeSampler::new(&raster, true).sample(&inside).unwrap();
        assert_eq!(clamped.values, array![[0.0, 1.5]]);

        let straddling = idx(&[(1, 0), (-1, 0), (0, 1)]);
        let clamped = BoundsSafeSampler::new(&raster, true).sample(&straddling).unwrap();
        assert_eq!(clamped.values, array![[0.0, 0.0, 4.0]]);

        let raw = BoundsSafeSampler::new(&raster, false).sample(&straddling).unwrap();
        assert_eq!(raw.values, array![[-0.5, 0.0, 4.0]]);
    }

    #[test]
    fn result_always_aligned_with_points() {
        let raster = ramp(1);
        for points in [
            idx(&[(0, 0)]),
            idx(&[(9, 9)]),
            idx(&[(0, 0), (0, 3), (3, 0), (2, 2), (-4, 1)]),
        ] {
            let sampled = BoundsSafeSampler::new(&raster, false).sample(&points).unwrap();
            assert_eq!(sampled.values.ncols(), points.len());
            assert_eq!(sampled.values.nrows(), 1);
        }
    }

    struct ShortReader(InMemoryRaster);

    impl RasterSource for ShortReader {
        fn info(&self) -> &crate::geo::raster::RasterInfo {
            self.0.info()
        }

        fn read_window(&self, _window: &Window) -> Result<Array3<f64>> {
            Ok(Array3::zeros((1, 1, 1)))
        }
    }

    #[test]
    fn short_read_is_an_error() {
        let raster = ShortReader(ramp(1));
        let err = BoundsSafeSampler::new(&raster, false)
            .sample(&idx(&[(0, 0), (2, 2)]))
            .unwrap_err();
        assert!(matches!(err, SampleError::ShortRead { .. }));
    }
}
