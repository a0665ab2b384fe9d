/* Bounding boxes of regions of interest, used to skip features before sampling */

use crate::{error::Result, geo::parse_geometry::PointSet};
use geo::{BoundingRect, Intersects};
use geo_types::{Geometry, LineString, Rect};
use geojson::FeatureCollection;
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct ExtentFilter {
    boxes: Vec<Rect<f64>>,
}

impl ExtentFilter {
    pub fn new(boxes: Vec<Rect<f64>>) -> Self {
        Self { boxes }
    }

    /// One bounding box per feature geometry of the collection.
    pub fn from_features(collection: &FeatureCollection) -> Result<Self> {
        let mut boxes = Vec::with_capacity(collection.features.len());
        for (i, feature) in collection.features.iter().enumerate() {
            let Some(geometry) = &feature.geometry else {
                warn!(feature = i, "extent feature has no geometry, ignored");
                continue;
            };

            let geometry: Geometry<f64> = geometry.value.clone().try_into()?;
            match geometry.bounding_rect() {
                Some(rect) => boxes.push(rect),
                None => warn!(feature = i, "extent feature is empty, ignored"),
            }
        }
        Ok(Self { boxes })
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Whether the point sequence touches any of the boxes.
    pub fn intersects(&self, points: &PointSet) -> bool {
        if points.len() == 1 {
            let coord = points[0];
            return self.boxes.iter().any(|rect| rect.intersects(&coord));
        }

        let line = LineString::new(points.0.clone());
        self.boxes.iter().any(|rect| line.intersects(rect))
    }
}
