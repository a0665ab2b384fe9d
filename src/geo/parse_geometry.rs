/*
Turn GeoJSON geometries into ordered point sets.
Only coordinate sequences are sampled: Point, MultiPoint and LineString.
 */

use crate::error::GeometryError;
use geo_types::{Coord, LineString};
use geojson::Value;
use std::ops::Deref;

#[derive(Debug, Clone, PartialEq)]
pub struct PointSet(pub Vec<Coord<f64>>);

impl PointSet {
    pub fn new(coords: Vec<Coord<f64>>) -> std::result::Result<Self, GeometryError> {
        if coords.is_empty() {
            return Err(GeometryError::Empty);
        }
        Ok(Self(coords))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Distances between consecutive points, `len() - 1` values.
    pub fn deltas(&self) -> Vec<f64> {
        LineString::new(self.0.clone())
            .lines()
            .map(|line| line.dx().hypot(line.dy()))
            .collect()
    }

    pub fn length(&self) -> f64 {
        self.deltas().iter().sum()
    }
}

impl Deref for PointSet {
    type Target = [Coord<f64>];

    fn deref(&self) -> &Self::Target {
        self.0.as_slice()
    }
}

impl<'a> IntoIterator for &'a PointSet {
    type Item = &'a Coord<f64>;
    type IntoIter = std::slice::Iter<'a, Coord<f64>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl TryFrom<&geojson::Geometry> for PointSet {
    type Error = GeometryError;

    fn try_from(geometry: &geojson::Geometry) -> std::result::Result<Self, Self::Error> {
        match &geometry.value {
            Value::Point(position) => PointSet::new(vec![to_coord(0, position)?]),
            Value::MultiPoint(positions) | Value::LineString(positions) => {
                let coords = positions
                    .iter()
                    .enumerate()
                    .map(|(i, p)| to_coord(i, p))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                PointSet::new(coords)
            }
            other => Err(GeometryError::Unsupported(geometry_type(other).to_string())),
        }
    }
}

fn geometry_type(value: &Value) -> &'static str {
    match value {
        Value::Point(_) => "Point",
        Value::MultiPoint(_) => "MultiPoint",
        Value::LineString(_) => "LineString",
        Value::MultiLineString(_) => "MultiLineString",
        Value::Polygon(_) => "Polygon",
        Value::MultiPolygon(_) => "MultiPolygon",
        Value::GeometryCollection(_) => "GeometryCollection",
    }
}

// extra components (elevation, measure) are ignored
fn to_coord(index: usize, position: &[f64]) -> std::result::Result<Coord<f64>, GeometryError> {
    match position {
        [x, y, ..] => Ok(Coord { x: *x, y: *y }),
        _ => Err(GeometryError::ShortPosition {
            index,
            len: position.len(),
        }),
    }
}
