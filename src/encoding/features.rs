/* Read and write GeoJSON feature collections */

use crate::error::{Result, SampleError};
use geojson::{FeatureCollection, GeoJson};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Parse a GeoJSON document into a feature collection.
///
/// A lone feature becomes a collection of one. Bare geometries are refused.
pub fn parse_feature_collection(text: &str) -> Result<FeatureCollection> {
    into_collection(text.parse::<GeoJson>()?)
}

pub fn read_feature_collection(path: impl AsRef<Path>) -> Result<FeatureCollection> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    into_collection(GeoJson::from_reader(reader)?)
}

pub fn write_feature_collection(path: impl AsRef<Path>, collection: &FeatureCollection) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    serde_json::to_writer(&mut writer, collection)?;
    writer.flush()?;
    Ok(())
}

fn into_collection(geojson: GeoJson) -> Result<FeatureCollection> {
    match geojson {
        GeoJson::FeatureCollection(collection) => Ok(collection),
        GeoJson::Feature(feature) => Ok(FeatureCollection {
            bbox: None,
            features: vec![feature],
            foreign_members: None,
        }),
        GeoJson::Geometry(_) => Err(SampleError::Config(
            "expected a FeatureCollection or a Feature, got a bare geometry".into(),
        )),
    }
}
