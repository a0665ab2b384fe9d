use geojson::{feature::Id, Feature, FeatureCollection, Geometry, JsonObject, Value};
use ndarray::{array, Array3};
use rusterfield::{
    assign_field_from_raster,
    encoding::features::{read_feature_collection, write_feature_collection},
    GeoTiffRaster, GeoTransform, InMemoryRaster, RasterSource, SamplingConfig, WGS84,
};
use serde_json::json;
use std::{fs::File, io::BufWriter, path::PathBuf};
use tiff::{
    encoder::{colortype, TiffEncoder},
    tags::Tag,
};

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("rusterfield-e2e-{}-{name}", std::process::id()))
}

// single band lon/lat GeoTIFF, 1 degree pixels, upper-left corner at (0, height)
fn write_lonlat_tiff(name: &str, width: u32, height: u32, data: &[f32]) -> PathBuf {
    let path = temp_path(name);
    let mut tiff = TiffEncoder::new(BufWriter::new(File::create(&path).unwrap())).unwrap();
    let mut image = tiff.new_image::<colortype::Gray32Float>(width, height).unwrap();

    let geokeys: [u16; 16] = [1, 1, 0, 3, 1024, 0, 1, 2, 1025, 0, 1, 1, 2048, 0, 1, 4326];
    image.encoder().write_tag(Tag::Unknown(33550), &[1.0, 1.0, 0.0][..]).unwrap();
    image
        .encoder()
        .write_tag(Tag::Unknown(33922), &[0.0, 0.0, 0.0, 0.0, height as f64, 0.0][..])
        .unwrap();
    image.encoder().write_tag(Tag::Unknown(34735), &geokeys[..]).unwrap();
    image.write_data(data).unwrap();
    path
}

fn feature(id: &str, coords: &[(f64, f64)]) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::LineString(
            coords.iter().map(|&(x, y)| vec![x, y]).collect(),
        ))),
        id: Some(Id::String(id.to_string())),
        properties: Some(JsonObject::new()),
        foreign_members: None,
    }
}

fn collection(features: Vec<Feature>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

fn field<'a>(collection: &'a FeatureCollection, i: usize, name: &str) -> &'a serde_json::Value {
    &collection.features[i].properties.as_ref().unwrap()["spatial_fields"][name]
}

fn id_of(feature: &Feature) -> Option<String> {
    match &feature.id {
        Some(Id::String(id)) => Some(id.clone()),
        _ => None,
    }
}

#[test]
fn geotiff_line_inside_and_straddling() {
    let path = write_lonlat_tiff("fives.tif", 3, 3, &[5.0; 9]);
    let raster = GeoTiffRaster::open(&path).unwrap();
    assert_eq!(raster.info().crs, Some(WGS84));

    let input = collection(vec![
        feature("inside", &[(0.5, 2.5), (1.5, 1.5)]),
        feature("straddling", &[(0.5, 2.5), (-0.5, 2.5)]),
    ]);
    let (output, stats) = assign_field_from_raster(input, &raster, SamplingConfig::list("depth")).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(stats.accepted, 2);
    assert_eq!(stats.recovered, 1);
    assert_eq!(field(&output, 0, "depth"), &json!([5.0, 5.0]));
    assert_eq!(field(&output, 1, "depth"), &json!([5.0, 0.0]));
}

#[test]
fn entirely_outside_geometry_samples_zero() {
    let path = write_lonlat_tiff("outside.tif", 2, 2, &[1.0, 2.0, 3.0, 4.0]);
    let raster = GeoTiffRaster::open(&path).unwrap();

    let input = collection(vec![feature("far", &[(50.0, 50.0), (51.0, 50.0), (52.0, 50.0)])]);
    let (output, _) = assign_field_from_raster(input, &raster, SamplingConfig::list("depth")).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(field(&output, 0, "depth"), &json!([0.0, 0.0, 0.0]));
}

#[test]
fn second_pass_appends_to_first() {
    let data: Vec<f32> = (0..9).map(|v| v as f32 * 1.5).collect();
    let path = write_lonlat_tiff("ramp.tif", 3, 3, &data);
    let raster = GeoTiffRaster::open(&path).unwrap();

    let input = collection(vec![feature("a", &[(0.5, 2.5), (2.5, 0.5), (1.5, 1.5)])]);
    let (first, _) = assign_field_from_raster(input, &raster, SamplingConfig::list("depth")).unwrap();
    let (second, _) = assign_field_from_raster(first.clone(), &raster, SamplingConfig::list("depth")).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(field(&first, 0, "depth"), &json!([0.0, 12.0, 6.0]));
    assert_eq!(field(&second, 0, "depth"), &json!([0.0, 12.0, 6.0, 0.0, 12.0, 6.0]));
}

#[test]
fn categorical_majority_and_tie() {
    let raster = InMemoryRaster::new(
        array![[[7.0, 7.0, 7.0], [3.0, 3.0, 3.0], [9.0, 9.0, 9.0]]],
        GeoTransform::north_up(0.0, 3.0, 1.0, 1.0).unwrap(),
        Some(WGS84),
    );

    let input = collection(vec![
        feature("majority", &[(0.5, 2.5), (1.5, 2.5), (2.5, 2.5), (0.5, 1.5), (1.5, 1.5)]),
        feature("tie", &[(0.5, 2.5), (1.5, 2.5), (0.5, 1.5), (1.5, 1.5)]),
    ]);
    let (output, _) = assign_field_from_raster(input, &raster, SamplingConfig::categorical("zone")).unwrap();

    assert_eq!(output.features[0].properties.as_ref().unwrap()["zone"], json!(7));
    assert_eq!(output.features[1].properties.as_ref().unwrap()["zone"], json!(3));
}

#[test]
fn rejection_keeps_only_nonzero_features() {
    let raster = InMemoryRaster::new(
        array![[[0.0, 0.0, 0.0], [0.0, 2.0, 0.0], [0.0, 0.0, 0.0]]],
        GeoTransform::north_up(0.0, 3.0, 1.0, 1.0).unwrap(),
        Some(WGS84),
    );
    let config = SamplingConfig {
        rejection_threshold: Some(0.0),
        ..SamplingConfig::list("depth")
    };

    let input = collection(vec![
        feature("dry", &[(0.5, 2.5), (2.5, 2.5)]),
        feature("wet", &[(0.5, 1.5), (1.5, 1.5)]),
    ]);
    let (output, stats) = assign_field_from_raster(input, &raster, config).unwrap();

    assert_eq!(stats.rejected, 1);
    assert_eq!(output.features.len(), 1);
    assert_eq!(id_of(&output.features[0]).as_deref(), Some("wet"));
    assert_eq!(field(&output, 0, "depth"), &json!([0.0, 2.0]));
}

#[test]
fn multi_band_values_are_listed_per_band() {
    let data = Array3::from_shape_fn((2, 2, 2), |(b, r, c)| (b * 10 + r * 2 + c) as f64);
    let raster = InMemoryRaster::new(data, GeoTransform::north_up(0.0, 2.0, 1.0, 1.0).unwrap(), Some(WGS84))
        .with_band_names(vec!["depth".into(), "velocity".into()]);

    let input = collection(vec![feature("a", &[(0.5, 1.5), (1.5, 0.5)])]);
    let (nested, _) = assign_field_from_raster(input.clone(), &raster, SamplingConfig::list("flood")).unwrap();
    assert_eq!(field(&nested, 0, "flood"), &json!([[0.0, 3.0], [10.0, 13.0]]));

    let band_keyed = SamplingConfig {
        band_keyed: true,
        ..Default::default()
    };
    let (keyed, _) = assign_field_from_raster(input, &raster, band_keyed).unwrap();
    assert_eq!(field(&keyed, 0, "depth"), &json!([0.0, 3.0]));
    assert_eq!(field(&keyed, 0, "velocity"), &json!([10.0, 13.0]));
}

#[test]
fn output_file_round_trip_keeps_properties() {
    let path = write_lonlat_tiff("file.tif", 3, 3, &[1.25; 9]);
    let raster = GeoTiffRaster::open(&path).unwrap();

    let mut input = feature("r", &[(1.5, 1.5)]);
    input.properties = Some(match json!({"highway": "primary"}) {
        serde_json::Value::Object(map) => map,
        _ => unreachable!(),
    });
    let in_path = temp_path("in.geojson");
    let out_path = temp_path("out.geojson");
    write_feature_collection(&in_path, &collection(vec![input])).unwrap();

    let loaded = read_feature_collection(&in_path).unwrap();
    let (output, _) = assign_field_from_raster(loaded, &raster, SamplingConfig::list("depth")).unwrap();
    write_feature_collection(&out_path, &output).unwrap();
    let written = read_feature_collection(&out_path).unwrap();

    for p in [&path, &in_path, &out_path] {
        std::fs::remove_file(p).ok();
    }

    let properties = written.features[0].properties.as_ref().unwrap();
    assert_eq!(properties["highway"], json!("primary"));
    assert_eq!(properties["spatial_fields"]["depth"], json!([1.25]));
}
