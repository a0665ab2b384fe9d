//! GeoTIFF raster source
//!
//! Pure Rust reader (no GDAL) built on the `tiff` decoder. Georeferencing comes from
//! the ModelTransformation tag, or from ModelTiepoint + ModelPixelScale; the CRS from
//! the GeoKey directory; band descriptions from the GDAL metadata tag when present.
//!
//! Strip and tile organised files with chunky (interleaved) samples are supported.
//! Windowed reads decode only the chunks overlapping the window, and every read opens
//! its own decoder so a single [`GeoTiffRaster`] can be shared between threads.

use crate::{
    error::{Result, SampleError},
    geo::{
        projection::Crs,
        raster::{RasterInfo, RasterSource},
        transform::GeoTransform,
    },
    prelude::WidenPixels,
    sampling::window::Window,
};
use ndarray::Array3;
use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};
use tiff::{decoder::Decoder, tags::Tag, TiffError};
use tracing::debug;

// GeoTIFF / GDAL tag IDs
const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_METADATA: u16 = 42112;

// GeoKey IDs
const GT_RASTER_TYPE_GEO_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_GEO_KEY: u16 = 3072;

const RASTER_PIXEL_IS_POINT: u16 = 2;
const USER_DEFINED: u16 = 32767;
const PLANAR_SEPARATE: u16 = 2;

type TiffDecoder = Decoder<BufReader<File>>;

#[derive(Debug, Clone)]
pub struct GeoTiffRaster {
    path: PathBuf,
    info: RasterInfo,
}

impl GeoTiffRaster {
    /// Parse the metadata of the first image of the file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut decoder = open_decoder(&path)?;
        let io = |source: TiffError| SampleError::RasterIo {
            path: path.clone(),
            source,
        };

        let (width, height) = decoder.dimensions().map_err(io)?;
        let nbands = match find_u16(&mut decoder, Tag::SamplesPerPixel).map_err(io)? {
            Some(n) if n > 0 => n as usize,
            Some(_) => return Err(SampleError::raster_format(&path, "image declares zero samples per pixel")),
            None => 1,
        };

        if find_u16(&mut decoder, Tag::PlanarConfiguration).map_err(io)? == Some(PLANAR_SEPARATE) {
            return Err(SampleError::raster_format(&path, "separate planar configuration is not supported"));
        }

        let geokeys = match find_tag(&mut decoder, GEO_KEY_DIRECTORY).map_err(io)? {
            Some(value) => GeoKeys::parse(&value.into_u16_vec().map_err(io)?),
            None => GeoKeys::default(),
        };

        let transform = read_transform(&mut decoder, &geokeys)
            .map_err(io)?
            .ok_or_else(|| SampleError::raster_format(&path, "no usable georeferencing tags"))?;

        let band_names = match find_tag(&mut decoder, GDAL_METADATA).map_err(io)? {
            Some(value) => parse_band_descriptions(&value.into_string().map_err(io)?, nbands),
            None => Vec::new(),
        };

        let info = RasterInfo::new(height as usize, width as usize, nbands, transform, geokeys.crs())
            .with_band_names(band_names);

        debug!(
            path = %path.display(),
            nrows = info.nrows,
            ncols = info.ncols,
            nbands = info.nbands,
            crs = ?info.crs,
            "opened GeoTIFF"
        );

        Ok(Self { path, info })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: TiffError) -> SampleError {
        SampleError::RasterIo {
            path: self.path.clone(),
            source,
        }
    }
}

impl RasterSource for GeoTiffRaster {
    fn info(&self) -> &RasterInfo {
        &self.info
    }

    fn read_window(&self, window: &Window) -> Result<Array3<f64>> {
        let (nbands, nrows, ncols) = self.info.shape();
        let Some(win) = window.clip(nrows, ncols) else {
            return Ok(Array3::zeros((nbands, 0, 0)));
        };

        let mut decoder = open_decoder(&self.path)?;
        let (chunk_w, chunk_h) = decoder.chunk_dimensions();
        let (chunk_w, chunk_h) = (chunk_w as usize, chunk_h as usize);
        if chunk_w == 0 || chunk_h == 0 {
            return Err(SampleError::raster_format(&self.path, "zero sized chunks"));
        }
        let chunks_across = ncols.div_ceil(chunk_w);

        let row0 = win.row_off as usize;
        let col0 = win.col_off as usize;
        let row1 = row0 + win.height;
        let col1 = col0 + win.width;

        let mut out = Array3::<f64>::zeros((nbands, win.height, win.width));

        // decode only the chunks overlapping the window
        for chunk_row in row0 / chunk_h..=(row1 - 1) / chunk_h {
            for chunk_col in col0 / chunk_w..=(col1 - 1) / chunk_w {
                let chunk_index = (chunk_row * chunks_across + chunk_col) as u32;
                let (data_w, _) = decoder.chunk_data_dimensions(chunk_index);
                let data_w = data_w as usize;
                let pixels = decoder
                    .read_chunk(chunk_index)
                    .map_err(|e| self.io_error(e))?
                    .widen()
                    .ok_or_else(|| SampleError::raster_format(&self.path, "unsupported sample format"))?;

                let chunk_r0 = chunk_row * chunk_h;
                let chunk_c0 = chunk_col * chunk_w;
                let r_start = row0.max(chunk_r0);
                let r_end = row1.min(chunk_r0 + chunk_h);
                let c_start = col0.max(chunk_c0);
                let c_end = col1.min(chunk_c0 + data_w);

                for r in r_start..r_end {
                    for c in c_start..c_end {
                        let base = ((r - chunk_r0) * data_w + (c - chunk_c0)) * nbands;
                        let Some(samples) = pixels.get(base..base + nbands) else {
                            return Err(SampleError::raster_format(
                                &self.path,
                                format!("chunk {chunk_index} holds fewer pixels than its dimensions"),
                            ));
                        };
                        for (b, value) in samples.iter().enumerate() {
                            out[[b, r - row0, c - col0]] = *value;
                        }
                    }
                }
            }
        }

        Ok(out)
    }
}

fn open_decoder(path: &Path) -> Result<TiffDecoder> {
    let io = |source: TiffError| SampleError::RasterIo {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(|e| io(TiffError::IoError(e)))?;
    Decoder::new(BufReader::new(file)).map_err(io)
}

// the decoder keys its directory with `from_u16_exhaustive`, look tags up the same way
fn find_tag(decoder: &mut TiffDecoder, code: u16) -> tiff::TiffResult<Option<tiff::decoder::ifd::Value>> {
    decoder.find_tag(Tag::from_u16_exhaustive(code))
}

fn find_u16(decoder: &mut TiffDecoder, tag: Tag) -> tiff::TiffResult<Option<u16>> {
    decoder.find_tag(tag)?.map(|v| v.into_u16()).transpose()
}

fn read_transform(decoder: &mut TiffDecoder, geokeys: &GeoKeys) -> tiff::TiffResult<Option<GeoTransform>> {
    if let Some(value) = find_tag(decoder, MODEL_TRANSFORMATION)? {
        let m = value.into_f64_vec()?;
        if m.len() >= 8 {
            return Ok(GeoTransform::from_gdal([m[3], m[0], m[1], m[7], m[4], m[5]]));
        }
    }

    let scale = find_tag(decoder, MODEL_PIXEL_SCALE)?.map(|v| v.into_f64_vec()).transpose()?;
    let tiepoint = find_tag(decoder, MODEL_TIEPOINT)?.map(|v| v.into_f64_vec()).transpose()?;

    let (Some(scale), Some(tiepoint)) = (scale, tiepoint) else {
        return Ok(None);
    };
    if scale.len() < 2 || tiepoint.len() < 6 {
        return Ok(None);
    }

    let (sx, sy) = (scale[0], scale[1]);
    let (i, j, x, y) = (tiepoint[0], tiepoint[1], tiepoint[3], tiepoint[4]);
    let mut origin_x = x - i * sx;
    let mut origin_y = y + j * sy;

    // tiepoints of PixelIsPoint rasters refer to pixel centres
    if geokeys.raster_type == Some(RASTER_PIXEL_IS_POINT) {
        origin_x -= sx / 2.0;
        origin_y += sy / 2.0;
    }

    Ok(GeoTransform::from_gdal([origin_x, sx, 0.0, origin_y, 0.0, -sy]))
}

#[derive(Debug, Default, PartialEq)]
struct GeoKeys {
    raster_type: Option<u16>,
    geographic: Option<u16>,
    projected: Option<u16>,
}

impl GeoKeys {
    // [version, revision, minor, count, (key, location, count, value)*]
    fn parse(directory: &[u16]) -> Self {
        let mut keys = GeoKeys::default();
        let Some(entries) = directory.get(4..) else {
            return keys;
        };

        for entry in entries.chunks_exact(4) {
            let (key, location, value) = (entry[0], entry[1], entry[3]);
            // values stored in other tags are never EPSG codes
            if location != 0 {
                continue;
            }
            match key {
                GT_RASTER_TYPE_GEO_KEY => keys.raster_type = Some(value),
                GEOGRAPHIC_TYPE_GEO_KEY => keys.geographic = Some(value),
                PROJECTED_CS_TYPE_GEO_KEY => keys.projected = Some(value),
                _ => (),
            }
        }
        keys
    }

    fn crs(&self) -> Option<Crs> {
        let valid = |code: &u16| *code != 0 && *code != USER_DEFINED;
        self.projected
            .filter(valid)
            .or(self.geographic.filter(valid))
            .map(Crs::Epsg)
    }
}

// <GDALMetadata><Item name="DESCRIPTION" sample="0" role="description">depth</Item>...
fn parse_band_descriptions(xml: &str, nbands: usize) -> Vec<String> {
    let mut names = vec![String::new(); nbands];
    for item in xml.split("<Item").skip(1) {
        let Some((attrs, rest)) = item.split_once('>') else {
            continue;
        };
        if attribute(attrs, "role") != Some("description") {
            continue;
        }
        let Some(sample) = attribute(attrs, "sample").and_then(|s| s.parse::<usize>().ok()) else {
            continue;
        };
        let Some((text, _)) = rest.split_once("</Item>") else {
            continue;
        };
        if let Some(slot) = names.get_mut(sample) {
            *slot = unescape(text.trim());
        }
    }
    names
}

fn attribute<'a>(attrs: &'a str, name: &str) -> Option<&'a str> {
    let pattern = format!("{name}=\"");
    let start = attrs.find(&pattern)? + pattern.len();
    let len = attrs[start..].find('"')?;
    Some(&attrs[start..start + len])
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
