/* Command line entry point: sample a raster along the features of a GeoJSON file */

use anyhow::{bail, Context};
use clap::Parser;
use rusterfield::{
    encoding::features::{read_feature_collection, write_feature_collection},
    logging::init_logging,
    Crs, ExtentFilter, GeoTiffRaster, RasterSource, SamplingConfig, SamplingEngine, WGS84,
};
use std::path::PathBuf;
use tracing::info;

#[cfg(not(target_family = "unix"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[cfg(target_family = "unix")]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

/// Assign raster values to point and line features.
///
/// In list mode the sampled values of every band are appended to
/// `properties.spatial_fields[FIELD_NAME]`. In categorical mode the most frequent
/// code of the first band is written to `properties[FIELD_NAME]`.
#[derive(Debug, Parser)]
#[command(name = "rusterfield", version)]
struct Cli {
    /// Input GeoJSON feature collection
    input_geojson: PathBuf,

    /// GeoTIFF raster to sample
    raster: PathBuf,

    /// Output GeoJSON feature collection
    output_geojson: PathBuf,

    /// Property to populate, not needed with --band-keyed
    field_name: Option<String>,

    /// Write the majority code of the first band instead of value lists
    #[arg(short, long)]
    categorical: bool,

    /// Read negative pixel values as zero
    #[arg(long)]
    clamp_negative: bool,

    /// Keep only features whose summed absolute values exceed this
    #[arg(long, value_name = "T")]
    rejection_threshold: Option<f64>,

    /// Key value lists by band description instead of FIELD_NAME
    #[arg(long)]
    band_keyed: bool,

    /// Also write distances between consecutive points to `properties.deltas`
    #[arg(long)]
    deltas: bool,

    /// CRS of the feature coordinates
    #[arg(long, default_value_t = WGS84)]
    source_crs: Crs,

    /// CRS of the raster, overrides the one declared in the file
    #[arg(long)]
    raster_crs: Option<Crs>,

    /// GeoJSON whose feature bounding boxes restrict which features are sampled
    #[arg(long, value_name = "GEOJSON")]
    extent_filter: Option<PathBuf>,

    /// Worker threads, defaults to the number of CPUs
    #[arg(long)]
    threads: Option<usize>,

    /// Directory for the log file, defaults to $DATADIR/logs when DATADIR is set
    #[arg(long, env = "RUSTERFIELD_LOG_DIR")]
    log_dir: Option<PathBuf>,
}

impl Cli {
    fn sampling_config(&self) -> SamplingConfig {
        SamplingConfig {
            field_name: self.field_name.clone(),
            categorical: self.categorical,
            clamp_negative: self.clamp_negative,
            rejection_threshold: self.rejection_threshold,
            band_keyed: self.band_keyed,
            with_deltas: self.deltas,
            source_crs: self.source_crs.clone(),
            raster_crs: self.raster_crs.clone(),
            threads: self.threads,
            ..Default::default()
        }
    }

    fn log_dir(&self) -> Option<PathBuf> {
        self.log_dir
            .clone()
            .or_else(|| std::env::var_os("DATADIR").map(|dir| PathBuf::from(dir).join("logs")))
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_dir = cli.log_dir();
    let log_path = init_logging(log_dir.as_deref()).context("cannot open log file")?;
    if let Some(path) = log_path {
        info!(path = %path.display(), "logging to file");
    }

    let config = cli.sampling_config();
    config.validate()?;

    info!(path = %cli.input_geojson.display(), "reading features");
    let collection = read_feature_collection(&cli.input_geojson)
        .with_context(|| format!("cannot read {}", cli.input_geojson.display()))?;

    let raster = GeoTiffRaster::open(&cli.raster)?;
    let info = raster.info();
    info!(
        path = %cli.raster.display(),
        bands = info.nbands,
        rows = info.nrows,
        cols = info.ncols,
        "reading raster"
    );

    let mut engine = SamplingEngine::new(&raster, config)?;
    if let Some(path) = &cli.extent_filter {
        let filter = ExtentFilter::from_features(&read_feature_collection(path)?)?;
        if filter.is_empty() {
            bail!("extent filter {} has no usable geometry", path.display());
        }
        info!(path = %path.display(), boxes = filter.len(), "extent filter loaded");
        engine = engine.with_extent_filter(filter);
    }

    let (output, stats) = engine.run(collection)?;

    write_feature_collection(&cli.output_geojson, &output)
        .with_context(|| format!("cannot write {}", cli.output_geojson.display()))?;
    info!(
        path = %cli.output_geojson.display(),
        features = stats.accepted,
        "wrote features"
    );

    Ok(())
}
