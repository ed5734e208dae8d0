//! basinkit CLI - basin delineation, command areas and water accounting

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use basinkit_algorithms::hydrology::{
    command_area_file_stem, discharge_buffer_area, downslope_area, fixed_buffer_area,
    flow_direction, trace_downstream, upstream_area, watershed, CommandArea,
    DischargeBufferParams, DownslopeParams, FixedBufferParams, WatershedParams,
};
use basinkit_algorithms::vector::{
    buffer_points, buffer_polyline, rasterize, BufferParams, RasterizeParams,
};
use basinkit_algorithms::water::{reclassify_land_use, LandUseOverrides, LandUseTable};
use basinkit_core::io::{read_geotiff, write_geotiff, GeoTiffOptions, SampleType};
use basinkit_core::vector::{
    read_feature_collection, write_feature_collection, Feature, FeatureCollection,
};
use basinkit_core::{Raster, RasterElement, CRS};
use basinkit_dashboard::DashboardConfig;
use basinkit_workflow::{Pipeline, Stage, TaskRunner, WorkflowConfig};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "basinkit")]
#[command(author, version, about = "Basin delineation, command areas and water accounting", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// D8 hydrology
    Hydrology {
        #[command(subcommand)]
        algorithm: HydrologyCommands,
    },
    /// Command area of a reservoir or treatment-plant outlet
    CommandArea {
        #[command(subcommand)]
        method: CommandAreaCommands,
    },
    /// Land-use rasterization and LUWA reclassification
    LandUse {
        #[command(subcommand)]
        operation: LandUseCommands,
    },
    /// Water-accounting workflow steps
    Workflow {
        #[command(subcommand)]
        step: WorkflowCommands,
    },
    /// Serve the dashboard API
    Serve {
        /// Dashboard TOML configuration
        #[arg(long)]
        config: Option<PathBuf>,
        /// Port, overrides the configuration
        #[arg(short, long)]
        port: Option<u16>,
        /// Directory with basin time series, overrides the configuration
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

// ─── Hydrology subcommands ──────────────────────────────────────────────

#[derive(Subcommand)]
enum HydrologyCommands {
    /// D8 flow direction from DEM
    FlowDirection {
        /// Input DEM file
        input: PathBuf,
        /// Output file (D8 codes 1-8, 0 for pits and nodata)
        output: PathBuf,
    },
    /// Watershed delineation from flow direction
    Watershed {
        /// Input flow direction raster (D8 codes)
        input: PathBuf,
        /// Output file (basin IDs)
        output: PathBuf,
        /// Pour points as "row,col;row,col;...", every outlet when omitted
        #[arg(long)]
        pour_points: Option<String>,
    },
}

// ─── Command-area subcommands ───────────────────────────────────────────

#[derive(Subcommand)]
enum CommandAreaCommands {
    /// Cells lower than the outlet and connected to it, plus a flood expansion
    Downslope {
        /// Input DEM file
        #[arg(long)]
        dem: PathBuf,
        /// Outlet x in the DEM CRS
        #[arg(long, allow_hyphen_values = true)]
        x: f64,
        /// Outlet y in the DEM CRS
        #[arg(long, allow_hyphen_values = true)]
        y: f64,
        /// Flood level above the outlet elevation, in metres
        #[arg(long, default_value = "0.0")]
        flood_level: f64,
        /// Directory for the raster and GeoJSON outputs
        #[arg(long)]
        output_dir: PathBuf,
    },
    /// Fixed-radius circle around the outlet
    Buffer {
        /// Raster whose grid the mask uses
        #[arg(long)]
        template: PathBuf,
        #[arg(long, allow_hyphen_values = true)]
        x: f64,
        #[arg(long, allow_hyphen_values = true)]
        y: f64,
        /// Radius in CRS units
        #[arg(long, default_value = "500.0")]
        distance: f64,
        /// Output mask (.tif); the outline goes next to it as .geojson
        #[arg(long)]
        output: PathBuf,
    },
    /// Corridor along the D8 path, its length scaled by discharge
    Discharge {
        /// Input DEM file
        #[arg(long)]
        dem: PathBuf,
        #[arg(long, allow_hyphen_values = true)]
        x: f64,
        #[arg(long, allow_hyphen_values = true)]
        y: f64,
        /// Outlet discharge
        #[arg(long)]
        discharge: f64,
        /// Path length per unit of discharge
        #[arg(long, default_value = "1000.0")]
        length_per_discharge: f64,
        /// Corridor half-width
        #[arg(long, default_value = "500.0")]
        width: f64,
        /// Upper bound on the path length
        #[arg(long, default_value = "50000.0")]
        max_length: f64,
        #[arg(long)]
        output: PathBuf,
    },
    /// Everything draining to the outlet
    Upstream {
        /// Input DEM file
        #[arg(long)]
        dem: PathBuf,
        #[arg(long, allow_hyphen_values = true)]
        x: f64,
        #[arg(long, allow_hyphen_values = true)]
        y: f64,
        #[arg(long)]
        output: PathBuf,
    },
}

// ─── Land-use subcommands ───────────────────────────────────────────────

#[derive(Subcommand)]
enum LandUseCommands {
    /// Burn GeoJSON polygons onto a template grid
    Rasterize {
        /// Input GeoJSON file
        #[arg(long)]
        vector: PathBuf,
        /// Raster whose grid the output uses
        #[arg(long)]
        template: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// Burn every touched cell instead of cells whose centre is inside
        #[arg(long)]
        all_touched: bool,
        /// Value of covered cells
        #[arg(long, default_value = "1")]
        burn: u8,
    },
    /// Reclassify every land-cover raster in a directory to LUWA classes
    Reclassify {
        /// Directory of land-cover GeoTIFFs
        #[arg(long)]
        lcc_dir: PathBuf,
        /// `lcc,luwa` CSV; the WaPOR legend when omitted
        #[arg(long)]
        table: Option<PathBuf>,
        /// Protected-area polygons (GeoJSON)
        #[arg(long)]
        protected: PathBuf,
        /// Reservoir polygons (GeoJSON)
        #[arg(long)]
        reservoir: PathBuf,
        #[arg(long)]
        output_dir: PathBuf,
    },
}

// ─── Workflow subcommands ───────────────────────────────────────────────

#[derive(Subcommand)]
enum WorkflowCommands {
    /// Build masked data cubes from the input directory
    Cubes {
        #[arg(long)]
        config: PathBuf,
    },
    /// Rainy days and canopy interception cubes
    Interception {
        #[arg(long)]
        config: PathBuf,
    },
    /// Monthly basin water balance
    Balance {
        #[arg(long)]
        config: PathBuf,
    },
    /// Yearly summary tables
    Summary {
        #[arg(long)]
        config: PathBuf,
    },
    /// Every step in order
    Run {
        #[arg(long)]
        config: PathBuf,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("a global tracing subscriber is already set");
    }
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(100);
    if let Ok(style) =
        ProgressStyle::default_bar().template("{elapsed_precise} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
    {
        pb.set_style(style.progress_chars("=> "));
    }
    pb
}

fn read_raster<T: RasterElement>(path: &Path) -> Result<Raster<T>> {
    let pb = spinner("Reading raster...");
    let raster: Raster<T> = read_geotiff(path, None)
        .with_context(|| format!("Failed to read raster {}", path.display()))?;
    pb.finish_and_clear();
    info!("Input: {} x {}", raster.cols(), raster.rows());
    Ok(raster)
}

fn write_raster<T: RasterElement>(
    raster: &Raster<T>,
    path: &Path,
    sample_type: SampleType,
) -> Result<()> {
    let pb = spinner("Writing output...");
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    write_geotiff(raster, path, Some(GeoTiffOptions { sample_type }))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    pb.finish_and_clear();
    Ok(())
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn parse_pour_points(s: &str) -> Result<Vec<(usize, usize)>> {
    s.split(';')
        .map(|pair| {
            let parts: Vec<&str> = pair.trim().split(',').collect();
            if parts.len() != 2 {
                anyhow::bail!("Pour point must be 'row,col', got: {}", pair);
            }
            let row: usize = parts[0].trim().parse().context("Invalid row")?;
            let col: usize = parts[1].trim().parse().context("Invalid col")?;
            Ok((row, col))
        })
        .collect()
}

fn warn_crs_mismatch(raster_crs: Option<&CRS>, vector_crs: Option<&CRS>, what: &Path) {
    if let (Some(r), Some(v)) = (raster_crs, vector_crs) {
        if !r.is_compatible(v) {
            warn!(
                "CRS mismatch: raster {} vs {} in {}",
                r.identifier(),
                v.identifier(),
                what.display()
            );
        }
    }
}

/// Polygons of a GeoJSON file rasterized onto `template`
fn rasterize_vector<T: RasterElement>(
    vector: &Path,
    template: &Raster<T>,
    params: &RasterizeParams,
) -> Result<Raster<u8>> {
    let (collection, crs) = read_feature_collection(vector)
        .with_context(|| format!("Failed to read {}", vector.display()))?;
    warn_crs_mismatch(template.crs(), crs.as_ref(), vector);
    let polygons = collection.polygons();
    if polygons.is_empty() {
        warn!("{} has no polygons", vector.display());
    }
    rasterize(&polygons, template, params)
        .with_context(|| format!("Failed to rasterize {}", vector.display()))
}

fn print_command_area(area: &CommandArea) {
    println!("\n=== RESULTS ({}) ===", area.method);
    if area.expansion_cells > 0 {
        println!("Default command area: {} pixels", area.default_cells);
        println!(
            "Flood expansion area (+{}m): {} pixels",
            area.flood_level, area.expansion_cells
        );
    }
    println!("Total command area: {} pixels", area.total_cells);
    println!("Total area: {:.2} square units", area.total_area);
    if let Some(length) = area.traced_length {
        println!("Traced path length: {:.2}", length);
    }
}

/// Mask as UInt8 GeoTIFF plus polygons of the mask as GeoJSON
fn write_command_area(area: &CommandArea, raster_path: &Path, geojson_path: &Path) -> Result<()> {
    write_raster(&area.mask, raster_path, SampleType::UInt8)?;
    println!("Raster saved to: {}", raster_path.display());
    let features = area.to_features().context("Failed to polygonize command area")?;
    write_feature_collection(geojson_path, &features, area.mask.crs())
        .with_context(|| format!("Failed to write {}", geojson_path.display()))?;
    println!("GeoJSON saved to: {}", geojson_path.display());
    Ok(())
}

/// Smooth outline of a buffer command area, written next to the mask
fn write_buffer_outline(
    polygons: Vec<geo_types::Polygon<f64>>,
    area: &CommandArea,
    path: &Path,
) -> Result<()> {
    let collection: FeatureCollection = polygons
        .into_iter()
        .map(|p| {
            Feature::new(p)
                .with_property("method", area.method.to_string())
                .with_property("area_sq_units", area.total_area)
        })
        .collect();
    write_feature_collection(path, &collection, area.mask.crs())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Outline saved to: {}", path.display());
    Ok(())
}

fn geojson_beside(path: &Path) -> PathBuf {
    path.with_extension("geojson")
}

fn list_tiffs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"))
        })
        .collect();
    files.sort();
    Ok(files)
}

fn run_workflow(config_path: &Path, stages: Vec<Stage>) -> Result<()> {
    let config = WorkflowConfig::load(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    let pipeline = Pipeline::new(config, stages);
    let runner = TaskRunner::new();

    let pb = progress_bar();
    let sink = |percent: u8, message: Option<&str>| {
        pb.set_position(u64::from(percent));
        if let Some(m) = message {
            pb.set_message(m.to_string());
        }
    };
    let result = pipeline.run(&runner, &sink);
    pb.finish_and_clear();

    let report = result.context("Workflow failed")?;
    println!(
        "{} finished: {} messages in {:.2?}",
        report.name,
        report.messages.len(),
        report.elapsed
    );
    Ok(())
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            let raster: Raster<f64> = read_raster(&input)?;
            let (rows, cols) = raster.shape();
            let bounds = raster.bounds();
            let stats = raster.statistics();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
            println!("Cell size: {}", raster.cell_size());
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            if let Some(crs) = raster.crs() {
                println!("CRS: {}", crs);
            }
            if let Some(nodata) = raster.nodata() {
                println!("NoData: {}", nodata);
            }
            println!("\nStatistics:");
            if let Some(min) = stats.min {
                println!("  Min: {:.4}", min);
            }
            if let Some(max) = stats.max {
                println!("  Max: {:.4}", max);
            }
            if let Some(mean) = stats.mean {
                println!("  Mean: {:.4}", mean);
            }
            if !raster.is_empty() {
                println!(
                    "  Valid cells: {} ({:.1}%)",
                    stats.valid_count,
                    100.0 * stats.valid_count as f64 / raster.len() as f64
                );
            }
        }

        // ── Hydrology ────────────────────────────────────────────────
        Commands::Hydrology { algorithm } => match algorithm {
            HydrologyCommands::FlowDirection { input, output } => {
                let dem: Raster<f64> = read_raster(&input)?;
                let start = Instant::now();
                let result = flow_direction(&dem).context("Failed to calculate flow direction")?;
                let elapsed = start.elapsed();
                write_raster(&result, &output, SampleType::UInt8)?;
                done("Flow direction", &output, elapsed);
            }

            HydrologyCommands::Watershed {
                input,
                output,
                pour_points,
            } => {
                let points = match pour_points.as_deref() {
                    Some(text) => parse_pour_points(text)?,
                    None => {
                        info!("No pour points given, delineating every outlet");
                        Vec::new()
                    }
                };
                let flow_dir: Raster<u8> = read_raster(&input)?;
                let start = Instant::now();
                let result = watershed(
                    &flow_dir,
                    WatershedParams {
                        pour_points: points,
                    },
                )
                .context("Failed to delineate watersheds")?;
                let elapsed = start.elapsed();
                write_raster(&result, &output, SampleType::Int32)?;
                done("Watershed", &output, elapsed);
            }
        },

        // ── Command areas ────────────────────────────────────────────
        Commands::CommandArea { method } => match method {
            CommandAreaCommands::Downslope {
                dem,
                x,
                y,
                flood_level,
                output_dir,
            } => {
                let dem: Raster<f64> = read_raster(&dem)?;
                println!("Outlet coordinates: ({}, {})", x, y);
                println!("Selected flood level: {}m", flood_level);
                let start = Instant::now();
                let area = downslope_area(
                    &dem,
                    DownslopeParams {
                        outlet_x: x,
                        outlet_y: y,
                        flood_level,
                    },
                )
                .context("Failed to delineate downslope command area")?;
                let elapsed = start.elapsed();
                print_command_area(&area);

                std::fs::create_dir_all(&output_dir)?;
                let stem = command_area_file_stem(flood_level);
                write_command_area(
                    &area,
                    &output_dir.join(format!("{}.tif", stem)),
                    &output_dir.join(format!("{}.geojson", stem)),
                )?;
                println!("  Processing time: {:.2?}", elapsed);
            }

            CommandAreaCommands::Buffer {
                template,
                x,
                y,
                distance,
                output,
            } => {
                let template: Raster<f64> = read_raster(&template)?;
                let start = Instant::now();
                let area = fixed_buffer_area(
                    &template,
                    FixedBufferParams {
                        outlet_x: x,
                        outlet_y: y,
                        distance,
                    },
                )
                .context("Failed to build buffer command area")?;
                let elapsed = start.elapsed();
                print_command_area(&area);

                write_raster(&area.mask, &output, SampleType::UInt8)?;
                let outline = buffer_points(
                    &geo_types::Point::new(x, y),
                    &BufferParams {
                        distance,
                        ..BufferParams::default()
                    },
                );
                write_buffer_outline(vec![outline], &area, &geojson_beside(&output))?;
                done("Buffer command area", &output, elapsed);
            }

            CommandAreaCommands::Discharge {
                dem,
                x,
                y,
                discharge,
                length_per_discharge,
                width,
                max_length,
                output,
            } => {
                let dem: Raster<f64> = read_raster(&dem)?;
                let start = Instant::now();
                let flow_dir = flow_direction(&dem).context("Failed to calculate flow direction")?;
                let params = DischargeBufferParams {
                    outlet_x: x,
                    outlet_y: y,
                    discharge,
                    length_per_discharge,
                    max_length,
                    width,
                };
                let area = discharge_buffer_area(&flow_dir, params)
                    .context("Failed to build discharge command area")?;
                let elapsed = start.elapsed();
                print_command_area(&area);

                write_raster(&area.mask, &output, SampleType::UInt8)?;
                let outlet = flow_dir
                    .cell_of(x, y)
                    .context("Outlet lies outside the DEM")?;
                let target = (discharge * length_per_discharge).min(max_length);
                let path = trace_downstream(&flow_dir, outlet, target)?;
                let vertices: Vec<(f64, f64)> = path
                    .cells
                    .iter()
                    .map(|&(r, c)| flow_dir.pixel_to_geo(c, r))
                    .collect();
                let outline = buffer_polyline(
                    &vertices,
                    &BufferParams {
                        distance: width,
                        ..BufferParams::default()
                    },
                );
                write_buffer_outline(outline, &area, &geojson_beside(&output))?;
                done("Discharge command area", &output, elapsed);
            }

            CommandAreaCommands::Upstream { dem, x, y, output } => {
                let dem: Raster<f64> = read_raster(&dem)?;
                let start = Instant::now();
                let flow_dir = flow_direction(&dem).context("Failed to calculate flow direction")?;
                let area = upstream_area(&flow_dir, x, y)
                    .context("Failed to delineate upstream command area")?;
                let elapsed = start.elapsed();
                print_command_area(&area);

                write_command_area(&area, &output, &geojson_beside(&output))?;
                println!("  Processing time: {:.2?}", elapsed);
            }
        },

        // ── Land use ─────────────────────────────────────────────────
        Commands::LandUse { operation } => match operation {
            LandUseCommands::Rasterize {
                vector,
                template,
                output,
                all_touched,
                burn,
            } => {
                let template: Raster<f64> = read_raster(&template)?;
                let start = Instant::now();
                let mask = rasterize_vector(
                    &vector,
                    &template,
                    &RasterizeParams {
                        burn_value: burn,
                        all_touched,
                    },
                )?;
                let elapsed = start.elapsed();
                write_raster(&mask, &output, SampleType::UInt8)?;
                done("Rasterized polygons", &output, elapsed);
            }

            LandUseCommands::Reclassify {
                lcc_dir,
                table,
                protected,
                reservoir,
                output_dir,
            } => {
                let lcc_files = list_tiffs(&lcc_dir)?;
                let Some(first) = lcc_files.first() else {
                    anyhow::bail!("No .tif files found in {}", lcc_dir.display());
                };
                info!("Using template LCC file: {}", first.display());
                let table = match &table {
                    Some(path) => LandUseTable::read_csv(path)
                        .with_context(|| format!("Failed to read {}", path.display()))?,
                    None => LandUseTable::wapor(),
                };

                let start = Instant::now();
                let template: Raster<f64> = read_raster(first)?;
                let burn_all = RasterizeParams {
                    burn_value: 1,
                    all_touched: true,
                };

                let reservoir_mask = rasterize_vector(&reservoir, &template, &burn_all)?;
                let reservoir_tif = output_dir
                    .join("static_datasets")
                    .join("Reservoir")
                    .join("Reservoir_basin.tif");
                write_raster(&reservoir_mask, &reservoir_tif, SampleType::UInt8)?;
                info!("Created reservoir raster: {}", reservoir_tif.display());

                let protected_mask = rasterize_vector(&protected, &template, &burn_all)?;
                let protected_tif = output_dir
                    .join("static_datasets")
                    .join("Protected")
                    .join("ProtectedArea_basin.tif");
                write_raster(&protected_mask, &protected_tif, SampleType::UInt8)?;
                info!("Created protected area raster: {}", protected_tif.display());

                let luwa_dir = output_dir.join("luwa_output");
                std::fs::create_dir_all(&luwa_dir)?;
                let overrides = LandUseOverrides {
                    protected: Some(&protected_mask),
                    reservoir: Some(&reservoir_mask),
                };
                for path in &lcc_files {
                    let lcc: Raster<f64> = read_raster(path)?;
                    let luwa = reclassify_land_use(&lcc, &table, overrides)
                        .with_context(|| format!("Failed to reclassify {}", path.display()))?;
                    let stem = path
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .unwrap_or("lcc");
                    let out = luwa_dir.join(format!("{}_LUWA.tif", stem));
                    write_raster(&luwa, &out, SampleType::UInt8)?;
                    info!("Reclassified {}", out.display());
                }
                done("LUWA rasters", &luwa_dir, start.elapsed());
            }
        },

        // ── Workflow ─────────────────────────────────────────────────
        Commands::Workflow { step } => match step {
            WorkflowCommands::Cubes { config } => run_workflow(&config, vec![Stage::Cubes])?,
            WorkflowCommands::Interception { config } => {
                run_workflow(&config, vec![Stage::Interception])?
            }
            WorkflowCommands::Balance { config } => {
                run_workflow(&config, vec![Stage::WaterBalance])?
            }
            WorkflowCommands::Summary { config } => run_workflow(&config, vec![Stage::Summary])?,
            WorkflowCommands::Run { config } => run_workflow(
                &config,
                vec![
                    Stage::Cubes,
                    Stage::Interception,
                    Stage::WaterBalance,
                    Stage::Summary,
                ],
            )?,
        },

        // ── Dashboard ────────────────────────────────────────────────
        Commands::Serve {
            config,
            port,
            data_dir,
        } => {
            let mut config = DashboardConfig::load(config.as_deref())
                .context("Failed to load dashboard configuration")?;
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(dir) = data_dir {
                config.data_dir = dir;
            }
            let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
            runtime
                .block_on(basinkit_dashboard::run(config))
                .context("Dashboard server failed")?;
        }
    }

    Ok(())
}
