//! Pipeline stages
//!
//! 1. [`build_cubes`]: rasterize the boundary, mask every input dataset
//!    into a cube
//! 2. [`interception_step`]: monthly rainy days and canopy interception
//! 3. [`water_balance_step`]: basin-wide monthly volumes and storage change
//! 4. [`summary_step`]: per-year summary tables

use crate::catalog::{
    classify_cubes, scan_inputs, TemporalResolution, INTERCEPTION_CUBE, RAINY_DAYS_CUBE,
};
use crate::config::WorkflowConfig;
use crate::cube::{Cube, CubeManifest, CubeWriter};
use crate::error::{Result, WorkflowError};
use crate::runner::TaskContext;
use basinkit_algorithms::statistics::{masked_sum, zonal_statistics};
use basinkit_algorithms::vector::{rasterize, RasterizeParams};
use basinkit_algorithms::water::{et_split, interception, rainy_days, UnitConversion};
use basinkit_core::io::{read_geotiff, write_geotiff, GeoTiffOptions};
use basinkit_core::raster::Raster;
use basinkit_core::timeseries::{parse_month, BasinSeries, MonthlyRecord};
use basinkit_core::vector::read_feature_collection;
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Mean Earth radius used for geographic cell areas (m)
const EARTH_RADIUS: f64 = 6_371_008.8;

/// EPSG codes of geographic (degree) coordinate systems
const GEOGRAPHIC_EPSG: [u32; 4] = [4326, 4258, 4269, 4267];

pub fn basin_mask_path(config: &WorkflowConfig) -> PathBuf {
    config
        .cube_dir()
        .join(format!("{}_basin_mask.tif", config.basin_name))
}

pub fn timeseries_path(config: &WorkflowConfig) -> PathBuf {
    config
        .output_dir
        .join(format!("{}_timeseries.csv", config.basin_name))
}

fn require_path(path: &Path, what: &str) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(WorkflowError::missing(format!(
            "{} {} does not exist",
            what,
            path.display()
        )))
    }
}

/// Rasterize the boundary and build one cube per dataset with files
pub fn build_cubes(config: &WorkflowConfig, ctx: &mut TaskContext<'_>) -> Result<Vec<Cube>> {
    config.validate()?;
    require_path(&config.input_dir, "input directory")?;
    require_path(&config.boundary, "boundary")?;
    require_path(&config.template, "template")?;

    let cube_dir = config.cube_dir();
    if !cube_dir.exists() {
        std::fs::create_dir_all(&cube_dir)?;
        ctx.log(format!("Created output directory: {}", cube_dir.display()));
    }

    let template: Raster<f64> = read_geotiff(&config.template, None)?;
    let (boundary, boundary_crs) = read_feature_collection(&config.boundary)?;
    if let (Some(a), Some(b)) = (template.crs(), boundary_crs.as_ref()) {
        if !a.is_compatible(b) {
            ctx.warn(format!(
                "Boundary CRS {} differs from template CRS {}",
                b.identifier(),
                a.identifier()
            ));
        }
    }
    let polygons = boundary.polygons();
    if polygons.is_empty() {
        return Err(WorkflowError::invalid(format!(
            "{} holds no polygon",
            config.boundary.display()
        )));
    }

    let params = RasterizeParams {
        burn_value: 1,
        all_touched: true,
    };
    let mask = rasterize(&polygons, &template, &params)?;
    let inside = mask.data().iter().filter(|&&v| v != 0).count();
    if inside == 0 {
        return Err(WorkflowError::invalid(
            "boundary does not overlap the template grid",
        ));
    }
    write_geotiff(&mask, basin_mask_path(config), Some(GeoTiffOptions::mask()))?;
    ctx.log(format!("Basin mask: {} cells", inside));

    let datasets = scan_inputs(&config.input_dir)?;
    let total_files: usize = datasets.iter().map(|d| d.files.len()).sum();
    let with_files = datasets.iter().filter(|d| !d.files.is_empty()).count();
    ctx.log(format!(
        "Found {} TIFF files to process across {} datasets",
        total_files, with_files
    ));

    let mut cubes = Vec::with_capacity(with_files);
    for d in &datasets {
        if d.files.is_empty() {
            ctx.log(format!("No TIFFs found for {}, skipping", d.spec.key));
            continue;
        }
        let message = format!("Processing {} files for {}...", d.files.len(), d.spec.key);
        ctx.force_progress(cubes.len(), with_files, Some(&message));
        ctx.log(&message);

        let cube = Cube::build(
            d.spec,
            &config.basin_name,
            &d.files,
            &template,
            &mask,
            &cube_dir,
        )?;
        ctx.log(format!("Successfully created {}", cube.name()));
        cubes.push(cube);
    }
    ctx.force_progress(with_files, with_files, Some("Cubes created"));
    Ok(cubes)
}

/// NaN where `like` is NaN, 0 elsewhere
fn zeros_like(like: &Raster<f64>) -> Raster<f64> {
    let mut out = like.clone();
    out.data_mut().mapv_inplace(|v| if v.is_nan() { f64::NAN } else { 0.0 });
    out
}

fn month_label(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

/// Cubes written by [`interception_step`]
#[derive(Debug, Clone)]
pub struct InterceptionCubes {
    pub rainy_days: Cube,
    pub interception: Cube,
}

/// Monthly rainy days (`nRD_monthly`) and interception (`i_monthly`)
/// from the dailyP, P and LAI cubes in `dir`
pub fn interception_step(dir: &Path, ctx: &mut TaskContext<'_>) -> Result<InterceptionCubes> {
    let cubes = classify_cubes(dir)?;
    cubes.require(&["dailyP", "P", "LAI"])?;
    let open = |key: &str| -> Result<Cube> {
        let path = cubes
            .get(key)
            .ok_or_else(|| WorkflowError::missing(format!("{} cube", key)))?;
        Cube::open(path)
    };
    let daily = open("dailyP")?;
    let monthly = open("P")?;
    let lai = open("LAI")?;
    if monthly.is_empty() {
        return Err(WorkflowError::missing(format!("slices in {}", monthly.name())));
    }

    let prefix = monthly
        .name()
        .split_once("_P_")
        .map_or(monthly.name(), |(basin, _)| basin)
        .to_string();
    let grid = monthly.slice(0)?;
    let nrd_manifest = CubeManifest::new(
        format!("{}_{}", prefix, RAINY_DAYS_CUBE),
        "nRD",
        "CHIRPS",
        "days/month",
        TemporalResolution::Monthly,
        &grid,
    );
    let i_manifest = CubeManifest::new(
        format!("{}_{}", prefix, INTERCEPTION_CUBE),
        "I",
        "WA",
        "mm/month",
        TemporalResolution::Monthly,
        &grid,
    );
    let mut nrd_writer = CubeWriter::create(dir, nrd_manifest, &grid)?;
    let mut i_writer = CubeWriter::create(dir, i_manifest, &grid)?;

    let total = monthly.len();
    for (index, timestamp) in monthly.timestamps().iter().enumerate() {
        let Some(date) = *timestamp else {
            ctx.warn(format!("P slice {} has no date, skipped", index));
            continue;
        };
        let label = month_label(date);
        ctx.progress(index, total, Some(&format!("Interception {}", label)));

        let p = monthly.slice(index)?;
        let days: Vec<Raster<f64>> = daily
            .month_indices(date.year(), date.month())
            .into_iter()
            .map(|i| daily.slice(i))
            .collect::<Result<_>>()?;
        let nrd = if days.is_empty() {
            ctx.warn(format!("No daily precipitation for {}, rainy days set to 0", label));
            zeros_like(&p)
        } else {
            rainy_days(&days)?
        };

        let i = match lai.month_index(date.year(), date.month()) {
            Some(li) => interception(&lai.slice(li)?, &p, &nrd)?,
            None => {
                ctx.warn(format!("No LAI for {}, interception set to 0", label));
                zeros_like(&p)
            }
        };

        nrd_writer.push(Some(date), &nrd)?;
        i_writer.push(Some(date), &i)?;
    }

    let rainy_days = nrd_writer.finish()?;
    let interception = i_writer.finish()?;
    ctx.force_progress(total, total, Some("Interception completed"));
    ctx.log(format!(
        "Rainfall interception processed for {} months",
        interception.len()
    ));
    Ok(InterceptionCubes {
        rainy_days,
        interception,
    })
}

#[derive(Debug, Deserialize)]
struct FlowRow {
    date: String,
    value: f64,
}

/// Monthly volumes from a `date,value` CSV
pub fn read_flow_csv(path: &Path) -> Result<BTreeMap<NaiveDate, f64>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;
    let mut flows = BTreeMap::new();
    for (line, row) in reader.deserialize::<FlowRow>().enumerate() {
        let row = row?;
        let date = parse_month(&row.date).ok_or_else(|| {
            WorkflowError::invalid(format!(
                "{}:{}: bad date '{}'",
                path.display(),
                line + 2,
                row.date
            ))
        })?;
        *flows.entry(date).or_insert(0.0) += row.value;
    }
    Ok(flows)
}

/// Cell area in m² for each row of `grid`.
///
/// Geographic grids use the spherical zone area between the row edges;
/// projected grids use the constant pixel area.
pub fn row_cell_areas<T: basinkit_core::RasterElement>(grid: &Raster<T>) -> Vec<f64> {
    let gt = grid.transform();
    let geographic = grid
        .crs()
        .and_then(|c| c.epsg())
        .is_some_and(|code| GEOGRAPHIC_EPSG.contains(&code));
    (0..grid.rows())
        .map(|row| {
            if geographic {
                let top = (gt.origin_y + row as f64 * gt.pixel_height).to_radians();
                let bottom = (gt.origin_y + (row + 1) as f64 * gt.pixel_height).to_radians();
                EARTH_RADIUS * EARTH_RADIUS
                    * gt.pixel_width.abs().to_radians()
                    * (top.sin() - bottom.sin()).abs()
            } else {
                (gt.pixel_width * gt.pixel_height).abs()
            }
        })
        .collect()
}

/// Basin volume of a depth raster (mm) in `units`
fn basin_volume(
    depth: &Raster<f64>,
    mask: &Raster<u8>,
    areas: &[f64],
    units: UnitConversion,
) -> Result<f64> {
    let mut weighted = depth.clone();
    for (mut row, &area) in weighted.data_mut().rows_mut().into_iter().zip(areas) {
        row.mapv_inplace(|v| v * area);
    }
    let mm_m2 = masked_sum(&weighted, mask)?;
    Ok(units.depth_to_volume(mm_m2, 1.0))
}

/// Basin-wide monthly water balance, written to `{basin}_timeseries.csv`
pub fn water_balance_step(
    config: &WorkflowConfig,
    ctx: &mut TaskContext<'_>,
) -> Result<BasinSeries> {
    config.validate()?;
    let units = config.units();
    let cubes = classify_cubes(&config.cube_dir())?;
    cubes.require(&["P", "ET", "I"])?;
    let open = |key: &str| -> Result<Cube> {
        let path = cubes
            .get(key)
            .ok_or_else(|| WorkflowError::missing(format!("{} cube", key)))?;
        Cube::open(path)
    };
    let p_cube = open("P")?;
    let et_cube = open("ET")?;
    let i_cube = open("I")?;

    let mask_path = basin_mask_path(config);
    require_path(&mask_path, "basin mask")?;
    let mask: Raster<u8> = read_geotiff(&mask_path, None)?;
    let areas = row_cell_areas(&mask);

    let load_flows = |path: &Option<PathBuf>| -> Result<BTreeMap<NaiveDate, f64>> {
        match path {
            Some(p) => read_flow_csv(p),
            None => Ok(BTreeMap::new()),
        }
    };
    let inflows = load_flows(&config.inflow)?;
    let outflows = load_flows(&config.outflow)?;

    let months: Vec<(usize, NaiveDate)> = p_cube
        .timestamps()
        .iter()
        .enumerate()
        .filter_map(|(i, t)| t.map(|d| (i, d)))
        .filter(|(_, d)| (config.start_year..=config.end_year).contains(&d.year()))
        .collect();
    if months.is_empty() {
        return Err(WorkflowError::invalid(format!(
            "no precipitation between {} and {}",
            config.start_year, config.end_year
        )));
    }

    let mut series = BasinSeries::new(config.basin_name.clone(), units.label());
    for (n, &(index, date)) in months.iter().enumerate() {
        let label = month_label(date);
        ctx.progress(n, months.len(), Some(&format!("Water balance {}", label)));

        let Some(et_index) = et_cube.month_index(date.year(), date.month()) else {
            ctx.warn(format!("No ET for {}, month skipped", label));
            continue;
        };
        let p = p_cube.slice(index)?;
        let et = et_cube.slice(et_index)?;
        let i = match i_cube.month_index(date.year(), date.month()) {
            Some(ii) => i_cube.slice(ii)?,
            None => zeros_like(&p),
        };
        let (green, blue) = et_split(&et, &p, &i)?;

        let precipitation = basin_volume(&p, &mask, &areas, units)?;
        let et_volume = basin_volume(&et, &mask, &areas, units)?;
        let inflow = inflows.get(&date).copied().unwrap_or(0.0);
        let outflow = outflows.get(&date).copied().unwrap_or(0.0);

        series.push(MonthlyRecord {
            date,
            precipitation,
            inflow,
            et: et_volume,
            storage: precipitation + inflow - et_volume - outflow,
            outflow,
            et_green: Some(basin_volume(&green, &mask, &areas, units)?),
            et_blue: Some(basin_volume(&blue, &mask, &areas, units)?),
        });
    }
    if series.is_empty() {
        return Err(WorkflowError::invalid("no month has both P and ET"));
    }

    std::fs::create_dir_all(&config.output_dir)?;
    let csv_path = timeseries_path(config);
    series.write_csv(&csv_path)?;
    ctx.log(format!(
        "Wrote {} months to {}",
        series.records.len(),
        csv_path.display()
    ));

    let boundary_copy = config
        .output_dir
        .join(format!("{}.geojson", config.basin_name));
    if boundary_copy != config.boundary {
        std::fs::copy(&config.boundary, &boundary_copy)?;
    }
    ctx.force_progress(months.len(), months.len(), Some("Water balance completed"));
    Ok(series)
}

/// Write `path` as `variable,value,unit` rows
fn write_summary(path: &Path, rows: &[(&str, f64, &str)]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["variable", "value", "unit"])?;
    for (variable, value, unit) in rows {
        writer.write_record([variable.to_string(), value.to_string(), unit.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

/// ET per land-use class for one year, from the LU and ET cubes
fn et_by_land_use(
    lu: &Cube,
    et: &Cube,
    year: i32,
    path: &Path,
    units: UnitConversion,
) -> Result<bool> {
    let indices: Vec<usize> = (1..=12)
        .filter_map(|m| et.month_index(year, m))
        .collect();
    let Some((&first, rest)) = indices.split_first() else {
        return Ok(false);
    };
    let mut total = et.slice(first)?;
    for &i in rest {
        let slice = et.slice(i)?;
        total
            .data_mut()
            .zip_mut_with(slice.data(), |a, &b| *a += b);
    }
    let classes = lu
        .timestamps()
        .iter()
        .position(|t| t.map_or(true, |d| d.year() == year))
        .unwrap_or(0);
    let zones = lu.slice(classes)?;
    let areas = row_cell_areas(&total);
    let mut volumes = total.clone();
    for (mut row, &area) in volumes.data_mut().rows_mut().into_iter().zip(&areas) {
        row.mapv_inplace(|v| units.depth_to_volume(v, area));
    }

    let stats = zonal_statistics(&total, &zones)?;
    let volume_stats = zonal_statistics(&volumes, &zones)?;
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["class", "cells", "mean_et_mm", "et_volume", "unit"])?;
    for (class, s) in &stats {
        let volume = volume_stats.get(class).map_or(0.0, |v| v.sum);
        writer.write_record([
            class.to_string(),
            s.count.to_string(),
            s.mean.to_string(),
            volume.to_string(),
            units.label().to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(true)
}

/// Per-year summary tables `{basin}_summary_{year}.csv`, plus
/// `{basin}_et_by_landuse_{year}.csv` when LU and ET cubes exist
pub fn summary_step(config: &WorkflowConfig, ctx: &mut TaskContext<'_>) -> Result<Vec<PathBuf>> {
    config.validate()?;
    let csv_path = timeseries_path(config);
    require_path(&csv_path, "time series")?;
    let units = config.units();
    let mut series = BasinSeries::read_csv(&csv_path, config.basin_name.clone())?;
    series.unit = units.label().to_string();
    let annual = series.annual(config.start_year, config.end_year)?;
    if annual.is_empty() {
        ctx.warn(format!(
            "No data between {} and {}",
            config.start_year, config.end_year
        ));
    }

    let cubes = classify_cubes(&config.cube_dir()).ok();
    let land_use = cubes
        .as_ref()
        .and_then(|c| Some((c.get("LU")?, c.get("ET")?)))
        .map(|(lu, et)| Ok::<_, WorkflowError>((Cube::open(lu)?, Cube::open(et)?)))
        .transpose()?;

    let unit = series.unit.as_str();
    let mut written = Vec::new();
    for (n, year) in annual.iter().enumerate() {
        ctx.progress(n, annual.len(), Some(&format!("Summary {}", year.year)));
        let path = config
            .output_dir
            .join(format!("{}_summary_{}.csv", config.basin_name, year.year));
        write_summary(
            &path,
            &[
                ("precipitation", year.precipitation, unit),
                ("inflow", year.inflow, unit),
                ("et", year.et, unit),
                ("et_green", year.et_green, unit),
                ("et_blue", year.et_blue, unit),
                ("storage_change", year.storage_change, unit),
                ("outflow", year.outflow, unit),
                ("residual", year.residual, unit),
                ("closure_error", year.closure_error_pct, "%"),
                ("months", year.months as f64, "count"),
            ],
        )?;
        ctx.log(format!("Wrote {}", path.display()));
        written.push(path);

        if let Some((lu, et)) = &land_use {
            let path = config
                .output_dir
                .join(format!("{}_et_by_landuse_{}.csv", config.basin_name, year.year));
            if et_by_land_use(lu, et, year.year, &path, units)? {
                ctx.log(format!("Wrote {}", path.display()));
                written.push(path);
            }
        }
    }
    ctx.force_progress(annual.len(), annual.len(), Some("Summary completed"));
    Ok(written)
}
