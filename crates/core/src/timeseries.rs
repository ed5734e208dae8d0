//! Basin water-balance time series
//!
//! A basin series holds one record per month with the water-balance
//! components in volume units (MCM or km³). `storage` is the storage
//! *change* over the month, so a closed balance satisfies
//! `P + inflow - ET - outflow - ΔS = 0`.

use crate::error::{Error, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// One month of basin water-balance components
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRecord {
    /// First day of the month
    pub date: NaiveDate,
    pub precipitation: f64,
    pub inflow: f64,
    pub et: f64,
    /// Storage change over the month
    pub storage: f64,
    pub outflow: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub et_green: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub et_blue: Option<f64>,
}

impl MonthlyRecord {
    /// Green (rainfall-derived) and blue (withdrawn) ET for this month.
    ///
    /// Explicit values win; otherwise green ET is bounded by precipitation.
    pub fn green_blue(&self) -> (f64, f64) {
        match (self.et_green, self.et_blue) {
            (Some(g), Some(b)) => (g, b),
            (Some(g), None) => (g, (self.et - g).max(0.0)),
            (None, Some(b)) => ((self.et - b).max(0.0), b),
            (None, None) => {
                let green = self.et.min(self.precipitation.max(0.0));
                (green, self.et - green)
            }
        }
    }

    /// `P + inflow - ET - outflow - ΔS`
    pub fn residual(&self) -> f64 {
        self.precipitation + self.inflow - self.et - self.outflow - self.storage
    }
}

/// Yearly aggregate of a basin series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualBalance {
    pub year: i32,
    pub months: usize,
    pub precipitation: f64,
    pub inflow: f64,
    pub et: f64,
    pub et_green: f64,
    pub et_blue: f64,
    pub storage_change: f64,
    pub outflow: f64,
    pub residual: f64,
    /// `100 * |residual| / (P + inflow)`, 0 when nothing (or a negative
    /// amount) entered the basin
    pub closure_error_pct: f64,
}

/// Monthly water-balance series of one basin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasinSeries {
    pub basin: String,
    /// Volume unit label, e.g. `MCM`
    pub unit: String,
    pub records: Vec<MonthlyRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Date,
    Precipitation,
    Inflow,
    Et,
    Storage,
    Outflow,
    EtGreen,
    EtBlue,
}

impl Column {
    fn from_header(name: &str) -> Option<Self> {
        let column = match name.trim().to_ascii_lowercase().as_str() {
            "date" | "month" | "time" => Column::Date,
            "precipitation" | "p" | "rain" | "rainfall" => Column::Precipitation,
            "inflow" | "q_in" => Column::Inflow,
            "et" | "eta" | "evapotranspiration" => Column::Et,
            "storage" | "ds" | "storage_change" | "delta_s" => Column::Storage,
            "outflow" | "q_out" => Column::Outflow,
            "et_green" | "green_et" => Column::EtGreen,
            "et_blue" | "blue_et" => Column::EtBlue,
            _ => return None,
        };
        Some(column)
    }
}

const REQUIRED: [(Column, &str); 6] = [
    (Column::Date, "date"),
    (Column::Precipitation, "precipitation"),
    (Column::Inflow, "inflow"),
    (Column::Et, "et"),
    (Column::Storage, "storage"),
    (Column::Outflow, "outflow"),
];

/// Parse `YYYY-MM`, `YYYY-MM-DD` or `YYYY/MM/DD` into the first day of the month
pub fn parse_month(text: &str) -> Option<NaiveDate> {
    let normalized = text.trim().replace('/', "-");
    let mut parts = normalized.split('-');
    let year: i32 = parts.next()?.trim().parse().ok()?;
    let month: u32 = parts.next()?.trim().parse().ok()?;
    if let Some(day) = parts.next() {
        let day: u32 = day.trim().parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)?;
    }
    if parts.next().is_some() {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, 1)
}

impl BasinSeries {
    pub fn new(basin: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            basin: basin.into(),
            unit: unit.into(),
            records: Vec::new(),
        }
    }

    /// Append a record, keeping the series sorted by date
    pub fn push(&mut self, record: MonthlyRecord) {
        let at = self.records.partition_point(|r| r.date <= record.date);
        self.records.insert(at, record);
    }

    /// Read a series from CSV.
    ///
    /// Column names are case-insensitive and several aliases are accepted
    /// (`p`, `rain`, `eta`, `ds`, ...). `et_green`/`et_blue` are optional and
    /// empty cells there mean "not provided"; an empty cell in any other
    /// column is an error.
    pub fn read_csv<P: AsRef<Path>>(path: P, basin: impl Into<String>) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)?;

        let mut index: BTreeMap<usize, Column> = BTreeMap::new();
        for (i, name) in reader.headers()?.iter().enumerate() {
            if let Some(column) = Column::from_header(name) {
                index.insert(i, column);
            }
        }
        for (column, name) in REQUIRED {
            if !index.values().any(|c| *c == column) {
                return Err(Error::parse(
                    path.display().to_string(),
                    format!("missing required column '{}'", name),
                ));
            }
        }

        let mut series = BasinSeries::new(basin, "MCM");
        for (line, row) in reader.records().enumerate() {
            let row = row?;
            let location = || format!("{}:{}", path.display(), line + 2);

            let mut date = None;
            let mut values = [0.0f64; 5];
            let mut green = None;
            let mut blue = None;

            for (i, column) in &index {
                let cell = row.get(*i).unwrap_or("");
                let number = || -> Result<Option<f64>> {
                    if cell.is_empty() {
                        return Ok(None);
                    }
                    cell.parse::<f64>()
                        .map(Some)
                        .map_err(|_| Error::parse(location(), format!("invalid number '{}'", cell)))
                };
                let required = |name: &str| -> Result<f64> {
                    number()?.ok_or_else(|| {
                        Error::parse(location(), format!("empty value for '{}'", name))
                    })
                };
                match column {
                    Column::Date => {
                        date = Some(parse_month(cell).ok_or_else(|| {
                            Error::parse(location(), format!("invalid date '{}'", cell))
                        })?)
                    }
                    Column::Precipitation => values[0] = required("precipitation")?,
                    Column::Inflow => values[1] = required("inflow")?,
                    Column::Et => values[2] = required("et")?,
                    Column::Storage => values[3] = required("storage")?,
                    Column::Outflow => values[4] = required("outflow")?,
                    Column::EtGreen => green = number()?,
                    Column::EtBlue => blue = number()?,
                }
            }

            let date = date.ok_or_else(|| Error::parse(location(), "missing date"))?;
            series.push(MonthlyRecord {
                date,
                precipitation: values[0],
                inflow: values[1],
                et: values[2],
                storage: values[3],
                outflow: values[4],
                et_green: green,
                et_blue: blue,
            });
        }

        Ok(series)
    }

    /// Write the series with the canonical header
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::Writer::from_path(path.as_ref())?;
        writer.write_record([
            "date",
            "precipitation",
            "inflow",
            "et",
            "storage",
            "outflow",
            "et_green",
            "et_blue",
        ])?;
        let opt = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();
        for r in &self.records {
            writer.write_record([
                r.date.format("%Y-%m").to_string(),
                r.precipitation.to_string(),
                r.inflow.to_string(),
                r.et.to_string(),
                r.storage.to_string(),
                r.outflow.to_string(),
                opt(r.et_green),
                opt(r.et_blue),
            ])?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// First and last year with data
    pub fn years(&self) -> Option<(i32, i32)> {
        let first = self.records.first()?.date.year();
        let last = self.records.last()?.date.year();
        Some((first, last))
    }

    /// Records with `start <= year <= end`
    pub fn filter_years(&self, start: i32, end: i32) -> Result<Vec<&MonthlyRecord>> {
        check_range(start, end)?;
        Ok(self
            .records
            .iter()
            .filter(|r| (start..=end).contains(&r.date.year()))
            .collect())
    }

    /// Calendar-year aggregates for `start..=end`, one per year with data
    pub fn annual(&self, start: i32, end: i32) -> Result<Vec<AnnualBalance>> {
        let mut years: BTreeMap<i32, AnnualBalance> = BTreeMap::new();

        for r in self.filter_years(start, end)? {
            let year = r.date.year();
            let entry = years.entry(year).or_insert_with(|| AnnualBalance {
                year,
                months: 0,
                precipitation: 0.0,
                inflow: 0.0,
                et: 0.0,
                et_green: 0.0,
                et_blue: 0.0,
                storage_change: 0.0,
                outflow: 0.0,
                residual: 0.0,
                closure_error_pct: 0.0,
            });
            let (green, blue) = r.green_blue();
            entry.months += 1;
            entry.precipitation += r.precipitation;
            entry.inflow += r.inflow;
            entry.et += r.et;
            entry.et_green += green;
            entry.et_blue += blue;
            entry.storage_change += r.storage;
            entry.outflow += r.outflow;
        }

        Ok(years
            .into_values()
            .map(|mut a| {
                a.residual = a.precipitation + a.inflow - a.et - a.outflow - a.storage_change;
                let entering = a.precipitation + a.inflow;
                a.closure_error_pct = if entering > f64::EPSILON {
                    100.0 * a.residual.abs() / entering
                } else {
                    0.0
                };
                a
            })
            .collect())
    }
}

fn check_range(start: i32, end: i32) -> Result<()> {
    if start > end {
        return Err(Error::invalid_parameter(
            "start_year",
            start,
            format!("must be less than or equal to end year {}", end),
        ));
    }
    Ok(())
}
