//! Plotly figures built from a basin series

use crate::error::{DashboardError, Result};
use basinkit_core::timeseries::{AnnualBalance, BasinSeries};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    /// Grouped annual bars of every balance component
    Balance,
    /// Monthly lines
    Monthly,
    /// Stacked annual green and blue ET
    EtSplit,
    /// Annual closure error in percent
    Closure,
}

impl ChartKind {
    pub const ALL: [ChartKind; 4] = [
        ChartKind::Balance,
        ChartKind::Monthly,
        ChartKind::EtSplit,
        ChartKind::Closure,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Balance => "balance",
            ChartKind::Monthly => "monthly",
            ChartKind::EtSplit => "et-split",
            ChartKind::Closure => "closure",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChartKind {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self> {
        ChartKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| DashboardError::not_found(format!("unknown chart '{}'", s)))
    }
}

fn bar(name: &str, x: &[i32], y: Vec<f64>, color: &str) -> Value {
    json!({ "type": "bar", "name": name, "x": x, "y": y, "marker": { "color": color } })
}

fn layout(title: String, y_title: &str, barmode: Option<&str>) -> Value {
    let mut layout = json!({
        "title": { "text": title },
        "xaxis": { "title": { "text": "Year" } },
        "yaxis": { "title": { "text": y_title } },
        "legend": { "orientation": "h" },
    });
    if let Some(mode) = barmode {
        layout["barmode"] = json!(mode);
    }
    layout
}

fn years(annual: &[AnnualBalance]) -> Vec<i32> {
    annual.iter().map(|a| a.year).collect()
}

fn component(annual: &[AnnualBalance], f: impl Fn(&AnnualBalance) -> f64) -> Vec<f64> {
    annual.iter().map(f).collect()
}

/// Figure for `kind` over `start..=end`
pub fn figure(kind: ChartKind, series: &BasinSeries, start: i32, end: i32) -> Result<Value> {
    let unit = series.unit.as_str();
    let figure = match kind {
        ChartKind::Monthly => {
            let records = series.filter_years(start, end)?;
            let dates: Vec<String> = records
                .iter()
                .map(|r| r.date.format("%Y-%m").to_string())
                .collect();
            let line = |name: &str, y: Vec<f64>| {
                json!({ "type": "scatter", "mode": "lines+markers", "name": name, "x": dates, "y": y })
            };
            let data = vec![
                line("Precipitation", records.iter().map(|r| r.precipitation).collect()),
                line("Inflow", records.iter().map(|r| r.inflow).collect()),
                line("ET", records.iter().map(|r| r.et).collect()),
                line("Outflow", records.iter().map(|r| r.outflow).collect()),
                line("ΔS", records.iter().map(|r| r.storage).collect()),
            ];
            let mut layout = layout(format!("{} monthly balance", series.basin), unit, None);
            layout["xaxis"]["title"]["text"] = json!("Month");
            json!({ "data": data, "layout": layout })
        }
        ChartKind::Balance => {
            let annual = series.annual(start, end)?;
            let x = years(&annual);
            let data = vec![
                bar("Precipitation", &x, component(&annual, |a| a.precipitation), "#1f77b4"),
                bar("Inflow", &x, component(&annual, |a| a.inflow), "#17becf"),
                bar("ET", &x, component(&annual, |a| a.et), "#2ca02c"),
                bar("Outflow", &x, component(&annual, |a| a.outflow), "#9467bd"),
                bar("ΔS", &x, component(&annual, |a| a.storage_change), "#ff7f0e"),
            ];
            let layout = layout(format!("{} annual balance", series.basin), unit, Some("group"));
            json!({ "data": data, "layout": layout })
        }
        ChartKind::EtSplit => {
            let annual = series.annual(start, end)?;
            let x = years(&annual);
            let data = vec![
                bar("Green ET", &x, component(&annual, |a| a.et_green), "#2ca02c"),
                bar("Blue ET", &x, component(&annual, |a| a.et_blue), "#1f77b4"),
            ];
            let layout = layout(format!("{} green and blue ET", series.basin), unit, Some("stack"));
            json!({ "data": data, "layout": layout })
        }
        ChartKind::Closure => {
            let annual = series.annual(start, end)?;
            let data = vec![json!({
                "type": "scatter",
                "mode": "lines+markers",
                "name": "Closure error",
                "x": years(&annual),
                "y": component(&annual, |a| a.closure_error_pct),
            })];
            let layout = layout(format!("{} closure error", series.basin), "%", None);
            json!({ "data": data, "layout": layout })
        }
    };
    Ok(figure)
}
