// Panel renderer - Maps fetched series and panel metadata onto one SVG plot
use crate::application::error::RenderError;
use crate::domain::dashboard::{Panel, Threshold};
use crate::domain::render::{Artifact, Dimensions};
use crate::domain::telemetry::{QueryResult, TimeRange, TimeSeries};
use crate::domain::variable::VariableAssignment;
use chrono::DateTime;
use plotters::prelude::*;
use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

static LEGEND_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([a-zA-Z_][a-zA-Z0-9_]*)\s*\}\}").expect("legend placeholder regex")
});

const FONT: &str = "sans-serif";
const GRAY: RGBColor = RGBColor(128, 128, 128);

struct Line {
    legend: String,
    points: Vec<(i64, f64)>,
}

#[derive(Debug, Clone, Default)]
pub struct PanelRenderer;

impl PanelRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Draw one plot for a (panel, assignment) pair. Empty data still yields
    /// an artifact, annotated as such.
    pub fn render(
        &self,
        panel: &Panel,
        assignment: &VariableAssignment,
        results: &[QueryResult],
        range: &TimeRange,
        dimensions: Dimensions,
    ) -> Result<Artifact, RenderError> {
        if !panel.kind.is_supported() {
            return Err(RenderError::UnsupportedPanel(panel.kind.as_str().to_string()));
        }
        if !dimensions.is_valid() {
            return Err(RenderError::InvalidDimensions {
                width: dimensions.width,
                height: dimensions.height,
            });
        }

        let title = panel_title(panel, assignment);
        let lines = collect_lines(results);
        let x_range = range.from.timestamp_millis()..range.to.timestamp_millis();
        let y_range = value_range(&lines, panel.y_min, panel.y_max);

        let svg = draw(
            &title,
            &lines,
            &panel.thresholds,
            panel.unit.as_deref(),
            x_range,
            y_range,
            dimensions,
        )?;

        Ok(Artifact {
            title,
            dimensions,
            svg,
        })
    }
}

/// Panel title, plus the expanded variable values when there are any
pub fn panel_title(panel: &Panel, assignment: &VariableAssignment) -> String {
    let base = if panel.title.trim().is_empty() {
        format!("Panel {}", panel.id)
    } else {
        panel.title.clone()
    };

    if assignment.is_default_pass() {
        base
    } else {
        format!("{} ({})", base, assignment.describe())
    }
}

/// Expand `{{label}}` placeholders against one series' own labels
pub fn format_legend(format: Option<&str>, series: &TimeSeries) -> String {
    let format = match format.map(str::trim) {
        Some(f) if !f.is_empty() && f != "__auto" => f,
        _ => return series.display_name(),
    };

    let legend = LEGEND_PLACEHOLDER.replace_all(format, |caps: &regex::Captures| {
        series.labels.get(&caps[1]).cloned().unwrap_or_default()
    });

    if legend.trim().is_empty() {
        series.display_name()
    } else {
        legend.into_owned()
    }
}

fn collect_lines(results: &[QueryResult]) -> Vec<Line> {
    let mut lines = Vec::new();
    for result in results {
        for series in &result.series {
            let points: Vec<(i64, f64)> = series
                .points
                .iter()
                .filter(|p| p.value.is_finite())
                .map(|p| (p.time_ms, p.value))
                .collect();
            if points.is_empty() {
                continue;
            }

            let mut legend = format_legend(result.legend_format.as_deref(), series);
            if legend.is_empty() {
                legend = result.ref_id.clone();
            }
            lines.push(Line { legend, points });
        }
    }
    lines
}

fn value_range(lines: &[Line], y_min: Option<f64>, y_max: Option<f64>) -> Range<f64> {
    let (min, max) = lines
        .iter()
        .flat_map(|l| l.points.iter().map(|(_, v)| *v))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });

    let (mut low, mut high) = if !min.is_finite() {
        (0.0, 1.0)
    } else if min == max {
        (min - 1.0, max + 1.0)
    } else {
        let pad = (max - min) * 0.05;
        let low = if min >= 0.0 { (min - pad).max(0.0) } else { min - pad };
        (low, max + pad)
    };

    if let Some(v) = y_min {
        low = v;
    }
    if let Some(v) = y_max {
        high = v;
    }
    if low >= high {
        high = low + 1.0;
    }
    low..high
}

fn draw(
    title: &str,
    lines: &[Line],
    thresholds: &[Threshold],
    unit: Option<&str>,
    x_range: Range<i64>,
    y_range: Range<f64>,
    dimensions: Dimensions,
) -> Result<String, RenderError> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (dimensions.width, dimensions.height))
            .into_drawing_area();
        root.fill(&WHITE).map_err(drawing)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(title, (FONT, 20))
            .margin(12)
            .x_label_area_size(36)
            .y_label_area_size(72)
            .build_cartesian_2d(x_range.clone(), y_range.clone())
            .map_err(drawing)?;

        let span_ms = x_range.end - x_range.start;
        chart
            .configure_mesh()
            .x_labels(8)
            .y_labels(6)
            .x_label_formatter(&|ms| format_time(*ms, span_ms))
            .y_label_formatter(&|v| format_value(unit, *v))
            .draw()
            .map_err(drawing)?;

        for threshold in thresholds.iter().filter(|t| y_range.contains(&t.value)) {
            let color = threshold_color(&threshold.color);
            chart
                .draw_series(LineSeries::new(
                    vec![(x_range.start, threshold.value), (x_range.end, threshold.value)],
                    color.stroke_width(1),
                ))
                .map_err(drawing)?;
        }

        for (i, line) in lines.iter().enumerate() {
            let color = Palette99::pick(i).to_rgba();
            chart
                .draw_series(LineSeries::new(line.points.iter().copied(), color.stroke_width(2)))
                .map_err(drawing)?
                .label(line.legend.clone())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 16, y)], color.stroke_width(2)));
        }

        if lines.is_empty() {
            let center = (
                x_range.start + span_ms / 2,
                (y_range.start + y_range.end) / 2.0,
            );
            chart
                .draw_series(std::iter::once(Text::new(
                    "No data",
                    center,
                    (FONT, 24).into_font().color(&GRAY),
                )))
                .map_err(drawing)?;
        } else {
            chart
                .configure_series_labels()
                .position(SeriesLabelPosition::UpperLeft)
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()
                .map_err(drawing)?;
        }

        root.present().map_err(drawing)?;
    }
    Ok(svg)
}

fn drawing<E: std::fmt::Display>(e: E) -> RenderError {
    RenderError::Drawing(e.to_string())
}

fn format_time(ms: i64, span_ms: i64) -> String {
    const DAY_MS: i64 = 24 * 3600 * 1000;

    let Some(time) = DateTime::from_timestamp_millis(ms) else {
        return String::new();
    };
    if span_ms <= DAY_MS {
        time.format("%H:%M").to_string()
    } else if span_ms <= 30 * DAY_MS {
        time.format("%m-%d %H:%M").to_string()
    } else {
        time.format("%Y-%m-%d").to_string()
    }
}

fn threshold_color(name: &str) -> RGBColor {
    if let Some(hex) = name.strip_prefix('#') {
        if hex.len() == 6 {
            if let Ok(rgb) = u32::from_str_radix(hex, 16) {
                return RGBColor((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8);
            }
        }
    }

    match name {
        "green" | "dark-green" => RGBColor(115, 191, 105),
        "yellow" => RGBColor(250, 222, 42),
        "orange" => RGBColor(255, 152, 48),
        "blue" => RGBColor(87, 148, 242),
        "purple" => RGBColor(184, 119, 217),
        _ => RGBColor(242, 73, 92),
    }
}

/// Axis label for a value in the panel's Grafana unit
pub fn format_value(unit: Option<&str>, value: f64) -> String {
    match unit.unwrap_or("short") {
        "percent" => format!("{}%", compact(value)),
        "percentunit" => format!("{}%", compact(value * 100.0)),
        "bytes" => scaled(value, 1024.0, " ", &["B", "KiB", "MiB", "GiB", "TiB", "PiB"]),
        "decbytes" => scaled(value, 1000.0, " ", &["B", "kB", "MB", "GB", "TB", "PB"]),
        "bps" => scaled(value, 1000.0, " ", &["b/s", "kb/s", "Mb/s", "Gb/s", "Tb/s"]),
        "Bps" => scaled(value, 1000.0, " ", &["B/s", "kB/s", "MB/s", "GB/s", "TB/s"]),
        "s" => seconds(value),
        "ms" => seconds(value / 1000.0),
        "none" => compact(value),
        _ => scaled(value, 1000.0, "", &["", "K", "M", "B", "T"]),
    }
}

fn scaled(value: f64, base: f64, sep: &str, units: &[&str]) -> String {
    let mut v = value;
    let mut i = 0;
    while v.abs() >= base && i < units.len() - 1 {
        v /= base;
        i += 1;
    }
    if units[i].is_empty() {
        compact(v)
    } else {
        format!("{}{}{}", compact(v), sep, units[i])
    }
}

fn seconds(value: f64) -> String {
    let abs = value.abs();
    if abs == 0.0 {
        "0 s".to_string()
    } else if abs < 1.0 {
        format!("{} ms", compact(value * 1000.0))
    } else if abs < 60.0 {
        format!("{} s", compact(value))
    } else if abs < 3600.0 {
        format!("{} min", compact(value / 60.0))
    } else {
        format!("{} h", compact(value / 3600.0))
    }
}

fn compact(value: f64) -> String {
    let formatted = format!("{:.2}", value);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}
