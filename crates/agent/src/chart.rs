//! Chart preparation and rendering for visualization-flavored questions.
//!
//! Preparation (keyword detection, chart-kind choice, column selection) is
//! pure and fully tested; rendering is the raster leaf that turns a prepared
//! spec into a base64 PNG. Images use plain shapes only, with the axis
//! labels carried in the caption text instead of drawn text.

use askdb_core::tabulate::ResultRow;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use plotters::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::prompts::VISUALIZATION_KEYWORDS;

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;

const PALETTE: [RGBColor; 6] = [
    RGBColor(66, 133, 244),
    RGBColor(219, 68, 55),
    RGBColor(244, 180, 0),
    RGBColor(15, 157, 88),
    RGBColor(171, 71, 188),
    RGBColor(0, 172, 193),
];

pub fn wants_visualization(question: &str) -> bool {
    let lowered = question.to_lowercase();
    VISUALIZATION_KEYWORDS.iter().any(|keyword| lowered.contains(keyword))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Bar,
    Pie,
    Line,
}

/// Picks the chart kind from question phrasing. Pie wins over line wins over
/// bar; anything unspecific becomes a bar chart.
pub fn choose_kind(question: &str) -> ChartKind {
    let lowered = question.to_lowercase();
    if ["pie", "percentage", "proportion"].iter().any(|kw| lowered.contains(kw)) {
        ChartKind::Pie
    } else if ["line", "trend", "over time"].iter().any(|kw| lowered.contains(kw)) {
        ChartKind::Line
    } else {
        ChartKind::Bar
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ChartError {
    #[error("insufficient data for a chart: {0}")]
    InsufficientData(String),
    #[error("chart rendering failed: {0}")]
    Render(String),
}

/// A fully decided chart: kind, labels, and the (label, value) points.
#[derive(Clone, Debug, PartialEq)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub category_label: String,
    pub value_label: String,
    pub points: Vec<(String, f64)>,
}

impl ChartSpec {
    /// Selects columns from the rows: the first numeric column carries the
    /// values, the first textual column the labels. Only line charts may fall
    /// back to row-index labels; bar and pie need a real category column.
    pub fn prepare(question: &str, rows: &[ResultRow]) -> Result<Self, ChartError> {
        let kind = choose_kind(question);

        let first = rows
            .first()
            .ok_or_else(|| ChartError::InsufficientData("no result rows".into()))?;

        let value_label = first
            .iter()
            .find(|(_, value)| value.is_number())
            .map(|(name, _)| name.clone())
            .ok_or_else(|| ChartError::InsufficientData("no numeric column".into()))?;

        let category_label = first
            .iter()
            .find(|(name, value)| value.is_string() && name.as_str() != value_label.as_str())
            .map(|(name, _)| name.clone());

        if category_label.is_none() && kind != ChartKind::Line {
            return Err(ChartError::InsufficientData("no category column".into()));
        }

        let points: Vec<(String, f64)> = rows
            .iter()
            .enumerate()
            .filter_map(|(index, row)| {
                let value = row.get(&value_label).and_then(Value::as_f64)?;
                let label = match &category_label {
                    Some(name) => row
                        .get(name)
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    None => (index + 1).to_string(),
                };
                Some((label, value))
            })
            .collect();

        if points.is_empty() {
            return Err(ChartError::InsufficientData("no plottable values".into()));
        }

        if kind == ChartKind::Pie && points.iter().map(|(_, v)| v.max(0.0)).sum::<f64>() <= 0.0 {
            return Err(ChartError::InsufficientData("pie values sum to zero".into()));
        }

        Ok(Self {
            kind,
            category_label: category_label.unwrap_or_else(|| "row".to_string()),
            value_label,
            points,
        })
    }

    pub fn caption(&self) -> String {
        match self.kind {
            ChartKind::Bar => {
                format!("Bar chart of {} by {}", self.value_label, self.category_label)
            }
            ChartKind::Pie => {
                format!("Pie chart of {} share by {}", self.value_label, self.category_label)
            }
            ChartKind::Line => {
                format!("Line chart of {} over {}", self.value_label, self.category_label)
            }
        }
    }
}

/// A rendered chart ready for the API response.
#[derive(Clone, Debug, Serialize)]
pub struct Visualization {
    pub kind: ChartKind,
    pub caption: String,
    pub image_base64: String,
}

pub fn render(spec: &ChartSpec) -> Result<Visualization, ChartError> {
    let mut buffer = vec![0u8; (WIDTH * HEIGHT * 3) as usize];

    {
        let root = BitMapBackend::with_buffer(&mut buffer, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&WHITE).map_err(render_error)?;

        match spec.kind {
            ChartKind::Bar => draw_bars(&root, &spec.points)?,
            ChartKind::Pie => draw_pie(&root, &spec.points)?,
            ChartKind::Line => draw_line(&root, &spec.points)?,
        }

        root.present().map_err(render_error)?;
    }

    let mut png = Vec::new();
    PngEncoder::new(&mut png)
        .write_image(&buffer, WIDTH, HEIGHT, ExtendedColorType::Rgb8)
        .map_err(|err| ChartError::Render(err.to_string()))?;

    Ok(Visualization {
        kind: spec.kind,
        caption: spec.caption(),
        image_base64: STANDARD.encode(&png),
    })
}

type Root<'a> = DrawingArea<BitMapBackend<'a>, plotters::coord::Shift>;

fn render_error<E: std::fmt::Display>(err: E) -> ChartError {
    ChartError::Render(err.to_string())
}

fn draw_bars(root: &Root<'_>, points: &[(String, f64)]) -> Result<(), ChartError> {
    let max = points.iter().map(|(_, v)| v.max(0.0)).fold(0.0_f64, f64::max).max(1.0);
    let plot_left = 40i32;
    let plot_right = WIDTH as i32 - 40;
    let baseline = HEIGHT as i32 - 40;
    let plot_top = 40i32;

    let slot = (plot_right - plot_left) / points.len().max(1) as i32;
    let gap = slot / 5;

    for (index, (_, value)) in points.iter().enumerate() {
        let x0 = plot_left + slot * index as i32 + gap / 2;
        let x1 = x0 + slot - gap;
        let height = ((value.max(0.0) / max) * (baseline - plot_top) as f64) as i32;
        let color = PALETTE[index % PALETTE.len()];
        root.draw(&Rectangle::new([(x0, baseline - height), (x1, baseline)], color.filled()))
            .map_err(render_error)?;
    }

    root.draw(&PathElement::new(
        vec![(plot_left, baseline), (plot_right, baseline)],
        RGBColor(60, 60, 60),
    ))
    .map_err(render_error)?;
    Ok(())
}

fn draw_pie(root: &Root<'_>, points: &[(String, f64)]) -> Result<(), ChartError> {
    let total: f64 = points.iter().map(|(_, v)| v.max(0.0)).sum();
    let center = (WIDTH as i32 / 2, HEIGHT as i32 / 2);
    let radius = 180.0_f64;

    let mut start_angle = -std::f64::consts::FRAC_PI_2;
    for (index, (_, value)) in points.iter().enumerate() {
        let share = value.max(0.0) / total;
        if share == 0.0 {
            continue;
        }
        let end_angle = start_angle + share * std::f64::consts::TAU;

        let mut vertices = vec![center];
        let steps = (share * 120.0).ceil().max(2.0) as usize;
        for step in 0..=steps {
            let angle = start_angle + (end_angle - start_angle) * step as f64 / steps as f64;
            vertices.push((
                center.0 + (radius * angle.cos()) as i32,
                center.1 + (radius * angle.sin()) as i32,
            ));
        }

        let color = PALETTE[index % PALETTE.len()];
        root.draw(&Polygon::new(vertices, color.filled())).map_err(render_error)?;
        start_angle = end_angle;
    }
    Ok(())
}

fn draw_line(root: &Root<'_>, points: &[(String, f64)]) -> Result<(), ChartError> {
    let max = points.iter().map(|(_, v)| v.max(0.0)).fold(0.0_f64, f64::max).max(1.0);
    let plot_left = 40i32;
    let plot_right = WIDTH as i32 - 40;
    let baseline = HEIGHT as i32 - 40;
    let plot_top = 40i32;

    let step = if points.len() > 1 {
        (plot_right - plot_left) / (points.len() - 1) as i32
    } else {
        0
    };

    let vertices: Vec<(i32, i32)> = points
        .iter()
        .enumerate()
        .map(|(index, (_, value))| {
            let x = plot_left + step * index as i32;
            let y = baseline - ((value.max(0.0) / max) * (baseline - plot_top) as f64) as i32;
            (x, y)
        })
        .collect();

    for &(x, y) in &vertices {
        root.draw(&Rectangle::new([(x - 2, y - 2), (x + 2, y + 2)], PALETTE[0].filled()))
            .map_err(render_error)?;
    }
    root.draw(&PathElement::new(vertices, PALETTE[0].stroke_width(2))).map_err(render_error)?;
    root.draw(&PathElement::new(
        vec![(plot_left, baseline), (plot_right, baseline)],
        RGBColor(60, 60, 60),
    ))
    .map_err(render_error)?;
    Ok(())
}
