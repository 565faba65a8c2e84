// Decoding accuracy chart
// One line per category over time, with dashed markers at onset and chance level

use plotters::coord::Shift;
use plotters::prelude::*;
use std::ops::Range;
use std::path::Path;
use thiserror::Error;

use crate::config::ImageFormat;
use crate::decoding::{AccuracyCurve, CHANCE_LEVEL};

/// Rendered size in pixels
const CHART_SIZE: (u32, u32) = (1000, 500);

/// Number of dashes drawn along each marker line
const DASH_COUNT: usize = 40;

/// Onset and chance-level marker color
const MARKER_GREY: RGBColor = RGBColor(128, 128, 128);

#[derive(Debug, Error)]
pub enum PlotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Drawing error: {0}")]
    Draw(String),

    #[error("Invalid color '{0}', expected #rrggbb")]
    InvalidColor(String),

    #[error("Nothing to plot")]
    NoData,
}

pub type PlotResult<T> = Result<T, PlotError>;

/// A labelled curve to draw
#[derive(Debug, Clone, Copy)]
pub struct ChartSeries<'a> {
    pub label: &'a str,
    pub color: RGBColor,
    pub curve: &'a AccuracyCurve,
}

/// Parse a `#rrggbb` color
pub fn parse_color(hex: &str) -> PlotResult<RGBColor> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 || !digits.is_ascii() {
        return Err(PlotError::InvalidColor(hex.to_string()));
    }

    let channel = |range: Range<usize>| {
        u8::from_str_radix(&digits[range], 16).map_err(|_| PlotError::InvalidColor(hex.to_string()))
    };

    Ok(RGBColor(channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

/// Render every series to `path`, time axis in milliseconds
pub fn render_decoding_chart(
    path: &Path,
    title: &str,
    series: &[ChartSeries<'_>],
    format: ImageFormat,
) -> PlotResult<()> {
    if series.iter().all(|s| s.curve.is_empty()) {
        return Err(PlotError::NoData);
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    match format {
        ImageFormat::Png => {
            let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
            draw_chart(root, title, series)
        }
        ImageFormat::Svg => {
            let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
            draw_chart(root, title, series)
        }
    }
}

fn draw_chart<DB: DrawingBackend>(
    root: DrawingArea<DB, Shift>,
    title: &str,
    series: &[ChartSeries<'_>],
) -> PlotResult<()> {
    let draw_err = |e: DrawingAreaErrorKind<DB::ErrorType>| PlotError::Draw(e.to_string());

    root.fill(&WHITE).map_err(draw_err)?;

    let (x_range, y_range) = axis_ranges(series);

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 20))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(x_range.clone(), y_range.clone())
        .map_err(draw_err)?;

    chart
        .configure_mesh()
        .x_desc("Time (ms) relative to phoneme onset")
        .y_desc("ROC-AUC")
        .draw()
        .map_err(draw_err)?;

    for s in series {
        let color = s.color;
        let points: Vec<(f64, f64)> = s.curve.points().map(|(t, score)| (t * 1000.0, score)).collect();

        chart
            .draw_series(LineSeries::new(points, color.stroke_width(2)))
            .map_err(draw_err)?
            .label(s.label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
    }

    // Onset marker, only when t = 0 is on the axis
    if x_range.start <= 0.0 && x_range.end >= 0.0 {
        let segments = dashed_segments((0.0, y_range.start), (0.0, y_range.end), DASH_COUNT);
        chart
            .draw_series(
                segments
                    .into_iter()
                    .map(|segment| PathElement::new(segment, MARKER_GREY.stroke_width(1))),
            )
            .map_err(draw_err)?;
    }

    let segments = dashed_segments(
        (x_range.start, CHANCE_LEVEL),
        (x_range.end, CHANCE_LEVEL),
        DASH_COUNT,
    );
    chart
        .draw_series(
            segments
                .into_iter()
                .map(|segment| PathElement::new(segment, MARKER_GREY.stroke_width(1))),
        )
        .map_err(draw_err)?;

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .position(SeriesLabelPosition::UpperRight)
        .draw()
        .map_err(draw_err)?;

    root.present().map_err(draw_err)?;
    Ok(())
}

/// Time range in milliseconds and a score range that always shows chance level
fn axis_ranges(series: &[ChartSeries<'_>]) -> (Range<f64>, Range<f64>) {
    let mut t_min = f64::INFINITY;
    let mut t_max = f64::NEG_INFINITY;
    let mut y_min = CHANCE_LEVEL;
    let mut y_max = CHANCE_LEVEL;

    for (t, score) in series.iter().flat_map(|s| s.curve.points()) {
        t_min = t_min.min(t * 1000.0);
        t_max = t_max.max(t * 1000.0);
        y_min = y_min.min(score);
        y_max = y_max.max(score);
    }

    if !t_min.is_finite() || !t_max.is_finite() {
        t_min = 0.0;
        t_max = 1.0;
    }
    if t_max - t_min < f64::EPSILON {
        t_min -= 1.0;
        t_max += 1.0;
    }

    let y_lo = (y_min - 0.05).max(0.0);
    let y_hi = (y_max + 0.05).min(1.0);
    (t_min..t_max, y_lo..y_hi)
}

/// Split the segment `from -> to` into `count` dashes separated by equal gaps
fn dashed_segments(from: (f64, f64), to: (f64, f64), count: usize) -> Vec<Vec<(f64, f64)>> {
    let pieces = (count * 2).max(1) as f64;
    let at = |k: f64| {
        (
            from.0 + (to.0 - from.0) * k / pieces,
            from.1 + (to.1 - from.1) * k / pieces,
        )
    };

    (0..count)
        .map(|i| {
            let start = (2 * i) as f64;
            vec![at(start), at(start + 1.0)]
        })
        .collect()
}
