//! PNG figures for the outlier and laterality analyses.
//!
//! Every figure is drawn with plotters on the bitmap backend. Multi-rat
//! figures place one panel per rat on a two-column grid.

pub mod distributions;
pub mod laterality;

use std::ops::Range;
use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use thiserror::Error;

pub use distributions::{plot_outlier_frequency, plot_size_distribution};
pub use laterality::{
    plot_average_absolute_li, plot_bland_altman, plot_concordance_heatmap, plot_li_ranked,
    plot_scatter,
};

/// Errors that can occur during visualization.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plotting error: {0}")]
    PlottingError(String),

    #[error("Nothing to plot: {0}")]
    EmptyData(String),
}

/// Result type for visualization operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

/// Bitmap drawing area used by every panel.
pub(crate) type Panel<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

pub(crate) fn plotting<E: std::fmt::Display>(e: E) -> VisualizationError {
    VisualizationError::PlottingError(e.to_string())
}

/// Creates the parent directory and a white canvas of `size` pixels.
pub(crate) fn canvas(path: &Path, size: (u32, u32)) -> Result<Panel<'_>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE).map_err(plotting)?;
    Ok(root)
}

/// `(rows, columns)` of the panel grid for `panels` panels: two columns, or
/// a single panel when there is only one.
pub fn grid_shape(panels: usize) -> (usize, usize) {
    match panels {
        0 | 1 => (1, 1),
        n => (n.div_ceil(2), 2),
    }
}

/// Canvas size of a grid of panels.
pub fn canvas_size(grid: (usize, usize), panel: (u32, u32)) -> (u32, u32) {
    (panel.0 * grid.1 as u32, panel.1 * grid.0 as u32)
}

/// Range covering the values with 5% padding on each side.
pub fn padded_range(values: impl IntoIterator<Item = f64>) -> Range<f64> {
    let (mut min, mut max) = (f64::INFINITY, f64::NEG_INFINITY);
    for v in values.into_iter().filter(|v| v.is_finite()) {
        min = min.min(v);
        max = max.max(v);
    }
    if min > max {
        return 0.0..1.0;
    }
    if (max - min).abs() < f64::EPSILON {
        return (min - 1.0)..(max + 1.0);
    }
    let pad = (max - min) * 0.05;
    (min - pad)..(max + pad)
}

/// Position of `value` between `min` and `max`, clamped to [0, 1].
pub fn normalized(value: f64, min: f64, max: f64) -> f64 {
    if max - min <= 0.0 {
        return 0.5;
    }
    ((value - min) / (max - min)).clamp(0.0, 1.0)
}

/// Diverging blue-white-red colour map over [0, 1].
pub fn diverging_color(t: f64) -> RGBColor {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        let s = (255.0 * t / 0.5).round() as u8;
        RGBColor(s, s, 255)
    } else {
        let s = (255.0 * (1.0 - (t - 0.5) / 0.5)).round() as u8;
        RGBColor(255, s, s)
    }
}

/// Tick label of a categorical axis: the label at an integer position.
pub fn index_label(labels: &[String], value: f64) -> String {
    let i = value.round();
    if (value - i).abs() > 1e-6 || i < 0.0 {
        return String::new();
    }
    labels.get(i as usize).cloned().unwrap_or_default()
}

/// Draws a line chart into `area`; an empty series leaves the panel blank.
pub(crate) fn line_panel(
    area: &Panel<'_>,
    caption: &str,
    axes: (&str, &str),
    points: &[(f64, f64)],
    color: &RGBColor,
) -> Result<()> {
    if points.is_empty() {
        return Ok(());
    }
    let x_range = padded_range(points.iter().map(|p| p.0));
    let y_range = padded_range(points.iter().map(|p| p.1).chain([0.0]));

    let mut chart = ChartBuilder::on(area)
        .caption(caption, ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, y_range)
        .map_err(plotting)?;
    chart
        .configure_mesh()
        .x_desc(axes.0)
        .y_desc(axes.1)
        .draw()
        .map_err(plotting)?;
    chart
        .draw_series(LineSeries::new(points.iter().copied(), color))
        .map_err(plotting)?;
    chart
        .draw_series(points.iter().map(|&p| Circle::new(p, 2, color.filled())))
        .map_err(plotting)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_shape() {
        assert_eq!(grid_shape(1), (1, 1));
        assert_eq!(grid_shape(2), (1, 2));
        assert_eq!(grid_shape(5), (3, 2));
        assert_eq!(canvas_size(grid_shape(5), (800, 600)), (1600, 1800));
    }

    #[test]
    fn test_padded_range() {
        assert_eq!(padded_range([0.0, 10.0]), -0.5..10.5);
        assert_eq!(padded_range([3.0]), 2.0..4.0);
        assert_eq!(padded_range(Vec::new()), 0.0..1.0);
        assert_eq!(padded_range([f64::NAN, 1.0, 3.0]), 0.9..3.1);
    }

    #[test]
    fn test_diverging_color() {
        assert_eq!(diverging_color(0.0), RGBColor(0, 0, 255));
        assert_eq!(diverging_color(0.5), RGBColor(255, 255, 255));
        assert_eq!(diverging_color(1.0), RGBColor(255, 0, 0));
        assert_eq!(diverging_color(2.0), RGBColor(255, 0, 0));
        assert_eq!(normalized(5.0, 0.0, 10.0), 0.5);
        assert_eq!(normalized(5.0, 5.0, 5.0), 0.5);
    }

    #[test]
    fn test_index_label() {
        let labels = vec!["CA1".to_string(), "DG".to_string()];
        assert_eq!(index_label(&labels, 1.0), "DG");
        assert_eq!(index_label(&labels, 0.5), "");
        assert_eq!(index_label(&labels, 2.0), "");
        assert_eq!(index_label(&labels, -1.0), "");
    }
}
