//! Object size distribution and outlier frequency figures.

use std::path::Path;

use plotters::prelude::*;

use crate::processors::outliers::{FrequencyAnalysis, Histogram, OutlierBand, OutlierReport};

use super::{canvas, line_panel, padded_range, plotting, Panel, Result, VisualizationError};

/// Bars of a histogram with the accepted band shaded behind them.
fn histogram_panel(
    area: &Panel<'_>,
    caption: &str,
    histogram: &Histogram,
    band: Option<OutlierBand>,
    color: &RGBColor,
) -> Result<()> {
    let (Some(&lo), Some(&hi)) = (histogram.edges.first(), histogram.edges.last()) else {
        return Ok(());
    };
    let y_max = histogram.max_count().max(1) as f64 * 1.05;

    let mut chart = ChartBuilder::on(area)
        .caption(caption, ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(lo..hi, 0.0..y_max)
        .map_err(plotting)?;
    chart
        .configure_mesh()
        .x_desc("Object size (pixels)")
        .y_desc("Frequency")
        .draw()
        .map_err(plotting)?;

    if let Some(band) = band {
        let (from, to) = (band.lower.max(lo), band.upper.min(hi));
        if from < to {
            chart
                .draw_series(std::iter::once(Rectangle::new(
                    [(from, 0.0), (to, y_max)],
                    GREEN.mix(0.15).filled(),
                )))
                .map_err(plotting)?
                .label(format!("mean ± k·SD [{:.1}, {:.1}]", band.lower, band.upper))
                .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 15, y + 5)], GREEN.mix(0.3).filled()));
        }
    }

    chart
        .draw_series(
            histogram
                .edges
                .windows(2)
                .zip(&histogram.counts)
                .filter(|(_, n)| **n > 0)
                .map(|(edge, &n)| Rectangle::new([(edge[0], 0.0), (edge[1], n as f64)], color.mix(0.7).filled())),
        )
        .map_err(plotting)?;

    if band.is_some() {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(plotting)?;
    }
    Ok(())
}

/// Two stacked histograms of object sizes: body rows with `bins` bins over
/// their range, and the summary row counted on the same bins.
pub fn plot_size_distribution(
    output_path: &Path,
    report: &OutlierReport,
    bins: usize,
    panel: (u32, u32),
) -> Result<()> {
    let body = Histogram::from_values(&report.body_values, bins)
        .ok_or_else(|| VisualizationError::EmptyData("no object sizes".into()))?;
    let totals = Histogram::with_edges(&report.total_values, body.edges.clone());

    let root = canvas(output_path, (panel.0, panel.1 * 2))?;
    let areas = root.split_evenly((2, 1));
    histogram_panel(&areas[0], "Object size distribution", &body, report.body, &BLUE)?;
    histogram_panel(&areas[1], "Weighted averages", &totals, report.totals, &MAGENTA)?;
    root.present().map_err(plotting)?;
    Ok(())
}

/// 2×2 panel of the outlier frequency analysis.
pub fn plot_outlier_frequency(
    output_path: &Path,
    analysis: &FrequencyAnalysis,
    title: &str,
    panel: (u32, u32),
) -> Result<()> {
    if analysis.ratio.is_empty() {
        return Err(VisualizationError::EmptyData(title.to_string()));
    }

    let root = canvas(output_path, (panel.0 * 2, panel.1 * 2))?;
    let root = root
        .titled(title, ("sans-serif", 28))
        .map_err(plotting)?;
    let areas = root.split_evenly((2, 2));

    line_panel(
        &areas[0],
        "Outlier frequency ratio",
        ("Value", "Outliers / occurrences"),
        &analysis.ratio,
        &BLUE,
    )?;

    if let Some(kde) = &analysis.kde {
        let points: Vec<(f64, f64)> = kde.grid.iter().copied().zip(kde.density.iter().copied()).collect();
        line_panel(&areas[1], "Outlier density (KDE)", ("Value", "Density"), &points, &RED)?;
    }

    line_panel(
        &areas[2],
        "Cumulative outlier ratio",
        ("Value", "Cumulative ratio"),
        &analysis.cumulative,
        &GREEN,
    )?;

    if !analysis.binned.is_empty() {
        let x_range = padded_range(analysis.binned.iter().flat_map(|b| [b.lower, b.upper]));
        let y_max = analysis
            .binned
            .iter()
            .map(|b| b.share)
            .fold(0.0, f64::max)
            .max(f64::EPSILON)
            * 1.1;
        let mut chart = ChartBuilder::on(&areas[3])
            .caption("Binned cumulative ratio", ("sans-serif", 20))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(x_range, 0.0..y_max)
            .map_err(plotting)?;
        chart
            .configure_mesh()
            .x_desc("Value")
            .y_desc("Share")
            .draw()
            .map_err(plotting)?;
        chart
            .draw_series(
                analysis
                    .binned
                    .iter()
                    .map(|b| Rectangle::new([(b.lower, 0.0), (b.upper, b.share)], CYAN.mix(0.6).filled())),
            )
            .map_err(plotting)?;
    }

    root.present().map_err(plotting)?;
    Ok(())
}

/// Output name `<label_>combined_plots[_totals].png`.
pub fn frequency_plot_name(label: &str, totals: bool) -> String {
    let prefix = if label.is_empty() {
        String::new()
    } else {
        format!("{label}_")
    };
    let suffix = if totals { "_totals" } else { "" };
    format!("{prefix}combined_plots{suffix}.png")
}

/// Output name `<rat>_Object_Size_Distribution_2_SDs_highlighted.png`.
pub fn size_distribution_name(rat: &str) -> String {
    format!("{rat}_Object_Size_Distribution_2_SDs_highlighted.png")
}
