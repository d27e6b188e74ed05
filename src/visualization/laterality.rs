//! Laterality figures: Bland-Altman, L/R scatter, ranked LI bars, average
//! absolute LI and the concordance heatmap.

use std::path::Path;

use plotters::prelude::*;

use crate::processors::concordance::{ConcordanceMatrix, RankedRegion};
use crate::processors::laterality::{zero_constrained_slope, BlandAltman};

use super::{
    canvas, canvas_size, diverging_color, grid_shape, index_label, normalized, padded_range, plotting,
    Panel, Result, VisualizationError,
};

const POSITIVE_BAR: RGBColor = RGBColor(70, 130, 180);
const NEGATIVE_BAR: RGBColor = RGBColor(205, 92, 92);

/// Pixel height needed to label `bars` bars.
pub fn bar_panel_height(bars: usize, base: u32) -> u32 {
    base.max(18 * bars as u32 + 120)
}

/// A row of a horizontal bar chart.
struct Bar {
    label: String,
    value: f64,
    color: RGBColor,
}

/// Horizontal bars, first bar on top.
fn horizontal_bars(area: &Panel<'_>, caption: &str, x_desc: &str, bars: &[Bar]) -> Result<()> {
    if bars.is_empty() {
        return Ok(());
    }
    let n = bars.len();
    // Bar i is drawn at y = n - 1 - i.
    let labels: Vec<String> = bars.iter().rev().map(|b| b.label.clone()).collect();
    let x_range = padded_range(bars.iter().map(|b| b.value).chain([0.0]));

    let mut chart = ChartBuilder::on(area)
        .caption(caption, ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(160)
        .build_cartesian_2d(x_range, -0.5..(n as f64 - 0.5))
        .map_err(plotting)?;
    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(n)
        .y_label_formatter(&|v| index_label(&labels, *v))
        .x_desc(x_desc)
        .draw()
        .map_err(plotting)?;
    chart
        .draw_series(bars.iter().enumerate().map(|(i, bar)| {
            let y = (n - 1 - i) as f64;
            Rectangle::new([(0.0, y - 0.4), (bar.value, y + 0.4)], bar.color.filled())
        }))
        .map_err(plotting)?;
    Ok(())
}

fn signed_color(value: f64) -> RGBColor {
    if value >= 0.0 {
        POSITIVE_BAR
    } else {
        NEGATIVE_BAR
    }
}

/// One Bland-Altman panel per rat: mean density against LI with the mean and
/// limits of agreement.
pub fn plot_bland_altman(output_path: &Path, rats: &[BlandAltman], panel: (u32, u32)) -> Result<()> {
    if rats.is_empty() {
        return Err(VisualizationError::EmptyData("no rats".into()));
    }
    let grid = grid_shape(rats.len());
    let root = canvas(output_path, canvas_size(grid, panel))?;
    let areas = root.split_evenly(grid);

    for (area, ba) in areas.iter().zip(rats) {
        if ba.points.is_empty() {
            continue;
        }
        let x_range = padded_range(ba.points.iter().map(|p| p.0));
        let limits = ba.stats.map(|s| [s.lower, s.upper]).unwrap_or_default();
        let y_range = padded_range(ba.points.iter().map(|p| p.1).chain(limits).chain([0.0]));
        let (x0, x1) = (x_range.start, x_range.end);

        let mut chart = ChartBuilder::on(area)
            .caption(format!("Bland-Altman {}", ba.rat), ("sans-serif", 20))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(x_range, y_range)
            .map_err(plotting)?;
        chart
            .configure_mesh()
            .x_desc("Mean density (L + R) / 2")
            .y_desc("LI")
            .draw()
            .map_err(plotting)?;

        chart
            .draw_series(ba.points.iter().map(|&p| Circle::new(p, 3, BLUE.mix(0.6).filled())))
            .map_err(plotting)?;
        chart
            .draw_series(LineSeries::new([(x0, 0.0), (x1, 0.0)], &BLACK))
            .map_err(plotting)?;

        if let Some(stats) = ba.stats {
            chart
                .draw_series(LineSeries::new([(x0, stats.mean), (x1, stats.mean)], &GREEN))
                .map_err(plotting)?
                .label(format!("mean {:.3}", stats.mean))
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], GREEN));
            for limit in [stats.lower, stats.upper] {
                chart
                    .draw_series(LineSeries::new([(x0, limit), (x1, limit)], &RED))
                    .map_err(plotting)?;
            }
            chart
                .configure_series_labels()
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()
                .map_err(plotting)?;
        }
    }

    root.present().map_err(plotting)?;
    Ok(())
}

/// One panel per rat: right density on x, left on y, the bisector and the
/// regression line through the origin.
pub fn plot_scatter(output_path: &Path, rats: &[(String, Vec<(f64, f64)>)], panel: (u32, u32)) -> Result<()> {
    if rats.is_empty() {
        return Err(VisualizationError::EmptyData("no rats".into()));
    }
    let grid = grid_shape(rats.len());
    let root = canvas(output_path, canvas_size(grid, panel))?;
    let areas = root.split_evenly(grid);

    for (area, (rat, points)) in areas.iter().zip(rats) {
        if points.is_empty() {
            continue;
        }
        let range = padded_range(points.iter().flat_map(|&(x, y)| [x, y]).chain([0.0]));
        let (lo, hi) = (range.start, range.end);

        let mut chart = ChartBuilder::on(area)
            .caption(format!("Densities {rat}"), ("sans-serif", 20))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(range.clone(), range)
            .map_err(plotting)?;
        chart
            .configure_mesh()
            .x_desc("Right")
            .y_desc("Left")
            .draw()
            .map_err(plotting)?;

        chart
            .draw_series(points.iter().map(|&p| Circle::new(p, 3, BLUE.mix(0.6).filled())))
            .map_err(plotting)?;
        chart
            .draw_series(LineSeries::new([(lo, lo), (hi, hi)], &BLACK))
            .map_err(plotting)?
            .label("L = R")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLACK));

        if let Some(slope) = zero_constrained_slope(points) {
            chart
                .draw_series(LineSeries::new([(0.0, 0.0), (hi, slope * hi)], &RED))
                .map_err(plotting)?
                .label(format!("slope {slope:.3}"))
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));
        }
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(plotting)?;
    }

    root.present().map_err(plotting)?;
    Ok(())
}

/// One panel per rat of LI bars ordered by magnitude.
pub fn plot_li_ranked(
    output_path: &Path,
    rats: &[(String, Vec<(String, f64)>)],
    panel: (u32, u32),
) -> Result<()> {
    if rats.is_empty() {
        return Err(VisualizationError::EmptyData("no rats".into()));
    }
    let longest = rats.iter().map(|(_, ranked)| ranked.len()).max().unwrap_or(0);
    let panel = (panel.0, bar_panel_height(longest, panel.1));
    let grid = grid_shape(rats.len());
    let root = canvas(output_path, canvas_size(grid, panel))?;
    let areas = root.split_evenly(grid);

    for (area, (rat, ranked)) in areas.iter().zip(rats) {
        let bars: Vec<Bar> = ranked
            .iter()
            .map(|(label, li)| Bar {
                label: label.clone(),
                value: *li,
                color: signed_color(*li),
            })
            .collect();
        horizontal_bars(area, &format!("LI {rat}"), "LI", &bars)?;
    }

    root.present().map_err(plotting)?;
    Ok(())
}

/// Bar colours of the average absolute LI chart: windowed concordance on the
/// diverging map, or a single colour.
pub fn concordance_colors(regions: usize, concordance: Option<&[f64]>) -> Vec<RGBColor> {
    match concordance {
        Some(values) => {
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            values.iter().map(|&v| diverging_color(normalized(v, min, max))).collect()
        }
        None => vec![POSITIVE_BAR; regions],
    }
}

/// Average absolute LI per region, in ranking order.
pub fn plot_average_absolute_li(
    output_path: &Path,
    ranked: &[RankedRegion],
    concordance: Option<&[f64]>,
    panel: (u32, u32),
) -> Result<()> {
    if ranked.is_empty() {
        return Err(VisualizationError::EmptyData("no regions".into()));
    }
    let colors = concordance_colors(ranked.len(), concordance);
    let bars: Vec<Bar> = ranked
        .iter()
        .zip(colors)
        .map(|(region, color)| Bar {
            label: region.label.clone(),
            value: region.average_abs_li,
            color,
        })
        .collect();

    let caption = if concordance.is_some() {
        "Average absolute LI (unweighted concordance)"
    } else {
        "Average absolute LI"
    };
    let root = canvas(output_path, (panel.0, bar_panel_height(bars.len(), panel.1)))?;
    horizontal_bars(&root, caption, "Average |LI|", &bars)?;
    root.present().map_err(plotting)?;
    Ok(())
}

/// Pairwise concordance matrix as a heatmap, rows top to bottom.
pub fn plot_concordance_heatmap(output_path: &Path, matrix: &ConcordanceMatrix, panel: (u32, u32)) -> Result<()> {
    if matrix.is_empty() {
        return Err(VisualizationError::EmptyData("no clustered regions".into()));
    }
    let n = matrix.len();
    let side = bar_panel_height(n, panel.0.max(panel.1));
    let root = canvas(output_path, (side + 100, side))?;

    let rows_top_down: Vec<String> = matrix.labels.iter().rev().cloned().collect();
    let extent = -0.5..(n as f64 - 0.5);
    let mut chart = ChartBuilder::on(&root)
        .caption("Concordance", ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(160)
        .y_label_area_size(160)
        .build_cartesian_2d(extent.clone(), extent)
        .map_err(plotting)?;
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(n)
        .y_labels(n)
        .x_label_formatter(&|v| index_label(&matrix.labels, *v))
        .y_label_formatter(&|v| index_label(&rows_top_down, *v))
        .x_label_style(("sans-serif", 12).into_font().transform(FontTransform::Rotate90))
        .draw()
        .map_err(plotting)?;

    chart
        .draw_series(matrix.values.iter().enumerate().flat_map(|(i, row)| {
            let y = (n - 1 - i) as f64;
            row.iter().enumerate().map(move |(j, &v)| {
                let x = j as f64;
                Rectangle::new([(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)], diverging_color(v).filled())
            })
        }))
        .map_err(plotting)?;

    root.present().map_err(plotting)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_panel_height() {
        assert_eq!(bar_panel_height(2, 600), 600);
        assert_eq!(bar_panel_height(100, 600), 1920);
    }

    #[test]
    fn test_concordance_colors() {
        let colors = concordance_colors(3, Some(&[0.2, 0.6, 1.0]));
        assert_eq!(colors[0], RGBColor(0, 0, 255));
        assert_eq!(colors[1], RGBColor(255, 255, 255));
        assert_eq!(colors[2], RGBColor(255, 0, 0));

        assert_eq!(concordance_colors(2, None), vec![POSITIVE_BAR; 2]);
    }

    #[test]
    fn test_signed_color() {
        assert_eq!(signed_color(0.3), POSITIVE_BAR);
        assert_eq!(signed_color(-0.3), NEGATIVE_BAR);
    }

    #[test]
    fn test_empty_inputs_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.png");
        assert!(matches!(
            plot_bland_altman(&path, &[], (400, 300)),
            Err(VisualizationError::EmptyData(_))
        ));
        let empty = ConcordanceMatrix { labels: Vec::new(), values: Vec::new() };
        assert!(matches!(
            plot_concordance_heatmap(&path, &empty, (400, 300)),
            Err(VisualizationError::EmptyData(_))
        ));
    }

    fn assert_written(path: &Path) {
        let meta = std::fs::metadata(path).unwrap();
        assert!(meta.len() > 0);
    }

    #[test]
    fn test_figures_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let panel = (400, 300);

        let points = vec![(10.0, 0.2), (20.0, -0.1), (30.0, 0.05)];
        let rats = vec![BlandAltman {
            rat: "03".into(),
            stats: crate::processors::laterality::agreement_stats(&[0.2, -0.1, 0.05], 1.96),
            points,
        }];
        let bland = dir.path().join("BlandAltmans.png");
        plot_bland_altman(&bland, &rats, panel).unwrap();
        assert_written(&bland);

        let scatter = dir.path().join("ScatterPlots.png");
        let pairs = vec![
            ("03".to_string(), vec![(1.0, 1.2), (2.0, 1.8), (3.0, 3.3)]),
            ("05".to_string(), vec![(1.5, 1.0), (2.5, 2.7)]),
        ];
        plot_scatter(&scatter, &pairs, panel).unwrap();
        assert_written(&scatter);

        let ranked_path = dir.path().join("LIRanked.png");
        let ranked = vec![("03".to_string(), vec![("SC".to_string(), 0.4), ("CA1".to_string(), -0.2)])];
        plot_li_ranked(&ranked_path, &ranked, panel).unwrap();
        assert_written(&ranked_path);

        let regions = vec![
            RankedRegion { label: "SC".into(), li: vec![Some(0.4), Some(0.3)], average_abs_li: 0.35 },
            RankedRegion { label: "CA1".into(), li: vec![Some(-0.2), Some(0.1)], average_abs_li: 0.15 },
        ];
        let abs_li = dir.path().join("UnweightedConcordanceAALI.png");
        plot_average_absolute_li(&abs_li, &regions, Some(&[0.5, 1.0]), panel).unwrap();
        assert_written(&abs_li);

        let heatmap = dir.path().join("ConcordanceHeatmap.png");
        let matrix = ConcordanceMatrix {
            labels: vec!["SC".into(), "CA1".into()],
            values: vec![vec![1.0, 0.5], vec![0.5, 1.0]],
        };
        plot_concordance_heatmap(&heatmap, &matrix, panel).unwrap();
        assert_written(&heatmap);
    }
}
