//! File-level steps behind each subcommand: load the inputs, run the
//! processors, write the outputs.
//!
//! Colliculi tables are only needed when a sheet actually asks for them, so
//! the steps that may use them take a closure that yields their paths on
//! demand.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::config::PipelineConfig;
use crate::core::labels::{normalize_table_labels, normalize_text_labels};
use crate::core::loaders::{load_marked_table, load_region_dictionary, load_table, load_text_table, TableFormat};
use crate::core::table::{Highlight, MarkedTable, RegionTable, TextTable};
use crate::core::writers::{with_stem_suffix, write_marked_table, write_table, write_table_csv, write_text_table};
use crate::visualization;

use super::adjustments::{apply_parts_adjustments, needs_colliculi, replace_adjusted_cells};
use super::concordance;
use super::damage::{handle_damage, impute_damaged_cells, manual_marks};
use super::density::{estimate_densities, summarize_last_rows, summary_label, SummarySource};
use super::laterality::{
    add_laterality_indices, bland_altman, li_rats, ranked_by_magnitude, scatter_points, with_li_file_name,
    without_labels,
};
use super::merging::{merge_folder, merged_file_name};
use super::objects::{object_file_names, size_and_count_objects};
use super::outliers::{frequency_analysis, highlight_outliers, pool_outliers};
use super::pairing::{filter_by_average_counts, pair_regions, processed_file_name};
use super::qc::{expand_qc, region_mapping, DAMAGE_COLUMN, PARTS_ADJUSTMENT_COLUMN};
use super::totals::add_totals;

const SHEET: &str = "Sheet1";

fn load_marked(path: &Path) -> Result<MarkedTable> {
    load_marked_table(path).with_context(|| format!("Failed to load table: {}", path.display()))
}

fn load_values(path: &Path) -> Result<RegionTable> {
    load_table(path).with_context(|| format!("Failed to load table: {}", path.display()))
}

fn save_marked(path: &Path, table: &MarkedTable, sheet: &str) -> Result<()> {
    write_marked_table(path, &table.table, &table.marks, sheet)
        .with_context(|| format!("Failed to write table: {}", path.display()))
}

/// Writes CSV for a `.csv` path, XLSX otherwise.
fn save(path: &Path, table: &RegionTable) -> Result<()> {
    let written = match TableFormat::from_path(path) {
        Some(TableFormat::Csv) => write_table_csv(path, table),
        _ => write_table(path, table, SHEET),
    };
    written.with_context(|| format!("Failed to write table: {}", path.display()))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn load_normalized(path: &Path) -> Result<MarkedTable> {
    let mut marked = load_marked(path)?;
    if normalize_table_labels(&mut marked.table, &mut marked.marks) {
        log::info!("Normalised slice labels of {}", path.display());
    }
    Ok(marked)
}

fn load_qc(path: &Path) -> Result<TextTable> {
    let mut qc = load_text_table(path).with_context(|| format!("Failed to load QC sheet: {}", path.display()))?;
    normalize_text_labels(&mut qc);
    Ok(qc)
}

/// Output of [`merge_counts`].
#[derive(Debug, Clone)]
pub struct MergeOutput {
    pub output: PathBuf,
    pub slices: usize,
    pub regions: usize,
    pub files_found: usize,
    pub files_skipped: usize,
}

/// Merges the region exports of `folder` into `<output_dir>/<rat><_col?>_objects.xlsx`
/// (or `_regions.xlsx` for a non-count value column).
pub fn merge_counts(
    folder: &Path,
    output_dir: &Path,
    rat: &str,
    colliculi: bool,
    value_column: &str,
) -> Result<MergeOutput> {
    let report = merge_folder(folder, value_column)
        .with_context(|| format!("Failed to merge exports in {}", folder.display()))?;
    let output = output_dir.join(merged_file_name(rat, colliculi, value_column));
    save(&output, &report.table)?;
    log::info!("Merged table saved to {}", output.display());

    Ok(MergeOutput {
        output,
        slices: report.table.n_rows(),
        regions: report.table.n_cols(),
        files_found: report.files_found,
        files_skipped: report.files_skipped.len(),
    })
}

/// Output of [`count_objects`].
#[derive(Debug, Clone)]
pub struct ObjectsOutput {
    pub sizes: PathBuf,
    pub counts: PathBuf,
    pub missing: usize,
    pub malformed: usize,
}

/// Builds the object size and count tables shaped like `template`.
pub fn count_objects(
    template: &Path,
    objects_folder: &Path,
    output_dir: &Path,
    rat: &str,
    colliculi: bool,
) -> Result<ObjectsOutput> {
    let template = load_normalized(template)?;
    let tables = size_and_count_objects(objects_folder, &template);

    let (sizes_name, counts_name) = object_file_names(rat, colliculi);
    let sizes = output_dir.join(sizes_name);
    let counts = output_dir.join(counts_name);
    save_marked(&sizes, &tables.sizes, SHEET)?;
    save_marked(&counts, &tables.counts, SHEET)?;

    Ok(ObjectsOutput {
        sizes,
        counts,
        missing: tables.missing.len(),
        malformed: tables.malformed.len(),
    })
}

/// Expands the QC sheet with the region dictionary into `<stem>_extended.xlsx`.
/// Returns the output path and the number of rewritten cells.
pub fn extend_qc(qc_path: &Path, dictionary: &Path) -> Result<(PathBuf, usize)> {
    let mut qc = load_qc(qc_path)?;
    let dictionary = load_region_dictionary(dictionary)
        .with_context(|| format!("Failed to load region dictionary: {}", dictionary.display()))?;
    let changed = expand_qc(&mut qc, &dictionary);

    let output = with_stem_suffix(qc_path, "_extended");
    write_text_table(&output, &qc, SHEET)
        .with_context(|| format!("Failed to write QC sheet: {}", output.display()))?;
    Ok((output, changed))
}

/// Output of the steps that rewrite the objects and regions tables.
#[derive(Debug, Clone)]
pub struct PairOutput {
    pub objects: PathBuf,
    pub regions: PathBuf,
    pub corrected: usize,
}

/// Replaces the QC `parts adjustment` cells with values of the colliculi
/// alignment. `colliculi` yields the colliculi objects and regions tables and
/// is only called when the sheet lists adjustments.
pub fn adjust_parts(
    objects_path: &Path,
    regions_path: &Path,
    qc_path: &Path,
    colliculi: impl FnOnce() -> Result<(PathBuf, PathBuf)>,
) -> Result<PairOutput> {
    let mut objects = load_normalized(objects_path)?;
    let mut regions = load_normalized(regions_path)?;
    let qc = load_qc(qc_path)?;
    let mapping = region_mapping(&qc, PARTS_ADJUSTMENT_COLUMN)
        .with_context(|| format!("Invalid QC sheet: {}", qc_path.display()))?;

    let mut corrected = 0;
    if needs_colliculi(&mapping) {
        let (col_objects, col_regions) = colliculi()?;
        let col_objects = load_normalized(&col_objects)?;
        let col_regions = load_normalized(&col_regions)?;
        corrected = apply_parts_adjustments(
            &mut objects,
            &mut regions,
            &col_objects.table,
            &col_regions.table,
            &mapping,
        )
        .len();
    } else {
        log::info!("No parts adjustments listed in {}", qc_path.display());
    }

    objects.marks = manual_marks(&objects.marks);
    regions.marks = manual_marks(&regions.marks);
    let objects_out = with_stem_suffix(objects_path, "_adjustments");
    let regions_out = with_stem_suffix(regions_path, "_adjustments");
    save_marked(&objects_out, &objects, "Objects")?;
    save_marked(&regions_out, &regions, "Regions")?;

    Ok(PairOutput {
        objects: objects_out,
        regions: regions_out,
        corrected,
    })
}

/// Imputes the QC `damage` cells of the objects and regions tables.
pub fn damage(objects_path: &Path, regions_path: &Path, qc_path: &Path, max_run: usize) -> Result<PairOutput> {
    let mut objects = load_normalized(objects_path)?;
    let mut regions = load_normalized(regions_path)?;
    let qc = load_qc(qc_path)?;
    let mapping =
        region_mapping(&qc, DAMAGE_COLUMN).with_context(|| format!("Invalid QC sheet: {}", qc_path.display()))?;

    let report = handle_damage(&mut objects, &mut regions, &mapping, max_run);

    let objects_out = with_stem_suffix(objects_path, "_damage");
    let regions_out = with_stem_suffix(regions_path, "_damage");
    save_marked(&objects_out, &objects, "Objects")?;
    save_marked(&regions_out, &regions, "Regions")?;

    Ok(PairOutput {
        objects: objects_out,
        regions: regions_out,
        corrected: report.objects.len(),
    })
}

/// Output of [`correct_marked`].
#[derive(Debug, Clone)]
pub struct CorrectionOutput {
    pub sizes: PathBuf,
    pub counts: PathBuf,
    pub replaced: usize,
    pub imputed: usize,
}

/// Replaces yellow cells from the colliculi sizes/counts tables and imputes
/// green cells. `colliculi` yields the colliculi sizes and counts tables and
/// is only called when yellow cells exist.
pub fn correct_marked(
    sizes_path: &Path,
    counts_path: &Path,
    output_dir: &Path,
    rat: &str,
    max_run: usize,
    colliculi: impl FnOnce() -> Result<(PathBuf, PathBuf)>,
) -> Result<CorrectionOutput> {
    let mut sizes = load_normalized(sizes_path)?;
    let mut counts = load_normalized(counts_path)?;

    let has_adjusted = |t: &MarkedTable| !t.marks.cells_with(Highlight::Adjusted).is_empty();
    let mut replaced = 0;
    if has_adjusted(&sizes) || has_adjusted(&counts) {
        let (col_sizes, col_counts) = colliculi()?;
        let col_sizes = load_normalized(&col_sizes)?;
        let col_counts = load_normalized(&col_counts)?;
        replaced += replace_adjusted_cells(&mut sizes, &col_sizes.table).len();
        replaced += replace_adjusted_cells(&mut counts, &col_counts.table).len();
    }

    let imputed =
        impute_damaged_cells(&mut sizes, max_run).len() + impute_damaged_cells(&mut counts, max_run).len();

    let sizes_out = output_dir.join(format!("{rat}_objects_sizes_corrected.xlsx"));
    let counts_out = output_dir.join(format!("{rat}_objects_counts_corrected.xlsx"));
    save_marked(&sizes_out, &sizes, SHEET)?;
    save_marked(&counts_out, &counts, SHEET)?;

    Ok(CorrectionOutput {
        sizes: sizes_out,
        counts: counts_out,
        replaced,
        imputed,
    })
}

/// Appends the `Total` / `Weighted Average` rows. Returns the sizes and counts
/// output paths.
pub fn totals(sizes_path: &Path, counts_path: &Path, output_dir: &Path, rat: &str) -> Result<(PathBuf, PathBuf)> {
    let mut sizes = load_normalized(sizes_path)?;
    let mut counts = load_normalized(counts_path)?;
    add_totals(&mut sizes, &mut counts).context("Failed to add totals")?;

    let sizes_out = output_dir.join(format!("{rat}_objects_sizes_corrected_with_totals.xlsx"));
    let counts_out = output_dir.join(format!("{rat}_objects_counts_corrected_with_totals.xlsx"));
    save_marked(&sizes_out, &sizes, SHEET)?;
    save_marked(&counts_out, &counts, SHEET)?;
    Ok((sizes_out, counts_out))
}

/// Writes `<output_dir>/<rat>_densities.xlsx`.
pub fn density(
    counts_path: &Path,
    areas_path: &Path,
    sizes_path: &Path,
    output_dir: &Path,
    rat: &str,
    config: &PipelineConfig,
) -> Result<PathBuf> {
    let counts = load_values(counts_path)?;
    let areas = load_values(areas_path)?;
    let sizes = load_values(sizes_path)?;
    let densities = estimate_densities(&counts, &areas, &sizes, &config.density).context("Density estimation failed")?;

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;
    let output = output_dir.join(format!("{rat}_densities.xlsx"));
    save(&output, &densities)?;
    Ok(output)
}

/// Writes the summary of the last rows of every density and counts table.
pub fn summarize(density_files: &[PathBuf], count_files: &[PathBuf], output: &Path) -> Result<usize> {
    let mut sources = Vec::with_capacity(density_files.len() + count_files.len());
    for (files, source) in [(density_files, SummarySource::Density), (count_files, SummarySource::Counts)] {
        for path in files {
            sources.push((summary_label(path, source), load_values(path)?));
        }
    }
    let summary = summarize_last_rows(&sources).context("Failed to build the summary table")?;
    save(output, &summary)?;
    Ok(summary.n_rows())
}

/// Pairs L/R rows and drops rows below `threshold` average counts. Writes
/// `Processed_<name>` next to the input; returns it with the kept row count.
pub fn pair(summary_path: &Path, threshold: f64) -> Result<(PathBuf, usize)> {
    let summary = load_values(summary_path)?;
    let mut paired = pair_regions(&summary).with_context(|| format!("Cannot pair {}", summary_path.display()))?;
    let dropped = filter_by_average_counts(&mut paired, threshold);
    log::info!("{} regions below {} average counts dropped", dropped, threshold);

    let name = summary_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "All_densities.xlsx".to_string());
    let output = summary_path.with_file_name(processed_file_name(&name));
    save(&output, &paired)?;
    Ok((output, paired.n_rows()))
}

/// Adds `<rat>_LI` columns and writes `<stem>_with_LI.xlsx` next to the input.
pub fn laterality(path: &Path, rats: &[String]) -> Result<(PathBuf, Vec<String>)> {
    let mut table = load_values(path)?;
    let rats = add_laterality_indices(&mut table, rats).context("Laterality index failed")?;
    let output = path.with_file_name(with_li_file_name(&file_stem(path)));
    save(&output, &table)?;
    Ok((output, rats))
}

/// Output of [`outliers`].
#[derive(Debug, Clone)]
pub struct OutlierOutput {
    pub sizes: PathBuf,
    pub counts: PathBuf,
    pub plot: PathBuf,
    pub outliers: usize,
}

/// Highlights size outliers in the sizes and counts tables and plots the
/// size distribution.
pub fn outliers(
    sizes_path: &Path,
    counts_path: &Path,
    output_dir: &Path,
    rat: &str,
    config: &PipelineConfig,
) -> Result<OutlierOutput> {
    let sizes = load_values(sizes_path)?;
    let counts = load_values(counts_path)?;
    let (report, sizes_marked, counts_marked) = highlight_outliers(&sizes, &counts, &config.outliers);

    let sizes_out = output_dir.join(format!("{rat}_sizes_with_outliers_highlighted.xlsx"));
    let counts_out = output_dir.join(format!("{rat}_counts_with_outliers_highlighted.xlsx"));
    save_marked(&sizes_out, &sizes_marked, SHEET)?;
    save_marked(&counts_out, &counts_marked, SHEET)?;

    let plot = output_dir.join(visualization::distributions::size_distribution_name(rat));
    visualization::plot_size_distribution(
        &plot,
        &report,
        config.outliers.histogram_bins,
        (config.plots.panel_width, config.plots.panel_height),
    )
    .with_context(|| format!("Failed to plot {}", plot.display()))?;

    Ok(OutlierOutput {
        sizes: sizes_out,
        counts: counts_out,
        plot,
        outliers: report.cells.len(),
    })
}

/// Pools the highlighted outliers of several counts tables and plots the
/// frequency analysis of the body rows and of the total rows.
pub fn outlier_frequency(
    count_files: &[PathBuf],
    output_dir: &Path,
    label: &str,
    config: &PipelineConfig,
) -> Result<Vec<PathBuf>> {
    if count_files.is_empty() {
        bail!("No counts tables given");
    }
    let tables = count_files
        .iter()
        .map(|p| load_marked(p))
        .collect::<Result<Vec<_>>>()?;
    let (body, totals) = pool_outliers(&tables);
    log::info!(
        "{} values / {} outliers in body rows, {} values / {} outliers in total rows",
        body.values.len(),
        body.outliers.len(),
        totals.values.len(),
        totals.outliers.len()
    );

    let panel = (config.plots.panel_width, config.plots.panel_height);
    let mut outputs = Vec::new();
    for (pool, is_totals, title) in [(body, false, "Objects counts"), (totals, true, "Total counts")] {
        let path = output_dir.join(visualization::distributions::frequency_plot_name(label, is_totals));
        let analysis = frequency_analysis(&pool, &config.outliers);
        visualization::plot_outlier_frequency(&path, &analysis, title, panel)
            .with_context(|| format!("Failed to plot {}", path.display()))?;
        outputs.push(path);
    }
    Ok(outputs)
}

/// Laterality figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotKind {
    BlandAltman,
    Scatter,
    LiRanked,
    AbsLi { concordance: bool },
    ConcordanceHeatmap,
}

impl PlotKind {
    pub fn file_name(self) -> &'static str {
        match self {
            PlotKind::BlandAltman => "BlandAltmans.png",
            PlotKind::Scatter => "ScatterPlots.png",
            PlotKind::LiRanked => "LIRanked.png",
            PlotKind::AbsLi { concordance: false } => "AverageAbsoluteLI.png",
            PlotKind::AbsLi { concordance: true } => "UnweightedConcordanceAALI.png",
            PlotKind::ConcordanceHeatmap => "ConcordanceHeatmap.png",
        }
    }
}

/// Loads an LI table for plotting: excluded labels dropped, LI columns
/// computed when the table has none. Returns the table and its rat ids.
pub fn load_li_table(path: &Path, excluded: &[String], rats: &[String]) -> Result<(RegionTable, Vec<String>)> {
    let mut table = without_labels(&load_values(path)?, excluded);
    let mut rats = if rats.is_empty() { li_rats(&table) } else { rats.to_vec() };
    if rats.is_empty() {
        rats = add_laterality_indices(&mut table, &[]).context("Table has no LI or density columns")?;
    }
    Ok((table, rats))
}

/// Renders one laterality figure into `output_dir`.
pub fn plot(kind: PlotKind, li_table: &Path, output_dir: &Path, config: &PipelineConfig) -> Result<PathBuf> {
    let excluded = match kind {
        PlotKind::Scatter => &config.plots.scatter_excluded_labels,
        _ => &config.plots.excluded_labels,
    };
    let (table, rats) = load_li_table(li_table, excluded, &config.laterality.rats)?;
    let panel = (config.plots.panel_width, config.plots.panel_height);
    let output = output_dir.join(kind.file_name());
    let lat = &config.laterality;

    let drawn = match kind {
        PlotKind::BlandAltman => {
            let data = rats
                .iter()
                .map(|rat| bland_altman(&table, rat, lat.agreement_z))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            visualization::plot_bland_altman(&output, &data, panel)
        }
        PlotKind::Scatter => {
            let data = rats
                .iter()
                .map(|rat| scatter_points(&table, rat).map(|points| (rat.clone(), points)))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            visualization::plot_scatter(&output, &data, panel)
        }
        PlotKind::LiRanked => {
            let data = rats
                .iter()
                .map(|rat| ranked_by_magnitude(&table, rat).map(|ranked| (rat.clone(), ranked)))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            visualization::plot_li_ranked(&output, &data, panel)
        }
        PlotKind::AbsLi { concordance: false } => {
            let ranked = concordance::rank_by_average_absolute_li(&table, &rats)?;
            visualization::plot_average_absolute_li(&output, &ranked, None, panel)
        }
        PlotKind::AbsLi { concordance: true } => {
            let analysis =
                concordance::analyze(&table, &rats, lat.concordance_window, lat.cluster_quantile)?;
            visualization::plot_average_absolute_li(&output, &analysis.ranked, Some(&analysis.windowed), panel)
        }
        PlotKind::ConcordanceHeatmap => {
            let analysis =
                concordance::analyze(&table, &rats, lat.concordance_window, lat.cluster_quantile)?;
            visualization::plot_concordance_heatmap(&output, &analysis.matrix, panel)
        }
    };
    drawn.with_context(|| format!("Failed to plot {}", output.display()))?;
    Ok(output)
}
