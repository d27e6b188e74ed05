//! Command-line interface for the slice density pipeline.
//!
//! Every path or parameter a step needs can be given on the command line;
//! whatever is left out is asked for on standard input.

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;

use crate::processors::merging::{OBJECT_COUNT_COLUMN, REGION_PIXELS_COLUMN};
use crate::processors::steps::{self, PlotKind};
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "slice-density")]
#[command(about = "Slice-level object counts to regional densities and laterality indices", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Rat id and output directory shared by the per-rat steps.
#[derive(Args, Debug, Clone)]
struct RatArgs {
    /// Rat id used in output file names
    #[arg(short, long)]
    rat: Option<String>,
    /// Output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct PlotArgs {
    /// LI summary table
    input: Option<PathBuf>,
    /// Output directory (defaults to the directory of the input)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge per-slice RefAtlasRegions exports into one table
    MergeCounts {
        /// Folder holding the RefAtlasRegions__sNNN.csv exports
        folder: Option<PathBuf>,
        #[command(flatten)]
        rat: RatArgs,
        /// Exports come from the colliculi alignment
        #[arg(long)]
        colliculi: bool,
        /// Merge region areas ("Region pixels") instead of object counts
        #[arg(long)]
        areas: bool,
    },

    /// Compute per-region object sizes and counts from Objects__<slice>.csv
    Objects {
        /// Table whose rows and columns define the output shape
        template: Option<PathBuf>,
        /// Folder holding the Objects__<slice>.csv exports
        objects_folder: Option<PathBuf>,
        #[command(flatten)]
        rat: RatArgs,
        /// Exports come from the colliculi alignment
        #[arg(long)]
        colliculi: bool,
    },

    /// Expand the region names of a QC sheet with a region dictionary
    ExtendQc {
        /// QC sheet
        qc: Option<PathBuf>,
        /// JSON region dictionary
        dictionary: Option<PathBuf>,
    },

    /// Replace QC "parts adjustment" cells with colliculi values
    AdjustParts {
        /// Objects table
        objects: Option<PathBuf>,
        /// Regions table
        regions: Option<PathBuf>,
        /// QC sheet
        qc: Option<PathBuf>,
        /// Colliculi objects table (asked for only when needed)
        #[arg(long)]
        colliculi_objects: Option<PathBuf>,
        /// Colliculi regions table (asked for only when needed)
        #[arg(long)]
        colliculi_regions: Option<PathBuf>,
    },

    /// Impute the QC "damage" cells of the objects and regions tables
    HandleDamage {
        /// Objects table
        objects: Option<PathBuf>,
        /// Regions table
        regions: Option<PathBuf>,
        /// QC sheet
        qc: Option<PathBuf>,
        /// Longest run of damaged slices that is interpolated
        #[arg(long)]
        max_run: Option<usize>,
    },

    /// Replace yellow cells from colliculi tables and impute green cells
    CorrectMarked {
        /// Object sizes table
        sizes: Option<PathBuf>,
        /// Object counts table
        counts: Option<PathBuf>,
        #[command(flatten)]
        rat: RatArgs,
        /// Colliculi sizes table (asked for only when needed)
        #[arg(long)]
        colliculi_sizes: Option<PathBuf>,
        /// Colliculi counts table (asked for only when needed)
        #[arg(long)]
        colliculi_counts: Option<PathBuf>,
        /// Longest run of damaged slices that is interpolated
        #[arg(long)]
        max_run: Option<usize>,
    },

    /// Append Total and Weighted Average rows
    Totals {
        /// Object sizes table
        sizes: Option<PathBuf>,
        /// Object counts table
        counts: Option<PathBuf>,
        #[command(flatten)]
        rat: RatArgs,
    },

    /// Estimate densities from counts, region areas and sizes
    Density {
        /// Object counts table with totals
        counts: Option<PathBuf>,
        /// Region areas table
        areas: Option<PathBuf>,
        /// Object sizes table with weighted averages
        sizes: Option<PathBuf>,
        #[command(flatten)]
        rat: RatArgs,
    },

    /// Collect the last rows of density and counts tables into one table
    Summarize {
        /// Density tables
        #[arg(short, long, num_args = 1..)]
        densities: Vec<PathBuf>,
        /// Counts tables
        #[arg(short = 'n', long, num_args = 1..)]
        counts: Vec<PathBuf>,
        /// Output file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Pair L/R regions and drop regions with low average counts
    PairRegions {
        /// Summary table
        input: Option<PathBuf>,
        /// Minimum average counts
        #[arg(short, long)]
        threshold: Option<f64>,
    },

    /// Add laterality index columns
    Laterality {
        /// Paired summary table
        input: Option<PathBuf>,
        /// Rat ids (detected from the columns when omitted)
        #[arg(short, long, num_args = 1..)]
        rats: Vec<String>,
    },

    /// Highlight object size outliers and plot the size distribution
    Outliers {
        /// Object sizes table with weighted averages
        sizes: Option<PathBuf>,
        /// Object counts table with totals
        counts: Option<PathBuf>,
        #[command(flatten)]
        rat: RatArgs,
        /// Band half-width in standard deviations
        #[arg(short = 'k', long)]
        sd_multiplier: Option<f64>,
    },

    /// Frequency analysis of highlighted outliers across counts tables
    OutlierFrequency {
        /// Counts tables with highlighted outliers
        counts: Vec<PathBuf>,
        /// Output directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Prefix of the output file names
        #[arg(short, long, default_value = "")]
        label: String,
    },

    /// Bland-Altman plot per rat
    BlandAltman(PlotArgs),

    /// Right vs left density scatter plot per rat
    Scatter(PlotArgs),

    /// LI bars ordered by magnitude per rat
    LiRanked(PlotArgs),

    /// Average absolute LI bars
    AbsLi {
        #[command(flatten)]
        plot: PlotArgs,
        /// Colour the bars by windowed sign concordance
        #[arg(long)]
        concordance: bool,
    },

    /// Pairwise sign concordance heatmap of high-concordance regions
    ConcordanceHeatmap(PlotArgs),
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            let tail: String = value.chars().rev().take(36).collect::<Vec<_>>().into_iter().rev().collect();
            format!("...{}", tail)
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

/// Read one answer from standard input. Surrounding quotes (as pasted from a
/// file manager) are stripped.
fn prompt(message: &str) -> Result<String> {
    print!("{}: ", message);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
}

/// The given value, or the parsed answer to `message`.
fn or_prompt<T>(value: Option<T>, message: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(v) = value {
        return Ok(v);
    }
    let answer = prompt(message)?;
    answer
        .parse()
        .map_err(|e| anyhow!("Invalid value '{}': {}", answer, e))
}

/// The given paths, or a comma separated list read from standard input.
fn or_prompt_list(values: Vec<PathBuf>, message: &str) -> Result<Vec<PathBuf>> {
    if !values.is_empty() {
        return Ok(values);
    }
    let answer = prompt(&format!("{} (comma separated)", message))?;
    Ok(answer
        .split(',')
        .map(|s| s.trim().trim_matches(|c| c == '"' || c == '\''))
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect())
}

fn rat_and_dir(args: RatArgs) -> Result<(String, PathBuf)> {
    let rat = or_prompt(args.rat, "Rat id")?;
    let dir = or_prompt(args.output_dir, "Output directory")?;
    Ok((rat, dir))
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

fn load_config(path: Option<&PathBuf>) -> PipelineConfig {
    match path {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("Failed to load config from {}: {}, using defaults", path.display(), e);
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    }
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    let mut config = load_config(cli.config.as_ref());

    let result = match cli.command {
        Commands::MergeCounts { folder, rat, colliculi, areas } => {
            cmd_merge_counts(folder, rat, colliculi, areas)
        }
        Commands::Objects { template, objects_folder, rat, colliculi } => {
            cmd_objects(template, objects_folder, rat, colliculi)
        }
        Commands::ExtendQc { qc, dictionary } => cmd_extend_qc(qc, dictionary),
        Commands::AdjustParts { objects, regions, qc, colliculi_objects, colliculi_regions } => {
            cmd_adjust_parts(objects, regions, qc, colliculi_objects, colliculi_regions)
        }
        Commands::HandleDamage { objects, regions, qc, max_run } => {
            if let Some(run) = max_run {
                config.imputation.max_interpolated_run = run;
            }
            cmd_handle_damage(objects, regions, qc, &config)
        }
        Commands::CorrectMarked { sizes, counts, rat, colliculi_sizes, colliculi_counts, max_run } => {
            if let Some(run) = max_run {
                config.imputation.max_interpolated_run = run;
            }
            cmd_correct_marked(sizes, counts, rat, colliculi_sizes, colliculi_counts, &config)
        }
        Commands::Totals { sizes, counts, rat } => cmd_totals(sizes, counts, rat),
        Commands::Density { counts, areas, sizes, rat } => cmd_density(counts, areas, sizes, rat, &config),
        Commands::Summarize { densities, counts, output } => cmd_summarize(densities, counts, output),
        Commands::PairRegions { input, threshold } => {
            if let Some(t) = threshold {
                config.laterality.min_average_counts = t;
            }
            cmd_pair_regions(input, &config)
        }
        Commands::Laterality { input, rats } => {
            if !rats.is_empty() {
                config.laterality.rats = rats;
            }
            cmd_laterality(input, &config)
        }
        Commands::Outliers { sizes, counts, rat, sd_multiplier } => {
            if let Some(k) = sd_multiplier {
                config.outliers.sd_multiplier = k;
            }
            cmd_outliers(sizes, counts, rat, &config)
        }
        Commands::OutlierFrequency { counts, output_dir, label } => {
            cmd_outlier_frequency(counts, output_dir, &label, &config)
        }
        Commands::BlandAltman(args) => cmd_plot(PlotKind::BlandAltman, args, &config),
        Commands::Scatter(args) => cmd_plot(PlotKind::Scatter, args, &config),
        Commands::LiRanked(args) => cmd_plot(PlotKind::LiRanked, args, &config),
        Commands::AbsLi { plot, concordance } => cmd_plot(PlotKind::AbsLi { concordance }, plot, &config),
        Commands::ConcordanceHeatmap(args) => cmd_plot(PlotKind::ConcordanceHeatmap, args, &config),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn cmd_merge_counts(folder: Option<PathBuf>, rat: RatArgs, colliculi: bool, areas: bool) -> Result<()> {
    let folder: PathBuf = or_prompt(folder, "Folder with the RefAtlasRegions exports")?;
    let (rat, output_dir) = rat_and_dir(rat)?;
    let value_column = if areas { REGION_PIXELS_COLUMN } else { OBJECT_COUNT_COLUMN };

    let start = Instant::now();
    let spinner = create_spinner("Merging slice exports...");
    let outcome = steps::merge_counts(&folder, &output_dir, &rat, colliculi, value_column);
    spinner.finish_and_clear();
    let merged = outcome?;

    print_summary(
        "Merge Complete",
        &[
            ("Folder", folder.display().to_string()),
            ("Value column", value_column.to_string()),
            ("Files found", merged.files_found.to_string()),
            ("Files skipped", merged.files_skipped.to_string()),
            ("Slices", merged.slices.to_string()),
            ("Regions", merged.regions.to_string()),
            ("Output", merged.output.display().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    Ok(())
}

fn cmd_objects(
    template: Option<PathBuf>,
    objects_folder: Option<PathBuf>,
    rat: RatArgs,
    colliculi: bool,
) -> Result<()> {
    let template: PathBuf = or_prompt(template, "Template table (merged objects)")?;
    let objects_folder: PathBuf = or_prompt(objects_folder, "Folder with the Objects exports")?;
    let (rat, output_dir) = rat_and_dir(rat)?;

    let start = Instant::now();
    let spinner = create_spinner("Sizing and counting objects...");
    let outcome = steps::count_objects(&template, &objects_folder, &output_dir, &rat, colliculi);
    spinner.finish_and_clear();
    let objects = outcome?;

    print_summary(
        "Objects Complete",
        &[
            ("Template", template.display().to_string()),
            ("Missing slices", objects.missing.to_string()),
            ("Malformed files", objects.malformed.to_string()),
            ("Sizes", objects.sizes.display().to_string()),
            ("Counts", objects.counts.display().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    Ok(())
}

fn cmd_extend_qc(qc: Option<PathBuf>, dictionary: Option<PathBuf>) -> Result<()> {
    let qc: PathBuf = or_prompt(qc, "QC sheet")?;
    let dictionary: PathBuf = or_prompt(dictionary, "Region dictionary (JSON)")?;

    let (output, changed) = steps::extend_qc(&qc, &dictionary)?;
    print_summary(
        "QC Extension Complete",
        &[
            ("QC sheet", qc.display().to_string()),
            ("Cells rewritten", changed.to_string()),
            ("Output", output.display().to_string()),
        ],
    );
    Ok(())
}

fn cmd_adjust_parts(
    objects: Option<PathBuf>,
    regions: Option<PathBuf>,
    qc: Option<PathBuf>,
    colliculi_objects: Option<PathBuf>,
    colliculi_regions: Option<PathBuf>,
) -> Result<()> {
    let objects: PathBuf = or_prompt(objects, "Objects table")?;
    let regions: PathBuf = or_prompt(regions, "Regions table")?;
    let qc: PathBuf = or_prompt(qc, "QC sheet")?;

    let start = Instant::now();
    let output = steps::adjust_parts(&objects, &regions, &qc, || {
        let col_objects = or_prompt(colliculi_objects, "Colliculi objects table")?;
        let col_regions = or_prompt(colliculi_regions, "Colliculi regions table")?;
        Ok((col_objects, col_regions))
    })?;

    print_summary(
        "Parts Adjustment Complete",
        &[
            ("Cells replaced", output.corrected.to_string()),
            ("Objects", output.objects.display().to_string()),
            ("Regions", output.regions.display().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    Ok(())
}

fn cmd_handle_damage(
    objects: Option<PathBuf>,
    regions: Option<PathBuf>,
    qc: Option<PathBuf>,
    config: &PipelineConfig,
) -> Result<()> {
    let objects: PathBuf = or_prompt(objects, "Objects table")?;
    let regions: PathBuf = or_prompt(regions, "Regions table")?;
    let qc: PathBuf = or_prompt(qc, "QC sheet")?;
    let max_run = config.imputation.max_interpolated_run;

    let start = Instant::now();
    let spinner = create_spinner("Imputing damaged slices...");
    let outcome = steps::damage(&objects, &regions, &qc, max_run);
    spinner.finish_and_clear();
    let output = outcome?;

    print_summary(
        "Damage Handling Complete",
        &[
            ("Cells corrected", output.corrected.to_string()),
            ("Max interpolated run", max_run.to_string()),
            ("Objects", output.objects.display().to_string()),
            ("Regions", output.regions.display().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    Ok(())
}

fn cmd_correct_marked(
    sizes: Option<PathBuf>,
    counts: Option<PathBuf>,
    rat: RatArgs,
    colliculi_sizes: Option<PathBuf>,
    colliculi_counts: Option<PathBuf>,
    config: &PipelineConfig,
) -> Result<()> {
    let sizes: PathBuf = or_prompt(sizes, "Object sizes table")?;
    let counts: PathBuf = or_prompt(counts, "Object counts table")?;
    let (rat, output_dir) = rat_and_dir(rat)?;
    let max_run = config.imputation.max_interpolated_run;

    let start = Instant::now();
    let output = steps::correct_marked(&sizes, &counts, &output_dir, &rat, max_run, || {
        let col_sizes = or_prompt(colliculi_sizes, "Colliculi sizes table")?;
        let col_counts = or_prompt(colliculi_counts, "Colliculi counts table")?;
        Ok((col_sizes, col_counts))
    })?;

    print_summary(
        "Correction Complete",
        &[
            ("Adjusted replaced", output.replaced.to_string()),
            ("Damaged imputed", output.imputed.to_string()),
            ("Sizes", output.sizes.display().to_string()),
            ("Counts", output.counts.display().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    Ok(())
}

fn cmd_totals(sizes: Option<PathBuf>, counts: Option<PathBuf>, rat: RatArgs) -> Result<()> {
    let sizes: PathBuf = or_prompt(sizes, "Corrected object sizes table")?;
    let counts: PathBuf = or_prompt(counts, "Corrected object counts table")?;
    let (rat, output_dir) = rat_and_dir(rat)?;

    let (sizes_out, counts_out) = steps::totals(&sizes, &counts, &output_dir, &rat)?;
    print_summary(
        "Totals Complete",
        &[
            ("Sizes", sizes_out.display().to_string()),
            ("Counts", counts_out.display().to_string()),
        ],
    );
    Ok(())
}

fn cmd_density(
    counts: Option<PathBuf>,
    areas: Option<PathBuf>,
    sizes: Option<PathBuf>,
    rat: RatArgs,
    config: &PipelineConfig,
) -> Result<()> {
    let counts: PathBuf = or_prompt(counts, "Object counts table (with totals)")?;
    let areas: PathBuf = or_prompt(areas, "Region areas table")?;
    let sizes: PathBuf = or_prompt(sizes, "Object sizes table (with weighted averages)")?;
    let (rat, output_dir) = rat_and_dir(rat)?;

    let start = Instant::now();
    let output = steps::density(&counts, &areas, &sizes, &output_dir, &rat, config)?;
    print_summary(
        "Density Complete",
        &[
            ("Pixel area (um2)", config.density.pixel_area_um2.to_string()),
            ("Thickness (um)", config.density.section_thickness_um.to_string()),
            ("Output", output.display().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    Ok(())
}

fn cmd_summarize(densities: Vec<PathBuf>, counts: Vec<PathBuf>, output: Option<PathBuf>) -> Result<()> {
    let densities = or_prompt_list(densities, "Density tables")?;
    let counts = or_prompt_list(counts, "Counts tables")?;
    let output = match output {
        Some(path) => path,
        None => or_prompt::<PathBuf>(None, "Output directory")?.join("All_densities.xlsx"),
    };

    let regions = steps::summarize(&densities, &counts, &output)?;
    print_summary(
        "Summary Complete",
        &[
            ("Density tables", densities.len().to_string()),
            ("Counts tables", counts.len().to_string()),
            ("Regions", regions.to_string()),
            ("Output", output.display().to_string()),
        ],
    );
    Ok(())
}

fn cmd_pair_regions(input: Option<PathBuf>, config: &PipelineConfig) -> Result<()> {
    let input: PathBuf = or_prompt(input, "Summary table")?;
    let threshold = config.laterality.min_average_counts;

    let (output, kept) = steps::pair(&input, threshold)?;
    print_summary(
        "Pairing Complete",
        &[
            ("Input", input.display().to_string()),
            ("Min average counts", threshold.to_string()),
            ("Regions kept", kept.to_string()),
            ("Output", output.display().to_string()),
        ],
    );
    Ok(())
}

fn cmd_laterality(input: Option<PathBuf>, config: &PipelineConfig) -> Result<()> {
    let input: PathBuf = or_prompt(input, "Paired summary table")?;

    let (output, rats) = steps::laterality(&input, &config.laterality.rats)?;
    print_summary(
        "Laterality Complete",
        &[
            ("Input", input.display().to_string()),
            ("Rats", rats.join(", ")),
            ("Output", output.display().to_string()),
        ],
    );
    Ok(())
}

fn cmd_outliers(
    sizes: Option<PathBuf>,
    counts: Option<PathBuf>,
    rat: RatArgs,
    config: &PipelineConfig,
) -> Result<()> {
    let sizes: PathBuf = or_prompt(sizes, "Object sizes table (with weighted averages)")?;
    let counts: PathBuf = or_prompt(counts, "Object counts table (with totals)")?;
    let (rat, output_dir) = rat_and_dir(rat)?;

    let start = Instant::now();
    let spinner = create_spinner("Identifying outliers...");
    let outcome = steps::outliers(&sizes, &counts, &output_dir, &rat, config);
    spinner.finish_and_clear();
    let output = outcome?;

    print_summary(
        "Outliers Complete",
        &[
            ("SD multiplier", config.outliers.sd_multiplier.to_string()),
            ("Outlier cells", output.outliers.to_string()),
            ("Sizes", output.sizes.display().to_string()),
            ("Counts", output.counts.display().to_string()),
            ("Plot", output.plot.display().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    Ok(())
}

fn cmd_outlier_frequency(
    counts: Vec<PathBuf>,
    output_dir: Option<PathBuf>,
    label: &str,
    config: &PipelineConfig,
) -> Result<()> {
    let counts = or_prompt_list(counts, "Counts tables with highlighted outliers")?;
    let output_dir: PathBuf = or_prompt(output_dir, "Output directory")?;

    let start = Instant::now();
    let spinner = create_spinner("Analysing outlier frequency...");
    let outcome = steps::outlier_frequency(&counts, &output_dir, label, config);
    spinner.finish_and_clear();
    let plots = outcome?;

    let names: Vec<String> = plots.iter().map(|p| p.display().to_string()).collect();
    print_summary(
        "Outlier Frequency Complete",
        &[
            ("Tables", counts.len().to_string()),
            ("Plots", names.join(", ")),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    Ok(())
}

fn cmd_plot(kind: PlotKind, args: PlotArgs, config: &PipelineConfig) -> Result<()> {
    let input: PathBuf = or_prompt(args.input, "LI summary table")?;
    let output_dir = args.output_dir.unwrap_or_else(|| parent_dir(&input));

    let start = Instant::now();
    let spinner = create_spinner("Generating plot...");
    let outcome = steps::plot(kind, &input, &output_dir, config);
    spinner.finish_and_clear();
    let output = outcome?;

    print_summary(
        "Plot Complete",
        &[
            ("Input", input.display().to_string()),
            ("Output PNG", output.display().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    Ok(())
}
