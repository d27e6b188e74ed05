//! Configuration types for the slice density pipeline.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Physical constants of the density estimate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DensityConfig {
    /// Area of one image pixel in square micrometres
    #[serde(default = "default_pixel_area_um2")]
    pub pixel_area_um2: f64,

    /// Section thickness in micrometres
    #[serde(default = "default_section_thickness_um")]
    pub section_thickness_um: f64,
}

fn default_pixel_area_um2() -> f64 {
    0.1936
}

fn default_section_thickness_um() -> f64 {
    40.0
}

impl Default for DensityConfig {
    fn default() -> Self {
        Self {
            pixel_area_um2: default_pixel_area_um2(),
            section_thickness_um: default_section_thickness_um(),
        }
    }
}

/// Configuration for damaged slice imputation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImputationConfig {
    /// Longest run of consecutive flagged slices that is interpolated;
    /// longer runs are cleared
    #[serde(default = "default_max_interpolated_run")]
    pub max_interpolated_run: usize,
}

fn default_max_interpolated_run() -> usize {
    2
}

impl Default for ImputationConfig {
    fn default() -> Self {
        Self {
            max_interpolated_run: default_max_interpolated_run(),
        }
    }
}

/// Configuration for outlier marking and the frequency analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlierConfig {
    /// Width of the accepted band in standard deviations
    #[serde(default = "default_sd_multiplier")]
    pub sd_multiplier: f64,

    /// Histogram bins of the size distribution plot
    #[serde(default = "default_histogram_bins")]
    pub histogram_bins: usize,

    /// Bin width of the cumulative ratio histogram
    #[serde(default = "default_frequency_bin_width")]
    pub frequency_bin_width: f64,

    /// Multiplier applied to Scott's bandwidth
    #[serde(default = "default_kde_bw_adjust")]
    pub kde_bw_adjust: f64,

    /// Bandwidths the KDE grid extends past the data
    #[serde(default = "default_kde_cut")]
    pub kde_cut: f64,
}

fn default_sd_multiplier() -> f64 {
    2.0
}

fn default_histogram_bins() -> usize {
    100
}

fn default_frequency_bin_width() -> f64 {
    50.0
}

fn default_kde_bw_adjust() -> f64 {
    0.5
}

fn default_kde_cut() -> f64 {
    3.0
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            sd_multiplier: default_sd_multiplier(),
            histogram_bins: default_histogram_bins(),
            frequency_bin_width: default_frequency_bin_width(),
            kde_bw_adjust: default_kde_bw_adjust(),
            kde_cut: default_kde_cut(),
        }
    }
}

/// Configuration for laterality and concordance analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LateralityConfig {
    /// Rat identifiers; detected from `<rat>_densities L` columns when empty
    #[serde(default)]
    pub rats: Vec<String>,

    /// Minimum average count for a region to be kept when pairing
    #[serde(default)]
    pub min_average_counts: f64,

    /// Half-width of the concordance window
    #[serde(default = "default_concordance_window")]
    pub concordance_window: usize,

    /// Quantile of windowed concordance that defines a cluster
    #[serde(default = "default_cluster_quantile")]
    pub cluster_quantile: f64,

    /// z value of the Bland-Altman limits of agreement
    #[serde(default = "default_agreement_z")]
    pub agreement_z: f64,
}

fn default_concordance_window() -> usize {
    5
}

fn default_cluster_quantile() -> f64 {
    0.75
}

fn default_agreement_z() -> f64 {
    1.96
}

impl Default for LateralityConfig {
    fn default() -> Self {
        Self {
            rats: Vec::new(),
            min_average_counts: 0.0,
            concordance_window: default_concordance_window(),
            cluster_quantile: default_cluster_quantile(),
            agreement_z: default_agreement_z(),
        }
    }
}

/// Configuration for plot rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotConfig {
    /// Width of one panel in pixels
    #[serde(default = "default_panel_width")]
    pub panel_width: u32,

    /// Height of one panel in pixels
    #[serde(default = "default_panel_height")]
    pub panel_height: u32,

    /// Region labels left out of every laterality plot
    #[serde(default = "default_excluded_labels")]
    pub excluded_labels: Vec<String>,

    /// Region labels left out of the scatter plot regression
    #[serde(default = "default_scatter_excluded_labels")]
    pub scatter_excluded_labels: Vec<String>,
}

fn default_panel_width() -> u32 {
    800
}

fn default_panel_height() -> u32 {
    600
}

fn default_excluded_labels() -> Vec<String> {
    vec!["4th ventricle".to_string()]
}

fn default_scatter_excluded_labels() -> Vec<String> {
    vec![
        "Reticular (pre)thalamic nucleus, auditory segment".to_string(),
        "Reticular (pre)thalamic nucleus, unspecified".to_string(),
        "external medullary lamina, auditory radiation".to_string(),
        "4th ventricle".to_string(),
    ]
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            panel_width: default_panel_width(),
            panel_height: default_panel_height(),
            excluded_labels: default_excluded_labels(),
            scatter_excluded_labels: default_scatter_excluded_labels(),
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub density: DensityConfig,

    #[serde(default)]
    pub imputation: ImputationConfig,

    #[serde(default)]
    pub outliers: OutlierConfig,

    #[serde(default)]
    pub laterality: LateralityConfig,

    #[serde(default)]
    pub plots: PlotConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
