//! Small descriptive statistics over present values.

/// Arithmetic mean; `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Standard deviation with `ddof` degrees of freedom removed
/// (0 = population, 1 = sample).
pub fn std_dev(values: &[f64], ddof: usize) -> Option<f64> {
    let n = values.len();
    if n <= ddof {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((ss / (n - ddof) as f64).sqrt())
}

/// Mean of the present values of a column of optional cells.
pub fn mean_present(values: &[Option<f64>]) -> Option<f64> {
    let present: Vec<f64> = values.iter().filter_map(|v| *v).collect();
    mean(&present)
}

/// Quantile with linear interpolation between closest ranks.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Sign of a value as -1, 0 or 1; missing or NaN values have no sign.
pub fn sign(value: Option<f64>) -> Option<i8> {
    match value {
        Some(v) if v > 0.0 => Some(1),
        Some(v) if v < 0.0 => Some(-1),
        Some(v) if v == 0.0 => Some(0),
        _ => None,
    }
}

/// Gaussian kernel density estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct Kde {
    /// Evaluation grid.
    pub grid: Vec<f64>,
    /// Density at each grid point.
    pub density: Vec<f64>,
    /// Kernel bandwidth.
    pub bandwidth: f64,
}

/// Gaussian KDE with Scott's rule bandwidth scaled by `bw_adjust`.
///
/// The grid spans the data extended by `cut` bandwidths on each side. Needs
/// at least two distinct values.
pub fn gaussian_kde(values: &[f64], bw_adjust: f64, cut: f64, grid_points: usize) -> Option<Kde> {
    let n = values.len();
    let sd = std_dev(values, 1)?;
    if sd <= 0.0 || grid_points < 2 {
        return None;
    }
    let bandwidth = sd * (n as f64).powf(-0.2) * bw_adjust;

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let lo = min - cut * bandwidth;
    let hi = max + cut * bandwidth;
    let step = (hi - lo) / (grid_points - 1) as f64;

    let norm = 1.0 / (n as f64 * bandwidth * (2.0 * std::f64::consts::PI).sqrt());
    let grid: Vec<f64> = (0..grid_points).map(|i| lo + step * i as f64).collect();
    let density = grid
        .iter()
        .map(|&x| {
            values
                .iter()
                .map(|&v| (-0.5 * ((x - v) / bandwidth).powi(2)).exp())
                .sum::<f64>()
                * norm
        })
        .collect();

    Some(Kde {
        grid,
        density,
        bandwidth,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_mean_and_std() {
        let data = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!(approx(mean(&data).unwrap(), 5.0));
        assert!(approx(std_dev(&data, 0).unwrap(), 2.0));
        assert!(approx(std_dev(&data, 1).unwrap(), (32.0f64 / 7.0).sqrt()));
        assert_eq!(mean(&[]), None);
        assert_eq!(std_dev(&[1.0], 1), None);
    }

    #[test]
    fn test_quantile_linear() {
        let data = [1.0, 2.0, 3.0, 4.0];
        assert!(approx(quantile(&data, 0.75).unwrap(), 3.25));
        assert!(approx(quantile(&data, 0.0).unwrap(), 1.0));
        assert!(approx(quantile(&data, 1.0).unwrap(), 4.0));
        assert_eq!(quantile(&[], 0.5), None);
    }

    #[test]
    fn test_sign() {
        assert_eq!(sign(Some(0.3)), Some(1));
        assert_eq!(sign(Some(-0.3)), Some(-1));
        assert_eq!(sign(Some(0.0)), Some(0));
        assert_eq!(sign(None), None);
        assert_eq!(sign(Some(f64::NAN)), None);
    }

    #[test]
    fn test_kde_integrates_to_one() {
        let data = [1.0, 2.0, 2.5, 3.0, 7.0];
        let kde = gaussian_kde(&data, 0.5, 3.0, 400).unwrap();
        let step = kde.grid[1] - kde.grid[0];
        let area: f64 = kde.density.iter().sum::<f64>() * step;
        assert!((area - 1.0).abs() < 0.02, "area = {area}");
    }

    #[test]
    fn test_kde_degenerate() {
        assert!(gaussian_kde(&[3.0, 3.0], 0.5, 3.0, 100).is_none());
        assert!(gaussian_kde(&[3.0], 0.5, 3.0, 100).is_none());
    }
}
