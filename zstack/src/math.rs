//! Descriptive statistics over pixel populations.
//!
//! Inputs are `f32` pixels; accumulation happens in `f64` so that large 16-bit
//! slices do not lose precision in the running sums.

/// Arithmetic mean. `None` for an empty population.
pub fn mean(values: &[f32]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sum: f64 = values.iter().map(|&v| v as f64).sum();
    Some(sum / values.len() as f64)
}

/// Population variance (divides by `n`) around a known mean.
pub fn variance_with_mean(values: &[f32], mean: f64) -> f64 {
    debug_assert!(!values.is_empty());

    let sum_sq: f64 = values
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum();
    sum_sq / values.len() as f64
}

/// Mean and population standard deviation. `None` for an empty population.
pub fn mean_and_std(values: &[f32]) -> Option<(f64, f64)> {
    let mean = mean(values)?;
    Some((mean, variance_with_mean(values, mean).sqrt()))
}

/// Mean and population standard deviation of an `f64` series. `None` when empty.
pub fn series_mean_and_std(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    Some((mean, var.sqrt()))
}

/// Median, reordering `data` in place (quickselect).
pub fn median_mut(data: &mut [f32]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }

    let len = data.len();
    let mid = len / 2;
    let (left, median, _) = data.select_nth_unstable_by(mid, f32::total_cmp);
    let upper = *median as f64;

    if len % 2 == 1 {
        Some(upper)
    } else {
        let lower = left.iter().copied().fold(f32::NEG_INFINITY, f32::max) as f64;
        Some((lower + upper) * 0.5)
    }
}

/// Minimum and maximum. `None` for an empty population.
pub fn min_max(values: &[f32]) -> Option<(f32, f32)> {
    let first = *values.first()?;
    Some(
        values
            .iter()
            .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_of_empty_is_none() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean_and_std(&[]), None);
        assert_eq!(median_mut(&mut []), None);
        assert_eq!(min_max(&[]), None);
    }

    #[test]
    fn mean_and_population_std() {
        let values = [2.0f32, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let (mean, std) = mean_and_std(&values).unwrap();
        assert!((mean - 5.0).abs() < 1e-12);
        assert!((std - 2.0).abs() < 1e-12);
    }

    #[test]
    fn series_std_matches_pixel_std() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(series_mean_and_std(&values), Some((5.0, 2.0)));
        assert_eq!(series_mean_and_std(&[]), None);
    }

    #[test]
    fn median_odd_and_even() {
        let mut odd = vec![1.0f32, 3.0, 2.0, 5.0, 4.0];
        assert_eq!(median_mut(&mut odd), Some(3.0));

        let mut even = vec![4.0f32, 1.0, 3.0, 2.0];
        assert_eq!(median_mut(&mut even), Some(2.5));
    }

    #[test]
    fn min_max_of_values() {
        assert_eq!(min_max(&[3.0, -1.0, 8.5, 2.0]), Some((-1.0, 8.5)));
    }

    #[test]
    fn mean_keeps_precision_for_large_counts() {
        let values = vec![65535.0f32; 1 << 20];
        assert_eq!(mean(&values), Some(65535.0));
    }
}
