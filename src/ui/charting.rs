use rightangle::sample::Sample;

/// Force samples as (seconds since window start, lbs) points.
pub fn force_coords(samples: &[Sample], window_start: Option<i64>) -> Vec<(f64, f64)> {
    let Some(origin) = window_start.or_else(|| samples.first().map(|s| s.timestamp)) else {
        return Vec::new();
    };
    samples
        .iter()
        .map(|s| ((s.timestamp - origin) as f64 / 1000.0, s.value))
        .collect()
}

/// Compute X (seconds) and Y (lbs) bounds for the force chart
pub fn compute_chart_params(coords: &[(f64, f64)], window_secs: f64) -> (f64, f64) {
    let highest_force = coords.iter().map(|&(_, f)| f).fold(0.0, f64::max);

    let last = coords.last().map(|c| c.0).unwrap_or(0.0);
    let overall_duration = last.max(window_secs).max(1.0);

    // Leave headroom above the peak so the line doesn't hug the frame.
    let y_max = if highest_force > 0.0 {
        (highest_force + highest_force / 10.0).ceil()
    } else {
        10.0
    };

    (overall_duration, y_max)
}

/// Format a simple numeric label consistently
pub fn format_label(val: f64) -> String {
    if (val - val.round()).abs() < f64::EPSILON {
        format!("{}", val.round())
    } else {
        format!("{val:.2}")
    }
}

/// Signed delta with unit, e.g. `+5°` or `-1.5 lbs`.
pub fn format_delta(delta: f64, unit: &str) -> String {
    let sign = if delta > 0.0 { "+" } else { "" };
    format!("{sign}{}{unit}", format_label(delta))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_chart_params_empty() {
        let (x, y) = compute_chart_params(&[], 3.0);
        assert_eq!(x, 3.0);
        assert_eq!(y, 10.0);
    }

    #[test]
    fn test_compute_chart_params_headroom() {
        let (x, y) = compute_chart_params(&[(0.5, 10.0), (3.4, 20.0)], 3.0);
        assert_eq!(x, 3.4);
        assert_eq!(y, 22.0);
    }

    #[test]
    fn test_force_coords_relative_to_window() {
        let samples = [Sample::new(1_000, 10.0), Sample::new(2_500, 25.0)];
        assert_eq!(
            force_coords(&samples, Some(500)),
            vec![(0.5, 10.0), (2.0, 25.0)]
        );
        assert_eq!(force_coords(&samples, None)[0], (0.0, 10.0));
        assert!(force_coords(&[], None).is_empty());
    }

    #[test]
    fn test_format_label() {
        assert_eq!(format_label(1.0), "1");
        assert_eq!(format_label(1.2345), "1.23");
    }

    #[test]
    fn test_format_delta() {
        assert_eq!(format_delta(5.0, "°"), "+5°");
        assert_eq!(format_delta(-1.5, " lbs"), "-1.50 lbs");
        assert_eq!(format_delta(0.0, "°"), "0°");
    }
}
