/// Computes the arithmetic mean of a slice of values. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Scales a 0–1 proportion to 0–100 and rounds to one decimal place.
pub fn to_percent(p: f64) -> f64 {
    (p * 1000.0).round() / 10.0
}
