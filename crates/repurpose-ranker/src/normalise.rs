//! Score normalisation functions.

/// Logistic function.
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Interpret a raw model output as a probability.
///
/// Values already in [0, 1] are taken as probabilities; anything else is
/// treated as a logit and passed through the logistic function.
pub fn to_probability(raw: f64) -> f64 {
    if (0.0..=1.0).contains(&raw) {
        raw
    } else {
        sigmoid(raw)
    }
}

/// Min-max normalisation within a given range [min_val, max_val].
pub fn minmax_normalise(value: f64, min_val: f64, max_val: f64) -> f64 {
    if (max_val - min_val).abs() < 1e-10 {
        return 0.5; // degenerate case
    }
    ((value - min_val) / (max_val - min_val)).clamp(0.0, 1.0)
}
