//! Order statistics over a sample set.

/// Min, max, mean, and median of a non-empty sample set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    /// Smallest sample.
    pub min: f64,
    /// Largest sample.
    pub max: f64,
    /// Arithmetic mean.
    pub mean: f64,
    /// Median; the midpoint average for even-sized sets.
    pub median: f64,
}

impl Summary {
    /// Computes the summary. Returns `None` for an empty sample set.
    pub fn compute(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let len = sorted.len();
        let median = if len % 2 == 1 {
            sorted[len / 2]
        } else {
            (sorted[len / 2 - 1] + sorted[len / 2]) / 2.0
        };

        Some(Self {
            min: sorted[0],
            max: sorted[len - 1],
            mean: sorted.iter().sum::<f64>() / len as f64,
            median,
        })
    }
}
