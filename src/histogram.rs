//! Fixed-width binning of event times, used to approximate a population firing rate.
use itertools::{Itertools, MinMaxResult};
use serde::{Deserialize, Serialize};

use crate::error::SNNError;

/// A histogram with equally spaced bins.
///
/// Every bin is half-open `[lo, hi)` except the last one which also contains its right edge.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Histogram {
    edges: Vec<f64>,
    counts: Vec<usize>,
}

impl Histogram {
    /// Bin the values over their own range.
    ///
    /// A degenerate range `[x, x]` is widened to `[x - 0.5, x + 0.5]`, and no values at all
    /// yield the range `[0, 1]`.
    pub fn new(values: &[f64], bins: usize) -> Result<Self, SNNError> {
        let range = match values.iter().copied().minmax_by(|a, b| a.total_cmp(b)) {
            MinMaxResult::NoElements => (0.0, 1.0),
            MinMaxResult::OneElement(x) => (x - 0.5, x + 0.5),
            MinMaxResult::MinMax(min, max) if min == max => (min - 0.5, max + 0.5),
            MinMaxResult::MinMax(min, max) => (min, max),
        };
        Histogram::with_range(values, bins, range)
    }

    /// Bin the values over the range `(lo, hi)`, ignoring the values outside of it.
    pub fn with_range(values: &[f64], bins: usize, range: (f64, f64)) -> Result<Self, SNNError> {
        let (lo, hi) = range;
        if bins == 0 {
            return Err(SNNError::InvalidParameter(
                "A histogram needs at least one bin".to_string(),
            ));
        }
        if !(lo.is_finite() && hi.is_finite() && lo < hi) {
            return Err(SNNError::InvalidParameter(format!(
                "Invalid histogram range ({}, {})",
                lo, hi
            )));
        }

        let width = (hi - lo) / bins as f64;
        let edges: Vec<f64> = (0..=bins)
            .map(|i| if i == bins { hi } else { lo + i as f64 * width })
            .collect();

        let mut counts = vec![0; bins];
        for &value in values.iter().filter(|&&value| value >= lo && value <= hi) {
            let mut bin = (((value - lo) / width) as usize).min(bins - 1);
            // Correct the rounding of the division against the actual edges
            if value < edges[bin] {
                bin -= 1;
            } else if bin + 1 < bins && value >= edges[bin + 1] {
                bin += 1;
            }
            counts[bin] += 1;
        }

        Ok(Histogram { edges, counts })
    }

    /// The `bins + 1` bin edges.
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// The number of values in each bin.
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    pub fn num_bins(&self) -> usize {
        self.counts.len()
    }

    pub fn bin_width(&self) -> f64 {
        (self.edges[self.edges.len() - 1] - self.edges[0]) / self.num_bins() as f64
    }

    /// The center of each bin.
    pub fn centers(&self) -> Vec<f64> {
        self.edges
            .iter()
            .tuple_windows()
            .map(|(lo, hi)| 0.5 * (lo + hi))
            .collect()
    }

    /// The number of binned values.
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    pub fn max_count(&self) -> usize {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    /// The population firing rate in each bin [Hz], assuming the values are times in ms
    /// emitted by `num_neurons` neurons.
    pub fn rates(&self, num_neurons: usize) -> Result<Vec<f64>, SNNError> {
        if num_neurons == 0 {
            return Err(SNNError::InvalidParameter(
                "Firing rates need at least one neuron".to_string(),
            ));
        }
        let scale = 1.0 / (self.bin_width() * 1e-3 * num_neurons as f64);
        Ok(self.counts.iter().map(|&count| count as f64 * scale).collect())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn test_histogram_data_range() {
        let histogram = Histogram::new(&[1.0, 2.0, 2.0, 3.0, 4.0], 3).unwrap();
        assert_eq!(histogram.edges(), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(histogram.counts(), &[1, 2, 2]);
        assert_eq!(histogram.total(), 5);
        assert_eq!(histogram.max_count(), 2);
        assert_eq!(histogram.centers(), vec![1.5, 2.5, 3.5]);
        assert_eq!(histogram.bin_width(), 1.0);
    }

    #[test]
    fn test_histogram_last_bin_is_closed() {
        let histogram = Histogram::with_range(&[0.0, 10.0, 10.5, -0.1], 2, (0.0, 10.0)).unwrap();
        assert_eq!(histogram.counts(), &[1, 1]);
    }

    #[test]
    fn test_histogram_degenerate_range() {
        let histogram = Histogram::new(&[5.0, 5.0], 2).unwrap();
        assert_eq!(histogram.edges(), &[4.5, 5.0, 5.5]);
        assert_eq!(histogram.counts(), &[0, 2]);

        let histogram = Histogram::new(&[], 4).unwrap();
        assert_eq!(histogram.edges(), &[0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(histogram.total(), 0);
    }

    #[test]
    fn test_histogram_invalid() {
        assert!(matches!(
            Histogram::new(&[1.0], 0),
            Err(SNNError::InvalidParameter(_))
        ));
        assert!(matches!(
            Histogram::with_range(&[1.0], 3, (2.0, 1.0)),
            Err(SNNError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_histogram_edges_rounding() {
        // 0.1-scaled step times land exactly on the bin edges
        let values: Vec<f64> = (0..=2000).map(|step| step as f64 * 0.1).collect();
        let histogram = Histogram::with_range(&values, 50, (0.0, 200.0)).unwrap();
        assert_eq!(histogram.total(), values.len());
        for (i, &count) in histogram.counts().iter().enumerate() {
            let lo = histogram.edges()[i];
            let hi = histogram.edges()[i + 1];
            let expected = values
                .iter()
                .filter(|&&v| v >= lo && (v < hi || (i == 49 && v <= hi)))
                .count();
            assert_eq!(count, expected);
        }
    }

    #[test]
    fn test_rates() {
        // 4 ms bins, 10 neurons: one spike is 25 Hz
        let histogram = Histogram::with_range(&[0.0, 1.0, 5.0], 2, (0.0, 8.0)).unwrap();
        let rates = histogram.rates(10).unwrap();
        assert_relative_eq!(rates[0], 50.0);
        assert_relative_eq!(rates[1], 25.0);
        assert!(histogram.rates(0).is_err());
    }
}
