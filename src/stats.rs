//! Summary statistics over a set of samples

use serde::{Deserialize, Serialize};

/// Min, max, mean and population variance of a sample set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub var: f64,
    pub count: usize,
}

impl Stats {
    /// Summarise `samples`; `None` when empty
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let count = samples.len();
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for &x in samples {
            min = min.min(x);
            max = max.max(x);
            sum += x;
        }
        let mean = sum / count as f64;
        let var = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / count as f64;

        Some(Self {
            min,
            max,
            mean,
            var,
            count,
        })
    }

    pub fn std_dev(&self) -> f64 {
        self.var.sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty() {
        assert!(Stats::from_samples(&[]).is_none());
    }

    #[test]
    fn test_population_variance() {
        let stats = Stats::from_samples(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(stats.min, 2.0);
        assert_eq!(stats.max, 9.0);
        assert_eq!(stats.mean, 5.0);
        assert_eq!(stats.var, 4.0);
        assert_eq!(stats.std_dev(), 2.0);
        assert_eq!(stats.count, 8);
    }

    #[test]
    fn test_single_sample() {
        let stats = Stats::from_samples(&[1.5]).unwrap();
        assert_eq!(stats.var, 0.0);
        assert_eq!(stats.min, stats.max);
    }
}
