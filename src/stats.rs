/// Mean, minimum and maximum of a set of samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

impl Summary {
    /// Returns `None` for an empty slice. NaN samples are ignored.
    pub fn of(samples: &[f64]) -> Option<Self> {
        Self::of_iter(samples.iter().copied())
    }

    pub fn of_iter(samples: impl IntoIterator<Item = f64>) -> Option<Self> {
        let mut count = 0_usize;
        let mut sum = 0.0_f64;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;

        for value in samples.into_iter().filter(|value| !value.is_nan()) {
            count += 1;
            sum += value;
            min = min.min(value);
            max = max.max(value);
        }

        if count == 0 {
            return None;
        }

        Some(Self {
            mean: sum / count as f64,
            min,
            max,
            count,
        })
    }
}

/// Mean of the present values, `None` when every value is absent.
pub fn mean_of_present(values: impl IntoIterator<Item = Option<f64>>) -> Option<f64> {
    Summary::of_iter(values.into_iter().flatten()).map(|summary| summary.mean)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_of_fixed_samples() {
        let summary = Summary::of(&[10.0, 20.0, 30.0, 40.0]).expect("non-empty");
        assert_eq!(summary.mean, 25.0);
        assert_eq!(summary.min, 10.0);
        assert_eq!(summary.max, 40.0);
        assert_eq!(summary.count, 4);
    }

    #[test]
    fn empty_and_nan_only_inputs_have_no_summary() {
        assert!(Summary::of(&[]).is_none());
        assert!(Summary::of(&[f64::NAN]).is_none());
    }

    #[test]
    fn mean_of_present_skips_missing_values() {
        assert_eq!(mean_of_present([Some(2.0), None, Some(4.0)]), Some(3.0));
        assert_eq!(mean_of_present([None, None]), None);
    }
}
