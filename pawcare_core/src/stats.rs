//! Small order-statistics helpers shared by the estimator and the feeder.

/// Quartiles picked by index from an ascending slice: `q1 = s[n/4]`,
/// `median = s[n/2]`, `q3 = s[3n/4]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quartiles {
    pub q1: f32,
    pub median: f32,
    pub q3: f32,
}

impl Quartiles {
    pub fn from_sorted(sorted: &[f32]) -> Option<Self> {
        let n = sorted.len();
        if n == 0 {
            return None;
        }
        Some(Self {
            q1: sorted[n / 4],
            median: sorted[n / 2],
            q3: sorted[(3 * n) / 4],
        })
    }

    #[inline]
    pub fn iqr(&self) -> f32 {
        self.q3 - self.q1
    }

    /// Tukey fences `[q1 - k*iqr, q3 + k*iqr]`.
    #[inline]
    pub fn fences(&self, k: f32) -> (f32, f32) {
        let iqr = self.iqr();
        (self.q1 - k * iqr, self.q3 + k * iqr)
    }
}

pub fn mean(xs: &[f32]) -> Option<f32> {
    if xs.is_empty() {
        None
    } else {
        Some(xs.iter().sum::<f32>() / xs.len() as f32)
    }
}

/// Population standard deviation around a precomputed mean.
pub fn std_dev(xs: &[f32], mean: f32) -> f32 {
    if xs.is_empty() {
        return 0.0;
    }
    let var = xs.iter().map(|x| (x - mean) * (x - mean)).sum::<f32>() / xs.len() as f32;
    var.sqrt()
}

/// Upper median (`s[n/2]`) of an unsorted slice.
pub fn upper_median(xs: &[f32]) -> Option<f32> {
    if xs.is_empty() {
        return None;
    }
    let mut v = xs.to_vec();
    v.sort_by(f32::total_cmp);
    Some(v[v.len() / 2])
}

/// `(min, max)` of a slice, ignoring nothing; `None` when empty.
pub fn min_max(xs: &[f32]) -> Option<(f32, f32)> {
    let first = *xs.first()?;
    Some(
        xs.iter()
            .fold((first, first), |(lo, hi), &x| (lo.min(x), hi.max(x))),
    )
}

/// Sort a copy and drop `trim` elements from each end.
pub fn trimmed_sorted(xs: &[f32], trim: usize) -> Vec<f32> {
    let mut v = xs.to_vec();
    v.sort_by(f32::total_cmp);
    if v.len() <= 2 * trim {
        return Vec::new();
    }
    v[trim..v.len() - trim].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quartiles_use_index_rule() {
        let s = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let q = Quartiles::from_sorted(&s).unwrap();
        assert_eq!((q.q1, q.median, q.q3), (3.0, 5.0, 7.0));
        assert_eq!(q.iqr(), 4.0);
        assert_eq!(q.fences(1.5), (-3.0, 13.0));
        assert!(Quartiles::from_sorted(&[]).is_none());
    }

    #[test]
    fn mean_and_population_std() {
        let xs = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let m = mean(&xs).unwrap();
        assert_eq!(m, 5.0);
        assert!((std_dev(&xs, m) - 2.0).abs() < 1e-6);
        assert!(mean(&[]).is_none());
    }

    #[test]
    fn upper_median_of_even_len() {
        assert_eq!(upper_median(&[4.0, 1.0, 3.0, 2.0]), Some(3.0));
    }

    #[test]
    fn trimming() {
        assert_eq!(trimmed_sorted(&[5.0, 1.0, 3.0, 2.0, 4.0], 1), vec![2.0, 3.0, 4.0]);
        assert!(trimmed_sorted(&[1.0, 2.0], 1).is_empty());
        assert_eq!(min_max(&[3.0, -1.0, 2.0]), Some((-1.0, 3.0)));
    }
}
