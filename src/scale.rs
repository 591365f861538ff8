use crate::models::Distribution;

pub const SCALE_MIN: f64 = 1.0;
pub const SCALE_MAX: f64 = 5.0;

/// True for a rating on the 1-5 scale. NaN and out-of-range values are not.
pub fn is_rating(value: f64) -> bool {
    (SCALE_MIN..=SCALE_MAX).contains(&value)
}

fn valid_values(values: &[Option<f64>]) -> impl Iterator<Item = f64> + '_ {
    values.iter().filter_map(|v| v.filter(|x| is_rating(*x)))
}

/// Arithmetic mean over the non-null, in-range values. `None` when nothing
/// usable remains.
pub fn mean(values: &[Option<f64>]) -> Option<f64> {
    let (sum, count) = valid_values(values).fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Three-bucket split of a 1-5 scale: bottom2 (<= 2), mid (3), top2 (>= 4).
/// Anything strictly between 2 and 4 counts as mid so the buckets stay
/// exhaustive.
pub fn distribution(values: &[Option<f64>]) -> Distribution {
    let (mut low, mut mid, mut high, mut n) = (0usize, 0usize, 0usize, 0usize);
    for v in valid_values(values) {
        n += 1;
        if v <= 2.0 {
            low += 1;
        } else if v >= 4.0 {
            high += 1;
        } else {
            mid += 1;
        }
    }
    if n == 0 {
        return Distribution::default();
    }
    let total = n as f64;
    Distribution {
        bottom2: low as f64 / total,
        mid: mid as f64 / total,
        top2: high as f64 / total,
        n,
    }
}

/// Unweighted mean of the present means.
pub fn mean_of_means<I>(means: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let present: Vec<Option<f64>> = means.into_iter().filter(Option::is_some).collect();
    mean(&present)
}

/// Pools several distributions, weighting each bucket by its `n`.
pub fn pooled_distribution<'a, I>(parts: I) -> Distribution
where
    I: IntoIterator<Item = &'a Distribution>,
{
    let mut pooled = Distribution::default();
    let (mut low, mut mid, mut high) = (0.0, 0.0, 0.0);
    for d in parts {
        let weight = d.n as f64;
        pooled.n += d.n;
        low += d.bottom2 * weight;
        mid += d.mid * weight;
        high += d.top2 * weight;
    }
    if pooled.n == 0 {
        return Distribution::default();
    }
    let total = pooled.n as f64;
    pooled.bottom2 = low / total;
    pooled.mid = mid / total;
    pooled.top2 = high / total;
    pooled
}
