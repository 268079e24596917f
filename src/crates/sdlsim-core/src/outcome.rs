//! Discrete weighted outcome distributions
//!
//! An [`Outcomes`] is a finite ordered list of buckets, each carrying a
//! positive weight, a non-negative duration in simulated seconds, and a
//! payload. The combinators preserve total weight under documented rules:
//!
//! | Combinator | Total weight of result | Duration rule |
//! |------------|------------------------|---------------|
//! | [`and`](Outcomes::and)           | product of inputs' | sum |
//! | [`parallel`](Outcomes::parallel) | product of inputs' | max |
//! | [`append`](Outcomes::append)     | sum of inputs'     | unchanged |
//! | [`map`](Outcomes::map)           | preserved          | unchanged |
//! | [`if_else`](Outcomes::if_else)   | preserved (× branch totals of 1) | sum |
//! | [`trim_to_size`](Outcomes::trim_to_size) | preserved | weight-weighted mean on merge |
//!
//! Weights are never normalized in place; every probability read divides by
//! [`total_weight`](Outcomes::total_weight) at the point of use. Sequential
//! composition multiplies bucket counts, so long chains are kept tractable
//! with [`trim_to_size`](Outcomes::trim_to_size).

use crate::error::EvalError;
use rand::Rng;

/// One (weight, duration, payload) tuple of a distribution
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket<T> {
    pub weight: f64,
    pub duration: f64,
    pub value: T,
}

/// A discrete probability-weighted distribution over (duration, payload)
#[derive(Debug, Clone, PartialEq)]
pub struct Outcomes<T> {
    buckets: Vec<Bucket<T>>,
}

impl<T> Default for Outcomes<T> {
    fn default() -> Self {
        Outcomes { buckets: Vec::new() }
    }
}

impl<T: Clone> Outcomes<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-bucket distribution with weight 1
    pub fn unit(duration: f64, value: T) -> Self {
        Outcomes {
            buckets: vec![Bucket { weight: 1.0, duration, value }],
        }
    }

    /// Append a bucket. Weights must be positive; non-positive weights are a
    /// programming bug in the calling model.
    pub fn add(mut self, weight: f64, duration: f64, value: T) -> Self {
        self.push(weight, duration, value);
        self
    }

    /// Non-consuming variant of [`add`](Outcomes::add)
    pub fn push(&mut self, weight: f64, duration: f64, value: T) {
        debug_assert!(weight > 0.0, "bucket weight must be positive");
        debug_assert!(duration >= 0.0, "bucket duration must be non-negative");
        self.buckets.push(Bucket { weight, duration, value });
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn buckets(&self) -> &[Bucket<T>] {
        &self.buckets
    }

    pub fn total_weight(&self) -> f64 {
        self.buckets.iter().map(|b| b.weight).sum()
    }

    /// Weight-weighted mean duration; 0 for an empty distribution
    pub fn mean_duration(&self) -> f64 {
        let total = self.total_weight();
        if total <= 0.0 {
            return 0.0;
        }
        self.buckets.iter().map(|b| b.weight * b.duration).sum::<f64>() / total
    }

    pub fn min_duration(&self) -> Option<f64> {
        self.buckets
            .iter()
            .map(|b| b.duration)
            .min_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
    }

    pub fn max_duration(&self) -> Option<f64> {
        self.buckets
            .iter()
            .map(|b| b.duration)
            .max_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
    }

    /// Probability mass (weight / total) of buckets matching the predicate
    pub fn mass_where(&self, pred: impl Fn(&T) -> bool) -> f64 {
        let total = self.total_weight();
        if total <= 0.0 {
            return 0.0;
        }
        self.buckets
            .iter()
            .filter(|b| pred(&b.value))
            .map(|b| b.weight)
            .sum::<f64>()
            / total
    }

    /// Sequential composition: do `self`, then `other`.
    ///
    /// Produces the cross product of buckets. Result weight is the product of
    /// the input weights, result duration the sum, result payload
    /// `reduce(a, b)`. The reducer's arity and types are enforced by the
    /// compiler, so malformed reducers are unrepresentable.
    ///
    /// Either side being empty yields an empty result.
    pub fn and<U: Clone, V: Clone>(
        &self,
        other: &Outcomes<U>,
        reduce: impl Fn(&T, &U) -> V,
    ) -> Outcomes<V> {
        let mut out = Vec::with_capacity(self.buckets.len() * other.buckets.len());
        for a in &self.buckets {
            for b in &other.buckets {
                out.push(Bucket {
                    weight: a.weight * b.weight,
                    duration: a.duration + b.duration,
                    value: reduce(&a.value, &b.value),
                });
            }
        }
        Outcomes { buckets: out }
    }

    /// Parallel join: run both sides concurrently and wait for the slower.
    ///
    /// Cross product with weight product and duration **max**; models
    /// `go A; go B; wait`.
    pub fn parallel<U: Clone, V: Clone>(
        &self,
        other: &Outcomes<U>,
        reduce: impl Fn(&T, &U) -> V,
    ) -> Outcomes<V> {
        let mut out = Vec::with_capacity(self.buckets.len() * other.buckets.len());
        for a in &self.buckets {
            for b in &other.buckets {
                out.push(Bucket {
                    weight: a.weight * b.weight,
                    duration: a.duration.max(b.duration),
                    value: reduce(&a.value, &b.value),
                });
            }
        }
        Outcomes { buckets: out }
    }

    /// Relabel payloads; weights and durations untouched
    pub fn map<U: Clone>(&self, f: impl Fn(&T) -> U) -> Outcomes<U> {
        Outcomes {
            buckets: self
                .buckets
                .iter()
                .map(|b| Bucket {
                    weight: b.weight,
                    duration: b.duration,
                    value: f(&b.value),
                })
                .collect(),
        }
    }

    /// Concatenate two distributions without cross-multiplying.
    ///
    /// Models an externally-made choice (cache-hit path ∪ cache-miss path);
    /// the total weight is the sum of the inputs' totals.
    pub fn append(mut self, other: Outcomes<T>) -> Outcomes<T> {
        self.buckets.extend(other.buckets);
        self
    }

    /// Partition buckets by a payload predicate without renormalizing
    pub fn split(&self, pred: impl Fn(&T) -> bool) -> (Outcomes<T>, Outcomes<T>) {
        let mut yes = Vec::new();
        let mut no = Vec::new();
        for b in &self.buckets {
            if pred(&b.value) {
                yes.push(b.clone());
            } else {
                no.push(b.clone());
            }
        }
        (Outcomes { buckets: yes }, Outcomes { buckets: no })
    }

    /// Branch on a payload predicate and compose each half with its branch.
    ///
    /// Buckets of `self` satisfying `pred` compose sequentially with
    /// `then_branch`, the rest with `else_branch`. Total weight is preserved
    /// whenever both branches have total weight 1.
    pub fn if_else<U: Clone, V: Clone>(
        &self,
        pred: impl Fn(&T) -> bool,
        then_branch: &Outcomes<U>,
        else_branch: &Outcomes<U>,
        reduce: impl Fn(&T, &U) -> V,
    ) -> Outcomes<V> {
        let (yes, no) = self.split(&pred);
        yes.and(then_branch, &reduce)
            .append(no.and(else_branch, &reduce))
    }

    /// Draw one bucket with probability `weight / total_weight`.
    ///
    /// Ties at cumulative-weight boundaries resolve in source order. Fails
    /// with [`EvalError::EmptyDistribution`] on an empty or zero-weight
    /// distribution.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Result<&Bucket<T>, EvalError> {
        let total = self.total_weight();
        if self.buckets.is_empty() || total <= 0.0 {
            return Err(EvalError::EmptyDistribution);
        }
        let draw = rng.gen_range(0.0..total);
        let mut acc = 0.0;
        for b in &self.buckets {
            acc += b.weight;
            if draw < acc {
                return Ok(b);
            }
        }
        // Floating point accumulation can land exactly on `total`.
        Ok(self.buckets.last().expect("non-empty checked above"))
    }

    /// Reduce the distribution to at most `max_buckets` buckets and
    /// `max_unique_durations` distinct durations.
    ///
    /// Buckets adjacent in duration order merge pairwise: merged weight is
    /// the sum, merged duration the weight-weighted mean, merged payload the
    /// one from the heavier side (majority-weight policy). Total weight and
    /// mean duration are preserved.
    pub fn trim_to_size(&self, max_buckets: usize, max_unique_durations: usize) -> Outcomes<T> {
        let max_buckets = max_buckets.max(1);
        let max_unique = max_unique_durations.max(1);

        let mut sorted: Vec<Bucket<T>> = self.buckets.clone();
        sorted.sort_by(|a, b| {
            a.duration
                .partial_cmp(&b.duration)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        while sorted.len() > max_buckets || Self::unique_durations(&sorted) > max_unique {
            if sorted.len() < 2 {
                break;
            }
            // Merge the adjacent pair with the smallest duration gap.
            let mut best = 0;
            let mut best_gap = f64::INFINITY;
            for i in 0..sorted.len() - 1 {
                let gap = sorted[i + 1].duration - sorted[i].duration;
                if gap < best_gap {
                    best_gap = gap;
                    best = i;
                }
            }
            let b = sorted.remove(best + 1);
            let a = &mut sorted[best];
            let w = a.weight + b.weight;
            a.duration = (a.weight * a.duration + b.weight * b.duration) / w;
            if b.weight > a.weight {
                a.value = b.value;
            }
            a.weight = w;
        }
        Outcomes { buckets: sorted }
    }

    fn unique_durations(buckets: &[Bucket<T>]) -> usize {
        // Buckets are sorted by duration when this is called.
        let mut count = 0;
        let mut last = f64::NEG_INFINITY;
        for b in buckets {
            if b.duration > last {
                count += 1;
                last = b.duration;
            }
        }
        count
    }
}
