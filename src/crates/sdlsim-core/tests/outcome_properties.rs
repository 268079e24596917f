//! Property tests for the outcome algebra conservation laws

use proptest::prelude::*;
use sdlsim_core::Outcomes;

fn arb_outcomes() -> impl Strategy<Value = Outcomes<bool>> {
    prop::collection::vec(
        (0.01_f64..10.0, 0.0_f64..1.0, any::<bool>()),
        1..12,
    )
    .prop_map(|buckets| {
        let mut out = Outcomes::new();
        for (w, d, v) in buckets {
            out.push(w, d, v);
        }
        out
    })
}

proptest! {
    #[test]
    fn and_total_weight_is_product(a in arb_outcomes(), b in arb_outcomes()) {
        let c = a.and(&b, |x, y| *x && *y);
        let expected = a.total_weight() * b.total_weight();
        prop_assert!((c.total_weight() - expected).abs() < 1e-6 * expected.max(1.0));
    }

    #[test]
    fn parallel_total_weight_is_product(a in arb_outcomes(), b in arb_outcomes()) {
        let c = a.parallel(&b, |x, y| *x && *y);
        let expected = a.total_weight() * b.total_weight();
        prop_assert!((c.total_weight() - expected).abs() < 1e-6 * expected.max(1.0));
    }

    #[test]
    fn append_total_weight_is_sum(a in arb_outcomes(), b in arb_outcomes()) {
        let expected = a.total_weight() + b.total_weight();
        let c = a.append(b);
        prop_assert!((c.total_weight() - expected).abs() < 1e-9);
    }

    #[test]
    fn map_preserves_weight(a in arb_outcomes()) {
        let mapped = a.map(|v| !*v);
        prop_assert!((mapped.total_weight() - a.total_weight()).abs() < 1e-9);
    }

    #[test]
    fn if_else_preserves_weight(a in arb_outcomes()) {
        let then_branch = Outcomes::unit(0.001, true);
        let else_branch = Outcomes::unit(0.01, true);
        let out = a.if_else(|v| *v, &then_branch, &else_branch, |_, r| *r);
        prop_assert!((out.total_weight() - a.total_weight()).abs() < 1e-6);
    }

    #[test]
    fn trim_preserves_weight_and_mean(a in arb_outcomes()) {
        let trimmed = a.trim_to_size(4, 4);
        prop_assert!(trimmed.len() <= 4);
        prop_assert!((trimmed.total_weight() - a.total_weight()).abs() < 1e-6);
        prop_assert!((trimmed.mean_duration() - a.mean_duration()).abs() < 1e-6);
    }

    #[test]
    fn and_duration_bounds(a in arb_outcomes(), b in arb_outcomes()) {
        let c = a.and(&b, |x, y| *x && *y);
        let min_expected = a.min_duration().unwrap() + b.min_duration().unwrap();
        let max_expected = a.max_duration().unwrap() + b.max_duration().unwrap();
        prop_assert!(c.min_duration().unwrap() >= min_expected - 1e-12);
        prop_assert!(c.max_duration().unwrap() <= max_expected + 1e-12);
    }

    #[test]
    fn parallel_duration_is_pairwise_max(a in arb_outcomes(), b in arb_outcomes()) {
        let c = a.parallel(&b, |x, y| (*x, *y));
        let mut idx = 0;
        for ba in a.buckets() {
            for bb in b.buckets() {
                let bucket = &c.buckets()[idx];
                prop_assert!((bucket.duration - ba.duration.max(bb.duration)).abs() < 1e-12);
                idx += 1;
            }
        }
    }
}
