use charted_loan_risk::risk::{self, RiskScorer};
use proptest::prelude::*;

proptest! {
    #[test]
    fn base_score_lies_in_the_selected_bucket(
        days in -10.0f64..1000.0,
        seed in any::<u64>(),
    ) {
        let mut scorer = RiskScorer::seeded(seed);
        let score = scorer.base_score(days);
        let (low, high) = risk::score_range(days);
        prop_assert!(score >= low && score < high,
            "score {} outside [{}, {}) for {} days", score, low, high, days);
    }

    #[test]
    fn base_score_is_always_a_valid_probability(
        days in proptest::num::f64::ANY,
        seed in any::<u64>(),
    ) {
        let mut scorer = RiskScorer::seeded(seed);
        let score = scorer.base_score(days);
        prop_assert!((0.0..1.0).contains(&score));
    }

    #[test]
    fn tier_is_monotonic_in_score(a in 0.0f64..=1.0, b in 0.0f64..=1.0) {
        let (lower, higher) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(risk::risk_tier(lower) <= risk::risk_tier(higher));
    }

    #[test]
    fn predictive_score_never_shrinks_the_base(
        base in 0.0f64..=1.0,
        gpa in proptest::option::of(0.0f64..4.0),
        part_time in any::<bool>(),
        probation in any::<bool>(),
    ) {
        let enrollment = part_time.then_some("Part-time");
        let standing = probation.then_some("Academic Probation");
        let predictive = risk::predictive_score(base, gpa, enrollment, standing);
        prop_assert!(predictive >= base.min(1.0));
        prop_assert!(predictive <= 1.0);
    }

    #[test]
    fn more_delinquent_days_never_score_lower_buckets(
        days in 0.0f64..1000.0,
        extra in 0.0f64..1000.0,
    ) {
        let (low_a, _) = risk::score_range(days);
        let (low_b, _) = risk::score_range(days + extra);
        prop_assert!(low_b >= low_a);
    }
}
