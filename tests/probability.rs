use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use slipwise::atomic::{
    DecomposeOptions, decompose_match, estimate_entry_union_probability, implied_probability,
};
use slipwise::entry::NormalizedEntryRecord;
use slipwise::kelly::{KellyState, kelly_for_portfolio, solve_kelly_fraction};
use slipwise::portfolio::combine_atomic_match_profiles;

fn record(id: &str, text: &str, odds: f64) -> NormalizedEntryRecord {
    NormalizedEntryRecord::from_text(id, text, odds).expect("odds above 1")
}

#[test]
fn union_of_single_even_money_entry() {
    let union = estimate_entry_union_probability(&[implied_probability(2.0)]);
    assert!((union - 0.5).abs() < 1e-12);
}

#[test]
fn union_of_two_independent_coin_flips() {
    let union = estimate_entry_union_probability(&[0.5, 0.5]);
    assert!((union - 0.75).abs() < 1e-12);
}

#[test]
fn empty_combine_is_degenerate_miss() {
    let portfolio = combine_atomic_match_profiles(&[]);
    assert_eq!(portfolio.states.len(), 1);
    assert_eq!(portfolio.states[0].probability, 1.0);
    assert_eq!(portfolio.states[0].gross, 0.0);
    assert_eq!(portfolio.states[0].net, -1.0);
}

#[test]
fn kelly_sure_win_and_fair_coin() {
    let sure = [KellyState {
        probability: 1.0,
        net: 1.0,
    }];
    assert_eq!(solve_kelly_fraction(&sure, 0.95), 0.95);

    let coin = [
        KellyState {
            probability: 0.5,
            net: 1.0,
        },
        KellyState {
            probability: 0.5,
            net: -1.0,
        },
    ];
    assert_eq!(solve_kelly_fraction(&coin, 0.95), 0.0);
}

#[test]
fn random_result_entry_sets_sum_to_one() {
    const TEXTS: &[&str] = &["胜", "平", "负", "胜/平", "不败", "X2", "12", "客胜"];
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..200 {
        let count = rng.gen_range(1..=5);
        let entries: Vec<NormalizedEntryRecord> = (0..count)
            .map(|i| {
                let text = TEXTS[rng.gen_range(0..TEXTS.len())];
                let odds = rng.gen_range(1.01..15.0);
                record(&i.to_string(), text, odds)
            })
            .collect();
        let profile = decompose_match(&entries, &DecomposeOptions::default());
        let total: f64 = profile.states.iter().map(|s| s.probability).sum();
        assert!((total - 1.0).abs() < 1e-9, "total {total}");
        assert!(profile.states.iter().all(|s| (0.0..=1.0).contains(&s.probability)));
        // Result atoms never repeat within a match.
        let mut labels: Vec<&str> = profile.states.iter().map(|s| s.label.as_str()).collect();
        let before = labels.len();
        labels.dedup();
        assert_eq!(labels.len(), before);
        assert!(profile.states.len() <= 4);
    }
}

#[test]
fn portfolio_multiplies_hit_probabilities() {
    let a = decompose_match(&[record("1", "胜", 1.8)], &DecomposeOptions::default());
    let b = decompose_match(
        &[record("1", "2-1", 7.0), record("2", "大2.5", 1.9)],
        &DecomposeOptions::default(),
    );
    let portfolio = combine_atomic_match_profiles(&[a.clone(), b.clone()]);
    let expected = a.stats.hit_probability * b.stats.hit_probability;
    assert!((portfolio.stats.hit_probability - expected).abs() < 1e-9);
    assert!((portfolio.total_probability() - 1.0).abs() < 1e-9);
    assert_eq!(portfolio.match_count, 2);
}

#[test]
fn certain_single_entry_portfolio_takes_the_cap() {
    let profile = decompose_match(
        &[record("1", "胜", 2.0)],
        &DecomposeOptions {
            union_probability: Some(1.0),
            stake_weights: None,
        },
    );
    let portfolio = combine_atomic_match_profiles(&[profile]);
    assert_eq!(kelly_for_portfolio(&portfolio, 0.95), 0.95);
}

#[test]
fn fair_priced_entry_stakes_nothing() {
    // Implied 0.5 at odds 2.0: zero edge.
    let profile = decompose_match(&[record("1", "胜", 2.0)], &DecomposeOptions::default());
    let portfolio = combine_atomic_match_profiles(&[profile]);
    assert_eq!(kelly_for_portfolio(&portfolio, 0.95), 0.0);
}
