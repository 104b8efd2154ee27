use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::atomic::{MatchProfile, OutcomeState, ProfileStats, renormalize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioProfile {
    pub match_count: usize,
    pub states: Vec<OutcomeState>,
    pub stats: ProfileStats,
}

impl PortfolioProfile {
    pub fn total_probability(&self) -> f64 {
        self.states.iter().map(|s| s.probability).sum()
    }
}

fn gross_key(gross: f64) -> String {
    format!("{gross:.8}")
}

/// Joint distribution of independent match profiles, as for a parlay.
///
/// States whose gross agrees to 8 decimals are merged after each step.
pub fn combine_atomic_match_profiles(profiles: &[MatchProfile]) -> PortfolioProfile {
    if profiles.is_empty() {
        let states = vec![OutcomeState::miss(1.0)];
        let stats = ProfileStats::from_states(&states);
        return PortfolioProfile {
            match_count: 0,
            states,
            stats,
        };
    }

    let mut acc: Vec<OutcomeState> = vec![OutcomeState::new(String::new(), 1.0, 1.0)];
    for profile in profiles {
        let mut next: Vec<OutcomeState> = Vec::with_capacity(acc.len() * profile.states.len());
        let mut index: HashMap<String, usize> = HashMap::new();
        for left in &acc {
            for right in &profile.states {
                let probability = left.probability * right.probability;
                let gross = left.gross * right.gross;
                let is_miss = left.is_miss || right.is_miss;
                let key = gross_key(gross);
                match index.get(&key) {
                    Some(&slot) => {
                        let merged = &mut next[slot];
                        merged.probability += probability;
                        merged.is_miss &= is_miss;
                    }
                    None => {
                        let label = if left.label.is_empty() {
                            right.label.clone()
                        } else {
                            format!("{} & {}", left.label, right.label)
                        };
                        let mut state = OutcomeState::new(label, probability, gross);
                        state.is_miss = is_miss;
                        index.insert(key, next.len());
                        next.push(state);
                    }
                }
            }
        }
        acc = next;
    }
    renormalize(&mut acc);

    let stats = ProfileStats::from_states(&acc);
    debug!(
        matches = profiles.len(),
        states = acc.len(),
        hit = stats.hit_probability,
        "combined match profiles"
    );
    PortfolioProfile {
        match_count: profiles.len(),
        states: acc,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atomic::{DecomposeOptions, decompose_match};
    use crate::entry::NormalizedEntryRecord;

    fn single(text: &str, odds: f64, union: f64) -> MatchProfile {
        let entries = vec![NormalizedEntryRecord::from_text("e", text, odds).expect("odds")];
        decompose_match(
            &entries,
            &DecomposeOptions {
                union_probability: Some(union),
                stake_weights: None,
            },
        )
    }

    #[test]
    fn empty_input_is_degenerate() {
        let portfolio = combine_atomic_match_profiles(&[]);
        assert_eq!(portfolio.states.len(), 1);
        let s = &portfolio.states[0];
        assert_eq!((s.probability, s.gross, s.net), (1.0, 0.0, -1.0));
    }

    #[test]
    fn miss_states_merge_on_zero_gross() {
        let portfolio =
            combine_atomic_match_profiles(&[single("胜", 2.0, 0.5), single("平", 3.0, 0.4)]);
        // hit&hit, hit&miss, miss&hit and miss&miss: the last three share gross 0.
        assert_eq!(portfolio.states.len(), 2);
        let hit = &portfolio.states[0];
        assert!((hit.gross - 6.0).abs() < 1e-12);
        assert!((hit.probability - 0.2).abs() < 1e-12);
        assert!(portfolio.states[1].is_miss);
        assert!((portfolio.stats.hit_probability - 0.2).abs() < 1e-12);
        assert!((portfolio.total_probability() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn single_profile_keeps_its_states() {
        let profile = single("胜", 2.0, 0.5);
        let portfolio = combine_atomic_match_profiles(std::slice::from_ref(&profile));
        assert_eq!(portfolio.states.len(), profile.states.len());
        assert_eq!(portfolio.states[0].label, "win");
        assert!((portfolio.stats.expected_gross - profile.stats.expected_gross).abs() < 1e-12);
    }
}
