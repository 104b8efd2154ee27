use serde::{Deserialize, Serialize};

use crate::entry::{NormalizedEntryRecord, ResultOutcome};

pub const MISS_LABEL: &str = "miss";

const MIN_IMPLIED: f64 = 1e-4;
const MAX_IMPLIED: f64 = 0.995;
const MASS_EPS: f64 = 1e-12;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecomposeOptions {
    /// Overrides the independence estimate when set.
    pub union_probability: Option<f64>,
    /// Positional stake weights; falls back to each record's own weight, then 1.
    pub stake_weights: Option<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomicDescriptor {
    pub id: String,
    pub odds: f64,
    pub implied_probability: f64,
    pub atoms: Vec<String>,
    pub stake_weight: f64,
    pub hit_probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeState {
    pub label: String,
    pub probability: f64,
    /// Return multiplier on the whole stake.
    pub gross: f64,
    pub net: f64,
    pub is_miss: bool,
}

impl OutcomeState {
    pub fn new(label: impl Into<String>, probability: f64, gross: f64) -> Self {
        Self {
            label: label.into(),
            probability,
            gross,
            net: gross - 1.0,
            is_miss: false,
        }
    }

    pub fn miss(probability: f64) -> Self {
        Self {
            label: MISS_LABEL.to_string(),
            probability,
            gross: 0.0,
            net: -1.0,
            is_miss: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileStats {
    pub expected_gross: f64,
    pub expected_return: f64,
    pub variance: f64,
    pub sigma: f64,
    /// Mass of every non-miss state.
    pub hit_probability: f64,
    /// Mass of states that return more than the stake.
    pub profit_win_probability: f64,
    /// Expected gross given a hit; 0 when nothing can hit.
    pub conditional_odds: f64,
}

impl ProfileStats {
    pub fn from_states(states: &[OutcomeState]) -> Self {
        let mut expected_gross = 0.0;
        let mut expected_return = 0.0;
        let mut hit_probability = 0.0;
        let mut profit_win_probability = 0.0;
        let mut hit_gross = 0.0;
        for s in states {
            expected_gross += s.probability * s.gross;
            expected_return += s.probability * s.net;
            if !s.is_miss {
                hit_probability += s.probability;
                hit_gross += s.probability * s.gross;
            }
            if s.net > 0.0 {
                profit_win_probability += s.probability;
            }
        }
        let variance = states
            .iter()
            .map(|s| s.probability * (s.net - expected_return).powi(2))
            .sum::<f64>()
            .max(0.0);
        let conditional_odds = if hit_probability > MASS_EPS {
            hit_gross / hit_probability
        } else {
            0.0
        };
        Self {
            expected_gross,
            expected_return,
            variance,
            sigma: variance.sqrt(),
            hit_probability: clamp_unit(hit_probability),
            profit_win_probability: clamp_unit(profit_win_probability),
            conditional_odds,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchProfile {
    pub descriptors: Vec<AtomicDescriptor>,
    pub states: Vec<OutcomeState>,
    pub union_probability: f64,
    pub stats: ProfileStats,
}

impl MatchProfile {
    pub fn total_probability(&self) -> f64 {
        self.states.iter().map(|s| s.probability).sum()
    }
}

/// Clamped 1/odds.
pub fn implied_probability(odds: f64) -> f64 {
    if !odds.is_finite() || odds <= 0.0 {
        return MIN_IMPLIED;
    }
    (1.0 / odds).clamp(MIN_IMPLIED, MAX_IMPLIED)
}

/// Probability that at least one entry hits, treating entries as independent.
///
/// Outcomes of one market are mutually exclusive, so this overstates overlap
/// for result entries. It is kept as a deliberate approximation.
pub fn estimate_entry_union_probability(implied: &[f64]) -> f64 {
    let all_miss: f64 = implied.iter().map(|p| 1.0 - clamp_unit(*p)).product();
    clamp_unit(1.0 - all_miss)
}

/// Splits a match's entries into disjoint outcome states plus a miss state.
pub fn decompose_match(entries: &[NormalizedEntryRecord], options: &DecomposeOptions) -> MatchProfile {
    if entries.is_empty() {
        let states = vec![OutcomeState::miss(1.0)];
        let stats = ProfileStats::from_states(&states);
        return MatchProfile {
            descriptors: Vec::new(),
            states,
            union_probability: 0.0,
            stats,
        };
    }

    let result_sets: Option<Vec<Vec<ResultOutcome>>> = entries
        .iter()
        .map(|e| e.semantic.result_outcomes().map(<[ResultOutcome]>::to_vec))
        .collect();

    let coverage: Vec<Vec<String>> = match &result_sets {
        Some(sets) => sets
            .iter()
            .map(|set| set.iter().map(|o| o.as_str().to_string()).collect())
            .collect(),
        None => entries.iter().map(|e| vec![format!("entry:{}", e.id)]).collect(),
    };

    let atoms: Vec<String> = match &result_sets {
        Some(sets) => ResultOutcome::ALL
            .iter()
            .filter(|o| sets.iter().any(|set| set.contains(*o)))
            .map(|o| o.as_str().to_string())
            .collect(),
        None => {
            let mut seen: Vec<String> = Vec::with_capacity(coverage.len());
            for atom in coverage.iter().flatten() {
                if !seen.contains(atom) {
                    seen.push(atom.clone());
                }
            }
            seen
        }
    };

    let implied: Vec<f64> = entries.iter().map(|e| implied_probability(e.odds)).collect();
    let stake_weights = normalized_stake_weights(entries, options.stake_weights.as_deref());

    let mut atom_weights = vec![0.0; atoms.len()];
    for (covered, p) in coverage.iter().zip(&implied) {
        if covered.is_empty() {
            continue;
        }
        let share = p / covered.len() as f64;
        for atom in covered {
            if let Some(idx) = atoms.iter().position(|a| a == atom) {
                atom_weights[idx] += share;
            }
        }
    }
    let weight_total: f64 = atom_weights.iter().sum();
    if weight_total > MASS_EPS {
        atom_weights.iter_mut().for_each(|w| *w /= weight_total);
    } else {
        let even = 1.0 / atoms.len().max(1) as f64;
        atom_weights.iter_mut().for_each(|w| *w = even);
    }

    let union = options
        .union_probability
        .filter(|u| u.is_finite())
        .map(clamp_unit)
        .unwrap_or_else(|| estimate_entry_union_probability(&implied));

    let mut states: Vec<OutcomeState> = atoms
        .iter()
        .zip(&atom_weights)
        .map(|(atom, weight)| {
            let gross: f64 = coverage
                .iter()
                .zip(entries)
                .zip(&stake_weights)
                .filter(|((covered, _), _)| covered.contains(atom))
                .map(|((_, entry), stake)| stake * entry.odds)
                .sum();
            OutcomeState::new(atom.clone(), clamp_unit(union * weight), gross)
        })
        .collect();
    states.push(OutcomeState::miss(clamp_unit(1.0 - union)));
    renormalize(&mut states);

    let descriptors = entries
        .iter()
        .zip(coverage)
        .zip(implied.iter().zip(&stake_weights))
        .map(|((entry, covered), (p, stake))| {
            let hit_probability = states
                .iter()
                .filter(|s| !s.is_miss && covered.contains(&s.label))
                .map(|s| s.probability)
                .sum::<f64>();
            AtomicDescriptor {
                id: entry.id.clone(),
                odds: entry.odds,
                implied_probability: *p,
                atoms: covered,
                stake_weight: *stake,
                hit_probability: clamp_unit(hit_probability),
            }
        })
        .collect();

    let stats = ProfileStats::from_states(&states);
    MatchProfile {
        descriptors,
        states,
        union_probability: union,
        stats,
    }
}

/// Scales state probabilities to sum to 1, collapsing to a lone miss state
/// when there is no usable mass.
pub(crate) fn renormalize(states: &mut Vec<OutcomeState>) {
    let total: f64 = states
        .iter()
        .map(|s| s.probability)
        .filter(|p| p.is_finite())
        .sum();
    if total <= MASS_EPS {
        states.clear();
        states.push(OutcomeState::miss(1.0));
        return;
    }
    for s in states.iter_mut() {
        s.probability = if s.probability.is_finite() {
            clamp_unit(s.probability / total)
        } else {
            0.0
        };
    }
}

fn normalized_stake_weights(entries: &[NormalizedEntryRecord], overrides: Option<&[f64]>) -> Vec<f64> {
    let raw: Vec<f64> = entries
        .iter()
        .enumerate()
        .map(|(idx, entry)| {
            overrides
                .and_then(|w| w.get(idx).copied())
                .or(entry.stake_weight)
                .unwrap_or(1.0)
        })
        .map(|w| if w.is_finite() && w > 0.0 { w } else { 0.0 })
        .collect();
    let total: f64 = raw.iter().sum();
    if total <= MASS_EPS {
        let even = 1.0 / entries.len() as f64;
        return vec![even; entries.len()];
    }
    raw.into_iter().map(|w| w / total).collect()
}

fn clamp_unit(p: f64) -> f64 {
    if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, text: &str, odds: f64) -> NormalizedEntryRecord {
        NormalizedEntryRecord::from_text(id, text, odds).expect("valid odds")
    }

    fn total(states: &[OutcomeState]) -> f64 {
        states.iter().map(|s| s.probability).sum()
    }

    #[test]
    fn double_chance_with_single_result() {
        let entries = vec![record("a", "胜/平", 1.5), record("b", "负", 4.0)];
        let profile = decompose_match(&entries, &DecomposeOptions::default());
        let labels: Vec<&str> = profile.states.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["win", "draw", "lose", "miss"]);
        assert!((total(&profile.states) - 1.0).abs() < 1e-9);

        // Half the stake rides each entry.
        let win = &profile.states[0];
        assert!((win.gross - 0.75).abs() < 1e-9);
        let lose = &profile.states[2];
        assert!((lose.gross - 2.0).abs() < 1e-9);

        let a = &profile.descriptors[0];
        assert_eq!(a.atoms, vec!["win".to_string(), "draw".to_string()]);
        let expected = profile.states[0].probability + profile.states[1].probability;
        assert!((a.hit_probability - expected).abs() < 1e-12);
    }

    #[test]
    fn mixed_markets_use_singleton_atoms() {
        let entries = vec![record("1", "2-1", 8.0), record("2", "大2.5", 1.9)];
        let profile = decompose_match(&entries, &DecomposeOptions::default());
        assert_eq!(profile.states[0].label, "entry:1");
        assert_eq!(profile.states[1].label, "entry:2");
        assert!(profile.states[2].is_miss);
        let union = 1.0 - (1.0 - 1.0 / 8.0) * (1.0 - 1.0 / 1.9);
        assert!((profile.union_probability - union).abs() < 1e-12);
    }

    #[test]
    fn explicit_union_and_stake_weights() {
        let entries = vec![record("a", "胜", 2.0), record("b", "平", 3.0)];
        let options = DecomposeOptions {
            union_probability: Some(0.6),
            stake_weights: Some(vec![3.0, 1.0]),
        };
        let profile = decompose_match(&entries, &options);
        assert!((profile.states.last().map(|s| s.probability).unwrap_or(0.0) - 0.4).abs() < 1e-12);
        assert!((profile.states[0].gross - 1.5).abs() < 1e-12);
        assert!((profile.states[1].gross - 0.75).abs() < 1e-12);
        assert!((profile.stats.hit_probability - 0.6).abs() < 1e-12);
    }

    #[test]
    fn certain_union_leaves_empty_miss_state() {
        let entries = vec![record("a", "胜", 2.0)];
        let options = DecomposeOptions {
            union_probability: Some(1.0),
            ..DecomposeOptions::default()
        };
        let profile = decompose_match(&entries, &options);
        assert_eq!(profile.states.len(), 2);
        assert!((profile.states[0].probability - 1.0).abs() < 1e-12);
        assert_eq!(profile.states[1].probability, 0.0);
        assert!((profile.stats.expected_return - 1.0).abs() < 1e-12);
        assert!((profile.stats.conditional_odds - 2.0).abs() < 1e-12);
    }

    #[test]
    fn no_entries_is_all_miss() {
        let profile = decompose_match(&[], &DecomposeOptions::default());
        assert_eq!(profile.states, vec![OutcomeState::miss(1.0)]);
        assert_eq!(profile.stats.hit_probability, 0.0);
        assert_eq!(profile.stats.expected_return, -1.0);
    }

    #[test]
    fn implied_probability_is_clamped() {
        assert_eq!(implied_probability(1.0000001), MAX_IMPLIED);
        assert_eq!(implied_probability(1e9), MIN_IMPLIED);
        assert_eq!(implied_probability(f64::INFINITY), MIN_IMPLIED);
    }

    #[test]
    fn stats_on_known_distribution() {
        let states = vec![OutcomeState::new("x", 0.5, 3.0), OutcomeState::miss(0.5)];
        let stats = ProfileStats::from_states(&states);
        assert!((stats.expected_gross - 1.5).abs() < 1e-12);
        assert!((stats.expected_return - 0.5).abs() < 1e-12);
        assert!((stats.variance - 2.25).abs() < 1e-12);
        assert!((stats.sigma - 1.5).abs() < 1e-12);
        assert!((stats.profit_win_probability - 0.5).abs() < 1e-12);
    }
}
