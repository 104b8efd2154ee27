//! Stake sizing over a discrete outcome distribution.
//!
//! The fraction maximizes expected log growth
//!     g(f) = Σ pᵢ · ln(1 + f · netᵢ)
//! found by a coarse grid scan refined around the best point. Any state that
//! would wipe out the stake at `f` makes g(f) = -∞.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::atomic::OutcomeState;
use crate::portfolio::PortfolioProfile;

pub const DEFAULT_MAX_FRACTION: f64 = 0.95;
pub const DEFAULT_KELLY_MULTIPLIER: f64 = 0.25;

const COARSE_STEP: f64 = 0.02;
const REFINE_ROUNDS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KellyState {
    pub probability: f64,
    pub net: f64,
}

impl KellyState {
    pub fn from_outcomes(states: &[OutcomeState]) -> Vec<KellyState> {
        states
            .iter()
            .map(|s| KellyState {
                probability: s.probability,
                net: s.net,
            })
            .collect()
    }
}

pub fn expected_log_growth(states: &[KellyState], fraction: f64) -> f64 {
    let mut total = 0.0;
    for s in states {
        if s.probability <= 0.0 {
            continue;
        }
        let wealth = 1.0 + fraction * s.net;
        if wealth <= 0.0 {
            return f64::NEG_INFINITY;
        }
        total += s.probability * wealth.ln();
    }
    total
}

/// Growth-optimal stake fraction in `[0, max_fraction]`; 0 on degenerate input.
///
/// `max_fraction` above 1 is capped at 1: the solver never stakes more than the bankroll.
pub fn solve_kelly_fraction(states: &[KellyState], max_fraction: f64) -> f64 {
    if !max_fraction.is_finite() || max_fraction <= 0.0 || states.is_empty() {
        return 0.0;
    }
    let valid = states
        .iter()
        .all(|s| s.probability.is_finite() && s.probability >= 0.0 && s.net.is_finite());
    if !valid || states.iter().map(|s| s.probability).sum::<f64>() <= 0.0 {
        return 0.0;
    }
    let max_fraction = max_fraction.min(1.0);

    let mut best: f64 = 0.0;
    let mut best_growth = expected_log_growth(states, 0.0);
    let mut step = COARSE_STEP;
    let mut window = (0.0, max_fraction);
    for round in 0..=REFINE_ROUNDS {
        if round > 0 {
            window = ((best - 2.0 * step).max(0.0), (best + 2.0 * step).min(max_fraction));
            step /= 2.0;
        }
        for f in grid(window.0, window.1, step) {
            let g = expected_log_growth(states, f);
            if g > best_growth {
                best = f;
                best_growth = g;
            }
        }
    }

    let fraction = best.clamp(0.0, max_fraction);
    debug!(fraction, growth = best_growth, "kelly fraction solved");
    fraction
}

/// `lo, lo + step, ...` followed by `hi` itself.
fn grid(lo: f64, hi: f64, step: f64) -> Vec<f64> {
    if hi < lo {
        return Vec::new();
    }
    let steps = ((hi - lo) / step).floor() as usize;
    let mut points: Vec<f64> = (0..=steps).map(|k| lo + k as f64 * step).collect();
    points.push(hi);
    points
}

pub fn kelly_for_portfolio(profile: &PortfolioProfile, max_fraction: f64) -> f64 {
    solve_kelly_fraction(&KellyState::from_outcomes(&profile.states), max_fraction)
}

/// A stake recommendation derived from a full Kelly fraction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StakePlan {
    pub full_kelly: f64,
    /// Fraction after the Kelly multiplier.
    pub recommended_fraction: f64,
    pub stake: f64,
}

impl StakePlan {
    /// Applies fractional Kelly to `bankroll`. The stake is rounded down to a
    /// multiple of `min_stake`; a raw stake below half of `min_stake` becomes 0.
    pub fn recommend(fraction: f64, bankroll: f64, multiplier: f64, min_stake: f64) -> Self {
        let full_kelly = if fraction.is_finite() { fraction.max(0.0) } else { 0.0 };
        let multiplier = if multiplier.is_finite() { multiplier.max(0.0) } else { 0.0 };
        let recommended_fraction = full_kelly * multiplier;
        let bankroll = if bankroll.is_finite() { bankroll.max(0.0) } else { 0.0 };

        let raw = bankroll * recommended_fraction;
        let stake = if raw <= 0.0 {
            0.0
        } else if min_stake.is_finite() && min_stake > 0.0 {
            let rounded = (raw / min_stake).floor() * min_stake;
            if rounded >= min_stake {
                rounded
            } else if raw < min_stake / 2.0 {
                0.0
            } else {
                min_stake
            }
        } else {
            raw
        };

        Self {
            full_kelly,
            recommended_fraction,
            stake,
        }
    }
}
