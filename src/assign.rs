use tracing::debug;

use crate::model::{Diagnostic, MatchDraft, ParsedParameters};
use crate::params::snap_fid;

/// How a flat list of scalar values is laid over the matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarPlan {
    Skip,
    Broadcast,
    Positional,
    /// Counts disagree: map what lines up and warn.
    PositionalPrefix,
}

pub fn scalar_plan(count: usize, matches: usize) -> ScalarPlan {
    match (count, matches) {
        (0, _) | (_, 0) => ScalarPlan::Skip,
        (1, _) => ScalarPlan::Broadcast,
        (c, m) if c == m => ScalarPlan::Positional,
        _ => ScalarPlan::PositionalPrefix,
    }
}

/// How home/away values (fse, tys) are laid over the matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidePlan {
    Skip,
    /// Explicit home/away lists, each following `scalar_plan`.
    PerSide,
    /// One value for every side of every match.
    BothSides,
    /// Two values, one match.
    HomeAway,
    ConsecutivePairs,
    PairPrefix { pairs: usize },
    /// Value i goes to both sides of match i.
    EachToBothSides,
}

pub fn side_plan(has_side_markers: bool, count: usize, matches: usize) -> SidePlan {
    match (has_side_markers, count, matches) {
        (true, _, 0) => SidePlan::Skip,
        (true, _, _) => SidePlan::PerSide,
        (false, 0, _) | (false, _, 0) => SidePlan::Skip,
        (false, 1, _) => SidePlan::BothSides,
        (false, 2, 1) => SidePlan::HomeAway,
        (false, c, m) if c == 2 * m => SidePlan::ConsecutivePairs,
        (false, c, m) if c % 2 == 0 => SidePlan::PairPrefix {
            pairs: m.min(c / 2),
        },
        _ => SidePlan::EachToBothSides,
    }
}

fn lay_scalars<T: Copy>(values: &[T], matches: usize) -> (Vec<Option<T>>, bool) {
    let plan = scalar_plan(values.len(), matches);
    let laid = (0..matches)
        .map(|i| match plan {
            ScalarPlan::Skip => None,
            ScalarPlan::Broadcast => values.first().copied(),
            ScalarPlan::Positional | ScalarPlan::PositionalPrefix => values.get(i).copied(),
        })
        .collect();
    (laid, plan == ScalarPlan::PositionalPrefix)
}

fn lay_global_sides<T: Copy>(values: &[T], matches: usize) -> Vec<(Option<T>, Option<T>)> {
    let mut laid = vec![(None, None); matches];
    match side_plan(false, values.len(), matches) {
        SidePlan::Skip | SidePlan::PerSide => {}
        SidePlan::BothSides => {
            for slot in laid.iter_mut() {
                *slot = (Some(values[0]), Some(values[0]));
            }
        }
        SidePlan::HomeAway => laid[0] = (Some(values[0]), Some(values[1])),
        SidePlan::ConsecutivePairs => {
            for (slot, pair) in laid.iter_mut().zip(values.chunks_exact(2)) {
                *slot = (Some(pair[0]), Some(pair[1]));
            }
        }
        SidePlan::PairPrefix { pairs } => {
            for (slot, pair) in laid.iter_mut().zip(values.chunks_exact(2)).take(pairs) {
                *slot = (Some(pair[0]), Some(pair[1]));
            }
        }
        SidePlan::EachToBothSides => {
            for (slot, value) in laid.iter_mut().zip(values) {
                *slot = (Some(*value), Some(*value));
            }
        }
    }
    laid
}

/// Home/away pairs per match plus whether any list had to be truncated.
fn lay_sides<T: Copy>(
    home: &[T],
    away: &[T],
    global: &[T],
    matches: usize,
) -> (Vec<(Option<T>, Option<T>)>, bool) {
    let has_markers = !home.is_empty() || !away.is_empty();
    let mut mismatched = false;
    let mut laid = vec![(None, None); matches];
    if side_plan(has_markers, home.len() + away.len(), matches) == SidePlan::PerSide {
        let (homes, home_mismatch) = lay_scalars(home, matches);
        let (aways, away_mismatch) = lay_scalars(away, matches);
        mismatched = home_mismatch || away_mismatch;
        for (slot, (h, a)) in laid.iter_mut().zip(homes.into_iter().zip(aways)) {
            *slot = (h, a);
        }
    }
    for (slot, (h, a)) in laid.iter_mut().zip(lay_global_sides(global, matches)) {
        if slot.0.is_none() {
            slot.0 = h;
        }
        if slot.1.is_none() {
            slot.1 = a;
        }
    }
    (laid, mismatched)
}

/// Odds group per match. A lone group with one value per match is spread
/// across the matches when none of them has more than one entry. Single-value
/// groups that outnumber the matches but equal the entry count go one per
/// entry, in order.
fn lay_odds_groups(groups: &[Vec<f64>], matches: &[MatchDraft]) -> (Vec<Vec<f64>>, bool) {
    let n = matches.len();
    let spread = n > 1
        && groups.len() == 1
        && groups[0].len() == n
        && matches.iter().all(|m| m.entries.len() <= 1);
    if spread {
        return (groups[0].iter().map(|v| vec![*v]).collect(), false);
    }
    let entry_count: usize = matches.iter().map(|m| m.entries.len()).sum();
    let per_entry = groups.len() > n
        && groups.len() == entry_count
        && groups.iter().all(|g| g.len() == 1);
    if per_entry {
        let mut values = groups.iter().map(|g| g[0]);
        let laid: Vec<Vec<f64>> = matches
            .iter()
            .map(|m| values.by_ref().take(m.entries.len()).collect())
            .collect();
        return (laid, false);
    }
    let laid = (0..n).map(|i| groups.get(i).cloned().unwrap_or_default()).collect();
    let mismatched = !groups.is_empty() && groups.len() != n;
    (laid, mismatched)
}

/// Writes extracted parameters into the match drafts.
///
/// Per-match diagnostics land on the draft; the returned list holds warnings
/// about the parameter lists as a whole.
pub fn assign_parameters(
    matches: &mut [MatchDraft],
    params: &ParsedParameters,
    default_fid: f64,
) -> Vec<Diagnostic> {
    let n = matches.len();
    let mut warnings = Vec::new();
    if n == 0 {
        return warnings;
    }

    let (confs, conf_mismatch) = lay_scalars(&params.conf, n);
    if conf_mismatch {
        warnings.push(count_mismatch("conf", params.conf.len(), n));
    }
    let (fids, fid_mismatch) = lay_scalars(&params.fid, n);
    if fid_mismatch {
        warnings.push(count_mismatch("fid", params.fid.len(), n));
    }
    let (fses, fse_mismatch) = lay_sides(&params.fse_home, &params.fse_away, &params.fse, n);
    if fse_mismatch {
        warnings.push(Diagnostic::warning(format!(
            "fse side lists do not match {n} matches"
        )));
    }
    let (tyss, tys_mismatch) = lay_sides(&params.tys_home, &params.tys_away, &params.tys, n);
    if tys_mismatch {
        warnings.push(Diagnostic::warning(format!(
            "tys side lists do not match {n} matches"
        )));
    }
    let (odds, odds_mismatch) = lay_odds_groups(&params.odds_groups, matches);
    if odds_mismatch {
        warnings.push(count_mismatch("odds group", params.odds_groups.len(), n));
    }

    for (i, draft) in matches.iter_mut().enumerate() {
        let p = &mut draft.params;
        p.conf = confs[i];
        p.fid = fids[i].map(snap_fid).unwrap_or(default_fid);
        p.mode = params.mode.clone();
        (p.fse_home, p.fse_away) = fses[i];
        (p.tys_home, p.tys_away) = tyss[i];
        p.odds_group = odds[i].clone();

        if draft.entries.is_empty() {
            p.fallback_odds = p.odds_group.first().copied();
        } else {
            for (entry, value) in draft.entries.iter_mut().zip(&odds[i]) {
                entry.odds = Some(*value);
            }
        }

        push_match_diagnostics(draft, i);
    }

    debug!(
        matches = n,
        warnings = warnings.len(),
        "assigned parameters"
    );
    warnings
}

fn count_mismatch(what: &str, count: usize, matches: usize) -> Diagnostic {
    Diagnostic::warning(format!(
        "{count} {what} values for {matches} matches; mapped positionally"
    ))
}

fn push_match_diagnostics(draft: &mut MatchDraft, index: usize) {
    let label = index + 1;
    if !draft.has_team() {
        draft
            .diagnostics
            .push(Diagnostic::error(format!("match {label}: no team recognized")).at_match(index));
    } else if !draft.has_both_teams() {
        let missing = if draft.home.is_none() { "home" } else { "away" };
        draft.diagnostics.push(
            Diagnostic::warning(format!("match {label}: missing {missing} team")).at_match(index),
        );
    }
    if draft.entries.is_empty() {
        draft
            .diagnostics
            .push(Diagnostic::warning(format!("match {label}: no betting entry")).at_match(index));
        if draft.params.fallback_odds.is_none() {
            draft
                .diagnostics
                .push(Diagnostic::warning(format!("match {label}: missing odds")).at_match(index));
        }
    } else {
        let unpriced = draft.entries.iter().filter(|e| e.odds.is_none()).count();
        if unpriced > 0 {
            draft.diagnostics.push(
                Diagnostic::warning(format!(
                    "match {label}: missing odds for {unpriced} of {} entries",
                    draft.entries.len()
                ))
                .at_match(index),
            );
        }
    }
    for diagnostic in draft.diagnostics.iter_mut() {
        if diagnostic.match_index.is_none() {
            diagnostic.match_index = Some(index);
        }
    }
}

/// Heuristic completeness score of a parse in [0, 1].
pub fn draft_confidence(matches: &[MatchDraft], diagnostics: &[Diagnostic]) -> f64 {
    if matches.is_empty() {
        return 0.0;
    }
    let mut score: f64 = 0.3;
    if matches.iter().all(MatchDraft::has_team) {
        score += 0.25;
    }
    if matches.iter().all(|m| !m.entries.is_empty()) {
        score += 0.2;
    }
    if matches.iter().all(MatchDraft::has_both_teams) {
        score += 0.15;
    }
    let warned = diagnostics.iter().any(Diagnostic::is_warning_or_worse)
        || matches
            .iter()
            .flat_map(|m| m.diagnostics.iter())
            .any(Diagnostic::is_warning_or_worse);
    if !warned {
        score += 0.1;
    }
    ((score * 100.0).round() / 100.0).min(1.0)
}
