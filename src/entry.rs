use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::normalize::normalize_key;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultOutcome {
    Win,
    Draw,
    Lose,
}

impl ResultOutcome {
    pub const ALL: [ResultOutcome; 3] = [ResultOutcome::Win, ResultOutcome::Draw, ResultOutcome::Lose];

    pub fn as_str(self) -> &'static str {
        match self {
            ResultOutcome::Win => "win",
            ResultOutcome::Draw => "draw",
            ResultOutcome::Lose => "lose",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketType {
    Score,
    HalfFull,
    Handicap,
    Total,
    Result,
    Other,
}

impl MarketType {
    pub fn as_str(self) -> &'static str {
        match self {
            MarketType::Score => "score",
            MarketType::HalfFull => "half_full",
            MarketType::Handicap => "handicap",
            MarketType::Total => "total",
            MarketType::Result => "result",
            MarketType::Other => "other",
        }
    }

    /// Tie-break rank for `get_primary_entry_market`; lower wins.
    fn rank(self) -> u8 {
        match self {
            MarketType::Result => 0,
            MarketType::Handicap => 1,
            MarketType::Total => 2,
            MarketType::Score => 3,
            MarketType::HalfFull => 4,
            MarketType::Other => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TotalSide {
    Over,
    Under,
}

impl TotalSide {
    pub fn as_str(self) -> &'static str {
        match self {
            TotalSide::Over => "over",
            TotalSide::Under => "under",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryDetail {
    Score { home: u8, away: u8 },
    HalfFull { half: ResultOutcome, full: ResultOutcome },
    Handicap { outcome: ResultOutcome, line: f64 },
    Total { side: TotalSide, line: f64 },
    Result { outcomes: Vec<ResultOutcome> },
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntrySemantic {
    pub text: String,
    pub market_type: MarketType,
    pub semantic_key: String,
    pub detail: EntryDetail,
}

impl EntrySemantic {
    pub fn is_recognized(&self) -> bool {
        self.market_type != MarketType::Other
    }

    pub fn result_outcomes(&self) -> Option<&[ResultOutcome]> {
        match &self.detail {
            EntryDetail::Result { outcomes } if !outcomes.is_empty() => Some(outcomes),
            _ => None,
        }
    }

    /// Whether the entry backs the away side; used to place a lone team.
    pub fn denotes_away_outcome(&self) -> bool {
        match &self.detail {
            EntryDetail::Result { outcomes } => outcomes.as_slice() == [ResultOutcome::Lose],
            EntryDetail::Handicap { outcome, .. } => *outcome == ResultOutcome::Lose,
            EntryDetail::HalfFull { full, .. } => *full == ResultOutcome::Lose,
            EntryDetail::Score { home, away } => away > home,
            EntryDetail::Total { .. } | EntryDetail::Other => false,
        }
    }
}

/// An entry with usable decimal odds; the only input the probability code accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEntryRecord {
    pub id: String,
    pub semantic: EntrySemantic,
    pub odds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stake_weight: Option<f64>,
}

impl NormalizedEntryRecord {
    pub fn new(id: impl Into<String>, semantic: EntrySemantic, odds: f64) -> Option<Self> {
        if !odds.is_finite() || odds <= 1.0 {
            return None;
        }
        Some(Self {
            id: id.into(),
            semantic,
            odds,
            stake_weight: None,
        })
    }

    pub fn from_text(id: impl Into<String>, text: &str, odds: f64) -> Option<Self> {
        Self::new(id, parse_entry_semantic(text), odds)
    }

    pub fn with_stake_weight(mut self, weight: f64) -> Self {
        self.stake_weight = Some(weight);
        self
    }
}

const WIN_TOKENS: &[&str] = &[
    "胜", "主胜", "主赢", "主队胜", "赢", "主", "w", "win", "home", "h", "1",
];
const DRAW_TOKENS: &[&str] = &["平", "平局", "和", "和局", "d", "draw", "x"];
const LOSE_TOKENS: &[&str] = &[
    "负", "主负", "客胜", "客赢", "客队胜", "输", "客", "l", "lose", "loss", "away", "a", "2",
];

const HALF_FULL_TOKENS: &[(&str, ResultOutcome)] = &[
    ("胜", ResultOutcome::Win),
    ("平", ResultOutcome::Draw),
    ("和", ResultOutcome::Draw),
    ("负", ResultOutcome::Lose),
    ("win", ResultOutcome::Win),
    ("draw", ResultOutcome::Draw),
    ("lose", ResultOutcome::Lose),
    ("home", ResultOutcome::Win),
    ("away", ResultOutcome::Lose),
    ("w", ResultOutcome::Win),
    ("d", ResultOutcome::Draw),
    ("l", ResultOutcome::Lose),
    ("h", ResultOutcome::Win),
    ("a", ResultOutcome::Lose),
];

const HALF_FULL_PREFIXES: &[&str] = &["半全场", "半全", "ht/ft", "htft", "hf"];
const HALF_FULL_SEPARATORS: &[&str] = &["->", "=>", "→", ">", "-", "/", "至", " "];

const DOUBLE_CHANCE_PHRASES: &[(&str, &[ResultOutcome])] = &[
    ("1x", &[ResultOutcome::Win, ResultOutcome::Draw]),
    ("x1", &[ResultOutcome::Win, ResultOutcome::Draw]),
    ("x2", &[ResultOutcome::Draw, ResultOutcome::Lose]),
    ("2x", &[ResultOutcome::Draw, ResultOutcome::Lose]),
    ("12", &[ResultOutcome::Win, ResultOutcome::Lose]),
    ("21", &[ResultOutcome::Win, ResultOutcome::Lose]),
    ("不败", &[ResultOutcome::Win, ResultOutcome::Draw]),
    ("主不败", &[ResultOutcome::Win, ResultOutcome::Draw]),
    ("主队不败", &[ResultOutcome::Win, ResultOutcome::Draw]),
    ("不输", &[ResultOutcome::Win, ResultOutcome::Draw]),
    ("客不败", &[ResultOutcome::Draw, ResultOutcome::Lose]),
    ("客队不败", &[ResultOutcome::Draw, ResultOutcome::Lose]),
    ("不平", &[ResultOutcome::Win, ResultOutcome::Lose]),
    ("非平", &[ResultOutcome::Win, ResultOutcome::Lose]),
    ("分胜负", &[ResultOutcome::Win, ResultOutcome::Lose]),
];

/// Joiners for spelled-out alternatives such as "胜/平" or "win or draw".
const ALTERNATIVE_SEPARATORS: &[&str] = &["/", " or ", "或"];

static SCORE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})\s*(?:-|:|比)\s*(\d{1,2})$").expect("score regex"));
static HANDICAP_TOKEN_FIRST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<tok>[^\d\s+\-()]+?)\s*\(?\s*(?P<line>[+-]\d+(?:\.\d+)?|0)\s*\)?$")
        .expect("handicap regex")
});
static HANDICAP_LINE_FIRST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\(?\s*(?P<line>[+-]\d+(?:\.\d+)?)\s*\)?\s*(?P<tok>[^\d\s+\-()]+)$")
        .expect("handicap regex")
});
static TOTAL_SIDE_FIRST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<side>大球|小球|大|小|高于|低于|over|under|o|u)\s*(?P<line>\d+(?:\.\d+)?)$")
        .expect("total regex")
});
static TOTAL_LINE_FIRST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<line>\d+(?:\.\d+)?)\s*(?P<side>大球|小球|大|小|over|under|o|u)$")
        .expect("total regex")
});

/// Classifies one entry string into its market and canonical key.
///
/// Parsers run in a fixed order: score, half/full, handicap, total, result.
/// Double-chance phrases belong to the result market but are checked before
/// half/full so that "胜/平" reads as win-or-draw rather than a half/full pair.
pub fn parse_entry_semantic(raw: &str) -> EntrySemantic {
    let text = normalize_key(raw);

    if let Some(semantic) = parse_score(&text) {
        return semantic;
    }
    if let Some(outcomes) = scan_double_chance(&text) {
        return result_semantic(text, outcomes);
    }
    if let Some(semantic) = parse_half_full(&text) {
        return semantic;
    }
    if let Some(semantic) = parse_handicap(&text) {
        return semantic;
    }
    if let Some(semantic) = parse_total(&text) {
        return semantic;
    }
    if let Some(outcome) = single_outcome_token(&text) {
        return result_semantic(text, vec![outcome]);
    }
    EntrySemantic {
        semantic_key: text.clone(),
        text,
        market_type: MarketType::Other,
        detail: EntryDetail::Other,
    }
}

/// Outcome subset an entry covers: double-chance phrases first, then a single token.
pub fn scan_result_outcomes(raw: &str) -> Option<Vec<ResultOutcome>> {
    let text = normalize_key(raw);
    scan_double_chance(&text).or_else(|| single_outcome_token(&text).map(|o| vec![o]))
}

/// Most frequent market across entries; ties by fixed rank then first seen.
pub fn get_primary_entry_market(entries: &[EntrySemantic]) -> Option<MarketType> {
    let mut tally: Vec<(MarketType, usize, usize)> = Vec::new();
    for (idx, entry) in entries.iter().enumerate() {
        match tally.iter_mut().find(|(m, _, _)| *m == entry.market_type) {
            Some(slot) => slot.1 += 1,
            None => tally.push((entry.market_type, 1, idx)),
        }
    }
    tally
        .into_iter()
        .min_by(|a, b| {
            b.1.cmp(&a.1)
                .then(a.0.rank().cmp(&b.0.rank()))
                .then(a.2.cmp(&b.2))
        })
        .map(|(market, _, _)| market)
}

pub fn format_line(line: f64) -> String {
    if line == 0.0 {
        "0".to_string()
    } else if line > 0.0 {
        format!("+{line}")
    } else {
        format!("{line}")
    }
}

fn result_semantic(text: String, mut outcomes: Vec<ResultOutcome>) -> EntrySemantic {
    outcomes.sort();
    outcomes.dedup();
    let key = outcomes
        .iter()
        .map(|o| o.as_str())
        .collect::<Vec<_>>()
        .join("|");
    EntrySemantic {
        text,
        market_type: MarketType::Result,
        semantic_key: key,
        detail: EntryDetail::Result { outcomes },
    }
}

fn single_outcome_token(text: &str) -> Option<ResultOutcome> {
    if WIN_TOKENS.contains(&text) {
        Some(ResultOutcome::Win)
    } else if DRAW_TOKENS.contains(&text) {
        Some(ResultOutcome::Draw)
    } else if LOSE_TOKENS.contains(&text) {
        Some(ResultOutcome::Lose)
    } else {
        None
    }
}

fn scan_double_chance(text: &str) -> Option<Vec<ResultOutcome>> {
    if let Some((_, outcomes)) = DOUBLE_CHANCE_PHRASES.iter().find(|(p, _)| *p == text) {
        return Some(outcomes.to_vec());
    }
    for sep in ALTERNATIVE_SEPARATORS {
        if !text.contains(*sep) {
            continue;
        }
        let parts: Option<Vec<ResultOutcome>> = text
            .split(*sep)
            .map(|part| single_outcome_token(part.trim()))
            .collect();
        let Some(mut parts) = parts else { continue };
        let count = parts.len();
        parts.sort();
        parts.dedup();
        // A repeated outcome ("胜/胜") is a half/full pair, not an alternative.
        if parts.len() == count && count >= 2 {
            return Some(parts);
        }
    }
    None
}

fn parse_score(text: &str) -> Option<EntrySemantic> {
    let caps = SCORE_RE.captures(text)?;
    let home: u8 = caps[1].parse().ok()?;
    let away: u8 = caps[2].parse().ok()?;
    Some(EntrySemantic {
        text: text.to_string(),
        market_type: MarketType::Score,
        semantic_key: format!("{home}-{away}"),
        detail: EntryDetail::Score { home, away },
    })
}

fn half_full_token(token: &str) -> Option<ResultOutcome> {
    HALF_FULL_TOKENS
        .iter()
        .find(|(t, _)| *t == token)
        .map(|(_, o)| *o)
}

fn parse_half_full(text: &str) -> Option<EntrySemantic> {
    let mut body = text;
    for prefix in HALF_FULL_PREFIXES {
        if let Some(rest) = body.strip_prefix(*prefix) {
            body = rest.trim_start_matches([':', ' ']);
            break;
        }
    }

    let pair = HALF_FULL_SEPARATORS
        .iter()
        .find_map(|sep| {
            let (a, b) = body.split_once(*sep)?;
            Some((half_full_token(a.trim())?, half_full_token(b.trim())?))
        })
        .or_else(|| {
            let chars: Vec<char> = body.chars().collect();
            if chars.len() != 2 {
                return None;
            }
            let a = half_full_token(&chars[0].to_string())?;
            let b = half_full_token(&chars[1].to_string())?;
            Some((a, b))
        })?;

    let (half, full) = pair;
    Some(EntrySemantic {
        text: text.to_string(),
        market_type: MarketType::HalfFull,
        semantic_key: format!("{}-{}", half.as_str(), full.as_str()),
        detail: EntryDetail::HalfFull { half, full },
    })
}

fn parse_handicap(text: &str) -> Option<EntrySemantic> {
    let caps = HANDICAP_TOKEN_FIRST_RE
        .captures(text)
        .or_else(|| HANDICAP_LINE_FIRST_RE.captures(text))?;
    let token = caps.name("tok")?.as_str().trim();
    let token = token
        .strip_prefix("受让")
        .or_else(|| token.strip_prefix("让球"))
        .or_else(|| token.strip_prefix("让"))
        .unwrap_or(token);
    let outcome = single_outcome_token(token)?;
    let line: f64 = caps.name("line")?.as_str().parse().ok()?;
    if !line.is_finite() {
        return None;
    }
    Some(EntrySemantic {
        text: text.to_string(),
        market_type: MarketType::Handicap,
        semantic_key: format!("{}:{}", outcome.as_str(), format_line(line)),
        detail: EntryDetail::Handicap { outcome, line },
    })
}

fn parse_total(text: &str) -> Option<EntrySemantic> {
    let caps = TOTAL_SIDE_FIRST_RE
        .captures(text)
        .or_else(|| TOTAL_LINE_FIRST_RE.captures(text))?;
    let side = match caps.name("side")?.as_str() {
        "大球" | "大" | "高于" | "over" | "o" => TotalSide::Over,
        _ => TotalSide::Under,
    };
    let line: f64 = caps.name("line")?.as_str().parse().ok()?;
    if !line.is_finite() {
        return None;
    }
    Some(EntrySemantic {
        text: text.to_string(),
        market_type: MarketType::Total,
        semantic_key: format!("{}:{line}", side.as_str()),
        detail: EntryDetail::Total { side, line },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_chance_via_slash() {
        let s = parse_entry_semantic("胜/平");
        assert_eq!(s.market_type, MarketType::Result);
        assert_eq!(s.semantic_key, "win|draw");
    }

    #[test]
    fn repeated_outcome_slash_is_half_full() {
        let s = parse_entry_semantic("胜/胜");
        assert_eq!(s.market_type, MarketType::HalfFull);
        assert_eq!(s.semantic_key, "win-win");
    }

    #[test]
    fn concatenated_half_full() {
        let s = parse_entry_semantic("平负");
        assert_eq!(s.market_type, MarketType::HalfFull);
        assert_eq!(
            s.detail,
            EntryDetail::HalfFull {
                half: ResultOutcome::Draw,
                full: ResultOutcome::Lose
            }
        );
        assert_eq!(parse_entry_semantic("半全场 胜-平").semantic_key, "win-draw");
    }

    #[test]
    fn handicap_either_order() {
        assert_eq!(parse_entry_semantic("主-0.5").semantic_key, "win:-0.5");
        assert_eq!(parse_entry_semantic("(+1)客").semantic_key, "lose:+1");
        assert_eq!(parse_entry_semantic("让胜(-1)").semantic_key, "win:-1");
    }

    #[test]
    fn total_either_order() {
        assert_eq!(parse_entry_semantic("Over 2.5").semantic_key, "over:2.5");
        assert_eq!(parse_entry_semantic("3小").semantic_key, "under:3");
    }

    #[test]
    fn unknown_text_is_its_own_key() {
        let s = parse_entry_semantic("角球 Over");
        assert_eq!(s.market_type, MarketType::Other);
        assert_eq!(s.semantic_key, "角球 over");
    }

    #[test]
    fn primary_market_ties_use_rank() {
        let entries = vec![
            parse_entry_semantic("大2.5"),
            parse_entry_semantic("胜"),
            parse_entry_semantic("2-1"),
            parse_entry_semantic("平"),
            parse_entry_semantic("小2.5"),
        ];
        assert_eq!(get_primary_entry_market(&entries), Some(MarketType::Result));
        assert_eq!(get_primary_entry_market(&[]), None);
    }

    #[test]
    fn scan_result_outcomes_prefers_phrases() {
        assert_eq!(
            scan_result_outcomes("X2"),
            Some(vec![ResultOutcome::Draw, ResultOutcome::Lose])
        );
        assert_eq!(scan_result_outcomes("客胜"), Some(vec![ResultOutcome::Lose]));
        assert_eq!(scan_result_outcomes("2-1"), None);
    }

    #[test]
    fn entry_record_rejects_bad_odds() {
        assert!(NormalizedEntryRecord::from_text("a", "胜", 1.0).is_none());
        assert!(NormalizedEntryRecord::from_text("a", "胜", f64::NAN).is_none());
        assert!(NormalizedEntryRecord::from_text("a", "胜", 1.9).is_some());
    }
}
