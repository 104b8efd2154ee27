use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::{Diagnostic, ParsedParameters, TysLevel};
use crate::normalize::normalize_text;

pub const FID_LADDER: [f64; 6] = [0.0, 0.25, 0.4, 0.5, 0.6, 0.75];

const MODE_VOCABULARY: &[&str] = &[
    "自由过关", "8串1", "7串1", "6串1", "5串1", "4串1", "3串1", "2串1", "串关", "单关",
];

const MODE_ALIASES: &[(&str, &str)] = &[
    ("混合过关", "串关"),
    ("parlay", "串关"),
    ("single", "单关"),
    ("combo", "串关"),
    ("过关", "串关"),
    ("单场", "单关"),
    ("单选", "单关"),
];

static REMARK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:remark|备注|note)\s*[:=]?\s*").expect("remark regex"));

static MODE_VOCAB_RES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    MODE_VOCABULARY
        .iter()
        .map(|phrase| (phrase_regex(phrase), *phrase))
        .collect()
});

static MODE_ALIAS_RES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    let mut aliases: Vec<&(&str, &str)> = MODE_ALIASES.iter().collect();
    aliases.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()));
    aliases
        .into_iter()
        .map(|(alias, mode)| (phrase_regex(alias), *mode))
        .collect()
});

static FSE_SIDE_RE: Lazy<Regex> = Lazy::new(|| side_keyword_regex("fse"));
static TYS_SIDE_RE: Lazy<Regex> = Lazy::new(|| side_keyword_regex("tys"));
static FSE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)fse").expect("fse regex"));
static TYS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)tys").expect("tys regex"));
static CONF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)confidence|conf|置信度|置信|信心|把握").expect("conf regex")
});
static ODDS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)odds|赔率").expect("odds regex"));
static ODDS_AT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"@").expect("odds @ regex"));
static ODDS_TIMES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"倍").expect("odds 倍 regex"));
static FID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)fid").expect("fid regex"));

fn phrase_regex(phrase: &str) -> Regex {
    let escaped = regex::escape(phrase);
    let pattern = if phrase.chars().all(|c| c.is_ascii_alphabetic()) {
        format!(r"(?i)\b{escaped}\b")
    } else {
        format!("(?i){escaped}")
    };
    Regex::new(&pattern).expect("mode phrase regex")
}

fn side_keyword_regex(keyword: &str) -> Regex {
    let pattern = format!(
        r"(?i)(?:(?P<pre>home|away|主队|客队|主|客)\s*[_-]?\s*{keyword}|{keyword}\s*(?:[_-]\s*(?P<post1>home|away|h|a)|(?P<post2>home|away|主队|客队|主|客)))"
    );
    Regex::new(&pattern).expect("side keyword regex")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamExtraction {
    pub params: ParsedParameters,
    pub warnings: Vec<Diagnostic>,
    /// Input with every matched parameter span removed.
    pub residual: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Home,
    Away,
}

#[derive(Debug, Clone, Copy)]
struct KeywordRule<'a> {
    re: &'a Regex,
    value_after: bool,
    value_before: bool,
    space_list: bool,
}

#[derive(Debug, Clone)]
struct Occurrence {
    start: usize,
    end: usize,
    values: Vec<f64>,
}

pub fn extract_parameters(normalized: &str) -> ParamExtraction {
    let mut text = normalized.to_string();
    let mut params = ParsedParameters::default();
    let mut warnings = Vec::new();

    params.remark = extract_remark(&mut text);
    params.mode = extract_mode(&mut text);

    let (home, away) = extract_sided_numbers(&mut text, &FSE_SIDE_RE);
    params.fse_home = home.into_iter().map(scale_fraction).collect();
    params.fse_away = away.into_iter().map(scale_fraction).collect();
    params.fse = extract_keyword_groups(
        &mut text,
        &[KeywordRule {
            re: &FSE_RE,
            value_after: true,
            value_before: false,
            space_list: true,
        }],
    )
    .into_iter()
    .flatten()
    .map(scale_fraction)
    .collect();

    let (home, away) = extract_sided_codes(&mut text, &TYS_SIDE_RE);
    params.tys_home = home;
    params.tys_away = away;
    params.tys = extract_global_codes(&mut text, &TYS_RE);

    let conf_raw = extract_keyword_groups(
        &mut text,
        &[KeywordRule {
            re: &CONF_RE,
            value_after: true,
            value_before: true,
            space_list: false,
        }],
    );
    for raw in conf_raw.into_iter().flatten() {
        let (value, warning) = normalize_confidence(raw);
        if let Some(value) = value {
            params.conf.push(value);
        }
        warnings.extend(warning);
    }

    let odds_groups = extract_keyword_groups(
        &mut text,
        &[
            KeywordRule {
                re: &ODDS_RE,
                value_after: true,
                value_before: true,
                space_list: true,
            },
            KeywordRule {
                re: &ODDS_AT_RE,
                value_after: true,
                value_before: false,
                space_list: true,
            },
            KeywordRule {
                re: &ODDS_TIMES_RE,
                value_after: false,
                value_before: true,
                space_list: false,
            },
        ],
    );
    for group in odds_groups {
        let valid: Vec<f64> = group.into_iter().filter(|v| is_valid_odds(*v)).collect();
        if valid.is_empty() {
            continue;
        }
        params.odds.extend(valid.iter().copied());
        params.odds_groups.push(valid);
    }

    params.fid = extract_keyword_groups(
        &mut text,
        &[KeywordRule {
            re: &FID_RE,
            value_after: true,
            value_before: true,
            space_list: false,
        }],
    )
    .into_iter()
    .flatten()
    .map(snap_fid)
    .collect();

    tracing::debug!(
        conf = params.conf.len(),
        odds_groups = params.odds_groups.len(),
        mode = ?params.mode,
        "parameters extracted"
    );

    ParamExtraction {
        params,
        warnings,
        residual: normalize_text(&text),
    }
}

pub fn is_valid_odds(value: f64) -> bool {
    value.is_finite() && value > 1.0
}

/// Percent-scales fractional inputs: 0.9 becomes 90.
fn scale_fraction(value: f64) -> f64 {
    if value.abs() <= 1.0 { value * 100.0 } else { value }
}

/// Maps a raw confidence number onto the 0-100 percent scale.
///
/// Values between 1 and 10 are ambiguous shorthand ("3.5" meaning 35%) and are
/// multiplied by ten with a warning; a real 3.5% input is misread this way.
pub fn normalize_confidence(raw: f64) -> (Option<f64>, Option<Diagnostic>) {
    if !raw.is_finite() || raw < 0.0 {
        return (None, None);
    }
    if raw <= 1.0 {
        return (Some(raw * 100.0), None);
    }
    if raw < 10.0 {
        let value = raw * 10.0;
        return (
            Some(value),
            Some(Diagnostic::warning(format!(
                "confidence {raw} read as {value}%"
            ))),
        );
    }
    if raw <= 100.0 {
        return (Some(raw), None);
    }
    (
        None,
        Some(Diagnostic::warning(format!("confidence {raw} out of range, ignored"))),
    )
}

pub fn snap_fid(raw: f64) -> f64 {
    let mut best = FID_LADDER[0];
    let mut best_dist = f64::INFINITY;
    for step in FID_LADDER {
        let dist = (raw - step).abs();
        if dist < best_dist {
            best = step;
            best_dist = dist;
        }
    }
    best
}

fn extract_remark(text: &mut String) -> Option<String> {
    let (start, end) = REMARK_RE.find(text).map(|m| (m.start(), m.end()))?;
    let remark = text[end..].trim().to_string();
    text.truncate(start);
    if remark.is_empty() { None } else { Some(remark) }
}

fn extract_mode(text: &mut String) -> Option<String> {
    for (re, mode) in MODE_VOCAB_RES.iter().chain(MODE_ALIAS_RES.iter()) {
        if let Some(m) = re.find(text) {
            let span = (m.start(), m.end());
            delete_spans(text, vec![span]);
            return Some((*mode).to_string());
        }
    }
    None
}

fn side_of(caps: &regex::Captures<'_>) -> Option<Side> {
    let label = caps
        .name("pre")
        .or_else(|| caps.name("post1"))
        .or_else(|| caps.name("post2"))?
        .as_str()
        .to_ascii_lowercase();
    match label.as_str() {
        "home" | "h" | "主" | "主队" => Some(Side::Home),
        "away" | "a" | "客" | "客队" => Some(Side::Away),
        _ => None,
    }
}

fn extract_sided_numbers(text: &mut String, re: &Regex) -> (Vec<f64>, Vec<f64>) {
    let mut home = Vec::new();
    let mut away = Vec::new();
    let mut spans = Vec::new();
    for caps in re.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let Some(side) = side_of(&caps) else { continue };
        let mut end = whole.end();
        if let Some((values, value_end)) = scan_number_list(text, end, true) {
            end = value_end;
            match side {
                Side::Home => home.extend(values),
                Side::Away => away.extend(values),
            }
        }
        spans.push((whole.start(), end));
    }
    delete_spans(text, spans);
    (home, away)
}

fn extract_sided_codes(text: &mut String, re: &Regex) -> (Vec<TysLevel>, Vec<TysLevel>) {
    let mut home = Vec::new();
    let mut away = Vec::new();
    let mut spans = Vec::new();
    for caps in re.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let Some(side) = side_of(&caps) else { continue };
        let mut end = whole.end();
        if let Some((codes, code_end)) = scan_code_list(text, end) {
            end = code_end;
            match side {
                Side::Home => home.extend(codes),
                Side::Away => away.extend(codes),
            }
        }
        spans.push((whole.start(), end));
    }
    delete_spans(text, spans);
    (home, away)
}

fn extract_global_codes(text: &mut String, re: &Regex) -> Vec<TysLevel> {
    let mut codes = Vec::new();
    let mut spans = Vec::new();
    for m in re.find_iter(text) {
        let mut end = m.end();
        if let Some((found, code_end)) = scan_code_list(text, end) {
            end = code_end;
            codes.extend(found);
        }
        spans.push((m.start(), end));
    }
    delete_spans(text, spans);
    codes
}

/// One group per keyword occurrence, ordered by position in the text.
fn extract_keyword_groups(text: &mut String, rules: &[KeywordRule<'_>]) -> Vec<Vec<f64>> {
    let mut found: Vec<Occurrence> = Vec::new();
    for rule in rules {
        for m in rule.re.find_iter(text) {
            let after = if rule.value_after {
                scan_number_list(text, m.end(), rule.space_list)
            } else {
                None
            };
            if let Some((values, end)) = after {
                found.push(Occurrence {
                    start: m.start(),
                    end,
                    values,
                });
                continue;
            }
            let before = if rule.value_before {
                scan_number_before(text, m.start())
            } else {
                None
            };
            match before {
                Some((value, start)) => found.push(Occurrence {
                    start,
                    end: m.end(),
                    values: vec![value],
                }),
                None => found.push(Occurrence {
                    start: m.start(),
                    end: m.end(),
                    values: Vec::new(),
                }),
            }
        }
    }

    found.sort_by_key(|o| o.start);
    let mut kept: Vec<Occurrence> = Vec::new();
    for occ in found {
        if let Some(prev) = kept.last_mut() {
            if occ.start < prev.end {
                // Overlapping occurrence: its values are dropped, its span still goes.
                prev.end = prev.end.max(occ.end);
                continue;
            }
        }
        kept.push(occ);
    }

    delete_spans(text, kept.iter().map(|o| (o.start, o.end)).collect());
    kept.into_iter()
        .map(|o| o.values)
        .filter(|values| !values.is_empty())
        .collect()
}

fn delete_spans(text: &mut String, mut spans: Vec<(usize, usize)>) {
    spans.sort_by(|a, b| b.0.cmp(&a.0));
    for (start, end) in spans {
        if start < end && end <= text.len() {
            text.replace_range(start..end, " ");
        }
    }
}

fn skip_spaces(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && bytes[pos] == b' ' {
        pos += 1;
    }
    pos
}

/// Parses one number starting exactly at `pos`; rejects numbers glued to `-`, `:` or more digits.
fn parse_number_at(text: &str, pos: usize) -> Option<(f64, usize)> {
    let bytes = text.as_bytes();
    let mut i = pos;
    if i < bytes.len() && (bytes[i] == b'-' || bytes[i] == b'+') {
        i += 1;
    }
    let digits_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i + 1 < bytes.len() && bytes[i] == b'.' && bytes[i + 1].is_ascii_digit() {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i == digits_start {
        return None;
    }
    if let Some(&next) = bytes.get(i) {
        let dot_then_digit = next == b'.' && bytes.get(i + 1).is_some_and(|b| b.is_ascii_digit());
        if next == b'-' || next == b':' || dot_then_digit {
            return None;
        }
    }
    let value = text[pos..i].parse::<f64>().ok()?;
    value.is_finite().then_some((value, i))
}

/// Numbers after a keyword: optional `:`/`=`, then values joined by `/`, `,` or (optionally) spaces.
fn scan_number_list(text: &str, start: usize, space_list: bool) -> Option<(Vec<f64>, usize)> {
    let bytes = text.as_bytes();
    let mut pos = skip_spaces(bytes, start);
    if pos < bytes.len() && (bytes[pos] == b':' || bytes[pos] == b'=') {
        pos = skip_spaces(bytes, pos + 1);
    }
    let (first, mut end) = parse_number_at(text, pos)?;
    let mut values = vec![first];
    if bytes.get(end) == Some(&b'%') {
        end += 1;
    }

    loop {
        let after_space = skip_spaces(bytes, end);
        let (next_pos, explicit_sep) = match bytes.get(after_space) {
            Some(b'/') | Some(b',') => (skip_spaces(bytes, after_space + 1), true),
            _ => (after_space, false),
        };
        if !explicit_sep && (!space_list || after_space == end) {
            break;
        }
        match parse_number_at(text, next_pos) {
            Some((value, value_end)) => {
                values.push(value);
                end = value_end;
                if bytes.get(end) == Some(&b'%') {
                    end += 1;
                }
            }
            None => break,
        }
    }
    Some((values, end))
}

/// A bare number ending right before a keyword, e.g. "35%信心".
fn scan_number_before(text: &str, keyword_start: usize) -> Option<(f64, usize)> {
    let bytes = text.as_bytes();
    let mut i = keyword_start;
    while i > 0 && bytes[i - 1] == b' ' {
        i -= 1;
    }
    if i > 0 && bytes[i - 1] == b'%' {
        i -= 1;
    }
    let end = i;
    while i > 0 && (bytes[i - 1].is_ascii_digit() || bytes[i - 1] == b'.') {
        i -= 1;
    }
    let start = i;
    if start == end || bytes[start] == b'.' {
        return None;
    }
    if start > 0 {
        let prev = bytes[start - 1];
        if prev.is_ascii_alphanumeric() || prev == b'-' || prev == b'+' || prev == b':' {
            return None;
        }
    }
    let value = text[start..end].parse::<f64>().ok()?;
    value.is_finite().then_some((value, start))
}

/// Runs of S/M/L/H letters after a keyword, e.g. "tys S/M" or "tysSM".
fn scan_code_list(text: &str, start: usize) -> Option<(Vec<TysLevel>, usize)> {
    let bytes = text.as_bytes();
    let mut pos = skip_spaces(bytes, start);
    if pos < bytes.len() && (bytes[pos] == b':' || bytes[pos] == b'=') {
        pos = skip_spaces(bytes, pos + 1);
    }
    let mut codes = Vec::new();
    let mut end = start;
    loop {
        let run_end = (pos..bytes.len())
            .find(|&i| !bytes[i].is_ascii_alphabetic())
            .unwrap_or(bytes.len());
        if run_end == pos {
            break;
        }
        let run: Option<Vec<TysLevel>> = text[pos..run_end]
            .chars()
            .map(TysLevel::from_char)
            .collect();
        let Some(run) = run else { break };
        codes.extend(run);
        end = run_end;

        let after_space = skip_spaces(bytes, end);
        pos = match bytes.get(after_space) {
            Some(b'/') | Some(b',') => skip_spaces(bytes, after_space + 1),
            _ => after_space,
        };
        if pos == end {
            break;
        }
    }
    if codes.is_empty() { None } else { Some((codes, end)) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_bands() {
        assert_eq!(normalize_confidence(0.6).0, Some(60.0));
        assert_eq!(normalize_confidence(45.0).0, Some(45.0));
        let (value, warning) = normalize_confidence(3.5);
        assert_eq!(value, Some(35.0));
        assert!(warning.is_some());
        assert_eq!(normalize_confidence(250.0).0, None);
    }

    #[test]
    fn fid_snaps_to_ladder() {
        assert_eq!(snap_fid(0.42), 0.4);
        assert_eq!(snap_fid(0.7), 0.75);
        assert_eq!(snap_fid(0.1), 0.0);
        assert_eq!(snap_fid(0.3), 0.25);
    }

    #[test]
    fn keyword_before_and_after_value() {
        let out = extract_parameters("曼联胜 conf 60 切尔西 0.7 fid");
        assert_eq!(out.params.conf, vec![60.0]);
        assert_eq!(out.params.fid, vec![0.75]);
        assert_eq!(out.residual, "曼联胜 切尔西");
    }

    #[test]
    fn value_before_keyword_needs_clean_boundary() {
        let out = extract_parameters("曼联胜 odds2.1 conf");
        assert!(out.params.conf.is_empty());
        assert_eq!(out.params.odds_groups, vec![vec![2.1]]);
    }

    #[test]
    fn odds_groups_follow_keyword_occurrences() {
        let out = extract_parameters("曼联胜 @1.8 切尔西负 odds 2.1/3.4 阿森纳平 8.1倍");
        assert_eq!(
            out.params.odds_groups,
            vec![vec![1.8], vec![2.1, 3.4], vec![8.1]]
        );
        assert_eq!(out.params.odds, vec![1.8, 2.1, 3.4, 8.1]);
    }

    #[test]
    fn overlapping_odds_suffix_is_removed_too() {
        let out = extract_parameters("曼联胜 赔率8.1倍");
        assert_eq!(out.params.odds_groups, vec![vec![8.1]]);
        assert_eq!(out.residual, "曼联胜");
    }

    #[test]
    fn number_lists_stop_before_scores() {
        let out = extract_parameters("fse0.9 2-1");
        assert_eq!(out.params.fse, vec![90.0]);
        assert_eq!(out.residual, "2-1");
    }

    #[test]
    fn sided_fse_and_tys() {
        let out = extract_parameters("主fse0.8 fse_a 0.6 tys_home S 客tys L tys M/H");
        assert_eq!(out.params.fse_home, vec![80.0]);
        assert_eq!(out.params.fse_away, vec![60.0]);
        assert_eq!(out.params.tys_home, vec![TysLevel::S]);
        assert_eq!(out.params.tys_away, vec![TysLevel::L]);
        assert_eq!(out.params.tys, vec![TysLevel::M, TysLevel::H]);
        assert_eq!(out.residual, "");
    }

    #[test]
    fn remark_takes_the_rest_of_the_text() {
        let out = extract_parameters("曼联胜 odds1.9 备注: 主力回归 conf 80");
        assert_eq!(out.params.remark.as_deref(), Some("主力回归 conf 80"));
        assert!(out.params.conf.is_empty());
        assert_eq!(out.residual, "曼联胜");
    }

    #[test]
    fn mode_vocabulary_precedes_aliases() {
        let out = extract_parameters("2串1 parlay 曼联胜");
        assert_eq!(out.params.mode.as_deref(), Some("2串1"));
        let out = extract_parameters("曼联胜 Parlay");
        assert_eq!(out.params.mode.as_deref(), Some("串关"));
        assert_eq!(out.residual, "曼联胜");
    }

    #[test]
    fn odds_must_exceed_one() {
        let out = extract_parameters("曼联胜 odds0.8");
        assert!(out.params.odds.is_empty());
        assert!(out.params.odds_groups.is_empty());
    }
}
