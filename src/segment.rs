use serde::{Deserialize, Serialize};

use crate::entry::{EntrySemantic, parse_entry_semantic};
use crate::model::{Diagnostic, DraftEntry, MatchDraft, TeamRef};
use crate::team_alias::TeamHit;

const VERSUS_MARKERS: &[&str] = &["vs", "v", "对阵", "对", "×"];
const EDGE_PUNCTUATION: &[char] = &[',', ';', ':', '|', '.', '(', ')', '"', '\''];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Segment {
    Team(TeamHit),
    Gap(String),
}

/// Entries read out of the text between (or around) team mentions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GapParse {
    pub raw: String,
    pub entries: Vec<DraftEntry>,
    pub versus: bool,
    pub unparsed: Vec<String>,
}

impl GapParse {
    pub fn has_entries(&self) -> bool {
        !self.entries.is_empty()
    }

    fn merge(mut self, other: GapParse) -> GapParse {
        if !other.raw.is_empty() {
            if !self.raw.is_empty() {
                self.raw.push(' ');
            }
            self.raw.push_str(&other.raw);
        }
        self.entries.extend(other.entries);
        self.versus |= other.versus;
        self.unparsed.extend(other.unparsed);
        self
    }
}

/// Splits residual text into team and gap segments; blank gaps are dropped.
pub fn extract_segments(text: &str, hits: &[TeamHit]) -> Vec<Segment> {
    let mut segments = Vec::with_capacity(hits.len() * 2 + 1);
    let mut cursor = 0usize;
    for hit in hits {
        if hit.start < cursor || hit.end > text.len() {
            continue;
        }
        push_gap(&mut segments, &text[cursor..hit.start]);
        segments.push(Segment::Team(hit.clone()));
        cursor = hit.end;
    }
    push_gap(&mut segments, &text[cursor..]);
    segments
}

fn push_gap(segments: &mut Vec<Segment>, gap: &str) {
    let gap = gap.trim();
    if !gap.is_empty() {
        segments.push(Segment::Gap(gap.to_string()));
    }
}

fn is_versus_marker(token: &str) -> bool {
    let lower = token.to_lowercase();
    VERSUS_MARKERS.contains(&lower.as_str())
}

fn draft_entry(semantic: EntrySemantic) -> DraftEntry {
    DraftEntry {
        text: semantic.text.clone(),
        semantic,
        odds: None,
    }
}

/// Reads betting entries out of one gap.
///
/// Versus markers are dropped and flagged. The remaining text is tried whole,
/// then per "/" slice, then per whitespace token inside a slice. Tokens that do
/// not classify are kept in `unparsed`.
pub fn parse_gap_entries(gap: &str) -> GapParse {
    let mut out = GapParse {
        raw: gap.trim().to_string(),
        ..GapParse::default()
    };

    let kept: Vec<&str> = gap
        .split_whitespace()
        .filter(|token| {
            let versus = is_versus_marker(token.trim_matches(EDGE_PUNCTUATION));
            out.versus |= versus;
            !versus
        })
        .collect();
    let body = kept.join(" ");
    let body = body.trim_matches(|c: char| EDGE_PUNCTUATION.contains(&c) || c.is_whitespace());
    if body.is_empty() {
        return out;
    }

    let whole = parse_entry_semantic(body);
    if whole.is_recognized() {
        out.entries.push(draft_entry(whole));
        return out;
    }

    for slice in body.split('/') {
        let slice = slice.trim_matches(|c: char| EDGE_PUNCTUATION.contains(&c) || c.is_whitespace());
        if slice.is_empty() {
            continue;
        }
        let semantic = parse_entry_semantic(slice);
        if semantic.is_recognized() {
            out.entries.push(draft_entry(semantic));
            continue;
        }
        for token in slice.split_whitespace() {
            let token = token.trim_matches(EDGE_PUNCTUATION);
            if token.is_empty() {
                continue;
            }
            let semantic = parse_entry_semantic(token);
            if semantic.is_recognized() {
                out.entries.push(draft_entry(semantic));
            } else {
                out.unparsed.push(token.to_string());
            }
        }
    }
    out
}

/// Groups segments into match drafts, left to right.
pub fn segment_matches(segments: &[Segment], default_fid: f64) -> Vec<MatchDraft> {
    let mut drafts: Vec<MatchDraft> = Vec::new();
    let mut leading: Option<GapParse> = None;
    let mut i = 0usize;

    while i < segments.len() {
        let team = match &segments[i] {
            Segment::Gap(text) => {
                let parsed = parse_gap_entries(text);
                leading = Some(match leading.take() {
                    Some(prev) => prev.merge(parsed),
                    None => parsed,
                });
                i += 1;
                continue;
            }
            Segment::Team(hit) => hit.team.clone(),
        };

        let mut parts: Vec<GapParse> = leading.take().into_iter().collect();
        match (segments.get(i + 1), segments.get(i + 2)) {
            (Some(Segment::Team(away)), _) => {
                i += 2;
                i += absorb_trailing(segments, i, &mut parts);
                drafts.push(build_draft(
                    Some(team),
                    Some(away.team.clone()),
                    parts,
                    default_fid,
                ));
            }
            (Some(Segment::Gap(gap)), Some(Segment::Team(away))) => {
                let parsed = parse_gap_entries(gap);
                if parsed.has_entries() || parsed.versus {
                    parts.push(parsed);
                    i += 3;
                    i += absorb_trailing(segments, i, &mut parts);
                    drafts.push(build_draft(
                        Some(team),
                        Some(away.team.clone()),
                        parts,
                        default_fid,
                    ));
                } else {
                    parts.push(parsed);
                    i += 2;
                    drafts.push(lone_team_draft(team, parts, default_fid));
                }
            }
            (Some(Segment::Gap(gap)), _) => {
                parts.push(parse_gap_entries(gap));
                i += 2;
                drafts.push(lone_team_draft(team, parts, default_fid));
            }
            (None, _) => {
                i += 1;
                drafts.push(lone_team_draft(team, parts, default_fid));
            }
        }
    }

    if let Some(left) = leading {
        if let Some(last) = drafts.last_mut() {
            append_part(last, left);
        }
    }
    drafts
}

fn absorb_trailing(segments: &[Segment], i: usize, parts: &mut Vec<GapParse>) -> usize {
    let Some(Segment::Gap(gap)) = segments.get(i) else {
        return 0;
    };
    let parsed = parse_gap_entries(gap);
    if !parsed.has_entries() {
        return 0;
    }
    parts.push(parsed);
    1
}

/// A single team is placed away when its first entry backs the away side,
/// whatever market that entry belongs to.
fn lone_team_draft(team: TeamRef, parts: Vec<GapParse>, default_fid: f64) -> MatchDraft {
    let away_side = parts
        .iter()
        .flat_map(|p| p.entries.iter())
        .next()
        .is_some_and(|e| e.semantic.denotes_away_outcome());
    if away_side {
        build_draft(None, Some(team), parts, default_fid)
    } else {
        build_draft(Some(team), None, parts, default_fid)
    }
}

fn build_draft(
    home: Option<TeamRef>,
    away: Option<TeamRef>,
    parts: Vec<GapParse>,
    default_fid: f64,
) -> MatchDraft {
    let mut draft = MatchDraft::new(home, away, default_fid);
    for part in parts {
        append_part(&mut draft, part);
    }
    draft
}

fn append_part(draft: &mut MatchDraft, part: GapParse) {
    draft.push_raw_text(&part.raw);
    draft.entries.extend(part.entries);
    for token in part.unparsed {
        draft
            .diagnostics
            .push(Diagnostic::warning(format!("unrecognized entry token \"{token}\"")));
    }
}
