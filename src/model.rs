use serde::{Deserialize, Serialize};

use crate::entry::EntrySemantic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_index: Option<usize>,
}

impl Diagnostic {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Info,
            message: message.into(),
            match_index: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Warning,
            message: message.into(),
            match_index: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Error,
            message: message.into(),
            match_index: None,
        }
    }

    pub fn at_match(mut self, index: usize) -> Self {
        self.match_index = Some(index);
        self
    }

    pub fn is_warning_or_worse(&self) -> bool {
        self.level != DiagnosticLevel::Info
    }
}

/// A team mention resolved against the alias dictionary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRef {
    pub team_id: String,
    pub team_name: String,
    /// Alias text exactly as it appeared in the input.
    pub alias: String,
}

/// Tempo code carried per side: short/medium/long/high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TysLevel {
    S,
    M,
    L,
    H,
}

impl TysLevel {
    pub fn from_char(ch: char) -> Option<Self> {
        match ch.to_ascii_uppercase() {
            'S' => Some(Self::S),
            'M' => Some(Self::M),
            'L' => Some(Self::L),
            'H' => Some(Self::H),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::S => "S",
            Self::M => "M",
            Self::L => "L",
            Self::H => "H",
        }
    }
}

/// Everything the extractor pulled out of the text before team scanning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedParameters {
    pub conf: Vec<f64>,
    pub odds: Vec<f64>,
    /// One group per odds keyword occurrence, in text order.
    pub odds_groups: Vec<Vec<f64>>,
    pub fse_home: Vec<f64>,
    pub fse_away: Vec<f64>,
    pub fse: Vec<f64>,
    pub tys_home: Vec<TysLevel>,
    pub tys_away: Vec<TysLevel>,
    pub tys: Vec<TysLevel>,
    pub fid: Vec<f64>,
    pub mode: Option<String>,
    pub remark: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchParams {
    pub conf: Option<f64>,
    /// Odds used when the match has no entry to attach them to.
    pub fallback_odds: Option<f64>,
    pub odds_group: Vec<f64>,
    pub mode: Option<String>,
    pub fid: f64,
    pub fse_home: Option<f64>,
    pub fse_away: Option<f64>,
    pub tys_home: Option<TysLevel>,
    pub tys_away: Option<TysLevel>,
}

impl MatchParams {
    pub fn with_default_fid(fid: f64) -> Self {
        Self {
            conf: None,
            fallback_odds: None,
            odds_group: Vec::new(),
            mode: None,
            fid,
            fse_home: None,
            fse_away: None,
            tys_home: None,
            tys_away: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftEntry {
    pub text: String,
    pub semantic: EntrySemantic,
    pub odds: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchDraft {
    pub home: Option<TeamRef>,
    pub away: Option<TeamRef>,
    pub entries: Vec<DraftEntry>,
    pub params: MatchParams,
    /// Gap text the entries were read from, joined with spaces.
    pub raw_entry_text: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl MatchDraft {
    pub fn new(home: Option<TeamRef>, away: Option<TeamRef>, default_fid: f64) -> Self {
        Self {
            home,
            away,
            entries: Vec::new(),
            params: MatchParams::with_default_fid(default_fid),
            raw_entry_text: String::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn has_team(&self) -> bool {
        self.home.is_some() || self.away.is_some()
    }

    pub fn has_both_teams(&self) -> bool {
        self.home.is_some() && self.away.is_some()
    }

    pub fn push_raw_text(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if !self.raw_entry_text.is_empty() {
            self.raw_entry_text.push(' ');
        }
        self.raw_entry_text.push_str(text);
    }
}

/// Result of a full natural-language parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseOutcome {
    pub normalized: String,
    pub residual: String,
    pub params: ParsedParameters,
    pub matches: Vec<MatchDraft>,
    pub diagnostics: Vec<Diagnostic>,
    pub confidence: f64,
}
