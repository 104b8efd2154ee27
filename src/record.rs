use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::atomic::{DecomposeOptions, MatchProfile, decompose_match};
use crate::entry::{NormalizedEntryRecord, parse_entry_semantic};
use crate::model::{MatchDraft, ParseOutcome, TysLevel};
use crate::portfolio::{PortfolioProfile, combine_atomic_match_profiles};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryRecord {
    pub text: String,
    #[serde(default)]
    pub odds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stake: Option<f64>,
}

/// Stored shape of one match on a slip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    #[serde(default)]
    pub home_team: Option<String>,
    #[serde(default)]
    pub away_team: Option<String>,
    #[serde(default)]
    pub entries: Vec<EntryRecord>,
    /// Match-level odds when no entry carries its own.
    #[serde(default)]
    pub odds: Option<f64>,
    #[serde(default)]
    pub conf: Option<f64>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub tys_home: Option<TysLevel>,
    #[serde(default)]
    pub tys_away: Option<TysLevel>,
    #[serde(default)]
    pub fid: Option<f64>,
    #[serde(default)]
    pub fse_home: Option<f64>,
    #[serde(default)]
    pub fse_away: Option<f64>,
}

impl MatchRecord {
    pub fn from_draft(draft: &MatchDraft) -> Self {
        let p = &draft.params;
        let entries = draft
            .entries
            .iter()
            .map(|e| EntryRecord {
                text: e.text.clone(),
                odds: e.odds,
                stake: None,
            })
            .collect();
        Self {
            home_team: draft.home.as_ref().map(|t| t.team_name.clone()),
            away_team: draft.away.as_ref().map(|t| t.team_name.clone()),
            entries,
            odds: p
                .fallback_odds
                .or_else(|| draft.entries.first().and_then(|e| e.odds)),
            conf: p.conf,
            mode: p.mode.clone(),
            tys_home: p.tys_home,
            tys_away: p.tys_away,
            fid: Some(p.fid),
            fse_home: p.fse_home,
            fse_away: p.fse_away,
        }
    }

    /// Entries with usable odds. A lone unpriced entry borrows the match odds.
    pub fn entry_records(&self) -> Vec<NormalizedEntryRecord> {
        let lone = self.entries.len() == 1;
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(idx, entry)| {
                let odds = entry.odds.or(if lone { self.odds } else { None })?;
                let semantic = parse_entry_semantic(&entry.text);
                let record = NormalizedEntryRecord::new((idx + 1).to_string(), semantic, odds)?;
                Some(match entry.stake {
                    Some(stake) => record.with_stake_weight(stake),
                    None => record,
                })
            })
            .collect()
    }

    pub fn profile(&self) -> MatchProfile {
        decompose_match(&self.entry_records(), &DecomposeOptions::default())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvestmentRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub matches: Vec<MatchRecord>,
}

impl InvestmentRecord {
    pub fn from_outcome(outcome: &ParseOutcome) -> Self {
        Self {
            id: None,
            mode: outcome.params.mode.clone(),
            matches: outcome.matches.iter().map(MatchRecord::from_draft).collect(),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("invalid investment record json")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read investment record {}", path.display()))?;
        Self::from_json(&raw)
    }

    pub fn profiles(&self) -> Vec<MatchProfile> {
        self.matches.iter().map(MatchRecord::profile).collect()
    }

    /// Joint distribution across every match on the slip.
    pub fn portfolio(&self) -> PortfolioProfile {
        combine_atomic_match_profiles(&self.profiles())
    }
}
