use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::TeamRef;
use crate::normalize::{lower_char, normalize_key, normalize_text};

pub const DEFAULT_ALIAS_TTL: Duration = Duration::from_secs(30);

/// Outcome shorthand that must never be read as a team name.
const RESERVED_OUTCOME_TOKENS: &[&str] = &[
    "w", "d", "l", "h", "a", "x", "1", "2", "win", "draw", "lose", "loss", "home", "away", "胜",
    "平", "负", "主", "客", "和", "赢", "输", "主胜", "客胜", "平局", "vs", "v", "对", "对阵",
];

const SHORT_LATIN_ALIAS_MAX: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamProfile {
    pub id: String,
    pub name: String,
    /// Alias texts, unique by normalized form.
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub sample_count: u32,
    #[serde(default)]
    pub avg_rating: f64,
}

impl TeamProfile {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            aliases: Vec::new(),
            sample_count: 0,
            avg_rating: 0.0,
        }
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for alias in aliases {
            self.add_alias(alias.as_ref());
        }
        self
    }

    /// Returns false when the alias is blank or already known under the same normalized form.
    pub fn add_alias(&mut self, alias: &str) -> bool {
        let text = normalize_text(alias);
        if text.is_empty() {
            return false;
        }
        let key = normalize_key(&text);
        if key == normalize_key(&self.name) || self.aliases.iter().any(|a| normalize_key(a) == key) {
            return false;
        }
        self.aliases.push(text);
        true
    }

    /// Running mean update for a newly rated sample.
    pub fn record_sample(&mut self, rating: f64) {
        if !rating.is_finite() {
            return;
        }
        let n = self.sample_count as f64;
        self.avg_rating = (self.avg_rating * n + rating) / (n + 1.0);
        self.sample_count += 1;
    }

    pub fn from_directory_entry(entry: &TeamDirectoryEntry) -> Self {
        TeamProfile::new(entry.team_id.clone(), entry.team_name.clone())
            .with_aliases(entry.abbreviations.iter())
    }
}

/// Row shape returned by a team-directory provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamDirectoryEntry {
    #[serde(alias = "teamId")]
    pub team_id: String,
    #[serde(alias = "teamName")]
    pub team_name: String,
    #[serde(default)]
    pub abbreviations: Vec<String>,
}

pub trait TeamDirectory {
    fn snapshot(&self) -> Vec<TeamDirectoryEntry>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticTeamDirectory {
    entries: Vec<TeamDirectoryEntry>,
}

impl StaticTeamDirectory {
    pub fn new(entries: Vec<TeamDirectoryEntry>) -> Self {
        Self { entries }
    }
}

impl TeamDirectory for StaticTeamDirectory {
    fn snapshot(&self) -> Vec<TeamDirectoryEntry> {
        self.entries.clone()
    }
}

/// Re-reads a JSON array of directory rows on every snapshot.
#[derive(Debug, Clone)]
pub struct JsonTeamDirectory {
    path: PathBuf,
}

impl JsonTeamDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TeamDirectory for JsonTeamDirectory {
    fn snapshot(&self) -> Vec<TeamDirectoryEntry> {
        match load_team_directory(&self.path) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), "team directory unavailable: {err:#}");
                Vec::new()
            }
        }
    }
}

pub fn load_team_directory(path: &Path) -> Result<Vec<TeamDirectoryEntry>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read team directory {}", path.display()))?;
    serde_json::from_str::<Vec<TeamDirectoryEntry>>(&raw).context("invalid team directory json")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasEntry {
    pub alias: String,
    pub normalized: String,
    pub len: usize,
    pub team_id: String,
    pub team_name: String,
}

impl AliasEntry {
    fn needs_boundary(&self) -> bool {
        let key = self.normalized.as_str();
        let all_alpha = key.chars().all(|c| c.is_ascii_alphabetic());
        if all_alpha && self.len <= SHORT_LATIN_ALIAS_MAX {
            return true;
        }
        key.contains(' ')
            && key
                .chars()
                .all(|c| c.is_ascii_alphabetic() || c == ' ' || c == '.' || c == '-')
    }
}

/// Longest-first alias list; ties keep source order so curated names win.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasDictionary {
    entries: Vec<AliasEntry>,
}

impl AliasDictionary {
    pub fn from_sources(curated: &[TeamProfile], user: &[TeamProfile]) -> Self {
        let all: Vec<TeamProfile> = curated.iter().chain(user.iter()).cloned().collect();
        build_alias_dictionary(&all)
    }

    pub fn entries(&self) -> &[AliasEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lookup(&self, alias: &str) -> Option<&AliasEntry> {
        let key = normalize_key(alias);
        self.entries.iter().find(|e| e.normalized == key)
    }
}

pub fn build_alias_dictionary(profiles: &[TeamProfile]) -> AliasDictionary {
    let mut seen: HashSet<String> = HashSet::new();
    let mut entries = Vec::new();
    for profile in profiles {
        let names = std::iter::once(&profile.name).chain(profile.aliases.iter());
        for alias in names {
            let alias = normalize_text(alias);
            let normalized = normalize_key(&alias);
            if normalized.is_empty() || !seen.insert(normalized.clone()) {
                continue;
            }
            entries.push(AliasEntry {
                alias,
                len: normalized.chars().count(),
                normalized,
                team_id: profile.id.clone(),
                team_name: profile.name.clone(),
            });
        }
    }
    // Stable: equal lengths keep first-seen order.
    entries.sort_by(|a, b| b.len.cmp(&a.len));
    AliasDictionary { entries }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamHit {
    pub team: TeamRef,
    /// Byte span within the scanned text.
    pub start: usize,
    pub end: usize,
}

pub fn is_reserved_outcome_token(key: &str) -> bool {
    RESERVED_OUTCOME_TOKENS.contains(&key)
}

/// Greedy leftmost-longest scan. Hits never overlap.
pub fn scan_team_names(text: &str, dict: &AliasDictionary) -> Vec<TeamHit> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let lowered: Vec<char> = chars.iter().map(|(_, c)| lower_char(*c)).collect();

    let mut hits = Vec::new();
    let mut cursor = 0usize;
    while cursor < lowered.len() {
        let Some(entry) = match_at(&lowered, cursor, dict) else {
            cursor += 1;
            continue;
        };
        let start = chars[cursor].0;
        let end = chars
            .get(cursor + entry.len)
            .map(|(idx, _)| *idx)
            .unwrap_or(text.len());
        hits.push(TeamHit {
            team: TeamRef {
                team_id: entry.team_id.clone(),
                team_name: entry.team_name.clone(),
                alias: text[start..end].to_string(),
            },
            start,
            end,
        });
        cursor += entry.len;
    }
    hits
}

fn match_at<'a>(lowered: &[char], pos: usize, dict: &'a AliasDictionary) -> Option<&'a AliasEntry> {
    dict.entries.iter().find(|entry| {
        let n = entry.len;
        if n == 0
            || pos + n > lowered.len()
            || !entry.normalized.chars().eq(lowered[pos..pos + n].iter().copied())
        {
            return false;
        }
        if is_reserved_outcome_token(&entry.normalized) {
            return false;
        }
        !entry.needs_boundary() || has_word_boundaries(lowered, pos, n)
    })
}

fn has_word_boundaries(lowered: &[char], pos: usize, len: usize) -> bool {
    let before_ok = pos == 0 || !lowered[pos - 1].is_ascii_alphanumeric();
    let after_ok = lowered
        .get(pos + len)
        .is_none_or(|c| !c.is_ascii_alphanumeric());
    before_ok && after_ok
}

struct CachedDictionary {
    built_at: Instant,
    dictionary: Arc<AliasDictionary>,
}

/// Time-bounded alias dictionary; rebuilt from the directory once the TTL lapses.
pub struct AliasCache {
    ttl: Duration,
    include_curated: bool,
    slot: Mutex<Option<CachedDictionary>>,
}

impl AliasCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            include_curated: true,
            slot: Mutex::new(None),
        }
    }

    pub fn with_curated(mut self, include: bool) -> Self {
        self.include_curated = include;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn dictionary(&self, directory: &dyn TeamDirectory) -> Arc<AliasDictionary> {
        self.dictionary_at(Instant::now(), directory)
    }

    pub fn dictionary_at(&self, now: Instant, directory: &dyn TeamDirectory) -> Arc<AliasDictionary> {
        let mut guard = match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(cached) = guard.as_ref() {
            if now.saturating_duration_since(cached.built_at) < self.ttl {
                return Arc::clone(&cached.dictionary);
            }
        }

        let user: Vec<TeamProfile> = directory
            .snapshot()
            .iter()
            .map(TeamProfile::from_directory_entry)
            .collect();
        let curated = if self.include_curated {
            curated_profiles()
        } else {
            Vec::new()
        };
        let dictionary = Arc::new(AliasDictionary::from_sources(&curated, &user));
        tracing::debug!(
            aliases = dictionary.len(),
            user_teams = user.len(),
            "alias dictionary rebuilt"
        );
        *guard = Some(CachedDictionary {
            built_at: now,
            dictionary: Arc::clone(&dictionary),
        });
        dictionary
    }

    pub fn last_built(&self) -> Option<Instant> {
        match self.slot.lock() {
            Ok(guard) => guard.as_ref().map(|c| c.built_at),
            Err(poisoned) => poisoned.into_inner().as_ref().map(|c| c.built_at),
        }
    }

    pub fn invalidate(&self) {
        match self.slot.lock() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }
}

impl Default for AliasCache {
    fn default() -> Self {
        Self::new(DEFAULT_ALIAS_TTL)
    }
}

const CURATED_TEAMS: &[(&str, &str, &[&str])] = &[
    ("man-utd", "曼联", &["Manchester United", "Man Utd", "Man United", "MUN", "曼彻斯特联"]),
    ("man-city", "曼城", &["Manchester City", "Man City", "MCI", "曼彻斯特城"]),
    ("chelsea", "切尔西", &["Chelsea", "CHE", "车子"]),
    ("arsenal", "阿森纳", &["Arsenal", "ARS", "枪手"]),
    ("liverpool", "利物浦", &["Liverpool", "LIV", "红军"]),
    ("tottenham", "热刺", &["Tottenham", "Spurs", "TOT", "托特纳姆热刺"]),
    ("newcastle", "纽卡斯尔", &["Newcastle", "NEW", "纽卡", "纽卡斯尔联"]),
    ("aston-villa", "阿斯顿维拉", &["Aston Villa", "AVL", "维拉"]),
    ("brighton", "布莱顿", &["Brighton", "BHA"]),
    ("west-ham", "西汉姆", &["West Ham", "WHU", "西汉姆联"]),
    ("wolves", "狼队", &["Wolves", "WOL", "伍尔弗汉普顿"]),
    ("everton", "埃弗顿", &["Everton", "EVE"]),
    ("fulham", "富勒姆", &["Fulham", "FUL"]),
    ("crystal-palace", "水晶宫", &["Crystal Palace", "CRY"]),
    ("brentford", "布伦特福德", &["Brentford", "BRE"]),
    ("nottingham-forest", "诺丁汉森林", &["Nottingham Forest", "NFO", "森林"]),
    ("bournemouth", "伯恩茅斯", &["Bournemouth", "BOU"]),
    ("real-madrid", "皇家马德里", &["Real Madrid", "皇马", "RMA"]),
    ("barcelona", "巴塞罗那", &["Barcelona", "Barca", "巴萨", "BAR"]),
    ("atletico-madrid", "马德里竞技", &["Atletico Madrid", "马竞", "ATM"]),
    ("bayern", "拜仁慕尼黑", &["Bayern Munich", "Bayern", "拜仁", "FCB"]),
    ("dortmund", "多特蒙德", &["Borussia Dortmund", "Dortmund", "多特", "BVB"]),
    ("inter", "国际米兰", &["Inter Milan", "Inter", "国米"]),
    ("ac-milan", "AC米兰", &["AC Milan", "米兰"]),
    ("juventus", "尤文图斯", &["Juventus", "尤文", "JUV"]),
    ("psg", "巴黎圣日耳曼", &["Paris Saint-Germain", "PSG", "巴黎"]),
];

/// Built-in library consulted before any user-submitted profile.
pub fn curated_profiles() -> Vec<TeamProfile> {
    CURATED_TEAMS
        .iter()
        .map(|(id, name, aliases)| {
            TeamProfile::new(format!("curated:{id}"), *name).with_aliases(aliases.iter())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict() -> AliasDictionary {
        AliasDictionary::from_sources(&curated_profiles(), &[])
    }

    #[test]
    fn dictionary_is_sorted_longest_first() {
        let d = dict();
        let lens: Vec<usize> = d.entries().iter().map(|e| e.len).collect();
        assert!(lens.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn curated_alias_wins_over_user_duplicate() {
        let user = vec![TeamProfile::new("user:1", "Red Devils").with_aliases(["曼联"])];
        let d = AliasDictionary::from_sources(&curated_profiles(), &user);
        assert_eq!(d.lookup("曼联").map(|e| e.team_id.as_str()), Some("curated:man-utd"));
        assert_eq!(d.lookup("red devils").map(|e| e.team_id.as_str()), Some("user:1"));
    }

    #[test]
    fn dictionary_still_scans_after_json_round_trip() {
        let json = serde_json::to_string(&dict()).expect("dictionary serializes");
        let back: AliasDictionary = serde_json::from_str(&json).expect("dictionary parses");
        assert_eq!(back, dict());
        let hits = scan_team_names("曼联vs切尔西", &back);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[1].team.team_name, "切尔西");
    }

    #[test]
    fn longest_alias_takes_priority() {
        let hits = scan_team_names("国际米兰胜", &dict());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].team.team_id, "curated:inter");
    }

    #[test]
    fn short_latin_alias_needs_boundaries() {
        let d = dict();
        assert!(scan_team_names("CHECK", &d).is_empty());
        let hits = scan_team_names("CHE vs ARS", &d);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].team.alias, "CHE");
    }

    #[test]
    fn multi_word_alias_matches_case_insensitively() {
        let hits = scan_team_names("man utd 胜", &dict());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].team.team_id, "curated:man-utd");
        assert_eq!(hits[0].team.alias, "man utd");
    }

    #[test]
    fn reserved_tokens_are_never_teams() {
        let user = vec![TeamProfile::new("user:x", "Draw FC").with_aliases(["平", "D"])];
        let d = AliasDictionary::from_sources(&[], &user);
        assert!(scan_team_names("平", &d).is_empty());
        assert!(scan_team_names("d", &d).is_empty());
    }

    #[test]
    fn record_sample_tracks_running_mean() {
        let mut team = TeamProfile::new("t", "T");
        team.record_sample(6.0);
        team.record_sample(8.0);
        assert_eq!(team.sample_count, 2);
        assert!((team.avg_rating - 7.0).abs() < 1e-12);
    }

    #[test]
    fn add_alias_dedups_by_normalized_form() {
        let mut team = TeamProfile::new("t", "Chelsea");
        assert!(!team.add_alias("CHELSEA"));
        assert!(team.add_alias("Blues"));
        assert!(!team.add_alias(" blues "));
        assert_eq!(team.aliases, vec!["Blues".to_string()]);
    }
}
