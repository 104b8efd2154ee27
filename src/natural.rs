use std::sync::Arc;

use tracing::debug;

use crate::assign::{assign_parameters, draft_confidence};
use crate::config::{DEFAULT_FID, EngineConfig};
use crate::model::{Diagnostic, ParseOutcome};
use crate::normalize::normalize_text;
use crate::params::extract_parameters;
use crate::segment::{extract_segments, segment_matches};
use crate::team_alias::{
    AliasCache, AliasDictionary, JsonTeamDirectory, StaticTeamDirectory, TeamDirectory,
    scan_team_names,
};

/// Parses free-form slip text against an alias dictionary.
///
/// Never fails: anything that cannot be read ends up in `diagnostics`.
pub fn parse_natural_input(text: &str, dictionary: &AliasDictionary) -> ParseOutcome {
    parse_natural_input_with(text, dictionary, DEFAULT_FID)
}

pub fn parse_natural_input_with(
    text: &str,
    dictionary: &AliasDictionary,
    default_fid: f64,
) -> ParseOutcome {
    let normalized = normalize_text(text);
    let extraction = extract_parameters(&normalized);
    let mut diagnostics = extraction.warnings;

    let hits = scan_team_names(&extraction.residual, dictionary);
    if hits.is_empty() {
        diagnostics.push(Diagnostic::error("no team name recognized"));
        debug!(chars = normalized.chars().count(), "no team hits");
        return ParseOutcome {
            normalized,
            residual: extraction.residual,
            params: extraction.params,
            matches: Vec::new(),
            diagnostics,
            confidence: 0.0,
        };
    }

    let segments = extract_segments(&extraction.residual, &hits);
    let mut matches = segment_matches(&segments, default_fid);
    diagnostics.extend(assign_parameters(
        &mut matches,
        &extraction.params,
        default_fid,
    ));
    let confidence = draft_confidence(&matches, &diagnostics);

    debug!(
        hits = hits.len(),
        segments = segments.len(),
        matches = matches.len(),
        confidence,
        "parsed slip text"
    );
    ParseOutcome {
        normalized,
        residual: extraction.residual,
        params: extraction.params,
        matches,
        diagnostics,
        confidence,
    }
}

/// Parser bound to a team directory, with a cached alias dictionary.
pub struct SlipParser {
    config: EngineConfig,
    cache: AliasCache,
    directory: Box<dyn TeamDirectory + Send + Sync>,
}

impl SlipParser {
    pub fn new(config: EngineConfig, directory: Box<dyn TeamDirectory + Send + Sync>) -> Self {
        let cache = AliasCache::new(config.alias_ttl).with_curated(config.curated_teams);
        Self {
            config,
            cache,
            directory,
        }
    }

    /// Uses the JSON directory named in the config, or curated teams only.
    pub fn from_config(config: EngineConfig) -> Self {
        let directory: Box<dyn TeamDirectory + Send + Sync> = match &config.team_directory {
            Some(path) => Box::new(JsonTeamDirectory::new(path.clone())),
            None => Box::new(StaticTeamDirectory::default()),
        };
        Self::new(config, directory)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn dictionary(&self) -> Arc<AliasDictionary> {
        self.cache.dictionary(self.directory.as_ref())
    }

    /// Forces the next parse to rebuild aliases from the directory.
    pub fn refresh_aliases(&self) {
        self.cache.invalidate();
    }

    pub fn parse(&self, text: &str) -> ParseOutcome {
        let dictionary = self.dictionary();
        parse_natural_input_with(text, &dictionary, self.config.default_fid)
    }
}

impl Default for SlipParser {
    fn default() -> Self {
        Self::from_config(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DiagnosticLevel;
    use crate::team_alias::{TeamDirectoryEntry, curated_profiles};

    fn curated() -> AliasDictionary {
        AliasDictionary::from_sources(&curated_profiles(), &[])
    }

    #[test]
    fn no_teams_is_an_error_outcome() {
        let outcome = parse_natural_input("胜 odds 1.8", &curated());
        assert!(outcome.matches.is_empty());
        assert_eq!(outcome.confidence, 0.0);
        let errors: Vec<_> = outcome
            .diagnostics
            .iter()
            .filter(|d| d.level == DiagnosticLevel::Error)
            .collect();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn two_matches_with_positional_odds() {
        let outcome = parse_natural_input("曼联胜切尔西 阿森纳 vs 利物浦 平 odds 1.9 3.3", &curated());
        assert_eq!(outcome.matches.len(), 2);
        assert_eq!(outcome.matches[0].entries[0].odds, Some(1.9));
        assert_eq!(outcome.matches[1].entries[0].odds, Some(3.3));
        assert_eq!(outcome.matches[1].entries[0].semantic.semantic_key, "draw");
    }

    #[test]
    fn directory_teams_are_recognized() {
        let directory = StaticTeamDirectory::new(vec![TeamDirectoryEntry {
            team_id: "u:1".to_string(),
            team_name: "深圳新鹏城".to_string(),
            abbreviations: vec!["新鹏城".to_string()],
        }]);
        let parser = SlipParser::new(EngineConfig::default(), Box::new(directory));
        let outcome = parser.parse("新鹏城胜曼城 @2.4");
        assert_eq!(outcome.matches.len(), 1);
        let home = outcome.matches[0].home.as_ref().map(|t| t.team_id.as_str());
        assert_eq!(home, Some("u:1"));
        assert_eq!(outcome.matches[0].entries[0].odds, Some(2.4));
    }
}
