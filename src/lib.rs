pub mod assign;
pub mod atomic;
pub mod config;
pub mod entry;
pub mod kelly;
pub mod model;
pub mod natural;
pub mod normalize;
pub mod params;
pub mod portfolio;
pub mod record;
pub mod segment;
pub mod team_alias;

pub use atomic::{DecomposeOptions, MatchProfile, OutcomeState, ProfileStats, decompose_match};
pub use config::EngineConfig;
pub use entry::{EntrySemantic, MarketType, NormalizedEntryRecord, parse_entry_semantic};
pub use kelly::{KellyState, StakePlan, kelly_for_portfolio, solve_kelly_fraction};
pub use model::{Diagnostic, DiagnosticLevel, MatchDraft, ParseOutcome};
pub use natural::{SlipParser, parse_natural_input};
pub use portfolio::{PortfolioProfile, combine_atomic_match_profiles};
pub use record::{InvestmentRecord, MatchRecord};
pub use team_alias::{AliasCache, AliasDictionary, TeamDirectory};
