use thiserror::Error;

use crate::rule::RuleId;

/// Errors surfaced by grammar compilation and tokenization.
///
/// Data problems (bad patterns, missing external grammars) never show up
/// here; they degrade the affected rules instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TextMateError {
	/// The registry has no grammar for the requested scope name.
	#[error("grammar not found: {0}")]
	GrammarNotFound(String),

	/// A rule id was dereferenced that the compiler never handed out.
	#[error("unknown rule id {id} (registry holds {len} rules)")]
	UnknownRule { id: RuleId, len: usize },
}

pub type Result<T, E = TextMateError> = std::result::Result<T, E>;
