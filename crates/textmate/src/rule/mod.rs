//! Compiled grammar rules.
//!
//! Raw rules are compiled once per grammar into a [`RuleRegistry`] addressed by
//! [`RuleId`]. Ids are assigned from 1 upwards in compilation order and never
//! reused within one grammar.

mod factory;
mod scanner;

use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, LazyLock, OnceLock};

use rustc_hash::FxHashSet;

pub(crate) use self::factory::RuleFactory;
pub use self::scanner::{CaptureSpan, CaptureSpans, RegexSource};
pub(crate) use self::scanner::{ScanEntry, ScanMatch, ScanTarget, find_next_match};
use crate::error::{Result, TextMateError};

static CAPTURE_REFERENCE: LazyLock<::regex::Regex> = LazyLock::new(|| {
	::regex::Regex::new(r"\$(\d+)|\$\{(\d+):/(downcase|upcase)\}").expect("capture reference pattern is valid")
});

/// Stable handle of a compiled rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RuleId(pub(crate) u32);

impl RuleId {
	pub fn get(self) -> u32 {
		self.0
	}

	fn idx(self) -> Option<usize> {
		(self.0 as usize).checked_sub(1)
	}
}

impl fmt::Display for RuleId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

/// A `name`/`contentName` value, possibly referencing capture groups through
/// `$1` or `${1:/downcase}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeTemplate {
	source: String,
	has_captures: bool,
}

impl ScopeTemplate {
	pub fn new(source: &str) -> Self {
		Self {
			source: source.to_owned(),
			has_captures: CAPTURE_REFERENCE.is_match(source),
		}
	}

	pub fn source(&self) -> &str {
		&self.source
	}

	/// Substitutes capture references with the captured text of `line`.
	///
	/// Leading dots of captured text are dropped. A reference to a group that
	/// did not participate expands to nothing; a reference past the last group
	/// is kept verbatim.
	pub fn resolve<'a>(&'a self, line: &str, captures: &[Option<CaptureSpan>]) -> Cow<'a, str> {
		if !self.has_captures {
			return Cow::Borrowed(&self.source);
		}

		CAPTURE_REFERENCE.replace_all(&self.source, |caps: &::regex::Captures<'_>| {
			let index = caps
				.get(1)
				.or_else(|| caps.get(2))
				.and_then(|m| m.as_str().parse::<usize>().ok());
			let Some(span) = index.and_then(|i| captures.get(i)) else {
				return caps[0].to_owned();
			};
			let text = span.map_or("", |s| &line[s.start..s.end]).trim_start_matches('.');
			match caps.get(3).map(|m| m.as_str()) {
				Some("downcase") => text.to_lowercase(),
				Some("upcase") => text.to_uppercase(),
				_ => text.to_owned(),
			}
		})
	}
}

/// Scope assignment for one capture group.
#[derive(Debug, Clone)]
pub struct CaptureRule {
	pub name: Option<ScopeTemplate>,
	pub content_name: Option<ScopeTemplate>,
	/// Rule used to tokenize the captured text again, for captures with
	/// nested `patterns`.
	pub retokenize: Option<RuleId>,
}

/// Capture rules indexed by group number.
pub type CaptureRules = Box<[Option<CaptureRule>]>;

/// Sub-pattern list of a rule.
#[derive(Debug, Clone, Default)]
pub struct Patterns {
	pub ids: Vec<RuleId>,
	/// Some raw patterns resolved to nothing (missing include targets).
	pub has_missing: bool,
}

#[derive(Debug)]
pub enum RuleKind {
	Match {
		regex: Arc<RegexSource>,
		captures: CaptureRules,
	},
	/// A pattern list without a pattern of its own (`include` or `patterns`).
	IncludeOnly { patterns: Patterns },
	BeginEnd {
		begin: Arc<RegexSource>,
		begin_captures: CaptureRules,
		end: Arc<RegexSource>,
		end_captures: CaptureRules,
		apply_end_pattern_last: bool,
		patterns: Patterns,
	},
	BeginWhile {
		begin: Arc<RegexSource>,
		begin_captures: CaptureRules,
		condition: Arc<RegexSource>,
		while_captures: CaptureRules,
		patterns: Patterns,
	},
}

#[derive(Debug)]
pub struct Rule {
	id: RuleId,
	name: Option<ScopeTemplate>,
	content_name: Option<ScopeTemplate>,
	kind: RuleKind,
	scan: OnceLock<Box<[ScanEntry]>>,
}

impl Rule {
	pub(crate) fn new(id: RuleId, name: Option<ScopeTemplate>, content_name: Option<ScopeTemplate>, kind: RuleKind) -> Self {
		Self {
			id,
			name,
			content_name,
			kind,
			scan: OnceLock::new(),
		}
	}

	pub fn id(&self) -> RuleId {
		self.id
	}

	pub fn kind(&self) -> &RuleKind {
		&self.kind
	}

	/// The unresolved `name`, as written in the grammar.
	pub fn name_source(&self) -> Option<&str> {
		self.name.as_ref().map(ScopeTemplate::source)
	}

	pub fn resolve_name<'a>(&'a self, line: &str, captures: &[Option<CaptureSpan>]) -> Option<Cow<'a, str>> {
		self.name.as_ref().map(|t| t.resolve(line, captures))
	}

	pub fn resolve_content_name<'a>(&'a self, line: &str, captures: &[Option<CaptureSpan>]) -> Option<Cow<'a, str>> {
		self.content_name.as_ref().map(|t| t.resolve(line, captures))
	}

	pub fn patterns(&self) -> Option<&Patterns> {
		match &self.kind {
			RuleKind::Match { .. } => None,
			RuleKind::IncludeOnly { patterns }
			| RuleKind::BeginEnd { patterns, .. }
			| RuleKind::BeginWhile { patterns, .. } => Some(patterns),
		}
	}

	/// Capture rules of a match rule.
	pub fn captures(&self) -> &[Option<CaptureRule>] {
		match &self.kind {
			RuleKind::Match { captures, .. } => captures,
			_ => &[],
		}
	}

	pub fn end_captures(&self) -> &[Option<CaptureRule>] {
		match &self.kind {
			RuleKind::BeginEnd { end_captures, .. } => end_captures,
			_ => &[],
		}
	}
}

/// Owns every compiled rule of one grammar, including rules compiled from
/// external grammars it includes.
#[derive(Debug, Default)]
pub struct RuleRegistry {
	rules: Vec<Option<Rule>>,
}

impl RuleRegistry {
	pub(crate) fn from_slots(rules: Vec<Option<Rule>>) -> Self {
		Self { rules }
	}

	pub fn len(&self) -> usize {
		self.rules.len()
	}

	pub fn is_empty(&self) -> bool {
		self.rules.is_empty()
	}

	pub fn get(&self, id: RuleId) -> Result<&Rule> {
		id.idx()
			.and_then(|idx| self.rules.get(idx))
			.and_then(Option::as_ref)
			.ok_or(TextMateError::UnknownRule { id, len: self.rules.len() })
	}

	/// Patterns searched while `id` is the active rule, in priority order.
	///
	/// Include-only rules are flattened into the begin/match patterns they
	/// reach. For begin/end rules the end pattern comes first, or last with
	/// `applyEndPatternLast`.
	pub(crate) fn scan_entries(&self, id: RuleId) -> Result<&[ScanEntry]> {
		let rule = self.get(id)?;
		if let Some(entries) = rule.scan.get() {
			return Ok(entries);
		}

		let mut entries = Vec::new();
		let mut visited = FxHashSet::default();
		match &rule.kind {
			RuleKind::Match { regex, .. } => entries.push(ScanEntry::new(regex, ScanTarget::Rule(id))),
			RuleKind::IncludeOnly { .. } => self.collect_patterns(id, &mut entries, &mut visited)?,
			RuleKind::BeginEnd {
				end,
				apply_end_pattern_last,
				patterns,
				..
			} => {
				for &pattern in &patterns.ids {
					self.collect_patterns(pattern, &mut entries, &mut visited)?;
				}
				let end = ScanEntry::new(end, ScanTarget::End);
				if *apply_end_pattern_last {
					entries.push(end);
				} else {
					entries.insert(0, end);
				}
			}
			RuleKind::BeginWhile { patterns, .. } => {
				for &pattern in &patterns.ids {
					self.collect_patterns(pattern, &mut entries, &mut visited)?;
				}
			}
		}

		Ok(rule.scan.get_or_init(|| entries.into_boxed_slice()))
	}

	fn collect_patterns(&self, id: RuleId, out: &mut Vec<ScanEntry>, visited: &mut FxHashSet<RuleId>) -> Result<()> {
		match &self.get(id)?.kind {
			RuleKind::Match { regex, .. } => out.push(ScanEntry::new(regex, ScanTarget::Rule(id))),
			RuleKind::BeginEnd { begin, .. } | RuleKind::BeginWhile { begin, .. } => {
				out.push(ScanEntry::new(begin, ScanTarget::Rule(id)));
			}
			RuleKind::IncludeOnly { patterns } => {
				if visited.insert(id) {
					for &pattern in &patterns.ids {
						self.collect_patterns(pattern, out, visited)?;
					}
				}
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests;
