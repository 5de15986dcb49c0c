//! Raw grammar schema as delivered by grammar loaders.
//!
//! These types mirror the TextMate JSON layout closely so any serde format can
//! populate them. Rules are shared through `Arc` because the compiler caches
//! compiled rules by the identity of their raw definition.

use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Deserializer};

/// Named rules addressable through `#name` includes.
pub type RawRepository = FxHashMap<String, Arc<RawRule>>;

/// Capture index (as a decimal string) to capture rule.
pub type RawCaptures = FxHashMap<String, Arc<RawRule>>;

pub(crate) const SELF_RULE: &str = "$self";
pub(crate) const BASE_RULE: &str = "$base";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawRule {
	pub include: Option<String>,
	pub name: Option<String>,
	pub content_name: Option<String>,
	#[serde(rename = "match")]
	pub match_: Option<String>,
	pub begin: Option<String>,
	pub end: Option<String>,
	#[serde(rename = "while")]
	pub while_: Option<String>,
	pub captures: Option<RawCaptures>,
	pub begin_captures: Option<RawCaptures>,
	pub end_captures: Option<RawCaptures>,
	pub while_captures: Option<RawCaptures>,
	pub patterns: Option<Vec<Arc<RawRule>>>,
	pub repository: Option<RawRepository>,
	#[serde(deserialize_with = "bool_or_int")]
	pub apply_end_pattern_last: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawGrammar {
	pub scope_name: String,
	/// Display name, e.g. `"JavaScript"`.
	pub name: Option<String>,
	pub patterns: Vec<Arc<RawRule>>,
	pub repository: RawRepository,
	/// Selector to rule, kept in declaration order.
	pub injections: IndexMap<String, Arc<RawRule>>,
	/// Set on grammars that are themselves injected into other grammars.
	pub injection_selector: Option<String>,
	pub file_types: Vec<String>,
	pub first_line_match: Option<String>,
}

impl RawGrammar {
	/// Copies the whole rule tree.
	///
	/// Rules shared by several parents in `self` are shared the same way in
	/// the copy, but nothing is shared between the copy and `self`.
	pub fn deep_clone(&self) -> Self {
		let mut cloner = Cloner::default();
		Self {
			scope_name: self.scope_name.clone(),
			name: self.name.clone(),
			patterns: cloner.rules(&self.patterns),
			repository: cloner.map(&self.repository),
			injections: self
				.injections
				.iter()
				.map(|(selector, rule)| (selector.clone(), cloner.rule(rule)))
				.collect(),
			injection_selector: self.injection_selector.clone(),
			file_types: self.file_types.clone(),
			first_line_match: self.first_line_match.clone(),
		}
	}

	/// The grammar viewed as an include-only rule, used when the whole grammar
	/// is injected into another one.
	pub(crate) fn to_raw_rule(&self) -> Arc<RawRule> {
		Arc::new(RawRule {
			patterns: Some(self.patterns.clone()),
			repository: Some(self.repository.clone()),
			..Default::default()
		})
	}
}

/// Clones `raw` and wires `$self` and `$base` into the copy's repository.
///
/// `$self` wraps the top-level patterns under the grammar's scope name; `$base`
/// points at `base` when the grammar is included from another one, otherwise
/// at `$self`.
pub(crate) fn init_grammar(raw: &RawGrammar, base: Option<&Arc<RawRule>>) -> RawGrammar {
	let mut grammar = raw.deep_clone();
	let self_rule = Arc::new(RawRule {
		name: Some(grammar.scope_name.clone()),
		patterns: Some(grammar.patterns.clone()),
		..Default::default()
	});
	let base = base.map_or_else(|| Arc::clone(&self_rule), Arc::clone);
	grammar.repository.insert(SELF_RULE.to_owned(), self_rule);
	grammar.repository.insert(BASE_RULE.to_owned(), base);
	grammar
}

#[derive(Default)]
struct Cloner {
	seen: FxHashMap<*const RawRule, Arc<RawRule>>,
}

impl Cloner {
	fn rule(&mut self, rule: &Arc<RawRule>) -> Arc<RawRule> {
		let key = Arc::as_ptr(rule);
		if let Some(done) = self.seen.get(&key) {
			return Arc::clone(done);
		}

		let cloned = Arc::new(RawRule {
			include: rule.include.clone(),
			name: rule.name.clone(),
			content_name: rule.content_name.clone(),
			match_: rule.match_.clone(),
			begin: rule.begin.clone(),
			end: rule.end.clone(),
			while_: rule.while_.clone(),
			captures: rule.captures.as_ref().map(|c| self.map(c)),
			begin_captures: rule.begin_captures.as_ref().map(|c| self.map(c)),
			end_captures: rule.end_captures.as_ref().map(|c| self.map(c)),
			while_captures: rule.while_captures.as_ref().map(|c| self.map(c)),
			patterns: rule.patterns.as_ref().map(|p| self.rules(p)),
			repository: rule.repository.as_ref().map(|r| self.map(r)),
			apply_end_pattern_last: rule.apply_end_pattern_last,
		});
		self.seen.insert(key, Arc::clone(&cloned));
		cloned
	}

	fn rules(&mut self, rules: &[Arc<RawRule>]) -> Vec<Arc<RawRule>> {
		rules.iter().map(|r| self.rule(r)).collect()
	}

	fn map(&mut self, map: &FxHashMap<String, Arc<RawRule>>) -> FxHashMap<String, Arc<RawRule>> {
		map.iter().map(|(k, v)| (k.clone(), self.rule(v))).collect()
	}
}

fn bool_or_int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Flag {
		Bool(bool),
		Int(i64),
	}

	Ok(match Flag::deserialize(deserializer)? {
		Flag::Bool(b) => b,
		Flag::Int(n) => n != 0,
	})
}
