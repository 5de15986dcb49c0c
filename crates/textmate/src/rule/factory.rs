use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::debug;

use super::{CaptureRule, CaptureRules, Patterns, RegexSource, Rule, RuleId, RuleKind, RuleRegistry, ScopeTemplate};
use crate::raw::{BASE_RULE, RawCaptures, RawGrammar, RawRepository, RawRule, SELF_RULE, init_grammar};
use crate::registry::GrammarRepository;

/// End pattern of a begin rule that declares none. Never matches.
const MISSING_END: &str = "\u{FFFF}";

/// Target of an `include` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IncludeReference<'a> {
	Base,
	This,
	/// `#name`: entry of the current repository.
	Relative(&'a str),
	/// `source.other` or `source.other#name`.
	TopLevel { scope_name: &'a str, rule: Option<&'a str> },
}

impl<'a> IncludeReference<'a> {
	pub(crate) fn parse(include: &'a str) -> Self {
		match include {
			BASE_RULE => Self::Base,
			SELF_RULE => Self::This,
			_ => match include.split_once('#') {
				None => Self::TopLevel {
					scope_name: include,
					rule: None,
				},
				Some(("", name)) => Self::Relative(name),
				Some((scope_name, name)) => Self::TopLevel {
					scope_name,
					rule: Some(name),
				},
			},
		}
	}
}

/// Compiles raw rules into a [`RuleRegistry`].
///
/// Rules are cached by the address of their raw definition, so every include
/// of the same repository entry shares one compiled rule. The id is reserved
/// before a rule's children are compiled, which lets recursive includes refer
/// back to it.
pub(crate) struct RuleFactory<'g> {
	scope_name: &'g str,
	own: Arc<RawGrammar>,
	lookup: &'g dyn GrammarRepository,
	rules: Vec<Option<Rule>>,
	/// Keeps the keyed raw rules alive so addresses cannot be reused.
	compiled: FxHashMap<*const RawRule, (RuleId, Arc<RawRule>)>,
	included: FxHashMap<String, Arc<RawGrammar>>,
}

impl<'g> RuleFactory<'g> {
	pub(crate) fn new(scope_name: &'g str, own: &Arc<RawGrammar>, lookup: &'g dyn GrammarRepository) -> Self {
		Self {
			scope_name,
			own: Arc::clone(own),
			lookup,
			rules: Vec::new(),
			compiled: FxHashMap::default(),
			included: FxHashMap::default(),
		}
	}

	pub(crate) fn finish(self) -> (RuleRegistry, FxHashMap<String, Arc<RawGrammar>>) {
		(RuleRegistry::from_slots(self.rules), self.included)
	}

	pub(crate) fn compile(&mut self, raw: &Arc<RawRule>, repository: &RawRepository) -> RuleId {
		let key = Arc::as_ptr(raw);
		if let Some((id, _)) = self.compiled.get(&key) {
			return *id;
		}

		let id = RuleId(self.rules.len() as u32 + 1);
		self.rules.push(None);
		self.compiled.insert(key, (id, Arc::clone(raw)));

		let rule = self.build(id, raw, repository);
		if let Some(slot) = id.idx().and_then(|idx| self.rules.get_mut(idx)) {
			*slot = Some(rule);
		}
		id
	}

	/// Looks up, clones and caches an external grammar.
	///
	/// The clone's `$base` is inherited from `repository` when given. A scope
	/// naming this grammar resolves to this grammar.
	pub(crate) fn external_grammar(&mut self, scope_name: &str, repository: Option<&RawRepository>) -> Option<Arc<RawGrammar>> {
		if scope_name == self.scope_name {
			return Some(Arc::clone(&self.own));
		}
		if let Some(grammar) = self.included.get(scope_name) {
			return Some(Arc::clone(grammar));
		}

		let Some(raw) = self.lookup.lookup(scope_name) else {
			debug!(scope = scope_name, from = self.scope_name, "external grammar not found, include skipped");
			return None;
		};
		let base = repository.and_then(|r| r.get(BASE_RULE));
		let grammar = Arc::new(init_grammar(&raw, base));
		self.included.insert(scope_name.to_owned(), Arc::clone(&grammar));
		Some(grammar)
	}

	fn build(&mut self, id: RuleId, raw: &RawRule, repository: &RawRepository) -> Rule {
		let name = raw.name.as_deref().map(ScopeTemplate::new);
		let content_name = raw.content_name.as_deref().map(ScopeTemplate::new);

		if let Some(pattern) = &raw.match_ {
			let captures = self.compile_captures(raw.captures.as_ref(), repository);
			let regex = Arc::new(RegexSource::new(pattern));
			return Rule::new(id, name, None, RuleKind::Match { regex, captures });
		}

		let Some(begin) = &raw.begin else {
			let merged;
			let repository = match &raw.repository {
				Some(local) => {
					merged = merge_repositories(repository, local);
					&merged
				}
				None => repository,
			};
			let patterns = match (&raw.patterns, &raw.include) {
				(Some(patterns), _) => self.compile_patterns(patterns, repository),
				(None, Some(include)) => {
					let include = Arc::new(RawRule {
						include: Some(include.clone()),
						..Default::default()
					});
					self.compile_patterns(&[include], repository)
				}
				(None, None) => Patterns::default(),
			};
			return Rule::new(id, name, content_name, RuleKind::IncludeOnly { patterns });
		};

		let begin = Arc::new(RegexSource::new(begin));
		let begin_captures = self.compile_captures(raw.begin_captures.as_ref().or(raw.captures.as_ref()), repository);

		if let Some(condition) = &raw.while_ {
			let while_captures = self.compile_captures(raw.while_captures.as_ref().or(raw.captures.as_ref()), repository);
			let patterns = self.compile_patterns(raw.patterns.as_deref().unwrap_or_default(), repository);
			return Rule::new(
				id,
				name,
				content_name,
				RuleKind::BeginWhile {
					begin,
					begin_captures,
					condition: Arc::new(RegexSource::new(condition)),
					while_captures,
					patterns,
				},
			);
		}

		let end_captures = self.compile_captures(raw.end_captures.as_ref().or(raw.captures.as_ref()), repository);
		let patterns = self.compile_patterns(raw.patterns.as_deref().unwrap_or_default(), repository);
		Rule::new(
			id,
			name,
			content_name,
			RuleKind::BeginEnd {
				begin,
				begin_captures,
				end: Arc::new(RegexSource::new(raw.end.as_deref().unwrap_or(MISSING_END))),
				end_captures,
				apply_end_pattern_last: raw.apply_end_pattern_last,
				patterns,
			},
		)
	}

	fn compile_patterns(&mut self, patterns: &[Arc<RawRule>], repository: &RawRepository) -> Patterns {
		let mut ids = Vec::with_capacity(patterns.len());
		for pattern in patterns {
			let id = match &pattern.include {
				Some(include) => self.resolve_include(include, repository),
				None => Some(self.compile(pattern, repository)),
			};
			let Some(id) = id else { continue };
			if self.is_empty_after_missing(id) {
				continue;
			}
			ids.push(id);
		}
		Patterns {
			has_missing: ids.len() != patterns.len(),
			ids,
		}
	}

	fn resolve_include(&mut self, include: &str, repository: &RawRepository) -> Option<RuleId> {
		match IncludeReference::parse(include) {
			IncludeReference::Base | IncludeReference::This => {
				let rule = Arc::clone(repository.get(include)?);
				Some(self.compile(&rule, repository))
			}
			IncludeReference::Relative(name) => {
				let rule = Arc::clone(repository.get(name)?);
				Some(self.compile(&rule, repository))
			}
			IncludeReference::TopLevel { scope_name, rule } => {
				let grammar = self.external_grammar(scope_name, Some(repository))?;
				let target = grammar.repository.get(rule.unwrap_or(SELF_RULE)).cloned();
				let Some(target) = target else {
					debug!(include, "include target missing from external grammar, skipped");
					return None;
				};
				Some(self.compile(&target, &grammar.repository))
			}
		}
	}

	/// Rules whose every pattern failed to resolve contribute nothing and are
	/// dropped from the including list. Rules still under construction are
	/// kept.
	fn is_empty_after_missing(&self, id: RuleId) -> bool {
		id.idx()
			.and_then(|idx| self.rules.get(idx))
			.and_then(Option::as_ref)
			.and_then(Rule::patterns)
			.is_some_and(|p| p.has_missing && p.ids.is_empty())
	}

	fn compile_captures(&mut self, captures: Option<&RawCaptures>, repository: &RawRepository) -> CaptureRules {
		let Some(captures) = captures else {
			return CaptureRules::default();
		};

		let mut indexed = captures
			.iter()
			.filter_map(|(key, rule)| key.parse::<usize>().ok().map(|index| (index, rule)))
			.collect::<Vec<_>>();
		indexed.sort_by_key(|(index, _)| *index);
		let Some(&(max, _)) = indexed.last() else {
			return CaptureRules::default();
		};

		let mut rules = (0..=max).map(|_| None).collect::<Vec<Option<CaptureRule>>>();
		for (index, raw) in indexed {
			let retokenize = raw.patterns.is_some().then(|| self.compile(raw, repository));
			rules[index] = Some(CaptureRule {
				name: raw.name.as_deref().map(ScopeTemplate::new),
				content_name: raw.content_name.as_deref().map(ScopeTemplate::new),
				retokenize,
			});
		}
		rules.into_boxed_slice()
	}
}

fn merge_repositories(inherited: &RawRepository, local: &RawRepository) -> RawRepository {
	let mut merged = inherited.clone();
	merged.extend(local.iter().map(|(k, v)| (k.clone(), Arc::clone(v))));
	merged
}
