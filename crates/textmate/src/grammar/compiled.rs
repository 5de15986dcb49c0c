use std::sync::Arc;

use rustc_hash::FxHashMap;
use scopeline_selector::create_matchers;
use tracing::debug;

use super::Injection;
use crate::raw::{RawGrammar, SELF_RULE};
use crate::registry::GrammarRepository;
use crate::rule::{RuleFactory, RuleId, RuleRegistry};

/// Everything the compile pass of a [`Grammar`](super::Grammar) produces.
#[derive(Debug)]
pub(crate) struct CompiledGrammar {
	pub root: RuleId,
	pub rules: RuleRegistry,
	/// Sorted by priority, declaration order among equal priorities.
	pub injections: Vec<Injection>,
	/// External grammars by scope name, already wired with `$self`/`$base`.
	pub included: FxHashMap<String, Arc<RawGrammar>>,
}

impl CompiledGrammar {
	/// Compiles the root rule, then the grammar's own injections, then the
	/// grammars `repository` registers as injecting into `scope_name`.
	pub(crate) fn build(scope_name: &str, raw: &Arc<RawGrammar>, repository: &dyn GrammarRepository) -> Self {
		let mut factory = RuleFactory::new(scope_name, raw, repository);
		let root = factory.compile(&raw.repository[SELF_RULE], &raw.repository);

		let mut injections = Vec::new();
		for (selector, rule) in &raw.injections {
			let rule_id = factory.compile(rule, &raw.repository);
			collect_injections(&mut injections, selector, rule_id, scope_name);
		}

		for injector in repository.injections(scope_name).unwrap_or_default() {
			let Some(grammar) = factory.external_grammar(&injector, Some(&raw.repository)) else {
				continue;
			};
			let Some(selector) = grammar.injection_selector.as_deref() else {
				debug!(scope = scope_name, injector = %injector, "injector declares no injection selector, skipped");
				continue;
			};
			let rule_id = factory.compile(&grammar.to_raw_rule(), &grammar.repository);
			collect_injections(&mut injections, selector, rule_id, &injector);
		}

		injections.sort_by_key(|injection| injection.priority);

		let (rules, included) = factory.finish();
		debug!(
			scope = scope_name,
			rules = rules.len(),
			injections = ?injections.iter().map(|i| i.selector.as_str()).collect::<Vec<_>>(),
			included = included.len(),
			"compiled grammar"
		);

		Self {
			root,
			rules,
			injections,
			included,
		}
	}
}

fn collect_injections(out: &mut Vec<Injection>, selector: &str, rule_id: RuleId, grammar_scope: &str) {
	out.extend(create_matchers(selector).into_iter().map(|m| Injection {
		selector: selector.to_owned(),
		matcher: m.matcher,
		rule_id,
		grammar_scope: grammar_scope.to_owned(),
		priority: m.priority,
	}));
}
