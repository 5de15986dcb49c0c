use std::borrow::Cow;
use std::sync::Arc;

use pretty_assertions::assert_eq;

use super::factory::IncludeReference;
use super::*;
use crate::raw::{RawGrammar, SELF_RULE, init_grammar};
use crate::registry::GrammarSet;

fn span(start: usize, end: usize) -> Option<CaptureSpan> {
	Some(CaptureSpan { start, end })
}

fn compile(json: &str) -> (RuleId, RuleRegistry) {
	let grammar: RawGrammar = serde_json::from_str(json).expect("valid grammar json");
	let raw = Arc::new(init_grammar(&grammar, None));
	let repository = GrammarSet::new();
	let mut factory = RuleFactory::new("source.test", &raw, &repository);
	let root = factory.compile(&raw.repository[SELF_RULE], &raw.repository);
	let (rules, _) = factory.finish();
	(root, rules)
}

fn root_patterns(root: RuleId, rules: &RuleRegistry) -> Patterns {
	rules
		.get(root)
		.expect("root rule")
		.patterns()
		.cloned()
		.expect("root has patterns")
}

#[test]
fn template_substitutes_captures() {
	let line = "foo.Bar baz";
	let captures = [span(0, 11), span(0, 3), span(4, 7), span(8, 11)];
	let template = ScopeTemplate::new("entity.$1.${2:/downcase}.${3:/upcase}");
	assert_eq!(template.resolve(line, &captures), "entity.foo.bar.BAZ");
}

#[test]
fn template_edge_cases() {
	let line = "..x";
	let captures = [span(0, 3), span(0, 3), None];
	assert_eq!(ScopeTemplate::new("meta.$1").resolve(line, &captures), "meta.x");
	assert_eq!(ScopeTemplate::new("a.$2.$5").resolve(line, &captures), "a..$5");
	assert!(matches!(
		ScopeTemplate::new("plain.scope").resolve(line, &captures),
		Cow::Borrowed("plain.scope")
	));
}

#[test]
fn regex_source_rewrites_end_of_string() {
	let source = RegexSource::new(r"foo\z");
	assert_eq!(source.source(), r"foo$(?!\n)(?<!\n)");
	assert!(!source.has_anchor());
	assert!(source.search("foo\n", 0, true, true).is_none());

	let source = RegexSource::new(r"foo\Z");
	assert!(source.search("foo\n", 0, true, true).is_some());
}

#[test]
fn regex_source_anchor_variants() {
	let source = RegexSource::new(r"\Gabc");
	assert!(source.has_anchor());
	assert_eq!(source.anchored_source(false, false), "\u{FFFF}abc");
	assert_eq!(source.anchored_source(true, true), r"\Gabc");
	assert!(source.search("xabc", 1, false, false).is_none());

	let source = RegexSource::new(r"\Aab");
	assert!(source.search("ab\n", 0, true, false).is_some());
	assert!(source.search("ab\n", 0, false, false).is_none());
}

#[test]
fn back_references_are_escaped() {
	let end = RegexSource::new(r"^\1$");
	assert!(end.has_back_references());
	let line = "x <<EOF";
	assert_eq!(end.resolve_back_references(line, &[span(2, 7), span(4, 7)]), "^EOF$");

	let end = RegexSource::new(r"\1+");
	assert_eq!(end.resolve_back_references("a.(b", &[span(0, 4), span(0, 4)]), r"a\.\(b+");
	assert_eq!(end.resolve_back_references("a", &[span(0, 1)]), "+");
}

#[test]
fn back_references_survive_extended_mode() {
	let end = RegexSource::new(r"(?x) ^ \1 $");
	let line = "<<a b#c-d,e;";
	let resolved = end.resolve_back_references(line, &[span(0, 12), span(2, 11)]);
	assert_eq!(resolved, r"(?x) ^ a\ b\#c\-d\,e $");

	let resolved = RegexSource::new(&resolved);
	assert!(resolved.search("a b#c-d,e\n", 0, false, false).is_some());
	assert!(resolved.search("ab\n", 0, false, false).is_none());
}

#[test]
fn invalid_pattern_never_matches() {
	let source = RegexSource::new("(unclosed");
	assert!(source.search("(unclosed\n", 0, true, true).is_none());
}

#[test]
fn scanner_prefers_earliest_then_first_listed() {
	let b = Arc::new(RegexSource::new("b"));
	let a = Arc::new(RegexSource::new("a"));
	let ab = Arc::new(RegexSource::new("ab"));
	let entries = [
		ScanEntry::new(&b, ScanTarget::Rule(RuleId(1))),
		ScanEntry::new(&a, ScanTarget::Rule(RuleId(2))),
		ScanEntry::new(&ab, ScanTarget::Rule(RuleId(3))),
	];

	let found = find_next_match(&entries, None, "ab\n", 0, true, true).expect("match");
	assert_eq!(found.target, ScanTarget::Rule(RuleId(2)));
	assert_eq!(found.whole, CaptureSpan { start: 0, end: 1 });

	let found = find_next_match(&entries, None, "ab\n", 1, true, true).expect("match");
	assert_eq!(found.target, ScanTarget::Rule(RuleId(1)));
}

#[test]
fn scanner_uses_end_override() {
	let end = Arc::new(RegexSource::new(r"\1"));
	let entries = [ScanEntry::new(&end, ScanTarget::End)];
	let resolved = RegexSource::new("EOF");
	let found = find_next_match(&entries, Some(&resolved), "xx EOF\n", 0, true, true).expect("match");
	assert_eq!(found.target, ScanTarget::End);
	assert_eq!(found.whole, CaptureSpan { start: 3, end: 6 });
}

#[test]
fn include_reference_forms() {
	assert_eq!(IncludeReference::parse("$base"), IncludeReference::Base);
	assert_eq!(IncludeReference::parse("$self"), IncludeReference::This);
	assert_eq!(IncludeReference::parse("#strings"), IncludeReference::Relative("strings"));
	assert_eq!(
		IncludeReference::parse("source.css"),
		IncludeReference::TopLevel {
			scope_name: "source.css",
			rule: None
		}
	);
	assert_eq!(
		IncludeReference::parse("source.css#values"),
		IncludeReference::TopLevel {
			scope_name: "source.css",
			rule: Some("values")
		}
	);
}

#[test]
fn repeated_includes_share_one_rule() {
	let (root, rules) = compile(
		r##"{
			"scopeName": "source.test",
			"patterns": [{ "include": "#a" }, { "include": "#a" }, { "include": "#missing" }],
			"repository": { "a": { "match": "x", "name": "keyword.x" } }
		}"##,
	);
	let patterns = root_patterns(root, &rules);
	assert_eq!(patterns.ids.len(), 2);
	assert_eq!(patterns.ids[0], patterns.ids[1]);
	assert!(patterns.has_missing);
	assert_eq!(rules.get(patterns.ids[0]).expect("rule").name_source(), Some("keyword.x"));
}

#[test]
fn recursive_includes_terminate() {
	let (root, rules) = compile(
		r##"{
			"scopeName": "source.test",
			"patterns": [{ "include": "#block" }],
			"repository": {
				"block": { "begin": "\\{", "end": "\\}", "patterns": [{ "include": "#block" }] }
			}
		}"##,
	);
	let block = root_patterns(root, &rules).ids[0];
	let inner = rules.get(block).expect("block").patterns().expect("patterns");
	assert_eq!(inner.ids, vec![block]);
}

#[test]
fn rules_with_only_missing_patterns_are_dropped() {
	let (root, rules) = compile(
		r##"{
			"scopeName": "source.test",
			"patterns": [{ "include": "#ext" }, { "match": "y" }],
			"repository": { "ext": { "patterns": [{ "include": "source.missing" }] } }
		}"##,
	);
	let patterns = root_patterns(root, &rules);
	assert_eq!(patterns.ids.len(), 1);
	assert!(matches!(rules.get(patterns.ids[0]).expect("rule").kind(), RuleKind::Match { .. }));
}

#[test]
fn unknown_rule_ids_are_errors() {
	let (_, rules) = compile(r#"{ "scopeName": "source.test", "patterns": [] }"#);
	assert_eq!(
		rules.get(RuleId(99)).map(Rule::id),
		Err(TextMateError::UnknownRule {
			id: RuleId(99),
			len: rules.len()
		})
	);
	assert!(rules.get(RuleId(0)).is_err());
}

#[test]
fn end_pattern_position_in_scan_list() {
	let (root, rules) = compile(
		r##"{
			"scopeName": "source.test",
			"patterns": [
				{ "begin": "<", "end": ">", "patterns": [{ "match": "a" }] },
				{ "begin": "\\[", "end": "\\]", "applyEndPatternLast": 1, "patterns": [{ "match": "a" }] }
			]
		}"##,
	);
	let ids = root_patterns(root, &rules).ids;

	let first = rules.scan_entries(ids[0]).expect("scan list");
	assert_eq!(first[0].target, ScanTarget::End);
	assert_eq!(first.len(), 2);

	let last = rules.scan_entries(ids[1]).expect("scan list");
	assert_eq!(last[1].target, ScanTarget::End);

	let root_entries = rules.scan_entries(root).expect("scan list");
	let sources = root_entries.iter().map(|e| e.source.source()).collect::<Vec<_>>();
	assert_eq!(sources, vec!["<", r"\["]);
}

#[test]
fn captures_compile_by_index() {
	let (root, rules) = compile(
		r##"{
			"scopeName": "source.test",
			"patterns": [{
				"match": "(a)(b)(c)",
				"captures": {
					"1": { "name": "first" },
					"3": { "patterns": [{ "match": "c", "name": "inner" }] }
				}
			}]
		}"##,
	);
	let id = root_patterns(root, &rules).ids[0];
	let RuleKind::Match { captures, .. } = rules.get(id).expect("rule").kind() else {
		panic!("expected a match rule");
	};
	assert_eq!(captures.len(), 4);
	assert!(captures[0].is_none());
	assert!(captures[2].is_none());
	assert_eq!(captures[1].as_ref().and_then(|c| c.name.as_ref()).map(ScopeTemplate::source), Some("first"));
	assert!(captures[3].as_ref().and_then(|c| c.retokenize).is_some());
}
