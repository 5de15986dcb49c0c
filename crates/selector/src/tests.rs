use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::*;

fn matches(selector: &str, scopes: &[&str]) -> bool {
	create_matchers(selector).iter().any(|m| m.matches(scopes))
}

#[test]
fn identifier_matches_dotted_prefix() {
	assert!(matches("string", &["source.js", "string.quoted.double"]));
	assert!(matches("string.quoted", &["string.quoted"]));
	assert!(!matches("string", &["source.js", "strings"]));
	assert!(!matches("string.quoted.double", &["string.quoted"]));
}

#[test]
fn path_requires_scope_order() {
	let scopes = ["source.js", "meta.block", "string.quoted"];
	assert!(matches("source.js string", &scopes));
	assert!(matches("source meta string", &scopes));
	assert!(!matches("string source.js", &scopes));
	assert!(!matches("source.js meta.block meta.block", &scopes));
}

#[test]
fn negation_excludes_scopes() {
	assert!(matches("source.js -comment", &["source.js"]));
	assert!(!matches("source.js -comment", &["source.js", "comment.line"]));
	assert!(matches("- comment", &["source.js"]));
}

#[test]
fn dangling_negation_matches_nothing() {
	let matchers = create_matchers("-");
	assert_eq!(matchers.len(), 1);
	assert!(!matchers[0].matches(&["source.js"]));
	assert!(!matchers[0].matches::<&str>(&[]));
}

#[test]
fn parenthesised_alternation() {
	assert!(matches("(a | b) c", &["a", "c"]));
	assert!(matches("(a | b) c", &["b.x", "c.y"]));
	assert!(!matches("(a | b) c", &["c"]));
	assert!(matches("(a, b) -c", &["b"]));
	assert!(!matches("(a, b) -c", &["b", "c"]));
}

#[test]
fn branches_split_on_top_level_commas() {
	let matchers = create_matchers("source.js, text.html");
	assert_eq!(matchers.len(), 2);
	assert!(matchers[0].matches(&["source.js"]));
	assert!(!matchers[0].matches(&["text.html"]));
	assert!(matchers[1].matches(&["text.html.basic"]));
}

#[test]
fn priority_prefixes() {
	let priorities = |s: &str| create_matchers(s).into_iter().map(|m| m.priority).collect::<Vec<_>>();

	assert_eq!(priorities("source"), vec![Priority::Normal]);
	assert_eq!(priorities("L:source"), vec![Priority::Left]);
	assert_eq!(priorities("R:source -comment"), vec![Priority::Right]);
	assert_eq!(priorities("L:a, b"), vec![Priority::Left, Priority::Left]);
	assert_eq!(priorities("L:a, R:b"), vec![Priority::Left, Priority::Right]);
	assert_eq!(Priority::Left.value(), -1);
	assert!(Priority::Left < Priority::Normal && Priority::Normal < Priority::Right);
}

#[test]
fn priority_prefix_is_not_part_of_the_path() {
	let matchers = create_matchers("L:text.html.markdown -markup.raw");
	assert_eq!(matchers.len(), 1);
	assert!(matchers[0].matches(&["text.html.markdown", "meta.paragraph"]));
	assert!(!matchers[0].matches(&["text.html.markdown", "markup.raw.block"]));
}

#[test]
fn empty_selector_yields_no_matchers() {
	assert!(create_matchers("").is_empty());
	assert!(create_matchers("   ").is_empty());
}

#[test]
fn scopes_are_matching_rules() {
	assert!(scopes_are_matching("comment.line", "comment"));
	assert!(scopes_are_matching("comment", "comment"));
	assert!(!scopes_are_matching("commentary", "comment"));
	assert!(!scopes_are_matching("", "comment"));
}

proptest! {
	#[test]
	fn negation_is_complement(
		scopes in prop::collection::vec("(source|string|comment|meta)(\\.[a-z]{1,3}){0,2}", 0..6),
		identifier in "(source|string|comment|meta)",
	) {
		let positive = matches(&identifier, &scopes.iter().map(String::as_str).collect::<Vec<_>>());
		let negative = matches(&format!("-{identifier}"), &scopes.iter().map(String::as_str).collect::<Vec<_>>());
		prop_assert_eq!(positive, !negative);
	}

	#[test]
	fn every_scope_matches_itself(scopes in prop::collection::vec("[a-z]{1,4}(\\.[a-z]{1,4}){0,2}", 1..6)) {
		let refs = scopes.iter().map(String::as_str).collect::<Vec<_>>();
		prop_assert!(matches(&scopes.join(" "), &refs));
	}
}
