use std::sync::LazyLock;

use regex::Regex;

static TOKEN: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"[LR]:|[\w.:][\w.:\-]*|[,|\-()]").expect("selector token pattern is valid"));

/// Splits a selector into priority prefixes, identifiers and punctuation.
///
/// Anything the token pattern does not recognise (whitespace, stray symbols)
/// is skipped.
pub(crate) fn tokenize(selector: &str) -> impl Iterator<Item = &str> {
	TOKEN.find_iter(selector).map(|m| m.as_str())
}

pub(crate) fn is_identifier(token: &str) -> bool {
	token
		.chars()
		.next()
		.is_some_and(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | ':'))
}
