//! Scope name to {language id, token type} lookup.

use std::sync::LazyLock;

use parking_lot::RwLock;
use regex::Regex;
use rustc_hash::FxHashMap;

use crate::attributes::{LanguageId, StandardTokenType};

static STANDARD_TOKEN_TYPE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"\b(comment|string|regex|meta\.embedded)\b").expect("standard token type pattern is valid")
});

/// Language and token type derived from a single scope name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BasicScopeAttributes {
	pub language_id: LanguageId,
	/// `None` when the scope carries no standard token type.
	pub token_type: Option<StandardTokenType>,
}

/// Derives [`BasicScopeAttributes`] for scope names, memoizing results.
#[derive(Debug)]
pub struct BasicScopeAttributesProvider {
	default: BasicScopeAttributes,
	/// Embedded language scopes sorted descending so that longer dotted names
	/// come before their prefixes.
	embedded: Vec<(String, LanguageId)>,
	cache: RwLock<FxHashMap<String, BasicScopeAttributes>>,
}

impl BasicScopeAttributesProvider {
	pub fn new(initial_language: LanguageId, embedded_languages: &FxHashMap<String, LanguageId>) -> Self {
		let mut embedded = embedded_languages
			.iter()
			.map(|(scope, id)| (scope.clone(), *id))
			.collect::<Vec<_>>();
		embedded.sort_by(|a, b| b.0.cmp(&a.0));

		Self {
			default: BasicScopeAttributes {
				language_id: initial_language,
				token_type: None,
			},
			embedded,
			cache: RwLock::new(FxHashMap::default()),
		}
	}

	pub fn default_attributes(&self) -> BasicScopeAttributes {
		self.default
	}

	pub fn get(&self, scope_name: &str) -> BasicScopeAttributes {
		if let Some(attrs) = self.cache.read().get(scope_name) {
			return *attrs;
		}

		let attrs = BasicScopeAttributes {
			language_id: self.scope_to_language(scope_name),
			token_type: standard_token_type(scope_name),
		};
		self.cache.write().insert(scope_name.to_owned(), attrs);
		attrs
	}

	fn scope_to_language(&self, scope_name: &str) -> LanguageId {
		self.embedded
			.iter()
			.find(|(scope, _)| {
				scope_name
					.strip_prefix(scope.as_str())
					.is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
			})
			.map_or(LanguageId::NONE, |(_, id)| *id)
	}
}

fn standard_token_type(scope_name: &str) -> Option<StandardTokenType> {
	let caps = STANDARD_TOKEN_TYPE.captures(scope_name)?;
	match &caps[1] {
		"comment" => Some(StandardTokenType::Comment),
		"string" => Some(StandardTokenType::String),
		"regex" => Some(StandardTokenType::Regex),
		_ => Some(StandardTokenType::Other),
	}
}
