//! Which scopes may contain bracket pairs.

use scopeline_selector::{Matcher, create_matchers};

/// Allow and deny selectors deciding whether a token's brackets take part in
/// bracket-pair matching.
#[derive(Debug, Clone, Default)]
pub struct BalancedBracketSelectors {
	balanced: Vec<Matcher>,
	unbalanced: Vec<Matcher>,
	allow_any: bool,
}

impl BalancedBracketSelectors {
	/// A `*` among `balanced` allows every scope not denied by `unbalanced`.
	pub fn new<S: AsRef<str>>(balanced: &[S], unbalanced: &[S]) -> Self {
		let mut allow_any = false;
		let mut allow = Vec::new();
		for selector in balanced {
			let selector = selector.as_ref();
			if selector == "*" {
				allow_any = true;
				continue;
			}
			allow.extend(create_matchers(selector).into_iter().map(|m| m.matcher));
		}

		let deny = unbalanced
			.iter()
			.flat_map(|selector| create_matchers(selector.as_ref()))
			.map(|m| m.matcher)
			.collect();

		Self {
			balanced: allow,
			unbalanced: deny,
			allow_any,
		}
	}

	pub fn matches_always(&self) -> bool {
		self.allow_any && self.unbalanced.is_empty()
	}

	pub fn matches_never(&self) -> bool {
		!self.allow_any && self.balanced.is_empty()
	}

	pub fn matches<S: AsRef<str>>(&self, scopes: &[S]) -> bool {
		if self.unbalanced.iter().any(|m| m.matches(scopes)) {
			return false;
		}
		self.allow_any || self.balanced.iter().any(|m| m.matches(scopes))
	}
}
