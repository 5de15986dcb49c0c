/// Position of an injection relative to the rules of the grammar it targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
	/// `L:` prefix, wins ties against normal rules.
	Left,
	#[default]
	Normal,
	/// `R:` prefix.
	Right,
}

impl Priority {
	/// Numeric form used for ordering injections: `-1`, `0` or `1`.
	pub fn value(self) -> i8 {
		match self {
			Self::Left => -1,
			Self::Normal => 0,
			Self::Right => 1,
		}
	}
}

/// A compiled selector expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
	/// Identifiers that must match scopes of the path in order.
	Path(Box<[String]>),
	/// Negated operand. A dangling `-` has no operand and matches nothing.
	Not(Option<Box<Matcher>>),
	/// Every operand must match. Empty matches everything.
	All(Vec<Matcher>),
	/// At least one branch must match.
	Any(Vec<Matcher>),
}

impl Matcher {
	pub fn matches<S: AsRef<str>>(&self, scopes: &[S]) -> bool {
		match self {
			Self::Path(identifiers) => path_matches(identifiers, scopes),
			Self::Not(operand) => operand.as_ref().is_some_and(|m| !m.matches(scopes)),
			Self::All(operands) => operands.iter().all(|m| m.matches(scopes)),
			Self::Any(branches) => branches.iter().any(|m| m.matches(scopes)),
		}
	}
}

/// One top-level branch of a selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatcherWithPriority {
	pub matcher: Matcher,
	pub priority: Priority,
}

impl MatcherWithPriority {
	pub fn matches<S: AsRef<str>>(&self, scopes: &[S]) -> bool {
		self.matcher.matches(scopes)
	}
}

/// Returns true when `identifier` names `scope` or one of its dotted parents.
///
/// `string` matches `string` and `string.quoted`, but not `strings`.
pub fn scopes_are_matching(scope: &str, identifier: &str) -> bool {
	if scope.is_empty() {
		return false;
	}
	match scope.strip_prefix(identifier) {
		Some(rest) => rest.is_empty() || rest.starts_with('.'),
		None => false,
	}
}

fn path_matches<S: AsRef<str>>(identifiers: &[String], scopes: &[S]) -> bool {
	if scopes.len() < identifiers.len() {
		return false;
	}
	let mut next = 0;
	identifiers.iter().all(|identifier| {
		match scopes[next..]
			.iter()
			.position(|scope| scopes_are_matching(scope.as_ref(), identifier))
		{
			Some(offset) => {
				next += offset + 1;
				true
			}
			None => false,
		}
	})
}
