//! Theme lookup seam.
//!
//! Theme parsing lives outside this crate. The tokenizer only needs default
//! styles and a per-scope-path lookup to pre-encode metadata when a scope is
//! pushed.

use crate::attributes::StyleAttributes;

/// Resolves styles for scope paths.
pub trait ThemeProvider: Send + Sync {
	/// Style applied to the root of every document.
	fn defaults(&self) -> StyleAttributes;

	/// Style for the full scope path, outermost scope first. `None` leaves the
	/// inherited style untouched.
	fn theme_match(&self, scope_path: &[&str]) -> Option<StyleAttributes>;
}

/// A theme with fixed defaults and no scope rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTheme {
	pub defaults: StyleAttributes,
}

impl ThemeProvider for PlainTheme {
	fn defaults(&self) -> StyleAttributes {
		self.defaults
	}

	fn theme_match(&self, _scope_path: &[&str]) -> Option<StyleAttributes> {
		None
	}
}
