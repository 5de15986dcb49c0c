use std::fmt;
use std::sync::Arc;

use crate::attributes::{AttributesUpdate, EncodedTokenAttributes, StyleAttributes};
use crate::scope_attributes::{BasicScopeAttributes, BasicScopeAttributesProvider};
use crate::theme::ThemeProvider;

/// Everything needed to pre-encode a scope's metadata when it is pushed.
#[derive(Clone, Copy)]
pub struct ScopeEncoder<'a> {
	pub attributes: &'a BasicScopeAttributesProvider,
	pub theme: &'a dyn ThemeProvider,
}

/// Scope path of a token with the encoded metadata of each prefix.
#[derive(Clone)]
pub struct AttributedScopeStack(Arc<ScopeNode>);

struct ScopeNode {
	parent: Option<AttributedScopeStack>,
	scope_name: Box<str>,
	attributes: EncodedTokenAttributes,
}

impl AttributedScopeStack {
	/// A root scope carrying `attributes` as is.
	pub fn root(scope_name: &str, attributes: EncodedTokenAttributes) -> Self {
		Self::node(None, scope_name, attributes)
	}

	/// A root scope whose metadata is `attributes` overlaid with what the
	/// scope itself contributes.
	pub fn root_with_lookup(scope_name: &str, attributes: EncodedTokenAttributes, encoder: ScopeEncoder<'_>) -> Self {
		let basic = encoder.attributes.get(scope_name);
		let style = encoder.theme.theme_match(&[scope_name]);
		Self::root(scope_name, Self::merge_attributes(attributes, basic, style))
	}

	fn node(parent: Option<AttributedScopeStack>, scope_name: &str, attributes: EncodedTokenAttributes) -> Self {
		Self(Arc::new(ScopeNode {
			parent,
			scope_name: scope_name.into(),
			attributes,
		}))
	}

	pub fn parent(&self) -> Option<&AttributedScopeStack> {
		self.0.parent.as_ref()
	}

	pub fn scope_name(&self) -> &str {
		&self.0.scope_name
	}

	pub fn attributes(&self) -> EncodedTokenAttributes {
		self.0.attributes
	}

	pub fn ptr_eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}

	/// Scope names from the root to this node.
	pub fn scope_names(&self) -> Vec<&str> {
		let mut names = Vec::new();
		let mut node = Some(self);
		while let Some(current) = node {
			names.push(current.scope_name());
			node = current.parent();
		}
		names.reverse();
		names
	}

	/// Pushes each space-separated scope of `scope_path`. `None` returns the
	/// stack unchanged.
	pub fn push_attributed(&self, scope_path: Option<&str>, encoder: ScopeEncoder<'_>) -> Self {
		let Some(scope_path) = scope_path else {
			return self.clone();
		};

		let mut path = self.scope_names();
		let mut stack = self.clone();
		for scope in scope_path.split(' ').filter(|s| !s.is_empty()) {
			path.push(scope);
			let basic = encoder.attributes.get(scope);
			let style = encoder.theme.theme_match(&path);
			let attributes = Self::merge_attributes(stack.attributes(), basic, style);
			stack = Self::node(Some(stack), scope, attributes);
		}
		stack
	}

	/// Overlays a scope's language, token type and theme style onto the
	/// metadata inherited from its parent.
	pub fn merge_attributes(
		existing: EncodedTokenAttributes,
		basic: BasicScopeAttributes,
		style: Option<StyleAttributes>,
	) -> EncodedTokenAttributes {
		let style = style.unwrap_or_default();
		existing.set(AttributesUpdate {
			language_id: basic.language_id,
			token_type: basic.token_type,
			balanced_brackets: None,
			font_style: style.font_style,
			foreground_id: style.foreground_id,
			background_id: style.background_id,
		})
	}
}

impl PartialEq for AttributedScopeStack {
	fn eq(&self, other: &Self) -> bool {
		let (mut a, mut b) = (Some(self), Some(other));
		loop {
			match (a, b) {
				(None, None) => return true,
				(Some(x), Some(y)) => {
					if x.ptr_eq(y) {
						return true;
					}
					if x.scope_name() != y.scope_name() || x.attributes() != y.attributes() {
						return false;
					}
					a = x.parent();
					b = y.parent();
				}
				_ => return false,
			}
		}
	}
}

impl Eq for AttributedScopeStack {}

impl fmt::Debug for AttributedScopeStack {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_list().entries(self.scope_names()).finish()
	}
}
