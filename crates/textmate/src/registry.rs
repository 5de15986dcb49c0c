//! Grammar lookup and grammar construction.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::error::{Result, TextMateError};
use crate::grammar::{Grammar, GrammarOptions};
use crate::raw::RawGrammar;
use crate::theme::ThemeProvider;

/// Source of raw grammars for cross-grammar includes and injections.
pub trait GrammarRepository: Send + Sync {
	fn lookup(&self, scope_name: &str) -> Option<Arc<RawGrammar>>;

	/// Scope names of grammars that inject themselves into `scope_name`.
	fn injections(&self, scope_name: &str) -> Option<Vec<String>>;
}

/// In-memory [`GrammarRepository`].
#[derive(Debug, Clone, Default)]
pub struct GrammarSet {
	grammars: FxHashMap<String, Arc<RawGrammar>>,
	injections: FxHashMap<String, Vec<String>>,
}

impl GrammarSet {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds `grammar` under its own scope name, replacing any previous entry.
	pub fn add(&mut self, grammar: RawGrammar) -> Arc<RawGrammar> {
		let grammar = Arc::new(grammar);
		self.grammars.insert(grammar.scope_name.clone(), Arc::clone(&grammar));
		grammar
	}

	/// Registers `injector` as injecting into `target`.
	pub fn add_injection(&mut self, target: impl Into<String>, injector: impl Into<String>) {
		let injector = injector.into();
		let injectors = self.injections.entry(target.into()).or_default();
		if !injectors.contains(&injector) {
			injectors.push(injector);
		}
	}

	pub fn len(&self) -> usize {
		self.grammars.len()
	}

	pub fn is_empty(&self) -> bool {
		self.grammars.is_empty()
	}
}

impl GrammarRepository for GrammarSet {
	fn lookup(&self, scope_name: &str) -> Option<Arc<RawGrammar>> {
		self.grammars.get(scope_name).cloned()
	}

	fn injections(&self, scope_name: &str) -> Option<Vec<String>> {
		self.injections.get(scope_name).cloned()
	}
}

/// Builds [`Grammar`]s from a repository and a theme, one per scope name.
pub struct Registry {
	grammars: Arc<dyn GrammarRepository>,
	theme: Arc<dyn ThemeProvider>,
	loaded: Mutex<FxHashMap<String, Arc<Grammar>>>,
}

impl Registry {
	pub fn new(grammars: impl GrammarRepository + 'static, theme: impl ThemeProvider + 'static) -> Self {
		Self {
			grammars: Arc::new(grammars),
			theme: Arc::new(theme),
			loaded: Mutex::new(FxHashMap::default()),
		}
	}

	pub fn repository(&self) -> &Arc<dyn GrammarRepository> {
		&self.grammars
	}

	/// Returns the grammar for `scope_name`, building it on first request.
	///
	/// Later requests for the same scope return the grammar built by the
	/// first one; their `options` are ignored.
	pub fn grammar(&self, scope_name: &str, options: &GrammarOptions) -> Result<Arc<Grammar>> {
		let mut loaded = self.loaded.lock();
		if let Some(grammar) = loaded.get(scope_name) {
			return Ok(Arc::clone(grammar));
		}

		let raw = self
			.grammars
			.lookup(scope_name)
			.ok_or_else(|| TextMateError::GrammarNotFound(scope_name.to_owned()))?;
		let grammar = Arc::new(Grammar::new(
			&raw,
			options,
			Arc::clone(&self.grammars),
			Arc::clone(&self.theme),
		));
		loaded.insert(scope_name.to_owned(), Arc::clone(&grammar));
		Ok(grammar)
	}
}
