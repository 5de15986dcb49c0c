//! Persistent parse state threaded from line to line.
//!
//! Both stacks are immutable `Arc` chains: pushing allocates a node that points
//! at the shared parent, popping hands back the parent. A state returned for
//! one line can be fed to any number of later calls, from any thread.

mod scopes;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub use self::scopes::{AttributedScopeStack, ScopeEncoder};
use crate::rule::{RegexSource, RuleId};

static NEXT_SCAN: AtomicU64 = AtomicU64::new(1);

/// Identifies one top-level tokenize call.
///
/// Scan positions stored in a state node are only meaningful to the call that
/// wrote them; any other call reads them as unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ScanId(u64);

impl ScanId {
	pub(crate) fn next() -> Self {
		Self(NEXT_SCAN.fetch_add(1, Ordering::Relaxed))
	}
}

/// Fields of a node pushed onto a [`StateStack`].
pub(crate) struct Frame {
	pub rule_id: RuleId,
	pub enter_pos: Option<usize>,
	pub anchor_pos: Option<usize>,
	pub begin_rule_captured_eol: bool,
	pub end_rule: Option<Arc<RegexSource>>,
	pub name_scopes: AttributedScopeStack,
	pub content_name_scopes: AttributedScopeStack,
}

/// The chain of open rules at the end of a line.
#[derive(Clone)]
pub struct StateStack(Arc<StateNode>);

struct StateNode {
	parent: Option<StateStack>,
	depth: usize,
	scan: ScanId,
	frame: Frame,
}

impl StateStack {
	pub(crate) fn root(rule_id: RuleId, scopes: AttributedScopeStack, scan: ScanId) -> Self {
		Self::with_parent(
			None,
			Frame {
				rule_id,
				enter_pos: None,
				anchor_pos: None,
				begin_rule_captured_eol: false,
				end_rule: None,
				name_scopes: scopes.clone(),
				content_name_scopes: scopes,
			},
			scan,
		)
	}

	fn with_parent(parent: Option<StateStack>, frame: Frame, scan: ScanId) -> Self {
		let depth = parent.as_ref().map_or(1, |p| p.depth() + 1);
		Self(Arc::new(StateNode {
			parent,
			depth,
			scan,
			frame,
		}))
	}

	pub fn parent(&self) -> Option<&StateStack> {
		self.0.parent.as_ref()
	}

	/// Number of nodes in the chain; the root has depth 1.
	pub fn depth(&self) -> usize {
		self.0.depth
	}

	pub fn rule_id(&self) -> RuleId {
		self.0.frame.rule_id
	}

	pub fn begin_rule_captured_eol(&self) -> bool {
		self.0.frame.begin_rule_captured_eol
	}

	/// Back-reference-resolved end or while pattern of this level, if any.
	pub fn end_rule(&self) -> Option<&str> {
		self.0.frame.end_rule.as_deref().map(RegexSource::source)
	}

	pub(crate) fn end_rule_source(&self) -> Option<&RegexSource> {
		self.0.frame.end_rule.as_deref()
	}

	pub fn name_scopes(&self) -> &AttributedScopeStack {
		&self.0.frame.name_scopes
	}

	pub fn content_name_scopes(&self) -> &AttributedScopeStack {
		&self.0.frame.content_name_scopes
	}

	/// Scope path applied to text at this level, outermost first.
	pub fn scope_names(&self) -> Vec<&str> {
		self.content_name_scopes().scope_names()
	}

	pub(crate) fn enter_pos(&self, scan: ScanId) -> Option<usize> {
		if self.0.scan == scan { self.0.frame.enter_pos } else { None }
	}

	pub(crate) fn anchor_pos(&self, scan: ScanId) -> Option<usize> {
		if self.0.scan == scan { self.0.frame.anchor_pos } else { None }
	}

	pub(crate) fn push(&self, frame: Frame, scan: ScanId) -> Self {
		Self::with_parent(Some(self.clone()), frame, scan)
	}

	pub(crate) fn pop(&self) -> Option<StateStack> {
		self.0.parent.clone()
	}

	/// Like [`pop`](Self::pop), but the root pops to itself.
	pub(crate) fn safe_pop(&self) -> StateStack {
		self.pop().unwrap_or_else(|| self.clone())
	}

	/// Replaces this node, keeping its parent and scan positions.
	fn replace(&self, update: impl FnOnce(&mut Frame)) -> Self {
		let f = &self.0.frame;
		let mut frame = Frame {
			rule_id: f.rule_id,
			enter_pos: f.enter_pos,
			anchor_pos: f.anchor_pos,
			begin_rule_captured_eol: f.begin_rule_captured_eol,
			end_rule: f.end_rule.clone(),
			name_scopes: f.name_scopes.clone(),
			content_name_scopes: f.content_name_scopes.clone(),
		};
		update(&mut frame);
		Self::with_parent(self.0.parent.clone(), frame, self.0.scan)
	}

	pub(crate) fn with_content_name_scopes(&self, scopes: AttributedScopeStack) -> Self {
		if self.content_name_scopes().ptr_eq(&scopes) {
			return self.clone();
		}
		self.replace(|frame| frame.content_name_scopes = scopes)
	}

	pub(crate) fn with_end_rule(&self, end_rule: Arc<RegexSource>) -> Self {
		if self.end_rule() == Some(end_rule.source()) {
			return self.clone();
		}
		self.replace(|frame| frame.end_rule = Some(end_rule))
	}

	/// Whether an ancestor entered at the same position as `other` runs the
	/// same rule, i.e. pushing `other` made no progress.
	pub(crate) fn has_same_rule_as(&self, other: &StateStack, scan: ScanId) -> bool {
		let target = other.enter_pos(scan);
		let mut node = Some(self);
		while let Some(current) = node {
			if current.enter_pos(scan) != target {
				break;
			}
			if current.rule_id() == other.rule_id() {
				return true;
			}
			node = current.parent();
		}
		false
	}

	fn structural_eq(&self, other: &StateStack) -> bool {
		let (mut a, mut b) = (Some(self), Some(other));
		loop {
			match (a, b) {
				(None, None) => return true,
				(Some(x), Some(y)) => {
					if Arc::ptr_eq(&x.0, &y.0) {
						return true;
					}
					if x.depth() != y.depth() || x.rule_id() != y.rule_id() || x.end_rule() != y.end_rule() {
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

/// Two states are equal when they have the same rule nesting and end patterns
/// and apply the same content scopes.
impl PartialEq for StateStack {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
			|| (self.structural_eq(other) && self.content_name_scopes() == other.content_name_scopes())
	}
}

impl Eq for StateStack {}

impl fmt::Debug for StateStack {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut rules = Vec::with_capacity(self.depth());
		let mut node = Some(self);
		while let Some(current) = node {
			rules.push(current.rule_id());
			node = current.parent();
		}
		rules.reverse();
		f.debug_struct("StateStack")
			.field("rules", &rules)
			.field("end_rule", &self.end_rule())
			.field("scopes", &self.scope_names())
			.finish()
	}
}
