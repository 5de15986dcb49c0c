//! Regex sources and first-match scanning.

use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, LazyLock, OnceLock};

use fancy_regex::Regex;
use smallvec::SmallVec;

use super::RuleId;

static BACK_REFERENCE: LazyLock<regex::Regex> =
	LazyLock::new(|| regex::Regex::new(r"\\(\d+)").expect("back reference pattern is valid"));

/// Stand-in for a disallowed `\A` or `\G` anchor. Lines never contain it.
const NEVER_MATCHES: char = '\u{FFFF}';

/// Byte range of one capture group within the scanned line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSpan {
	pub start: usize,
	pub end: usize,
}

impl CaptureSpan {
	pub fn len(self) -> usize {
		self.end - self.start
	}

	pub fn is_empty(self) -> bool {
		self.start == self.end
	}
}

/// All groups of one match; index 0 is the whole match. Unmatched groups are
/// `None`.
pub type CaptureSpans = SmallVec<[Option<CaptureSpan>; 8]>;

/// A rule pattern prepared for scanning.
///
/// Sources mentioning `\A` or `\G` keep one compiled variant per
/// (allow-A, allow-G) combination. Every variant is compiled on first use.
pub struct RegexSource {
	source: String,
	has_anchor: bool,
	has_back_references: bool,
	compiled: [OnceLock<Option<Regex>>; 4],
}

impl RegexSource {
	pub fn new(pattern: &str) -> Self {
		let (source, has_anchor) = rewrite_anchors(pattern);
		let has_back_references = BACK_REFERENCE.is_match(&source);
		Self {
			source,
			has_anchor,
			has_back_references,
			compiled: Default::default(),
		}
	}

	pub fn source(&self) -> &str {
		&self.source
	}

	pub fn has_anchor(&self) -> bool {
		self.has_anchor
	}

	pub fn has_back_references(&self) -> bool {
		self.has_back_references
	}

	/// Substitutes `\N` with the escaped text of group N of a begin match.
	///
	/// Groups that did not participate become empty.
	pub fn resolve_back_references(&self, line: &str, captures: &[Option<CaptureSpan>]) -> String {
		BACK_REFERENCE
			.replace_all(&self.source, |caps: &regex::Captures<'_>| {
				let text = caps[1]
					.parse::<usize>()
					.ok()
					.and_then(|i| captures.get(i).copied().flatten())
					.map_or("", |span| &line[span.start..span.end]);
				escape(text)
			})
			.into_owned()
	}

	/// Searches `text` from byte `pos`, returning the whole-match span and all
	/// group spans.
	///
	/// Invalid patterns and engine errors (e.g. backtrack limits) count as no
	/// match.
	pub fn search(&self, text: &str, pos: usize, allow_a: bool, allow_g: bool) -> Option<(CaptureSpan, CaptureSpans)> {
		let regex = self.regex(allow_a, allow_g)?;
		let caps = match regex.captures_from_pos(text, pos) {
			Ok(caps) => caps?,
			Err(err) => {
				tracing::trace!(pattern = %self.source, %err, "regex search failed");
				return None;
			}
		};
		let whole = caps.get(0)?;
		let spans = (0..caps.len())
			.map(|i| caps.get(i).map(|m| CaptureSpan { start: m.start(), end: m.end() }))
			.collect();
		Some((CaptureSpan { start: whole.start(), end: whole.end() }, spans))
	}

	fn regex(&self, allow_a: bool, allow_g: bool) -> Option<&Regex> {
		let slot = if self.has_anchor {
			(usize::from(allow_a) << 1) | usize::from(allow_g)
		} else {
			0
		};
		self.compiled[slot]
			.get_or_init(|| compile(&self.anchored_source(allow_a, allow_g)))
			.as_ref()
	}

	pub(crate) fn anchored_source(&self, allow_a: bool, allow_g: bool) -> Cow<'_, str> {
		if !self.has_anchor {
			return Cow::Borrowed(&self.source);
		}

		let mut out = String::with_capacity(self.source.len());
		let mut chars = self.source.chars();
		while let Some(c) = chars.next() {
			if c != '\\' {
				out.push(c);
				continue;
			}
			match chars.next() {
				Some('A') if !allow_a => out.push(NEVER_MATCHES),
				Some('G') if !allow_g => out.push(NEVER_MATCHES),
				Some(next) => {
					out.push('\\');
					out.push(next);
				}
				None => out.push('\\'),
			}
		}
		Cow::Owned(out)
	}
}

impl fmt::Debug for RegexSource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("RegexSource").field(&self.source).finish()
	}
}

/// Rewrites `\z` and `\Z` into forms that ignore the appended line
/// terminator, and reports whether `\A` or `\G` occur.
fn rewrite_anchors(pattern: &str) -> (String, bool) {
	let mut out = String::with_capacity(pattern.len());
	let mut has_anchor = false;
	let mut chars = pattern.chars();
	while let Some(c) = chars.next() {
		if c != '\\' {
			out.push(c);
			continue;
		}
		match chars.next() {
			Some('z') => out.push_str(r"$(?!\n)(?<!\n)"),
			Some('Z') => out.push_str(r"(?=\n?\z)"),
			Some(next) => {
				has_anchor |= matches!(next, 'A' | 'G');
				out.push('\\');
				out.push(next);
			}
			None => out.push('\\'),
		}
	}
	(out, has_anchor)
}

fn compile(source: &str) -> Option<Regex> {
	match Regex::new(&format!("(?m){source}")) {
		Ok(regex) => Some(regex),
		Err(err) => {
			tracing::warn!(pattern = source, %err, "invalid regex, rule will never match");
			None
		}
	}
}

/// Escapes captured text for use inside a pattern, including whitespace and
/// `#` so the result still matches literally under `(?x)`.
fn escape(text: &str) -> String {
	let mut out = String::with_capacity(text.len());
	for c in text.chars() {
		if c.is_whitespace()
			|| matches!(
				c,
				'\\' | '.' | '+' | '*' | '?' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$' | '-' | ',' | '#'
			) {
			out.push('\\');
		}
		out.push(c);
	}
	out
}

/// What a scan list entry stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScanTarget {
	/// The begin or match pattern of a rule.
	Rule(RuleId),
	/// The end pattern of the active begin/end rule.
	End,
}

#[derive(Debug, Clone)]
pub(crate) struct ScanEntry {
	pub source: Arc<RegexSource>,
	pub target: ScanTarget,
}

impl ScanEntry {
	pub fn new(source: &Arc<RegexSource>, target: ScanTarget) -> Self {
		Self {
			source: Arc::clone(source),
			target,
		}
	}
}

#[derive(Debug, Clone)]
pub(crate) struct ScanMatch {
	pub target: ScanTarget,
	pub whole: CaptureSpan,
	pub captures: CaptureSpans,
}

/// Returns the entry matching earliest at or after `pos`; ties go to the entry
/// listed first.
///
/// `end_override` replaces the source of the [`ScanTarget::End`] entry, which
/// is how back-reference-resolved end patterns are scanned.
pub(crate) fn find_next_match(
	entries: &[ScanEntry],
	end_override: Option<&RegexSource>,
	text: &str,
	pos: usize,
	allow_a: bool,
	allow_g: bool,
) -> Option<ScanMatch> {
	let mut best: Option<ScanMatch> = None;
	for entry in entries {
		let source = match (entry.target, end_override) {
			(ScanTarget::End, Some(resolved)) => resolved,
			_ => &*entry.source,
		};
		let Some((whole, captures)) = source.search(text, pos, allow_a, allow_g) else {
			continue;
		};
		if best.as_ref().is_some_and(|b| b.whole.start <= whole.start) {
			continue;
		}
		best = Some(ScanMatch {
			target: entry.target,
			whole,
			captures,
		});
		if whole.start == pos {
			break;
		}
	}
	best
}
