//! The per-line matching loop.
//!
//! Starting from the state of the previous line, the loop repeatedly searches
//! the active rule's scan list (plus applicable injections) from the cursor,
//! emits the text before the winning match, and pushes, pops or stays
//! according to the kind of rule that matched.

mod line_tokens;

use std::sync::Arc;
use std::time::{Duration, Instant};

use scopeline_selector::Priority;
use tracing::trace;

pub(crate) use self::line_tokens::{LineTokens, OutputMode};
use crate::error::Result;
use crate::grammar::{CompiledGrammar, Grammar};
use crate::rule::{CaptureRule, CaptureSpan, RegexSource, RuleKind, ScanMatch, ScanTarget, find_next_match};
use crate::stack::{AttributedScopeStack, Frame, ScanId, ScopeEncoder, StateStack};

/// Cursor into the scanned text.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LinePosition {
	pub pos: usize,
	/// `\A` may match at the cursor.
	pub is_first_line: bool,
}

pub(crate) struct StringOutcome {
	pub stack: StateStack,
	pub stopped_early: bool,
}

struct WhileOutcome {
	stack: StateStack,
	at: LinePosition,
	anchor: Option<usize>,
}

/// What the loop does after handling a match.
enum Step {
	Continue,
	Stop,
}

/// A match selected for dispatch, either from the active rule or from an
/// injection.
struct Candidate {
	found: ScanMatch,
	/// Injection declared with `L:` priority.
	left_priority: bool,
}

#[derive(Clone, Copy)]
pub(crate) struct Tokenizer<'g> {
	compiled: &'g CompiledGrammar,
	encoder: ScopeEncoder<'g>,
	scan: ScanId,
	started: Instant,
	time_limit: Option<Duration>,
}

impl<'g> Tokenizer<'g> {
	pub(crate) fn new(
		grammar: &'g Grammar,
		compiled: &'g CompiledGrammar,
		scan: ScanId,
		started: Instant,
		time_limit: Option<Duration>,
	) -> Self {
		Self {
			compiled,
			encoder: grammar.encoder(),
			scan,
			started,
			time_limit,
		}
	}

	fn out_of_time(&self) -> bool {
		self.time_limit.is_some_and(|limit| self.started.elapsed() > limit)
	}

	/// Tokenizes `line` from `at` until the end of the line, a point where no
	/// rule matches, or the time budget runs out.
	///
	/// Every exit leaves `tokens` covering the whole of `line`.
	pub(crate) fn tokenize_string(
		&self,
		line: &str,
		at: LinePosition,
		stack: StateStack,
		tokens: &mut LineTokens<'_>,
		check_while: bool,
	) -> Result<StringOutcome> {
		let mut state = LoopState {
			line,
			at,
			stack,
			anchor: None,
		};

		if check_while {
			let checked = self.check_while_conditions(line, at, state.stack, tokens)?;
			state.stack = checked.stack;
			state.at = checked.at;
			state.anchor = checked.anchor;
		}

		loop {
			if self.out_of_time() {
				trace!(pos = state.at.pos, len = line.len(), "time budget exhausted, line tail left untokenized");
				tokens.produce(&state.stack, line.len());
				return Ok(StringOutcome {
					stack: state.stack,
					stopped_early: true,
				});
			}

			if matches!(self.scan_next(&mut state, tokens)?, Step::Stop) {
				return Ok(StringOutcome {
					stack: state.stack,
					stopped_early: false,
				});
			}
		}
	}

	fn scan_next(&self, state: &mut LoopState<'_>, tokens: &mut LineTokens<'_>) -> Result<Step> {
		let line = state.line;
		let line_len = line.len();
		let pos = state.at.pos;

		let Some(found) = self.match_rule_or_injections(state)? else {
			tokens.produce(&state.stack, line_len);
			return Ok(Step::Stop);
		};
		let ScanMatch { target, whole, captures } = found;
		let advanced = whole.end > pos;

		match target {
			ScanTarget::End => {
				let popped_rule = self.compiled.rules.get(state.stack.rule_id())?;
				tokens.produce(&state.stack, whole.start);
				let ending = state
					.stack
					.with_content_name_scopes(state.stack.name_scopes().clone());
				self.handle_captures(line, state.at.is_first_line, &ending, tokens, popped_rule.end_captures(), &captures)?;
				tokens.produce(&ending, whole.end);

				state.anchor = ending.anchor_pos(self.scan);
				if !advanced && ending.enter_pos(self.scan) == Some(pos) {
					// Popping without progress would re-enter the same rule forever.
					state.stack = ending;
					tokens.produce(&state.stack, line_len);
					return Ok(Step::Stop);
				}
				state.stack = ending.safe_pop();
			}
			ScanTarget::Rule(id) => {
				let rule = self.compiled.rules.get(id)?;
				tokens.produce(&state.stack, whole.start);
				let before_push = state.stack.clone();

				let name = rule.resolve_name(line, &captures);
				let name_scopes = state
					.stack
					.content_name_scopes()
					.push_attributed(name.as_deref(), self.encoder);
				state.stack = state.stack.push(
					Frame {
						rule_id: id,
						enter_pos: Some(pos),
						anchor_pos: state.anchor,
						begin_rule_captured_eol: whole.end == line_len,
						end_rule: None,
						name_scopes: name_scopes.clone(),
						content_name_scopes: name_scopes.clone(),
					},
					self.scan,
				);

				match rule.kind() {
					RuleKind::BeginEnd {
						begin_captures,
						end: end_source,
						..
					}
					| RuleKind::BeginWhile {
						begin_captures,
						condition: end_source,
						..
					} => {
						self.handle_captures(line, state.at.is_first_line, &state.stack, tokens, begin_captures, &captures)?;
						tokens.produce(&state.stack, whole.end);
						state.anchor = Some(whole.end);

						let content_name = rule.resolve_content_name(line, &captures);
						let content_scopes = name_scopes.push_attributed(content_name.as_deref(), self.encoder);
						state.stack = state.stack.with_content_name_scopes(content_scopes);
						if end_source.has_back_references() {
							// Lives only as long as the states carrying it.
							let resolved = RegexSource::new(&end_source.resolve_back_references(line, &captures));
							state.stack = state.stack.with_end_rule(Arc::new(resolved));
						}

						if !advanced && before_push.has_same_rule_as(&state.stack, self.scan) {
							// Pushed the same rule at the same position again.
							state.stack = before_push;
							tokens.produce(&state.stack, line_len);
							return Ok(Step::Stop);
						}
					}
					RuleKind::Match { .. } | RuleKind::IncludeOnly { .. } => {
						self.handle_captures(line, state.at.is_first_line, &state.stack, tokens, rule.captures(), &captures)?;
						tokens.produce(&state.stack, whole.end);
						state.stack = state.stack.safe_pop();

						if !advanced {
							// Zero-width match: step over one character so the loop makes progress.
							let Some(next) = next_char_boundary(line, pos) else {
								tokens.produce(&state.stack, line_len);
								return Ok(Step::Stop);
							};
							state.at = LinePosition {
								pos: next,
								is_first_line: false,
							};
							return Ok(Step::Continue);
						}
					}
				}
			}
		}

		if advanced {
			state.at = LinePosition {
				pos: whole.end,
				is_first_line: false,
			};
		}
		Ok(Step::Continue)
	}

	fn match_rule_or_injections(&self, state: &LoopState<'_>) -> Result<Option<ScanMatch>> {
		let pos = state.at.pos;
		let allow_g = state.anchor == Some(pos);
		let entries = self.compiled.rules.scan_entries(state.stack.rule_id())?;
		let normal = find_next_match(
			entries,
			state.stack.end_rule_source(),
			state.line,
			pos,
			state.at.is_first_line,
			allow_g,
		);

		if self.compiled.injections.is_empty() {
			return Ok(normal);
		}
		let Some(injected) = self.match_injections(state, allow_g)? else {
			return Ok(normal);
		};
		let Some(normal) = normal else {
			return Ok(Some(injected.found));
		};

		let injected_start = injected.found.whole.start;
		if injected_start < normal.whole.start || (injected.left_priority && injected_start == normal.whole.start) {
			Ok(Some(injected.found))
		} else {
			Ok(Some(normal))
		}
	}

	/// Best match among the injections whose selector matches the current
	/// content scopes. Earliest start wins, then injection order.
	fn match_injections(&self, state: &LoopState<'_>, allow_g: bool) -> Result<Option<Candidate>> {
		let pos = state.at.pos;
		let scopes = state.stack.scope_names();
		let mut best: Option<Candidate> = None;

		for injection in &self.compiled.injections {
			if !injection.matcher.matches(&scopes) {
				continue;
			}
			let entries = self.compiled.rules.scan_entries(injection.rule_id)?;
			let Some(found) = find_next_match(entries, None, state.line, pos, state.at.is_first_line, allow_g) else {
				continue;
			};
			// The end entry of an injected region belongs to that region, not
			// to the rule active here.
			if found.target == ScanTarget::End {
				continue;
			}
			if best.as_ref().is_some_and(|b| b.found.whole.start <= found.whole.start) {
				continue;
			}

			let at_cursor = found.whole.start == pos;
			best = Some(Candidate {
				found,
				left_priority: injection.priority == Priority::Left,
			});
			if at_cursor {
				break;
			}
		}
		Ok(best)
	}

	/// Checks the while conditions of every open begin/while rule at the
	/// start of a line, outermost first. The first failing condition pops its
	/// rule and everything nested inside it.
	fn check_while_conditions(
		&self,
		line: &str,
		mut at: LinePosition,
		stack: StateStack,
		tokens: &mut LineTokens<'_>,
	) -> Result<WhileOutcome> {
		let mut anchor = stack.begin_rule_captured_eol().then_some(0);

		let mut open = Vec::new();
		let mut node = Some(&stack);
		while let Some(current) = node {
			if let RuleKind::BeginWhile {
				condition,
				while_captures,
				..
			} = self.compiled.rules.get(current.rule_id())?.kind()
			{
				open.push((current.clone(), condition, while_captures));
			}
			node = current.parent();
		}

		let mut result = stack;
		for (frame, condition, while_captures) in open.into_iter().rev() {
			let source: &RegexSource = frame.end_rule_source().unwrap_or(condition);
			let Some((whole, captures)) = source.search(line, at.pos, at.is_first_line, anchor == Some(at.pos)) else {
				result = frame.safe_pop();
				break;
			};

			tokens.produce(&frame, whole.start);
			self.handle_captures(line, at.is_first_line, &frame, tokens, while_captures, &captures)?;
			tokens.produce(&frame, whole.end);
			anchor = Some(whole.end);
			if whole.end > at.pos {
				at = LinePosition {
					pos: whole.end,
					is_first_line: false,
				};
			}
		}

		Ok(WhileOutcome {
			stack: result,
			at,
			anchor,
		})
	}

	/// Emits the capture groups of a match.
	///
	/// Named captures nest through a local stack bounded by their end
	/// offsets. Captures with patterns of their own are tokenized again on
	/// the line cut at the capture end.
	fn handle_captures(
		&self,
		line: &str,
		is_first_line: bool,
		stack: &StateStack,
		tokens: &mut LineTokens<'_>,
		rules: &[Option<CaptureRule>],
		captures: &[Option<CaptureSpan>],
	) -> Result<()> {
		let Some(Some(whole)) = captures.first() else {
			return Ok(());
		};
		let max_end = whole.end;
		let mut local: Vec<(AttributedScopeStack, usize)> = Vec::new();

		for (rule, span) in rules.iter().zip(captures) {
			let (Some(rule), Some(span)) = (rule, span) else {
				continue;
			};
			if span.is_empty() {
				continue;
			}
			if span.start > max_end {
				break;
			}

			while let Some((scopes, end)) = local.last() {
				if *end > span.start {
					break;
				}
				tokens.produce_from_scopes(scopes, *end);
				local.pop();
			}
			match local.last() {
				Some((scopes, _)) => tokens.produce_from_scopes(scopes, span.start),
				None => tokens.produce(stack, span.start),
			}

			if let Some(retokenize) = rule.retokenize {
				let name = rule.name.as_ref().map(|t| t.resolve(line, captures));
				let name_scopes = stack
					.content_name_scopes()
					.push_attributed(name.as_deref(), self.encoder);
				let content_name = rule.content_name.as_ref().map(|t| t.resolve(line, captures));
				let content_scopes = name_scopes.push_attributed(content_name.as_deref(), self.encoder);
				let nested = stack.push(
					Frame {
						rule_id: retokenize,
						enter_pos: Some(span.start),
						anchor_pos: None,
						begin_rule_captured_eol: false,
						end_rule: None,
						name_scopes,
						content_name_scopes: content_scopes,
					},
					self.scan,
				);
				let retokenizer = Tokenizer {
					time_limit: None,
					..*self
				};
				retokenizer.tokenize_string(
					&line[..span.end],
					LinePosition {
						pos: span.start,
						is_first_line: is_first_line && span.start == 0,
					},
					nested,
					tokens,
					false,
				)?;
				continue;
			}

			if let Some(name) = rule.name.as_ref().map(|t| t.resolve(line, captures)) {
				let base = local.last().map_or(stack.content_name_scopes(), |(scopes, _)| scopes);
				let scopes = base.push_attributed(Some(&*name), self.encoder);
				local.push((scopes, span.end));
			}
		}

		while let Some((scopes, end)) = local.pop() {
			tokens.produce_from_scopes(&scopes, end);
		}
		Ok(())
	}
}

/// Mutable cursor state of one `tokenize_string` call.
struct LoopState<'a> {
	line: &'a str,
	at: LinePosition,
	stack: StateStack,
	anchor: Option<usize>,
}

fn next_char_boundary(line: &str, pos: usize) -> Option<usize> {
	line[pos..].chars().next().map(|c| pos + c.len_utf8())
}
