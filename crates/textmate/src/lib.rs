// Tokenizer diagnostics go through tracing, never stderr
#![deny(clippy::print_stderr)]

//! Line-incremental TextMate grammar tokenizer
//!
//! A [`Grammar`] turns one line of text plus the [`StateStack`] left by the
//! previous line into scoped tokens and the state for the next line. States
//! are immutable and shared, so any line can be re-tokenized from the state
//! stored for the line above it.
//!
//! # Architecture
//!
//! * [`raw`]: serde schema of grammar definitions
//! * [`rule`]: compiled rules, regex sources and first-match scanning
//! * [`registry`]: grammar lookup for includes and injections, and grammar construction
//! * [`grammar`]: compile-once grammars and the tokenize entry points
//! * [`stack`]: persistent rule and scope stacks
//! * [`attributes`]: bit-packed token metadata
//! * [`scope_attributes`]: language and token type per scope name
//! * [`brackets`]: bracket-pair eligibility
//! * [`theme`]: style lookup seam
//!
//! Scope selectors (injections, token type overrides, bracket selectors) are
//! compiled by `scopeline-selector`.

pub mod attributes;
pub mod brackets;
pub mod error;
pub mod grammar;
pub mod raw;
pub mod registry;
pub mod rule;
pub mod scope_attributes;
pub mod stack;
pub mod theme;
mod tokenizer;

pub use attributes::{EncodedTokenAttributes, FontStyle, LanguageId, StandardTokenType, StyleAttributes};
pub use brackets::BalancedBracketSelectors;
pub use error::{Result, TextMateError};
pub use grammar::{Grammar, GrammarOptions, Injection, Token, TokenizeLineResult};
pub use raw::{RawGrammar, RawRule};
pub use registry::{GrammarRepository, GrammarSet, Registry};
pub use rule::RuleId;
pub use stack::{AttributedScopeStack, StateStack};
pub use theme::{PlainTheme, ThemeProvider};
