//! TextMate scope selectors.
//!
//! A selector such as `L:source.js meta.tag -comment, text.html` compiles into
//! one [`Matcher`] per top-level `,` branch. Each matcher is a predicate over a
//! scope path (outermost scope first) and carries the [`Priority`] declared by
//! an `L:`/`R:` prefix.
//!
//! * [`create_matchers`]: parses a selector
//! * [`Matcher::matches`]: evaluates a compiled selector against a scope path
//! * [`scopes_are_matching`]: dotted-prefix comparison of a single scope

mod lexer;
mod matcher;
mod parser;

pub use matcher::{Matcher, MatcherWithPriority, Priority, scopes_are_matching};
pub use parser::create_matchers;

#[cfg(test)]
mod tests;
