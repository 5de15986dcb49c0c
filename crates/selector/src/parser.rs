use crate::lexer::{is_identifier, tokenize};
use crate::matcher::{Matcher, MatcherWithPriority, Priority};

/// Compiles `selector` into one matcher per top-level `,` branch.
///
/// A branch without its own `L:`/`R:` prefix keeps the priority of the branch
/// before it, so `L:a, b` yields two left-priority matchers. An empty selector
/// yields no matchers.
pub fn create_matchers(selector: &str) -> Vec<MatcherWithPriority> {
	let mut parser = Parser::new(selector);
	let mut results = Vec::new();
	let mut priority = Priority::Normal;

	while let Some(token) = parser.token {
		if token.len() == 2 && token.ends_with(':') {
			priority = match token.as_bytes()[0] {
				b'L' => Priority::Left,
				b'R' => Priority::Right,
				_ => Priority::Normal,
			};
			parser.advance();
		}

		let matcher = parser.parse_conjunction();
		results.push(MatcherWithPriority { matcher, priority });

		if parser.token != Some(",") {
			break;
		}
		parser.advance();
	}

	results
}

struct Parser<'a> {
	tokens: std::vec::IntoIter<&'a str>,
	token: Option<&'a str>,
}

impl<'a> Parser<'a> {
	fn new(selector: &'a str) -> Self {
		let mut tokens = tokenize(selector).collect::<Vec<_>>().into_iter();
		let token = tokens.next();
		Self { tokens, token }
	}

	fn advance(&mut self) {
		self.token = self.tokens.next();
	}

	fn at_separator(&self) -> bool {
		matches!(self.token, Some("|" | ","))
	}

	fn parse_operand(&mut self) -> Option<Matcher> {
		let token = self.token?;
		match token {
			"-" => {
				self.advance();
				let operand = self.parse_operand();
				Some(Matcher::Not(operand.map(Box::new)))
			}
			"(" => {
				self.advance();
				let inner = self.parse_inner_expression();
				if self.token == Some(")") {
					self.advance();
				}
				Some(inner)
			}
			_ if is_identifier(token) => {
				let mut identifiers = Vec::new();
				while let Some(token) = self.token.filter(|t| is_identifier(t)) {
					identifiers.push(token.to_owned());
					self.advance();
				}
				Some(Matcher::Path(identifiers.into_boxed_slice()))
			}
			_ => None,
		}
	}

	fn parse_conjunction(&mut self) -> Matcher {
		let mut operands = Vec::new();
		while let Some(operand) = self.parse_operand() {
			operands.push(operand);
		}
		match operands.len() {
			1 => operands.pop().unwrap_or(Matcher::All(Vec::new())),
			_ => Matcher::All(operands),
		}
	}

	fn parse_inner_expression(&mut self) -> Matcher {
		let mut branches = vec![self.parse_conjunction()];
		while self.at_separator() {
			while self.at_separator() {
				self.advance();
			}
			branches.push(self.parse_conjunction());
		}
		Matcher::Any(branches)
	}
}
