//! Bit-packed per-token metadata.
//!
//! ```text
//! bbbb bbbb ffff ffff fFFF FBTT LLLL LLLL
//! L = language id       T = standard token type   B = balanced bracket bit
//! F = font style        f = foreground color id   b = background color id
//! ```

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

const LANGUAGE_ID_MASK: u32 = 0x0000_00FF;
const TOKEN_TYPE_MASK: u32 = 0x0000_0300;
const BALANCED_BRACKETS_MASK: u32 = 0x0000_0400;
const FONT_STYLE_MASK: u32 = 0x0000_7800;
const FOREGROUND_MASK: u32 = 0x00FF_8000;
const BACKGROUND_MASK: u32 = 0xFF00_0000;

const LANGUAGE_ID_OFFSET: u32 = 0;
const TOKEN_TYPE_OFFSET: u32 = 8;
const BALANCED_BRACKETS_OFFSET: u32 = 10;
const FONT_STYLE_OFFSET: u32 = 11;
const FOREGROUND_OFFSET: u32 = 15;
const BACKGROUND_OFFSET: u32 = 24;

/// Embedded language identifier. `0` means "no language".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LanguageId(pub u8);

impl LanguageId {
	pub const NONE: Self = Self(0);
}

/// Coarse token classification used by editors for bracket matching and
/// comment/string detection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StandardTokenType {
	#[default]
	Other = 0,
	Comment = 1,
	String = 2,
	#[serde(alias = "regexp")]
	Regex = 3,
}

impl StandardTokenType {
	fn from_bits(bits: u32) -> Self {
		match bits {
			1 => Self::Comment,
			2 => Self::String,
			3 => Self::Regex,
			_ => Self::Other,
		}
	}
}

bitflags! {
	/// Font style bits. An empty set is an explicit "plain" style; an unset
	/// style is represented by `Option::None` wherever it can occur.
	#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
	pub struct FontStyle: u8 {
		const ITALIC = 1;
		const BOLD = 2;
		const UNDERLINE = 4;
		const STRIKETHROUGH = 8;
	}
}

/// Resolved style of a scope path: font style plus color table ids.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct StyleAttributes {
	pub font_style: Option<FontStyle>,
	pub foreground_id: u32,
	pub background_id: u32,
}

/// Field values to overlay onto [`EncodedTokenAttributes`].
///
/// Defaults (`LanguageId::NONE`, `None`, `0`) leave the existing field alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttributesUpdate {
	pub language_id: LanguageId,
	pub token_type: Option<StandardTokenType>,
	pub balanced_brackets: Option<bool>,
	pub font_style: Option<FontStyle>,
	pub foreground_id: u32,
	pub background_id: u32,
}

/// One packed metadata word per token.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct EncodedTokenAttributes(pub u32);

impl EncodedTokenAttributes {
	pub fn bits(self) -> u32 {
		self.0
	}

	pub fn language_id(self) -> LanguageId {
		LanguageId(((self.0 & LANGUAGE_ID_MASK) >> LANGUAGE_ID_OFFSET) as u8)
	}

	pub fn token_type(self) -> StandardTokenType {
		StandardTokenType::from_bits((self.0 & TOKEN_TYPE_MASK) >> TOKEN_TYPE_OFFSET)
	}

	pub fn contains_balanced_brackets(self) -> bool {
		self.0 & BALANCED_BRACKETS_MASK != 0
	}

	pub fn font_style(self) -> FontStyle {
		FontStyle::from_bits_truncate(((self.0 & FONT_STYLE_MASK) >> FONT_STYLE_OFFSET) as u8)
	}

	pub fn foreground(self) -> u32 {
		(self.0 & FOREGROUND_MASK) >> FOREGROUND_OFFSET
	}

	pub fn background(self) -> u32 {
		(self.0 & BACKGROUND_MASK) >> BACKGROUND_OFFSET
	}

	/// Returns a copy with every non-default field of `update` applied.
	///
	/// Color ids wider than their field are truncated.
	#[must_use]
	pub fn set(self, update: AttributesUpdate) -> Self {
		let mut language_id = self.language_id().0 as u32;
		let mut token_type = self.token_type() as u32;
		let mut balanced = self.contains_balanced_brackets() as u32;
		let mut font_style = self.font_style().bits() as u32;
		let mut foreground = self.foreground();
		let mut background = self.background();

		if update.language_id != LanguageId::NONE {
			language_id = update.language_id.0 as u32;
		}
		if let Some(ty) = update.token_type {
			token_type = ty as u32;
		}
		if let Some(b) = update.balanced_brackets {
			balanced = b as u32;
		}
		if let Some(style) = update.font_style {
			font_style = style.bits() as u32;
		}
		if update.foreground_id != 0 {
			foreground = update.foreground_id;
		}
		if update.background_id != 0 {
			background = update.background_id;
		}

		Self(
			((language_id << LANGUAGE_ID_OFFSET) & LANGUAGE_ID_MASK)
				| ((token_type << TOKEN_TYPE_OFFSET) & TOKEN_TYPE_MASK)
				| ((balanced << BALANCED_BRACKETS_OFFSET) & BALANCED_BRACKETS_MASK)
				| ((font_style << FONT_STYLE_OFFSET) & FONT_STYLE_MASK)
				| ((foreground << FOREGROUND_OFFSET) & FOREGROUND_MASK)
				| ((background << BACKGROUND_OFFSET) & BACKGROUND_MASK),
		)
	}
}

impl fmt::Debug for EncodedTokenAttributes {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("EncodedTokenAttributes")
			.field("language_id", &self.language_id().0)
			.field("token_type", &self.token_type())
			.field("balanced_brackets", &self.contains_balanced_brackets())
			.field("font_style", &self.font_style())
			.field("foreground", &self.foreground())
			.field("background", &self.background())
			.finish()
	}
}
