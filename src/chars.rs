//! Character classes for the expression tokenizer.
//!
//! ASCII characters are looked up in a fixed table. Everything above
//! ASCII counts as an identifier character unless it is whitespace or
//! one of the typographic quotes, which act as word boundaries.

const IDENTIFIER: u8 = 1;
const BLANK: u8 = 2;
const QUOTE: u8 = 4;
const INLINE_BLANK: u8 = 8;
const NUMBER: u8 = 16;
const SIGN: u8 = 32;

const TABLE: [u8; 128] = build_table();

#[allow(clippy::cast_possible_truncation)]
const fn build_table() -> [u8; 128] {
    let mut table = [0u8; 128];
    let mut i = 0;
    while i < 128 {
        let c = i as u8;
        let mut class = 0;
        if c.is_ascii_alphanumeric() || c == b'_' || c == b'-' || c == b'?' {
            class |= IDENTIFIER;
        }
        if c.is_ascii_digit() {
            class |= NUMBER;
        }
        if matches!(c, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c) {
            class |= BLANK;
        }
        if matches!(c, b' ' | b'\t' | b'\r') {
            class |= INLINE_BLANK;
        }
        if matches!(c, b'\'' | b'"') {
            class |= QUOTE;
        }
        if matches!(c, b'-' | b'+') {
            class |= SIGN;
        }
        table[i] = class;
        i += 1;
    }
    table
}

/// Typographic quotes and guillemets, treated as boundaries.
const SMART_QUOTES: [char; 6] = [
    '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}',
];

fn class(c: char) -> u8 {
    if c.is_ascii() {
        TABLE[c as usize]
    } else if c.is_whitespace() {
        BLANK | INLINE_BLANK
    } else if SMART_QUOTES.contains(&c) {
        0
    } else {
        IDENTIFIER
    }
}

#[must_use]
pub fn is_word(c: char) -> bool {
    class(c) & IDENTIFIER != 0
}

#[must_use]
pub fn is_blank(c: char) -> bool {
    class(c) & BLANK != 0
}

#[must_use]
pub fn is_inline_blank(c: char) -> bool {
    class(c) & INLINE_BLANK != 0
}

#[must_use]
pub fn is_quote(c: char) -> bool {
    class(c) & QUOTE != 0
}

#[must_use]
pub fn is_digit(c: char) -> bool {
    class(c) & NUMBER != 0
}

#[must_use]
pub fn is_sign(c: char) -> bool {
    class(c) & SIGN != 0
}
