//! Standalone generator listings and hex word text.

use memtest_core::{ConfigError, LfsrConfig, SequenceGenerator, Word, MAX_WORD_BITS};

/// Hex digits needed for a `bits`-wide word.
#[must_use]
pub const fn hex_digits(bits: u8) -> usize {
    (bits as usize).div_ceil(4)
}

/// Formats `word` as zero-padded lowercase hex sized for `bits`.
#[must_use]
pub fn hex_word(word: Word, bits: u8) -> String {
    format!("{word:0width$x}", width = hex_digits(bits))
}

/// Parses hex text with an optional `0x` prefix into a word.
///
/// # Errors
///
/// Returns a message when the text is empty, not hex, or wider than a word.
pub fn parse_hex_word(text: &str) -> Result<Word, String> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    if digits.is_empty() {
        return Err(format!("empty hex word: {text:?}"));
    }
    if digits.len() > hex_digits(MAX_WORD_BITS) {
        return Err(format!("hex word wider than {MAX_WORD_BITS} bits: {text}"));
    }
    Word::from_str_radix(digits, 16).map_err(|e| format!("invalid hex word {text:?}: {e}"))
}

/// First `count` words a freshly reset generator presents, starting with the
/// post-reset output.
///
/// # Errors
///
/// Returns a [`ConfigError`] when `config` fails validation.
pub fn generator_words(config: &LfsrConfig, count: usize) -> Result<Vec<Word>, ConfigError> {
    let mut generator = SequenceGenerator::new(config)?;
    let mut words = Vec::with_capacity(count);
    if count > 0 {
        words.push(generator.output());
        words.extend((1..count).map(|_| generator.advance()));
    }
    Ok(words)
}
