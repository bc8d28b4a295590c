//! Document confidence for engines that report none
//!
//! Recognition models like ocrs return text without scores, so confidence
//! is estimated from how much the text looks like language. Stray symbols
//! gate the score; word shapes and character runs refine it.

/// Score `text` in 0..=1
pub fn text_confidence(text: &str) -> f32 {
    let chars = text.chars().filter(|c| !c.is_whitespace()).count();
    if chars == 0 {
        return 0.0;
    }
    if chars < 4 {
        return 0.5;
    }

    let score = symbol_score(text) * (0.6 * word_shape_score(text) + 0.4 * run_score(text));
    score.clamp(0.0, 1.0)
}

/// Share of characters that are letters, digits or ordinary punctuation
fn symbol_score(text: &str) -> f32 {
    let mut total = 0usize;
    let mut plain = 0usize;
    let mut letters = 0usize;
    for c in text.chars().filter(|c| !c.is_whitespace()) {
        total += 1;
        if c.is_alphanumeric() || c.is_ascii_punctuation() {
            plain += 1;
        }
        if c.is_alphabetic() {
            letters += 1;
        }
    }
    let plain_ratio = plain as f32 / total as f32;
    let letter_ratio = letters as f32 / total as f32;
    // One stray symbol in ten already means the line is mostly noise
    let symbols = (1.0 - (1.0 - plain_ratio) * 10.0).max(0.0);
    0.7 * symbols + 0.3 * (letter_ratio * 1.5).min(1.0)
}

/// Plausibility of the word-length distribution
fn word_shape_score(text: &str) -> f32 {
    let lengths: Vec<usize> = text.split_whitespace().map(|w| w.chars().count()).collect();
    if lengths.is_empty() {
        return 0.0;
    }
    let mean = lengths.iter().sum::<usize>() as f32 / lengths.len() as f32;
    let typical = if (3.0..=9.0).contains(&mean) {
        1.0
    } else if (2.0..=13.0).contains(&mean) {
        0.7
    } else {
        0.3
    };
    let fragments = lengths.iter().filter(|&&l| l == 1).count() as f32 / lengths.len() as f32;
    typical * (1.0 - fragments.min(1.0) * 0.6)
}

/// Penalty for the longest run of one repeated non-space character
fn run_score(text: &str) -> f32 {
    let mut longest = 0usize;
    let mut run = 0usize;
    let mut prev = None;
    for c in text.chars() {
        if !c.is_whitespace() && Some(c) == prev {
            run += 1;
        } else {
            run = 1;
        }
        longest = longest.max(run);
        prev = Some(c);
    }
    match longest {
        0..=3 => 1.0,
        4..=5 => 0.7,
        6..=9 => 0.4,
        _ => 0.1,
    }
}
