//! Word-level OCR accuracy against a known transcription

/// Percentage of words OCR got right, from the word-level edit distance.
///
/// Both texts are split on whitespace. Two empty texts are a perfect match.
pub fn word_accuracy(text: &str, reference: &str) -> f64 {
    let words: Vec<&str> = text.split_whitespace().collect();
    let expected: Vec<&str> = reference.split_whitespace().collect();

    let longest = words.len().max(expected.len());
    if longest == 0 {
        return 100.0;
    }

    let distance = edit_distance(&words, &expected);
    (longest - distance) as f64 / longest as f64 * 100.0
}

/// Levenshtein distance over whole tokens, two-row formulation
fn edit_distance<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut row = vec![0; b.len() + 1];

    for (i, left) in a.iter().enumerate() {
        row[0] = i + 1;
        for (j, right) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(left != right);
            row[j + 1] = substitution.min(prev[j + 1] + 1).min(row[j] + 1);
        }
        std::mem::swap(&mut prev, &mut row);
    }

    prev[b.len()]
}
