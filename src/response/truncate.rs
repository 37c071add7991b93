//! Sentence-aware truncation for text shown to users

/// Sentence end must fall after this share of the limit to be used
const SENTENCE_CUTOFF: f64 = 0.7;

/// Word break must fall after this share of the limit to be used
const WORD_CUTOFF: f64 = 0.8;

const ELLIPSIS: char = '…';

/// Shorten `text` to at most `limit` characters without ending mid-sentence
/// where possible.
///
/// Within the first `limit` characters:
///
/// 1. cut after the last `.`, `!` or `?` followed by whitespace, if that
///    point lies past 70% of the limit
/// 2. otherwise cut at the last whitespace past 80% and append `…`
/// 3. otherwise cut after the last sentence end anywhere in the window
/// 4. otherwise hard-cut and append `…`
///
/// A sentence end counts only when its following whitespace is also inside
/// the window, so `"A. B. C."` at a limit of 5 gives `"A."`.
pub fn truncate_sentence_aware(text: &str, limit: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= limit {
        return text.to_string();
    }
    if limit == 0 {
        return String::new();
    }

    let window: Vec<char> = text.chars().take(limit).collect();
    let sentence_end = window
        .windows(2)
        .enumerate()
        .filter(|(_, pair)| matches!(pair[0], '.' | '!' | '?') && pair[1].is_whitespace())
        .map(|(i, _)| i + 1)
        .last();
    let last_space = window.iter().rposition(|c| c.is_whitespace());
    let limit_f = limit as f64;

    if let Some(end) = sentence_end.filter(|&end| end as f64 > limit_f * SENTENCE_CUTOFF) {
        return collect(&window[..end]);
    }
    if let Some(space) = last_space.filter(|&space| space as f64 > limit_f * WORD_CUTOFF) {
        let mut out = collect(&window[..space]);
        out.push(ELLIPSIS);
        return out;
    }
    if let Some(end) = sentence_end {
        return collect(&window[..end]);
    }
    let mut out = collect(&window[..limit - 1]);
    out.push(ELLIPSIS);
    out
}

fn collect(chars: &[char]) -> String {
    chars.iter().collect::<String>().trim_end().to_string()
}
