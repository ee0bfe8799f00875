//! Word-frequency summaries of free-text answers.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{HashMap, HashSet};

use crate::models::analytics::{TextSummary, WordCount};

pub const DEFAULT_TOP_WORDS: usize = 3;

lazy_static! {
    static ref NON_WORD_RE: Regex = Regex::new(r"[^\p{L}\p{N}\s']").expect("valid regex");
    static ref STOP_WORDS: HashSet<&'static str> = [
        "the", "a", "an", "and", "or", "but", "if", "then", "so", "of", "to", "in", "on", "for",
        "with", "at", "by", "from", "as", "is", "it", "this", "that", "these", "those", "i",
        "you", "we", "they", "he", "she", "them", "us", "me", "my", "your", "our", "their", "be",
        "are", "was", "were", "am", "not", "no", "yes",
    ]
    .into_iter()
    .collect();
}

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(word)
}

/// Lowercases, blanks out everything but letters, digits, whitespace and
/// apostrophes, then splits on whitespace.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    NON_WORD_RE
        .replace_all(&lowered, " ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Most frequent non-stop-words across `answers`, each answer weighted by its
/// occurrence count. Equal counts keep first-seen order.
pub fn top_n_words<I, S>(answers: I, n: usize) -> Vec<WordCount>
where
    I: IntoIterator<Item = (S, u64)>,
    S: AsRef<str>,
{
    let mut order: Vec<(String, u64)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (answer, weight) in answers {
        for token in tokenize(answer.as_ref()) {
            if is_stop_word(&token) {
                continue;
            }
            match index.get(&token) {
                Some(&slot) => order[slot].1 += weight,
                None => {
                    index.insert(token.clone(), order.len());
                    order.push((token, weight));
                }
            }
        }
    }

    // stable sort keeps insertion order among ties
    order.sort_by(|a, b| b.1.cmp(&a.1));
    order
        .into_iter()
        .take(n)
        .map(|(word, count)| WordCount { word, count })
        .collect()
}

/// Mean token length over all tokens, stop-words included, weighted by
/// occurrence count and rounded to 2 decimals. 0 when there are no tokens.
pub fn average_word_length<I, S>(answers: I) -> f64
where
    I: IntoIterator<Item = (S, u64)>,
    S: AsRef<str>,
{
    let mut chars: u64 = 0;
    let mut words: u64 = 0;

    for (answer, weight) in answers {
        let tokens = tokenize(answer.as_ref());
        let token_chars: u64 = tokens.iter().map(|t| t.chars().count() as u64).sum();
        chars += token_chars * weight;
        words += tokens.len() as u64 * weight;
    }

    if words == 0 {
        return 0.0;
    }
    round2(chars as f64 / words as f64)
}

/// Treats each answer in a plain list as occurring once.
pub fn once<'a>(answers: &'a [String]) -> impl Iterator<Item = (&'a str, u64)> + Clone + 'a {
    answers.iter().map(|a| (a.as_str(), 1))
}

/// Summary over an answer -> occurrence map such as a question distribution.
pub fn summarize<'a, I>(distribution: I) -> TextSummary
where
    I: IntoIterator<Item = (&'a String, &'a u64)> + Clone,
{
    let weighted = |pairs: I| pairs.into_iter().map(|(text, count)| (text.as_str(), *count));
    TextSummary {
        top_words: top_n_words(weighted(distribution.clone()), DEFAULT_TOP_WORDS),
        average_word_length: average_word_length(weighted(distribution)),
    }
}

/// Two decimals, halves rounded towards positive infinity.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0 + 0.5).floor() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_tokenize_strips_punctuation_keeps_apostrophes() {
        assert_eq!(
            tokenize("Great service, didn't wait!"),
            vec!["great", "service", "didn't", "wait"]
        );
        assert_eq!(tokenize("  ...  "), Vec::<String>::new());
    }

    #[test]
    fn test_tokenize_keeps_unicode_letters_and_digits() {
        assert_eq!(tokenize("Café №5 ünd 42"), vec!["café", "5", "ünd", "42"]);
    }

    #[test]
    fn test_top_word_weighted_by_occurrence() {
        let mut answers = BTreeMap::new();
        answers.insert("great service".to_string(), 2u64);
        answers.insert("service was great".to_string(), 1u64);

        let top = top_n_words(answers.iter().map(|(k, v)| (k.as_str(), *v)), 1);
        assert_eq!(top.len(), 1);
        assert!(top[0].word == "great" || top[0].word == "service");
        assert_eq!(top[0].count, 3);
    }

    #[test]
    fn test_stop_words_excluded_from_frequency() {
        let answers = vec!["the food was good".to_string(), "THE view".to_string()];
        let top = top_n_words(once(&answers), 10);
        let words: Vec<&str> = top.iter().map(|w| w.word.as_str()).collect();
        assert_eq!(words, vec!["food", "good", "view"]);
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let answers = vec!["zebra apple".to_string(), "mango".to_string()];
        let top = top_n_words(once(&answers), 3);
        let words: Vec<&str> = top.iter().map(|w| w.word.as_str()).collect();
        assert_eq!(words, vec!["zebra", "apple", "mango"]);
    }

    #[test]
    fn test_average_word_length() {
        let mut answers = BTreeMap::new();
        answers.insert("hi there".to_string(), 1u64);
        assert_eq!(summarize(&answers).average_word_length, 3.5);
    }

    #[test]
    fn test_average_word_length_counts_stop_words_and_weights() {
        // "a" (1) + "cat" (3), weighted twice, plus "mouse" (5) once
        let weighted = vec![("a cat", 2u64), ("mouse", 1u64)];
        assert_eq!(average_word_length(weighted), round2(13.0 / 5.0));
    }

    #[test]
    fn test_no_tokens_yields_zero() {
        let empty: Vec<String> = Vec::new();
        assert_eq!(average_word_length(once(&empty)), 0.0);
        assert!(top_n_words(once(&empty), 3).is_empty());

        let punctuation = vec!["!!!".to_string()];
        assert_eq!(average_word_length(once(&punctuation)), 0.0);
    }
}
