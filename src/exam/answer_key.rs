//! Answer key parsing and the answer join.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use unicode_normalization::UnicodeNormalization;

use crate::error::{Error, Result};
use crate::model::Letter;

/// Looks up the correct letter for a question number.
///
/// The record assembler only depends on this trait, so a join keyed on
/// something sturdier than position can replace [`AnswerKey`].
pub trait AnswerJoin {
    /// Answer for a question, if the join knows one.
    fn answer_for(&self, number: u32) -> Option<Letter>;
}

/// Letters isolated as whole words.
fn word_token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[ABCD]\b").expect("valid regex"))
}

/// Any occurrence of a letter.
fn bare_token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ABCD]").expect("valid regex"))
}

/// Positional answer key: the n-th letter answers question n.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerKey {
    answers: Vec<Letter>,
}

impl AnswerKey {
    /// Parse `count` answers from the answer document's plain text.
    ///
    /// Fullwidth forms and the ideographic space are folded to ASCII first;
    /// other compatibility characters such as Roman numerals or circled
    /// letters are left alone. Letters standing alone as
    /// words are preferred; when there are too few of them every A-D in the
    /// text counts instead. The loose pass is best effort and can pick up
    /// letters that are not answers.
    pub fn parse(text: &str, count: usize) -> Result<Self> {
        let normalized = fold_fullwidth(text);

        let mut tokens = collect_letters(word_token_regex(), &normalized);
        if tokens.len() < count {
            log::debug!(
                "Only {} isolated answer letters, falling back to bare letters",
                tokens.len()
            );
            tokens = collect_letters(bare_token_regex(), &normalized);
        }

        if tokens.len() < count {
            return Err(Error::AnswerKey {
                found: tokens.len(),
                expected: count,
            });
        }
        tokens.truncate(count);
        Ok(Self { answers: tokens })
    }

    /// Build a key directly from letters in question order.
    pub fn from_letters(answers: Vec<Letter>) -> Self {
        Self { answers }
    }

    /// Number of answers.
    pub fn len(&self) -> usize {
        self.answers.len()
    }

    /// Whether the key is empty.
    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    /// `(question number, letter)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, Letter)> + '_ {
        self.answers
            .iter()
            .enumerate()
            .map(|(i, letter)| (i as u32 + 1, *letter))
    }

    /// The answers as one string, e.g. `"ABCD..."`.
    pub fn to_letter_string(&self) -> String {
        self.answers.iter().map(|l| l.as_char()).collect()
    }
}

impl AnswerJoin for AnswerKey {
    fn answer_for(&self, number: u32) -> Option<Letter> {
        let index = usize::try_from(number).ok()?.checked_sub(1)?;
        self.answers.get(index).copied()
    }
}

fn fold_fullwidth(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\u{FF01}'..='\u{FF5E}' | '\u{3000}') {
            out.extend(std::iter::once(c).nfkc());
        } else {
            out.push(c);
        }
    }
    out
}

fn collect_letters(re: &Regex, text: &str) -> Vec<Letter> {
    re.find_iter(text)
        .filter_map(|m| m.as_str().chars().next())
        .filter_map(|c| Letter::try_from(c).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequence(n: usize) -> String {
        (0..n)
            .map(|i| format!("{}. {}", i + 1, Letter::ALL[i % 4]))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_parse_eighty_answers() {
        let key = AnswerKey::parse(&sequence(80), 80).unwrap();
        assert_eq!(key.len(), 80);
        assert_eq!(key.answer_for(1), Some(Letter::A));
        assert_eq!(key.answer_for(2), Some(Letter::B));
        assert_eq!(key.answer_for(80), Some(Letter::D));
        assert_eq!(key.answer_for(0), None);
        assert_eq!(key.answer_for(81), None);
    }

    #[test]
    fn test_parse_too_few_answers_is_fatal() {
        let err = AnswerKey::parse(&sequence(79), 80).unwrap_err();
        assert!(matches!(
            err,
            Error::AnswerKey {
                found: 79,
                expected: 80
            }
        ));
        assert_eq!(err.to_string(), "Could not parse 80 answers. Got 79");
    }

    #[test]
    fn test_fullwidth_letters_and_spaces() {
        let text = "１　Ａ　２　Ｂ　３　Ｃ　４　Ｄ";
        let key = AnswerKey::parse(text, 4).unwrap();
        assert_eq!(key.to_letter_string(), "ABCD");
    }

    #[test]
    fn test_only_fullwidth_forms_are_folded() {
        assert_eq!(fold_fullwidth("Ａ　ｂ！ Ⅽ Ⓐ ﬁ"), "A b! Ⅽ Ⓐ ﬁ");

        // Roman numerals and circled letters are not answers
        let key = AnswerKey::parse("Ⅽ Ⅾ Ⓐ １ Ａ ２ Ｂ", 2).unwrap();
        assert_eq!(key.to_letter_string(), "AB");

        let err = AnswerKey::parse("Ⅽ Ⅾ Ⓐ １ Ａ ２ Ｂ", 3).unwrap_err();
        assert!(matches!(
            err,
            Error::AnswerKey {
                found: 2,
                expected: 3
            }
        ));
    }

    #[test]
    fn test_fallback_to_bare_letters() {
        // Letters glued to digits are not word tokens
        let key = AnswerKey::parse("1A2B3C4D", 4).unwrap();
        assert_eq!(key.to_letter_string(), "ABCD");
    }

    #[test]
    fn test_extra_tokens_are_truncated() {
        let key = AnswerKey::parse("A B C D A", 4).unwrap();
        assert_eq!(key.len(), 4);
        let pairs: Vec<_> = key.iter().collect();
        assert_eq!(pairs[3], (4, Letter::D));
    }

    #[test]
    fn test_words_containing_letters_are_ignored() {
        // "ANSWERS" and "Key" contribute nothing to the isolated pass
        let key = AnswerKey::parse("ANSWERS Key\n1 A 2 C", 2).unwrap();
        assert_eq!(key.to_letter_string(), "AC");
    }
}
