//! Caption post-processing: derives a listing description and keyword set from
//! a raw caption. Everything here is a pure function of the caption and the
//! policy.

use crate::config::Policy;
use std::collections::HashSet;

/// Lowercase, drop everything outside `[a-z0-9 ]`, trim.
///
/// Only the ASCII space survives, so tabs and newlines glue their neighbours
/// together ("red\tcar" becomes "redcar").
pub fn normalize(caption: &str) -> String {
    caption
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == ' ')
        .collect::<String>()
        .trim()
        .to_string()
}

pub struct CaptionProcessor<'a> {
    policy: &'a Policy,
    stopwords: HashSet<&'a str>,
}

impl<'a> CaptionProcessor<'a> {
    pub fn new(policy: &'a Policy) -> Self {
        Self {
            policy,
            stopwords: policy.stopword_set(),
        }
    }

    /// Normalized caption, padded with the filler clause while it is shorter
    /// than the minimum word count, first letter uppercased.
    pub fn build_description(&self, caption: &str) -> String {
        let normalized = normalize(caption);
        let mut words: Vec<&str> = normalized.split_whitespace().collect();

        while words.len() < self.policy.min_description_words {
            words.extend(self.policy.description_filler.split_whitespace());
        }

        capitalize(&words.join(" "))
    }

    /// Caption words minus stopwords, then enrichment terms, then filler terms
    /// until the minimum count is met. Unique, first-seen order, capped.
    pub fn extract_keywords(&self, caption: &str) -> Vec<String> {
        let normalized = normalize(caption);
        let mut seen: HashSet<String> = HashSet::new();
        let mut keywords: Vec<String> = Vec::new();

        let mut push = |word: &str, keywords: &mut Vec<String>| {
            if !word.is_empty() && seen.insert(word.to_string()) {
                keywords.push(word.to_string());
            }
        };

        for word in normalized.split_whitespace() {
            if !self.stopwords.contains(word) {
                push(word, &mut keywords);
            }
        }

        for term in &self.policy.enrichment {
            push(term.as_str(), &mut keywords);
        }

        for term in &self.policy.filler {
            if keywords.len() >= self.policy.min_keywords {
                break;
            }
            push(term.as_str(), &mut keywords);
        }

        keywords.truncate(self.policy.max_keywords);
        keywords
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}
