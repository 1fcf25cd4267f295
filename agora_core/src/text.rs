//! Text hygiene and metadata extraction for generated content.

use std::sync::OnceLock;

use agora_env::{Publication, TopicId};
use regex::Regex;

/// Generated texts shorter than this are not published.
pub const MIN_TEXT_LEN: usize = 3;

fn hashtag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"#\w+").expect("valid hashtag regex"))
}

fn mention_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"@\w+").expect("valid mention regex"))
}

/// Strips markup, wrapping quotes, self mentions and redundant whitespace.
pub fn clean_text(raw: &str, own_name: &str) -> String {
    let mut text = raw.replace("**", "").replace("__", "");

    let own_handle = format!("@{}", own_name.replace(char::is_whitespace, ""));
    if own_handle.len() > 1 {
        text = text.replace(&own_handle, "");
    }

    let prefix = format!("{}:", own_name);
    let trimmed = text.trim();
    let trimmed = trimmed.strip_prefix(&prefix).unwrap_or(trimmed).trim();
    let trimmed = trimmed.trim_matches(|c| c == '"' || c == '\'').trim();

    trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn hashtags(text: &str) -> Vec<String> {
    hashtag_re().find_iter(text).map(|m| m.as_str().to_string()).collect()
}

pub fn mentions(text: &str) -> Vec<String> {
    mention_re().find_iter(text).map(|m| m.as_str().to_string()).collect()
}

/// Emotion labels from `vocabulary` that occur as words in `text`.
pub fn emotions(text: &str, vocabulary: &[String]) -> Vec<String> {
    let words: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    vocabulary
        .iter()
        .filter(|e| words.iter().any(|w| *w == e.to_lowercase()))
        .cloned()
        .collect()
}

/// Cleans `raw` and extracts its metadata; `None` if too short to publish.
pub fn build_publication(
    raw: &str,
    own_name: &str,
    topics: Vec<TopicId>,
    vocabulary: &[String],
) -> Option<Publication> {
    let text = clean_text(raw, own_name);
    if text.chars().count() < MIN_TEXT_LEN {
        return None;
    }
    Some(Publication {
        hashtags: hashtags(&text),
        mentions: mentions(&text),
        emotions: emotions(&text, vocabulary),
        topics,
        text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  \"**Hello**   world\" ", "Ada"), "Hello world");
        assert_eq!(clean_text("Ada: hi @Ada there", "Ada"), "hi there");
    }

    #[test]
    fn test_extracts_tags_and_mentions() {
        let text = "Loving #rust and #async_io, cc @bob @carol_1";
        assert_eq!(hashtags(text), vec!["#rust", "#async_io"]);
        assert_eq!(mentions(text), vec!["@bob", "@carol_1"]);
    }

    #[test]
    fn test_emotions_match_whole_words() {
        let vocab = vec!["joy".to_string(), "anger".to_string(), "fear".to_string()];
        assert_eq!(emotions("Pure JOY, no fearless talk", &vocab), vec!["joy"]);
    }

    #[test]
    fn test_short_text_not_published() {
        assert!(build_publication(" ok ", "Ada", vec![], &[]).is_none());
        let p = build_publication("Good #morning", "Ada", vec![TopicId(1)], &[]).unwrap();
        assert_eq!(p.hashtags, vec!["#morning"]);
        assert_eq!(p.topics, vec![TopicId(1)]);
    }
}
