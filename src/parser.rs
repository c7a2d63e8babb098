use once_cell::sync::Lazy;
use regex::Regex;

// Compile the patterns once and reuse them for every message
static MENTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"@[\p{L}0-9_]+").expect("Failed to compile mention pattern")
});

static EMOTICON_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\(([\p{L}0-9_]+)\)").expect("Failed to compile emoticon pattern")
});

// https://mathiasbynens.be/demo/url-regex
static LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(https?|ftp)://(-\.)?([^\s/?\.#-]+\.?)+(/[^\s]*)?")
        .expect("Failed to compile link pattern")
});

/// Finds every `@name` mention and returns the names without the `@`.
pub fn parse_mentions(msg: &str) -> Vec<String> {
    MENTION_RE
        .find_iter(msg)
        .map(|m| m.as_str()[1..].to_string())
        .collect()
}

/// Finds every `(name)` emoticon and returns the inner names.
pub fn parse_emoticons(msg: &str) -> Vec<String> {
    EMOTICON_RE
        .captures_iter(msg)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

pub fn parse_links(msg: &str) -> Vec<String> {
    LINK_RE
        .find_iter(msg)
        .map(|m| m.as_str().to_string())
        .collect()
}
