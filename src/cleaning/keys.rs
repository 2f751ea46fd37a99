use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    Lower,
    LowerColon,
    ProblemChars,
    Other,
}

fn lower() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z_]*$").expect("lower pattern"))
}

fn lower_colon() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z_]*:[a-z_]*$").expect("lower_colon pattern"))
}

fn problem_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[=+/&<>;'"?%#$@,. \t\r\n]"#).expect("problemchars pattern"))
}

/// True if the key contains a character that can't be used as a document field name.
pub fn has_problem_chars(key: &str) -> bool {
    problem_chars().is_match(key)
}

pub fn classify_key(key: &str) -> KeyType {
    if lower().is_match(key) {
        KeyType::Lower
    } else if lower_colon().is_match(key) {
        KeyType::LowerColon
    } else if has_problem_chars(key) {
        KeyType::ProblemChars
    } else {
        KeyType::Other
    }
}
