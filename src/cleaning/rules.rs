//! Ordered tag filtering policy used by the element shaper.
//!
//! Every child tag is checked against [`TAG_RULES`] top to bottom and the first rule whose
//! predicate matches decides what happens with it.

use std::sync::OnceLock;

use regex::Regex;

use crate::data::osm::Tag;

use super::keys::has_problem_chars;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagAction {
    Discard,
    /// Goes to `other_names`, keyed by the language name.
    OtherName,
    /// Goes to `address`, keyed by the part after `addr:`.
    Address,
    /// Kept as a top-level field under its full key.
    Scalar,
}

pub struct TagRule {
    pub name: &'static str,
    pub matches: fn(&Tag) -> bool,
    pub action: TagAction,
}

pub const ADDRESS_PREFIX: &str = "addr:";

const LANGUAGES: [(&str, &str); 4] = [
    ("ar", "arabic"),
    ("en", "english"),
    ("de", "german"),
    ("ru", "russian"),
];

fn other_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^name:(ar|en|de|ru)").expect("other name pattern"))
}

/// Language name of a `name:<locale>` key, for the four supported locales.
pub fn other_name_language(key: &str) -> Option<&'static str> {
    let locale = other_name_re().captures(key)?.get(1)?.as_str();
    LANGUAGES.iter()
        .find(|(code, _)| *code == locale)
        .map(|(_, language)| *language)
}

fn colons(key: &str) -> usize {
    key.matches(':').count()
}

pub static TAG_RULES: [TagRule; 9] = [
    TagRule {
        name: "wikipedia",
        matches: |tag| tag.key == "wikipedia",
        action: TagAction::Discard,
    },
    TagRule {
        name: "alt_name",
        matches: |tag| tag.key.starts_with("alt_name:"),
        action: TagAction::Discard,
    },
    TagRule {
        name: "other_name",
        matches: |tag| other_name_language(&tag.key).is_some(),
        action: TagAction::OtherName,
    },
    TagRule {
        name: "unsupported_name",
        matches: |tag| tag.key.starts_with("name:"),
        action: TagAction::Discard,
    },
    TagRule {
        name: "problem_chars",
        matches: |tag| has_problem_chars(&tag.key),
        action: TagAction::Discard,
    },
    // Some housenumbers hold coordinate ranges like "02.35699066 - 02.35710008".
    TagRule {
        name: "dotted_housenumber",
        matches: |tag| tag.key == "addr:housenumber" && tag.value.contains('.'),
        action: TagAction::Discard,
    },
    TagRule {
        name: "address",
        matches: |tag| colons(&tag.key) == 1 && tag.key.starts_with(ADDRESS_PREFIX),
        action: TagAction::Address,
    },
    TagRule {
        name: "scalar",
        matches: |tag| colons(&tag.key) <= 1,
        action: TagAction::Scalar,
    },
    TagRule {
        name: "nested_key",
        matches: |_| true,
        action: TagAction::Discard,
    },
];

/// First rule matching `tag`. The last rule matches everything.
pub fn matching_rule(tag: &Tag) -> &'static TagRule {
    TAG_RULES.iter()
        .find(|rule| (rule.matches)(tag))
        .unwrap_or(&TAG_RULES[TAG_RULES.len() - 1])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule_for(key: &str, value: &str) -> (&'static str, TagAction) {
        let rule = matching_rule(&Tag::new(key, value));
        (rule.name, rule.action)
    }

    #[test]
    fn wikipedia_is_dropped_but_its_namespaced_siblings_are_not() {
        assert_eq!(rule_for("wikipedia", "ar:القاهرة"), ("wikipedia", TagAction::Discard));
        assert_eq!(rule_for("wikipedia:en", "Cairo"), ("scalar", TagAction::Scalar));
    }

    #[test]
    fn alternative_names() {
        assert_eq!(rule_for("alt_name:en", "Misr"), ("alt_name", TagAction::Discard));
        assert_eq!(rule_for("alt_name", "Misr"), ("scalar", TagAction::Scalar));
    }

    #[test]
    fn localized_names() {
        assert_eq!(rule_for("name:ar", "القاهرة"), ("other_name", TagAction::OtherName));
        assert_eq!(rule_for("name:ru", "Каир"), ("other_name", TagAction::OtherName));
        assert_eq!(rule_for("name:fr", "Le Caire"), ("unsupported_name", TagAction::Discard));
        assert_eq!(rule_for("name:zh-Hans", "开罗"), ("unsupported_name", TagAction::Discard));
        assert_eq!(rule_for("name", "Cairo"), ("scalar", TagAction::Scalar));
    }

    #[test]
    fn language_lookup() {
        assert_eq!(other_name_language("name:ar"), Some("arabic"));
        assert_eq!(other_name_language("name:en"), Some("english"));
        assert_eq!(other_name_language("name:de"), Some("german"));
        assert_eq!(other_name_language("name:ru"), Some("russian"));
        assert_eq!(other_name_language("name:fr"), None);
        assert_eq!(other_name_language("old_name:en"), None);
    }

    #[test]
    fn problem_chars_are_dropped_before_address_handling() {
        assert_eq!(rule_for("addr:street name", "x"), ("problem_chars", TagAction::Discard));
        assert_eq!(rule_for("note.fr", "x"), ("problem_chars", TagAction::Discard));
    }

    #[test]
    fn dotted_housenumber() {
        assert_eq!(
            rule_for("addr:housenumber", "02.35699066 - 02.35710008"),
            ("dotted_housenumber", TagAction::Discard)
        );
        assert_eq!(rule_for("addr:housenumber", "12"), ("address", TagAction::Address));
    }

    #[test]
    fn address_keys_need_exactly_one_colon() {
        assert_eq!(rule_for("addr:city", "giza"), ("address", TagAction::Address));
        assert_eq!(rule_for("addr:street:name", "Tahrir"), ("nested_key", TagAction::Discard));
    }

    #[test]
    fn scalars() {
        assert_eq!(rule_for("amenity", "cafe"), ("scalar", TagAction::Scalar));
        assert_eq!(rule_for("building:levels", "4"), ("scalar", TagAction::Scalar));
        assert_eq!(rule_for("FIXME", "check"), ("scalar", TagAction::Scalar));
        assert_eq!(rule_for("seamark:light:colour", "red"), ("nested_key", TagAction::Discard));
    }
}
