use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Connector words removed between other words.
const CONNECTORS: &[&str] = &["y", "and", "of"];

/// Administrative words removed from either end.
const ADMIN_WORDS: &[&str] = &[
    "county",
    "region",
    "borough",
    "province",
    "department",
    "district",
];

/// Normalize free text for fuzzy comparison of place names.
///
/// Folds accents (`León` becomes `leon`), lower-cases, drops interior
/// connector words and keeps only ASCII letters. Then one leading and one
/// trailing administrative word are stripped and all whitespace removed. `"County of Los Angeles"` and
/// `"los angeles"` both become `"losangeles"`.
pub fn fuzzy_text(text: &str) -> String {
    let mut text: String = text
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();
    for token in CONNECTORS {
        text = text.replace(&format!(" {token} "), " ");
    }
    let mut text: String = text
        .chars()
        .filter(|c| c.is_ascii_alphabetic() || c.is_whitespace())
        .collect();
    for word in ADMIN_WORDS {
        if let Some(rest) = text.strip_prefix(&format!("{word} ")) {
            text = rest.to_string();
        }
        if let Some(rest) = text.strip_suffix(&format!(" {word}")) {
            text = rest.to_string();
        }
    }
    text.split_whitespace().collect()
}
