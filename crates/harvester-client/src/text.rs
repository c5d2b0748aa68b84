/// Collapse every run of whitespace (including non-breaking spaces) into a
/// single space and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Prepare free text for the enrichment service: control characters and
/// symbols outside letters, digits and basic punctuation are dropped, then
/// whitespace is normalized.
pub fn clean_text(text: &str) -> String {
    let kept: String = text
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() || is_basic_punctuation(c) {
                c
            } else {
                ' '
            }
        })
        .collect();
    normalize_whitespace(&kept)
}

fn is_basic_punctuation(c: char) -> bool {
    matches!(
        c,
        '.' | ',' | ':' | ';' | '-' | '!' | '?' | '(' | ')' | '"' | '\'' | '/' | '№' | '%'
    )
}
