// Pull a JSON payload out of free-form model output.
//
// Models often wrap the requested JSON in prose or code fences. The payload
// is taken as the span from the first opening delimiter to the last closing
// one, which tolerates both.

/// The substring from the first `{` to the last `}` inclusive.
pub fn json_object_span(text: &str) -> Option<&str> {
    span(text, '{', '}')
}

/// The substring from the first `[` to the last `]` inclusive.
pub fn json_array_span(text: &str) -> Option<&str> {
    span(text, '[', ']')
}

fn span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}
