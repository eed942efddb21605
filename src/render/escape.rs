//! Escaping for user text embedded in HTML and XML.

use std::borrow::Cow;

/// Escape `& < > " '` for element content and quoted attribute values.
///
/// Text needing no escaping is borrowed.
pub fn escape_xml(s: &str) -> Cow<'_, str> {
    let Some(first) = s.find(['&', '<', '>', '"', '\'']) else {
        return Cow::Borrowed(s);
    };
    let mut result = String::with_capacity(s.len() + 16);
    result.push_str(&s[..first]);
    for c in s[first..].chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#39;"),
            _ => result.push(c),
        }
    }
    Cow::Owned(result)
}

/// Append escaped `s` to `out`.
pub fn push_escaped(out: &mut String, s: &str) {
    out.push_str(&escape_xml(s));
}

/// Split every `]]>` so the text can sit inside a single CDATA section.
///
/// The result is meant for content between `<![CDATA[` and `]]>`.
pub fn cdata_safe(s: &str) -> Cow<'_, str> {
    if s.contains("]]>") {
        Cow::Owned(s.replace("]]>", "]]]]><![CDATA[>"))
    } else {
        Cow::Borrowed(s)
    }
}
