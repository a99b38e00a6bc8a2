//! Output encodings for `#echo` and `#printenv`.

use std::fmt;
use std::str::FromStr;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::error::UnknownEncoding;

/// Characters left unescaped by URL encoding, matching apr's escaping.
const URL_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b',')
    .remove(b':')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'*')
    .remove(b'/')
    .remove(b'!')
    .remove(b'~')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Encoding applied to a variable value before it is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// Percent-encode for use inside a URL.
    Url,
    /// Write the value unchanged.
    None,
    /// Escape HTML special characters.
    #[default]
    Entity,
}

impl Encoding {
    /// Apply the encoding to a value.
    #[must_use]
    pub fn apply(self, value: &str) -> String {
        match self {
            Self::Url => escape_url(value),
            Self::None => value.to_owned(),
            Self::Entity => escape_entities(value),
        }
    }
}

impl FromStr for Encoding {
    type Err = UnknownEncoding;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("url") {
            Ok(Self::Url)
        } else if s.eq_ignore_ascii_case("none") {
            Ok(Self::None)
        } else if s.eq_ignore_ascii_case("entity") {
            Ok(Self::Entity)
        } else {
            Err(UnknownEncoding(s.to_owned()))
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Url => "url",
            Self::None => "none",
            Self::Entity => "entity",
        })
    }
}

/// Percent-encode a string, keeping `,:-_.*/!~'()` and alphanumerics as-is.
///
/// # Example
///
/// ```
/// use rw_ssi::escape_url;
///
/// assert_eq!(escape_url("a b/c?d"), "a%20b/c%3Fd");
/// ```
#[must_use]
pub fn escape_url(value: &str) -> String {
    utf8_percent_encode(value, URL_SAFE).to_string()
}

/// Escape `<`, `>`, `&` and `"` as HTML entities.
///
/// # Example
///
/// ```
/// use rw_ssi::escape_entities;
///
/// assert_eq!(escape_entities(r#"<a href="x">&</a>"#), "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;");
/// ```
#[must_use]
pub fn escape_entities(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '&' => result.push_str("&amp;"),
            '"' => result.push_str("&quot;"),
            _ => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_parse_encoding_case_insensitive() {
        assert_eq!("URL".parse::<Encoding>(), Ok(Encoding::Url));
        assert_eq!("None".parse::<Encoding>(), Ok(Encoding::None));
        assert_eq!("entity".parse::<Encoding>(), Ok(Encoding::Entity));
    }

    #[test]
    fn test_parse_unknown_encoding() {
        assert_eq!(
            "base64".parse::<Encoding>(),
            Err(UnknownEncoding("base64".to_owned()))
        );
    }

    #[test]
    fn test_escape_url_keeps_apr_safe_chars() {
        assert_eq!(escape_url(",:-_.*/!~'()"), ",:-_.*/!~'()");
        assert_eq!(escape_url("a&b=c"), "a%26b%3Dc");
    }

    #[test]
    fn test_escape_url_utf8() {
        assert_eq!(escape_url("é"), "%C3%A9");
    }

    #[test]
    fn test_escape_entities_passthrough() {
        assert_eq!(escape_entities("plain text"), "plain text");
    }

    #[test]
    fn test_apply_none() {
        assert_eq!(Encoding::None.apply("<b>"), "<b>");
        assert_eq!(Encoding::Entity.apply("<b>"), "&lt;b&gt;");
    }
}
