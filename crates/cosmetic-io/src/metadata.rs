//! Header metadata carried from input to output.
//!
//! Keywords follow the FITS card convention: a name of up to eight
//! characters, a value and an optional comment. Commentary cards
//! (`COMMENT`, `HISTORY`) carry free text in `value` and never a comment.

/// Name of the free-text commentary card.
pub const COMMENT: &str = "COMMENT";
/// Name of the processing history card.
pub const HISTORY: &str = "HISTORY";

/// One header keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyword {
    /// Keyword name.
    pub name: String,
    /// Keyword value, or text for commentary cards.
    pub value: String,
    /// Optional comment.
    pub comment: String,
}

impl Keyword {
    /// Creates a valued keyword.
    pub fn new(name: impl Into<String>, value: impl Into<String>, comment: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            comment: comment.into(),
        }
    }

    /// Creates a `COMMENT` card.
    pub fn comment(text: impl Into<String>) -> Self {
        Self::new(COMMENT, text, "")
    }

    /// Creates a `HISTORY` card.
    pub fn history(text: impl Into<String>) -> Self {
        Self::new(HISTORY, text, "")
    }

    /// Returns `true` for `COMMENT`/`HISTORY`/blank cards.
    pub fn is_commentary(&self) -> bool {
        let name = self.name.trim();
        name.is_empty() || name.eq_ignore_ascii_case(COMMENT) || name.eq_ignore_ascii_case(HISTORY)
    }

    /// Formats the keyword as a single header card.
    ///
    /// ```rust
    /// use cosmetic_io::Keyword;
    ///
    /// assert_eq!(Keyword::new("EXPTIME", "30", "seconds").to_card(), "EXPTIME = 30 / seconds");
    /// assert_eq!(Keyword::history("dark subtracted").to_card(), "HISTORY dark subtracted");
    /// ```
    pub fn to_card(&self) -> String {
        if self.is_commentary() {
            format!("{} {}", self.name.trim(), self.value)
        } else if self.comment.is_empty() {
            format!("{} = {}", self.name.trim(), self.value)
        } else {
            format!("{} = {} / {}", self.name.trim(), self.value, self.comment)
        }
    }

    /// Parses one header card. Returns `None` for blank lines.
    pub fn parse_card(line: &str) -> Option<Self> {
        let line = line.trim_end();
        if line.trim().is_empty() {
            return None;
        }
        for name in [COMMENT, HISTORY] {
            if let Some(rest) = line.strip_prefix(name) {
                if rest.is_empty() || rest.starts_with(' ') {
                    return Some(Self::new(name, rest.strip_prefix(' ').unwrap_or(rest), ""));
                }
            }
        }
        match line.split_once('=') {
            Some((name, rest)) => {
                let (value, comment) = split_value(rest.trim());
                Some(Self::new(name.trim(), value, comment))
            }
            None => Some(Self::comment(line.trim())),
        }
    }
}

// A '/' inside a quoted string value is not a comment separator.
fn split_value(rest: &str) -> (String, String) {
    let mut in_quotes = false;
    for (i, ch) in rest.char_indices() {
        match ch {
            '\'' => in_quotes = !in_quotes,
            '/' if !in_quotes => {
                return (rest[..i].trim().to_string(), rest[i + 1..].trim().to_string());
            }
            _ => {}
        }
    }
    (rest.to_string(), String::new())
}

/// Formats keywords as newline-separated cards.
pub fn format_cards(keywords: &[Keyword]) -> String {
    keywords
        .iter()
        .map(Keyword::to_card)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parses newline-separated cards.
pub fn parse_cards(text: &str) -> Vec<Keyword> {
    text.lines().filter_map(Keyword::parse_card).collect()
}

/// Embedded color profile, kept as an opaque blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IccProfile(pub Vec<u8>);

impl IccProfile {
    /// Raw profile bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Per-image storage options, carried from source to output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageOptions {
    /// Bits per sample (8, 16 or 32).
    pub bits_per_sample: u8,
    /// Samples are IEEE floating point.
    pub float_sample: bool,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            bits_per_sample: 16,
            float_sample: false,
        }
    }
}

/// Describes one image inside a multi-image file.
#[derive(Debug, Clone, PartialEq)]
pub struct SubImageDescriptor {
    /// Identifier (page number or name).
    pub id: String,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Number of channels.
    pub channels: u32,
    /// Storage options of this image.
    pub options: ImageOptions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valued_card() {
        let kw = Keyword::parse_card("OBJECT  = 'M31 / core' / target name").unwrap();
        assert_eq!(kw.name, "OBJECT");
        assert_eq!(kw.value, "'M31 / core'");
        assert_eq!(kw.comment, "target name");
    }

    #[test]
    fn test_parse_commentary() {
        let kw = Keyword::parse_card("HISTORY a = b / c").unwrap();
        assert_eq!(kw, Keyword::history("a = b / c"));
        assert!(kw.is_commentary());
        assert!(Keyword::parse_card("   ").is_none());
    }

    #[test]
    fn test_cards_preserve_order() {
        let kws = vec![
            Keyword::new("GAIN", "100", ""),
            Keyword::comment("first"),
            Keyword::history("second"),
        ];
        assert_eq!(parse_cards(&format_cards(&kws)), kws);
    }
}
