//! Scanning primitives for the ruleset grammar.
//!
//! The grammar is small enough that the parser works directly on the source
//! text: a [`Cursor`] tracks a byte offset and offers anchored regex matches
//! (`\A...`) plus literal punctuation checks. Whitespace and `#` comments are
//! skipped before every token.

use regex::Regex;

#[derive(Debug, Clone)]
pub(crate) struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn reset(&mut self, pos: usize) {
        self.pos = pos.min(self.src.len());
    }

    pub fn source(&self) -> &'a str {
        self.src
    }

    pub fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    /// Skip whitespace and comments.
    pub fn skip_trivia(&mut self) {
        let re = regex!(r"\A(?:\s+|#[^\n]*)+");
        if let Some(m) = re.find(self.rest()) {
            self.pos += m.end();
        }
    }

    pub fn at_eof(&mut self) -> bool {
        self.skip_trivia();
        self.pos >= self.src.len()
    }

    pub fn peek(&mut self) -> Option<char> {
        self.skip_trivia();
        self.rest().chars().next()
    }

    /// Whether the next token starts with `lit` (without consuming it).
    pub fn looking_at(&mut self, lit: &str) -> bool {
        self.skip_trivia();
        self.rest().starts_with(lit)
    }

    /// Consume `lit` if it comes next.
    pub fn eat(&mut self, lit: &str) -> bool {
        if self.looking_at(lit) {
            self.pos += lit.len();
            true
        } else {
            false
        }
    }

    /// Consume an anchored regex match, returning its capture groups
    /// (group 0 is the whole match).
    pub fn eat_re(&mut self, re: &Regex) -> Option<Vec<Option<&'a str>>> {
        self.skip_trivia();
        let rest = self.rest();
        let caps = re.captures(rest)?;
        let whole = caps.get(0)?;
        let groups = caps.iter().map(|g| g.map(|m| &rest[m.start()..m.end()])).collect();
        self.pos += whole.end();
        Some(groups)
    }

    /// 1-based line and column of a byte offset.
    pub fn line_col(&self, pos: usize) -> (usize, usize) {
        line_col(self.src, pos)
    }
}

pub(crate) fn line_col(src: &str, pos: usize) -> (usize, usize) {
    let before = &src[..pos.min(src.len())];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}

/// Identifier: function names, filter fields, prefix names.
pub(crate) fn name() -> &'static Regex {
    regex!(r"\A[A-Za-z_][A-Za-z0-9_]*")
}

/// Comparison operators allowed after a filter field name.
pub(crate) fn comparison() -> &'static Regex {
    regex!(r"\A(?:==|>=|<=|>|<)")
}

pub(crate) fn tag() -> &'static Regex {
    regex!(r"\A[A-Za-z0-9_.\-]+")
}

pub(crate) fn iri() -> &'static Regex {
    regex!(r"\A<([^>\s]*)>")
}

pub(crate) fn double_quoted() -> &'static Regex {
    regex!(r#"(?s)\A"((?:[^"\\]|\\.)*)""#)
}

pub(crate) fn single_quoted() -> &'static Regex {
    regex!(r"(?s)\A'((?:[^'\\]|\\.)*)'")
}

/// Unquoted value: CURIEs, wildcards, numbers, cardinalities, `~`.
pub(crate) fn bare() -> &'static Regex {
    regex!(r#"\A[^\s(){}\[\];,!&|"'<>=#]+"#)
}

pub(crate) fn prefix_decl() -> &'static Regex {
    regex!(r"\Aprefix\s+([A-Za-z_][A-Za-z0-9_.\-]*):\s*<([^>\s]*)>")
}

/// Drop the backslash in front of escaped characters.
pub(crate) fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_comments_and_whitespace() {
        let mut c = Cursor::new("  # a comment\n\t  stop();");
        assert!(c.eat("stop"));
        assert!(c.eat("("));
        assert!(c.eat(")"));
        assert!(c.eat(";"));
        assert!(c.at_eof());
    }

    #[test]
    fn matches_tokens_at_cursor_only() {
        let mut c = Cursor::new("subject==UBERON:* ");
        assert_eq!(c.eat_re(name()).unwrap()[0], Some("subject"));
        assert!(c.eat_re(bare()).is_none());
        assert_eq!(c.eat_re(comparison()).unwrap()[0], Some("=="));
        assert_eq!(c.eat_re(bare()).unwrap()[0], Some("UBERON:*"));
    }

    #[test]
    fn quoted_strings_keep_escapes_until_unescaped() {
        let mut c = Cursor::new(r#""say \"hi\"" rest"#);
        let groups = c.eat_re(double_quoted()).unwrap();
        assert_eq!(groups[1], Some(r#"say \"hi\""#));
        assert_eq!(unescape(groups[1].unwrap()), r#"say "hi""#);
    }

    #[test]
    fn line_and_column_are_one_based() {
        let src = "a\nbc\n  d";
        assert_eq!(line_col(src, 0), (1, 1));
        assert_eq!(line_col(src, 3), (2, 2));
        assert_eq!(line_col(src, 7), (3, 3));
    }
}
