//! Tokenizer for the SysML v2 textual notation subset.
//!
//! Tokens keep their byte span so the parser can hand out exact source ranges
//! for in-place edits.

use crate::error::{Error, Result};

/// Byte range into the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Span covering both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }

    /// Slice the source text.
    pub fn slice(self, source: &str) -> &str {
        &source[self.start..self.end]
    }
}

/// Token classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier, keyword, or `'unrestricted name'`.
    Ident,
    /// Numeric literal (sign is a separate symbol).
    Number,
    /// Double-quoted string literal.
    Str,
    /// Punctuation and operators.
    Symbol,
    /// Block comment, kept so `doc /* ... */` statements can terminate.
    Comment,
}

/// A lexed token.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Token text. Identifiers and strings are unquoted.
    pub text: String,
    pub span: Span,
    /// 1-based line of the token start.
    pub line: usize,
}

impl Token {
    /// Whether this is the given symbol.
    pub fn is_symbol(&self, symbol: &str) -> bool {
        self.kind == TokenKind::Symbol && self.text == symbol
    }

    /// Whether this is the given identifier or keyword.
    pub fn is_ident(&self, ident: &str) -> bool {
        self.kind == TokenKind::Ident && self.text == ident
    }
}

const MULTI_CHAR_SYMBOLS: [&str; 9] = [":>>", "::", ":>", "<=", ">=", "!=", "==", "->", ":="];

/// Comparison operators recognized in constraint expressions.
pub const COMPARISON_OPERATORS: [&str; 7] = ["<=", ">=", "!=", "==", "<", ">", "="];

/// Tokenize the full source text.
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            line: 1,
        }
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek(0)?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
        }
        Some(b)
    }

    fn skip_whitespace_and_line_comments(&mut self) {
        loop {
            match (self.peek(0), self.peek(1)) {
                (Some(b), _) if b.is_ascii_whitespace() => {
                    self.bump();
                }
                (Some(b'/'), Some(b'/')) => {
                    while let Some(b) = self.peek(0) {
                        if b == b'\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>> {
        self.skip_whitespace_and_line_comments();

        let start = self.pos;
        let line = self.line;
        let Some(b) = self.peek(0) else {
            return Ok(None);
        };

        let kind = if b == b'/' && self.peek(1) == Some(b'*') {
            self.block_comment(line)?;
            TokenKind::Comment
        } else if b == b'"' {
            self.quoted(b'"', line)?;
            TokenKind::Str
        } else if b == b'\'' {
            self.quoted(b'\'', line)?;
            TokenKind::Ident
        } else if b.is_ascii_digit()
            || (b == b'.' && self.peek(1).is_some_and(|n| n.is_ascii_digit()))
        {
            self.number();
            TokenKind::Number
        } else if b.is_ascii_alphabetic() || b == b'_' || b >= 0x80 {
            self.identifier();
            TokenKind::Ident
        } else {
            self.symbol();
            TokenKind::Symbol
        };

        let span = Span::new(start, self.pos);
        let raw = span.slice(self.source);
        let text = match kind {
            TokenKind::Str => unescape(&raw[1..raw.len() - 1]),
            TokenKind::Ident if raw.starts_with('\'') => raw[1..raw.len() - 1].to_string(),
            _ => raw.to_string(),
        };

        Ok(Some(Token {
            kind,
            text,
            span,
            line,
        }))
    }

    fn block_comment(&mut self, line: usize) -> Result<()> {
        self.bump();
        self.bump();
        loop {
            match (self.peek(0), self.peek(1)) {
                (Some(b'*'), Some(b'/')) => {
                    self.bump();
                    self.bump();
                    return Ok(());
                }
                (Some(_), _) => {
                    self.bump();
                }
                (None, _) => return Err(Error::parse(line, "unterminated block comment")),
            }
        }
    }

    fn quoted(&mut self, quote: u8, line: usize) -> Result<()> {
        self.bump();
        loop {
            match self.bump() {
                Some(b'\\') => {
                    self.bump();
                }
                Some(b) if b == quote => return Ok(()),
                Some(_) => {}
                None => return Err(Error::parse(line, "unterminated string literal")),
            }
        }
    }

    fn number(&mut self) {
        while self.peek(0).is_some_and(|b| b.is_ascii_digit()) {
            self.bump();
        }
        if self.peek(0) == Some(b'.') && self.peek(1).is_some_and(|b| b.is_ascii_digit()) {
            self.bump();
            while self.peek(0).is_some_and(|b| b.is_ascii_digit()) {
                self.bump();
            }
        }
        if matches!(self.peek(0), Some(b'e') | Some(b'E')) {
            let digit_at = match self.peek(1) {
                Some(b'+') | Some(b'-') => 2,
                _ => 1,
            };
            if self.peek(digit_at).is_some_and(|b| b.is_ascii_digit()) {
                for _ in 0..digit_at {
                    self.bump();
                }
                while self.peek(0).is_some_and(|b| b.is_ascii_digit()) {
                    self.bump();
                }
            }
        }
    }

    fn identifier(&mut self) {
        while self
            .peek(0)
            .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80)
        {
            self.bump();
        }
    }

    fn symbol(&mut self) {
        let rest = &self.source[self.pos..];
        if let Some(sym) = MULTI_CHAR_SYMBOLS.iter().find(|s| rest.starts_with(**s)) {
            for _ in 0..sym.len() {
                self.bump();
            }
            return;
        }
        // Single character; step over a whole UTF-8 sequence if needed.
        let width = rest.chars().next().map(char::len_utf8).unwrap_or(1);
        for _ in 0..width {
            self.bump();
        }
    }
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Escape a value for use inside a double-quoted string literal. Line
/// breaks are escaped so a literal always stays on one line.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<(TokenKind, String)> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, t.text))
            .collect()
    }

    #[test]
    fn test_tokenize_attribute() {
        let tokens = kinds("attribute mass = 60.5 [g];");
        assert_eq!(
            tokens,
            vec![
                (TokenKind::Ident, "attribute".to_string()),
                (TokenKind::Ident, "mass".to_string()),
                (TokenKind::Symbol, "=".to_string()),
                (TokenKind::Number, "60.5".to_string()),
                (TokenKind::Symbol, "[".to_string()),
                (TokenKind::Ident, "g".to_string()),
                (TokenKind::Symbol, "]".to_string()),
                (TokenKind::Symbol, ";".to_string()),
            ]
        );
    }

    #[test]
    fn test_tokenize_strings_and_names() {
        let tokens = kinds(r#"attribute 'max width' = "fc \"001\"";"#);
        assert_eq!(tokens[1], (TokenKind::Ident, "max width".to_string()));
        assert_eq!(tokens[3], (TokenKind::Str, "fc \"001\"".to_string()));
    }

    #[test]
    fn test_tokenize_operators_and_comments() {
        let tokens = kinds("// header\nsum(a) <= b /* note */ x::y :>> z");
        let texts: Vec<&str> = tokens.iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(
            texts,
            vec!["sum", "(", "a", ")", "<=", "b", "/* note */", "x", "::", "y", ":>>", "z"]
        );
        assert_eq!(tokens[6].0, TokenKind::Comment);
    }

    #[test]
    fn test_number_exponent_and_lines() {
        let tokens = tokenize("a\n1.5e-3\n").unwrap();
        assert_eq!(tokens[1].text, "1.5e-3");
        assert_eq!(tokens[1].line, 2);
    }

    #[test]
    fn test_escape_keeps_literal_on_one_line() {
        let value = "two\nlines\r\n\"quoted\" C:\\tmp\tend";
        let escaped = escape(value);
        assert!(!escaped.contains('\n'));
        assert!(!escaped.contains('\r'));
        assert_eq!(escape("a\nb\"c"), "a\\nb\\\"c");

        let tokens = tokenize(&format!("\"{}\";", escaped)).unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].kind, TokenKind::Str);
        assert_eq!(tokens[0].text, value);
        assert_eq!(tokens[1].line, 1);
    }

    #[test]
    fn test_unterminated_string() {
        assert!(tokenize("attribute a = \"open;").is_err());
        assert!(tokenize("/* never closed").is_err());
    }
}
