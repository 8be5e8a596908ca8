//! Recursive-descent parser producing a statement tree.
//!
//! The grammar is deliberately loose: a statement is a header of tokens ended
//! by `;`, by a `{ ... }` body, or by the closing brace of its parent. The
//! header is then classified by its leading keywords. This is enough to
//! address elements by path, read attribute values and locate the exact
//! bytes to replace when a value changes.

use super::lexer::{tokenize, Span, Token, TokenKind};
use crate::error::{Error, Result};

/// Keywords that may precede a statement's main keyword.
const MODIFIERS: [&str; 9] = [
    "public",
    "private",
    "protected",
    "abstract",
    "variation",
    "individual",
    "readonly",
    "derived",
    "assert",
];

/// Usage/definition keywords that make an element addressable by path in
/// addition to packages, parts and attributes.
const STRUCTURAL_KEYWORDS: [&str; 8] = [
    "item",
    "port",
    "action",
    "state",
    "requirement",
    "occurrence",
    "connection",
    "interface",
];

/// Classification of a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementKind {
    Package,
    PartDef,
    Part,
    AttributeDef,
    Attribute,
    MetadataDef,
    /// `@Tag about a, b;` or `metadata Tag about a, b;`
    MetadataUsage,
    ConstraintDef,
    /// `constraint <usage> : <Def> { ... }`
    Constraint,
    /// `in`/`out`/`inout` parameter declaration or binding.
    Parameter,
    Import,
    Doc,
    /// Other `<keyword> def <name>` definitions.
    Definition(String),
    /// Other `<keyword> <name>` usages.
    Usage(String),
    /// Anything else, e.g. a constraint expression.
    Expression,
}

impl StatementKind {
    /// Whether the statement can be a segment of an element path.
    pub fn is_structural(&self) -> bool {
        match self {
            Self::Package | Self::PartDef | Self::Part | Self::AttributeDef | Self::Attribute => {
                true
            }
            Self::Definition(k) | Self::Usage(k) => STRUCTURAL_KEYWORDS.contains(&k.as_str()),
            _ => false,
        }
    }
}

/// How a statement ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    /// `;`
    Semicolon,
    /// `{ ... }`
    Body,
    /// End of the enclosing body or of the file.
    Unterminated,
}

/// The value part of an attribute or parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueSlot {
    /// Value text with quotes removed.
    pub text: String,
    /// Source range of the value expression.
    pub span: Span,
    /// Unit name from a trailing `[unit]`.
    pub unit: Option<String>,
    /// Source range of the bracketed unit, brackets included.
    pub unit_span: Option<Span>,
    /// Value is a single string literal.
    pub quoted: bool,
    /// Value is a single (optionally signed) numeric literal.
    pub numeric: bool,
    /// Value follows `=` or `:=` rather than a `:` annotation.
    pub assigned: bool,
    /// Value tokens, without the unit.
    pub tokens: Vec<Token>,
}

impl ValueSlot {
    /// Source range the value and its unit occupy together.
    pub fn full_span(&self) -> Span {
        match self.unit_span {
            Some(unit) => self.span.to(unit),
            None => self.span,
        }
    }

    /// Elements of a parenthesized comma list, e.g. `(fc, m, p)`.
    pub fn list_items(&self) -> Option<Vec<String>> {
        let first = self.tokens.first()?;
        let last = self.tokens.last()?;
        if !first.is_symbol("(") || !last.is_symbol(")") || self.tokens.len() < 2 {
            return None;
        }
        let inner = &self.tokens[1..self.tokens.len() - 1];
        Some(
            split_top_level(inner, ",")
                .into_iter()
                .map(|group| join_tokens(group))
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }
}

/// One parsed statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub name: Option<String>,
    /// Declared type (`part fc : FlightController`) or constraint definition.
    pub type_name: Option<String>,
    pub value: Option<ValueSlot>,
    /// References after `about` for metadata usages.
    pub targets: Vec<String>,
    /// Header tokens (everything before `;` or `{`).
    pub header: Vec<Token>,
    pub body: Option<Vec<Statement>>,
    pub terminator: Terminator,
    /// Whole statement including its body and terminator.
    pub span: Span,
    /// 1-based line of the first header token.
    pub line: usize,
}

impl Statement {
    /// Source range of the header tokens.
    pub fn header_span(&self) -> Span {
        match (self.header.first(), self.header.last()) {
            (Some(first), Some(last)) => first.span.to(last.span),
            _ => Span::new(self.span.start, self.span.start),
        }
    }

    /// Whether the header contains a comparison operator at nesting depth 0.
    pub fn comparison_operator(&self) -> Option<&Token> {
        let mut depth = 0i32;
        for token in &self.header {
            if token.is_symbol("(") || token.is_symbol("[") {
                depth += 1;
            } else if token.is_symbol(")") || token.is_symbol("]") {
                depth -= 1;
            } else if depth == 0
                && token.kind == TokenKind::Symbol
                && super::lexer::COMPARISON_OPERATORS.contains(&token.text.as_str())
            {
                return Some(token);
            }
        }
        None
    }

    /// Direct children, empty when the statement has no body.
    pub fn children(&self) -> &[Statement] {
        self.body.as_deref().unwrap_or(&[])
    }

    /// Find a direct child by kind predicate and name.
    pub fn child(&self, name: &str, pred: impl Fn(&StatementKind) -> bool) -> Option<&Statement> {
        self.children()
            .iter()
            .find(|s| s.name.as_deref() == Some(name) && pred(&s.kind))
    }
}

/// Parse a full document into its top-level statements.
pub fn parse(source: &str) -> Result<Vec<Statement>> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
    };
    let statements = parser.statements(false)?;
    if let Some(token) = parser.peek() {
        return Err(Error::parse(token.line, format!("unexpected '{}'", token.text)));
    }
    Ok(statements)
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn statements(&mut self, nested: bool) -> Result<Vec<Statement>> {
        let mut out = Vec::new();
        loop {
            // Stray comments between statements carry no structure.
            while self.peek().is_some_and(|t| t.kind == TokenKind::Comment) {
                self.pos += 1;
            }
            match self.peek() {
                None => break,
                Some(t) if t.is_symbol("}") => {
                    if nested {
                        break;
                    }
                    return Err(Error::parse(t.line, "unbalanced '}'"));
                }
                Some(t) if t.is_symbol(";") => {
                    self.pos += 1;
                }
                Some(_) => out.push(self.statement()?),
            }
        }
        Ok(out)
    }

    fn statement(&mut self) -> Result<Statement> {
        let start_token = self.tokens[self.pos].clone();
        let mut header: Vec<Token> = Vec::new();
        let mut depth = 0i32;
        let mut body = None;
        let mut terminator = Terminator::Unterminated;
        let mut end = start_token.span.end;

        while let Some(token) = self.peek().cloned() {
            if token.kind == TokenKind::Comment {
                self.pos += 1;
                let is_doc = header
                    .first()
                    .is_some_and(|t| t.is_ident("doc") || t.is_ident("comment"));
                if is_doc {
                    header.push(token.clone());
                    end = token.span.end;
                    break;
                }
                continue;
            }
            if depth == 0 && token.is_symbol(";") {
                self.pos += 1;
                terminator = Terminator::Semicolon;
                end = token.span.end;
                break;
            }
            if depth == 0 && token.is_symbol("}") {
                break;
            }
            if depth == 0 && token.is_symbol("{") {
                self.pos += 1;
                let children = self.statements(true)?;
                match self.peek() {
                    Some(close) if close.is_symbol("}") => {
                        end = close.span.end;
                        self.pos += 1;
                    }
                    _ => {
                        return Err(Error::parse(token.line, "missing closing '}'"));
                    }
                }
                body = Some(children);
                terminator = Terminator::Body;
                break;
            }
            if token.is_symbol("(") || token.is_symbol("[") {
                depth += 1;
            } else if token.is_symbol(")") || token.is_symbol("]") {
                depth -= 1;
            }
            end = token.span.end;
            header.push(token);
            self.pos += 1;
        }

        let mut statement = Statement {
            kind: StatementKind::Expression,
            name: None,
            type_name: None,
            value: None,
            targets: Vec::new(),
            header,
            body,
            terminator,
            span: Span::new(start_token.span.start, end),
            line: start_token.line,
        };
        classify(&mut statement, self.source);
        Ok(statement)
    }
}

/// Fill in kind, name, type and value from the header tokens.
fn classify(statement: &mut Statement, source: &str) {
    let header = statement.header.clone();
    let mut i = 0;
    while header
        .get(i)
        .is_some_and(|t| t.kind == TokenKind::Ident && MODIFIERS.contains(&t.text.as_str()))
    {
        i += 1;
    }
    let Some(first) = header.get(i) else {
        return;
    };
    let next_is_def = header.get(i + 1).is_some_and(|t| t.is_ident("def"));

    if first.is_symbol("@") {
        statement.kind = StatementKind::MetadataUsage;
        statement.name = ident_at(&header, i + 1);
        statement.targets = about_targets(&header);
        return;
    }
    if first.kind != TokenKind::Ident {
        return;
    }

    match first.text.as_str() {
        "package" => {
            statement.kind = StatementKind::Package;
            statement.name = ident_at(&header, i + 1);
        }
        "import" => statement.kind = StatementKind::Import,
        "doc" | "comment" => statement.kind = StatementKind::Doc,
        "part" if next_is_def => {
            statement.kind = StatementKind::PartDef;
            statement.name = ident_at(&header, i + 2);
        }
        "part" => {
            statement.kind = StatementKind::Part;
            usage_name_and_type(statement, &header, i + 1);
        }
        "attribute" if next_is_def => {
            statement.kind = StatementKind::AttributeDef;
            statement.name = ident_at(&header, i + 2);
        }
        "attribute" => {
            statement.kind = StatementKind::Attribute;
            let mut j = i + 1;
            if header
                .get(j)
                .is_some_and(|t| t.is_symbol(":>>") || t.is_ident("redefines"))
            {
                j += 1;
            }
            statement.name = ident_at(&header, j);
            statement.value = value_slot(&header, j + 1, true, source);
            if statement.value.is_none() {
                statement.type_name = type_after_colon(&header, j + 1);
            }
        }
        "metadata" if next_is_def => {
            statement.kind = StatementKind::MetadataDef;
            statement.name = ident_at(&header, i + 2);
        }
        "metadata" => {
            statement.kind = StatementKind::MetadataUsage;
            // `metadata Tag about ...` or `metadata m : Tag about ...`
            statement.name = type_after_colon(&header, i + 2).or_else(|| ident_at(&header, i + 1));
            statement.targets = about_targets(&header);
        }
        "constraint" if next_is_def => {
            statement.kind = StatementKind::ConstraintDef;
            statement.name = ident_at(&header, i + 2);
        }
        "constraint" => {
            statement.kind = StatementKind::Constraint;
            usage_name_and_type(statement, &header, i + 1);
        }
        "in" | "out" | "inout" => {
            statement.kind = StatementKind::Parameter;
            let mut j = i + 1;
            // `in attribute x ...`, `in part y ...`
            if header
                .get(j)
                .is_some_and(|t| matches!(t.text.as_str(), "attribute" | "part" | "item"))
            {
                j += 1;
            }
            statement.name = ident_at(&header, j);
            statement.value = value_slot(&header, j + 1, false, source);
            statement.type_name = type_after_colon(&header, j + 1);
        }
        keyword if next_is_def => {
            statement.kind = StatementKind::Definition(keyword.to_string());
            statement.name = ident_at(&header, i + 2);
        }
        keyword if STRUCTURAL_KEYWORDS.contains(&keyword) => {
            statement.kind = StatementKind::Usage(keyword.to_string());
            usage_name_and_type(statement, &header, i + 1);
        }
        _ => {}
    }
}

fn ident_at(header: &[Token], index: usize) -> Option<String> {
    header
        .get(index)
        .filter(|t| t.kind == TokenKind::Ident)
        .map(|t| t.text.clone())
}

fn usage_name_and_type(statement: &mut Statement, header: &[Token], index: usize) {
    if header.get(index).is_some_and(|t| t.is_symbol(":")) {
        statement.type_name = qualified_name(header, index + 1);
        return;
    }
    statement.name = ident_at(header, index);
    statement.type_name = type_after_colon(header, index + 1);
}

/// The qualified name right after a `:` (or `:>`) at `index`.
fn type_after_colon(header: &[Token], index: usize) -> Option<String> {
    let token = header.get(index)?;
    if token.is_symbol(":") || token.is_symbol(":>") {
        qualified_name(header, index + 1)
    } else {
        None
    }
}

/// Read `A::B::C` starting at `index`.
fn qualified_name(header: &[Token], index: usize) -> Option<String> {
    let mut parts = vec![ident_at(header, index)?];
    let mut j = index + 1;
    while header.get(j).is_some_and(|t| t.is_symbol("::")) {
        match ident_at(header, j + 1) {
            Some(part) => parts.push(part),
            None => break,
        }
        j += 2;
    }
    Some(parts.join("::"))
}

/// Extract the value after `=` (or, for attributes, after a `:` directly
/// following the name when no `=` exists).
fn value_slot(
    header: &[Token],
    after_name: usize,
    allow_colon: bool,
    source: &str,
) -> Option<ValueSlot> {
    let rest = header.get(after_name..)?;
    let mut depth = 0i32;
    let mut value_start = None;
    for (k, token) in rest.iter().enumerate() {
        if token.is_symbol("(") || token.is_symbol("[") {
            depth += 1;
        } else if token.is_symbol(")") || token.is_symbol("]") {
            depth -= 1;
        } else if depth == 0 && (token.is_symbol("=") || token.is_symbol(":=")) {
            value_start = Some(k + 1);
            break;
        }
    }
    let assigned = value_start.is_some();
    if value_start.is_none() && allow_colon && rest.first().is_some_and(|t| t.is_symbol(":")) {
        value_start = Some(1);
    }
    let mut tokens: Vec<Token> = rest.get(value_start?..)?.to_vec();
    if tokens.is_empty() {
        return None;
    }

    // Trailing `[unit]` at depth 0.
    let mut unit = None;
    let mut unit_span = None;
    if tokens.last().is_some_and(|t| t.is_symbol("]")) {
        let mut depth = 0i32;
        let mut open = None;
        for (k, token) in tokens.iter().enumerate().rev() {
            if token.is_symbol("]") {
                depth += 1;
            } else if token.is_symbol("[") {
                depth -= 1;
                if depth == 0 {
                    open = Some(k);
                    break;
                }
            }
        }
        if let Some(open) = open.filter(|&k| k > 0) {
            let close = tokens.len() - 1;
            let inner = Span::new(tokens[open].span.end, tokens[close].span.start);
            unit = Some(inner.slice(source).trim().to_string());
            unit_span = Some(tokens[open].span.to(tokens[close].span));
            tokens.truncate(open);
        }
    }

    let span = tokens[0].span.to(tokens[tokens.len() - 1].span);
    let quoted = tokens.len() == 1 && tokens[0].kind == TokenKind::Str;
    let numeric = match tokens.as_slice() {
        [n] => n.kind == TokenKind::Number,
        [sign, n] => (sign.is_symbol("-") || sign.is_symbol("+")) && n.kind == TokenKind::Number,
        _ => false,
    };
    let text = if quoted {
        tokens[0].text.clone()
    } else {
        span.slice(source).trim().to_string()
    };

    Some(ValueSlot {
        text,
        span,
        unit,
        unit_span,
        quoted,
        numeric,
        assigned,
        tokens,
    })
}

/// Targets after `about`, split on top-level commas.
fn about_targets(header: &[Token]) -> Vec<String> {
    let Some(pos) = header.iter().position(|t| t.is_ident("about")) else {
        return Vec::new();
    };
    split_top_level(&header[pos + 1..], ",")
        .into_iter()
        .map(join_tokens)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Split tokens on a separator symbol outside parentheses and brackets.
pub fn split_top_level<'t>(tokens: &'t [Token], separator: &str) -> Vec<&'t [Token]> {
    let mut groups = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (k, token) in tokens.iter().enumerate() {
        if token.is_symbol("(") || token.is_symbol("[") {
            depth += 1;
        } else if token.is_symbol(")") || token.is_symbol("]") {
            depth -= 1;
        } else if depth == 0 && token.is_symbol(separator) {
            groups.push(&tokens[start..k]);
            start = k + 1;
        }
    }
    groups.push(&tokens[start..]);
    groups
}

/// Concatenate token texts without separators, e.g. `Drone::Motor`.
pub fn join_tokens(tokens: &[Token]) -> String {
    tokens.iter().map(|t| t.text.as_str()).collect()
}
