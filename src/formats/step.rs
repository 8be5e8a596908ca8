//! STEP (ISO 10303-21) exchange file adapter.
//!
//! Two addressing modes:
//!
//! - header: `FILE_NAME.author`, resolved through a fixed positional table
//!   per known header record
//! - data: `DATA.#<id>`, resolved by entity id; records with several
//!   arguments need a positional index, pinned once with
//!   [`StepFile::resolve_index`] and stored by the caller

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{ElementValue, FormatAdapter, FormatKind};
use crate::error::{Error, Result};
use crate::io::read_file;

const FILE_DESCRIPTION: &[(&str, usize)] = &[("description", 0), ("implementation_level", 1)];

const FILE_NAME: &[(&str, usize)] = &[
    ("name", 0),
    ("author", 1),
    ("organization", 2),
    ("time_stamp", 3),
    ("preprocessor_version", 4),
    ("originating_system", 5),
    ("authorization", 6),
];

const FILE_SCHEMA: &[(&str, usize)] = &[("schema", 0)];

/// Position of a named attribute inside a known header record.
pub fn header_position(section: &str, attribute: &str) -> Option<usize> {
    let table = match section {
        "FILE_DESCRIPTION" => FILE_DESCRIPTION,
        "FILE_NAME" => FILE_NAME,
        "FILE_SCHEMA" => FILE_SCHEMA,
        _ => return None,
    };
    table
        .iter()
        .find(|(name, _)| *name == attribute)
        .map(|(_, pos)| *pos)
}

/// One argument of a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    /// `'text'`, with `''` unescaped.
    Str(String),
    /// Numeric literal as written.
    Number(String),
    /// `#id`
    Ref(u64),
    /// `.NAME.`
    Enum(String),
    /// `$`
    Omitted,
    /// `*`
    Derived,
    /// `( ... )`
    List(Vec<Param>),
    /// `NAME( ... )`
    Typed { name: String, args: Vec<Param> },
}

impl fmt::Display for Param {
    /// Element text of an argument. Strings lose their quotes and lists
    /// render as their comma-joined items.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Str(s) | Param::Number(s) => f.write_str(s),
            Param::Ref(id) => write!(f, "#{}", id),
            Param::Enum(e) => write!(f, ".{}.", e),
            Param::Omitted => f.write_str("$"),
            Param::Derived => f.write_str("*"),
            Param::List(items) => f.write_str(&join_params(items)),
            Param::Typed { name, args } => write!(f, "{}({})", name, join_params(args)),
        }
    }
}

fn join_params(params: &[Param]) -> String {
    params
        .iter()
        .map(Param::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// A header record or data entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Entity id for data records.
    pub id: Option<u64>,
    /// Record type name. Empty for complex entity instances, whose parts
    /// appear as `Param::Typed` arguments.
    pub name: String,
    pub params: Vec<Param>,
    /// 1-based line where the record starts.
    pub line: usize,
}

/// A parsed element path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepPath<'a> {
    Header { section: &'a str, attribute: &'a str },
    Data { id: u64 },
}

impl<'a> StepPath<'a> {
    /// Split an element path into its addressing mode. `None` when it fits
    /// neither.
    pub fn parse(path: &'a str) -> Option<Self> {
        let (section, attribute) = path.trim().split_once('.')?;
        if section == "DATA" {
            let id = attribute.strip_prefix('#')?.parse().ok()?;
            return Some(StepPath::Data { id });
        }
        if section.is_empty() || attribute.is_empty() {
            return None;
        }
        Some(StepPath::Header { section, attribute })
    }
}

/// A parsed exchange file.
#[derive(Debug, Clone)]
pub struct StepFile {
    path: PathBuf,
    header: Vec<Record>,
    data: BTreeMap<u64, Record>,
}

impl StepFile {
    /// Parse exchange-file text that belongs to `path`.
    pub fn parse(path: impl Into<PathBuf>, content: &str) -> Result<Self> {
        let mut reader = Reader::new(content);
        let mut header = Vec::new();
        let mut data = BTreeMap::new();
        let mut section = Section::Preamble;

        loop {
            reader.skip_trivia()?;
            let Some(c) = reader.peek() else { break };
            let line = reader.line;

            if c == b'#' {
                if section != Section::Data {
                    return Err(Error::parse(line, "entity instance outside DATA section"));
                }
                let record = reader.instance()?;
                if let Some(id) = record.id {
                    data.insert(id, record);
                }
                continue;
            }

            let keyword = reader.keyword();
            if keyword.is_empty() {
                return Err(Error::parse(line, format!("unexpected '{}'", c as char)));
            }
            match keyword {
                "ISO-10303-21" | "END-ISO-10303-21" => {}
                "HEADER" => section = Section::Header,
                "DATA" => {
                    section = Section::Data;
                    reader.skip_trivia()?;
                    if reader.peek() == Some(b'(') {
                        reader.list()?;
                    }
                }
                "ENDSEC" => section = Section::Preamble,
                name if section == Section::Header => {
                    reader.skip_trivia()?;
                    let params = reader.list()?;
                    header.push(Record {
                        id: None,
                        name: name.to_string(),
                        params,
                        line,
                    });
                }
                other => return Err(Error::parse(line, format!("unexpected keyword '{}'", other))),
            }
            reader.skip_trivia()?;
            reader.expect(b';')?;
        }

        debug!(header = header.len(), entities = data.len(), "Parsed exchange file");
        Ok(Self {
            path: path.into(),
            header,
            data,
        })
    }

    /// Read and parse an exchange file.
    pub fn open(path: &Path) -> Result<Self> {
        let content = read_file(path)?;
        Self::parse(path, &content)
    }

    /// The file this exchange file was read from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// First header record with the given name.
    pub fn header_record(&self, name: &str) -> Option<&Record> {
        self.header.iter().find(|r| r.name == name)
    }

    /// Data entity by id.
    pub fn entity(&self, id: u64) -> Option<&Record> {
        self.data.get(&id)
    }

    /// Number of data entities.
    pub fn entity_count(&self) -> usize {
        self.data.len()
    }

    /// Rendered argument at `position` of the record `path` points to.
    pub fn value_at(&self, path: &str, position: usize) -> Option<String> {
        let record = match StepPath::parse(path)? {
            StepPath::Header { section, .. } => self.header_record(section)?,
            StepPath::Data { id } => self.entity(id)?,
        };
        record.params.get(position).map(Param::to_string)
    }

    /// Find which argument of a data record holds `expected`.
    ///
    /// Returns `Ok(None)` when no argument matches or when `path` is not a
    /// data path, and [`Error::AmbiguousIndex`] when several do, so an
    /// index is only ever pinned when the match is unique.
    pub fn resolve_index(&self, path: &str, expected: &str) -> Result<Option<usize>> {
        let Some(StepPath::Data { id }) = StepPath::parse(path) else {
            return Ok(None);
        };
        let Some(record) = self.entity(id) else {
            return Ok(None);
        };
        let positions: Vec<usize> = record
            .params
            .iter()
            .enumerate()
            .filter(|(_, p)| same_value(&p.to_string(), expected))
            .map(|(i, _)| i)
            .collect();

        match positions.len() {
            0 => Ok(None),
            1 => {
                debug!(path, index = positions[0], "Pinned data record index");
                Ok(Some(positions[0]))
            }
            _ => Err(Error::AmbiguousIndex {
                path: path.to_string(),
                value: expected.to_string(),
                positions,
            }),
        }
    }
}

fn same_value(actual: &str, expected: &str) -> bool {
    let (actual, expected) = (actual.trim(), expected.trim());
    if actual == expected {
        return true;
    }
    match (actual.parse::<f64>(), expected.parse::<f64>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

impl FormatAdapter for StepFile {
    fn kind(&self) -> FormatKind {
        FormatKind::Step
    }

    /// Header paths resolve through the position tables. A data path
    /// without a pinned index resolves only when the record has exactly one
    /// argument.
    fn get_value(&self, path: &str) -> Result<Option<ElementValue>> {
        self.get_indexed_value(path, None)
    }

    fn get_indexed_value(&self, path: &str, index: Option<usize>) -> Result<Option<ElementValue>> {
        let value = match StepPath::parse(path) {
            Some(StepPath::Header { section, attribute }) => header_position(section, attribute)
                .and_then(|pos| self.header_record(section)?.params.get(pos))
                .map(Param::to_string),
            Some(StepPath::Data { id }) => self.entity(id).and_then(|record| match index {
                Some(i) => record.params.get(i).map(Param::to_string),
                None if record.params.len() == 1 => Some(record.params[0].to_string()),
                None => None,
            }),
            None => None,
        };
        Ok(value.map(|v| ElementValue::new(v, "")))
    }

    fn resolve_index(&self, path: &str, expected: &str) -> Result<Option<usize>> {
        StepFile::resolve_index(self, path, expected)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Header,
    Data,
}

struct Reader<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: usize,
}

impl<'a> Reader<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            line: 1,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn expect(&mut self, want: u8) -> Result<()> {
        match self.bump() {
            Some(c) if c == want => Ok(()),
            Some(c) => Err(Error::parse(
                self.line,
                format!("expected '{}', found '{}'", want as char, c as char),
            )),
            None => Err(Error::parse(
                self.line,
                format!("expected '{}' at end of input", want as char),
            )),
        }
    }

    /// Skip whitespace and `/* */` comments.
    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match self.peek() {
                Some(c) if c.is_ascii_whitespace() => {
                    self.bump();
                }
                Some(b'/') if self.bytes.get(self.pos + 1) == Some(&b'*') => {
                    let start_line = self.line;
                    self.pos += 2;
                    loop {
                        match self.bump() {
                            Some(b'*') if self.peek() == Some(b'/') => {
                                self.pos += 1;
                                break;
                            }
                            Some(_) => {}
                            None => return Err(Error::parse(start_line, "unterminated comment")),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.bump();
        }
        &self.src[start..self.pos]
    }

    fn keyword(&mut self) -> &'a str {
        self.take_while(|c| c.is_ascii_alphanumeric() || c == b'_' || c == b'-')
    }

    fn entity_id(&mut self) -> Result<u64> {
        self.expect(b'#')?;
        let line = self.line;
        self.take_while(|c| c.is_ascii_digit())
            .parse()
            .map_err(|_| Error::parse(line, "invalid entity reference"))
    }

    /// `#id = NAME(...);` or `#id = (A(...) B(...));`
    fn instance(&mut self) -> Result<Record> {
        let line = self.line;
        let id = self.entity_id()?;
        self.skip_trivia()?;
        self.expect(b'=')?;
        self.skip_trivia()?;

        let record = if self.peek() == Some(b'(') {
            self.bump();
            let mut parts = Vec::new();
            loop {
                self.skip_trivia()?;
                if self.peek() == Some(b')') {
                    self.bump();
                    break;
                }
                let name = self.keyword().to_string();
                if name.is_empty() {
                    return Err(Error::parse(self.line, "expected entity name in complex instance"));
                }
                self.skip_trivia()?;
                let args = self.list()?;
                parts.push(Param::Typed { name, args });
            }
            Record {
                id: Some(id),
                name: String::new(),
                params: parts,
                line,
            }
        } else {
            let name = self.keyword().to_string();
            if name.is_empty() {
                return Err(Error::parse(line, format!("entity #{} has no type name", id)));
            }
            self.skip_trivia()?;
            let params = self.list()?;
            Record {
                id: Some(id),
                name,
                params,
                line,
            }
        };
        self.skip_trivia()?;
        self.expect(b';')?;
        Ok(record)
    }

    /// `( param, param, ... )`
    fn list(&mut self) -> Result<Vec<Param>> {
        self.expect(b'(')?;
        let mut items = Vec::new();
        self.skip_trivia()?;
        if self.peek() == Some(b')') {
            self.bump();
            return Ok(items);
        }
        loop {
            self.skip_trivia()?;
            items.push(self.param()?);
            self.skip_trivia()?;
            match self.bump() {
                Some(b',') => continue,
                Some(b')') => return Ok(items),
                Some(c) => {
                    return Err(Error::parse(
                        self.line,
                        format!("expected ',' or ')', found '{}'", c as char),
                    ))
                }
                None => return Err(Error::parse(self.line, "unterminated argument list")),
            }
        }
    }

    fn param(&mut self) -> Result<Param> {
        let line = self.line;
        match self.peek() {
            Some(b'\'') => self.string().map(Param::Str),
            Some(b'"') => {
                self.bump();
                let hex = self.take_while(|c| c != b'"').to_string();
                self.expect(b'"')?;
                Ok(Param::Str(hex))
            }
            Some(b'#') => self.entity_id().map(Param::Ref),
            Some(b'$') => {
                self.bump();
                Ok(Param::Omitted)
            }
            Some(b'*') => {
                self.bump();
                Ok(Param::Derived)
            }
            Some(b'.') => {
                self.bump();
                let name = self.take_while(|c| c.is_ascii_alphanumeric() || c == b'_').to_string();
                self.expect(b'.')?;
                Ok(Param::Enum(name))
            }
            Some(b'(') => self.list().map(Param::List),
            Some(c) if c.is_ascii_digit() || c == b'-' || c == b'+' => {
                let number = self.take_while(|c| {
                    c.is_ascii_digit() || matches!(c, b'.' | b'-' | b'+' | b'E' | b'e')
                });
                Ok(Param::Number(number.to_string()))
            }
            Some(c) if c.is_ascii_alphabetic() => {
                let name = self.keyword().to_string();
                self.skip_trivia()?;
                let args = self.list()?;
                Ok(Param::Typed { name, args })
            }
            Some(c) => Err(Error::parse(
                line,
                format!("unexpected '{}' in argument list", c as char),
            )),
            None => Err(Error::parse(line, "unexpected end of input")),
        }
    }

    /// `'...'` with `''` standing for one quote.
    fn string(&mut self) -> Result<String> {
        let start_line = self.line;
        self.expect(b'\'')?;
        let mut out = String::new();
        let mut chunk_start = self.pos;
        loop {
            match self.peek() {
                Some(b'\'') => {
                    out.push_str(&self.src[chunk_start..self.pos]);
                    self.bump();
                    if self.peek() == Some(b'\'') {
                        out.push('\'');
                        self.bump();
                        chunk_start = self.pos;
                    } else {
                        return Ok(out);
                    }
                }
                Some(_) => {
                    self.bump();
                }
                None => return Err(Error::parse(start_line, "unterminated string")),
            }
        }
    }
}
