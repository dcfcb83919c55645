//! Resilient structured-output parser.
//!
//! Model output that is *supposed* to be a JSON object arrives as prose
//! with a fenced block, a bare object with chatter around it, a Python
//! dict literal, or nothing usable at all. [`extract_record`] runs an
//! ordered cascade of pure strategies and returns the first object any of
//! them produces. Failure is routine: callers get `None` and substitute a
//! default record.
//!
//! # Cascade
//!
//! | Step | Region | Strategy |
//! |------|--------|----------|
//! | 1 | fenced ```` ```json ```` block, else the whole trimmed text | — |
//! | 2 | region | strict JSON |
//! | 3 | region | Python literals canonicalized, quotes unified, strict JSON |
//! | 4 | region | loose literal grammar (single quotes, `True`/`None`, trailing commas) |
//! | 5 | first `{` .. last `}` of the raw text | steps 2–4 again |
//!
//! Only objects count. A strategy that yields a scalar or a list has failed.
//! Containers nested deeper than [`MAX_NESTING`] fail every strategy.
//!
//! ```rust
//! use advisory_harness_core::parse::extract_record;
//!
//! let raw = "Sure! {'format': 'visual', 'confidence': 0.9, 'final': True}";
//! let record = extract_record(raw).unwrap();
//! assert_eq!(record["format"], "visual");
//! assert_eq!(record["final"], true);
//!
//! assert!(extract_record("I could not decide, sorry.").is_none());
//! ```

use regex::Regex;
use serde_json::{Map, Number, Value};
use std::sync::OnceLock;

/// A decoded JSON object.
pub type Record = Map<String, Value>;

/// A parse strategy: text in, object out (or nothing).
pub type Strategy = fn(&str) -> Option<Record>;

/// Which strategy produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Direct,
    Normalized,
    Literal,
}

/// Which part of the raw text the record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Fenced,
    Whole,
    Braces,
}

/// A successfully extracted record plus how it was found.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub record: Record,
    pub strategy: StrategyKind,
    pub region: Region,
}

/// Strategies applied to each candidate region, in order.
pub const STRATEGIES: &[(StrategyKind, Strategy)] = &[
    (StrategyKind::Direct, parse_direct),
    (StrategyKind::Normalized, parse_normalized),
    (StrategyKind::Literal, parse_literal),
];

/// Extract a JSON object from free-form model output.
pub fn extract_record(raw: &str) -> Option<Record> {
    extract(raw).map(|e| e.record)
}

/// Like [`extract_record`] but reports the region and strategy that won.
pub fn extract(raw: &str) -> Option<Extraction> {
    if raw.trim().is_empty() {
        return None;
    }

    let (candidate, region) = match fenced_block(raw) {
        Some(body) => (body, Region::Fenced),
        None => (raw.trim(), Region::Whole),
    };
    if let Some((record, strategy)) = run_strategies(candidate) {
        return Some(Extraction {
            record,
            strategy,
            region,
        });
    }

    let inner = outermost_braces(raw)?;
    run_strategies(inner).map(|(record, strategy)| Extraction {
        record,
        strategy,
        region: Region::Braces,
    })
}

fn run_strategies(text: &str) -> Option<(Record, StrategyKind)> {
    STRATEGIES
        .iter()
        .find_map(|(kind, strategy)| strategy(text).map(|r| (r, *kind)))
}

fn fence_regex() -> &'static Regex {
    static FENCE_RE: OnceLock<Regex> = OnceLock::new();
    FENCE_RE.get_or_init(|| {
        Regex::new(r"(?s)```([A-Za-z0-9_+-]*)[ \t]*\r?\n?(.*?)```").expect("fence regex compiles")
    })
}

/// Body of the first fenced block marked `json`, or of the first unmarked
/// fence whose body is an object.
pub fn fenced_block(raw: &str) -> Option<&str> {
    fence_regex().captures_iter(raw).find_map(|caps| {
        let lang = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let body = caps.get(2)?.as_str().trim();
        let marked = lang.eq_ignore_ascii_case("json");
        let bare_object = lang.is_empty() && body.starts_with('{');
        (marked || bare_object).then_some(body)
    })
}

/// Slice from the first `{` to the last `}` inclusive.
pub fn outermost_braces(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Step 2: strict JSON.
pub fn parse_direct(text: &str) -> Option<Record> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Step 3: canonicalize Python-style literals, unify quote style, retry.
pub fn parse_normalized(text: &str) -> Option<Record> {
    let mut normalized = canonicalize_keywords(text).replace(['\n', '\r'], " ");
    if normalized.contains('\'') && !normalized.contains('"') {
        normalized = normalized.replace('\'', "\"");
    }
    parse_direct(&normalized)
}

/// Step 4: loose literal grammar.
pub fn parse_literal(text: &str) -> Option<Record> {
    let mut parser = LooseParser::new(text);
    let value = parser.parse_document()?;
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Rewrite `True`/`False`/`None` barewords outside string literals.
fn canonicalize_keywords(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }

        if c == '"' || c == '\'' {
            quote = Some(c);
            out.push(c);
        } else if c.is_alphabetic() || c == '_' {
            let mut ident = String::from(c);
            while let Some(&next) = chars.peek() {
                if next.is_alphanumeric() || next == '_' {
                    ident.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            out.push_str(match ident.as_str() {
                "True" => "true",
                "False" => "false",
                "None" => "null",
                other => other,
            });
        } else {
            out.push(c);
        }
    }

    out
}

/// Deepest container nesting the loose parser accepts (serde_json's limit).
pub const MAX_NESTING: usize = 128;

/// Recursive-descent parser for JSON plus Python dict-literal syntax.
struct LooseParser {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl LooseParser {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            depth: 0,
        }
    }

    fn enter(&mut self) -> Option<()> {
        if self.depth >= MAX_NESTING {
            return None;
        }
        self.depth += 1;
        Some(())
    }

    fn parse_document(&mut self) -> Option<Value> {
        self.skip_ws();
        let value = self.parse_value()?;
        self.skip_ws();
        (self.pos == self.chars.len()).then_some(value)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn parse_value(&mut self) -> Option<Value> {
        match self.peek()? {
            '{' => self.parse_object(),
            '[' => self.parse_sequence('[', ']'),
            '(' => self.parse_sequence('(', ')'),
            '"' | '\'' => self.parse_string().map(Value::String),
            c if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => self.parse_number(),
            c if c.is_alphabetic() || c == '_' => self.parse_keyword(),
            _ => None,
        }
    }

    fn parse_object(&mut self) -> Option<Value> {
        self.enter()?;
        let value = self.parse_object_body();
        self.depth -= 1;
        value
    }

    fn parse_object_body(&mut self) -> Option<Value> {
        self.eat('{');
        let mut map = Map::new();
        loop {
            self.skip_ws();
            if self.eat('}') {
                return Some(Value::Object(map));
            }
            let key = self.parse_key()?;
            self.skip_ws();
            if !self.eat(':') {
                return None;
            }
            self.skip_ws();
            let value = self.parse_value()?;
            map.insert(key, value);
            self.skip_ws();
            if self.eat(',') {
                continue;
            }
            if self.eat('}') {
                return Some(Value::Object(map));
            }
            return None;
        }
    }

    fn parse_key(&mut self) -> Option<String> {
        match self.peek()? {
            '"' | '\'' => self.parse_string(),
            c if c == '-' || c.is_ascii_digit() => match self.parse_number()? {
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            },
            c if c.is_alphabetic() || c == '_' => Some(self.parse_ident()),
            _ => None,
        }
    }

    fn parse_sequence(&mut self, open: char, close: char) -> Option<Value> {
        self.enter()?;
        let value = self.parse_sequence_body(open, close);
        self.depth -= 1;
        value
    }

    fn parse_sequence_body(&mut self, open: char, close: char) -> Option<Value> {
        self.eat(open);
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.eat(close) {
                return Some(Value::Array(items));
            }
            items.push(self.parse_value()?);
            self.skip_ws();
            if self.eat(',') {
                continue;
            }
            if self.eat(close) {
                return Some(Value::Array(items));
            }
            return None;
        }
    }

    fn parse_string(&mut self) -> Option<String> {
        let quote = self.bump()?;
        let mut out = String::new();
        loop {
            let c = self.bump()?;
            if c == quote {
                return Some(out);
            }
            if c != '\\' {
                out.push(c);
                continue;
            }
            match self.bump()? {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                'b' => out.push('\u{08}'),
                'f' => out.push('\u{0C}'),
                '0' => out.push('\0'),
                'u' => {
                    let hex: String = (0..4).filter_map(|_| self.bump()).collect();
                    let code = u32::from_str_radix(&hex, 16).ok()?;
                    out.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
                }
                c @ ('\\' | '\'' | '"' | '/') => out.push(c),
                other => {
                    out.push('\\');
                    out.push(other);
                }
            }
        }
    }

    fn parse_number(&mut self) -> Option<Value> {
        let start = self.pos;
        while matches!(
            self.peek(),
            Some(c) if c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E')
        ) {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        let text = text.strip_prefix('+').unwrap_or(&text);
        if let Ok(i) = text.parse::<i64>() {
            return Some(Value::Number(i.into()));
        }
        let f = text.parse::<f64>().ok()?;
        Number::from_f64(f).map(Value::Number)
    }

    fn parse_ident(&mut self) -> String {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn parse_keyword(&mut self) -> Option<Value> {
        match self.parse_ident().as_str() {
            "true" | "True" => Some(Value::Bool(true)),
            "false" | "False" => Some(Value::Bool(false)),
            "null" | "None" => Some(Value::Null),
            _ => None,
        }
    }
}

fn svg_fenced_regex() -> &'static Regex {
    static SVG_FENCED_RE: OnceLock<Regex> = OnceLock::new();
    SVG_FENCED_RE.get_or_init(|| {
        Regex::new(r"(?is)```(?:svg|xml)?\s*(<svg.*?</svg>)\s*```").expect("svg fence regex compiles")
    })
}

fn svg_bare_regex() -> &'static Regex {
    static SVG_BARE_RE: OnceLock<Regex> = OnceLock::new();
    SVG_BARE_RE.get_or_init(|| Regex::new(r"(?is)<svg.*?</svg>").expect("svg regex compiles"))
}

/// Pull a standalone SVG document out of model text.
///
/// Tries a fenced block, then a bare `<svg>…</svg>` span, then accepts the
/// whole text if it at least starts like an SVG.
pub fn extract_svg(raw: &str) -> Option<String> {
    if let Some(caps) = svg_fenced_regex().captures(raw) {
        return caps.get(1).map(|m| m.as_str().to_string());
    }
    if let Some(m) = svg_bare_regex().find(raw) {
        return Some(m.as_str().to_string());
    }
    let trimmed = raw.trim();
    trimmed
        .get(..4)
        .filter(|head| head.eq_ignore_ascii_case("<svg"))
        .map(|_| trimmed.to_string())
}
