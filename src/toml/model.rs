use super::{
    DateTime, Float, Int, LocalDate, LocalTime, Offset, QuoteStyle, Seq, Snippet, Text,
    TomlExpr, TomlSyntax, TomlTable,
};
use crate::format::{JsonSink, TextSink};
use crate::DataError;
use ptree::TreeItem;
use serde_json::Value;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

impl Snippet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of(source: String) -> Self {
        Self {
            source: Some(source),
            comments: Vec::new(),
            trailing: None,
        }
    }
}

impl Int {
    pub fn new(val: i64, bits: u8, radix: u32) -> Self {
        Self {
            val,
            bits,
            radix,
            snippet: Snippet::new(),
        }
    }
}

impl PartialEq for Int {
    fn eq(&self, other: &Self) -> bool {
        self.val == other.val && self.bits == other.bits && self.radix == other.radix
    }
}

impl Eq for Int {}

impl Hash for Int {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.val.hash(state);
        self.bits.hash(state);
        self.radix.hash(state);
    }
}

impl Float {
    pub fn new(val: f64) -> Self {
        Self {
            val,
            snippet: Snippet::new(),
        }
    }
}

impl PartialEq for Float {
    fn eq(&self, other: &Self) -> bool {
        self.val.to_bits() == other.val.to_bits()
    }
}

impl Eq for Float {}

impl Hash for Float {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.val.to_bits().hash(state);
    }
}

impl DateTime {
    pub fn date(date: LocalDate) -> Self {
        Self {
            date: Some(date),
            time: None,
            offset: Offset::None,
            snippet: Snippet::new(),
        }
    }

    pub fn time(time: LocalTime) -> Self {
        Self {
            date: None,
            time: Some(time),
            offset: Offset::None,
            snippet: Snippet::new(),
        }
    }

    /// The RFC 3339 rendering of whichever parts are present.
    pub fn rfc3339(&self) -> String {
        let mut out = String::new();
        if let Some(date) = &self.date {
            out.push_str(&format!("{:04}", date.year));
            if let Some((month, day)) = date.month_day {
                out.push_str(&format!("-{:02}-{:02}", month, day));
            }
        }
        if let Some(time) = &self.time {
            if self.date.is_some() {
                out.push('T');
            }
            let (minute, second) = time.min_sec.unwrap_or((0, 0));
            out.push_str(&format!("{:02}:{:02}:{:02}", time.hour, minute, second));
            if let Some(fraction) = &time.fraction {
                out.push('.');
                out.push_str(fraction);
            }
        }
        match self.offset {
            Offset::None => {}
            Offset::Z => out.push('Z'),
            Offset::Plus(h, m) => out.push_str(&format!("+{:02}:{:02}", h, m)),
            Offset::Minus(h, m) => out.push_str(&format!("-{:02}:{:02}", h, m)),
        }
        out
    }
}

impl PartialEq for DateTime {
    fn eq(&self, other: &Self) -> bool {
        self.date == other.date && self.time == other.time && self.offset == other.offset
    }
}

impl Eq for DateTime {}

impl Hash for DateTime {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.date.hash(state);
        self.time.hash(state);
        self.offset.hash(state);
    }
}

impl Text {
    pub fn bare(val: &str) -> Self {
        Self {
            val: val.to_string(),
            quote: QuoteStyle::Bare,
            snippet: Snippet::of(val.to_string()),
        }
    }

    pub fn quoted(val: &str, quote: QuoteStyle) -> Self {
        Self {
            val: val.to_string(),
            quote,
            snippet: Snippet::new(),
        }
    }

    pub fn is_bare(&self) -> bool {
        self.quote == QuoteStyle::Bare
    }
}

impl PartialEq for Text {
    fn eq(&self, other: &Self) -> bool {
        self.val == other.val && self.quote == other.quote
    }
}

impl Eq for Text {}

impl Hash for Text {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.val.hash(state);
        self.quote.hash(state);
    }
}

impl TomlTable {
    /// A block table; the document root is one.
    pub fn block() -> Self {
        Self {
            entries: Vec::new(),
            inline: false,
            snippet: Snippet::new(),
        }
    }

    /// An immutable `{ .. }` table.
    pub fn braced() -> Self {
        Self {
            entries: Vec::new(),
            inline: true,
            snippet: Snippet::new(),
        }
    }

    pub fn entries(&self) -> &[(Text, TomlExpr)] {
        &self.entries
    }

    pub fn get(&self, key: &str) -> Option<&TomlExpr> {
        self.entries
            .iter()
            .find(|(k, _)| k.val == key)
            .map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut TomlExpr> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k.val == key)
            .map(|(_, v)| v)
    }

    /// Insert a pair; a re-assigned key replaces the prior value in place and returns it.
    pub fn insert(&mut self, key: Text, value: TomlExpr) -> Option<TomlExpr> {
        match self.entries.iter_mut().find(|(k, _)| k.val == key.val) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Text, TomlExpr)> {
        self.entries.iter()
    }
}

impl PartialEq for TomlTable {
    fn eq(&self, other: &Self) -> bool {
        self.inline == other.inline && self.entries == other.entries
    }
}

impl Eq for TomlTable {}

impl Seq {
    pub fn new(inline: bool) -> Self {
        Self {
            items: Vec::new(),
            inline,
            snippet: Snippet::new(),
        }
    }

    pub fn push(&mut self, item: TomlExpr) {
        self.items.push(item);
    }

    pub fn get(&self, at: usize) -> Option<&TomlExpr> {
        self.items.get(at)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TomlExpr> {
        self.items.iter()
    }
}

impl PartialEq for Seq {
    fn eq(&self, other: &Self) -> bool {
        self.inline == other.inline && self.items == other.items
    }
}

impl Eq for Seq {}

fn escape_basic(val: &str) -> String {
    let mut out = String::new();
    for ch in val.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

fn render_key(key: &Text, sink: &mut TextSink) {
    match key.quote {
        QuoteStyle::Bare => sink.append(&key.val),
        QuoteStyle::Basic | QuoteStyle::MultiBasic => {
            sink.append(&format!("\"{}\"", escape_basic(&key.val)))
        }
        QuoteStyle::Literal | QuoteStyle::MultiLiteral => {
            sink.append(&format!("'{}'", key.val))
        }
    }
}

fn emit_comments(snippet: &Snippet, sink: &mut TextSink) {
    for comment in &snippet.comments {
        if !sink.keeps_comments() {
            break;
        }
        sink.append("# ");
        sink.append(comment);
        sink.line_break();
        sink.note_comment_line();
    }
}

fn emit_trailing(snippet: &Snippet, sink: &mut TextSink) {
    if let Some(comment) = &snippet.trailing {
        if sink.keeps_comments() {
            sink.append(" # ");
            sink.append(comment);
            sink.note_comment_line();
        }
    }
}

impl TomlExpr {
    pub fn snippet(&self) -> &Snippet {
        match self {
            TomlExpr::Int(e) => &e.snippet,
            TomlExpr::Float(e) => &e.snippet,
            TomlExpr::DateTime(e) => &e.snippet,
            TomlExpr::Text(e) => &e.snippet,
            TomlExpr::Table(e) => &e.snippet,
            TomlExpr::Seq(e) => &e.snippet,
        }
    }

    pub fn snippet_mut(&mut self) -> &mut Snippet {
        match self {
            TomlExpr::Int(e) => &mut e.snippet,
            TomlExpr::Float(e) => &mut e.snippet,
            TomlExpr::DateTime(e) => &mut e.snippet,
            TomlExpr::Text(e) => &mut e.snippet,
            TomlExpr::Table(e) => &mut e.snippet,
            TomlExpr::Seq(e) => &mut e.snippet,
        }
    }

    /// Whether the expression renders as a block child (a block table or an array of
    /// tables) rather than on the key's own line.
    fn is_block(&self) -> bool {
        match self {
            TomlExpr::Table(t) => !t.inline,
            TomlExpr::Seq(s) => !s.inline,
            _ => false,
        }
    }

    /// The inline (value position) rendering.
    pub fn render_value(&self, sink: &mut TextSink) {
        match self {
            TomlExpr::Int(int) => match &int.snippet.source {
                Some(source) => sink.append(source),
                None => sink.append(&int.val.to_string()),
            },
            TomlExpr::Float(float) => match &float.snippet.source {
                Some(source) => sink.append(source),
                None => {
                    let val = float.val;
                    if val.is_nan() {
                        sink.append("nan");
                    } else if val.is_infinite() {
                        sink.append(if val < 0.0 { "-inf" } else { "inf" });
                    } else if val == val.trunc() {
                        sink.append(&format!("{:.1}", val));
                    } else {
                        sink.append(&val.to_string());
                    }
                }
            },
            TomlExpr::DateTime(dt) => match &dt.snippet.source {
                Some(source) => sink.append(source),
                None => sink.append(&dt.rfc3339()),
            },
            TomlExpr::Text(text) => match text.quote {
                QuoteStyle::Bare => sink.append(&text.val),
                QuoteStyle::Basic => sink.append(&format!("\"{}\"", escape_basic(&text.val))),
                QuoteStyle::MultiBasic => {
                    sink.append(&format!("\"\"\"{}\"\"\"", text.val))
                }
                QuoteStyle::Literal => sink.append(&format!("'{}'", text.val)),
                QuoteStyle::MultiLiteral => sink.append(&format!("'''{}'''", text.val)),
            },
            TomlExpr::Table(table) => {
                sink.append("{");
                for (at, (key, value)) in table.entries.iter().enumerate() {
                    if at > 0 {
                        sink.append(",");
                    }
                    sink.space();
                    render_key(key, sink);
                    sink.space();
                    sink.append("=");
                    sink.space();
                    value.render_value(sink);
                }
                sink.space();
                sink.append("}");
            }
            TomlExpr::Seq(seq) => {
                sink.append("[");
                for (at, item) in seq.items.iter().enumerate() {
                    if at > 0 {
                        sink.append(",");
                        sink.space();
                    }
                    item.render_value(sink);
                }
                sink.append("]");
            }
        }
    }

    fn render_table(table: &TomlTable, path: &mut Vec<String>, sink: &mut TextSink) {
        for (key, value) in &table.entries {
            if value.is_block() {
                continue;
            }
            emit_comments(value.snippet(), sink);
            render_key(key, sink);
            sink.space();
            sink.append("=");
            sink.space();
            value.render_value(sink);
            emit_trailing(value.snippet(), sink);
            sink.line_break();
        }
        for (key, value) in &table.entries {
            match value {
                TomlExpr::Table(child) if !child.inline => {
                    path.push(key.val.clone());
                    sink.soft_break();
                    emit_comments(&child.snippet, sink);
                    sink.append(&format!("[{}]", path.join(".")));
                    sink.line_break();
                    Self::render_table(child, path, sink);
                    path.pop();
                }
                TomlExpr::Seq(seq) if !seq.inline => {
                    path.push(key.val.clone());
                    for item in &seq.items {
                        if let TomlExpr::Table(child) = item {
                            sink.soft_break();
                            emit_comments(&child.snippet, sink);
                            sink.append(&format!("[[{}]]", path.join(".")));
                            sink.line_break();
                            Self::render_table(child, path, sink);
                        }
                    }
                    path.pop();
                }
                _ => {}
            }
        }
    }

    /// Push the expression onto a text sink: a block table renders as a document, anything
    /// else in its value form.
    pub fn format(&self, sink: &mut TextSink, _syntax: &TomlSyntax) {
        match self {
            TomlExpr::Table(table) if !table.inline => {
                Self::render_table(table, &mut Vec::new(), sink);
            }
            other => other.render_value(sink),
        }
    }

    /// The JSON value of the expression; the only failures are target incompatibilities.
    pub fn to_json(&self) -> Result<Value, DataError> {
        match self {
            TomlExpr::Int(int) => Ok(Value::from(int.val)),
            TomlExpr::Float(float) => {
                if float.val.is_finite() {
                    Ok(Value::from(float.val))
                } else {
                    Err(DataError::formatting(
                        "A JSON sink cannot hold a non-finite number.".into(),
                    ))
                }
            }
            TomlExpr::DateTime(dt) => Ok(Value::String(dt.rfc3339())),
            TomlExpr::Text(text) => match (text.is_bare(), text.val.as_str()) {
                (true, "true") => Ok(Value::Bool(true)),
                (true, "false") => Ok(Value::Bool(false)),
                _ => Ok(Value::String(text.val.clone())),
            },
            TomlExpr::Table(table) => {
                let mut map = serde_json::Map::new();
                for (key, value) in &table.entries {
                    map.insert(key.val.clone(), value.to_json()?);
                }
                Ok(Value::Object(map))
            }
            TomlExpr::Seq(seq) => {
                let mut items = Vec::with_capacity(seq.items.len());
                for item in &seq.items {
                    items.push(item.to_json()?);
                }
                Ok(Value::Array(items))
            }
        }
    }

    /// Push the expression onto a JSON sink.
    pub fn format_json(&self, sink: &mut JsonSink) -> Result<(), DataError> {
        let value = self.to_json()?;
        sink.append(value);
        Ok(())
    }

    /// Print the expression as a tree (debugging).
    pub fn print(&self) -> Result<(), std::io::Error> {
        ptree::print_tree(self)
    }
}

impl Eq for TomlExpr {}

impl Hash for TomlExpr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            TomlExpr::Int(e) => {
                0u8.hash(state);
                e.hash(state);
            }
            TomlExpr::Float(e) => {
                1u8.hash(state);
                e.hash(state);
            }
            TomlExpr::DateTime(e) => {
                2u8.hash(state);
                e.hash(state);
            }
            TomlExpr::Text(e) => {
                3u8.hash(state);
                e.hash(state);
            }
            TomlExpr::Table(e) => {
                4u8.hash(state);
                e.inline.hash(state);
                for (key, value) in &e.entries {
                    key.hash(state);
                    value.hash(state);
                }
            }
            TomlExpr::Seq(e) => {
                5u8.hash(state);
                e.inline.hash(state);
                for item in &e.items {
                    item.hash(state);
                }
            }
        }
    }
}

impl Display for TomlExpr {
    /// Best-effort round-trip rendering through a pretty sink.
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut sink = TextSink::pretty();
        self.format(&mut sink, &TomlSyntax::default());
        write!(f, "{}", sink.data())
    }
}

impl TreeItem for TomlExpr {
    type Child = TomlExpr;

    fn write_self<W: std::io::Write>(&self, f: &mut W, _: &ptree::Style) -> std::io::Result<()> {
        match self {
            TomlExpr::Int(int) => write!(f, "int {} # {} bits", int.val, int.bits),
            TomlExpr::Float(float) => write!(f, "float {}", float.val),
            TomlExpr::DateTime(dt) => write!(f, "date-time {}", dt.rfc3339()),
            TomlExpr::Text(text) => write!(f, "text {:?}", text.val),
            TomlExpr::Table(table) => write!(f, "table # {} entries", table.len()),
            TomlExpr::Seq(seq) => write!(f, "seq # {} items", seq.len()),
        }
    }

    fn children(&self) -> std::borrow::Cow<[Self::Child]> {
        match self {
            TomlExpr::Table(table) => std::borrow::Cow::from(
                table
                    .entries
                    .iter()
                    .map(|(_, v)| v.clone())
                    .collect::<Vec<_>>(),
            ),
            TomlExpr::Seq(seq) => std::borrow::Cow::from(seq.items.clone()),
            _ => std::borrow::Cow::from(Vec::new()),
        }
    }
}
