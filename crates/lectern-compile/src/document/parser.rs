//! Line-oriented parser for enriched markdown.
//!
//! Recognizes frontmatter, ATX headings, fenced code, thematic breaks,
//! component elements (`<Name attr="value" />` or `<Name>...</Name>`),
//! raw HTML blocks and paragraphs. Anything structurally broken is a
//! [`ParseError`]; attribute *semantics* are checked later.

use std::collections::BTreeMap;

use super::ast::{Attribute, AttributeValue, CodeBlock, Document, Element, Node, Position};
use crate::error::ParseError;

/// Parse a document.
pub fn parse_document(source: &str) -> Result<Document, ParseError> {
    let lines: Vec<&str> = source.lines().collect();
    let (frontmatter, body_start) = parse_frontmatter(&lines)?;
    let parser = BlockParser { lines: &lines };
    let children = parser.parse_blocks(body_start, lines.len())?;
    Ok(Document {
        frontmatter,
        children,
    })
}

/// Parse `---` delimited `key: value` frontmatter.
///
/// Nested YAML structures are skipped; only top-level scalars are kept.
fn parse_frontmatter(lines: &[&str]) -> Result<(BTreeMap<String, String>, usize), ParseError> {
    let mut map = BTreeMap::new();
    if lines.first().map(|l| l.trim_end()) != Some("---") {
        return Ok((map, 0));
    }

    let Some(offset) = lines
        .iter()
        .skip(1)
        .position(|l| matches!(l.trim_end(), "---" | "..."))
    else {
        return Err(ParseError::new(1, "unterminated frontmatter"));
    };
    let close = offset + 1;

    for line in &lines[1..close] {
        if line.trim().is_empty()
            || line.starts_with(char::is_whitespace)
            || line.starts_with('-')
            || line.starts_with('#')
        {
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim();
            if !key.is_empty() {
                map.insert(key.to_string(), unquote(value.trim()).to_string());
            }
        }
    }

    Ok((map, close + 1))
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

struct BlockParser<'a> {
    lines: &'a [&'a str],
}

impl BlockParser<'_> {
    /// Parse lines `start..end` (0-indexed, exclusive end).
    fn parse_blocks(&self, start: usize, end: usize) -> Result<Vec<Node>, ParseError> {
        let mut nodes = Vec::new();
        let mut i = start;

        while i < end {
            let line = self.lines[i];
            let trimmed = line.trim();

            if trimmed.is_empty() {
                i += 1;
            } else if let Some(fence) = Fence::open(line) {
                let (node, next) = self.parse_fence(i, end, &fence)?;
                nodes.push(node);
                i = next;
            } else if let Some((depth, text)) = atx_heading(trimmed) {
                nodes.push(Node::Heading {
                    depth,
                    text,
                    position: Position::line(i + 1),
                });
                i += 1;
            } else if is_thematic_break(trimmed) {
                nodes.push(Node::ThematicBreak {
                    position: Position::line(i + 1),
                });
                i += 1;
            } else if starts_element(trimmed) {
                let (node, next) = self.parse_element(i, end)?;
                nodes.push(node);
                i = next;
            } else if starts_html(trimmed) {
                let next = self.block_end(i, end, |_| false);
                nodes.push(Node::Html {
                    value: self.lines[i..next].join("\n"),
                    position: Position::new(i + 1, next),
                });
                i = next;
            } else {
                let next = self.block_end(i, end, starts_block);
                nodes.push(Node::Paragraph {
                    text: self.lines[i..next]
                        .iter()
                        .map(|l| l.trim())
                        .collect::<Vec<_>>()
                        .join("\n"),
                    position: Position::new(i + 1, next),
                });
                i = next;
            }
        }

        Ok(nodes)
    }

    /// First index after `start` that is blank or interrupts the block.
    fn block_end(&self, start: usize, end: usize, interrupts: impl Fn(&str) -> bool) -> usize {
        let mut i = start + 1;
        while i < end && !self.lines[i].trim().is_empty() && !interrupts(self.lines[i]) {
            i += 1;
        }
        i
    }

    fn parse_fence(
        &self,
        start: usize,
        end: usize,
        fence: &Fence,
    ) -> Result<(Node, usize), ParseError> {
        let Some(close) = (start + 1..end).find(|&j| fence.closes(self.lines[j])) else {
            return Err(ParseError::new(start + 1, "unterminated code fence"));
        };

        let value = self.lines[start + 1..close]
            .iter()
            .map(|line| strip_indent(line, fence.indent))
            .collect::<Vec<_>>()
            .join("\n");

        let mut info = fence.info.splitn(2, char::is_whitespace);
        let lang = info.next().filter(|s| !s.is_empty()).map(str::to_string);
        let meta = info
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let node = Node::Code(CodeBlock {
            lang,
            meta,
            value,
            position: Some(Position::new(start + 1, close + 1)),
            excerpt: None,
        });
        Ok((node, close + 1))
    }

    fn parse_element(&self, start: usize, end: usize) -> Result<(Node, usize), ParseError> {
        let text = self.lines[start..end].join("\n");
        let indent = self.lines[start].len() - self.lines[start].trim_start().len();

        let mut cursor = TagCursor {
            src: &text,
            pos: indent,
            first_line: start + 1,
        };
        let tag = cursor.open_tag()?;

        let tag_end = start + text[..cursor.pos].matches('\n').count();
        let rest = text[cursor.pos..].split('\n').next().unwrap_or("").trim();
        let closing = format!("</{}>", tag.name);

        let (children, next, end_line) = if tag.self_closing {
            if !rest.is_empty() {
                return Err(ParseError::new(
                    tag_end + 1,
                    format!("unexpected content after <{} />", tag.name),
                ));
            }
            (Vec::new(), tag_end + 1, tag_end + 1)
        } else if !rest.is_empty() {
            // Single-line form: <Name>text</Name>
            let Some(inner) = rest.strip_suffix(closing.as_str()) else {
                return Err(ParseError::new(
                    tag_end + 1,
                    format!("missing closing {closing}"),
                ));
            };
            let inner = inner.trim();
            let children = if inner.is_empty() {
                Vec::new()
            } else {
                vec![Node::Paragraph {
                    text: inner.to_string(),
                    position: Position::line(tag_end + 1),
                }]
            };
            (children, tag_end + 1, tag_end + 1)
        } else {
            let close = self.find_closing(&tag.name, tag_end + 1, end).ok_or_else(|| {
                ParseError::new(start + 1, format!("missing closing {closing}"))
            })?;
            let children = self.parse_blocks(tag_end + 1, close)?;
            (children, close + 1, close + 1)
        };

        let node = Node::Element(Element {
            name: tag.name,
            attributes: tag.attributes,
            children,
            self_closing: tag.self_closing,
            position: Position::new(start + 1, end_line),
        });
        Ok((node, next))
    }

    /// Index of the line closing `name`, accounting for nested elements of
    /// the same name. Lines inside fenced code are skipped.
    fn find_closing(&self, name: &str, from: usize, end: usize) -> Option<usize> {
        let opening = format!("<{name}");
        let closing = format!("</{name}>");
        let mut depth = 0usize;
        let mut fence: Option<Fence> = None;

        for j in from..end {
            let line = self.lines[j];
            if let Some(open) = &fence {
                if open.closes(line) {
                    fence = None;
                }
                continue;
            }
            if let Some(open) = Fence::open(line) {
                fence = Some(open);
                continue;
            }

            let trimmed = line.trim();
            if trimmed == closing {
                if depth == 0 {
                    return Some(j);
                }
                depth -= 1;
            } else if trimmed.starts_with(&opening)
                && trimmed[opening.len()..].starts_with(|c: char| c.is_whitespace() || c == '>')
                && !trimmed.ends_with("/>")
                && !trimmed.ends_with(&closing)
            {
                depth += 1;
            }
        }
        None
    }
}

struct Fence {
    marker: char,
    len: usize,
    indent: usize,
    info: String,
}

impl Fence {
    fn open(line: &str) -> Option<Fence> {
        let rest = line.trim_start();
        let indent = line.len() - rest.len();
        if indent > 3 {
            return None;
        }

        let marker = rest.chars().next()?;
        if marker != '`' && marker != '~' {
            return None;
        }
        let len = rest.chars().take_while(|&c| c == marker).count();
        if len < 3 {
            return None;
        }

        let info = rest[len..].trim();
        if marker == '`' && info.contains('`') {
            return None;
        }

        Some(Fence {
            marker,
            len,
            indent,
            info: info.to_string(),
        })
    }

    fn closes(&self, line: &str) -> bool {
        let trimmed = line.trim();
        let run = trimmed.chars().take_while(|&c| c == self.marker).count();
        run >= self.len && trimmed[run..].trim().is_empty()
    }
}

fn strip_indent(line: &str, indent: usize) -> &str {
    let available = line.len() - line.trim_start_matches(' ').len();
    &line[available.min(indent)..]
}

fn atx_heading(trimmed: &str) -> Option<(u8, String)> {
    let depth = trimmed.chars().take_while(|&c| c == '#').count();
    if depth == 0 || depth > 6 {
        return None;
    }
    let rest = &trimmed[depth..];
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }

    let text = rest.trim().trim_end_matches('#').trim_end();
    Some((depth as u8, text.to_string()))
}

fn is_thematic_break(trimmed: &str) -> bool {
    let Some(marker) = trimmed.chars().next() else {
        return false;
    };
    matches!(marker, '-' | '*' | '_')
        && trimmed.chars().filter(|&c| c == marker).count() >= 3
        && trimmed.chars().all(|c| c == marker || c == ' ')
}

fn starts_element(trimmed: &str) -> bool {
    trimmed
        .strip_prefix('<')
        .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_uppercase()))
}

fn starts_html(trimmed: &str) -> bool {
    trimmed.strip_prefix('<').is_some_and(|rest| {
        rest.starts_with(|c: char| c.is_ascii_lowercase() || c == '/' || c == '!')
    })
}

fn starts_block(line: &str) -> bool {
    let trimmed = line.trim();
    Fence::open(line).is_some()
        || atx_heading(trimmed).is_some()
        || is_thematic_break(trimmed)
        || starts_element(trimmed)
}

struct OpenTag {
    name: String,
    attributes: Vec<Attribute>,
    self_closing: bool,
}

/// Character cursor over the text starting at an element's opening line.
struct TagCursor<'a> {
    src: &'a str,
    pos: usize,
    first_line: usize,
}

impl TagCursor<'_> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn line(&self) -> usize {
        self.first_line + self.src[..self.pos].matches('\n').count()
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.line(), message)
    }

    fn ident(&mut self) -> Option<String> {
        let start = self.pos;
        if !self.peek().is_some_and(|c| c.is_alphabetic() || c == '_') {
            return None;
        }
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))
        {
            self.bump();
        }
        Some(self.src[start..self.pos].to_string())
    }

    fn open_tag(&mut self) -> Result<OpenTag, ParseError> {
        if self.bump() != Some('<') {
            return Err(self.error("expected `<`"));
        }
        let name = self
            .ident()
            .ok_or_else(|| self.error("expected element name"))?;
        let mut attributes = Vec::new();

        loop {
            self.skip_whitespace();
            match self.peek() {
                None => {
                    return Err(ParseError::new(
                        self.first_line,
                        format!("unterminated <{name}> tag"),
                    ));
                }
                Some('/') => {
                    self.bump();
                    if self.bump() != Some('>') {
                        return Err(self.error(format!("expected `>` after `/` in <{name}>")));
                    }
                    return Ok(OpenTag {
                        name,
                        attributes,
                        self_closing: true,
                    });
                }
                Some('>') => {
                    self.bump();
                    return Ok(OpenTag {
                        name,
                        attributes,
                        self_closing: false,
                    });
                }
                Some(c) => {
                    let attr = self.ident().ok_or_else(|| {
                        self.error(format!("unexpected character {c:?} in <{name}> tag"))
                    })?;
                    self.skip_whitespace();
                    let value = if self.peek() == Some('=') {
                        self.bump();
                        self.skip_whitespace();
                        self.value(&attr)?
                    } else {
                        AttributeValue::Bare
                    };
                    attributes.push(Attribute { name: attr, value });
                }
            }
        }
    }

    fn value(&mut self, attr: &str) -> Result<AttributeValue, ParseError> {
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.bump();
                let start = self.pos;
                let Some(len) = self.src[start..].find(quote) else {
                    return Err(self.error(format!("unterminated string in attribute `{attr}`")));
                };
                self.pos = start + len + 1;
                Ok(AttributeValue::String(self.src[start..start + len].to_string()))
            }
            Some('{') => {
                self.bump();
                let start = self.pos;
                let mut depth = 1usize;
                while let Some(c) = self.bump() {
                    match c {
                        '{' => depth += 1,
                        '}' => {
                            depth -= 1;
                            if depth == 0 {
                                let inner = &self.src[start..self.pos - 1];
                                return Ok(AttributeValue::Expression(inner.trim().to_string()));
                            }
                        }
                        '"' | '\'' | '`' => {
                            while let Some(next) = self.bump() {
                                if next == c {
                                    break;
                                }
                            }
                        }
                        _ => {}
                    }
                }
                Err(self.error(format!("unterminated expression in attribute `{attr}`")))
            }
            _ => Err(self.error(format!("value of attribute `{attr}` must be quoted"))),
        }
    }
}
