//! Embed directive validation.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::range::{LineRange, RangeSet};
use super::sources::{SourceFiles, SourceText};
use crate::document::{AttributeValue, Element};
use crate::error::ValidationError;

/// Element name of the embed directive.
pub const EMBED_ELEMENT: &str = "EmbeddedFile";

const KNOWN_ATTRIBUTES: &[&str] = &[
    "file",
    "range",
    "highlight",
    "showLineNumbers",
    "allowCopy",
    "buttons",
];

/// Action button rendered next to an excerpt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonKind {
    Problem,
    Solution,
    Playground,
}

impl ButtonKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ButtonKind::Problem => "problem",
            ButtonKind::Solution => "solution",
            ButtonKind::Playground => "playground",
        }
    }
}

impl fmt::Display for ButtonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ButtonKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "problem" => Ok(ButtonKind::Problem),
            "solution" => Ok(ButtonKind::Solution),
            "playground" => Ok(ButtonKind::Playground),
            other => Err(format!(
                "unknown button \"{other}\" (expected problem, solution or playground)"
            )),
        }
    }
}

/// A validated embed directive.
#[derive(Debug, Clone)]
pub struct EmbedSpec {
    /// `file` as written, relative to the document
    pub file: String,
    /// `file` resolved against the document's directory
    pub path: PathBuf,
    /// Declared ranges; empty means the whole file
    pub ranges: RangeSet,
    pub highlight: RangeSet,
    pub show_line_numbers: bool,
    pub allow_copy: bool,
    pub buttons: Vec<ButtonKind>,
    pub source: Arc<SourceText>,
}

impl EmbedSpec {
    /// Ranges to slice: the declared ones, or the whole file.
    pub fn effective_ranges(&self) -> RangeSet {
        if self.ranges.is_empty() {
            RangeSet::whole(self.source.line_count())
        } else {
            self.ranges.clone()
        }
    }

    /// Validate an `<EmbeddedFile />` element against the loaded sources.
    ///
    /// Every problem found is reported; a directive is either fully valid
    /// or produces no output at all.
    pub fn parse(
        element: &Element,
        document_dir: &Path,
        sources: &SourceFiles,
    ) -> Result<EmbedSpec, Vec<ValidationError>> {
        let mut errors = Vec::new();
        let attr = |msg: String| ValidationError::Attribute(msg);

        for attribute in &element.attributes {
            if !KNOWN_ATTRIBUTES.contains(&attribute.name.as_str()) {
                errors.push(attr(format!("unknown attribute `{}`", attribute.name)));
            }
        }
        for name in KNOWN_ATTRIBUTES {
            if element.attributes.iter().filter(|a| a.name == *name).count() > 1 {
                errors.push(attr(format!("attribute `{name}` given more than once")));
            }
        }

        let file = match string_attribute(element, "file") {
            Ok(Some(file)) if !file.trim().is_empty() => Some(file.trim().to_string()),
            Ok(_) => {
                errors.push(attr("missing required attribute `file`".to_string()));
                None
            }
            Err(e) => {
                errors.push(e);
                None
            }
        };

        let source = file.as_ref().and_then(|file| {
            let path = resolve(document_dir, file);
            match sources.get(&path) {
                Ok(source) => Some(source),
                Err(reason) => {
                    errors.push(ValidationError::FileAccess {
                        file: file.clone(),
                        reason,
                    });
                    None
                }
            }
        });

        let ranges = parse_ranges(element, "range", &mut errors);
        let highlight = parse_ranges(element, "highlight", &mut errors);
        let show_line_numbers = bool_attribute(element, "showLineNumbers", true, &mut errors);
        let allow_copy = bool_attribute(element, "allowCopy", true, &mut errors);
        let buttons = parse_buttons(element, &mut errors);

        if let Some(source) = &source {
            let line_count = source.line_count();
            for e in ranges.out_of_bounds(line_count) {
                errors.push(attr(format!("invalid `range`: {e}")));
            }

            let covering = if ranges.is_empty() {
                RangeSet::whole(line_count)
            } else {
                ranges.clone()
            };
            for h in highlight.iter() {
                if !covering.covers(h) {
                    errors.push(attr(format!(
                        "highlight {h} is not inside {}",
                        describe_ranges(&ranges)
                    )));
                }
            }
        }

        match (file, source) {
            (Some(file), Some(source)) if errors.is_empty() => Ok(EmbedSpec {
                path: source.path.clone(),
                file,
                ranges,
                highlight,
                show_line_numbers,
                allow_copy,
                buttons,
                source,
            }),
            _ => Err(errors),
        }
    }

    /// Highlighted lines that fall within `range`.
    pub fn highlight_within(&self, range: &LineRange) -> Vec<LineRange> {
        self.highlight
            .iter()
            .filter(|h| range.contains(h))
            .copied()
            .collect()
    }
}

/// Resolve a `file` attribute relative to the document directory.
pub fn resolve(document_dir: &Path, file: &str) -> PathBuf {
    document_dir.join(file)
}

fn describe_ranges(ranges: &RangeSet) -> String {
    if ranges.is_empty() {
        "the file".to_string()
    } else {
        format!("range {ranges}")
    }
}

fn string_attribute<'a>(
    element: &'a Element,
    name: &str,
) -> Result<Option<&'a str>, ValidationError> {
    match element.attribute(name) {
        None => Ok(None),
        Some(AttributeValue::String(value)) => Ok(Some(value)),
        Some(_) => Err(ValidationError::Attribute(format!(
            "attribute `{name}` must be a string literal"
        ))),
    }
}

fn parse_ranges(element: &Element, name: &str, errors: &mut Vec<ValidationError>) -> RangeSet {
    match string_attribute(element, name) {
        Ok(Some(value)) => match RangeSet::parse(value) {
            Ok(set) => set,
            Err(range_errors) => {
                errors.extend(
                    range_errors
                        .into_iter()
                        .map(|e| ValidationError::Attribute(format!("invalid `{name}`: {e}"))),
                );
                RangeSet::default()
            }
        },
        Ok(None) => RangeSet::default(),
        Err(e) => {
            errors.push(e);
            RangeSet::default()
        }
    }
}

fn bool_attribute(
    element: &Element,
    name: &str,
    default: bool,
    errors: &mut Vec<ValidationError>,
) -> bool {
    let raw = match element.attribute(name) {
        None => return default,
        Some(AttributeValue::Bare) => return true,
        Some(AttributeValue::String(value)) | Some(AttributeValue::Expression(value)) => value,
    };
    match raw.trim() {
        "true" => true,
        "false" => false,
        other => {
            errors.push(ValidationError::Attribute(format!(
                "attribute `{name}` must be true or false, got \"{other}\""
            )));
            default
        }
    }
}

fn parse_buttons(element: &Element, errors: &mut Vec<ValidationError>) -> Vec<ButtonKind> {
    let value = match string_attribute(element, "buttons") {
        Ok(Some(value)) => value,
        Ok(None) => return Vec::new(),
        Err(e) => {
            errors.push(e);
            return Vec::new();
        }
    };

    let mut buttons = Vec::new();
    for item in value.split(',') {
        match item.trim().parse::<ButtonKind>() {
            Ok(kind) if !buttons.contains(&kind) => buttons.push(kind),
            Ok(_) => {}
            Err(e) => errors.push(ValidationError::Attribute(e)),
        }
    }
    buttons
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Attribute, Position};
    use std::fs;
    use tempfile::TempDir;

    fn element(attrs: &[(&str, AttributeValue)]) -> Element {
        Element {
            name: EMBED_ELEMENT.to_string(),
            attributes: attrs
                .iter()
                .map(|(name, value)| Attribute {
                    name: name.to_string(),
                    value: value.clone(),
                })
                .collect(),
            children: Vec::new(),
            self_closing: true,
            position: Position::line(1),
        }
    }

    fn s(value: &str) -> AttributeValue {
        AttributeValue::String(value.to_string())
    }

    async fn fixture() -> (TempDir, SourceFiles) {
        let temp = TempDir::new().unwrap();
        let body: String = (1..=10).map(|i| format!("line {i}\n")).collect();
        fs::write(temp.path().join("a.ts"), body).unwrap();
        let sources = SourceFiles::preload([temp.path().join("a.ts")]).await;
        (temp, sources)
    }

    fn messages(errors: &[ValidationError]) -> Vec<String> {
        errors.iter().map(|e| e.to_string()).collect()
    }

    #[tokio::test]
    async fn test_valid_directive() {
        let (temp, sources) = fixture().await;
        let el = element(&[
            ("file", s("a.ts")),
            ("range", s("1-3,5")),
            ("highlight", s("2")),
            ("showLineNumbers", AttributeValue::Expression("false".into())),
            ("buttons", s("problem, solution,problem")),
        ]);

        let spec = EmbedSpec::parse(&el, temp.path(), &sources).unwrap();
        assert_eq!(spec.ranges.to_string(), "1-3,5");
        assert!(!spec.show_line_numbers);
        assert!(spec.allow_copy);
        assert_eq!(spec.buttons, vec![ButtonKind::Problem, ButtonKind::Solution]);
        assert_eq!(spec.highlight_within(&LineRange::new(1, 3)), vec![LineRange::single(2)]);
    }

    #[tokio::test]
    async fn test_highlight_outside_ranges() {
        let (temp, sources) = fixture().await;
        let el = element(&[
            ("file", s("a.ts")),
            ("range", s("1-3,5")),
            ("highlight", s("9-9")),
        ]);

        let errors = EmbedSpec::parse(&el, temp.path(), &sources).unwrap_err();
        assert_eq!(messages(&errors), vec!["highlight 9 is not inside range 1-3,5"]);
    }

    #[tokio::test]
    async fn test_range_past_end_of_file() {
        let (temp, sources) = fixture().await;
        let el = element(&[("file", s("a.ts")), ("range", s("8-12"))]);

        let errors = EmbedSpec::parse(&el, temp.path(), &sources).unwrap_err();
        assert_eq!(
            messages(&errors),
            vec!["invalid `range`: range 8-12 is outside the file (10 lines)"]
        );
    }

    #[tokio::test]
    async fn test_collects_all_problems() {
        let (temp, sources) = fixture().await;
        let el = element(&[
            ("file", s("a.ts")),
            ("range", s("5-3")),
            ("buttons", s("deploy")),
            ("allowCopy", s("sometimes")),
            ("colour", s("red")),
        ]);

        let errors = EmbedSpec::parse(&el, temp.path(), &sources).unwrap_err();
        assert_eq!(errors.len(), 4);
    }

    #[tokio::test]
    async fn test_missing_file_attribute() {
        let (temp, sources) = fixture().await;
        let errors = EmbedSpec::parse(&element(&[]), temp.path(), &sources).unwrap_err();
        assert_eq!(messages(&errors), vec!["missing required attribute `file`"]);
    }

    #[tokio::test]
    async fn test_unreadable_file() {
        let (temp, sources) = fixture().await;
        let el = element(&[("file", s("missing.ts"))]);

        let errors = EmbedSpec::parse(&el, temp.path(), &sources).unwrap_err();
        assert!(matches!(&errors[0], ValidationError::FileAccess { file, .. } if file == "missing.ts"));
    }

    #[tokio::test]
    async fn test_whole_file_by_default() {
        let (temp, sources) = fixture().await;
        let el = element(&[("file", s("a.ts")), ("highlight", s("10"))]);

        let spec = EmbedSpec::parse(&el, temp.path(), &sources).unwrap();
        assert_eq!(spec.effective_ranges().ranges(), &[LineRange::new(1, 10)]);
    }

    #[test]
    fn test_button_kind_round_trips_through_str() {
        for kind in [ButtonKind::Problem, ButtonKind::Solution, ButtonKind::Playground] {
            assert_eq!(kind.as_str().parse::<ButtonKind>(), Ok(kind));
        }
    }
}
