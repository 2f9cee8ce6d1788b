//! Line ranges for `range` and `highlight` attributes.
//!
//! Grammar: a comma separated list of `N` or `N-M`, where `N` and `M` are
//! positive decimal integers. Whitespace around items is allowed; nothing
//! else is.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Inclusive, 1-indexed line range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn single(line: usize) -> Self {
        Self::new(line, line)
    }

    pub fn contains(&self, other: &LineRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn overlaps(&self, other: &LineRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl fmt::Display for LineRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Problems with a range list.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    #[error("\"{0}\" is not a line range (expected N or N-M)")]
    Syntax(String),

    #[error("line numbers start at 1, got {0}")]
    Zero(LineRange),

    #[error("range {0} ends before it starts")]
    Descending(LineRange),

    #[error("range {next} overlaps {previous}")]
    Overlap { previous: LineRange, next: LineRange },

    #[error("range {next} comes after {previous}; ranges must be in ascending order")]
    OutOfOrder { previous: LineRange, next: LineRange },

    #[error("range {range} is outside the file ({line_count} lines)")]
    OutOfBounds { range: LineRange, line_count: usize },
}

/// Ordered, non-overlapping list of line ranges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RangeSet(Vec<LineRange>);

impl RangeSet {
    /// Parse and validate a range list.
    ///
    /// A syntax error stops parsing; ordering problems are all collected.
    pub fn parse(input: &str) -> Result<Self, Vec<RangeError>> {
        let mut ranges = Vec::new();
        for item in input.split(',') {
            ranges.push(parse_item(item).map_err(|e| vec![e])?);
        }

        let mut errors = Vec::new();
        let mut previous: Option<LineRange> = None;
        for &range in &ranges {
            if range.start == 0 {
                errors.push(RangeError::Zero(range));
                continue;
            }
            if range.end < range.start {
                errors.push(RangeError::Descending(range));
                continue;
            }
            if let Some(prev) = previous {
                if prev.overlaps(&range) {
                    errors.push(RangeError::Overlap {
                        previous: prev,
                        next: range,
                    });
                    continue;
                }
                if range.start < prev.start {
                    errors.push(RangeError::OutOfOrder {
                        previous: prev,
                        next: range,
                    });
                    continue;
                }
            }
            previous = Some(range);
        }

        if errors.is_empty() {
            Ok(Self(ranges))
        } else {
            Err(errors)
        }
    }

    /// A single range covering a whole file. An empty file still yields line 1.
    pub fn whole(line_count: usize) -> Self {
        Self(vec![LineRange::new(1, line_count.max(1))])
    }

    pub fn ranges(&self) -> &[LineRange] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &LineRange> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Ranges that extend past the end of a file.
    pub fn out_of_bounds(&self, line_count: usize) -> Vec<RangeError> {
        self.0
            .iter()
            .filter(|r| r.end > line_count)
            .map(|&range| RangeError::OutOfBounds { range, line_count })
            .collect()
    }

    /// Whether some range in this set fully contains `range`.
    pub fn covers(&self, range: &LineRange) -> bool {
        self.0.iter().any(|r| r.contains(range))
    }
}

impl fmt::Display for RangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, range) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{range}")?;
        }
        Ok(())
    }
}

fn parse_item(item: &str) -> Result<LineRange, RangeError> {
    let syntax = || RangeError::Syntax(item.trim().to_string());
    let item = item.trim();

    let (start, end) = match item.split_once('-') {
        Some((start, end)) => (start.trim(), end.trim()),
        None => (item, item),
    };

    let number = |s: &str| -> Result<usize, RangeError> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(syntax());
        }
        s.parse().map_err(|_| syntax())
    };

    Ok(LineRange::new(number(start)?, number(end)?))
}
