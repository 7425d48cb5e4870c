//! Hierarchical, typed addresses for nodes of the descriptor tree.
//!
//! A [`UniqueId`] is an ordered sequence of `(kind, value)` segments. Its string form is
//!
//! ```text
//! kind:value(,kind:value)*
//! ```
//!
//! where `%`, `,` and `:` inside a kind or value are written as `%25`, `%2C` and `%3A`. Parsing is strict (no raw
//! `:` inside a value, uppercase escapes only) so that parsing and serializing are exact inverses.
//!
//! ## Examples
//! ```rust
//! use trellis_core::UniqueId;
//!
//! let engine = UniqueId::root("engine", "trellis");
//! let test = engine.append("container", "Calc").append("member", "add(Int, Int)");
//!
//! let text = test.to_string();
//! assert_eq!(text, "engine:trellis,container:Calc,member:add(Int%2C Int)");
//! assert_eq!(UniqueId::parse(&text).unwrap(), test);
//! assert!(test.is_descendant_of(&engine));
//! ```

use std::fmt;
use std::str::FromStr;

use miette::Diagnostic;
use thiserror::Error;

const SEGMENT_DELIMITER: char = ',';
const KIND_DELIMITER: char = ':';
const ESCAPE: char = '%';

/// One `(kind, value)` pair of a [`UniqueId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Segment {
    kind: String,
    value: String,
}

impl Segment {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_escaped(f, &self.kind)?;
        write!(f, "{KIND_DELIMITER}")?;
        write_escaped(f, &self.value)
    }
}

/// Errors produced while parsing the string form of a [`UniqueId`].
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum UniqueIdParseError {
    #[error("unique id must not be empty")]
    #[diagnostic(code(trellis::unique_id::empty))]
    Empty,

    #[error("segment {index} of unique id '{input}' is empty")]
    #[diagnostic(code(trellis::unique_id::empty_segment))]
    EmptySegment { input: String, index: usize },

    #[error("segment '{segment}' of unique id '{input}' has no ':' between kind and value")]
    #[diagnostic(code(trellis::unique_id::missing_kind))]
    MissingKind { input: String, segment: String },

    #[error("segment '{segment}' of unique id '{input}' contains an unescaped ':'")]
    #[diagnostic(
        code(trellis::unique_id::unescaped_delimiter),
        help("write ':' inside a kind or value as %3A")
    )]
    UnescapedDelimiter { input: String, segment: String },

    #[error("invalid escape sequence '{sequence}' in unique id '{input}'")]
    #[diagnostic(
        code(trellis::unique_id::invalid_escape),
        help("only %25, %2C and %3A are valid escapes")
    )]
    InvalidEscape { input: String, sequence: String },
}

/// Hierarchical address of a node in the descriptor tree.
///
/// Segments are immutable once constructed; [`UniqueId::append`] returns a new id. Two ids are equal iff their
/// segment sequences are equal, and an id is an ancestor of another iff its segments are a leading subsequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UniqueId {
    segments: Vec<Segment>,
}

impl UniqueId {
    /// Create a one-segment id, typically the engine root.
    pub fn root(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            segments: vec![Segment::new(kind, value)],
        }
    }

    /// Parse the string form produced by [`fmt::Display`].
    pub fn parse(input: &str) -> Result<Self, UniqueIdParseError> {
        if input.is_empty() {
            return Err(UniqueIdParseError::Empty);
        }

        let mut segments = Vec::new();
        for (index, raw) in input.split(SEGMENT_DELIMITER).enumerate() {
            if raw.is_empty() {
                return Err(UniqueIdParseError::EmptySegment {
                    input: input.to_string(),
                    index,
                });
            }
            let Some((kind, value)) = raw.split_once(KIND_DELIMITER) else {
                return Err(UniqueIdParseError::MissingKind {
                    input: input.to_string(),
                    segment: raw.to_string(),
                });
            };
            if value.contains(KIND_DELIMITER) {
                return Err(UniqueIdParseError::UnescapedDelimiter {
                    input: input.to_string(),
                    segment: raw.to_string(),
                });
            }
            segments.push(Segment {
                kind: unescape(kind, input)?,
                value: unescape(value, input)?,
            });
        }

        Ok(Self { segments })
    }

    /// Return a new id one segment longer than `self`.
    #[must_use]
    pub fn append(&self, kind: impl Into<String>, value: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::new(kind, value));
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn last_segment(&self) -> &Segment {
        match self.segments.last() {
            Some(segment) => segment,
            None => unreachable!("INVARIANT: every constructor produces at least one segment"),
        }
    }

    /// The id with the last segment removed, or `None` for a one-segment id.
    pub fn parent(&self) -> Option<UniqueId> {
        if self.segments.len() < 2 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Non-strict prefix test: every id is a prefix of itself.
    pub fn is_prefix_of(&self, other: &UniqueId) -> bool {
        other.segments.starts_with(&self.segments)
    }

    /// Strict prefix test: `self` lies strictly below `ancestor`.
    pub fn is_descendant_of(&self, ancestor: &UniqueId) -> bool {
        self.segments.len() > ancestor.segments.len() && ancestor.is_prefix_of(self)
    }
}

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "{SEGMENT_DELIMITER}")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for UniqueId {
    type Err = UniqueIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn write_escaped(f: &mut fmt::Formatter<'_>, raw: &str) -> fmt::Result {
    for ch in raw.chars() {
        match ch {
            ESCAPE => f.write_str("%25")?,
            SEGMENT_DELIMITER => f.write_str("%2C")?,
            KIND_DELIMITER => f.write_str("%3A")?,
            other => write!(f, "{other}")?,
        }
    }
    Ok(())
}

fn unescape(raw: &str, input: &str) -> Result<String, UniqueIdParseError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != ESCAPE {
            out.push(ch);
            continue;
        }
        let sequence: String = std::iter::once(ESCAPE).chain(chars.by_ref().take(2)).collect();
        let decoded = match sequence.as_str() {
            "%25" => ESCAPE,
            "%2C" => SEGMENT_DELIMITER,
            "%3A" => KIND_DELIMITER,
            _ => {
                return Err(UniqueIdParseError::InvalidEscape {
                    input: input.to_string(),
                    sequence,
                });
            }
        };
        out.push(decoded);
    }
    Ok(out)
}
