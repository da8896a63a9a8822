#![forbid(unsafe_code)]

//! Addressing descendants of a control.
//!
//! A [`ControlPath`] is an ordered list of [`PathSegment`]s. Groups resolve
//! name segments, arrays resolve index segments. Resolution is lenient: a
//! name segment that parses as an integer addresses an array element
//! (`"items.0"`), and an index segment addresses a group child whose name is
//! that integer.
//!
//! A dotted string converts to a path of name segments; the empty string and
//! the empty list convert to the empty path, which resolves to nothing. Empty
//! components (`"a..b"`, `"a."`, `".a"`) are kept as blank names, which makes
//! the path malformed: it never resolves either.

use std::fmt;

/// One step in a [`ControlPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Name(String),
    Index(usize),
}

impl PathSegment {
    /// The segment as a group key.
    #[must_use]
    pub fn as_name(&self) -> String {
        match self {
            Self::Name(name) => name.clone(),
            Self::Index(index) => index.to_string(),
        }
    }

    /// The segment as an array index, if it is one or parses as one.
    #[must_use]
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Self::Name(name) => name.parse().ok(),
            Self::Index(index) => Some(*index),
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// An ordered sequence of segments from a control to one of its descendants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ControlPath {
    segments: Vec<PathSegment>,
}

impl ControlPath {
    #[must_use]
    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    /// Parse a dot-delimited path. `""` yields the empty path; any other
    /// empty component is kept as a blank name.
    #[must_use]
    pub fn parse(dotted: &str) -> Self {
        if dotted.is_empty() {
            return Self::default();
        }
        Self {
            segments: dotted.split('.').map(PathSegment::from).collect(),
        }
    }

    /// Whether some segment is a blank name.
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        self.segments
            .iter()
            .any(|segment| matches!(segment, PathSegment::Name(name) if name.is_empty()))
    }

    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Append a segment, returning the extended path.
    #[must_use]
    pub fn child(mut self, segment: impl Into<PathSegment>) -> Self {
        self.segments.push(segment.into());
        self
    }
}

impl fmt::Display for ControlPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl From<&str> for ControlPath {
    fn from(dotted: &str) -> Self {
        Self::parse(dotted)
    }
}

impl From<String> for ControlPath {
    fn from(dotted: String) -> Self {
        Self::parse(&dotted)
    }
}

impl From<usize> for ControlPath {
    fn from(index: usize) -> Self {
        Self::new(vec![PathSegment::Index(index)])
    }
}

impl From<Vec<PathSegment>> for ControlPath {
    fn from(segments: Vec<PathSegment>) -> Self {
        Self::new(segments)
    }
}

impl From<&[PathSegment]> for ControlPath {
    fn from(segments: &[PathSegment]) -> Self {
        Self::new(segments.to_vec())
    }
}

impl From<Vec<&str>> for ControlPath {
    fn from(names: Vec<&str>) -> Self {
        Self::new(names.into_iter().map(PathSegment::from).collect())
    }
}

impl From<&ControlPath> for ControlPath {
    fn from(path: &ControlPath) -> Self {
        path.clone()
    }
}

/// Build a [`ControlPath`] from mixed name and index segments.
///
/// ```
/// use ftui_forms::{path, ControlPath};
///
/// let p: ControlPath = path!["items", 0usize, "title"];
/// assert_eq!(p.to_string(), "items.0.title");
/// assert!(path![].is_empty());
/// ```
#[macro_export]
macro_rules! path {
    ($($segment:expr),* $(,)?) => {
        $crate::path::ControlPath::new(vec![$($crate::path::PathSegment::from($segment)),*])
    };
}
