use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Display};
use std::str::FromStr;
use thiserror::Error;

use super::value::{DynamicValue, Kind, Map};

/// A single accessor within a [`Path`]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Map field, written `.field` or `['field']`
    Key(String),
    /// Array position, written `[0]`
    Index(usize),
}

impl Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(key) if is_identifier(key) => write!(f, ".{key}"),
            Segment::Key(key) => write!(f, "['{}']", key.replace('\'', "\\'")),
            Segment::Index(i) => write!(f, "[{i}]"),
        }
    }
}

/// A dot/bracket path into a [`DynamicValue`], e.g. `address.lines[0]` or `data['first name']`
#[derive(Clone, Default, Debug, PartialEq, Eq, Hash)]
pub struct Path(Vec<Segment>);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid path '{path}' at offset {offset}: {reason}")]
pub struct InvalidPath {
    path: String,
    offset: usize,
    reason: &'static str,
}

/// Returned by [`Path::set`] when an existing intermediate value cannot hold the next segment
#[derive(Debug, Error, PartialEq, Eq)]
#[error("cannot access '{segment}' on a value of kind {found}")]
pub struct StructuralConflict {
    pub segment: String,
    pub found: Kind,
}

pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl Path {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self(segments)
    }

    /// The empty path, pointing to the value itself
    pub fn root() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse a path of the form `a.b[0]['c']`
    pub fn parse(raw: &str) -> Result<Self, InvalidPath> {
        let fail = |offset: usize, reason: &'static str| InvalidPath {
            path: raw.to_owned(),
            offset,
            reason,
        };

        let bytes = raw.as_bytes();
        let mut segments = Vec::new();
        let mut pos = 0;
        let mut expect_key = true;

        while pos < bytes.len() {
            match bytes[pos] {
                b'.' if !expect_key && pos + 1 < bytes.len() => {
                    pos += 1;
                    expect_key = true;
                }
                b'[' => {
                    let close = raw[pos..]
                        .find(']')
                        .map(|i| pos + i)
                        .ok_or_else(|| fail(pos, "unbalanced brackets"))?;
                    let inner = raw[pos + 1..close].trim();
                    if let Some(quoted) = inner
                        .strip_prefix('\'')
                        .and_then(|s| s.strip_suffix('\''))
                    {
                        segments.push(Segment::Key(quoted.replace("\\'", "'")));
                    } else {
                        let index = inner
                            .parse::<usize>()
                            .map_err(|_| fail(pos + 1, "expected an index or a quoted key"))?;
                        segments.push(Segment::Index(index));
                    }
                    pos = close + 1;
                    expect_key = false;
                }
                _ if expect_key => {
                    let end = raw[pos..]
                        .find(|c: char| c == '.' || c == '[')
                        .map(|i| pos + i)
                        .unwrap_or(raw.len());
                    let key = &raw[pos..end];
                    if !is_identifier(key) {
                        return Err(fail(pos, "expected an identifier"));
                    }
                    segments.push(Segment::Key(key.to_owned()));
                    pos = end;
                    expect_key = false;
                }
                _ => return Err(fail(pos, "unexpected character")),
            }
        }

        if expect_key && !segments.is_empty() {
            return Err(fail(raw.len(), "path cannot end with '.'"));
        }

        Ok(Path(segments))
    }

    pub fn push(&mut self, segment: Segment) {
        self.0.push(segment)
    }

    /// Return a new path with the segment appended
    pub fn join(&self, segment: Segment) -> Self {
        let mut path = self.clone();
        path.push(segment);
        path
    }

    /// Look up the value at this path
    ///
    /// Field access on a non-map, index access on a non-array or an index out of range all
    /// yield `None`.
    pub fn get<'a>(&self, value: &'a DynamicValue) -> Option<&'a DynamicValue> {
        self.0
            .iter()
            .try_fold(value, |current, segment| match segment {
                Segment::Key(key) => current.get(key),
                Segment::Index(i) => current.at(*i),
            })
    }

    /// Set the leaf pointed by this path to `new_value`, leaving sibling data untouched
    ///
    /// Missing intermediate values (or `Null` ones) are created as maps or arrays depending on
    /// the next segment, and arrays are padded with `Null` to reach an index. If an existing
    /// intermediate value has an incompatible kind, or reaching an index would grow an array
    /// by more than a thousand values, the update fails and `target` is left as it was.
    pub fn set(
        &self,
        target: &mut DynamicValue,
        new_value: DynamicValue,
    ) -> Result<(), StructuralConflict> {
        // check the whole path before mutating so a conflict never leaves a partial update
        self.check(target)?;

        let mut current = target;
        for segment in self.0.iter() {
            current = match segment {
                Segment::Key(key) => {
                    if !matches!(current, DynamicValue::Map(_)) {
                        *current = DynamicValue::Map(Map::new());
                    }
                    match current {
                        DynamicValue::Map(map) => map.entry(key.clone()).or_default(),
                        _ => unreachable!("value was just replaced by a map"),
                    }
                }
                Segment::Index(i) => {
                    if !matches!(current, DynamicValue::Array(_)) {
                        *current = DynamicValue::Array(Vec::new());
                    }
                    match current {
                        DynamicValue::Array(items) => {
                            if items.len() <= *i {
                                items.resize(*i + 1, DynamicValue::Null);
                            }
                            &mut items[*i]
                        }
                        _ => unreachable!("value was just replaced by an array"),
                    }
                }
            };
        }
        *current = new_value;
        Ok(())
    }

    fn check(&self, target: &DynamicValue) -> Result<(), StructuralConflict> {
        let mut current = Some(target);
        for segment in self.0.iter() {
            current = match (segment, current) {
                // everything below a missing value is created
                (Segment::Key(_), None | Some(DynamicValue::Null)) => None,
                (Segment::Index(i), None | Some(DynamicValue::Null)) => {
                    check_growth(segment, *i, 0, Kind::Null)?;
                    None
                }
                (Segment::Key(key), Some(DynamicValue::Map(map))) => map.get(key),
                (Segment::Index(i), Some(DynamicValue::Array(items))) => {
                    check_growth(segment, *i, items.len(), Kind::Array)?;
                    items.get(*i)
                }
                (segment, Some(other)) => {
                    return Err(StructuralConflict {
                        segment: segment.to_string(),
                        found: other.kind(),
                    })
                }
            };
        }
        Ok(())
    }
}

/// How many `Null` values an update may insert to reach an array index
const MAX_ARRAY_GROWTH: usize = 1024;

fn check_growth(
    segment: &Segment,
    index: usize,
    len: usize,
    found: Kind,
) -> Result<(), StructuralConflict> {
    if index.saturating_sub(len) > MAX_ARRAY_GROWTH {
        return Err(StructuralConflict {
            segment: segment.to_string(),
            found,
        });
    }
    Ok(())
}

impl Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                // the leading field is written without a dot
                Segment::Key(key) if i == 0 && is_identifier(key) => f.write_str(key)?,
                other => write!(f, "{other}")?,
            }
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = InvalidPath;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Path::parse(s)
    }
}

impl Serialize for Path {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Path {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Path::parse(&raw).map_err(serde::de::Error::custom)
    }
}
