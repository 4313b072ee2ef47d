//! Typed field paths.
//!
//! A [`FieldPath`] is a list of object keys and array indices. It renders as
//! the dotted form used at the storage boundary (`content.2._children.0.title`)
//! and parses back from it; numeric segments are indices.

use crate::{Data, ModelError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// One step of a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Address of a value inside a document's data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath(Vec<PathSegment>);

impl FieldPath {
    /// The empty path (the document root).
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Returns a child path with an object key appended.
    #[must_use]
    pub fn key(&self, name: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Key(name.to_string()));
        Self(segments)
    }

    /// Returns a child path with an array index appended.
    #[must_use]
    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Index(index));
        Self(segments)
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// True if `prefix` is this path or one of its ancestors.
    pub fn starts_with(&self, prefix: &FieldPath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// The final key segment, if the path ends in one.
    pub fn last_key(&self) -> Option<&str> {
        match self.0.last() {
            Some(PathSegment::Key(k)) => Some(k),
            _ => None,
        }
    }

    /// Resolves the path against a document's data.
    pub fn lookup<'a>(&self, root: &'a Data) -> Option<&'a Value> {
        let (first, rest) = self.0.split_first()?;
        let PathSegment::Key(key) = first else {
            return None;
        };
        let mut current = root.get(key)?;
        for segment in rest {
            current = step(current, segment)?;
        }
        Some(current)
    }

    /// Mutable variant of [`FieldPath::lookup`].
    pub fn lookup_mut<'a>(&self, root: &'a mut Data) -> Option<&'a mut Value> {
        let (first, rest) = self.0.split_first()?;
        let PathSegment::Key(key) = first else {
            return None;
        };
        let mut current = root.get_mut(key)?;
        for segment in rest {
            current = match (current, segment) {
                (Value::Object(map), PathSegment::Key(k)) => map.get_mut(k)?,
                (Value::Array(items), PathSegment::Index(i)) => items.get_mut(*i)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Writes `value` at this path.
    ///
    /// Missing objects along key segments are created (a `null` in the way is
    /// replaced by an object). Index segments must address an existing element,
    /// or the element one past the end, which is pushed. Returns `false` when
    /// the path cannot be materialised.
    pub fn insert(&self, root: &mut Data, value: Value) -> bool {
        let Some((first, rest)) = self.0.split_first() else {
            return false;
        };
        let PathSegment::Key(key) = first else {
            return false;
        };
        if rest.is_empty() {
            root.insert(key.clone(), value);
            return true;
        }
        let slot = root.entry(key.clone()).or_insert(Value::Null);
        insert_into(slot, rest, value)
    }

    /// Removes the value at this path.
    ///
    /// A trailing key is removed from its object; a trailing index is nulled
    /// so sibling indices stay stable.
    pub fn remove_from(&self, root: &mut Data) -> Option<Value> {
        let parent = self.parent()?;
        match self.0.last()? {
            PathSegment::Key(key) => {
                if parent.is_empty() {
                    return root.remove(key);
                }
                parent.lookup_mut(root)?.as_object_mut()?.remove(key)
            }
            PathSegment::Index(i) => {
                let slot = parent.lookup_mut(root)?.as_array_mut()?.get_mut(*i)?;
                Some(std::mem::replace(slot, Value::Null))
            }
        }
    }
}

fn step<'a>(value: &'a Value, segment: &PathSegment) -> Option<&'a Value> {
    match (value, segment) {
        (Value::Object(map), PathSegment::Key(k)) => map.get(k),
        (Value::Array(items), PathSegment::Index(i)) => items.get(*i),
        _ => None,
    }
}

fn insert_into(slot: &mut Value, rest: &[PathSegment], value: Value) -> bool {
    let Some((segment, tail)) = rest.split_first() else {
        *slot = value;
        return true;
    };
    match segment {
        PathSegment::Key(k) => {
            if !slot.is_object() {
                *slot = Value::Object(Data::new());
            }
            let Value::Object(map) = slot else {
                return false;
            };
            let child = map.entry(k.clone()).or_insert(Value::Null);
            insert_into(child, tail, value)
        }
        PathSegment::Index(i) => {
            let Value::Array(items) = slot else {
                return false;
            };
            if *i == items.len() {
                items.push(Value::Null);
            }
            match items.get_mut(*i) {
                Some(child) => insert_into(child, tail, value),
                None => false,
            }
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            match segment {
                PathSegment::Key(k) => f.write_str(k)?,
                PathSegment::Index(idx) => write!(f, "{idx}")?,
            }
        }
        Ok(())
    }
}

impl FromStr for FieldPath {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::root());
        }
        s.split('.')
            .map(|part| {
                if part.is_empty() {
                    Err(ModelError::InvalidPath(s.to_string()))
                } else if part.bytes().all(|b| b.is_ascii_digit()) {
                    part.parse()
                        .map(PathSegment::Index)
                        .map_err(|_| ModelError::InvalidPath(s.to_string()))
                } else {
                    Ok(PathSegment::Key(part.to_string()))
                }
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
