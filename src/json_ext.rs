//! JSON values and response paths.
//!
//! The engine assembles its result trees out of [`serde_json_bytes`] values
//! so that string data can be shared with the transport layer without
//! copying. A [`Path`] identifies one position inside such a tree.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde::de::Deserializer;
use serde::ser::SerializeSeq;
use serde::ser::Serializer;
use serde_json_bytes::ByteString;

pub use serde_json_bytes::Value;

/// A JSON object.
pub type Object = serde_json_bytes::Map<ByteString, Value>;

/// One element of a response [`Path`].
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum PathElement {
    /// An index inside a list value.
    Index(usize),

    /// A response key inside an object value.
    Key(String),
}

impl Serialize for PathElement {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            PathElement::Index(index) => serializer.serialize_u64(*index as u64),
            PathElement::Key(key) => serializer.serialize_str(key),
        }
    }
}

impl<'de> Deserialize<'de> for PathElement {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Number(n) => n
                .as_u64()
                .map(|i| PathElement::Index(i as usize))
                .ok_or_else(|| serde::de::Error::custom("invalid path index")),
            Value::String(s) => Ok(PathElement::Key(s.as_str().to_string())),
            _ => Err(serde::de::Error::custom(
                "a path element must be a string or an index",
            )),
        }
    }
}

/// A path into the response data, composed of response keys and list indices.
///
/// e.g. `hero/heroFriends/1/name`
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Path(pub Vec<PathElement>);

impl Path {
    /// An empty path, i.e. the root of the response.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn last(&self) -> Option<&PathElement> {
        self.0.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathElement> {
        self.0.iter()
    }

    pub(crate) fn push(&mut self, element: PathElement) {
        self.0.push(element);
    }

    pub(crate) fn pop(&mut self) -> Option<PathElement> {
        self.0.pop()
    }

    /// Returns a new path with `key` appended.
    pub(crate) fn key(&self, key: &str) -> Self {
        let mut path = self.clone();
        path.push(PathElement::Key(key.to_string()));
        path
    }

    /// Returns a new path with `index` appended.
    pub(crate) fn index(&self, index: usize) -> Self {
        let mut path = self.clone();
        path.push(PathElement::Index(index));
        path
    }
}

impl From<&str> for Path {
    fn from(s: &str) -> Self {
        Self(
            s.split('/')
                .filter(|segment| !segment.is_empty())
                .map(|segment| {
                    if let Ok(index) = segment.parse::<usize>() {
                        PathElement::Index(index)
                    } else {
                        PathElement::Key(segment.to_string())
                    }
                })
                .collect(),
        )
    }
}

impl From<&String> for Path {
    fn from(s: &String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<String> for Path {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl FromIterator<PathElement> for Path {
    fn from_iter<T: IntoIterator<Item = PathElement>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Serialize for Path {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for element in &self.0 {
            seq.serialize_element(element)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Path {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Self(Vec::<PathElement>::deserialize(deserializer)?))
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for element in &self.0 {
            write!(f, "/")?;
            match element {
                PathElement::Index(index) => write!(f, "{index}")?,
                PathElement::Key(key) => write!(f, "{key}")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;

    #[test]
    fn path_from_string_splits_keys_and_indices() {
        let path = Path::from("hero/heroFriends/1/name");
        assert_eq!(
            path.0,
            vec![
                PathElement::Key("hero".to_string()),
                PathElement::Key("heroFriends".to_string()),
                PathElement::Index(1),
                PathElement::Key("name".to_string()),
            ],
        );
        assert_eq!(path.to_string(), "/hero/heroFriends/1/name");
    }

    #[test]
    fn path_serializes_as_a_json_array() {
        let path = Path::from("hero/heroFriends/1/name");
        assert_eq!(
            serde_json_bytes::to_value(&path).unwrap(),
            json!(["hero", "heroFriends", 1, "name"]),
        );

        let deserialized: Path =
            serde_json_bytes::from_value(json!(["hero", "heroFriends", 1, "name"])).unwrap();
        assert_eq!(deserialized, path);
    }

    #[test]
    fn path_push_pop() {
        let mut path = Path::empty();
        assert!(path.is_empty());
        path.push(PathElement::Key("a".to_string()));
        path.push(PathElement::Index(0));
        assert_eq!(path.to_string(), "/a/0");
        path.pop();
        assert_eq!(path.to_string(), "/a");
    }
}
