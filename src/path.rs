/*!
# Node Paths

A [`NodePath`] locates the sub-collection of a document that a query filters,
e.g. `users` or `data.teams.0.members`. Resolution is read-only and a missing
segment is reported as `None` rather than an error, since optional
substructure is expected in real documents.

```
use jsonwhere::path::{NodePath, resolve};
use serde_json::json;

let doc = json!({"a": {"b": [1, 2, 3]}});
assert_eq!(resolve(&doc, &"a.b".into()), Some(&json!([1, 2, 3])));
assert_eq!(resolve(&doc, &"a.x".into()), None);
```
*/
use serde_json::Value;
use std::{fmt::Display, str::FromStr};

/// A single step of a node path.
#[derive(Hash, PartialEq, Eq, Debug, Clone)]
pub enum PathSegment {
    /// An object key, e.g. "users"
    Field(String),
    /// An array position, e.g. "users.0"
    Index(usize),
}

impl Display for PathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Field(name) => write!(f, "{name}"),
            Self::Index(idx) => write!(f, "{idx}"),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(value: &str) -> Self {
        value
            .parse::<usize>()
            .map_or_else(|_| Self::Field(value.to_string()), Self::Index)
    }
}

impl From<usize> for PathSegment {
    fn from(value: usize) -> Self {
        Self::Index(value)
    }
}

/// Ordered list of segments from the document root. The empty path is the
/// root itself.
#[derive(Default, PartialEq, Eq, Debug, Clone)]
pub struct NodePath {
    segments: Vec<PathSegment>,
}

impl NodePath {
    /// The root path, addressing the whole document.
    #[must_use]
    pub const fn root() -> Self {
        Self { segments: Vec::new() }
    }

    /// Build a path from explicit segments.
    #[must_use]
    pub const fn new(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    /// Append an object key.
    ///
    /// ```
    /// use jsonwhere::path::NodePath;
    /// let path = NodePath::root().field("teams").index(0).field("members");
    /// assert_eq!(path.to_string(), "teams.0.members");
    /// ```
    #[must_use]
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.segments.push(PathSegment::Field(name.into()));
        self
    }

    /// Append an array position.
    #[must_use]
    pub fn index(mut self, idx: usize) -> Self {
        self.segments.push(PathSegment::Index(idx));
        self
    }

    /// Whether this path addresses the whole document.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// The segments in walk order.
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }
}

impl Display for NodePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_root() {
            return write!(f, ".");
        }
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

/// Dotted paths: `""` and `"."` are the root, every other `.`-separated part
/// is a segment. All-digit parts become [`PathSegment::Index`].
impl From<&str> for NodePath {
    fn from(value: &str) -> Self {
        if value.is_empty() || value == "." {
            return Self::root();
        }
        Self::new(value.split('.').map(PathSegment::from).collect())
    }
}

impl From<String> for NodePath {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<Vec<PathSegment>> for NodePath {
    fn from(segments: Vec<PathSegment>) -> Self {
        Self::new(segments)
    }
}

impl FromStr for NodePath {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

/// Take a single step from `node`.
///
/// Fields address object keys, or array positions when the name is numeric.
/// Indices address array positions, or object keys spelled as the number.
/// Scalars have no children.
#[must_use]
pub fn child<'a>(node: &'a Value, segment: &PathSegment) -> Option<&'a Value> {
    match (node, segment) {
        (Value::Object(map), PathSegment::Field(name)) => map.get(name),
        (Value::Object(map), PathSegment::Index(idx)) => {
            map.get(&idx.to_string())
        }
        (Value::Array(items), PathSegment::Index(idx)) => items.get(*idx),
        (Value::Array(items), PathSegment::Field(name)) => {
            name.parse::<usize>().ok().and_then(|idx| items.get(idx))
        }
        _ => None,
    }
}

/// Follow `path` from `document`, returning the node it addresses or `None`
/// if any segment is missing.
#[must_use]
pub fn resolve<'a>(document: &'a Value, path: &NodePath) -> Option<&'a Value> {
    path.segments
        .iter()
        .try_fold(document, |node, segment| child(node, segment))
}
