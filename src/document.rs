/*!
# Document Store

Loads a document from disk (or memory) into a [`serde_json::Value`] tree and
keeps it as an immutable base alongside the working copy that queries narrow
down.

JSON is always available. YAML, TOML, CBOR and MessagePack decoders are behind
the `yaml`, `toml`, `cbor` and `msgpack` features; every format is decoded
straight into a [`Value`] so the rest of the crate only deals with JSON trees.
*/
use serde_json::Value;
use std::{
    fmt::{self, Display},
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use crate::error::QueryError;

/// Serialization formats a document can be decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentFormat {
    /// JSON text
    #[default]
    Json,
    /// YAML text
    #[cfg(feature = "yaml")]
    Yaml,
    /// TOML text
    #[cfg(feature = "toml")]
    Toml,
    /// CBOR bytes
    #[cfg(feature = "cbor")]
    Cbor,
    /// MessagePack bytes
    #[cfg(feature = "msgpack")]
    MessagePack,
}

impl DocumentFormat {
    /// Detect the format from a file extension. Paths without an extension
    /// are treated as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnsupportedFormat`] for unknown extensions.
    pub fn from_path(path: &Path) -> Result<Self, QueryError> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map_or(Ok(Self::Json), str::parse)
    }

    /// Decode `bytes` into a JSON tree.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Parse`] if the input is not a valid document in
    /// this format.
    pub fn decode(self, bytes: &[u8]) -> Result<Value, QueryError> {
        let parse_error = |message: String| QueryError::Parse { format: self, message };

        match self {
            Self::Json => serde_json::from_slice(bytes)
                .map_err(|e| parse_error(e.to_string())),
            #[cfg(feature = "yaml")]
            Self::Yaml => serde_yaml::from_slice(bytes)
                .map_err(|e| parse_error(e.to_string())),
            #[cfg(feature = "toml")]
            Self::Toml => {
                let text = std::str::from_utf8(bytes)
                    .map_err(|e| parse_error(e.to_string()))?;
                toml::from_str(text).map_err(|e| parse_error(e.to_string()))
            }
            #[cfg(feature = "cbor")]
            Self::Cbor => ciborium::de::from_reader(bytes)
                .map_err(|e| parse_error(e.to_string())),
            #[cfg(feature = "msgpack")]
            Self::MessagePack => rmp_serde::from_slice(bytes)
                .map_err(|e| parse_error(e.to_string())),
        }
    }
}

impl FromStr for DocumentFormat {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            #[cfg(feature = "yaml")]
            "yaml" | "yml" => Ok(Self::Yaml),
            #[cfg(feature = "toml")]
            "toml" => Ok(Self::Toml),
            #[cfg(feature = "cbor")]
            "cbor" => Ok(Self::Cbor),
            #[cfg(feature = "msgpack")]
            "msgpack" | "mpk" => Ok(Self::MessagePack),
            _ => Err(QueryError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Json => "JSON",
            #[cfg(feature = "yaml")]
            Self::Yaml => "YAML",
            #[cfg(feature = "toml")]
            Self::Toml => "TOML",
            #[cfg(feature = "cbor")]
            Self::Cbor => "CBOR",
            #[cfg(feature = "msgpack")]
            Self::MessagePack => "MessagePack",
        };
        write!(f, "{name}")
    }
}

/// Read and decode the document at `path` in the given format.
///
/// # Errors
///
/// - [`QueryError::FileNotFound`] if `path` does not exist
/// - [`QueryError::Io`] if the file cannot be read
/// - [`QueryError::Parse`] if the contents do not decode
pub fn load(path: &Path, format: DocumentFormat) -> Result<Value, QueryError> {
    if !path.exists() {
        return Err(QueryError::FileNotFound(path.to_path_buf()));
    }

    let bytes = std::fs::read(path).map_err(|source| QueryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    log::debug!(
        "read {} bytes from {} as {format}",
        bytes.len(),
        path.display()
    );

    format.decode(&bytes)
}

/// A loaded document: the immutable base tree plus the working copy that
/// successive queries narrow down.
///
/// The base is reference counted, so deriving a fresh view never copies or
/// re-reads the source.
#[derive(Debug, Clone)]
pub struct Document {
    /// Where the document was loaded from, if it came from a file
    source: Option<PathBuf>,
    /// Tree as decoded at import
    base: Arc<Value>,
    /// Result of the last query; `None` while it is still the base
    working: Option<Value>,
}

impl Document {
    /// Wrap an already decoded tree.
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self { source: None, base: Arc::new(value), working: None }
    }

    /// Load a document from a file, detecting the format from its extension.
    ///
    /// # Errors
    ///
    /// See [`load`]; also fails with [`QueryError::UnsupportedFormat`] for an
    /// unrecognized extension.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, QueryError> {
        let path = path.as_ref();
        Self::open_with_format(path, DocumentFormat::from_path(path)?)
    }

    /// Load a document from a file in an explicit format.
    ///
    /// # Errors
    ///
    /// See [`load`].
    pub fn open_with_format(
        path: impl AsRef<Path>,
        format: DocumentFormat,
    ) -> Result<Self, QueryError> {
        let path = path.as_ref();
        let value = load(path, format)?;
        Ok(Self {
            source: Some(path.to_path_buf()),
            base: Arc::new(value),
            working: None,
        })
    }

    /// The file this document was loaded from.
    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// The tree as it was decoded.
    #[must_use]
    pub fn base(&self) -> &Value {
        &self.base
    }

    /// The tree queries currently run against.
    #[must_use]
    pub fn current(&self) -> &Value {
        self.working.as_ref().unwrap_or(&self.base)
    }

    /// Replace the working copy with a query result.
    pub fn replace(&mut self, value: Value) {
        self.working = Some(value);
    }

    /// Drop the working copy so queries run against the base again.
    pub fn reset(&mut self) {
        self.working = None;
    }

    /// A new document sharing this one's base, with no working copy.
    #[must_use]
    pub fn fresh(&self) -> Self {
        Self {
            source: self.source.clone(),
            base: Arc::clone(&self.base),
            working: None,
        }
    }
}

impl From<Value> for Document {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

// `FromStr` since the text may be malformed -> conversion is fallible
impl FromStr for Document {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(DocumentFormat::Json.decode(s.as_bytes())?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn temp_document(suffix: &str, contents: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(suffix)
            .tempfile()
            .expect("Failed to create temp file");
        file.write_all(contents).expect("Failed to write temp file");
        file
    }

    #[test]
    fn open_json_file() {
        let file = temp_document(".json", br#"{"users": [{"id": 1}]}"#);
        let doc = Document::open(file.path()).unwrap();
        assert_eq!(doc.base(), &json!({"users": [{"id": 1}]}));
        assert_eq!(doc.source(), Some(file.path()));
    }

    #[test]
    fn missing_file_is_file_not_found() {
        let result = Document::open("does/not/exist.json");
        assert!(matches!(result, Err(QueryError::FileNotFound(_))));
    }

    #[test]
    fn malformed_json_is_tagged_parse_error() {
        let file = temp_document(".json", b"{\"users\": [");
        let result = Document::open(file.path());
        assert!(matches!(
            result,
            Err(QueryError::Parse { format: DocumentFormat::Json, .. })
        ));
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let file = temp_document(".xml", b"<users/>");
        let result = Document::open(file.path());
        assert!(matches!(result, Err(QueryError::UnsupportedFormat(_))));
    }

    #[test]
    fn no_extension_defaults_to_json() {
        assert_eq!(
            DocumentFormat::from_path(Path::new("data")).unwrap(),
            DocumentFormat::Json
        );
    }

    #[cfg(feature = "yaml")]
    #[test]
    fn open_yaml_file() {
        let file = temp_document(".yml", b"users:\n  - name: Rex\n    age: 30\n");
        let doc = Document::open(file.path()).unwrap();
        assert_eq!(doc.base(), &json!({"users": [{"name": "Rex", "age": 30}]}));
    }

    #[cfg(feature = "toml")]
    #[test]
    fn decode_toml() {
        let value = DocumentFormat::Toml
            .decode(b"[[users]]\nname = \"Rex\"\n")
            .unwrap();
        assert_eq!(value, json!({"users": [{"name": "Rex"}]}));
    }

    #[cfg(feature = "cbor")]
    #[test]
    fn decode_cbor() {
        let expected = json!({"name": "Rex", "age": 30, "tags": ["a", null]});
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(&expected, &mut bytes).unwrap();
        assert_eq!(DocumentFormat::Cbor.decode(&bytes).unwrap(), expected);
        assert!(matches!(
            DocumentFormat::Cbor.decode(&[0xff]),
            Err(QueryError::Parse { format: DocumentFormat::Cbor, .. })
        ));
    }

    #[cfg(feature = "msgpack")]
    #[test]
    fn decode_msgpack() {
        let expected = json!({"name": "Rex", "tags": ["a", "b"]});
        let bytes = rmp_serde::to_vec_named(&expected).unwrap();
        assert_eq!(DocumentFormat::MessagePack.decode(&bytes).unwrap(), expected);
    }

    #[test]
    fn working_copy_is_separate_from_base() {
        let mut doc: Document = r#"[1, 2, 3]"#.parse().unwrap();
        doc.replace(json!([2]));
        assert_eq!(doc.current(), &json!([2]));
        assert_eq!(doc.base(), &json!([1, 2, 3]));

        let fresh = doc.fresh();
        assert_eq!(fresh.current(), &json!([1, 2, 3]));

        doc.reset();
        assert_eq!(doc.current(), &json!([1, 2, 3]));
    }
}
