//! Core data model: chunks, languages, kinds, search results.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;

/// Languages the extractor understands. The tag set is closed; anything
/// else indexes as `Unknown` only if explicitly configured, otherwise the
/// walker skips it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Go,
    Python,
    Javascript,
    Typescript,
    Javascriptreact,
    Typescriptreact,
    Java,
    Rust,
    Ruby,
    C,
    Cpp,
    Unknown,
}

impl Language {
    /// Detect the language from a file extension.
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "go" => Self::Go,
            "py" => Self::Python,
            "js" | "mjs" | "cjs" => Self::Javascript,
            "jsx" => Self::Javascriptreact,
            "ts" | "mts" | "cts" => Self::Typescript,
            "tsx" => Self::Typescriptreact,
            "java" => Self::Java,
            "rs" => Self::Rust,
            "rb" => Self::Ruby,
            "c" | "h" => Self::C,
            "cpp" | "cc" | "cxx" | "hpp" | "hh" => Self::Cpp,
            _ => Self::Unknown,
        }
    }

    /// The language tag, which doubles as the LSP `languageId`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Go => "go",
            Self::Python => "python",
            Self::Javascript => "javascript",
            Self::Typescript => "typescript",
            Self::Javascriptreact => "javascriptreact",
            Self::Typescriptreact => "typescriptreact",
            Self::Java => "java",
            Self::Rust => "rust",
            Self::Ruby => "ruby",
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::Unknown => "unknown",
        }
    }

    /// Extensions accepted by the file walker.
    pub fn supported_extensions() -> &'static [&'static str] {
        &[
            "go", "py", "js", "mjs", "cjs", "jsx", "ts", "mts", "cts", "tsx", "java", "rs", "rb",
            "c", "h", "cpp", "cc", "cxx", "hpp", "hh",
        ]
    }
}

impl FromStr for Language {
    type Err = String;

    /// Accepts the full tag ("typescript") or a file extension ("ts").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "go" => Ok(Self::Go),
            "python" => Ok(Self::Python),
            "javascript" => Ok(Self::Javascript),
            "typescript" => Ok(Self::Typescript),
            "javascriptreact" => Ok(Self::Javascriptreact),
            "typescriptreact" => Ok(Self::Typescriptreact),
            "java" => Ok(Self::Java),
            "rust" => Ok(Self::Rust),
            "ruby" => Ok(Self::Ruby),
            "c" => Ok(Self::C),
            "cpp" => Ok(Self::Cpp),
            "unknown" => Ok(Self::Unknown),
            other => match Self::from_extension(other) {
                Self::Unknown => Err(format!("unknown language '{other}'")),
                lang => Ok(lang),
            },
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of semantic span a chunk covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Function,
    Method,
    Class,
    Struct,
    Interface,
    Module,
    Enum,
    Constant,
    Variable,
    /// Sub-chunk produced by splitting an oversized span.
    Block,
}

impl ChunkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Method => "method",
            Self::Class => "class",
            Self::Struct => "struct",
            Self::Interface => "interface",
            Self::Module => "module",
            Self::Enum => "enum",
            Self::Constant => "constant",
            Self::Variable => "variable",
            Self::Block => "block",
        }
    }
}

impl FromStr for ChunkKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "function" => Ok(Self::Function),
            "method" => Ok(Self::Method),
            "class" => Ok(Self::Class),
            "struct" => Ok(Self::Struct),
            "interface" => Ok(Self::Interface),
            "module" => Ok(Self::Module),
            "enum" => Ok(Self::Enum),
            "constant" => Ok(Self::Constant),
            "variable" => Ok(Self::Variable),
            "block" => Ok(Self::Block),
            other => Err(format!("unknown chunk kind '{other}'")),
        }
    }
}

impl fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A semantic span extracted from one file; the unit of indexing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// 32-hex identifier derived from `<file>:<content>`. Stable under
    /// identical extraction; reinsert with the same id is idempotent.
    pub id: String,
    /// Project-relative path with forward slashes.
    pub file: String,
    pub language: Language,
    pub kind: ChunkKind,
    pub name: String,
    pub signature: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Raw source text of the span.
    pub content: String,
    /// 1-indexed, inclusive.
    pub start_line: u32,
    pub end_line: u32,
    /// 16-hex hash of `content`, for change detection.
    pub content_hash: String,
    /// Slot in the ANN index once an embedding exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_slot: Option<i64>,
}

impl Chunk {
    /// Build a chunk, deriving `id` and `content_hash` from the inputs.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        file: &str,
        language: Language,
        kind: ChunkKind,
        name: &str,
        signature: &str,
        content: &str,
        start_line: u32,
        end_line: u32,
    ) -> Self {
        Self {
            id: chunk_id(file, content),
            file: file.to_string(),
            language,
            kind,
            name: name.to_string(),
            signature: signature.to_string(),
            parent_name: None,
            parent_id: None,
            content: content.to_string(),
            start_line,
            end_line,
            content_hash: content_hash(content),
            vector_slot: None,
        }
    }

    /// Number of source lines this chunk spans.
    pub fn line_count(&self) -> u32 {
        self.end_line - self.start_line + 1
    }

    /// Serialized form handed to the embedding provider.
    ///
    /// `<kind> <name>`, the signature when it adds information, the parent
    /// context, then the content truncated to 2000 chars.
    pub fn embedding_text(&self) -> String {
        let mut text = format!("{} {}", self.kind, self.name);
        if !self.signature.is_empty() && self.signature != self.name {
            text.push('\n');
            text.push_str(&self.signature);
        }
        if let Some(parent) = &self.parent_name {
            text.push('\n');
            text.push_str("in ");
            text.push_str(parent);
        }
        text.push('\n');
        if self.content.len() > MAX_EMBED_CONTENT_CHARS {
            let mut end = MAX_EMBED_CONTENT_CHARS;
            while !self.content.is_char_boundary(end) {
                end -= 1;
            }
            text.push_str(&self.content[..end]);
            text.push_str("...");
        } else {
            text.push_str(&self.content);
        }
        text
    }
}

/// Content handed to the embedder is capped to stay model-friendly.
const MAX_EMBED_CONTENT_CHARS: usize = 2000;

/// 32-hex chunk identifier over `<file>:<content>`.
///
/// A collision implies identical content at the identical path, which is
/// the same chunk; reinsert is idempotent by design of the store.
pub fn chunk_id(file: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(file.as_bytes());
    hasher.update(b":");
    hasher.update(content.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..32].to_string()
}

/// 16-hex content hash for change detection.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..16].to_string()
}

/// Filter applied to search candidates before ranking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilter {
    /// Glob on the project-relative path; `*` widens to SQL `LIKE %`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_glob: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kinds: Vec<ChunkKind>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub languages: Vec<Language>,
}

impl SearchFilter {
    pub fn is_empty(&self) -> bool {
        self.file_glob.is_none() && self.kinds.is_empty() && self.languages.is_empty()
    }
}

/// One ranked hit returned from search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub chunk: Chunk,
    /// `1 − distance`, clamped to `[0, 1]`.
    pub score: f32,
    pub distance: f32,
    /// Hop at which the chunk entered the result set (1 for single-hop).
    pub hop: u32,
}

/// Result set with retrieval metadata.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    /// Hops actually performed; a time-budget exit reports fewer than
    /// requested without signalling an error.
    pub total_hops: u32,
}

#[cfg(test)]
#[path = "types.test.rs"]
mod tests;
