//! Chunk extractor: LSP-driven with regex fallback.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use tracing::debug;
use tracing::trace;
use zrok_lsp::ClientPool;
use zrok_lsp::SymbolKind;
use zrok_lsp::SymbolNode;

use crate::chunking::regex_rules::extract_spans;
use crate::config::IndexConfig;
use crate::types::Chunk;
use crate::types::ChunkKind;
use crate::types::Language;

/// Lines of overlap between consecutive splits of an oversized span.
const SPLIT_OVERLAP_LINES: u32 = 5;

/// How chunks are produced for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractionMode {
    /// Try LSP when a server exists for the extension; regex otherwise or
    /// when LSP yields nothing.
    #[default]
    Auto,
    /// LSP or nothing.
    LspOnly,
    /// Regex patterns only; no servers are spawned.
    RegexOnly,
}

impl FromStr for ExtractionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "lsp" | "lsp-only" => Ok(Self::LspOnly),
            "regex" | "regex-only" => Ok(Self::RegexOnly),
            other => Err(format!("unknown extraction mode '{other}'")),
        }
    }
}

/// Produces ordered chunk sequences from file content.
pub struct ChunkExtractor {
    mode: ExtractionMode,
    max_chunk_lines: usize,
    max_chunks_per_file: usize,
    pool: Option<Arc<ClientPool>>,
}

impl ChunkExtractor {
    /// Build an extractor; `pool` is `None` in regex-only setups and tests.
    pub fn new(config: &IndexConfig, pool: Option<Arc<ClientPool>>) -> Self {
        let mode = config
            .extraction_mode
            .parse()
            .unwrap_or(ExtractionMode::Auto);
        Self {
            mode,
            max_chunk_lines: config.max_chunk_lines.max(1),
            max_chunks_per_file: config.max_chunks_per_file.max(1),
            pool,
        }
    }

    /// Extract chunks for one file, in source order.
    ///
    /// Never fails: extraction problems degrade to fewer (possibly zero)
    /// chunks, logged at debug level. An empty file produces zero chunks.
    pub async fn extract(&self, file: &str, abs_path: &Path, content: &str) -> Vec<Chunk> {
        if content.trim().is_empty() {
            return Vec::new();
        }

        let language = language_of(file);
        if language == Language::Unknown {
            return Vec::new();
        }

        let lines: Vec<&str> = content.lines().collect();

        let mut chunks = match self.mode {
            ExtractionMode::RegexOnly => regex_chunks(file, language, &lines),
            ExtractionMode::LspOnly => self
                .lsp_chunks(file, abs_path, language, content, &lines)
                .await
                .unwrap_or_default(),
            ExtractionMode::Auto => {
                match self.lsp_chunks(file, abs_path, language, content, &lines).await {
                    Some(chunks) if !chunks.is_empty() => chunks,
                    _ => {
                        trace!(file, "LSP yielded nothing, using regex fallback");
                        regex_chunks(file, language, &lines)
                    }
                }
            }
        };

        resolve_parent_ids(&mut chunks);
        chunks = split_oversized(chunks, file, language, &lines, self.max_chunk_lines);

        // Identical content at the same path hashes to the same id; keep
        // the first occurrence so ids stay unique per file.
        let mut seen_ids = std::collections::HashSet::new();
        chunks.retain(|c| seen_ids.insert(c.id.clone()));

        if chunks.len() > self.max_chunks_per_file {
            debug!(
                file,
                extracted = chunks.len(),
                cap = self.max_chunks_per_file,
                "Truncating chunks at per-file cap"
            );
            chunks.truncate(self.max_chunks_per_file);
        }

        chunks
    }

    async fn lsp_chunks(
        &self,
        file: &str,
        abs_path: &Path,
        language: Language,
        content: &str,
        lines: &[&str],
    ) -> Option<Vec<Chunk>> {
        let pool = self.pool.as_ref()?;
        if !pool.has_server(language.as_str()) {
            return None;
        }

        match pool
            .document_symbols(abs_path, language.as_str(), content)
            .await
        {
            Ok(symbols) => {
                let mut chunks = Vec::new();
                for node in &symbols {
                    collect_symbol(node, None, file, language, lines, &mut chunks);
                }
                sort_source_order(&mut chunks);
                Some(chunks)
            }
            Err(_) => None, // already logged by the pool
        }
    }
}

fn language_of(file: &str) -> Language {
    Path::new(file)
        .extension()
        .and_then(|e| e.to_str())
        .map(Language::from_extension)
        .unwrap_or(Language::Unknown)
}

/// LSP symbol kind → chunk kind. Unmapped kinds are skipped, but their
/// children still traverse with the same parent context.
fn map_symbol_kind(kind: SymbolKind) -> Option<ChunkKind> {
    match kind {
        SymbolKind::FUNCTION => Some(ChunkKind::Function),
        SymbolKind::METHOD | SymbolKind::CONSTRUCTOR => Some(ChunkKind::Method),
        SymbolKind::CLASS => Some(ChunkKind::Class),
        SymbolKind::STRUCT => Some(ChunkKind::Struct),
        SymbolKind::INTERFACE => Some(ChunkKind::Interface),
        SymbolKind::MODULE | SymbolKind::NAMESPACE | SymbolKind::PACKAGE => {
            Some(ChunkKind::Module)
        }
        SymbolKind::ENUM => Some(ChunkKind::Enum),
        SymbolKind::CONSTANT | SymbolKind::ENUM_MEMBER => Some(ChunkKind::Constant),
        SymbolKind::VARIABLE | SymbolKind::PROPERTY | SymbolKind::FIELD => {
            Some(ChunkKind::Variable)
        }
        _ => None,
    }
}

fn collect_symbol(
    node: &SymbolNode,
    parent: Option<(&str, &str)>,
    file: &str,
    language: Language,
    lines: &[&str],
    out: &mut Vec<Chunk>,
) {
    let mapped = map_symbol_kind(node.kind);

    let own: Option<(String, String)> = mapped.map(|kind| {
        // LSP lines are zero-indexed; chunks are one-indexed inclusive.
        // Ranges are clamped to the file: servers occasionally report
        // positions past EOF for files with unsaved trailing edits.
        let start = (node.start_line as usize).min(lines.len().saturating_sub(1));
        let end = (node.end_line as usize)
            .min(lines.len().saturating_sub(1))
            .max(start);
        let content = lines[start..=end].join("\n");

        let signature = match &node.detail {
            Some(detail) if !detail.trim().is_empty() => detail.trim().to_string(),
            _ => lines[start].trim().trim_end_matches('{').trim().to_string(),
        };

        let mut chunk = Chunk::new(
            file,
            language,
            kind,
            &node.name,
            &signature,
            &content,
            start as u32 + 1,
            end as u32 + 1,
        );
        if let Some((parent_name, parent_id)) = parent {
            chunk.parent_name = Some(parent_name.to_string());
            chunk.parent_id = Some(parent_id.to_string());
        }
        let ids = (chunk.name.clone(), chunk.id.clone());
        out.push(chunk);
        ids
    });

    let child_parent = match &own {
        Some((name, id)) => Some((name.as_str(), id.as_str())),
        None => parent,
    };
    for child in &node.children {
        collect_symbol(child, child_parent, file, language, lines, out);
    }
}

fn regex_chunks(file: &str, language: Language, lines: &[&str]) -> Vec<Chunk> {
    let spans = extract_spans(language, lines);
    let mut chunks: Vec<Chunk> = spans
        .into_iter()
        .map(|span| {
            let start = span.start_line as usize - 1;
            let end = (span.end_line as usize - 1).min(lines.len().saturating_sub(1));
            let content = lines[start..=end].join("\n");
            let mut chunk = Chunk::new(
                file,
                language,
                span.kind,
                &span.name,
                &span.signature,
                &content,
                span.start_line,
                end as u32 + 1,
            );
            chunk.parent_name = span.parent_name;
            chunk
        })
        .collect();
    sort_source_order(&mut chunks);
    chunks
}

/// Parents sort before children: ascending start, enclosing span first.
fn sort_source_order(chunks: &mut [Chunk]) {
    chunks.sort_by(|a, b| {
        a.start_line
            .cmp(&b.start_line)
            .then(b.end_line.cmp(&a.end_line))
    });
}

/// Fill `parent_id` for chunks whose `parent_name` names an enclosing chunk.
fn resolve_parent_ids(chunks: &mut Vec<Chunk>) {
    let index: Vec<(String, String, u32, u32)> = chunks
        .iter()
        .map(|c| (c.name.clone(), c.id.clone(), c.start_line, c.end_line))
        .collect();

    for chunk in chunks.iter_mut() {
        if chunk.parent_id.is_some() {
            continue;
        }
        let Some(parent_name) = &chunk.parent_name else {
            continue;
        };
        // Innermost enclosing chunk with the right name.
        let parent = index
            .iter()
            .filter(|(name, id, start, end)| {
                name == parent_name
                    && id != &chunk.id
                    && *start <= chunk.start_line
                    && *end >= chunk.end_line
            })
            .max_by_key(|(_, _, start, _)| *start);
        if let Some((_, id, _, _)) = parent {
            chunk.parent_id = Some(id.clone());
        }
    }
}

/// Replace oversized spans with overlapping `block` sub-chunks.
///
/// Each sub-chunk covers at most `max_lines` lines with a 5-line overlap
/// between consecutive splits and names the original span as its parent.
/// Children of a replaced chunk keep their `parent_name` but lose the
/// dangling `parent_id`.
fn split_oversized(
    chunks: Vec<Chunk>,
    file: &str,
    language: Language,
    lines: &[&str],
    max_lines: usize,
) -> Vec<Chunk> {
    let max_lines = max_lines as u32;
    let mut replaced_ids: Vec<String> = Vec::new();
    let mut out = Vec::with_capacity(chunks.len());

    for chunk in chunks {
        if chunk.line_count() <= max_lines {
            out.push(chunk);
            continue;
        }

        trace!(
            file,
            name = %chunk.name,
            lines = chunk.line_count(),
            max = max_lines,
            "Splitting oversized span into blocks"
        );
        replaced_ids.push(chunk.id.clone());

        let mut start = chunk.start_line;
        loop {
            let end = (start + max_lines - 1).min(chunk.end_line);
            let content = lines[start as usize - 1..end as usize].join("\n");

            let mut block = Chunk::new(
                file,
                language,
                ChunkKind::Block,
                &chunk.name,
                &chunk.signature,
                &content,
                start,
                end,
            );
            block.parent_name = Some(chunk.name.clone());
            out.push(block);

            if end >= chunk.end_line {
                break;
            }
            start = end - (SPLIT_OVERLAP_LINES - 1);
        }
    }

    if !replaced_ids.is_empty() {
        for chunk in &mut out {
            if let Some(parent_id) = &chunk.parent_id {
                if replaced_ids.contains(parent_id) {
                    chunk.parent_id = None;
                }
            }
        }
    }

    out
}

#[cfg(test)]
#[path = "extractor.test.rs"]
mod tests;
