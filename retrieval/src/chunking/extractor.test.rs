use super::*;
use crate::config::IndexConfig;
use pretty_assertions::assert_eq;

fn extractor(config: &IndexConfig) -> ChunkExtractor {
    ChunkExtractor::new(config, None)
}

fn regex_config() -> IndexConfig {
    IndexConfig {
        extraction_mode: "regex".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn empty_file_produces_zero_chunks() {
    let ex = extractor(&regex_config());
    let chunks = ex.extract("a.go", Path::new("/p/a.go"), "").await;
    assert!(chunks.is_empty());

    let chunks = ex.extract("a.go", Path::new("/p/a.go"), "\n\n  \n").await;
    assert!(chunks.is_empty());
}

#[tokio::test]
async fn unsupported_extension_produces_zero_chunks() {
    let ex = extractor(&regex_config());
    let chunks = ex.extract("notes.txt", Path::new("/p/notes.txt"), "hello").await;
    assert!(chunks.is_empty());
}

#[tokio::test]
async fn auto_mode_without_pool_falls_back_to_regex() {
    let config = IndexConfig::default();
    assert_eq!(config.extraction_mode, "auto");
    let ex = extractor(&config);

    let chunks = ex
        .extract("a.go", Path::new("/p/a.go"), "func HandleLogin() {\n}\n")
        .await;
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].name, "HandleLogin");
    assert_eq!(chunks[0].kind, ChunkKind::Function);
    assert_eq!(chunks[0].language, Language::Go);
}

#[tokio::test]
async fn python_nested_chunks_link_parent_ids() {
    let source = "\
class User:
    def __init__(self): ...
    def greet(self): ...
def top(): ...
";
    let ex = extractor(&regex_config());
    let chunks = ex.extract("user.py", Path::new("/p/user.py"), source).await;

    assert_eq!(chunks.len(), 4);
    let class = &chunks[0];
    assert_eq!(class.kind, ChunkKind::Class);
    assert_eq!(class.name, "User");

    for method in &chunks[1..3] {
        assert_eq!(method.kind, ChunkKind::Method);
        assert_eq!(method.parent_name.as_deref(), Some("User"));
        assert_eq!(method.parent_id.as_deref(), Some(class.id.as_str()));
        // Invariant: the parent encloses the child.
        assert!(class.start_line <= method.start_line);
        assert!(class.end_line >= method.end_line);
    }

    let top = &chunks[3];
    assert_eq!(top.kind, ChunkKind::Function);
    assert_eq!(top.parent_id, None);
}

#[tokio::test]
async fn oversized_span_splits_into_overlapping_blocks() {
    // A 250-line Go function with max_chunk_lines = 100 must become
    // [1..100], [96..195], [191..250], all blocks parented to the original.
    let mut source = String::from("func Gigantic() {\n");
    for i in 0..248 {
        source.push_str(&format!("    x{i} := {i}\n"));
    }
    source.push_str("}\n");

    let config = IndexConfig {
        extraction_mode: "regex".to_string(),
        max_chunk_lines: 100,
        ..Default::default()
    };
    let ex = extractor(&config);
    let chunks = ex.extract("big.go", Path::new("/p/big.go"), &source).await;

    assert_eq!(chunks.len(), 3);
    let ranges: Vec<(u32, u32)> = chunks.iter().map(|c| (c.start_line, c.end_line)).collect();
    assert_eq!(ranges, vec![(1, 100), (96, 195), (191, 250)]);

    for block in &chunks {
        assert_eq!(block.kind, ChunkKind::Block);
        assert_eq!(block.parent_name.as_deref(), Some("Gigantic"));
        assert!(block.line_count() <= 100);
    }

    // Overlap: last 5 lines of one block are the first 5 of the next.
    let first_tail: Vec<&str> = chunks[0].content.lines().rev().take(5).collect();
    let second_head: Vec<&str> = chunks[1].content.lines().take(5).collect::<Vec<_>>().into_iter().rev().collect();
    assert_eq!(first_tail, second_head);
}

#[tokio::test]
async fn per_file_cap_truncates() {
    let mut source = String::new();
    for i in 0..40 {
        source.push_str(&format!("func F{i}() {{\n}}\n"));
    }

    let config = IndexConfig {
        extraction_mode: "regex".to_string(),
        max_chunks_per_file: 10,
        ..Default::default()
    };
    let ex = extractor(&config);
    let chunks = ex.extract("many.go", Path::new("/p/many.go"), &source).await;

    assert_eq!(chunks.len(), 10);
    // Source order preserved under truncation.
    assert_eq!(chunks[0].name, "F0");
    assert_eq!(chunks[9].name, "F9");
}

#[test]
fn extraction_mode_parsing() {
    assert_eq!("auto".parse::<ExtractionMode>().unwrap(), ExtractionMode::Auto);
    assert_eq!("lsp".parse::<ExtractionMode>().unwrap(), ExtractionMode::LspOnly);
    assert_eq!(
        "regex-only".parse::<ExtractionMode>().unwrap(),
        ExtractionMode::RegexOnly
    );
    assert!("psychic".parse::<ExtractionMode>().is_err());
}

#[test]
fn symbol_kind_mapping_table() {
    assert_eq!(map_symbol_kind(SymbolKind::FUNCTION), Some(ChunkKind::Function));
    assert_eq!(map_symbol_kind(SymbolKind::METHOD), Some(ChunkKind::Method));
    assert_eq!(map_symbol_kind(SymbolKind::CONSTRUCTOR), Some(ChunkKind::Method));
    assert_eq!(map_symbol_kind(SymbolKind::CLASS), Some(ChunkKind::Class));
    assert_eq!(map_symbol_kind(SymbolKind::STRUCT), Some(ChunkKind::Struct));
    assert_eq!(map_symbol_kind(SymbolKind::INTERFACE), Some(ChunkKind::Interface));
    assert_eq!(map_symbol_kind(SymbolKind::NAMESPACE), Some(ChunkKind::Module));
    assert_eq!(map_symbol_kind(SymbolKind::ENUM), Some(ChunkKind::Enum));
    assert_eq!(map_symbol_kind(SymbolKind::ENUM_MEMBER), Some(ChunkKind::Constant));
    assert_eq!(map_symbol_kind(SymbolKind::FIELD), Some(ChunkKind::Variable));
    // Unmapped kinds are skipped (children still traversed).
    assert_eq!(map_symbol_kind(SymbolKind::FILE), None);
    assert_eq!(map_symbol_kind(SymbolKind::OPERATOR), None);
}

#[test]
fn lsp_tree_conversion_maps_lines_and_parents() {
    let lines: Vec<&str> = vec![
        "class User:",
        "    def greet(self):",
        "        return 'hi'",
    ];

    let tree = SymbolNode {
        name: "User".to_string(),
        detail: None,
        kind: SymbolKind::CLASS,
        start_line: 0,
        end_line: 2,
        children: vec![SymbolNode {
            name: "greet".to_string(),
            detail: Some("def greet(self)".to_string()),
            kind: SymbolKind::METHOD,
            start_line: 1,
            end_line: 2,
            children: vec![],
        }],
    };

    let mut chunks = Vec::new();
    collect_symbol(&tree, None, "user.py", Language::Python, &lines, &mut chunks);
    sort_source_order(&mut chunks);

    assert_eq!(chunks.len(), 2);
    // Zero-indexed LSP lines become one-indexed chunk lines.
    assert_eq!((chunks[0].start_line, chunks[0].end_line), (1, 3));
    assert_eq!((chunks[1].start_line, chunks[1].end_line), (2, 3));
    assert_eq!(chunks[1].parent_name.as_deref(), Some("User"));
    assert_eq!(chunks[1].parent_id.as_deref(), Some(chunks[0].id.as_str()));
    assert_eq!(chunks[1].signature, "def greet(self)");
}

#[test]
fn skipped_symbol_kinds_still_traverse_children() {
    let lines: Vec<&str> = vec!["int x;", "int f() {", "}"];

    // FILE is unmapped; its FUNCTION child must still be collected with no
    // parent attribution.
    let tree = SymbolNode {
        name: "file".to_string(),
        detail: None,
        kind: SymbolKind::FILE,
        start_line: 0,
        end_line: 2,
        children: vec![SymbolNode {
            name: "f".to_string(),
            detail: None,
            kind: SymbolKind::FUNCTION,
            start_line: 1,
            end_line: 2,
            children: vec![],
        }],
    };

    let mut chunks = Vec::new();
    collect_symbol(&tree, None, "a.c", Language::C, &lines, &mut chunks);

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].name, "f");
    assert_eq!(chunks[0].parent_name, None);
}
