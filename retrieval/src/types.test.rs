use super::*;
use pretty_assertions::assert_eq;

#[test]
fn language_from_extension() {
    assert_eq!(Language::from_extension("go"), Language::Go);
    assert_eq!(Language::from_extension("tsx"), Language::Typescriptreact);
    assert_eq!(Language::from_extension("hpp"), Language::Cpp);
    assert_eq!(Language::from_extension("h"), Language::C);
    assert_eq!(Language::from_extension("exe"), Language::Unknown);
}

#[test]
fn language_from_str_accepts_tags_and_extensions() {
    assert_eq!("typescript".parse::<Language>().unwrap(), Language::Typescript);
    assert_eq!("ts".parse::<Language>().unwrap(), Language::Typescript);
    assert_eq!("rs".parse::<Language>().unwrap(), Language::Rust);
    assert!("brainfuck".parse::<Language>().is_err());
}

#[test]
fn chunk_id_is_stable_and_path_sensitive() {
    let a = chunk_id("a.go", "func main() {}");
    let b = chunk_id("a.go", "func main() {}");
    let c = chunk_id("b.go", "func main() {}");

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.len(), 32);
    assert!(a.chars().all(|ch| ch.is_ascii_hexdigit()));
}

#[test]
fn content_hash_is_short_form() {
    let h = content_hash("func main() {}");
    assert_eq!(h.len(), 16);
    assert_ne!(h, content_hash("func main() { }"));
}

#[test]
fn chunk_new_derives_ids() {
    let chunk = Chunk::new(
        "src/auth.go",
        Language::Go,
        ChunkKind::Function,
        "HandleLogin",
        "func HandleLogin(w http.ResponseWriter, r *http.Request)",
        "func HandleLogin(w http.ResponseWriter, r *http.Request) {\n}\n",
        10,
        12,
    );

    assert_eq!(chunk.id, chunk_id("src/auth.go", &chunk.content));
    assert_eq!(chunk.content_hash, content_hash(&chunk.content));
    assert_eq!(chunk.line_count(), 3);
    assert!(chunk.vector_slot.is_none());
}

#[test]
fn embedding_text_layout() {
    let mut chunk = Chunk::new(
        "src/user.py",
        Language::Python,
        ChunkKind::Method,
        "greet",
        "def greet(self)",
        "def greet(self):\n    return 'hi'",
        2,
        3,
    );
    chunk.parent_name = Some("User".to_string());

    let text = chunk.embedding_text();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "method greet");
    assert_eq!(lines[1], "def greet(self)");
    assert_eq!(lines[2], "in User");
    assert!(lines[3].starts_with("def greet(self):"));
}

#[test]
fn embedding_text_skips_signature_equal_to_name() {
    let chunk = Chunk::new(
        "a.go",
        Language::Go,
        ChunkKind::Constant,
        "MaxRetries",
        "MaxRetries",
        "const MaxRetries = 3",
        1,
        1,
    );

    let text = chunk.embedding_text();
    assert_eq!(text.lines().next().unwrap(), "constant MaxRetries");
    assert_eq!(text.lines().count(), 2);
}

#[test]
fn embedding_text_truncates_long_content() {
    let content = "x".repeat(5000);
    let chunk = Chunk::new(
        "big.go",
        Language::Go,
        ChunkKind::Function,
        "big",
        "func big()",
        &content,
        1,
        200,
    );

    let text = chunk.embedding_text();
    assert!(text.ends_with("..."));
    // kind/name line + signature line + truncated body.
    assert!(text.len() < 2100);
}

#[test]
fn search_filter_emptiness() {
    assert!(SearchFilter::default().is_empty());
    let filter = SearchFilter {
        kinds: vec![ChunkKind::Function],
        ..Default::default()
    };
    assert!(!filter.is_empty());
}
