use super::*;
use lsp_types::Location;
use lsp_types::Position;
use lsp_types::Range;
use lsp_types::Url;
use pretty_assertions::assert_eq;

fn range(start: u32, end: u32) -> Range {
    Range {
        start: Position {
            line: start,
            character: 0,
        },
        end: Position {
            line: end,
            character: 0,
        },
    }
}

#[allow(deprecated)]
fn doc_symbol(name: &str, kind: SymbolKind, r: Range, children: Vec<DocumentSymbol>) -> DocumentSymbol {
    DocumentSymbol {
        name: name.to_string(),
        detail: Some(format!("fn {name}()")),
        kind,
        tags: None,
        deprecated: None,
        range: r,
        selection_range: r,
        children: if children.is_empty() {
            None
        } else {
            Some(children)
        },
    }
}

#[test]
fn nested_response_preserves_hierarchy() {
    let inner = doc_symbol("greet", SymbolKind::METHOD, range(2, 4), vec![]);
    let outer = doc_symbol("User", SymbolKind::CLASS, range(0, 10), vec![inner]);

    let tree = to_symbol_tree(DocumentSymbolResponse::Nested(vec![outer]));

    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].name, "User");
    assert_eq!(tree[0].children.len(), 1);
    assert_eq!(tree[0].children[0].name, "greet");
    assert_eq!(tree[0].children[0].start_line, 2);
    assert_eq!(tree[0].children[0].end_line, 4);
}

#[test]
#[allow(deprecated)]
fn flat_response_gets_empty_children() {
    let info = SymbolInformation {
        name: "HandleLogin".to_string(),
        kind: SymbolKind::FUNCTION,
        tags: None,
        deprecated: None,
        location: Location {
            uri: Url::parse("file:///tmp/a.go").unwrap(),
            range: range(5, 12),
        },
        container_name: Some("main".to_string()),
    };

    let tree = to_symbol_tree(DocumentSymbolResponse::Flat(vec![info]));

    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].name, "HandleLogin");
    assert_eq!(tree[0].detail, None);
    assert!(tree[0].children.is_empty());
    assert_eq!((tree[0].start_line, tree[0].end_line), (5, 12));
}
