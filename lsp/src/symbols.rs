//! Conversion of LSP symbol responses into a uniform tree.

use lsp_types::DocumentSymbol;
use lsp_types::DocumentSymbolResponse;
use lsp_types::SymbolInformation;
use lsp_types::SymbolKind;

/// One node of the document symbol tree, range in zero-indexed lines as the
/// protocol delivers them. Consumers convert to one-indexed.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolNode {
    pub name: String,
    /// Signature-like detail string, when the server provides one.
    pub detail: Option<String>,
    pub kind: SymbolKind,
    pub start_line: u32,
    pub end_line: u32,
    pub children: Vec<SymbolNode>,
}

/// Normalize either response shape into a tree.
///
/// Hierarchical `DocumentSymbol[]` is used as-is. The flat
/// `SymbolInformation[]` shape is converted by synthesizing empty children;
/// nesting is not reconstructed from containers.
pub fn to_symbol_tree(response: DocumentSymbolResponse) -> Vec<SymbolNode> {
    match response {
        DocumentSymbolResponse::Nested(symbols) => {
            symbols.iter().map(from_document_symbol).collect()
        }
        DocumentSymbolResponse::Flat(symbols) => {
            symbols.iter().map(from_symbol_information).collect()
        }
    }
}

fn from_document_symbol(symbol: &DocumentSymbol) -> SymbolNode {
    SymbolNode {
        name: symbol.name.clone(),
        detail: symbol.detail.clone(),
        kind: symbol.kind,
        start_line: symbol.range.start.line,
        end_line: symbol.range.end.line,
        children: symbol
            .children
            .as_deref()
            .unwrap_or(&[])
            .iter()
            .map(from_document_symbol)
            .collect(),
    }
}

fn from_symbol_information(symbol: &SymbolInformation) -> SymbolNode {
    SymbolNode {
        name: symbol.name.clone(),
        detail: None,
        kind: symbol.kind,
        start_line: symbol.location.range.start.line,
        end_line: symbol.location.range.end.line,
        children: Vec::new(),
    }
}

#[cfg(test)]
#[path = "symbols.test.rs"]
mod tests;
