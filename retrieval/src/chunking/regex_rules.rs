//! Regex fallback extraction, one pattern set per language.
//!
//! Used when no language server is available or when LSP returns nothing.
//! Block ends are found structurally: brace balancing for brace languages,
//! indentation for Python, keyword/`end` counting for Ruby.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::ChunkKind;
use crate::types::Language;

/// A span located by regex, 1-indexed inclusive lines.
#[derive(Debug, Clone, PartialEq)]
pub struct RegexSpan {
    pub kind: ChunkKind,
    pub name: String,
    pub signature: String,
    pub start_line: u32,
    pub end_line: u32,
    pub parent_name: Option<String>,
}

/// Extract spans from `lines` for the given language.
///
/// Returns spans in source order. Nested definitions (Python methods, Ruby
/// methods, Rust impl fns, brace-language members) carry the enclosing
/// definition in `parent_name`.
pub fn extract_spans(language: Language, lines: &[&str]) -> Vec<RegexSpan> {
    let mut spans = match language {
        Language::Go => extract_go(lines),
        Language::Python => extract_python(lines),
        Language::Javascript | Language::Javascriptreact => extract_js(lines, false),
        Language::Typescript | Language::Typescriptreact => extract_js(lines, true),
        Language::Java => extract_java(lines),
        Language::Rust => extract_rust(lines),
        Language::Ruby => extract_ruby(lines),
        Language::C | Language::Cpp => extract_c(lines),
        Language::Unknown => Vec::new(),
    };
    spans.sort_by(|a, b| {
        a.start_line
            .cmp(&b.start_line)
            .then(b.end_line.cmp(&a.end_line))
    });
    spans
}

// ---------------------------------------------------------------------------
// Block-end scanners
// ---------------------------------------------------------------------------

/// End of a brace-delimited block starting at `start` (0-indexed).
///
/// Scans forward balancing `{` against `}`. A declaration that never opens
/// a brace (one-line const, prototype) ends on its own line.
pub fn brace_block_end(lines: &[&str], start: usize) -> usize {
    let mut depth: i32 = 0;
    let mut opened = false;

    for (i, line) in lines.iter().enumerate().skip(start) {
        for ch in line.chars() {
            match ch {
                '{' => {
                    depth += 1;
                    opened = true;
                }
                '}' => depth -= 1,
                _ => {}
            }
        }
        if opened && depth <= 0 {
            return i;
        }
        // Headers may spread the opening brace over a few lines; give up
        // after a window and treat it as a single-line declaration.
        if !opened && i > start + 4 {
            return start;
        }
    }
    if opened {
        lines.len().saturating_sub(1)
    } else {
        start
    }
}

/// End of a Python block: the line before the first subsequent non-blank,
/// non-comment line whose indent is ≤ the opening line's indent.
pub fn indent_block_end(lines: &[&str], start: usize, indent: usize) -> usize {
    let mut last_code = start;
    for (i, line) in lines.iter().enumerate().skip(start + 1) {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line_indent = line.len() - trimmed.len();
        if line_indent <= indent {
            return last_code;
        }
        last_code = i;
    }
    last_code
}

/// Ruby keywords that open a block closed by `end`.
static RUBY_OPENERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(def|class|module|if|unless|case|while|until|begin|for)\b").unwrap()
});
static RUBY_DO: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bdo\s*(\|[^|]*\|)?\s*$").unwrap());
static RUBY_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*end\b|\bend\b\s*$").unwrap());
static RUBY_MODIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\S\s+(if|unless|while|until)\b").unwrap());

/// End of a Ruby block: count opener keywords against `end` occurrences.
pub fn ruby_block_end(lines: &[&str], start: usize) -> usize {
    let mut depth: i32 = 1;
    for (i, line) in lines.iter().enumerate().skip(start + 1) {
        let is_modifier = RUBY_MODIFIER.is_match(line);
        if RUBY_OPENERS.is_match(line) && !is_modifier {
            depth += 1;
        } else if RUBY_DO.is_match(line) {
            depth += 1;
        }
        if RUBY_END.is_match(line) {
            depth -= 1;
            if depth <= 0 {
                return i;
            }
        }
    }
    lines.len().saturating_sub(1)
}

// ---------------------------------------------------------------------------
// Go
// ---------------------------------------------------------------------------

static GO_FUNC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^func\s+(?:\(\s*\w+\s+(\*?)(\w+)\s*\)\s+)?(\w+)\s*\(").unwrap()
});
static GO_TYPE_STRUCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^type\s+(\w+)\s+struct\b").unwrap());
static GO_TYPE_INTERFACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^type\s+(\w+)\s+interface\b").unwrap());
static GO_CONST: Lazy<Regex> = Lazy::new(|| Regex::new(r"^const\s+(\w+)\b").unwrap());
static GO_VAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^var\s+(\w+)\b").unwrap());

fn extract_go(lines: &[&str]) -> Vec<RegexSpan> {
    let mut spans = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        if let Some(caps) = GO_FUNC.captures(line) {
            let name = caps[3].to_string();
            // Receiver type loses its pointer marker: `(s *Server)` → Server.
            let receiver = caps.get(2).map(|m| m.as_str().to_string());
            let kind = if receiver.is_some() {
                ChunkKind::Method
            } else {
                ChunkKind::Function
            };
            spans.push(span(kind, &name, line, i, brace_block_end(lines, i), receiver));
        } else if let Some(caps) = GO_TYPE_STRUCT.captures(line) {
            spans.push(span(ChunkKind::Struct, &caps[1], line, i, brace_block_end(lines, i), None));
        } else if let Some(caps) = GO_TYPE_INTERFACE.captures(line) {
            spans.push(span(
                ChunkKind::Interface,
                &caps[1],
                line,
                i,
                brace_block_end(lines, i),
                None,
            ));
        } else if let Some(caps) = GO_CONST.captures(line) {
            spans.push(span(ChunkKind::Constant, &caps[1], line, i, i, None));
        } else if let Some(caps) = GO_VAR.captures(line) {
            spans.push(span(ChunkKind::Variable, &caps[1], line, i, i, None));
        }
    }

    spans
}

// ---------------------------------------------------------------------------
// Python
// ---------------------------------------------------------------------------

static PY_CLASS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\s*)class\s+(\w+)").unwrap());
static PY_DEF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*)(?:async\s+)?def\s+(\w+)\s*\(").unwrap());

fn extract_python(lines: &[&str]) -> Vec<RegexSpan> {
    // First pass: classes, which provide parent context for methods.
    let mut classes: Vec<(String, usize, usize, usize)> = Vec::new(); // (name, indent, start, end)
    for (i, line) in lines.iter().enumerate() {
        if let Some(caps) = PY_CLASS.captures(line) {
            let indent = caps[1].len();
            let end = indent_block_end(lines, i, indent);
            classes.push((caps[2].to_string(), indent, i, end));
        }
    }

    let mut spans: Vec<RegexSpan> = classes
        .iter()
        .map(|(name, _, start, end)| {
            span(ChunkKind::Class, name, lines[*start], *start, *end, None)
        })
        .collect();

    for (i, line) in lines.iter().enumerate() {
        if let Some(caps) = PY_DEF.captures(line) {
            let indent = caps[1].len();
            let end = indent_block_end(lines, i, indent);

            // Innermost enclosing class with a shallower indent.
            let parent = classes
                .iter()
                .filter(|(_, c_indent, c_start, c_end)| {
                    *c_start < i && i <= *c_end && *c_indent < indent
                })
                .max_by_key(|(_, c_indent, _, _)| *c_indent)
                .map(|(name, _, _, _)| name.clone());

            let kind = if parent.is_some() {
                ChunkKind::Method
            } else {
                ChunkKind::Function
            };
            spans.push(span(kind, &caps[2], line, i, end, parent));
        }
    }

    spans
}

// ---------------------------------------------------------------------------
// JavaScript / TypeScript
// ---------------------------------------------------------------------------

static JS_FUNCTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*(\w+)\s*\(").unwrap()
});
static JS_CLASS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:export\s+)?(?:default\s+)?(?:abstract\s+)?class\s+(\w+)").unwrap()
});
static JS_ARROW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:export\s+)?(?:const|let|var)\s+(\w+)\s*=\s*(?:async\s+)?(?:\([^)]*\)|\w+)\s*=>")
        .unwrap()
});
static JS_CONST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:export\s+)?const\s+([A-Z][A-Z0-9_]*)\s*=").unwrap());
static TS_INTERFACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:export\s+)?interface\s+(\w+)").unwrap());
static TS_ENUM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:export\s+)?(?:const\s+)?enum\s+(\w+)").unwrap());

fn extract_js(lines: &[&str], typescript: bool) -> Vec<RegexSpan> {
    let mut spans = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        if let Some(caps) = JS_FUNCTION.captures(line) {
            spans.push(span(
                ChunkKind::Function,
                &caps[1],
                line,
                i,
                brace_block_end(lines, i),
                None,
            ));
        } else if let Some(caps) = JS_CLASS.captures(line) {
            spans.push(span(ChunkKind::Class, &caps[1], line, i, brace_block_end(lines, i), None));
        } else if let Some(caps) = typescript.then(|| TS_INTERFACE.captures(line)).flatten() {
            spans.push(span(
                ChunkKind::Interface,
                &caps[1],
                line,
                i,
                brace_block_end(lines, i),
                None,
            ));
        } else if let Some(caps) = typescript.then(|| TS_ENUM.captures(line)).flatten() {
            spans.push(span(ChunkKind::Enum, &caps[1], line, i, brace_block_end(lines, i), None));
        } else if let Some(caps) = JS_ARROW.captures(line) {
            spans.push(span(
                ChunkKind::Function,
                &caps[1],
                line,
                i,
                arrow_end(lines, i),
                None,
            ));
        } else if let Some(caps) = JS_CONST.captures(line) {
            spans.push(span(ChunkKind::Constant, &caps[1], line, i, i, None));
        }
    }

    spans
}

/// Arrow functions may be expression-bodied (one line) or block-bodied.
fn arrow_end(lines: &[&str], start: usize) -> usize {
    if lines[start].contains('{') {
        brace_block_end(lines, start)
    } else {
        start
    }
}

// ---------------------------------------------------------------------------
// Java
// ---------------------------------------------------------------------------

/// Control-flow keywords that look like method calls in `name(...) {`.
const CONTROL_FLOW: &[&str] = &["if", "for", "while", "switch", "catch", "return", "else"];

static JAVA_CLASS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:(?:public|private|protected|static|final|abstract)\s+)*class\s+(\w+)")
        .unwrap()
});
static JAVA_INTERFACE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:(?:public|private|protected|static)\s+)*interface\s+(\w+)").unwrap()
});
static JAVA_ENUM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:(?:public|private|protected|static)\s+)*enum\s+(\w+)").unwrap()
});
static JAVA_METHOD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:(?:public|private|protected|static|final|synchronized|abstract|native)\s+)*[\w<>\[\],\s]+?\s+(\w+)\s*\([^;]*\)\s*(?:throws\s+[\w.,\s]+)?\s*\{",
    )
    .unwrap()
});

fn extract_java(lines: &[&str]) -> Vec<RegexSpan> {
    let mut types: Vec<(String, usize, usize)> = Vec::new();
    let mut spans = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        if let Some(caps) = JAVA_CLASS.captures(line) {
            let end = brace_block_end(lines, i);
            types.push((caps[1].to_string(), i, end));
            spans.push(span(ChunkKind::Class, &caps[1], line, i, end, None));
        } else if let Some(caps) = JAVA_INTERFACE.captures(line) {
            let end = brace_block_end(lines, i);
            types.push((caps[1].to_string(), i, end));
            spans.push(span(ChunkKind::Interface, &caps[1], line, i, end, None));
        } else if let Some(caps) = JAVA_ENUM.captures(line) {
            let end = brace_block_end(lines, i);
            types.push((caps[1].to_string(), i, end));
            spans.push(span(ChunkKind::Enum, &caps[1], line, i, end, None));
        } else if let Some(caps) = JAVA_METHOD.captures(line) {
            let name = caps[1].to_string();
            if CONTROL_FLOW.contains(&name.as_str()) {
                continue;
            }
            let parent = types
                .iter()
                .rev()
                .find(|(_, start, end)| *start < i && i <= *end)
                .map(|(n, _, _)| n.clone());
            spans.push(span(
                ChunkKind::Method,
                &name,
                line,
                i,
                brace_block_end(lines, i),
                parent,
            ));
        }
    }

    spans
}

// ---------------------------------------------------------------------------
// Rust
// ---------------------------------------------------------------------------

static RUST_FN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?(?:unsafe\s+)?(?:extern\s+\S+\s+)?fn\s+(\w+)")
        .unwrap()
});
static RUST_STRUCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:pub(?:\([^)]*\))?\s+)?struct\s+(\w+)").unwrap());
static RUST_ENUM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:pub(?:\([^)]*\))?\s+)?enum\s+(\w+)").unwrap());
static RUST_TRAIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:pub(?:\([^)]*\))?\s+)?(?:unsafe\s+)?trait\s+(\w+)").unwrap());
static RUST_MOD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:pub(?:\([^)]*\))?\s+)?mod\s+(\w+)").unwrap());
static RUST_CONST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:pub(?:\([^)]*\))?\s+)?(?:const|static)\s+(\w+)").unwrap());
static RUST_IMPL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^impl(?:<[^>]*>)?\s+(?:[\w:]+(?:<[^>]*>)?\s+for\s+)?([\w:]+)").unwrap()
});

fn extract_rust(lines: &[&str]) -> Vec<RegexSpan> {
    // impl blocks provide parent context but are not chunks themselves.
    let mut impls: Vec<(String, usize, usize)> = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        if let Some(caps) = RUST_IMPL.captures(line) {
            impls.push((caps[1].to_string(), i, brace_block_end(lines, i)));
        }
    }

    let mut spans = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        if let Some(caps) = RUST_FN.captures(line) {
            let parent = impls
                .iter()
                .find(|(_, start, end)| *start < i && i <= *end)
                .map(|(n, _, _)| n.clone());
            let kind = if parent.is_some() {
                ChunkKind::Method
            } else {
                ChunkKind::Function
            };
            spans.push(span(kind, &caps[1], line, i, brace_block_end(lines, i), parent));
        } else if let Some(caps) = RUST_STRUCT.captures(line) {
            spans.push(span(ChunkKind::Struct, &caps[1], line, i, brace_block_end(lines, i), None));
        } else if let Some(caps) = RUST_ENUM.captures(line) {
            spans.push(span(ChunkKind::Enum, &caps[1], line, i, brace_block_end(lines, i), None));
        } else if let Some(caps) = RUST_TRAIT.captures(line) {
            spans.push(span(
                ChunkKind::Interface,
                &caps[1],
                line,
                i,
                brace_block_end(lines, i),
                None,
            ));
        } else if let Some(caps) = RUST_MOD.captures(line) {
            spans.push(span(ChunkKind::Module, &caps[1], line, i, brace_block_end(lines, i), None));
        } else if let Some(caps) = RUST_CONST.captures(line) {
            spans.push(span(ChunkKind::Constant, &caps[1], line, i, i, None));
        }
    }

    spans
}

// ---------------------------------------------------------------------------
// Ruby
// ---------------------------------------------------------------------------

static RB_CLASS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\s*)class\s+(\w+)").unwrap());
static RB_MODULE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\s*)module\s+(\w+)").unwrap());
static RB_DEF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*)def\s+(?:self\.)?([\w?!=\[\]]+)").unwrap());

fn extract_ruby(lines: &[&str]) -> Vec<RegexSpan> {
    let mut containers: Vec<(String, usize, usize)> = Vec::new();
    let mut spans = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        if let Some(caps) = RB_CLASS.captures(line) {
            let end = ruby_block_end(lines, i);
            containers.push((caps[2].to_string(), i, end));
            spans.push(span(ChunkKind::Class, &caps[2], line, i, end, None));
        } else if let Some(caps) = RB_MODULE.captures(line) {
            let end = ruby_block_end(lines, i);
            containers.push((caps[2].to_string(), i, end));
            spans.push(span(ChunkKind::Module, &caps[2], line, i, end, None));
        } else if let Some(caps) = RB_DEF.captures(line) {
            let end = ruby_block_end(lines, i);
            let parent = containers
                .iter()
                .rev()
                .find(|(_, start, c_end)| *start < i && i <= *c_end)
                .map(|(n, _, _)| n.clone());
            let kind = if parent.is_some() {
                ChunkKind::Method
            } else {
                ChunkKind::Function
            };
            spans.push(span(kind, &caps[2], line, i, end, parent));
        }
    }

    spans
}

// ---------------------------------------------------------------------------
// C / C++
// ---------------------------------------------------------------------------

// Prototypes end in `;` and never match; the optional trailing brace
// covers definitions with the brace on the following line.
static C_FUNCTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][\w\s*&:<>,]*?[\s*]([A-Za-z_]\w*)\s*\([^;{]*\)\s*(?:const\s*)?\{?\s*$")
        .unwrap()
});
static C_STRUCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:typedef\s+)?struct\s+(\w+)").unwrap());
static CPP_CLASS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^class\s+(\w+)").unwrap());

fn extract_c(lines: &[&str]) -> Vec<RegexSpan> {
    let mut spans = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        if let Some(caps) = CPP_CLASS.captures(line) {
            spans.push(span(ChunkKind::Class, &caps[1], line, i, brace_block_end(lines, i), None));
        } else if let Some(caps) = C_STRUCT.captures(line) {
            spans.push(span(ChunkKind::Struct, &caps[1], line, i, brace_block_end(lines, i), None));
        } else if let Some(caps) = C_FUNCTION.captures(line) {
            let name = caps[1].to_string();
            if CONTROL_FLOW.contains(&name.as_str()) {
                continue;
            }
            spans.push(span(
                ChunkKind::Function,
                &name,
                line,
                i,
                brace_block_end(lines, i),
                None,
            ));
        }
    }

    spans
}

// ---------------------------------------------------------------------------

/// Assemble a span; `start`/`end` are 0-indexed and converted here.
fn span(
    kind: ChunkKind,
    name: &str,
    first_line: &str,
    start: usize,
    end: usize,
    parent_name: Option<String>,
) -> RegexSpan {
    RegexSpan {
        kind,
        name: name.to_string(),
        signature: first_line.trim().trim_end_matches('{').trim().to_string(),
        start_line: start as u32 + 1,
        end_line: end.max(start) as u32 + 1,
        parent_name,
    }
}

#[cfg(test)]
#[path = "regex_rules.test.rs"]
mod tests;
