use super::*;
use pretty_assertions::assert_eq;

fn spans_for(language: Language, source: &str) -> Vec<RegexSpan> {
    let lines: Vec<&str> = source.lines().collect();
    extract_spans(language, &lines)
}

#[test]
fn go_function_and_method() {
    let source = "\
func HandleLogin(w http.ResponseWriter, r *http.Request) {
    return
}

func (s *Server) Close() error {
    return nil
}
";
    let spans = spans_for(Language::Go, source);
    assert_eq!(spans.len(), 2);

    assert_eq!(spans[0].kind, ChunkKind::Function);
    assert_eq!(spans[0].name, "HandleLogin");
    assert_eq!((spans[0].start_line, spans[0].end_line), (1, 3));

    // Receiver type loses the pointer marker.
    assert_eq!(spans[1].kind, ChunkKind::Method);
    assert_eq!(spans[1].name, "Close");
    assert_eq!(spans[1].parent_name.as_deref(), Some("Server"));
}

#[test]
fn go_types_and_constants() {
    let source = "\
type User struct {
    Name string
}

type Store interface {
    Get(id string) (*User, error)
}

const MaxRetries = 3
var defaultTimeout = time.Second
";
    let spans = spans_for(Language::Go, source);
    let kinds: Vec<ChunkKind> = spans.iter().map(|s| s.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ChunkKind::Struct,
            ChunkKind::Interface,
            ChunkKind::Constant,
            ChunkKind::Variable
        ]
    );
    assert_eq!(spans[0].end_line, 3);
    assert_eq!(spans[2].start_line, spans[2].end_line);
}

#[test]
fn python_nested_extraction() {
    // Scenario: class with two methods plus a top-level function.
    let source = "\
class User:
    def __init__(self): ...
    def greet(self): ...
def top(): ...
";
    let spans = spans_for(Language::Python, source);
    assert_eq!(spans.len(), 4);

    assert_eq!(spans[0].kind, ChunkKind::Class);
    assert_eq!(spans[0].name, "User");

    assert_eq!(spans[1].kind, ChunkKind::Method);
    assert_eq!(spans[1].name, "__init__");
    assert_eq!(spans[1].parent_name.as_deref(), Some("User"));

    assert_eq!(spans[2].kind, ChunkKind::Method);
    assert_eq!(spans[2].name, "greet");
    assert_eq!(spans[2].parent_name.as_deref(), Some("User"));

    assert_eq!(spans[3].kind, ChunkKind::Function);
    assert_eq!(spans[3].name, "top");
    assert_eq!(spans[3].parent_name, None);
}

#[test]
fn python_block_ends_at_dedent() {
    let source = "\
def first():
    a = 1

    b = 2
def second():
    pass
";
    let spans = spans_for(Language::Python, source);
    assert_eq!(spans.len(), 2);
    // Trailing blank line inside the block does not extend it past code.
    assert_eq!((spans[0].start_line, spans[0].end_line), (1, 4));
    assert_eq!((spans[1].start_line, spans[1].end_line), (5, 6));
}

#[test]
fn typescript_shapes() {
    let source = "\
export interface Props {
    title: string;
}

export enum Mode {
    Fast,
    Slow,
}

export function render(props: Props) {
    return props.title;
}

export const format = (m: Mode) => {
    return String(m);
};

export const MAX_DEPTH = 8;
";
    let spans = spans_for(Language::Typescript, source);
    let kinds: Vec<(ChunkKind, &str)> = spans
        .iter()
        .map(|s| (s.kind, s.name.as_str()))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (ChunkKind::Interface, "Props"),
            (ChunkKind::Enum, "Mode"),
            (ChunkKind::Function, "render"),
            (ChunkKind::Function, "format"),
            (ChunkKind::Constant, "MAX_DEPTH"),
        ]
    );
}

#[test]
fn java_excludes_control_flow() {
    let source = "\
public class Account {
    public void deposit(long amount) {
        if (amount > 0) {
            balance += amount;
        }
        while (pending) {
            drain();
        }
    }
}
";
    let spans = spans_for(Language::Java, source);
    assert_eq!(spans.len(), 2);
    assert_eq!(spans[0].kind, ChunkKind::Class);
    assert_eq!(spans[1].kind, ChunkKind::Method);
    assert_eq!(spans[1].name, "deposit");
    assert_eq!(spans[1].parent_name.as_deref(), Some("Account"));
}

#[test]
fn rust_impl_methods_get_parent() {
    let source = "\
pub struct Engine {
    state: u32,
}

impl Engine {
    pub fn start(&mut self) {
        self.state = 1;
    }
}

pub fn helper() {}
";
    let spans = spans_for(Language::Rust, source);

    let engine = spans.iter().find(|s| s.name == "Engine").unwrap();
    assert_eq!(engine.kind, ChunkKind::Struct);

    let start = spans.iter().find(|s| s.name == "start").unwrap();
    assert_eq!(start.kind, ChunkKind::Method);
    assert_eq!(start.parent_name.as_deref(), Some("Engine"));

    let helper = spans.iter().find(|s| s.name == "helper").unwrap();
    assert_eq!(helper.kind, ChunkKind::Function);
}

#[test]
fn ruby_keyword_counting() {
    let source = "\
class Cart
  def add(item)
    items.each do |i|
      puts i
    end
    if full?
      raise
    end
  end
end

def checkout
  true
end
";
    let spans = spans_for(Language::Ruby, source);
    assert_eq!(spans.len(), 3);

    assert_eq!(spans[0].kind, ChunkKind::Class);
    assert_eq!((spans[0].start_line, spans[0].end_line), (1, 10));

    assert_eq!(spans[1].kind, ChunkKind::Method);
    assert_eq!(spans[1].name, "add");
    assert_eq!((spans[1].start_line, spans[1].end_line), (2, 9));
    assert_eq!(spans[1].parent_name.as_deref(), Some("Cart"));

    assert_eq!(spans[2].kind, ChunkKind::Function);
    assert_eq!(spans[2].name, "checkout");
}

#[test]
fn c_functions_skip_prototypes() {
    let source = "\
int add(int a, int b);

int add(int a, int b) {
    return a + b;
}

struct point {
    int x;
    int y;
};
";
    let spans = spans_for(Language::C, source);
    assert_eq!(spans.len(), 2);
    assert_eq!(spans[0].kind, ChunkKind::Function);
    assert_eq!((spans[0].start_line, spans[0].end_line), (3, 5));
    assert_eq!(spans[1].kind, ChunkKind::Struct);
    assert_eq!(spans[1].name, "point");
}

#[test]
fn brace_block_end_balances_nested() {
    let lines = vec!["fn f() {", "  if x {", "    y();", "  }", "}", "fn g() {}"];
    assert_eq!(brace_block_end(&lines, 0), 4);
    assert_eq!(brace_block_end(&lines, 5), 5);
}

#[test]
fn brace_block_end_without_brace_is_single_line() {
    let lines = vec!["const X = 1;", "const Y = 2;"];
    assert_eq!(brace_block_end(&lines, 0), 0);
}

#[test]
fn unknown_language_extracts_nothing() {
    assert!(spans_for(Language::Unknown, "anything at all").is_empty());
}
