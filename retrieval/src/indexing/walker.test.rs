use super::*;
use pretty_assertions::assert_eq;

fn touch(root: &Path, rel: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, "func x() {}\n").unwrap();
}

fn walked(root: &Path, excludes: &[String]) -> Vec<String> {
    FileWalker::new(root, excludes)
        .walk()
        .into_iter()
        .map(|(rel, _)| rel)
        .collect()
}

#[test]
fn walk_finds_supported_extensions_only() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "a.go");
    touch(dir.path(), "src/b.py");
    touch(dir.path(), "README.md");
    touch(dir.path(), "binary.exe");
    touch(dir.path(), "Makefile");

    let files = walked(dir.path(), &[]);
    assert_eq!(files, vec!["a.go".to_string(), "src/b.py".to_string()]);
}

#[test]
fn walk_skips_dot_and_listed_dirs() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "src/main.go");
    touch(dir.path(), ".git/hooks/x.go");
    touch(dir.path(), ".zrok/index/y.go");
    touch(dir.path(), "node_modules/pkg/z.js");
    touch(dir.path(), "vendor/lib/w.go");
    touch(dir.path(), "target/debug/t.rs");
    touch(dir.path(), "__pycache__/c.py");

    let files = walked(dir.path(), &[]);
    assert_eq!(files, vec!["src/main.go".to_string()]);
}

#[test]
fn walk_skips_minified_and_vendor_files() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "app.js");
    touch(dir.path(), "app.min.js");
    touch(dir.path(), "app.bundle.js");
    touch(dir.path(), "jquery-3.7.1.js");
    touch(dir.path(), "bootstrap.esm.js");
    touch(dir.path(), "chart.js");

    let files = walked(dir.path(), &[]);
    assert_eq!(files, vec!["app.js".to_string()]);
}

#[test]
fn walk_skips_generated_asset_paths() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "public/assets/app.js");
    touch(dir.path(), "assets/builds/out.js");
    touch(dir.path(), "public/app.js");

    let files = walked(dir.path(), &[]);
    assert_eq!(files, vec!["public/app.js".to_string()]);
}

#[test]
fn user_globs_exclude_files_and_dirs() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "src/main.go");
    touch(dir.path(), "src/main_test.go");
    touch(dir.path(), "generated/schema.go");

    let files = walked(dir.path(), &["*_test.go".to_string(), "generated".to_string()]);
    assert_eq!(files, vec!["src/main.go".to_string()]);
}

#[test]
fn relative_paths_use_forward_slashes() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "a/b/c.rb");

    let files = FileWalker::new(dir.path(), &[]).walk();
    assert_eq!(files[0].0, "a/b/c.rb");
    assert!(files[0].1.is_absolute());
}

#[test]
fn glob_match_basics() {
    assert!(glob_match("*.go", "main.go"));
    assert!(glob_match("src/*.go", "src/main.go"));
    assert!(glob_match("*_test.go", "src/main_test.go"));
    assert!(glob_match("src/*", "src/deep/file.go"));
    assert!(glob_match("a?c", "abc"));

    assert!(!glob_match("*.go", "main.rs"));
    assert!(!glob_match("a?c", "ac"));
}
