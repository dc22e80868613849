use super::*;
use pretty_assertions::assert_eq;

#[test]
fn known_languages_resolve() {
    assert_eq!(server_for_language("go").unwrap().command, "gopls");
    assert_eq!(server_for_language("rust").unwrap().command, "rust-analyzer");
    assert_eq!(server_for_language("ruby").unwrap().args, &["stdio"]);
}

#[test]
fn typescript_flavors_share_one_server() {
    let ts = server_for_language("typescript").unwrap();
    let tsx = server_for_language("typescriptreact").unwrap();
    let js = server_for_language("javascript").unwrap();
    assert_eq!(ts.command, tsx.command);
    assert_eq!(ts.command, js.command);
}

#[test]
fn c_and_cpp_share_clangd() {
    assert_eq!(server_for_language("c").unwrap().command, "clangd");
    assert_eq!(server_for_language("cpp").unwrap().command, "clangd");
}

#[test]
fn unknown_language_has_no_server() {
    assert!(server_for_language("cobol").is_none());
    assert!(server_for_language("unknown").is_none());
}
