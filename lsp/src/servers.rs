//! Known language servers and how to invoke them.

use which::which;

/// Invocation recipe for one language server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSpec {
    /// Language id this server handles (LSP `languageId` values).
    pub language: &'static str,
    /// Binary name, resolved via PATH.
    pub command: &'static str,
    /// Arguments required for stdio operation.
    pub args: &'static [&'static str],
}

impl ServerSpec {
    /// Whether the server binary is installed.
    pub fn is_available(&self) -> bool {
        which(self.command).is_ok()
    }
}

/// Registry of supported servers, one per language family.
///
/// TypeScript flavors share typescript-language-server; C and C++ share
/// clangd. The pool keys clients by `ServerSpec::command` so shared servers
/// are spawned once.
const SERVERS: &[ServerSpec] = &[
    ServerSpec {
        language: "go",
        command: "gopls",
        args: &[],
    },
    ServerSpec {
        language: "python",
        command: "pyright-langserver",
        args: &["--stdio"],
    },
    ServerSpec {
        language: "javascript",
        command: "typescript-language-server",
        args: &["--stdio"],
    },
    ServerSpec {
        language: "typescript",
        command: "typescript-language-server",
        args: &["--stdio"],
    },
    ServerSpec {
        language: "javascriptreact",
        command: "typescript-language-server",
        args: &["--stdio"],
    },
    ServerSpec {
        language: "typescriptreact",
        command: "typescript-language-server",
        args: &["--stdio"],
    },
    ServerSpec {
        language: "rust",
        command: "rust-analyzer",
        args: &[],
    },
    ServerSpec {
        language: "java",
        command: "jdtls",
        args: &[],
    },
    ServerSpec {
        language: "ruby",
        command: "solargraph",
        args: &["stdio"],
    },
    ServerSpec {
        language: "c",
        command: "clangd",
        args: &[],
    },
    ServerSpec {
        language: "cpp",
        command: "clangd",
        args: &[],
    },
];

/// Look up the server recipe for an LSP language id.
pub fn server_for_language(language: &str) -> Option<&'static ServerSpec> {
    SERVERS.iter().find(|s| s.language == language)
}

#[cfg(test)]
#[path = "servers.test.rs"]
mod tests;
