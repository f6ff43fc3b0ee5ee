use once_cell::sync::Lazy;
use syntect::parsing::{SyntaxReference, SyntaxSet};

use crate::error::{StoreError, StoreResult};

static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);

/// A resolved language: the tokenizer plus its canonical display name.
#[derive(Clone, Copy)]
pub struct Lexer {
    syntax: &'static SyntaxReference,
}

impl Lexer {
    pub fn name(&self) -> &'static str {
        &self.syntax.name
    }

    pub(crate) fn syntax(&self) -> &'static SyntaxReference {
        self.syntax
    }
}

impl std::fmt::Debug for Lexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Lexer").field(&self.syntax.name).finish()
    }
}

pub(crate) fn syntax_set() -> &'static SyntaxSet {
    &SYNTAX_SET
}

fn canonical_token(hint: &str) -> String {
    let hint = hint.trim().to_ascii_lowercase();
    match hint.as_str() {
        "javascript" | "js" | "node" => "js".to_string(),
        "python" | "py" | "python3" => "py".to_string(),
        "golang" | "go" => "go".to_string(),
        "shell" | "bash" | "sh" | "zsh" => "sh".to_string(),
        "csharp" | "c#" | "cs" => "cs".to_string(),
        "cpp" | "c++" | "cxx" => "cpp".to_string(),
        "markdown" | "md" => "md".to_string(),
        "yaml" | "yml" => "yaml".to_string(),
        "rust" | "rs" => "rs".to_string(),
        "plaintext" | "plain" | "text" | "txt" => "txt".to_string(),
        _ => hint,
    }
}

/// Resolves a language hint by file extension, alias, or case-insensitive name.
pub fn lookup(hint: &str) -> StoreResult<Lexer> {
    let token = canonical_token(hint);
    if token.is_empty() {
        return Err(StoreError::UnknownLanguage(hint.to_string()));
    }
    SYNTAX_SET
        .find_syntax_by_token(&token)
        .map(|syntax| Lexer { syntax })
        .ok_or_else(|| StoreError::UnknownLanguage(hint.to_string()))
}
