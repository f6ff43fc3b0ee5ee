pub mod highlight;
pub mod lexer;
pub mod preview;
pub mod retention;
pub mod search;
pub mod settings;
pub mod snippet_store;
