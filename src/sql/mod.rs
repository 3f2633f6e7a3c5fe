//! SQL front end: lexer, parser and script helpers

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod script;
pub mod token;

pub use ast::*;
pub use lexer::Lexer;
pub use parser::{parse, Parser};
pub use script::{split_statements, strip_comments};
pub use token::{Spanned, Token, TokenKind};
