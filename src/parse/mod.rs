mod builder;
mod lexer;
mod parser;
mod token;

pub use builder::Builder;
pub use lexer::Lexer;
pub use parser::*;
pub use token::Token;
