//! # kpr
//!
//! kpr is a double-entry bookkeeping compiler, and a library for parsing
//! text-based kpr ledger files into a validated [`Journal`].
//!
//! The pipeline has four stages, each a pure pass over in-memory data:
//! lexing ([`parse::Lexer`]), parsing ([`parse::Parser`]), semantic building
//! ([`parse::Builder`]), and journal compilation ([`Journal::compile`]).
//! Every stage accumulates errors instead of aborting, so callers always get
//! the best-effort result alongside the diagnostics.

mod balance;
mod journal;
pub mod parse;
pub mod utils;

pub use balance::*;
pub use journal::*;
