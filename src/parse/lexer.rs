use super::Token;
use crate::{Error, ErrorLevel, ErrorType, Location, Source, SrcFile};
use logos::{Lexer as LogosLexer, Logos};

/// A pull-based wrapper around the generated token machine: tracks the
/// `(line, col)` location, holds a one-token peek buffer, skips trivia, and
/// records lexical errors without ever stopping the scan.
pub struct Lexer<'source> {
    llex: LogosLexer<'source, Token>,
    location: Location,
    last_token_end: Location,
    peeked_token: Option<(Token, &'source str)>,
    file: SrcFile,
    scan_comments: bool,
    errors: Vec<Error>,
}

impl<'source> Lexer<'source> {
    pub fn new(src: &'source str, file: SrcFile) -> Self {
        Self::with_mode(src, file, false)
    }

    /// A lexer that hands `Comment` tokens to the caller instead of skipping
    /// them, for consumers that want to preserve them (e.g. formatters).
    pub fn with_comments(src: &'source str, file: SrcFile) -> Self {
        Self::with_mode(src, file, true)
    }

    fn with_mode(src: &'source str, file: SrcFile, scan_comments: bool) -> Self {
        let mut lexer = Lexer {
            llex: Token::lexer(src),
            location: (1, 1).into(),
            last_token_end: (1, 1).into(),
            peeked_token: None,
            file,
            scan_comments,
            errors: Vec::new(),
        };
        lexer.skip_trivia();
        lexer
    }

    pub fn last_token_end(&self) -> Location {
        self.last_token_end
    }

    pub fn location(&self) -> Location {
        self.location
    }

    /// Lexical errors recorded so far; draining them is the caller's job
    /// once the token stream is exhausted.
    pub fn take_errors(&mut self) -> Vec<Error> {
        std::mem::take(&mut self.errors)
    }

    fn skip_trivia(&mut self) {
        while let Some(token) = self.llex.next() {
            match token {
                Token::WhiteSpace => self.location.col += self.llex.slice().len(),
                Token::Comment if !self.scan_comments => {
                    self.location.col += self.llex.slice().chars().count();
                }
                Token::Illegal | Token::Error => {
                    let text = self.llex.slice();
                    let start = self.location;
                    self.location.col += text.chars().count();
                    self.errors.push(Error {
                        msg: format!("Illegal token {:?}.", text),
                        src: Source {
                            file: self.file.clone(),
                            start,
                            end: self.location,
                        },
                        r#type: ErrorType::Lexical,
                        level: ErrorLevel::Error,
                    });
                }
                _ => {
                    self.peeked_token = Some((token, self.llex.slice()));
                    return;
                }
            }
        }
    }

    pub fn peek(&mut self) -> Result<(Token, &'source str), Error> {
        let error = Error {
            msg: "Unexpected end of file.".to_string(),
            src: Source {
                file: self.file.clone(),
                start: self.location,
                end: self.location,
            },
            r#type: ErrorType::Syntax,
            level: ErrorLevel::Error,
        };
        self.peeked_token.ok_or(error)
    }

    pub fn consume(&mut self) {
        if let Some((token, text)) = self.peeked_token.take() {
            if token == Token::NewLine {
                self.location.line += 1;
                self.location.col = 1;
            } else {
                self.location.col += text.chars().count();
            }
            self.last_token_end = self.location;
            self.skip_trivia();
        }
    }

    pub fn take(&mut self, expected: Token) -> Result<&'source str, Error> {
        let (token, text) = self.peek()?;
        if token != expected {
            Err(Error {
                msg: format!("Expect {:?}, found {:?}({:?})", expected, &token, text),
                src: Source {
                    file: self.file.clone(),
                    start: self.location,
                    end: self.location.advance(text.chars().count()),
                },
                r#type: ErrorType::Syntax,
                level: ErrorLevel::Error,
            })
        } else {
            self.consume();
            Ok(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn tokens(src: &str) -> Vec<(Token, String)> {
        let mut lexer = Lexer::new(src, Arc::new("test.kpr".to_string()));
        let mut out = Vec::new();
        while let Ok((token, text)) = lexer.peek() {
            out.push((token, text.to_string()));
            lexer.consume();
        }
        out
    }

    #[test]
    fn keywords_and_literals() {
        let out = tokens("unit USD 100\ntx 2020-01-01 \"pay\"\n");
        let kinds: Vec<Token> = out.iter().map(|(t, _)| *t).collect();
        assert_eq!(
            kinds,
            [
                Token::Unit,
                Token::UnitSymbol,
                Token::Decimal,
                Token::NewLine,
                Token::Tx,
                Token::Date,
                Token::String,
                Token::NewLine,
            ]
        );
    }

    #[test]
    fn account_versus_unit_symbol() {
        let out = tokens("Assets:Cash Assets USD\n");
        assert_eq!(out[0].0, Token::Account);
        assert_eq!(out[1].0, Token::Account);
        assert_eq!(out[2].0, Token::UnitSymbol);
    }

    #[test]
    fn decimal_with_grouping_and_sign() {
        let out = tokens("1,234.56 -7.5 100\n");
        assert_eq!(out[0], (Token::Decimal, "1,234.56".to_string()));
        assert_eq!(out[1], (Token::Decimal, "-7.5".to_string()));
        assert_eq!(out[2], (Token::Decimal, "100".to_string()));
    }

    #[test]
    fn illegal_runs_are_recorded_and_skipped() {
        let mut lexer = Lexer::new("@@@ USD\n", Arc::new("test.kpr".to_string()));
        let (token, text) = lexer.peek().unwrap();
        assert_eq!(token, Token::UnitSymbol);
        assert_eq!(text, "USD");
        lexer.consume();
        let errors = lexer.take_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].r#type, ErrorType::Lexical);
    }

    #[test]
    fn unterminated_string_recovers_on_next_line() {
        let mut lexer = Lexer::new("\"open\nUSD\n", Arc::new("test.kpr".to_string()));
        let (token, _) = lexer.peek().unwrap();
        assert_eq!(token, Token::NewLine);
        lexer.consume();
        let (token, _) = lexer.peek().unwrap();
        assert_eq!(token, Token::UnitSymbol);
        assert!(!lexer.take_errors().is_empty());
    }

    #[test]
    fn comments_skipped_unless_requested() {
        let plain = tokens("USD # trailing\n");
        assert_eq!(plain[0].0, Token::UnitSymbol);
        assert_eq!(plain[1].0, Token::NewLine);

        let mut lexer = Lexer::with_comments("# note\n", Arc::new("test.kpr".to_string()));
        let (token, text) = lexer.peek().unwrap();
        assert_eq!(token, Token::Comment);
        assert_eq!(text, "# note");
    }

    #[test]
    fn escaped_quotes_stay_in_string() {
        let out = tokens("\"a \\\" b\"\n");
        assert_eq!(out[0], (Token::String, "\"a \\\" b\"".to_string()));
    }
}
