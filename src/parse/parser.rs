use super::lexer::Lexer;
use super::token::Token;
use crate::utils::parse_number;
use crate::{Account, Date, Decimal, Error, ErrorLevel, ErrorType, Location, Source, SrcFile};
use std::collections::HashMap;
use std::sync::Arc;

/// A `unit SYMBOL SCALE` declaration; the scale is validated by the builder.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitDraft {
    pub symbol: String,
    pub scale: Decimal,
    pub src: Source,
}

/// An unresolved `DECIMAL UNIT_SYMBOL` pair; unit lookup happens in the
/// builder.
#[derive(Debug, Clone, PartialEq)]
pub struct AmountDraft {
    pub number: Decimal,
    pub symbol: String,
    pub src: Source,
}

/// A split line inside a transaction; the amount is optional exactly as
/// written, inference is deferred to the builder.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitDraft {
    pub account: Account,
    pub amount: Option<AmountDraft>,
    pub src: Source,
}

/// One line inside a multi-line entry. A malformed line degrades to
/// `Bad` with its span; the enclosing entry survives.
#[derive(Debug, Clone, PartialEq)]
pub enum LineDraft {
    Split(SplitDraft),
    Amount(AmountDraft),
    Meta(String, String, Source),
    Bad(Source),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TxnDraft {
    pub date: Date,
    pub narration: String,
    pub lines: Vec<LineDraft>,
    pub src: Source,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BalanceDraft {
    pub date: Date,
    pub account: Account,
    pub tree: bool,
    pub lines: Vec<LineDraft>,
    pub src: Source,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisableDraft {
    pub date: Date,
    pub account: Account,
    pub src: Source,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccountDraft {
    pub account: Account,
    pub lines: Vec<LineDraft>,
    pub src: Source,
}

/// One parsed top-level entry. `Bad` spans a region that failed to parse;
/// the error is recorded and parsing resumed at the next entry keyword, so
/// one malformed entry never discards the rest of the file.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Unit(UnitDraft),
    Txn(TxnDraft),
    Balance(BalanceDraft),
    Disable(DisableDraft),
    Account(AccountDraft),
    Bad(Source),
}

fn is_entry_keyword(token: Token) -> bool {
    matches!(
        token,
        Token::Unit
            | Token::Tx
            | Token::Balance
            | Token::TreeBal
            | Token::Disable
            | Token::AccountDef
    )
}

pub struct Parser<'source> {
    lexer: Lexer<'source>,
    file: SrcFile,
    accounts: HashMap<&'source str, Account>,
}

impl<'source> Parser<'source> {
    /// Parses one source text into directives. Syntax errors are recovered
    /// locally and accumulated; the directive list always covers the whole
    /// input.
    pub fn parse(src: &'source str, file: SrcFile) -> (Vec<Directive>, Vec<Error>) {
        let mut parser = Parser {
            lexer: Lexer::new(src, file.clone()),
            file,
            accounts: HashMap::new(),
        };
        let mut directives = Vec::new();
        let mut errors = Vec::new();
        parser.parse_directives(&mut directives, &mut errors);
        errors.extend(parser.lexer.take_errors());
        (directives, errors)
    }

    fn src_from(&self, start: Location) -> Source {
        Source {
            start,
            end: self.lexer.last_token_end(),
            file: self.file.clone(),
        }
    }

    fn unexpected(&self, token: Token, text: &str) -> Error {
        Error {
            msg: format!("Unexpected token {:?}({}).", token, text),
            src: Source {
                file: self.file.clone(),
                start: self.lexer.location(),
                end: self.lexer.location().advance(text.chars().count()),
            },
            r#type: ErrorType::Syntax,
            level: ErrorLevel::Error,
        }
    }

    fn parse_directives(&mut self, directives: &mut Vec<Directive>, errors: &mut Vec<Error>) {
        while let Ok((token, text)) = self.lexer.peek() {
            if token == Token::NewLine || token == Token::Comment {
                self.lexer.consume();
                continue;
            }
            let start = self.lexer.location();
            let result = match token {
                Token::Unit => self.parse_unit(),
                Token::Tx => self.parse_txn(errors),
                Token::Balance => self.parse_balance(false, errors),
                Token::TreeBal => self.parse_balance(true, errors),
                Token::Disable => self.parse_disable(),
                Token::AccountDef => self.parse_account_decl(errors),
                _ => Err(self.unexpected(token, text)),
            };
            match result {
                Ok(directive) => directives.push(directive),
                Err(err) => {
                    errors.push(err);
                    self.resync();
                    directives.push(Directive::Bad(self.src_from(start)));
                }
            }
        }
    }

    /// Scans forward to the next recognizable entry-starting keyword.
    fn resync(&mut self) {
        while let Ok((token, _)) = self.lexer.peek() {
            if is_entry_keyword(token) {
                break;
            }
            self.lexer.consume();
        }
    }

    /// Consumes the rest of the current line, including its newline.
    fn skip_line(&mut self) {
        while let Ok((token, _)) = self.lexer.peek() {
            self.lexer.consume();
            if token == Token::NewLine {
                break;
            }
        }
    }

    /// Accepts a newline; end of file also closes the line.
    fn end_of_line(&mut self) -> Result<(), Error> {
        match self.lexer.peek() {
            Ok((Token::NewLine, _)) | Ok((Token::Comment, _)) => {
                self.lexer.consume();
                Ok(())
            }
            Ok((token, text)) => Err(self.unexpected(token, text)),
            Err(_) => Ok(()),
        }
    }

    fn parse_unit(&mut self) -> Result<Directive, Error> {
        let start = self.lexer.location();
        self.lexer.take(Token::Unit)?;
        let symbol = self.lexer.take(Token::UnitSymbol)?;
        let scale = self.parse_decimal()?;
        self.end_of_line()?;
        Ok(Directive::Unit(UnitDraft {
            symbol: symbol.to_string(),
            scale,
            src: self.src_from(start),
        }))
    }

    fn parse_txn(&mut self, errors: &mut Vec<Error>) -> Result<Directive, Error> {
        let start = self.lexer.location();
        self.lexer.take(Token::Tx)?;
        let date = self.parse_date()?;
        let narration = self.parse_string()?;
        self.end_of_line()?;
        let lines = self.parse_lines(errors, Self::parse_split_line)?;
        Ok(Directive::Txn(TxnDraft {
            date,
            narration,
            lines,
            src: self.src_from(start),
        }))
    }

    fn parse_balance(&mut self, tree: bool, errors: &mut Vec<Error>) -> Result<Directive, Error> {
        let start = self.lexer.location();
        if tree {
            self.lexer.take(Token::TreeBal)?;
        } else {
            self.lexer.take(Token::Balance)?;
        }
        let date = self.parse_date()?;
        let account = self.parse_account()?;
        let lines = match self.lexer.peek() {
            Ok((Token::Decimal, _)) => {
                let amount = self.parse_amount()?;
                self.end_of_line()?;
                vec![LineDraft::Amount(amount)]
            }
            Ok((Token::NewLine, _)) => {
                self.lexer.consume();
                self.parse_lines(errors, Self::parse_amount_line)?
            }
            Ok((token, text)) => return Err(self.unexpected(token, text)),
            Err(err) => return Err(err),
        };
        Ok(Directive::Balance(BalanceDraft {
            date,
            account,
            tree,
            lines,
            src: self.src_from(start),
        }))
    }

    fn parse_disable(&mut self) -> Result<Directive, Error> {
        let start = self.lexer.location();
        self.lexer.take(Token::Disable)?;
        let date = self.parse_date()?;
        let account = self.parse_account()?;
        self.end_of_line()?;
        Ok(Directive::Disable(DisableDraft {
            date,
            account,
            src: self.src_from(start),
        }))
    }

    fn parse_account_decl(&mut self, errors: &mut Vec<Error>) -> Result<Directive, Error> {
        let start = self.lexer.location();
        self.lexer.take(Token::AccountDef)?;
        let account = self.parse_account()?;
        self.end_of_line()?;
        let lines = self.parse_lines(errors, Self::parse_meta_line)?;
        Ok(Directive::Account(AccountDraft {
            account,
            lines,
            src: self.src_from(start),
        }))
    }

    /// Runs `line` until the closing `end`. A failed line records its error,
    /// degrades to [`LineDraft::Bad`], and parsing resumes on the next line.
    /// An entry keyword before `end` means the terminator is missing; that
    /// aborts the enclosing entry instead of swallowing the next one.
    fn parse_lines(
        &mut self,
        errors: &mut Vec<Error>,
        line: fn(&mut Self) -> Result<LineDraft, Error>,
    ) -> Result<Vec<LineDraft>, Error> {
        let mut lines = Vec::new();
        loop {
            match self.lexer.peek() {
                Ok((Token::NewLine, _)) | Ok((Token::Comment, _)) => self.lexer.consume(),
                Ok((Token::End, _)) => {
                    self.lexer.consume();
                    self.end_of_line()?;
                    return Ok(lines);
                }
                Ok((token, text)) if is_entry_keyword(token) => {
                    return Err(self.unexpected(token, text));
                }
                Ok(_) => {
                    let start = self.lexer.location();
                    match line(self) {
                        Ok(node) => lines.push(node),
                        Err(err) => {
                            errors.push(err);
                            self.skip_line();
                            lines.push(LineDraft::Bad(self.src_from(start)));
                        }
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn parse_split_line(&mut self) -> Result<LineDraft, Error> {
        let start = self.lexer.location();
        let account = self.parse_account()?;
        let amount = match self.lexer.peek() {
            Ok((Token::Decimal, _)) => Some(self.parse_amount()?),
            _ => None,
        };
        self.end_of_line()?;
        Ok(LineDraft::Split(SplitDraft {
            account,
            amount,
            src: self.src_from(start),
        }))
    }

    fn parse_amount_line(&mut self) -> Result<LineDraft, Error> {
        let amount = self.parse_amount()?;
        self.end_of_line()?;
        Ok(LineDraft::Amount(amount))
    }

    fn parse_meta_line(&mut self) -> Result<LineDraft, Error> {
        let start = self.lexer.location();
        self.lexer.take(Token::Meta)?;
        let key = self.parse_string()?;
        let val = self.parse_string()?;
        self.end_of_line()?;
        Ok(LineDraft::Meta(key, val, self.src_from(start)))
    }

    fn parse_amount(&mut self) -> Result<AmountDraft, Error> {
        let start = self.lexer.location();
        let number = self.parse_decimal()?;
        let symbol = self.lexer.take(Token::UnitSymbol)?;
        Ok(AmountDraft {
            number,
            symbol: symbol.to_string(),
            src: self.src_from(start),
        })
    }

    fn parse_decimal(&mut self) -> Result<Decimal, Error> {
        let start = self.lexer.location();
        let num_str = self.lexer.take(Token::Decimal)?;
        parse_number(num_str).map_err(|msg| Error {
            msg,
            src: self.src_from(start),
            r#type: ErrorType::Syntax,
            level: ErrorLevel::Error,
        })
    }

    fn parse_date(&mut self) -> Result<Date, Error> {
        let start = self.lexer.location();
        let date_str = self.lexer.take(Token::Date)?;
        date_str.parse::<Date>().map_err(|_| {
            let src = self.src_from(start);
            Error {
                msg: format!("Invalid date: {}.", date_str),
                src,
                r#type: ErrorType::Syntax,
                level: ErrorLevel::Error,
            }
        })
    }

    fn parse_account(&mut self) -> Result<Account, Error> {
        let account_str = self.lexer.take(Token::Account)?;
        let account = self
            .accounts
            .entry(account_str)
            .or_insert_with(|| Arc::new(account_str.to_string()))
            .clone();
        Ok(account)
    }

    #[inline]
    fn remove_quotes(input: &str) -> &str {
        let mut chars = input.chars();
        chars.next();
        chars.next_back();
        chars.as_str()
    }

    fn parse_string(&mut self) -> Result<String, Error> {
        let quoted_str = self.lexer.take(Token::String)?;
        Ok(unescape(Self::remove_quotes(quoted_str)))
    }
}

/// `\x` becomes a literal `x`; no other escape forms are recognized.
fn unescape(input: &str) -> String {
    if !input.contains('\\') {
        return input.to_string();
    }
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}
