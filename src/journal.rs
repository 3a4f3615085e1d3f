use crate::balance::{Amount, Balance};
use crate::parse::{Builder, Parser};
pub use chrono::NaiveDate as Date;
use chrono::NaiveTime;
use getset::{CopyGetters, Getters};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Representing a location, line number and column number, in a source file.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Location {
    pub line: usize,
    pub col: usize,
}

impl Location {
    pub fn advance(&self, width: usize) -> Self {
        Location {
            col: self.col + width,
            line: self.line,
        }
    }
}

impl From<(usize, usize)> for Location {
    fn from(tuple: (usize, usize)) -> Self {
        Location {
            line: tuple.0,
            col: tuple.1,
        }
    }
}

/// A string wrapped in [`Arc`](std::sync::Arc)
/// representing the source file path.
pub type SrcFile = Arc<String>;

/// Represents a range in a source file. This struct is used to track the
/// origins of any information in the compiled [`Journal`], as well as for
/// locating errors.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Source {
    pub file: SrcFile,
    pub start: Location,
    pub end: Location,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.start.line, self.start.col)
    }
}

/// Kinds of errors that `kpr` encountered while compiling input text into a
/// [`Journal`].
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    /// Illegal characters or an unterminated string in the source text.
    Lexical,
    /// Unexpected token in a grammar position.
    Syntax,
    /// An undeclared unit, a conflicting redeclaration, a bad scale, or a
    /// fraction finer than the unit scale.
    Unit,
    /// Indicates a transaction is not balanced.
    NotBalanced,
    /// A transaction missing too much information such that `kpr` cannot
    /// infer it from the context.
    Incomplete,
    /// A balance assertion whose declared amounts disagree with the running
    /// balance.
    Assertion,
}

/// The level of an error. Any entry resulting in an [`ErrorLevel::Error`] is
/// dropped from the compiled [`Journal`].
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorLevel {
    Info,
    Warning,
    Error,
}

/// Contains the full information of an error.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Error {
    pub msg: String,
    pub src: Source,
    pub r#type: ErrorType,
    pub level: ErrorLevel,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}: {}\n  {}:{}:{}",
            self.level, self.msg, self.src.file, self.src.start.line, self.src.start.col
        )
    }
}

/// A string wrapped in [`Arc`](std::sync::Arc)
/// representing the account name, a colon-separated path like `Assets:Cash`.
pub type Account = Arc<String>;

/// Represents the metadata attached to an account.
pub type Meta = HashMap<String, (String, Source)>;

/// One account/amount pair inside a [`Transaction`].
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub account: Account,
    pub amount: Amount,
    pub src: Source,
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = f.width().unwrap_or(46);
        let account_width = std::cmp::max(self.account.len() + 1, width);
        write!(
            f,
            "{:width$}{}",
            self.account,
            self.amount,
            width = account_width
        )
    }
}

/// A balanced transaction: splits sum to exactly zero per unit.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Getters, CopyGetters)]
pub struct Transaction {
    /// Returns the transaction date.
    #[getset(get_copy = "pub")]
    pub(crate) date: Date,

    /// Returns the description.
    #[getset(get = "pub")]
    pub(crate) narration: String,

    /// Returns the splits of this transaction.
    #[getset(get = "pub")]
    pub(crate) splits: Vec<Split>,

    /// Returns, for every distinct account touched by this transaction, a
    /// snapshot of the account balance immediately after the transaction.
    /// Filled during [`Journal::compile`].
    #[getset(get = "pub")]
    pub(crate) balances: HashMap<Account, Balance>,

    /// Returns the source of this transaction.
    #[getset(get = "pub")]
    pub(crate) src: Source,
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} tx \"{}\"", self.date, self.narration)?;
        for split in &self.splits {
            write!(f, "\n    {}", split)?;
        }
        write!(f, "\nend")
    }
}

/// A `balance` or `treebal` assertion. `actual` and `diff` are filled during
/// [`Journal::compile`]; a non-empty `diff` is carried as data and only
/// escalated to an error by [`Journal::balance_errors`].
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceAssert {
    pub date: Date,
    pub account: Account,
    /// Children of `account` are included in the assertion; the aggregation
    /// itself belongs to the report layer.
    pub tree: bool,
    pub declared: Balance,
    pub actual: Balance,
    pub diff: Balance,
    pub src: Source,
}

impl fmt::Display for BalanceAssert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keyword = if self.tree { "treebal" } else { "balance" };
        write!(f, "{} {} {} {}", self.date, keyword, self.account, self.declared)
    }
}

/// A `disable` directive closing an account from a date on.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisableAccount {
    pub date: Date,
    pub account: Account,
    pub src: Source,
}

impl fmt::Display for DisableAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} disable {}", self.date, self.account)
    }
}

/// A semantic entry of the ledger, matched exhaustively wherever entries are
/// processed.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Txn(Transaction),
    Assert(BalanceAssert),
    Disable(DisableAccount),
}

fn date_seconds(date: Date) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

impl Entry {
    pub fn date(&self) -> Date {
        match self {
            Entry::Txn(txn) => txn.date,
            Entry::Assert(assert) => assert.date,
            Entry::Disable(disable) => disable.date,
        }
    }

    pub fn src(&self) -> &Source {
        match self {
            Entry::Txn(txn) => &txn.src,
            Entry::Assert(assert) => &assert.src,
            Entry::Disable(disable) => &disable.src,
        }
    }

    /// Replay order: Unix seconds at UTC midnight plus a small type offset,
    /// so same-day postings are applied before same-day assertions, and
    /// disables come last. The offsets are far smaller than one day.
    fn seq(&self) -> i64 {
        match self {
            Entry::Txn(txn) => date_seconds(txn.date),
            Entry::Assert(assert) => date_seconds(assert.date) + 1,
            Entry::Disable(disable) => date_seconds(disable.date) + 2,
        }
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entry::Txn(txn) => txn.fmt(f),
            Entry::Assert(assert) => assert.fmt(f),
            Entry::Disable(disable) => disable.fmt(f),
        }
    }
}

/// Per-account bookkeeping outside the entry stream: the `disable` entry
/// index, if any, and the metadata merged from `account` declarations.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default, PartialEq, Getters, CopyGetters)]
pub struct AccountInfo {
    /// Returns the index into [`Journal::entries`] of the entry disabling
    /// this account, if any.
    #[getset(get_copy = "pub")]
    pub(crate) disabled: Option<usize>,

    /// Returns the account metadata.
    #[getset(get = "pub")]
    pub(crate) meta: Meta,
}

/// The fully compiled, read-only ledger: chronologically ordered entries,
/// per-account entry indices, and final running balances.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default, PartialEq, Getters)]
pub struct Journal {
    /// Returns all entries, sorted chronologically.
    #[getset(get = "pub")]
    pub(crate) entries: Vec<Entry>,

    /// Returns, per account, the indices into [`Journal::entries`] of the
    /// entries touching it.
    #[getset(get = "pub")]
    pub(crate) account_entries: HashMap<Account, Vec<usize>>,

    /// Returns the final balances.
    #[getset(get = "pub")]
    pub(crate) balances: HashMap<Account, Balance>,

    /// Returns per-account disable markers and metadata.
    #[getset(get = "pub")]
    pub(crate) account_info: HashMap<Account, AccountInfo>,
}

impl Journal {
    /// Compiles kpr source texts into a [`Journal`].
    ///
    /// `inputs` is a sequence of `(name, text)` pairs; reading files is the
    /// caller's concern. With `ending` set, entries dated after it are
    /// dropped before replay. Errors from every stage are accumulated and
    /// returned next to the best-effort journal; balance-assertion
    /// mismatches are not in this list, see [`Journal::balance_errors`].
    pub fn compile(inputs: &[(String, String)], ending: Option<Date>) -> (Journal, Vec<Error>) {
        let mut errors = Vec::new();
        let mut directives = Vec::new();
        for (name, text) in inputs {
            let (mut file_directives, file_errors) =
                Parser::parse(text, Arc::new(name.clone()));
            directives.append(&mut file_directives);
            errors.extend(file_errors);
        }
        let (entries, account_meta, build_errors) = Builder::new().build(directives);
        errors.extend(build_errors);
        (Journal::replay(entries, account_meta, ending), errors)
    }

    /// Sorts the entries into canonical order and replays them, producing
    /// running balances, assertion diffs, and the account indices.
    pub(crate) fn replay(
        mut entries: Vec<Entry>,
        account_meta: HashMap<Account, Meta>,
        ending: Option<Date>,
    ) -> Journal {
        entries.sort_by_key(Entry::seq);
        if let Some(ending) = ending {
            // requires the sort above
            let cut = entries.partition_point(|entry| entry.date() <= ending);
            entries.truncate(cut);
        }
        let mut balances: HashMap<Account, Balance> = HashMap::new();
        let mut account_entries: HashMap<Account, Vec<usize>> = HashMap::new();
        let mut account_info: HashMap<Account, AccountInfo> = HashMap::new();
        for (account, meta) in account_meta {
            account_info.entry(account).or_default().meta = meta;
        }
        for idx in 0..entries.len() {
            match &mut entries[idx] {
                Entry::Txn(txn) => {
                    for split in &txn.splits {
                        balances
                            .entry(split.account.clone())
                            .or_default()
                            .add(&split.amount);
                    }
                    for split in &txn.splits {
                        if !txn.balances.contains_key(&split.account) {
                            txn.balances
                                .insert(split.account.clone(), balances[&split.account].clone());
                            account_entries
                                .entry(split.account.clone())
                                .or_default()
                                .push(idx);
                        }
                    }
                }
                Entry::Assert(assert) => {
                    let actual = balances
                        .get(&assert.account)
                        .cloned()
                        .unwrap_or_default();
                    let mut diff = actual.clone();
                    diff.sub_balance(&assert.declared);
                    diff.clean();
                    assert.actual = actual;
                    assert.diff = diff;
                    account_entries
                        .entry(assert.account.clone())
                        .or_default()
                        .push(idx);
                }
                Entry::Disable(disable) => {
                    account_info
                        .entry(disable.account.clone())
                        .or_default()
                        .disabled = Some(idx);
                    account_entries
                        .entry(disable.account.clone())
                        .or_default()
                        .push(idx);
                }
            }
        }
        Journal {
            entries,
            account_entries,
            balances,
            account_info,
        }
    }

    /// All accounts with any activity, sorted.
    pub fn accounts(&self) -> Vec<Account> {
        let mut accounts: Vec<Account> = self.account_entries.keys().cloned().collect();
        accounts.sort();
        accounts
    }

    /// Scans all balance assertions and formats a positioned error for each
    /// non-empty diff. Read-only; callers may still inspect the per-account
    /// ledgers when assertions fail.
    pub fn balance_errors(&self) -> Vec<Error> {
        let mut errors = Vec::new();
        for entry in &self.entries {
            if let Entry::Assert(assert) = entry {
                if !assert.diff.is_empty() {
                    errors.push(Error {
                        msg: format!(
                            "Balance of {} is {}, declared {}, off by {}.",
                            assert.account, assert.actual, assert.declared, assert.diff
                        ),
                        src: assert.src.clone(),
                        r#type: ErrorType::Assertion,
                        level: ErrorLevel::Error,
                    });
                }
            }
        }
        errors
    }
}
