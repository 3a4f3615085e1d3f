use super::parser::{
    AccountDraft, AmountDraft, BalanceDraft, Directive, LineDraft, TxnDraft, UnitDraft,
};
use crate::balance::{Amount, Balance, Unit, UnitRef};
use crate::{
    Account, BalanceAssert, DisableAccount, Entry, Error, ErrorLevel, ErrorType, Meta, Split,
    Transaction,
};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Returns the value of a decimal that is a non-negative integer power of
/// 10, else `None`.
fn pow10_value(number: &Decimal) -> Option<i128> {
    let normalized = number.normalize();
    if normalized.scale() != 0 {
        return None;
    }
    let value = normalized.mantissa();
    if value < 1 {
        return None;
    }
    let mut rest = value;
    while rest % 10 == 0 {
        rest /= 10;
    }
    if rest == 1 {
        Some(value)
    } else {
        None
    }
}

/// The semantic pass: resolves units, infers omitted split amounts, and
/// turns parsed directives into typed [`Entry`] values. One instance per
/// compilation; the unit table and account metadata are instance state.
///
/// Errors accumulate instead of aborting, so callers get every entry that
/// could be built.
pub struct Builder {
    units: HashMap<String, UnitRef>,
    account_meta: HashMap<Account, Meta>,
    errors: Vec<Error>,
}

impl Builder {
    pub fn new() -> Self {
        Builder {
            units: HashMap::new(),
            account_meta: HashMap::new(),
            errors: Vec::new(),
        }
    }

    /// Consumes the directives of one compilation, in file order.
    pub fn build(
        mut self,
        directives: Vec<Directive>,
    ) -> (Vec<Entry>, HashMap<Account, Meta>, Vec<Error>) {
        let mut entries = Vec::new();
        for directive in directives {
            match directive {
                Directive::Unit(decl) => self.declare_unit(decl),
                Directive::Txn(draft) => {
                    if let Some(txn) = self.build_txn(draft) {
                        entries.push(Entry::Txn(txn));
                    }
                }
                Directive::Balance(draft) => {
                    if let Some(assert) = self.build_assert(draft) {
                        entries.push(Entry::Assert(assert));
                    }
                }
                Directive::Disable(draft) => {
                    entries.push(Entry::Disable(DisableAccount {
                        date: draft.date,
                        account: draft.account,
                        src: draft.src,
                    }));
                }
                Directive::Account(draft) => self.declare_account(draft),
                // already reported by the parser
                Directive::Bad(_) => {}
            }
        }
        (entries, self.account_meta, self.errors)
    }

    fn declare_unit(&mut self, decl: UnitDraft) {
        if !decl.symbol.chars().all(|c| c.is_ascii_uppercase()) {
            self.errors.push(Error {
                msg: format!("Unit symbol {} must be uppercase letters.", decl.symbol),
                src: decl.src,
                r#type: ErrorType::Unit,
                level: ErrorLevel::Error,
            });
            return;
        }
        let scale = match pow10_value(&decl.scale) {
            Some(scale) => scale,
            None => {
                self.errors.push(Error {
                    msg: format!(
                        "Unit scale {} must be a positive power of 10.",
                        decl.scale
                    ),
                    src: decl.src,
                    r#type: ErrorType::Unit,
                    level: ErrorLevel::Error,
                });
                return;
            }
        };
        match self.units.get(&decl.symbol) {
            Some(existing) if existing.scale == scale => {}
            Some(existing) => {
                self.errors.push(Error {
                    msg: format!(
                        "Unit {} is already declared with scale {}.",
                        decl.symbol, existing.scale
                    ),
                    src: decl.src,
                    r#type: ErrorType::Unit,
                    level: ErrorLevel::Error,
                });
            }
            None => {
                self.units
                    .insert(decl.symbol.clone(), Unit::new(&decl.symbol, scale));
            }
        }
    }

    fn resolve_amount(&self, draft: &AmountDraft) -> Result<Amount, Error> {
        let unit = self.units.get(&draft.symbol).ok_or_else(|| Error {
            msg: format!("Unit {} is not declared.", draft.symbol),
            src: draft.src.clone(),
            r#type: ErrorType::Unit,
            level: ErrorLevel::Error,
        })?;
        Amount::with_unit(draft.number, unit).map_err(|msg| Error {
            msg,
            src: draft.src.clone(),
            r#type: ErrorType::Unit,
            level: ErrorLevel::Error,
        })
    }

    fn build_txn(&mut self, draft: TxnDraft) -> Option<Transaction> {
        let TxnDraft {
            date,
            narration,
            lines,
            src,
        } = draft;
        let mut splits = Vec::new();
        let mut total = Balance::new();
        let mut pending: Option<(usize, Account, crate::Source)> = None;
        let mut failed = false;
        for line in lines {
            match line {
                LineDraft::Split(split) => match split.amount {
                    Some(ref amount_draft) => match self.resolve_amount(amount_draft) {
                        Ok(amount) => {
                            total.add(&amount);
                            splits.push(Split {
                                account: split.account,
                                amount,
                                src: split.src,
                            });
                        }
                        Err(err) => {
                            self.errors.push(err);
                            failed = true;
                        }
                    },
                    None => {
                        if pending.is_some() {
                            self.errors.push(Error {
                                msg: "More than one split missing amount.".to_string(),
                                src: split.src,
                                r#type: ErrorType::Incomplete,
                                level: ErrorLevel::Error,
                            });
                            failed = true;
                        } else {
                            pending = Some((splits.len(), split.account, split.src));
                        }
                    }
                },
                // already reported by the parser; drop the entry rather
                // than checking a balance known to be partial
                LineDraft::Bad(_) => failed = true,
                _ => unreachable!("non-split line in transaction"),
            }
        }
        if failed {
            return None;
        }
        if let Some((index, account, split_src)) = pending {
            let remainder = total.clean_copy().amounts();
            if remainder.len() != 1 {
                self.errors.push(Error {
                    msg: format!(
                        "Cannot infer amount for {}: transaction balance has {} units.",
                        account,
                        remainder.len()
                    ),
                    src: split_src,
                    r#type: ErrorType::Incomplete,
                    level: ErrorLevel::Error,
                });
                return None;
            }
            let amount = -remainder[0].clone();
            total.add(&amount);
            splits.insert(
                index,
                Split {
                    account,
                    amount,
                    src: split_src,
                },
            );
        }
        if !total.is_empty() {
            self.errors.push(Error {
                msg: format!(
                    "Transaction does not balance, off by {}.",
                    total.clean_copy()
                ),
                src,
                r#type: ErrorType::NotBalanced,
                level: ErrorLevel::Error,
            });
            return None;
        }
        Some(Transaction {
            date,
            narration,
            splits,
            balances: HashMap::new(),
            src,
        })
    }

    fn build_assert(&mut self, draft: BalanceDraft) -> Option<BalanceAssert> {
        let BalanceDraft {
            date,
            account,
            tree,
            lines,
            src,
        } = draft;
        let mut declared = Balance::new();
        let mut failed = false;
        for line in lines {
            match line {
                LineDraft::Amount(amount_draft) => match self.resolve_amount(&amount_draft) {
                    Ok(amount) => declared.add(&amount),
                    Err(err) => {
                        self.errors.push(err);
                        failed = true;
                    }
                },
                LineDraft::Bad(_) => failed = true,
                _ => unreachable!("non-amount line in balance assertion"),
            }
        }
        if failed {
            return None;
        }
        Some(BalanceAssert {
            date,
            account,
            tree,
            declared,
            actual: Balance::new(),
            diff: Balance::new(),
            src,
        })
    }

    /// A later declaration for the same account unions and overrides keys
    /// rather than replacing the whole map.
    fn declare_account(&mut self, draft: AccountDraft) {
        let meta = self.account_meta.entry(draft.account).or_default();
        for line in draft.lines {
            match line {
                LineDraft::Meta(key, val, src) => {
                    meta.insert(key, (val, src));
                }
                LineDraft::Bad(_) => {}
                _ => unreachable!("non-meta line in account declaration"),
            }
        }
    }
}

impl Default for Builder {
    fn default() -> Self {
        Builder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::Parser;
    use std::sync::Arc;

    fn build(src: &str) -> (Vec<Entry>, HashMap<Account, Meta>, Vec<Error>) {
        let (directives, parse_errors) = Parser::parse(src, Arc::new("test.kpr".to_string()));
        assert!(parse_errors.is_empty(), "{:?}", parse_errors);
        Builder::new().build(directives)
    }

    #[test]
    fn redeclaring_unit_with_same_scale_is_silent() {
        let (_, _, errors) = build("unit USD 100\nunit USD 100\n");
        assert!(errors.is_empty(), "{:?}", errors);
    }

    #[test]
    fn redeclaring_unit_with_other_scale_fails() {
        let (_, _, errors) = build("unit USD 100\nunit USD 10\n");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].r#type, ErrorType::Unit);
    }

    #[test]
    fn unit_scale_must_be_power_of_ten() {
        for src in ["unit USD 30\n", "unit USD 0\n", "unit USD 2.5\n"].iter() {
            let (_, _, errors) = build(src);
            assert_eq!(errors.len(), 1, "{}", src);
        }
        let (_, _, errors) = build("unit USD 1\nunit JPY 1000\n");
        assert!(errors.is_empty(), "{:?}", errors);
    }

    #[test]
    fn undeclared_unit_is_an_error() {
        let (entries, _, errors) = build(
            "tx 2020-01-01 \"pay\"\n\
             Assets:Cash 1 USD\n\
             Equity:Capital -1 USD\n\
             end\n",
        );
        assert!(entries.is_empty());
        assert_eq!(errors.len(), 2);
        assert!(errors[0].msg.contains("not declared"));
    }

    #[test]
    fn infers_single_missing_amount() {
        let (entries, _, errors) = build(
            "unit USD 100\n\
             tx 2020-01-01 \"pay\"\n\
             Assets:Cash 1.25 USD\n\
             Equity:Capital\n\
             end\n",
        );
        assert!(errors.is_empty(), "{:?}", errors);
        match &entries[0] {
            Entry::Txn(txn) => {
                assert_eq!(txn.splits()[1].amount.number, -125);
                assert_eq!(txn.splits()[1].account.as_str(), "Equity:Capital");
            }
            other => panic!("unexpected entry {:?}", other),
        }
    }

    #[test]
    fn two_missing_amounts_rejected() {
        let (entries, _, errors) = build(
            "unit USD 100\n\
             tx 2020-01-01 \"pay\"\n\
             Assets:Cash\n\
             Equity:Capital\n\
             end\n",
        );
        assert!(entries.is_empty());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].msg.contains("More than one split missing amount"));
    }

    #[test]
    fn inference_needs_exactly_one_unit() {
        let (entries, _, errors) = build(
            "unit USD 100\n\
             unit JPY 1\n\
             tx 2020-01-01 \"mixed\"\n\
             Assets:Cash 1 USD\n\
             Assets:Cash 5 JPY\n\
             Equity:Capital\n\
             end\n",
        );
        assert!(entries.is_empty());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].msg.contains("has 2 units"));
    }

    #[test]
    fn unbalanced_transaction_rejected() {
        let (entries, _, errors) = build(
            "unit USD 100\n\
             tx 2020-01-01 \"skew\"\n\
             Assets:Cash 1 USD\n\
             Equity:Capital -0.75 USD\n\
             end\n",
        );
        assert!(entries.is_empty());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].r#type, ErrorType::NotBalanced);
        assert!(errors[0].msg.contains("off by 0.25 USD"));
    }

    #[test]
    fn fraction_finer_than_unit_scale_rejected() {
        let (entries, _, errors) = build(
            "unit USD 100\n\
             tx 2020-01-01 \"sliver\"\n\
             Assets:Cash 0.005 USD\n\
             Equity:Capital\n\
             end\n",
        );
        assert!(entries.is_empty());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].msg.contains("too small"));
    }

    #[test]
    fn account_metadata_overrides_by_key() {
        let (_, meta, errors) = build(
            "account Assets:Cash\n\
             meta \"kind\" \"cash\"\n\
             meta \"note\" \"first\"\n\
             end\n\
             account Assets:Cash\n\
             meta \"note\" \"second\"\n\
             end\n",
        );
        assert!(errors.is_empty(), "{:?}", errors);
        let cash = Arc::new("Assets:Cash".to_string());
        assert_eq!(meta[&cash]["kind"].0, "cash");
        assert_eq!(meta[&cash]["note"].0, "second");
    }

    #[test]
    fn multi_line_assertion_accumulates_units() {
        let (entries, _, errors) = build(
            "unit USD 100\n\
             unit JPY 1\n\
             balance 2020-01-01 Assets:Cash\n\
             1.50 USD\n\
             300 JPY\n\
             end\n",
        );
        assert!(errors.is_empty(), "{:?}", errors);
        match &entries[0] {
            Entry::Assert(assert) => {
                assert_eq!(assert.declared.to_string(), "300 JPY, 1.50 USD");
                assert!(!assert.tree);
            }
            other => panic!("unexpected entry {:?}", other),
        }
    }
}
