use kpr::utils::{walk_accounts, AccountExt};
use kpr::{Date, Entry, Journal};
use std::sync::Arc;

fn compile(src: &str) -> (Journal, Vec<kpr::Error>) {
    Journal::compile(&[("test.kpr".to_string(), src.to_string())], None)
}

#[test]
fn initial_balance_compiles() {
    let (journal, errors) = compile(
        "unit USD 100\n\
         tx 2020-01-01 \"Initial balance\"\n\
         Assets:Cash 100 USD\n\
         Equity:Capital\n\
         end\n",
    );
    assert!(errors.is_empty(), "{:?}", errors);
    let accounts: Vec<String> = journal
        .accounts()
        .iter()
        .map(|a| a.to_string())
        .collect();
    assert_eq!(accounts, ["Assets:Cash", "Equity:Capital"]);
    let cash = Arc::new("Assets:Cash".to_string());
    let capital = Arc::new("Equity:Capital".to_string());
    assert_eq!(journal.balances()[&cash].to_string(), "100.00 USD");
    assert_eq!(journal.balances()[&capital].to_string(), "-100.00 USD");
}

#[test]
fn assertion_mismatch_is_data_then_error() {
    let (journal, errors) = compile(
        "unit USD 100\n\
         tx 2001-02-02 \"spend\"\n\
         Assets:Cash -1.23 USD\n\
         Expenses:Misc\n\
         end\n\
         balance 2001-02-03 Assets:Cash -2.32 USD\n",
    );
    assert!(errors.is_empty(), "{:?}", errors);
    let assert = journal
        .entries()
        .iter()
        .find_map(|entry| match entry {
            Entry::Assert(assert) => Some(assert),
            _ => None,
        })
        .unwrap();
    assert_eq!(assert.diff.to_string(), "1.09 USD");
    let balance_errors = journal.balance_errors();
    assert_eq!(balance_errors.len(), 1);
    assert_eq!(balance_errors[0].src.start.line, 6);
}

#[test]
fn tree_walk_synthesizes_virtual_parents() {
    let accounts = vec![
        Arc::new("IJN:Ayanami".to_string()),
        Arc::new("USS:Laffey".to_string()),
    ];
    let nodes = walk_accounts(&accounts);
    let seen: Vec<(String, bool)> = nodes
        .iter()
        .map(|n| (n.account.to_string(), n.is_virtual))
        .collect();
    assert_eq!(
        seen,
        [
            ("IJN".to_string(), true),
            ("IJN:Ayanami".to_string(), false),
            ("USS".to_string(), true),
            ("USS:Laffey".to_string(), false),
        ]
    );
}

#[test]
fn double_missing_amount_leaves_no_partial_entry() {
    let (journal, errors) = compile(
        "unit USD 100\n\
         tx 2020-01-01 \"bad\"\n\
         Assets:Cash\n\
         Equity:Capital\n\
         end\n",
    );
    assert_eq!(errors.len(), 1);
    assert!(errors[0].msg.contains("More than one split missing amount"));
    assert!(journal.entries().is_empty());
    assert!(journal.accounts().is_empty());
}

#[test]
fn same_day_transaction_sorts_before_assertion() {
    let (journal, errors) = compile(
        "unit USD 100\n\
         balance 2020-05-05 Assets:Cash 1 USD\n\
         tx 2020-05-05 \"fund\"\n\
         Assets:Cash 1 USD\n\
         Equity:Capital\n\
         end\n",
    );
    assert!(errors.is_empty(), "{:?}", errors);
    assert!(matches!(journal.entries()[0], Entry::Txn(_)));
    assert!(matches!(journal.entries()[1], Entry::Assert(_)));
    assert!(journal.balance_errors().is_empty());
}

#[test]
fn ending_option_truncates_later_entries() {
    let src = "unit USD 100\n\
               tx 2020-01-01 \"early\"\n\
               Assets:Cash 1 USD\n\
               Equity:Capital\n\
               end\n\
               tx 2020-03-01 \"late\"\n\
               Assets:Cash 5 USD\n\
               Equity:Capital\n\
               end\n";
    let ending = Date::from_ymd_opt(2020, 2, 1).unwrap();
    let (journal, errors) = Journal::compile(
        &[("test.kpr".to_string(), src.to_string())],
        Some(ending),
    );
    assert!(errors.is_empty(), "{:?}", errors);
    assert_eq!(journal.entries().len(), 1);
    let cash = Arc::new("Assets:Cash".to_string());
    assert_eq!(journal.balances()[&cash].to_string(), "1.00 USD");
}

#[test]
fn multiple_inputs_concatenate_with_stable_positions() {
    let (journal, errors) = Journal::compile(
        &[
            ("units.kpr".to_string(), "unit USD 100\n".to_string()),
            (
                "main.kpr".to_string(),
                "tx 2020-01-01 \"x\"\n\
                 Assets:Cash 1 UNDECLARED\n\
                 Equity:Capital -1 USD\n\
                 end\n"
                    .to_string(),
            ),
        ],
        None,
    );
    assert!(journal.entries().is_empty());
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].src.file.as_str(), "main.kpr");
    assert_eq!(errors[0].src.start.line, 2);
}

#[test]
fn recovery_keeps_later_entries() {
    let (journal, errors) = compile(
        "unit USD 100\n\
         tx 2020-01-01\n\
         tx 2020-01-02 \"good\"\n\
         Assets:Cash 2 USD\n\
         Equity:Capital\n\
         end\n",
    );
    assert!(!errors.is_empty());
    assert_eq!(journal.entries().len(), 1);
    let cash = Arc::new("Assets:Cash".to_string());
    assert_eq!(journal.balances()[&cash].to_string(), "2.00 USD");
}

#[test]
fn account_under_relation() {
    assert!("Assets:Cash:Wallet".under("Assets:Cash"));
    assert!(!"Assets:CashBox".under("Assets:Cash"));
    assert!("Assets".under(""));
}
