use chrono::NaiveDate;
use clap::{clap_app, ArgMatches};
use kpr::{Date, Journal};
use std::process::exit;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const AUTHOR: &str = env!("CARGO_PKG_AUTHORS");

fn read_inputs(matches: &ArgMatches) -> Vec<(String, String)> {
    let mut inputs = Vec::new();
    for path in matches.values_of("INPUT").unwrap() {
        match std::fs::read_to_string(path) {
            Ok(text) => inputs.push((path.to_string(), text)),
            Err(err) => {
                eprintln!("{}: {}", path, err);
                exit(1);
            }
        }
    }
    inputs
}

fn parse_ending(matches: &ArgMatches) -> Option<Date> {
    matches.value_of("ending").map(|text| {
        match NaiveDate::parse_from_str(text, "%Y-%m-%d") {
            Ok(date) => date,
            Err(_) => {
                eprintln!("Invalid date {:?}, expected YYYY-MM-DD.", text);
                exit(1);
            }
        }
    })
}

fn compile(matches: &ArgMatches) -> Journal {
    let inputs = read_inputs(matches);
    let (journal, errors) = Journal::compile(&inputs, parse_ending(matches));
    let mut errors = errors;
    errors.extend(journal.balance_errors());
    for error in &errors {
        println!("{}\n", error);
    }
    if !errors.is_empty() {
        exit(1);
    }
    journal
}

fn balances(matches: &ArgMatches) {
    let journal = compile(matches);
    for account in journal.accounts() {
        if journal.account_info().get(&account).map_or(false, |info| {
            info.disabled().is_some()
        }) {
            continue;
        }
        if let Some(balance) = journal.balances().get(&account) {
            if !balance.is_empty() {
                println!("{} {}", account, balance.clean_copy());
            }
        }
    }
}

fn main() {
    let matches = clap_app!(kpr =>
        (version: VERSION)
        (author: AUTHOR)
        (@subcommand check =>
            (about: "Compile the journal and report errors")
            (@arg INPUT: +required +multiple "Input files")
            (@arg ending: --ending +takes_value "Ignore entries dated after this date")
        )
        (@subcommand balances =>
            (about: "Print the ending balance of every account")
            (@arg INPUT: +required +multiple "Input files")
            (@arg ending: --ending +takes_value "Ignore entries dated after this date")
        )
    )
    .get_matches();
    if let Some(matches) = matches.subcommand_matches("check") {
        compile(matches);
    } else if let Some(matches) = matches.subcommand_matches("balances") {
        balances(matches);
    }
}
