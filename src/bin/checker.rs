//! AbaCheck - CLI tool verifying the balance chain of an exported sheet.

use abaconvert::{check_balance_chain, csv_format::TransactionSheet, logging, Result};
use clap::Parser;
use std::fs::File;
use std::io;

#[derive(Parser)]
#[command(name = "abacheck")]
#[command(about = "Check that each balance equals the previous one plus credit minus debit", long_about = None)]
struct Cli {
    /// Exported transaction CSV (or stdin if not provided)
    #[arg(short, long)]
    input: Option<String>,

    /// More logging on stderr
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    match run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}

/// Returns whether the chain is unbroken.
fn run() -> Result<bool> {
    let cli = Cli::parse();
    logging::init(logging::level_from_flags(cli.verbose, false));

    let sheet = if let Some(ref input_path) = cli.input {
        let mut file = File::open(input_path)?;
        TransactionSheet::from_read(&mut file)?
    } else {
        let mut stdin = io::stdin();
        TransactionSheet::from_read(&mut stdin)?
    };

    let breaks = check_balance_chain(&sheet.transactions);
    let heuristic = sheet.transactions.iter().filter(|tx| tx.is_heuristic()).count();

    println!("Transactions: {}", sheet.transactions.len());
    if sheet.with_basis {
        println!("Guessed sides: {}", heuristic);
    }

    if breaks.is_empty() {
        println!("Balance chain: OK");
        return Ok(true);
    }

    println!("Balance chain: {} breaks", breaks.len());
    for brk in &breaks {
        println!("  {}", brk);
    }
    Ok(false)
}
