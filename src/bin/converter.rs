//! AbaConvert - CLI tool turning bank statements into a transaction sheet.

use abaconvert::{
    camt054_format::Camt054Notification,
    check_balance_chain,
    csv_format::TransactionSheet,
    logging, pdf_text,
    statement::ensure_found,
    Error, InputFormat, Result, StatementLayout,
};
use clap::Parser;
use std::fs::File;
use std::io::{self, Read, Write};

#[derive(Parser)]
#[command(name = "abaconvert")]
#[command(about = "Reconstruct transactions from bank statements (PDF, text, CAMT.054) as CSV", long_about = None)]
struct Cli {
    /// Input file path (or stdin if not provided)
    #[arg(short, long)]
    input: Option<String>,

    /// Input format (pdf, text, camt054)
    #[arg(long = "input-format", default_value = "pdf")]
    input_format: String,

    /// Statement layout (a = columnar, b = carried balance, c = dash-marked)
    #[arg(short, long)]
    layout: Option<String>,

    /// Extra boilerplate line pattern (regex), may be repeated
    #[arg(long = "noise", value_name = "REGEX")]
    noise: Vec<String>,

    /// Output file path (or stdout if not provided)
    #[arg(short, long)]
    output: Option<String>,

    /// Add a column telling how each debit/credit side was decided
    #[arg(long = "with-basis")]
    with_basis: bool,

    /// More logging on stderr (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only report errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(logging::level_from_flags(cli.verbose, cli.quiet));

    let input_format = cli.input_format.parse::<InputFormat>()?;

    let input = if let Some(ref input_path) = cli.input {
        let mut file = File::open(input_path)?;
        read_input(&mut file)?
    } else {
        let mut stdin = io::stdin();
        read_input(&mut stdin)?
    };

    if let Some(ref output_path) = cli.output {
        let mut file = File::create(output_path)?;
        convert(&cli, input_format, &input, &mut file)?;
    } else {
        let mut stdout = io::stdout();
        convert(&cli, input_format, &input, &mut stdout)?;
    }

    Ok(())
}

fn read_input<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    Ok(bytes)
}

fn convert<W: Write>(cli: &Cli, format: InputFormat, input: &[u8], writer: &mut W) -> Result<()> {
    if !format.is_statement() && cli.layout.is_some() {
        log::warn!("--layout is ignored for {:?} input", format);
    }

    let text = match format {
        InputFormat::Camt054 => {
            let notification = Camt054Notification::from_read(&mut &input[..])?;
            if notification.entries.is_empty() {
                return Err(Error::NoTransactions);
            }
            return notification.write_csv(writer);
        }
        InputFormat::Pdf => pdf_text::extract_text(input)?,
        InputFormat::Text => String::from_utf8_lossy(input).into_owned(),
    };

    let layout = cli
        .layout
        .as_deref()
        .ok_or_else(|| Error::MissingField("--layout (a, b or c)".to_string()))?
        .parse::<StatementLayout>()?;
    let noise = layout.default_noise().with_patterns(&cli.noise)?;

    let outcome = ensure_found(layout.parser_with_noise(noise).parse(&text))?;

    let breaks = check_balance_chain(&outcome.transactions);
    if !breaks.is_empty() {
        log::warn!("{} balance chain breaks, first at {}", breaks.len(), breaks[0]);
    }
    if !cli.quiet {
        eprintln!(
            "{}: {} transactions; {}",
            layout,
            outcome.transactions.len(),
            outcome.diagnostics
        );
    }

    TransactionSheet::new(outcome.transactions)
        .with_basis(cli.with_basis)
        .write_to(writer)
}
