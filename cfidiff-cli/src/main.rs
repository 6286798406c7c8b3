use anyhow::{Context, Result};
use cfidiff_core::{compare_dumps, CompareOptions, InputSections, Report, SymbolTable};
use clap::Parser;
use colored::Colorize;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// Checks synthesized unwind tables against the compiler's.
///
/// The input holds a `readelf -s` symbol listing, the reference
/// `readelf -wF` dump and the synthesized one, separated by `===` lines.
#[derive(Parser)]
#[command(
    name = "cfidiff",
    about = "Compare two textual .eh_frame dumps function by function",
    version,
    author
)]
struct Cli {
    /// Test case label echoed in the summary (eg. some_test/01)
    test_name: String,

    /// Display every mismatching address and ambiguous match
    #[arg(short, long)]
    verbose: bool,

    /// Read the dumps from a file instead of stdin
    #[arg(short, long, value_name = "PATH")]
    input: Option<PathBuf>,

    /// Take symbols from this ELF binary; the input then starts with the
    /// reference dump
    #[arg(long, value_name = "ELF")]
    symbols_elf: Option<PathBuf>,

    /// Also drop the FDEs of this function (repeatable)
    #[arg(long = "ignore-function", value_name = "NAME")]
    ignore_functions: Vec<String>,

    /// List unmatched FDEs as a table
    #[arg(long)]
    dump_unmatched: bool,

    /// Print the report as JSON instead of the summary line
    #[arg(long)]
    json: bool,
}

#[derive(Tabled)]
struct UnmatchedRow {
    #[tabled(rename = "Side")]
    side: &'static str,
    #[tabled(rename = "Range")]
    range: String,
    #[tabled(rename = "Function")]
    function: String,
    #[tabled(rename = "Rows")]
    rows: usize,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    report: &'a Report,
    failed: bool,
    summary: Option<String>,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(report) if report.is_failure() => ExitCode::from(1),
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{}: aborted", cli.test_name);
            eprintln!("{}: {err:#}", cli.test_name);
            ExitCode::from(2)
        }
    }
}

fn run(cli: &Cli) -> Result<Report> {
    let reader: Box<dyn BufRead> = match &cli.input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("opening {}", path.display()))?,
        )),
        None => Box::new(io::stdin().lock()),
    };
    let input = InputSections::read(reader, cli.symbols_elf.is_none())?;

    let symbols = match (&cli.symbols_elf, &input.symbols) {
        (Some(path), _) => SymbolTable::from_elf(path)?,
        (None, Some(section)) => {
            SymbolTable::from_section(section).context("parsing the symbol table")?
        }
        (None, None) => SymbolTable::new(),
    };

    let options = cli
        .ignore_functions
        .iter()
        .fold(CompareOptions::default(), |options, name| {
            options.ignore_function(name.as_str())
        });

    let report = compare_dumps(&cli.test_name, &input, &symbols, &options)?;

    if cli.verbose {
        print_diagnostics(&report);
    }
    if cli.dump_unmatched {
        print_unmatched(&report);
    }

    if cli.json {
        let json = JsonReport {
            report: &report,
            failed: report.is_failure(),
            summary: report.summary(),
        };
        println!("{}", serde_json::to_string(&json)?);
    } else if let Some(summary) = report.summary() {
        println!("{summary}");
    }

    Ok(report)
}

fn print_diagnostics(report: &Report) {
    for ambiguous in &report.ambiguous {
        println!("{}", ambiguous.to_string().yellow());
    }
    for mismatch in &report.details {
        println!(
            "{} {:#x}: {} ; {}",
            "Mismatch".red(),
            mismatch.address,
            mismatch.reference,
            mismatch.candidate
        );
    }
}

fn print_unmatched(report: &Report) {
    let rows: Vec<UnmatchedRow> = report
        .unmatched_reference
        .iter()
        .map(|fde| ("orig", fde))
        .chain(report.unmatched_candidate.iter().map(|fde| ("synth", fde)))
        .map(|(side, fde)| UnmatchedRow {
            side,
            range: fde.range.to_string(),
            function: fde
                .symbol
                .clone()
                .unwrap_or_else(|| format!("FUNC_{:#x}", fde.range.begin)),
            rows: fde.rows,
        })
        .collect();

    if rows.is_empty() {
        println!("No unmatched FDEs.");
    } else {
        let mut table = Table::new(rows);
        table.with(Style::psql());
        println!("{table}");
    }
}
