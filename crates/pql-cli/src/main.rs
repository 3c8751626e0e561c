//! pql: translate Pipeline Query Language into SQL.
//!
//! Reads statements terminated by `;` from files or stdin, streaming line by
//! line so interactive use works, and writes the translated SQL (or, with the
//! `eval` subcommand, CSV results) to stdout or a file. A statement that
//! fails to compile is reported on stderr and the remaining statements are
//! still processed; the exit status reflects whether anything failed.

use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, IsTerminal, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use pql::{Table, TokenKind, scan, split_statements};

// ============ CLI ============

#[derive(Parser)]
#[command(name = "pql")]
#[command(about = "Translate Pipeline Query Language into SQL")]
#[command(disable_help_subcommand = true)]
struct Cli {
    /// File to write SQL to (defaults to stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Input files; reads stdin when absent or "-"
    #[arg(value_name = "INPUT")]
    inputs: Vec<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate Pipeline Query Language against CSV tables
    Eval {
        /// CSV file loaded as a table; first row names the columns and the
        /// file basename (without ".csv") names the table (repeatable)
        #[arg(long, value_name = "PATH")]
        table: Vec<PathBuf>,

        /// File to write CSV to (defaults to stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Input files; reads stdin when absent or "-"
        #[arg(value_name = "INPUT")]
        inputs: Vec<String>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Some(Command::Eval { table, output, inputs }) => run_eval(&table, output, &inputs),
        None => run_compile(cli.output, &cli.inputs),
    };
    if let Err(err) = result {
        eprintln!("pql: {err}");
        std::process::exit(1);
    }
}

// ============ Subcommands ============

fn run_compile(output: Option<PathBuf>, inputs: &[String]) -> Result<(), Box<dyn Error>> {
    let mut out = open_output(output.as_deref())?;
    let failed = drive(inputs, |statement| match pql::compile(statement) {
        Ok(sql) => {
            if let Err(err) = writeln!(out, "{sql}\n") {
                eprintln!("pql: {err}");
                return false;
            }
            true
        }
        Err(err) => {
            eprintln!("pql: {err}");
            false
        }
    })?;
    out.flush()?;
    if failed {
        return Err("one or more statements could not be compiled".into());
    }
    Ok(())
}

fn run_eval(
    table_paths: &[PathBuf],
    output: Option<PathBuf>,
    inputs: &[String],
) -> Result<(), Box<dyn Error>> {
    let mut tables = Vec::with_capacity(table_paths.len());
    for path in table_paths {
        let table = read_table(path)?;
        log::debug!(
            "loaded table {:?} ({} columns, {} rows)",
            table.name,
            table.columns.len(),
            table.rows.len()
        );
        tables.push(table);
    }

    let mut writer = csv::Writer::from_writer(open_output(output.as_deref())?);
    let failed = drive(inputs, |statement| match pql::eval(statement, &tables) {
        Ok(result) => {
            if let Err(err) = write_table(&mut writer, &result) {
                eprintln!("pql: {err}");
                return false;
            }
            true
        }
        Err(err) => {
            eprintln!("pql: {err}");
            false
        }
    })?;
    writer.flush()?;
    if failed {
        return Err("one or more statements could not be compiled".into());
    }
    Ok(())
}

fn write_table(writer: &mut csv::Writer<Box<dyn Write>>, table: &Table) -> csv::Result<()> {
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    Ok(())
}

// ============ Statement streaming ============

/// Feed input line by line through the statement splitter, handing each
/// completed statement to `handle`. Returns whether any statement failed.
fn drive<F>(inputs: &[String], mut handle: F) -> Result<bool, Box<dyn Error>>
where
    F: FnMut(&str) -> bool,
{
    let mut buffer = String::new();
    let mut failed = false;

    for input in resolve_inputs(inputs) {
        let reader: Box<dyn BufRead> = match &input {
            Input::Stdin => {
                if io::stdin().is_terminal() {
                    eprintln!("Reading from terminal (use semicolons to end statements)...");
                }
                Box::new(BufReader::new(io::stdin()))
            }
            Input::Path(path) => Box::new(BufReader::new(File::open(path)?)),
        };

        for line in reader.lines() {
            buffer.push_str(&line?);
            buffer.push('\n');

            let statements = split_statements(&buffer);
            if statements.len() == 1 {
                continue;
            }
            let mut statements: Vec<String> =
                statements.into_iter().map(str::to_string).collect();
            let rest = statements.pop().unwrap_or_default();
            for statement in &statements {
                if !handle(statement) {
                    failed = true;
                }
            }
            buffer = rest;
        }
    }

    // A trailing fragment with real tokens is a final, unterminated
    // statement; whitespace and comments are discarded.
    if scan(&buffer).iter().any(|t| t.kind != TokenKind::Eof) && !handle(&buffer) {
        failed = true;
    }
    Ok(failed)
}

enum Input {
    Stdin,
    Path(PathBuf),
}

fn resolve_inputs(inputs: &[String]) -> Vec<Input> {
    if inputs.is_empty() {
        return vec![Input::Stdin];
    }
    inputs
        .iter()
        .map(|arg| {
            if arg == "-" {
                Input::Stdin
            } else {
                Input::Path(PathBuf::from(arg))
            }
        })
        .collect()
}

fn open_output(path: Option<&Path>) -> io::Result<Box<dyn Write>> {
    match path {
        None => Ok(Box::new(io::stdout())),
        Some(path) if path.as_os_str() == "-" => Ok(Box::new(io::stdout())),
        Some(path) => Ok(Box::new(File::create(path)?)),
    }
}

// ============ CSV tables ============

fn read_table(path: &Path) -> Result<Table, Box<dyn Error>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|err| format!("read {}: {err}", path.display()))?;

    let mut records = reader.records();
    let columns: Vec<String> = match records.next() {
        Some(record) => record
            .map_err(|err| format!("read {}: {err}", path.display()))?
            .iter()
            .map(str::to_string)
            .collect(),
        None => return Err(format!("read {}: unexpected EOF", path.display()).into()),
    };

    let mut rows = Vec::new();
    for record in records {
        let record = record.map_err(|err| format!("read {}: {err}", path.display()))?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    let base = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = base.strip_suffix(".csv").unwrap_or(&base).to_string();
    Ok(Table::new(name, columns, rows))
}
