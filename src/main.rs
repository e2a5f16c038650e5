//! CLI surface for plotting, proving, and transaction shaping.

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use shadowy_core::crypto::KeyPair;
use shadowy_core::plot::{create_plot, PlotFile};
use shadowy_core::proof::generate_proof;
use shadowy_core::transaction::{SignedTransaction, Transaction};
use shadowy_core::ShadowyError;

#[derive(Parser)]
#[command(name = "shadowy-core", about = "Plotting, proving, and transaction tooling")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a plot file in `dir`.
    Plot {
        dir: PathBuf,
        #[arg(short = 'k', default_value_t = 10)]
        k: u32,
    },
    /// Emit an encoded proof for `challenge` against `plot_file`.
    Prove {
        plot_file: PathBuf,
        challenge: String,
    },
    #[command(subcommand)]
    Tx(TxCommand),
}

#[derive(Subcommand)]
enum TxCommand {
    /// Build a new, unsigned transaction. Outputs are `address:value` pairs.
    Create {
        #[arg(long = "output", value_name = "ADDRESS:VALUE")]
        outputs: Vec<String>,
    },
    /// Sign a transaction (JSON on stdin) using a plot entry's key.
    Sign {
        plot_file: PathBuf,
        #[arg(long, default_value_t = 0)]
        index: usize,
    },
    /// Verify a `SignedTransaction` (JSON on stdin).
    Verify,
    /// Print a summary of a `Transaction` or `SignedTransaction` (JSON on stdin).
    Info,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Plot { dir, k } => run_plot(&dir, k),
        Command::Prove { plot_file, challenge } => run_prove(&plot_file, &challenge),
        Command::Tx(TxCommand::Create { outputs }) => run_tx_create(&outputs),
        Command::Tx(TxCommand::Sign { plot_file, index }) => run_tx_sign(&plot_file, index),
        Command::Tx(TxCommand::Verify) => run_tx_verify(),
        Command::Tx(TxCommand::Info) => run_tx_info(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

fn run_plot(dir: &PathBuf, k: u32) -> Result<(), ShadowyError> {
    let path = create_plot(dir, k)?;
    println!("{}", path.display());
    Ok(())
}

fn run_prove(plot_file: &PathBuf, challenge: &str) -> Result<(), ShadowyError> {
    let proof = generate_proof(plot_file, challenge)?;
    println!("{proof}");
    Ok(())
}

fn run_tx_create(outputs: &[String]) -> Result<(), ShadowyError> {
    let mut tx = Transaction::new();
    for spec in outputs {
        let (address, value) = spec
            .split_once(':')
            .ok_or_else(|| ShadowyError::Input(format!("bad output spec: {spec}")))?;
        let value: u64 = value
            .parse()
            .map_err(|_| ShadowyError::Input(format!("bad output value: {value}")))?;
        tx.add_output(address.to_string(), value, String::new());
    }
    tx.is_valid()?;
    print_json(&tx)
}

fn run_tx_sign(plot_file: &PathBuf, index: usize) -> Result<(), ShadowyError> {
    let tx: Transaction = read_json_stdin()?;
    let plot = PlotFile::open(plot_file)?;
    let keypair: KeyPair = plot.read_keypair(index)?;
    let signed = SignedTransaction::sign(&tx, &keypair)?;
    print_json(&signed)
}

fn run_tx_verify() -> Result<(), ShadowyError> {
    let signed: SignedTransaction = read_json_stdin()?;
    let tx = signed.verify()?;
    print_json(&tx)
}

fn run_tx_info() -> Result<(), ShadowyError> {
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .map_err(ShadowyError::Io)?;

    if let Ok(signed) = serde_json::from_str::<SignedTransaction>(&buf) {
        println!("tx_hash:   {}", signed.tx_hash);
        println!("algorithm: {}", signed.algorithm);
        println!("signer:    {}", signed.signer_key);
        return Ok(());
    }

    let tx: Transaction = serde_json::from_str(&buf)
        .map_err(|e| ShadowyError::Format(format!("parse error: {e}")))?;
    let total: u64 = tx.outputs.iter().map(|o| o.value).sum();
    println!("version:   {}", tx.version);
    println!("nonce:     {}", tx.nonce);
    println!("inputs:    {}", tx.inputs.len());
    println!("outputs:   {}", tx.outputs.len());
    println!("total:     {total}");
    println!("hash:      {}", tx.hash()?);
    Ok(())
}

fn read_json_stdin<T: serde::de::DeserializeOwned>() -> Result<T, ShadowyError> {
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .map_err(ShadowyError::Io)?;
    serde_json::from_str(&buf).map_err(|e| ShadowyError::Format(format!("parse error: {e}")))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), ShadowyError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| ShadowyError::Format(e.to_string()))?;
    io::stdout()
        .write_all(json.as_bytes())
        .map_err(ShadowyError::Io)?;
    println!();
    Ok(())
}
