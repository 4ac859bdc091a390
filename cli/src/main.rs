// civclock -- set an Icom transceiver's clock, date and UTC offset from the
// computer's clock over CI-V.
//
// Usage:
//   civclock -m IC-7300 -p /dev/ttyUSB0
//   civclock -m IC-7610 -p COM3 -b 19200 -u
//   civclock -m IC-9700 -a A2 -c E0 -p /dev/ttyUSB1 -q
//   civclock --mock -m IC-705
//   civclock --list-models
//
// The process exit code tells a calling script what went wrong: negative
// codes for configuration and rig status problems, 1xx for the clock
// operations themselves.

use std::process;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use civclock_core::{Error, Operation, RigChannel, RigStatus, SystemClock};
use civclock_icom::civ::is_hex_byte;
use civclock_icom::models::{self, MODELS};
use civclock_icom::{CivLink, ClockSyncBuilder, SyncReport};
use civclock_test_harness::MockRig;
use civclock_transport::{SerialConfig, SerialTransport};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Set an Icom transceiver's clock to the computer's time over CI-V.
#[derive(Parser, Debug)]
#[command(name = "civclock", version, about)]
struct Cli {
    /// Reversed time zone: clock shows UTC, the UTC display shows local time.
    #[arg(short = 'u', long = "utc-clock")]
    reversed_time_zone: bool,

    /// Rig number on the rig channel.
    #[arg(short = 'r', long = "rig", default_value_t = 1)]
    rig: u8,

    /// Transceiver model (e.g. IC-7300). Defaults to the model the rig reports.
    #[arg(short = 'm', long)]
    model: Option<String>,

    /// Transceiver CI-V address, two hex digits. Defaults to the model's.
    #[arg(short = 'a', long = "transceiver-address")]
    transceiver_address: Option<String>,

    /// Controller CI-V address, two hex digits.
    #[arg(short = 'c', long = "controller-address", default_value = "E0")]
    controller_address: String,

    /// Only report errors.
    #[arg(short = 'q', long)]
    quiet: bool,

    /// Use the given model even if the rig reports a different one.
    #[arg(short = 'f', long = "force-model")]
    force_model: bool,

    /// Serial port path (e.g. /dev/ttyUSB0, COM3).
    #[arg(short = 'p', long)]
    port: Option<String>,

    /// Serial baud rate.
    #[arg(short = 'b', long = "baud", default_value_t = 115_200)]
    baud: u32,

    /// Use an in-process rig that acknowledges every command.
    #[arg(long)]
    mock: bool,

    /// Print the supported models and exit.
    #[arg(long)]
    list_models: bool,
}

// ---------------------------------------------------------------------------
// Exit codes
// ---------------------------------------------------------------------------

const EXIT_OK: i32 = 0;
const EXIT_INVALID_OPTION: i32 = -1;
const EXIT_RIG_NUMBER: i32 = -2;
const EXIT_MODEL: i32 = -3;
const EXIT_TRANSCEIVER_ADDRESS: i32 = -4;
const EXIT_CONTROLLER_ADDRESS: i32 = -5;
const EXIT_CHANNEL: i32 = -10;

/// A failure together with the exit code it maps to.
struct Failure {
    code: i32,
    message: String,
}

impl Failure {
    fn new(code: i32, message: impl Into<String>) -> Self {
        Failure {
            code,
            message: message.into(),
        }
    }
}

impl From<Error> for Failure {
    fn from(err: Error) -> Self {
        Failure::new(exit_code(&err), err.to_string())
    }
}

fn status_exit_code(status: RigStatus) -> i32 {
    match status {
        RigStatus::NotConfigured => -50,
        RigStatus::Disabled => -51,
        RigStatus::PortBusy => -52,
        RigStatus::NotResponding => -53,
        RigStatus::Online => -54,
    }
}

fn operation_exit_code(operation: Operation) -> i32 {
    match operation {
        Operation::SetTime => 100,
        Operation::SetDate => 110,
        Operation::SetUtcOffset => 120,
    }
}

fn exit_code(err: &Error) -> i32 {
    match err {
        Error::Protocol { operation, .. } => operation_exit_code(*operation),
        Error::Timeout(operation) => operation_exit_code(*operation) + 1,
        Error::RigStatus(status) => status_exit_code(*status),
        Error::Configuration(_) => EXIT_MODEL,
        Error::Format(_) => EXIT_INVALID_OPTION,
        Error::Transport(_)
        | Error::NotConnected
        | Error::ConnectionLost
        | Error::ReadTimeout
        | Error::Io(_) => EXIT_CHANNEL,
    }
}

// ---------------------------------------------------------------------------
// Option validation
// ---------------------------------------------------------------------------

/// Checks that need no rig, each mapped to its own exit code.
fn validate_options(cli: &Cli) -> std::result::Result<(), Failure> {
    if cli.rig == 0 {
        return Err(Failure::new(EXIT_RIG_NUMBER, "rig number must be at least 1"));
    }
    if let Some(model) = &cli.model {
        models::lookup_model(model)?;
    }
    if let Some(address) = &cli.transceiver_address {
        if !is_hex_byte(address) {
            return Err(Failure::new(
                EXIT_TRANSCEIVER_ADDRESS,
                format!("invalid transceiver address '{address}'"),
            ));
        }
    }
    if !is_hex_byte(&cli.controller_address) {
        return Err(Failure::new(
            EXIT_CONTROLLER_ADDRESS,
            format!("invalid controller address '{}'", cli.controller_address),
        ));
    }
    if cli.mock == cli.port.is_some() {
        return Err(Failure::new(
            EXIT_INVALID_OPTION,
            "exactly one of --port or --mock is required",
        ));
    }
    if cli.port.is_some() && cli.model.is_none() {
        return Err(Failure::new(EXIT_MODEL, "--model is required with --port"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Rig channels
// ---------------------------------------------------------------------------

async fn open_link(cli: &Cli, port: &str, model: &str) -> Result<CivLink> {
    let config = SerialConfig {
        baud_rate: cli.baud,
        ..SerialConfig::default()
    };
    let transport = SerialTransport::open_with_config(port, config)
        .await
        .with_context(|| format!("failed to open {port} at {} baud", cli.baud))?;
    let controller = u8::from_str_radix(&cli.controller_address, 16)
        .context("controller address is not hex")?;
    Ok(CivLink::spawn(Box::new(transport), model, controller))
}

/// One block per rig slot on `channel`: number, rig type and status.
async fn rig_listing<C: RigChannel>(channel: &C) -> civclock_core::Result<Vec<String>> {
    let mut lines = Vec::new();
    for rig in 1..=channel.rig_count() {
        let rig_type = channel
            .rig_info(rig)
            .await?
            .map(|info| info.rig_type)
            .unwrap_or_default();
        let status = channel.status(rig).await?;
        lines.push(format!("Rig {rig}"));
        lines.push(format!("    Rig Type: {rig_type}"));
        lines.push(format!("    Status:   {status}"));
    }
    Ok(lines)
}

async fn synchronize<C: RigChannel>(
    cli: &Cli,
    channel: C,
) -> std::result::Result<(SyncReport, C), Failure> {
    if !cli.quiet {
        for line in rig_listing(&channel).await? {
            println!("{line}");
        }
    }

    let rig_count = channel.rig_count();
    if cli.rig > rig_count {
        return Err(Failure::new(
            EXIT_RIG_NUMBER,
            format!("rig number {} out of range (1-{rig_count})", cli.rig),
        ));
    }

    let mut builder = ClockSyncBuilder::new()
        .rig(cli.rig)
        .controller_address(cli.controller_address.as_str())
        .reversed_time_zone(cli.reversed_time_zone)
        .force_model(cli.force_model)
        .quiet(cli.quiet);
    if let Some(model) = &cli.model {
        builder = builder.model(model.as_str());
    }
    if let Some(address) = &cli.transceiver_address {
        builder = builder.transceiver_address(address.as_str());
    }

    let mut sync = builder.build(channel, SystemClock).await?;
    if !cli.quiet {
        println!(
            "Transceiver: {} at {}, controller {}{}",
            sync.model().name,
            sync.transceiver_address(),
            sync.controller_address(),
            if sync.reversed_time_zone() {
                ", reversed time zone"
            } else {
                ""
            }
        );
    }
    let report = sync.run().await?;
    Ok((report, sync.into_channel()))
}

fn print_report(report: &SyncReport) {
    println!("Time set:       {}", report.time);
    for frame in &report.date {
        println!("Date set:       {frame}");
    }
    println!("UTC offset set: {}", report.utc_offset);
}

async fn run(cli: &Cli) -> std::result::Result<SyncReport, Failure> {
    validate_options(cli)?;

    if cli.mock {
        let model = cli.model.as_deref().unwrap_or("IC-7300");
        let (report, _) = synchronize(cli, MockRig::new(model)).await?;
        return Ok(report);
    }

    let (Some(port), Some(model)) = (cli.port.as_deref(), cli.model.as_deref()) else {
        return Err(Failure::new(EXIT_INVALID_OPTION, "missing --port or --model"));
    };
    let link = open_link(cli, port, model)
        .await
        .map_err(|e| Failure::new(EXIT_CHANNEL, format!("{e:#}")))?;
    let (report, link) = synchronize(cli, link).await?;
    if let Err(e) = link.shutdown().await {
        tracing::debug!(error = %e, "CI-V link shutdown failed");
    }
    Ok(report)
}

fn list_models() {
    println!("{:<10} {:<5} {:<10} {:<10} {:<10}", "Model", "CI-V", "Date", "Time", "UTC offset");
    for m in MODELS {
        println!(
            "{:<10} {:<5} {:<10} {:<10} {:<10}",
            m.name, m.default_civ_address, m.set_date, m.set_time, m.set_utc_offset
        );
    }
}

fn init_logging(quiet: bool) {
    let default_level = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => EXIT_OK,
                _ => EXIT_INVALID_OPTION,
            };
            let _ = e.print();
            process::exit(code);
        }
    };

    if cli.list_models {
        list_models();
        return;
    }

    init_logging(cli.quiet);

    match run(&cli).await {
        Ok(report) => {
            if !cli.quiet {
                print_report(&report);
            }
        }
        Err(failure) => {
            eprintln!("Error: {}", failure.message);
            process::exit(failure.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("civclock").chain(args.iter().copied())).unwrap()
    }

    fn validation_code(args: &[&str]) -> i32 {
        match validate_options(&parse(args)) {
            Ok(()) => EXIT_OK,
            Err(f) => f.code,
        }
    }

    #[test]
    fn short_options() {
        let cli = parse(&["-u", "-r", "2", "-m", "IC-7300", "-a", "94", "-c", "E1", "-q", "-f", "-p", "COM3", "-b", "19200"]);
        assert!(cli.reversed_time_zone);
        assert_eq!(cli.rig, 2);
        assert_eq!(cli.model.as_deref(), Some("IC-7300"));
        assert_eq!(cli.transceiver_address.as_deref(), Some("94"));
        assert_eq!(cli.controller_address, "E1");
        assert!(cli.quiet && cli.force_model);
        assert_eq!(cli.port.as_deref(), Some("COM3"));
        assert_eq!(cli.baud, 19_200);
    }

    #[test]
    fn defaults() {
        let cli = parse(&["--mock"]);
        assert_eq!(cli.rig, 1);
        assert_eq!(cli.controller_address, "E0");
        assert_eq!(cli.baud, 115_200);
        assert!(!cli.reversed_time_zone);
    }

    #[test]
    fn option_validation_exit_codes() {
        assert_eq!(validation_code(&["--mock"]), EXIT_OK);
        assert_eq!(validation_code(&["--mock", "-r", "0"]), EXIT_RIG_NUMBER);
        assert_eq!(validation_code(&["--mock", "-m", "IC-999"]), EXIT_MODEL);
        assert_eq!(validation_code(&["--mock", "-a", "XYZ"]), EXIT_TRANSCEIVER_ADDRESS);
        assert_eq!(validation_code(&["--mock", "-c", "E"]), EXIT_CONTROLLER_ADDRESS);
        assert_eq!(validation_code(&[]), EXIT_INVALID_OPTION);
        assert_eq!(validation_code(&["-p", "COM3"]), EXIT_MODEL);
    }

    #[test]
    fn error_exit_codes() {
        assert_eq!(exit_code(&Error::Timeout(Operation::SetTime)), 101);
        assert_eq!(
            exit_code(&Error::Protocol {
                operation: Operation::SetDate,
                reply: String::new()
            }),
            110
        );
        assert_eq!(exit_code(&Error::Timeout(Operation::SetUtcOffset)), 121);
        assert_eq!(exit_code(&Error::RigStatus(RigStatus::PortBusy)), -52);
        assert_eq!(exit_code(&Error::RigStatus(RigStatus::NotConfigured)), -50);
        assert_eq!(exit_code(&Error::Transport("gone".into())), EXIT_CHANNEL);
    }

    #[tokio::test]
    async fn mock_rig_out_of_range() {
        let cli = parse(&["--mock", "-r", "5", "-q"]);
        let failure = synchronize(&cli, MockRig::new("IC-7300")).await.err().unwrap();
        assert_eq!(failure.code, EXIT_RIG_NUMBER);
    }

    #[tokio::test]
    async fn mock_rig_model_mismatch() {
        let cli = parse(&["--mock", "-m", "IC-7610", "-q"]);
        let failure = synchronize(&cli, MockRig::new("IC-7300")).await.err().unwrap();
        assert_eq!(failure.code, EXIT_MODEL);
    }

    #[tokio::test]
    async fn lists_every_rig_slot() {
        let rig = MockRig::new("IC-7300").with_rig_count(2);
        let lines = rig_listing(&rig).await.unwrap();
        assert_eq!(
            lines,
            vec![
                "Rig 1",
                "    Rig Type: IC-7300",
                "    Status:   online",
                "Rig 2",
                "    Rig Type: ",
                "    Status:   not configured",
            ]
        );
    }

    #[tokio::test]
    async fn link_lists_one_rig() {
        let link = CivLink::spawn(
            Box::new(civclock_test_harness::MockTransport::new()),
            "IC-705",
            0xE0,
        );
        let lines = rig_listing(&link).await.unwrap();
        assert_eq!(lines, vec!["Rig 1", "    Rig Type: IC-705", "    Status:   online"]);
        link.cancel();
    }
}
