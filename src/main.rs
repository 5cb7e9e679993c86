use at_test_driver::config::{Config, ConfigLoader};
use at_test_driver::error::{report_exit_code, AppError, EXIT_SUCCESS, EXIT_USAGE};
use at_test_driver::matrix::usage;
use at_test_driver::runner::{open_serial, run_plan, Plan};
use at_test_driver::{logging, provision};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "at-test",
    version,
    about = "Run AT-command self tests against a serial-attached Wi-Fi modem.",
    long_about = "Sends the selected test commands one at a time, waits for OK or ERROR after each, \
                  and stops at the first command that fails or times out.",
    after_help = usage()
)]
struct Args {
    /// Test family index.
    #[arg(required_unless_present = "list")]
    family: Option<u32>,

    /// Test case index within the family. Omit to run the family's full sequence.
    case: Option<u32>,

    /// Configuration file (defaults to the standard search path).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Echo every line sent and every chunk received.
    #[arg(short, long)]
    verbose: bool,

    /// Serial device, overriding the configuration.
    #[arg(long)]
    port: Option<String>,

    /// Baud rate, overriding the configuration.
    #[arg(long)]
    baud: Option<u32>,

    /// Print the run report as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Print the resolved commands without opening the port.
    #[arg(long)]
    dry_run: bool,

    /// List test families and cases, then exit.
    #[arg(long)]
    list: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if args.list {
        print!("{}", usage());
        return ExitCode::from(EXIT_SUCCESS);
    }

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(e.exit_code());
        }
    };

    logging::init(&config.logging, args.verbose);

    match run(&args, &config) {
        Ok(code) => ExitCode::from(code),
        Err(e @ AppError::Usage(_)) => {
            eprintln!("error: {e}\n\n{}", usage());
            ExitCode::from(EXIT_USAGE)
        }
        Err(e) => {
            error!("{e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn load_config(args: &Args) -> Result<Config, AppError> {
    let loader = match &args.config {
        Some(path) => ConfigLoader::load_from(path)?,
        None => ConfigLoader::load()?,
    };
    let mut config = loader.into_config();

    if let Some(port) = &args.port {
        config.serial.port = port.clone();
    }
    if let Some(baud) = args.baud {
        config.serial.baud = baud;
    }
    config.logging.verbose |= args.verbose;

    config.validate()?;
    Ok(config)
}

fn run(args: &Args, config: &Config) -> Result<u8, AppError> {
    let family = args.family.unwrap_or_default();
    let plan = Plan::new(family, args.case, config)?;

    if args.dry_run {
        if args.json {
            println!("{}", serde_json::to_string_pretty(&plan)?);
        } else {
            for command in plan.commands.iter() {
                println!("{command}");
            }
        }
        return Ok(EXIT_SUCCESS);
    }

    let provisioner = provision::from_config(&config.provision);
    let summary = run_plan(plan, config, provisioner.as_ref(), open_serial)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "{} {} on {}: {} ({} succeeded)",
            summary.family,
            summary.case,
            summary.port,
            summary.report.status,
            summary.report.succeeded
        );
    }

    Ok(report_exit_code(&summary.report))
}
