use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use panelsync_cli::{logging, run_simulator, screen, validate, FileArg, SimulatorConfig};
use panelsync_core::ServiceConfig;
use panelsync_validator::ContentValidator;
use std::path::PathBuf;
use std::process::ExitCode;

fn cli() -> Command {
    Command::new("panelsync")
        .version(panelsync_cli::VERSION)
        .about("Configuration lifecycle tools for touch-panel controllers")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Service configuration file (TOML)"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("validate")
                .about("Validate configuration files against an inventory")
                .arg(
                    Arg::new("inventory")
                        .long("inventory")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Inventory document (JSON)"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output the report as JSON"),
                )
                .arg(
                    Arg::new("files")
                        .required(true)
                        .num_args(1..)
                        .value_parser(value_parser!(FileArg))
                        .help("<config-path>=<file>, or a file whose relative path is its config path"),
                ),
        )
        .subcommand(
            Command::new("screen-driver")
                .about("Screen driver source for syntax and disallowed capabilities")
                .arg(
                    Arg::new("file")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new("simulate")
                .about("Run an in-process draft, deploy and sync flow")
                .arg(
                    Arg::new("controllers")
                        .long("controllers")
                        .default_value("3")
                        .value_parser(value_parser!(usize))
                        .help("Number of simulated controllers"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                ),
        )
}

fn service_config(matches: &ArgMatches) -> anyhow::Result<ServiceConfig> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => ServiceConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(ServiceConfig::default()),
    }
}

async fn run(matches: &ArgMatches) -> anyhow::Result<ExitCode> {
    let config = service_config(matches)?;

    match matches.subcommand() {
        Some(("validate", args)) => {
            let inventory_path = args
                .get_one::<PathBuf>("inventory")
                .context("--inventory is required")?;
            let file_args: Vec<FileArg> = args
                .get_many::<FileArg>("files")
                .map(|v| v.cloned().collect())
                .unwrap_or_default();

            let inventory = validate::load_inventory(inventory_path)?;
            let files = validate::read_files(&file_args)?;
            let validator = ContentValidator::new(config.validator);
            let report = validate::run(&validator, &inventory, &files);

            println!("{}", validate::render(&report, args.get_flag("json"))?);
            Ok(if report.is_valid() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Some(("screen-driver", args)) => {
            let path = args.get_one::<PathBuf>("file").context("driver file is required")?;
            let report = screen::screen_file(path)?;
            println!("{}", screen::render(path, &report));
            Ok(if report.passed() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Some(("simulate", args)) => {
            let sim = SimulatorConfig {
                controllers: args.get_one::<usize>("controllers").copied().unwrap_or(3),
                seed: args.get_one::<u64>("seed").copied().unwrap_or(42),
            };
            let report = run_simulator(config, sim).await?;
            println!("{}", report.generate_text());
            Ok(if report.passed() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        _ => Ok(ExitCode::SUCCESS),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli().get_matches();
    if let Err(e) = logging::init(matches.get_flag("log-json")) {
        eprintln!("{e}");
        return ExitCode::from(2);
    }

    match run(&matches).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}
