use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;

const DEFAULT_CONFIG: &str = "timelock.toml";

fn cli() -> Command {
    Command::new("timelock")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Queue, execute and audit deferred governance transactions")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file [default: timelock.toml if present]"),
        )
        .arg(
            Arg::new("ledger-dir")
                .long("ledger-dir")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Ledger directory, overriding configuration and environment"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("queue")
                .about("Queue every operation of a plan file into a new batch")
                .arg(
                    Arg::new("plan")
                        .long("plan")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Plan file (.json, .yaml or .yml)"),
                )
                .arg(
                    Arg::new("label")
                        .long("label")
                        .required(true)
                        .help("Batch label"),
                )
                .arg(
                    Arg::new("continue-on-error")
                        .long("continue-on-error")
                        .action(ArgAction::SetTrue)
                        .help("Keep going after a failed operation instead of stopping"),
                ),
        )
        .subcommand(
            Command::new("execute")
                .about("Execute the pending entries of a batch into a result batch")
                .arg(
                    Arg::new("batch")
                        .long("batch")
                        .required(true)
                        .help("Batch file name, or a label for its most recent batch"),
                )
                .arg(
                    Arg::new("label")
                        .long("label")
                        .help("Result batch label [default: <source label>-executed]"),
                ),
        )
        .subcommand(
            Command::new("show")
                .about("Print the entries of a batch")
                .arg(Arg::new("batch").long("batch").required(true).help("Batch name or label"))
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the raw records"),
                ),
        )
        .subcommand(Command::new("list").about("List batches, oldest first"))
        .subcommand(
            Command::new("pending")
                .about("Entries of a queue batch with no executed counterpart")
                .arg(Arg::new("queued").long("queued").required(true).help("Queue batch"))
                .arg(
                    Arg::new("executed")
                        .long("executed")
                        .action(ArgAction::Append)
                        .help("Result batch; repeatable"),
                ),
        )
        .subcommand(
            Command::new("encode")
                .about("Print the ABI encoding of a call")
                .arg(
                    Arg::new("signature")
                        .long("signature")
                        .required(true)
                        .help("Function signature, e.g. setFee(uint256)"),
                )
                .arg(
                    Arg::new("types")
                        .long("types")
                        .default_value("[]")
                        .help("JSON array of ABI types"),
                )
                .arg(
                    Arg::new("params")
                        .long("params")
                        .default_value("[]")
                        .help("JSON array of parameter values"),
                )
                .arg(
                    Arg::new("calldata")
                        .long("calldata")
                        .action(ArgAction::SetTrue)
                        .help("Prefix the function selector"),
                ),
        )
        .subcommand(
            Command::new("replay")
                .about("Print the stored replay commands of a batch")
                .arg(Arg::new("batch").long("batch").required(true).help("Batch name or label")),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn dispatch(matches: &ArgMatches) -> anyhow::Result<bool> {
    let settings = commands::Settings::from_matches(matches)?;
    match matches.subcommand() {
        Some(("queue", args)) => commands::queue(&settings, args).await,
        Some(("execute", args)) => commands::execute(&settings, args).await,
        Some(("show", args)) => commands::show(&settings, args).await,
        Some(("list", _)) => commands::list(&settings).await,
        Some(("pending", args)) => commands::pending(&settings, args).await,
        Some(("encode", args)) => commands::encode(args),
        Some(("replay", args)) => commands::replay(&settings, args).await,
        _ => Ok(true),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    match dispatch(&matches).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = format!("{e:#}"), "command failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn parses_queue_with_global_flags() {
        let matches = cli()
            .try_get_matches_from([
                "timelock", "queue", "--plan", "fees.yaml", "--label", "fees", "--continue-on-error", "--log-json",
            ])
            .unwrap();
        assert!(matches.get_flag("log-json"));
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "queue");
        assert_eq!(args.get_one::<PathBuf>("plan").unwrap(), &PathBuf::from("fees.yaml"));
        assert!(args.get_flag("continue-on-error"));
    }

    #[test]
    fn queue_requires_a_label() {
        assert!(cli().try_get_matches_from(["timelock", "queue", "--plan", "p.json"]).is_err());
    }

    #[test]
    fn pending_accepts_several_result_batches() {
        let matches = cli()
            .try_get_matches_from([
                "timelock", "pending", "--queued", "fees", "--executed", "a", "--executed", "b",
            ])
            .unwrap();
        let (_, args) = matches.subcommand().unwrap();
        let executed: Vec<&String> = args.get_many::<String>("executed").unwrap().collect();
        assert_eq!(executed, vec!["a", "b"]);
    }
}
