use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use std::path::Path;
use tracing_subscriber::EnvFilter;

mod api;
mod commands;
mod config;
mod types;

use api::OrchestratorApi;
use commands::ValidatorCommands;
use config::Config;
use types::parse_b256;

fn tx_arg<'a, 'b>() -> Arg<'a, 'b> {
    Arg::with_name("tx")
        .short("t")
        .long("tx")
        .value_name("HASH")
        .help("Transaction hash of the initiating call")
        .takes_value(true)
        .required(true)
}

fn validation_arg<'a, 'b>() -> Arg<'a, 'b> {
    Arg::with_name("validation-id")
        .short("v")
        .long("validation-id")
        .value_name("ID")
        .help("Validation ID (32-byte hex)")
        .takes_value(true)
        .required(true)
}

fn cli<'a, 'b>() -> App<'a, 'b> {
    App::new("L1 Validator Manager CLI")
        .version("0.1.0")
        .about("Register, re-weight and remove validators of a permissioned L1")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("rpc")
                .long("rpc")
                .value_name("URL")
                .help("EVM RPC endpoint of the L1")
                .takes_value(true)
                .global(true),
        )
        .arg(
            Arg::with_name("manager")
                .short("m")
                .long("manager")
                .value_name("ADDRESS")
                .help("Validator manager contract address")
                .takes_value(true)
                .global(true),
        )
        .arg(
            Arg::with_name("caller")
                .short("c")
                .long("caller")
                .value_name("ADDRESS")
                .help("Account that sends transactions")
                .takes_value(true)
                .global(true),
        )
        .arg(
            Arg::with_name("subnet")
                .short("s")
                .long("subnet")
                .value_name("SUBNET_ID")
                .help("L1 subnet ID")
                .takes_value(true)
                .global(true),
        )
        .arg(
            Arg::with_name("journal")
                .long("journal")
                .value_name("FILE")
                .help("Pipeline journal file")
                .takes_value(true)
                .global(true),
        )
        .arg(
            Arg::with_name("require-total-stake")
                .long("require-total-stake")
                .help("Refuse weight changes when total L1 stake is unknown")
                .global(true),
        )
        .arg(
            Arg::with_name("save-config")
                .long("save-config")
                .help("Write the resulting settings back to the config file")
                .global(true),
        )
        .subcommand(SubCommand::with_name("ownership").about("Show who owns the validator manager"))
        .subcommand(
            SubCommand::with_name("register-validator")
                .about("Initiate registration of the validators in a TOML file")
                .arg(
                    Arg::with_name("file")
                        .short("f")
                        .long("file")
                        .value_name("FILE")
                        .help("Registration file with [[validators]] entries")
                        .takes_value(true)
                        .required(true),
                )
                .arg(
                    Arg::with_name("complete")
                        .long("complete")
                        .help("Aggregate signatures and finalize on the root chain right away"),
                ),
        )
        .subcommand(
            SubCommand::with_name("complete-registration")
                .about("Finalize a registration on the root chain")
                .arg(tx_arg())
                .arg(
                    Arg::with_name("balance")
                        .short("b")
                        .long("balance")
                        .value_name("NAVAX")
                        .help("Balance for the validator fee")
                        .takes_value(true)
                        .required(true),
                )
                .arg(
                    Arg::with_name("pop")
                        .short("p")
                        .long("pop")
                        .value_name("HEX")
                        .help("BLS proof of possession")
                        .takes_value(true)
                        .required(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("initiate-removal")
                .about("Initiate removal of a validator")
                .arg(validation_arg()),
        )
        .subcommand(
            SubCommand::with_name("update-weight")
                .about("Initiate a weight change of a validator")
                .arg(validation_arg())
                .arg(
                    Arg::with_name("weight")
                        .short("w")
                        .long("weight")
                        .value_name("WEIGHT")
                        .help("New weight")
                        .takes_value(true)
                        .required(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("complete-removal")
                .about("Finalize a removal or weight change on the root chain")
                .arg(tx_arg())
                .arg(
                    Arg::with_name("signing-subnet")
                        .long("signing-subnet")
                        .value_name("SUBNET_ID")
                        .help("Subnet whose validators sign; defaults to the L1")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("quorum")
                        .short("q")
                        .long("quorum")
                        .value_name("PERCENT")
                        .help("Quorum percentage")
                        .takes_value(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("history")
                .about("Show journaled pipeline transitions")
                .arg(
                    Arg::with_name("operation")
                        .short("o")
                        .long("operation")
                        .value_name("UUID")
                        .help("Only this operation")
                        .takes_value(true),
                ),
        )
}

fn required<'a>(matches: &'a ArgMatches<'_>, name: &str) -> anyhow::Result<&'a str> {
    matches
        .value_of(name)
        .ok_or_else(|| anyhow::anyhow!("missing --{}", name))
}

fn persist_if_requested(config: &Config, matches: &ArgMatches<'_>) -> anyhow::Result<()> {
    if matches.is_present("save-config") {
        config.save()?;
        tracing::info!("configuration saved");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();

    // Load configuration
    let config = Config::load()?.with_overrides(&matches);

    match matches.subcommand() {
        ("history", Some(sub_matches)) => {
            let config = config.with_overrides(sub_matches);
            persist_if_requested(&config, sub_matches)?;
            ValidatorCommands::history(&config, sub_matches.value_of("operation")).await?;
        }
        (name, Some(sub_matches)) => {
            let config = config.with_overrides(sub_matches);
            persist_if_requested(&config, sub_matches)?;
            let api = OrchestratorApi::new(&config)?;
            run(&api, name, sub_matches).await?;
        }
        _ => {
            println!("No subcommand specified. Use --help for usage information.");
        }
    }

    Ok(())
}

async fn run(api: &OrchestratorApi, name: &str, sub_matches: &ArgMatches<'_>) -> anyhow::Result<()> {
    match name {
        "ownership" => ValidatorCommands::ownership(api).await,
        "register-validator" => {
            let file = required(sub_matches, "file")?;
            ValidatorCommands::register_validator(api, Path::new(file), sub_matches.is_present("complete")).await
        }
        "complete-registration" => {
            let tx_hash = parse_b256(required(sub_matches, "tx")?, "transaction hash")?;
            let balance = required(sub_matches, "balance")?.parse::<u64>()?;
            ValidatorCommands::complete_registration(api, tx_hash, balance, required(sub_matches, "pop")?).await
        }
        "initiate-removal" => {
            let validation_id = parse_b256(required(sub_matches, "validation-id")?, "validation ID")?;
            ValidatorCommands::initiate_removal(api, validation_id).await
        }
        "update-weight" => {
            let validation_id = parse_b256(required(sub_matches, "validation-id")?, "validation ID")?;
            let weight = required(sub_matches, "weight")?.parse::<u64>()?;
            ValidatorCommands::update_weight(api, validation_id, weight).await
        }
        "complete-removal" => {
            let tx_hash = parse_b256(required(sub_matches, "tx")?, "transaction hash")?;
            let quorum = sub_matches
                .value_of("quorum")
                .map(|q| q.parse::<u8>())
                .transpose()?;
            ValidatorCommands::complete_removal(api, tx_hash, sub_matches.value_of("signing-subnet"), quorum).await
        }
        other => Err(anyhow::anyhow!("unknown command {}", other)),
    }
}
