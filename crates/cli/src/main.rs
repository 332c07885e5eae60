// FILE: crates/cli/src/main.rs

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use laboursync_config::ConfigManager;
use std::path::PathBuf;

mod commands;

use commands::CliContext;

fn build_cli() -> Command {
    Command::new("laboursync")
        .version(env!("CARGO_PKG_VERSION"))
        .author("laboursync contributors")
        .about("Inspect and drain the offline outbox of a labour tracking client")
        .arg(
            Arg::new("database")
                .short('d')
                .long("database")
                .value_name("PATH")
                .help("Path to the database file (defaults to the configured store)")
                .global(true),
        )
        .arg(
            Arg::new("config-dir")
                .short('c')
                .long("config-dir")
                .value_name("DIR")
                .help("Directory holding config.toml")
                .global(true),
        )
        .subcommand(Command::new("init").about("Write a default config file and create the database"))
        .subcommand(Command::new("status").about("Show outbox statistics per status and aggregate"))
        .subcommand(
            Command::new("events")
                .about("List outbox events")
                .arg(
                    Arg::new("status")
                        .short('s')
                        .long("status")
                        .value_name("STATUS")
                        .help("Only show events in this status")
                        .value_parser(["pending", "syncing", "synced", "failed"])
                        .default_value("pending"),
                )
                .arg(
                    Arg::new("aggregate")
                        .short('a')
                        .long("aggregate")
                        .value_name("AGGREGATE_ID")
                        .help("Only show events of one aggregate, in every status"),
                ),
        )
        .subcommand(
            Command::new("retry")
                .about("Reset failed events to pending so the next drain picks them up")
                .arg(
                    Arg::new("all")
                        .long("all")
                        .help("Also reset events past the configured retry threshold")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(Command::new("prune").about("Delete synced events, keeping guest events"))
        .subcommand(Command::new("drain").about("Send every pending event to the remote service"))
        .subcommand(
            Command::new("guest")
                .about("Manage guest profiles")
                .subcommand_required(true)
                .subcommand(Command::new("list").about("List guest profiles"))
                .subcommand(
                    Command::new("export")
                        .about("Export a guest profile and its events as JSON")
                        .arg(Arg::new("id").required(true).value_name("GUEST_ID").help("Guest id"))
                        .arg(
                            Arg::new("output")
                                .short('o')
                                .long("output")
                                .value_name("FILE")
                                .help("Write to a file instead of stdout"),
                        ),
                )
                .subcommand(
                    Command::new("clear")
                        .about("Delete a guest profile and everything stored for it")
                        .arg(Arg::new("id").required(true).value_name("GUEST_ID").help("Guest id"))
                        .arg(
                            Arg::new("force")
                                .short('f')
                                .long("force")
                                .help("Skip confirmation prompt")
                                .action(ArgAction::SetTrue),
                        ),
                )
                .subcommand(
                    Command::new("cleanup")
                        .about("Delete guest profiles that have been inactive for a while")
                        .arg(
                            Arg::new("days")
                                .long("days")
                                .value_name("DAYS")
                                .help("Inactivity threshold (defaults to guest.inactive_days)")
                                .value_parser(clap::value_parser!(u32)),
                        ),
                ),
        )
        .subcommand(Command::new("check").about("Verify database integrity and probe connectivity"))
}

fn load_context(matches: &clap::ArgMatches) -> Result<CliContext> {
    let manager = match matches.get_one::<String>("config-dir") {
        Some(dir) => ConfigManager::with_directory(PathBuf::from(dir)),
        None => ConfigManager::new(),
    }
    .context("Failed to resolve config directory")?;

    let config = manager
        .load_with_env_overrides()
        .with_context(|| format!("Failed to load {}", manager.config_path().display()))?;

    let db_path = matches
        .get_one::<String>("database")
        .map(PathBuf::from)
        .unwrap_or_else(|| manager.database_path(&config));
    log::debug!("Using outbox database at {}", db_path.display());

    Ok(CliContext {
        config,
        manager,
        db_path,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let matches = build_cli().get_matches();
    let ctx = load_context(&matches)?;

    match matches.subcommand() {
        Some(("init", _)) => commands::init(&ctx).await,
        Some(("status", _)) => commands::show_status(&ctx).await,
        Some(("events", sub_matches)) => commands::list_events(&ctx, sub_matches).await,
        Some(("retry", sub_matches)) => commands::retry_failed(&ctx, sub_matches).await,
        Some(("prune", _)) => commands::prune(&ctx).await,
        Some(("drain", _)) => commands::drain(&ctx).await,
        Some(("guest", sub_matches)) => match sub_matches.subcommand() {
            Some(("list", _)) => commands::list_guests(&ctx).await,
            Some(("export", args)) => commands::export_guest(&ctx, args).await,
            Some(("clear", args)) => commands::clear_guest(&ctx, args).await,
            Some(("cleanup", args)) => commands::cleanup_guests(&ctx, args).await,
            _ => anyhow::bail!("Unknown guest command"),
        },
        Some(("check", _)) => commands::check(&ctx).await,
        _ => {
            build_cli().print_help()?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        build_cli().debug_assert();
    }

    #[test]
    fn test_global_database_flag_after_subcommand() {
        let matches = build_cli()
            .try_get_matches_from(["laboursync", "status", "--database", "/tmp/x.db"])
            .unwrap();
        assert_eq!(
            matches.get_one::<String>("database").map(String::as_str),
            Some("/tmp/x.db")
        );
    }

    #[test]
    fn test_events_rejects_unknown_status() {
        let result =
            build_cli().try_get_matches_from(["laboursync", "events", "--status", "lost"]);
        assert!(result.is_err());
    }
}
