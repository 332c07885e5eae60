// FILE: crates/cli/src/commands.rs

use anyhow::{bail, Context, Result};
use clap::parser::ValueSource;
use clap::ArgMatches;
use console::{style, StyledObject};
use laboursync_config::{Config, ConfigManager, NetworkSettings};
use laboursync_core::{EventStatus, GuestProfile, OutboxEvent, OutboxStats, Timestamp};
use laboursync_database::{current_version, open, optimize, verify_integrity, DatabaseConfig, DbPool};
use laboursync_network::{
    Client, ClientConfig, ConnectivityChecker, HttpRemoteService, NetworkDetector, NetworkState,
};
use laboursync_sync_engine::{
    BlockReason, DrainReport, GuestModeManager, OutboxManager, SkipReason, SyncConfig, SyncEngine,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Everything a command needs: the loaded config and where the store lives
pub struct CliContext {
    pub config: Config,
    pub manager: ConfigManager,
    pub db_path: PathBuf,
}

/// Write a default config file and create the database
pub async fn init(ctx: &CliContext) -> Result<()> {
    let created = ctx
        .manager
        .initialize()
        .context("Failed to write config file")?;

    if created {
        println!(
            "{} Wrote default config to {}",
            style("✓").green().bold(),
            ctx.manager.config_path().display()
        );
    } else {
        println!("Config already present at {}", ctx.manager.config_path().display());
    }

    connect_db(ctx).await?;
    println!(
        "{} Database ready at {} (schema version {})",
        style("✓").green().bold(),
        ctx.db_path.display(),
        current_version()
    );

    Ok(())
}

/// Show outbox statistics per status and per aggregate
pub async fn show_status(ctx: &CliContext) -> Result<()> {
    let outbox = OutboxManager::new(connect_db(ctx).await?);
    let stats = outbox.get_stats().await.context("Failed to read outbox statistics")?;

    println!("\n{}", style("Outbox").bold().cyan());
    println!("{}", "=".repeat(60));
    print_stats(&stats);

    if stats.is_drained() {
        println!("\n{} Nothing left to send", style("✓").green().bold());
    }

    let aggregates = outbox.get_aggregates().await.context("Failed to list aggregates")?;
    if aggregates.is_empty() {
        return Ok(());
    }

    println!("\n{}", style("Aggregates").bold().cyan());
    println!("{}", "=".repeat(60));
    for aggregate_id in aggregates {
        let events = outbox
            .get_events_for_aggregate(&aggregate_id)
            .await
            .with_context(|| format!("Failed to read events of {}", aggregate_id))?;
        let counts = summarize(&events);
        println!(
            "  {:<36} {} pending, {} failed, {} synced",
            truncate(&aggregate_id, 36),
            counts.pending,
            counts.failed,
            counts.synced
        );
    }

    Ok(())
}

/// List outbox events, by status or by aggregate
pub async fn list_events(ctx: &CliContext, matches: &ArgMatches) -> Result<()> {
    let status = matches
        .get_one::<String>("status")
        .map(|s| s.parse::<EventStatus>())
        .transpose()
        .map_err(anyhow::Error::msg)?
        .unwrap_or(EventStatus::Pending);
    let status_given = matches.value_source("status") == Some(ValueSource::CommandLine);

    let outbox = OutboxManager::new(connect_db(ctx).await?);
    let events = match matches.get_one::<String>("aggregate") {
        Some(aggregate_id) => {
            let events = outbox
                .get_events_for_aggregate(aggregate_id)
                .await
                .context("Failed to list events")?;
            if status_given {
                events.into_iter().filter(|e| e.status == status).collect()
            } else {
                events
            }
        }
        None => outbox
            .get_events_by_status(status)
            .await
            .context("Failed to list events")?,
    };

    if events.is_empty() {
        println!("No matching events.");
        return Ok(());
    }

    println!("\n{} Events", style(events.len()).bold().cyan());
    println!("{}", "=".repeat(80));

    for event in &events {
        print_event_summary(event);
    }

    Ok(())
}

/// Reset failed events to pending
pub async fn retry_failed(ctx: &CliContext, matches: &ArgMatches) -> Result<()> {
    let threshold = if matches.get_flag("all") {
        u32::MAX
    } else {
        ctx.config.sync.max_retries
    };

    let outbox = OutboxManager::new(connect_db(ctx).await?);
    let count = reset_failed_events(&outbox, threshold).await?;

    if count == 0 {
        println!("No failed events to retry.");
    } else {
        println!(
            "{} Reset {} failed events; run 'drain' to send them",
            style("✓").green().bold(),
            count
        );
    }

    Ok(())
}

/// Delete synced events
pub async fn prune(ctx: &CliContext) -> Result<()> {
    let outbox = OutboxManager::new(connect_db(ctx).await?);
    let removed = outbox
        .prune_synced_events()
        .await
        .context("Failed to prune outbox")?;

    println!("{} Pruned {} synced events", style("✓").green().bold(), removed);
    Ok(())
}

/// Send every pending event to the remote service
///
/// Fails if any aggregate stopped on a failed event, so scripts can tell
/// a partial drain apart from a complete one.
pub async fn drain(ctx: &CliContext) -> Result<()> {
    let pool = connect_db(ctx).await?;

    if ctx.config.guest.cleanup_on_start {
        let removed = GuestModeManager::new(pool.clone())
            .cleanup_inactive_profiles(ctx.config.guest.inactive_days)
            .await
            .context("Failed to clean up guest profiles")?;
        if removed > 0 {
            println!("Removed {} inactive guest profiles", removed);
        }
    }

    let client = build_client(&ctx.config.network)?;
    let remote = Arc::new(HttpRemoteService::new(
        client.clone(),
        ctx.config.network.base_url.clone(),
    ));
    let detector = probe_network(client, &ctx.config.network).await;

    if !detector.is_online() {
        println!(
            "{} Network unreachable; events stay queued",
            style("!").yellow().bold()
        );
        return Ok(());
    }

    let sync_config = SyncConfig::from(&ctx.config.sync);
    sync_config
        .retry_policy
        .validate()
        .context("Invalid retry settings")?;

    let engine = SyncEngine::new(pool, remote, detector, sync_config);
    let reports = engine.start().await.context("Failed to drain outbox");
    engine.stop();
    let reports = reports?;

    if reports.is_empty() {
        println!("Outbox is empty.");
        return Ok(());
    }

    let mut failed = 0;
    for report in &reports {
        print_drain_report(report);
        if report.failed.is_some() {
            failed += 1;
        }
    }

    let synced: usize = reports.iter().map(|r| r.synced.len()).sum();
    println!(
        "\n{} Synced {} events across {} aggregates",
        style("✓").green().bold(),
        synced,
        reports.len()
    );

    if failed > 0 {
        bail!("{} aggregates stopped on a failed event", failed);
    }

    Ok(())
}

/// List guest profiles
pub async fn list_guests(ctx: &CliContext) -> Result<()> {
    let guests = GuestModeManager::new(connect_db(ctx).await?);
    let profiles = guests
        .list_profiles()
        .await
        .context("Failed to list guest profiles")?;

    if profiles.is_empty() {
        println!("No guest profiles.");
        return Ok(());
    }

    println!("\n{} Guest Profiles", style(profiles.len()).bold().cyan());
    println!("{}", "=".repeat(80));

    for profile in &profiles {
        print_guest_summary(profile);
    }

    Ok(())
}

/// Export a guest profile and its events as JSON
pub async fn export_guest(ctx: &CliContext, matches: &ArgMatches) -> Result<()> {
    let guest_id = matches
        .get_one::<String>("id")
        .ok_or_else(|| anyhow::anyhow!("Guest ID is required"))?;

    let guests = GuestModeManager::new(connect_db(ctx).await?);
    let export = guests
        .export_guest_data(guest_id)
        .await
        .with_context(|| format!("Failed to export guest {}", guest_id))?;

    let json = serde_json::to_string_pretty(&export).context("Failed to serialize to JSON")?;

    match matches.get_one::<String>("output") {
        Some(output) => {
            std::fs::write(output, json).context("Failed to write export file")?;
            println!(
                "{} Exported {} events of guest {} to {}",
                style("✓").green().bold(),
                export.events.len(),
                guest_id,
                output
            );
        }
        None => println!("{}", json),
    }

    Ok(())
}

/// Delete a guest profile and everything stored for it
pub async fn clear_guest(ctx: &CliContext, matches: &ArgMatches) -> Result<()> {
    let guest_id = matches
        .get_one::<String>("id")
        .ok_or_else(|| anyhow::anyhow!("Guest ID is required"))?;
    let force = matches.get_flag("force");

    let guests = GuestModeManager::new(connect_db(ctx).await?);
    let profile = guests
        .get_profile(guest_id)
        .await
        .context("Failed to get guest profile")?;

    let Some(profile) = profile else {
        bail!("Guest profile not found: {}", guest_id);
    };

    if !force {
        println!(
            "Are you sure you want to erase guest '{}' and its unsent events? (y/N)",
            profile.guest_id
        );
        let mut input = String::new();
        std::io::stdin()
            .read_line(&mut input)
            .context("Failed to read input")?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Erase cancelled.");
            return Ok(());
        }
    }

    guests
        .clear_guest_data(guest_id)
        .await
        .context("Failed to erase guest data")?;

    println!("{} Guest erased: {}", style("✓").green().bold(), guest_id);
    Ok(())
}

/// Delete inactive guest profiles
pub async fn cleanup_guests(ctx: &CliContext, matches: &ArgMatches) -> Result<()> {
    let days = matches
        .get_one::<u32>("days")
        .copied()
        .unwrap_or(ctx.config.guest.inactive_days);

    let guests = GuestModeManager::new(connect_db(ctx).await?);
    let removed = guests
        .cleanup_inactive_profiles(days)
        .await
        .context("Failed to clean up guest profiles")?;

    println!(
        "{} Removed {} guest profiles inactive for more than {} days",
        style("✓").green().bold(),
        removed,
        days
    );
    Ok(())
}

/// Verify database integrity and probe connectivity
pub async fn check(ctx: &CliContext) -> Result<()> {
    let pool = connect_db(ctx).await?;

    verify_integrity(&pool)
        .await
        .context("Database integrity check failed")?;
    optimize(&pool).await.context("Failed to optimize database")?;
    println!(
        "{} Database OK: {} (schema version {})",
        style("✓").green().bold(),
        ctx.db_path.display(),
        current_version()
    );

    let settings = &ctx.config.network;
    if settings.probe_urls.is_empty() {
        println!("No probe URLs configured; skipping connectivity check");
        return Ok(());
    }

    let detector = probe_network(build_client(settings)?, settings).await;
    if detector.is_online() {
        println!("{} Network reachable", style("✓").green().bold());
    } else {
        println!(
            "{} None of {} probe URLs answered",
            style("✗").red().bold(),
            settings.probe_urls.len()
        );
    }

    Ok(())
}

async fn connect_db(ctx: &CliContext) -> Result<DbPool> {
    if let Some(parent) = ctx.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let storage = &ctx.config.storage;
    let config = DatabaseConfig::new(&ctx.db_path)
        .with_max_connections(storage.max_connections)
        .with_wal(storage.enable_wal)
        .with_busy_timeout(Duration::from_millis(storage.busy_timeout_ms));

    open(config).await.context("Failed to open database")
}

fn build_client(settings: &NetworkSettings) -> Result<Client> {
    let config = ClientConfig {
        timeout: Duration::from_secs(settings.request_timeout_secs),
        auth_token: settings.auth_token.clone(),
        ..Default::default()
    };
    Client::with_config(config).context("Failed to build HTTP client")
}

/// Builds a detector whose state reflects one probe round
///
/// Without probe URLs the link is assumed to be up.
async fn probe_network(client: Client, settings: &NetworkSettings) -> NetworkDetector {
    let checker = ConnectivityChecker::with_urls(client, settings.probe_urls.clone());
    let detector = NetworkDetector::with_state(checker, NetworkState::offline());

    let online = settings.probe_urls.is_empty()
        || detector
            .test_connectivity(Duration::from_millis(settings.probe_timeout_ms))
            .await;
    detector.set_online(online);
    detector
}

async fn reset_failed_events(outbox: &OutboxManager, threshold: u32) -> Result<usize> {
    let events = outbox
        .get_retriable_events(threshold)
        .await
        .context("Failed to list failed events")?;

    for event in &events {
        outbox
            .retry_event(event.id)
            .await
            .with_context(|| format!("Failed to reset event {}", event.id))?;
    }

    Ok(events.len())
}

fn summarize(events: &[OutboxEvent]) -> OutboxStats {
    let mut stats = OutboxStats::default();
    for event in events {
        match event.status {
            EventStatus::Pending => stats.pending += 1,
            EventStatus::Syncing => stats.syncing += 1,
            EventStatus::Synced => stats.synced += 1,
            EventStatus::Failed => stats.failed += 1,
        }
        if event.is_guest_event {
            stats.guest += 1;
        }
    }
    stats
}

fn print_stats(stats: &OutboxStats) {
    println!("  {:<10} {}", "Pending", style(stats.pending).yellow());
    println!("  {:<10} {}", "Syncing", style(stats.syncing).cyan());
    println!("  {:<10} {}", "Failed", style(stats.failed).red());
    println!("  {:<10} {}", "Synced", style(stats.synced).green());
    println!("  {:<10} {}", "Total", style(stats.total()).bold());
    if stats.guest > 0 {
        println!("  {:<10} {} (held until upgrade)", "Guest", stats.guest);
    }
}

fn print_event_summary(event: &OutboxEvent) {
    println!(
        "\n{} {} {}",
        style(format!("#{}", event.sequence)).bold(),
        style(&event.event_type).bold(),
        status_style(event.status)
    );
    println!(
        "  ID: {} | Aggregate: {}",
        truncate(&event.id.to_string(), 8),
        event.aggregate_id
    );
    print!(
        "  Created: {} | Retries: {}",
        format_timestamp(event.created_at),
        event.retry_count
    );
    if event.is_guest_event {
        print!("  {}", style("Guest").yellow());
    }
    println!();
    if let Some(error) = &event.last_error {
        println!("  Last error: {}", style(error).red());
    }
}

fn print_guest_summary(profile: &GuestProfile) {
    let badge = if profile.is_upgraded {
        style("upgraded").green()
    } else {
        style("guest").yellow()
    };
    println!("\n{} {}", style(&profile.guest_id).bold(), badge);
    println!(
        "  Created: {} | Last active: {} | Entities: {}",
        format_timestamp(profile.created_at),
        format_timestamp(profile.last_active_at),
        profile.entities.len()
    );
}

fn print_drain_report(report: &DrainReport) {
    let aggregate = truncate(&report.aggregate_id, 36);

    if let Some(reason) = report.skipped {
        println!("  {} {}: skipped ({})", style("-").dim(), aggregate, describe_skip(reason));
        return;
    }

    if !report.synced.is_empty() {
        println!(
            "  {} {}: {} synced",
            style("✓").green().bold(),
            aggregate,
            report.synced.len()
        );
    }

    if let Some(failed) = &report.failed {
        println!(
            "  {} {}: event #{} failed: {}",
            style("✗").red().bold(),
            aggregate,
            failed.sequence,
            failed.error
        );
    } else if let Some(reason) = report.blocked {
        println!(
            "  {} {}: stopped ({})",
            style("!").yellow().bold(),
            aggregate,
            describe_block(reason)
        );
    }
}

fn status_style(status: EventStatus) -> StyledObject<&'static str> {
    let styled = style(status.as_str());
    match status {
        EventStatus::Pending => styled.yellow(),
        EventStatus::Syncing => styled.cyan(),
        EventStatus::Synced => styled.green(),
        EventStatus::Failed => styled.red().bold(),
    }
}

fn describe_skip(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::NotRunning => "engine stopped",
        SkipReason::NotSyncable => "network unavailable",
        SkipReason::AlreadyDraining => "drain already in progress",
    }
}

fn describe_block(reason: BlockReason) -> &'static str {
    match reason {
        BlockReason::Failed => "an earlier event failed",
        BlockReason::InFlight => "an earlier event is in flight",
        BlockReason::GuestEvent => "guest events wait for an upgrade",
        BlockReason::Offline => "network lost",
        BlockReason::Stopped => "engine stopped",
    }
}

fn format_timestamp(timestamp: Timestamp) -> String {
    timestamp
        .to_datetime()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

fn truncate(s: &str, max_len: usize) -> String {
    match s.char_indices().nth(max_len) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
