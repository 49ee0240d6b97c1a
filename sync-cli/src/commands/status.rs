//! Show session status.

use anyhow::{Context, Result};
use devsync_client::{FileStateSink, OrchestratorConfig};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::{ContextStore, SESSION_FILE, SETTINGS_FILE};

/// Run the status command.
pub async fn run(data_dir: &Path) -> Result<()> {
    println!("=== devsync status ===");
    println!();

    let store = ContextStore::load(data_dir).await?;
    match store.current() {
        Some((name, data)) => {
            println!("Context:");
            println!("  Name:     {}", name);
            println!("  Endpoint: {}", data.endpoint);
            if !data.namespace.is_empty() {
                println!("  Namespace: {}", data.namespace);
            }
        }
        None => println!("Context: NONE"),
    }

    println!();

    let session_path = data_dir.join(SESSION_FILE);
    if session_path.exists() {
        let record = FileStateSink::load(&session_path).await?;
        let state = if record.phase.is_active() {
            "active"
        } else {
            "inactive"
        };
        println!("Session:");
        println!("  ID:      {}", record.session_id);
        println!("  Phase:   {} ({})", record.phase, state);
        println!("  Updated: {}", format_timestamp(record.updated_at));
    } else {
        println!("Session: NONE");
    }

    println!();

    let settings_path = data_dir.join(SETTINGS_FILE);
    let settings = OrchestratorConfig::load_or_default(&settings_path)
        .with_context(|| format!("Failed to load {}", settings_path.display()))?;
    println!("Settings:");
    println!(
        "  Probe:    every {} ms, give up after {} s",
        settings.probe.interval_ms, settings.probe.timeout_secs
    );
    println!("  Warm-up:  {} ms", settings.progress.warmup_ms);

    Ok(())
}

/// Format a Unix timestamp as a human-readable string.
fn format_timestamp(ts: u64) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let diff = now.saturating_sub(ts);

    if diff < 60 {
        "just now".to_string()
    } else if diff < 3600 {
        format!("{} minutes ago", diff / 60)
    } else if diff < 86400 {
        format!("{} hours ago", diff / 3600)
    } else {
        format!("{} days ago", diff / 86400)
    }
}
