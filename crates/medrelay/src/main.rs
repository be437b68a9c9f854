//! medrelay: `WebSocket` relay for medication schedules and dose logs.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use medrelay_server::{RelayServer, ServerConfig};
use medrelay_store::{ConnectionConfig, SqliteStore, new_file, run_migrations};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "medrelay", version, about = "Medication schedule relay server")]
struct Cli {
    /// Host to bind.
    #[arg(long)]
    host: Option<String>,

    /// Port to bind.
    #[arg(long)]
    port: Option<u16>,

    /// Path to the SQLite database file.
    #[arg(long)]
    db_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    run(Cli::parse()).await
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Precedence: CLI flag, then MEDRELAY_* env, then defaults
    let mut config = ServerConfig {
        host: "0.0.0.0".into(),
        port: 8080,
        ..ServerConfig::default()
    };
    config.apply_env_overrides();
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    let db_path = cli
        .db_path
        .or_else(|| std::env::var_os("MEDRELAY_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path);
    let store = open_store(&db_path)
        .with_context(|| format!("failed to open store at {}", db_path.display()))?;

    let server = RelayServer::new(config, store);
    let (addr, handle) = server.listen().await.context("failed to bind listener")?;
    info!(%addr, "medrelay up");

    tokio::signal::ctrl_c()
        .await
        .context("failed to install ctrl-c handler")?;
    info!("shutdown signal received");
    server.shutdown().shutdown();
    let _ = handle.await;
    info!("bye");
    Ok(())
}

fn open_store(db_path: &std::path::Path) -> anyhow::Result<Arc<SqliteStore>> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }
    let path = db_path.to_str().context("database path is not valid UTF-8")?;
    let pool = new_file(path, &ConnectionConfig::default())?;
    let conn = pool.get()?;
    let version = run_migrations(&conn)?;
    info!(version, db = %db_path.display(), "database ready");
    drop(conn);
    Ok(Arc::new(SqliteStore::new(pool)))
}

fn default_db_path() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .map_or_else(
            || PathBuf::from("medrelay.db"),
            |home| home.join(".medrelay").join("medrelay.db"),
        )
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_to_none() {
        let cli = Cli::parse_from(["medrelay"]);
        assert!(cli.host.is_none());
        assert!(cli.port.is_none());
        assert!(cli.db_path.is_none());
    }

    #[test]
    fn cli_parses_all_flags() {
        let cli = Cli::parse_from([
            "medrelay",
            "--host",
            "127.0.0.1",
            "--port",
            "9000",
            "--db-path",
            "/tmp/test.db",
        ]);
        assert_eq!(cli.host.as_deref(), Some("127.0.0.1"));
        assert_eq!(cli.port, Some(9000));
        assert_eq!(cli.db_path, Some(PathBuf::from("/tmp/test.db")));
    }

    #[test]
    fn cli_rejects_bad_port() {
        assert!(Cli::try_parse_from(["medrelay", "--port", "junk"]).is_err());
    }

    #[test]
    fn default_path_lands_under_home() {
        let path = default_db_path();
        assert!(path.ends_with("medrelay.db"));
    }
}
