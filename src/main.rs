mod gateway;

use clap::{Parser, Subcommand};
use hermes_auth::AuthState;
use hermes_channels::ConnectionOutcome;
use hermes_core::config::{self, Config, HermesConfig};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "hermes", version, about = "Hermes: WhatsApp userbot")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, env = "HERMES_CONFIG", default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and run until Ctrl-C (or until the session is logged out).
    Start {
        /// Do not print pairing QR codes to the terminal.
        #[arg(long)]
        no_qr: bool,
    },
    /// Show configuration and whether a session is stored.
    Status,
    /// Delete the stored session; the next start pairs again.
    Logout,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = load_config(&cli.config, std::io::stdout)?;
    let _log_guard = init_logging(&cfg.hermes);

    match cli.command {
        Commands::Start { no_qr } => {
            println!("Hermes: starting ({})", cfg.hermes.name);
            let outcome = gateway::Gateway::new(cfg).with_terminal_qr(!no_qr).run().await?;
            if outcome == ConnectionOutcome::LoggedOut {
                anyhow::bail!(
                    "WhatsApp session was logged out and its credentials were cleared. \
                     Run `hermes start` again and scan the QR code to pair."
                );
            }
        }
        Commands::Status => status(&cli.config, &cfg).await?,
        Commands::Logout => {
            let backends = gateway::Backends::open(&cfg).await?;
            let auth = AuthState::new(backends.auth, cfg.persistence.creds_debounce());
            auth.clear().await;
            println!("Session cleared ({}).", backends.auth_location);
        }
    }

    Ok(())
}

async fn status(config_path: &str, cfg: &Config) -> anyhow::Result<()> {
    println!("Hermes status\n");
    println!("Config: {config_path}");
    println!("Data dir: {}", cfg.hermes.data_path("").display());
    println!("Persistence: {}", cfg.persistence.backend.display_name());

    let backends = gateway::Backends::open(cfg).await?;
    let auth = AuthState::new(backends.auth.clone(), cfg.persistence.creds_debounce());
    let stored = auth.has_session().await?;
    println!("  auth: {}", backends.auth_location);
    println!("  store: {}", backends.snapshot.describe());
    println!(
        "  session: {}",
        if stored { "stored" } else { "none (pairing required)" }
    );
    println!(
        "  telegram mirror: {}",
        if cfg.telegram.enabled { "enabled" } else { "disabled" }
    );
    Ok(())
}

/// Load config under a console-only subscriber, so notices and warnings
/// raised while loading are visible before `init_logging` runs.
fn load_config<W>(path: &str, writer: W) -> anyhow::Result<Config>
where
    W: for<'w> fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    let bootstrap = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(writer)
        .finish();
    let cfg = tracing::subscriber::with_default(bootstrap, || config::load(path))?;
    Ok(cfg)
}

/// Console output plus a daily-rolled, non-ANSI copy under `{data_dir}/logs`.
///
/// `RUST_LOG` overrides the configured level. The returned guard must live
/// until exit so buffered file output is flushed.
fn init_logging(cfg: &HermesConfig) -> Option<WorkerGuard> {
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log_level))
    };

    let log_dir = cfg.data_path("logs");
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        tracing_subscriber::fmt().with_env_filter(filter()).init();
        tracing::warn!("file logging disabled, cannot create {}: {e}", log_dir.display());
        return None;
    }

    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(log_dir, "hermes.log"));
    tracing_subscriber::registry()
        .with(filter())
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .init();
    Some(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_config_load_notices_reach_console() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        let captured = Captured::default();
        let writer = captured.clone();

        let cfg = load_config(missing.to_str().unwrap(), move || writer.clone()).unwrap();
        assert_eq!(cfg.hermes.name, Config::default().hermes.name);

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Config file not found"), "got: {output}");
    }
}
