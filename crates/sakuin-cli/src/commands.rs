use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use sakuin_server::{SakuinServer, ServerConfig, StorageConfig};

use crate::cli::{Cli, Command, ConfigArgs, ServeArgs};

/// Load the configuration file if one was given, else the defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<ServerConfig> {
    match path {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => Ok(ServerConfig::default()),
    }
}

/// Apply command-line overrides on top of the file configuration.
pub fn apply_overrides(mut config: ServerConfig, args: &ServeArgs) -> ServerConfig {
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(root) = &args.data_dir {
        config.storage = StorageConfig::File { root: root.clone() };
    }
    config
}

/// Resolve the effective configuration for a command.
pub fn resolve_config(cli: &Cli) -> anyhow::Result<ServerConfig> {
    match &cli.command {
        Command::Serve(args) => Ok(apply_overrides(load_config(args.config.as_deref())?, args)),
        Command::Config(ConfigArgs { config }) => load_config(config.as_deref()),
    }
}

pub fn run_command(cli: Cli, config: ServerConfig) -> anyhow::Result<()> {
    tracing::debug!(?config, "resolved configuration");
    match cli.command {
        Command::Serve(_) => cmd_serve(config),
        Command::Config(_) => cmd_config(&config),
    }
}

fn cmd_serve(config: ServerConfig) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    runtime.block_on(async {
        let bind = config.bind_addr;
        let server = SakuinServer::new(config).context("failed to open storage")?;
        println!("{} sakuin listening on {}", "✓".green().bold(), bind.to_string().bold());
        server
            .serve_with_shutdown(async {
                // A failed signal listener should not stop the server.
                if tokio::signal::ctrl_c().await.is_err() {
                    std::future::pending::<()>().await;
                }
            })
            .await
            .context("server failed")
    })
}

fn cmd_config(config: &ServerConfig) -> anyhow::Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::path::PathBuf;

    #[test]
    fn defaults_without_file() {
        let cli = Cli::try_parse_from(["sakuin", "config"]).unwrap();
        assert_eq!(resolve_config(&cli).unwrap(), ServerConfig::default());
    }

    #[test]
    fn flags_override_file_values() {
        let cli = Cli::try_parse_from([
            "sakuin",
            "serve",
            "--bind",
            "0.0.0.0:7000",
            "--data-dir",
            "store",
        ])
        .unwrap();
        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.bind_addr.port(), 7000);
        assert_eq!(
            config.storage,
            StorageConfig::File {
                root: PathBuf::from("store")
            }
        );
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let cli = Cli::try_parse_from(["sakuin", "config", "--config", "/nonexistent/sakuin.toml"])
            .unwrap();
        let err = resolve_config(&cli).unwrap_err();
        assert!(err.to_string().contains("failed to load configuration"));
    }
}
