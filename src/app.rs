//! Main application orchestration and execution

use crate::{
    cli::{Cli, RunMode},
    client::{DownloadEndpoint, HttpEndpoints, HttpTransport},
    config::{display_config_summary, load_config, validate_config, EnvManager},
    error::{AppError, Result},
    executor::{ProbeScheduler, SessionObserver},
    logging::LoggerFactory,
    models::{Config, ProbeConfig},
    output::{ConsoleProgress, OutputCoordinator, ShareCard},
    servers::ServerCatalog,
};
use std::path::Path;
use std::sync::Arc;

/// Endpoints a probe run talks to plus the server name shown in results
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub server: Option<String>,
    pub endpoints: HttpEndpoints,
}

/// Pick endpoints from the selected server and apply URL overrides
///
/// An unknown server name is only accepted when both URLs are overridden.
/// A download override is treated as a sized endpoint and also serves as the
/// latency probe target.
pub fn resolve_target(config: &Config, catalog: &ServerCatalog) -> Result<ResolvedTarget> {
    let server = catalog.find(&config.server);

    let (mut endpoints, mut name) = match (server, &config.download_url, &config.upload_url) {
        (Some(server), _, _) => (server.endpoints()?, Some(server.name.clone())),
        (None, Some(download), Some(upload)) => (HttpEndpoints::sized(download, upload)?, None),
        (None, _, _) => {
            return Err(catalog
                .get(&config.server)
                .err()
                .unwrap_or_else(|| AppError::config(format!("Unknown server '{}'", config.server))));
        }
    };

    if let Some(download) = &config.download_url {
        endpoints.download = DownloadEndpoint::Sized(download.clone());
        endpoints.ping_url = endpoints.download.request_url(0)?.to_string();
        name = None;
    }
    if let Some(upload) = &config.upload_url {
        endpoints.upload_url = upload.clone();
    }

    Ok(ResolvedTarget { server: name, endpoints })
}

/// Main application struct that coordinates all components
pub struct App {
    cli: Cli,
}

impl App {
    pub fn new(cli: Cli) -> Result<Self> {
        cli.validate().map_err(AppError::validation)?;
        Ok(Self { cli })
    }

    /// Run the application
    pub async fn run(self) -> Result<()> {
        match self.cli.run_mode() {
            RunMode::WriteEnvExample(path) => Self::write_env_example(&path),
            RunMode::ListServers => {
                let config = self.load_checked_config()?;
                self.list_servers(&config).await
            }
            RunMode::Probe => {
                let config = self.load_checked_config()?;
                self.probe(&config).await
            }
        }
    }

    fn write_env_example(path: &Path) -> Result<()> {
        EnvManager::save_example_env_file(path)?;
        println!("Example configuration written to {}", path.display());
        Ok(())
    }

    fn load_checked_config(&self) -> Result<Config> {
        let config = load_config(self.cli.clone())?;
        let warnings = validate_config(&config)?;

        if config.debug {
            eprintln!(
                "{} v{} ({} {}, built {})",
                crate::PKG_NAME,
                crate::VERSION,
                crate::GIT_COMMIT,
                crate::TARGET_TRIPLE,
                crate::BUILD_TIME
            );
            eprintln!("{}", display_config_summary(&config));
        }
        for warning in &warnings {
            eprintln!("{}", warning.format(config.enable_color));
        }

        Ok(config)
    }

    async fn list_servers(&self, config: &Config) -> Result<()> {
        let catalog = ServerCatalog::builtin();
        let target = resolve_target(&Config::default(), &catalog)?;
        let transport = HttpTransport::new(target.endpoints, config.timeout())?;

        let ranking = catalog.rank(&transport, crate::defaults::SERVER_PING_TIMEOUT).await;

        if self.cli.json {
            let json = serde_json::to_string_pretty(&ranking)
                .map_err(|e| AppError::parse(format!("Failed to serialize server ranking: {}", e)))?;
            println!("{}", json);
        } else {
            let coordinator = OutputCoordinator::from_config(config);
            println!("{}", coordinator.display_server_ranking(&ranking)?);
        }

        Ok(())
    }

    async fn probe(&self, config: &Config) -> Result<()> {
        let target = resolve_target(config, &ServerCatalog::builtin())?;
        let transport = HttpTransport::new(target.endpoints, config.timeout())?;

        let mut scheduler = ProbeScheduler::new(Arc::new(transport)).with_loggers(LoggerFactory::new(config.clone()));
        if !self.cli.json {
            let progress: Arc<dyn SessionObserver> = Arc::new(ConsoleProgress::stderr(config.enable_color));
            scheduler = scheduler.with_observer(progress);
        }
        let scheduler = Arc::new(scheduler);

        let interrupt = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    scheduler.cancel();
                    eprintln!("Cancelling, press Ctrl-C again to quit immediately");
                    if tokio::signal::ctrl_c().await.is_ok() {
                        std::process::exit(AppError::cancelled("interrupted twice").exit_code());
                    }
                }
            })
        };
        let outcome = scheduler.run_session(ProbeConfig::from(config)).await;
        interrupt.abort();

        let mut result = outcome?;
        if let Some(server) = target.server {
            result = result.with_server(server);
        }

        if self.cli.json {
            println!("{}", OutputCoordinator::to_json(&result)?);
        } else {
            let coordinator = OutputCoordinator::from_config(config);
            println!("{}", coordinator.display_results(&result).await?);
        }

        if let Some(path) = &self.cli.share_card {
            ShareCard::from_result(&result).write(path)?;
            if !self.cli.json {
                eprintln!("Share card written to {}", path.display());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn config_with(server: &str, download: Option<&str>, upload: Option<&str>) -> Config {
        Config {
            server: server.to_string(),
            download_url: download.map(str::to_string),
            upload_url: upload.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_default_server() {
        let target = resolve_target(&Config::default(), &ServerCatalog::builtin()).unwrap();
        assert_eq!(target.server.as_deref(), Some("Cloudflare"));
        assert_eq!(target.endpoints.upload_url, crate::defaults::DEFAULT_UPLOAD_URL);
        assert!(target.endpoints.ping_url.ends_with("bytes=0"));
    }

    #[test]
    fn test_resolve_download_only_server_borrows_upload() {
        let target = resolve_target(&config_with("hetzner", None, None), &ServerCatalog::builtin()).unwrap();
        assert_eq!(target.server.as_deref(), Some("Hetzner"));
        assert!(matches!(target.endpoints.download, DownloadEndpoint::Fixed(_)));
        assert_eq!(target.endpoints.upload_url, crate::defaults::DEFAULT_UPLOAD_URL);
    }

    #[test]
    fn test_resolve_overrides() {
        let config = config_with(
            "Cloudflare",
            Some("http://127.0.0.1:8080/down"),
            Some("http://127.0.0.1:8080/up"),
        );
        let target = resolve_target(&config, &ServerCatalog::builtin()).unwrap();
        assert_eq!(target.server, None);
        assert_eq!(target.endpoints.ping_url, "http://127.0.0.1:8080/down?bytes=0");
        assert_eq!(target.endpoints.upload_url, "http://127.0.0.1:8080/up");
    }

    #[test]
    fn test_unknown_server_with_both_overrides() {
        let config = config_with("lab", Some("http://10.0.0.2/down"), Some("http://10.0.0.2/up"));
        assert!(resolve_target(&config, &ServerCatalog::builtin()).is_ok());
    }

    #[test]
    fn test_unknown_server_without_overrides() {
        let err = resolve_target(&config_with("lab", None, None), &ServerCatalog::builtin()).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_app_rejects_conflicting_flags() {
        let cli = Cli::parse_from(["speedprobe", "--color", "--no-color"]);
        assert!(App::new(cli).is_err());
    }
}
