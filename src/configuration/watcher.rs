use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::command::{self, server};
use crate::configuration::{Configuration, ServerTlsConfig};

/// Reloads the listener when the configuration file or one of the TLS files it points to changes.
pub struct ConfigWatcher {
    _handle: tokio::task::JoinHandle<()>,
}

impl ConfigWatcher {
    pub fn new(config_path: &str, server: Arc<server::Command>) -> Result<Self, command::Error> {
        info!("Setting up config watcher for: {config_path}");

        let config_file_path = std::fs::canonicalize(PathBuf::from(config_path))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = watch_config_loop(config_file_path, server).await {
                error!("Config watcher failed: {e}");
            }
        });

        Ok(Self { _handle: handle })
    }
}

fn get_tls_paths(tls_config: &ServerTlsConfig, config_dir: &Path) -> HashSet<PathBuf> {
    [
        Some(&tls_config.server_certificate_bundle),
        Some(&tls_config.server_private_key),
        tls_config.client_ca_bundle.as_ref(),
    ]
    .into_iter()
    .flatten()
    .chain(&tls_config.client_crl)
    .filter_map(|path_str| {
        let path = Path::new(path_str);
        let resolved = if path.is_absolute() {
            path.to_path_buf()
        } else {
            config_dir.join(path)
        };
        resolved.canonicalize().ok()
    })
    .collect()
}

async fn watch_config_loop(
    config_path: PathBuf,
    server: Arc<server::Command>,
) -> Result<(), command::Error> {
    let (tx, mut rx) = mpsc::channel::<Event>(100);
    let config_dir = config_path
        .parent()
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

    loop {
        let tx_clone = tx.clone();
        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            if let Ok(event) = res {
                let _ = tx_clone.blocking_send(event);
            }
        })?;

        watcher.watch(&config_path, RecursiveMode::NonRecursive)?;

        let current_config = Configuration::load(&config_path)?;
        let watched_tls_paths = get_tls_paths(&current_config.server.tls, &config_dir);
        for path in &watched_tls_paths {
            watcher.watch(path, RecursiveMode::NonRecursive)?;
            info!("Watching TLS file: {}", path.display());
        }

        let mut should_restart_watcher = false;

        while !should_restart_watcher {
            match rx.recv().await {
                Some(event)
                    if matches!(
                        event.kind,
                        EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any)
                    ) =>
                {
                    if event.paths.iter().any(|p| p == &config_path) {
                        info!("Configuration file changed, reloading");

                        let new_config = match Configuration::load(&config_path) {
                            Ok(config) => config,
                            Err(e) => {
                                error!("Failed to reload configuration: {e}");
                                continue;
                            }
                        };

                        if get_tls_paths(&new_config.server.tls, &config_dir) != watched_tls_paths
                        {
                            info!("TLS file paths changed, recreating watchers");
                            should_restart_watcher = true;
                        }

                        reload_full_config(&server, &new_config);
                    } else if event.paths.iter().any(|p| watched_tls_paths.contains(p)) {
                        info!("TLS material changed, reloading");
                        reload_tls_only(&server, &config_path);
                    }
                }
                None => {
                    error!("Config watcher channel closed");
                    return Ok(());
                }
                _ => {}
            }
        }

        drop(watcher);
    }
}

fn reload_full_config(server: &server::Command, config: &Configuration) {
    if let Err(e) = server.notify_config_change(config) {
        error!("Failed to notify server of configuration change: {e}");
    } else {
        info!("Configuration reloaded");
    }
}

fn reload_tls_only(server: &server::Command, config_path: &Path) {
    let config = match Configuration::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to reload configuration: {e}");
            return;
        }
    };

    match server.notify_tls_config_change(&config.server.tls) {
        Ok(()) => info!("TLS configuration reloaded"),
        Err(e) => error!("Failed to reload TLS configuration: {e}"),
    }
}
