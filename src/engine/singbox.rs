//! sing-box applier: file swap plus reload command.

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::process::Command;

use crate::config::schema::EngineConfig;
use crate::engine::{ApplyError, ConfigApplier};

/// Writes the rendered document to the sing-box config path and runs the
/// reload command. An empty reload command only writes the file.
#[derive(Debug, Clone)]
pub struct SingBoxApplier {
    config_path: PathBuf,
    reload_command: Vec<String>,
    reload_timeout: Duration,
}

impl SingBoxApplier {
    pub fn new(config_path: impl Into<PathBuf>, reload_command: Vec<String>, reload_timeout: Duration) -> Self {
        Self {
            config_path: config_path.into(),
            reload_command,
            reload_timeout,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            &config.config_path,
            config.reload_command.clone(),
            Duration::from_secs(config.reload_timeout_secs),
        )
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    fn backup_path(&self) -> PathBuf {
        let mut path = self.config_path.clone().into_os_string();
        path.push(".backup");
        PathBuf::from(path)
    }

    async fn backup(&self) -> Option<PathBuf> {
        if fs::metadata(&self.config_path).await.is_err() {
            return None;
        }
        let backup = self.backup_path();
        match fs::copy(&self.config_path, &backup).await {
            Ok(_) => {
                tracing::debug!(backup = %backup.display(), "Created engine config backup");
                Some(backup)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to back up engine config, continuing without backup");
                None
            }
        }
    }

    async fn restore(&self, backup: Option<&Path>) {
        let Some(backup) = backup else {
            return;
        };
        match fs::copy(backup, &self.config_path).await {
            Ok(_) => {
                tracing::warn!(path = %self.config_path.display(), "Restored engine config from backup");
                if let Err(e) = self.reload().await {
                    tracing::error!(error = %e, "Reload after restoring backup failed");
                }
            }
            Err(e) => tracing::error!(error = %e, "Failed to restore engine config backup"),
        }
    }

    async fn reload(&self) -> Result<(), ApplyError> {
        let Some((program, args)) = self.reload_command.split_first() else {
            return Ok(());
        };

        let mut command = Command::new(program);
        command.args(args).kill_on_drop(true);
        let output = match tokio::time::timeout(self.reload_timeout, command.output()).await {
            Ok(result) => result.map_err(|e| ApplyError::Reload(format!("failed to run '{}': {}", program, e)))?,
            Err(_) => {
                return Err(ApplyError::Reload(format!(
                    "'{}' timed out after {}s",
                    program,
                    self.reload_timeout.as_secs()
                )))
            }
        };

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(ApplyError::Reload(format!(
                "'{}' exited with {}: {}",
                program,
                output.status,
                stderr.trim()
            )))
        }
    }
}

#[async_trait]
impl ConfigApplier for SingBoxApplier {
    async fn apply(&self, rendered: &Value) -> Result<(), ApplyError> {
        let content = serde_json::to_vec_pretty(rendered)?;
        if let Some(dir) = self.config_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await?;
        }

        let backup = self.backup().await;

        if let Err(e) = fs::write(&self.config_path, &content).await {
            self.restore(backup.as_deref()).await;
            return Err(e.into());
        }

        if let Err(e) = self.reload().await {
            tracing::error!(error = %e, "Engine reload failed, rolling back");
            self.restore(backup.as_deref()).await;
            return Err(e);
        }

        if let Some(backup) = backup {
            let _ = fs::remove_file(backup).await;
        }
        tracing::info!(path = %self.config_path.display(), "Engine configuration applied");
        Ok(())
    }
}
