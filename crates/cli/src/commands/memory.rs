//! Memory command handler.
//!
//! Shows or updates the default conversation memory settings.

use clap::Args;
use docqa_core::{config::AppConfig, AppResult};
use docqa_rag::{MemoryWindow, WindowSize};

/// Show or change conversation memory settings
#[derive(Args, Debug)]
pub struct MemoryCommand {
    /// Exchanges kept in memory (2, 5, 10 or 20)
    #[arg(long)]
    pub window: Option<usize>,

    /// Feed conversation history back into prompts
    #[arg(long)]
    pub enabled: Option<bool>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl MemoryCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing memory command");

        let mut updated = config.clone();
        if let Some(window) = self.window {
            WindowSize::try_from(window)?;
            updated.memory.window_size = window;
        }
        if let Some(enabled) = self.enabled {
            updated.memory.enabled = enabled;
        }

        let saved_to = if updated.memory != config.memory {
            let path = updated.save_memory_settings()?;
            tracing::info!(path = ?path, "Saved memory settings");
            Some(path)
        } else {
            None
        };

        let stats = MemoryWindow::from_settings(&updated.memory)?.stats();

        if self.json {
            let output = serde_json::json!({
                "enabled": stats.enabled,
                "windowSize": stats.window_size,
                "maxMessages": stats.window_size * 2,
                "savedTo": saved_to,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!(
                "Memory {} with a window of {} exchanges ({} messages)",
                if stats.enabled { "enabled" } else { "disabled" },
                stats.window_size,
                stats.window_size * 2
            );
            if let Some(path) = saved_to {
                println!("Saved to {}", path.display());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_core::AppError;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> AppConfig {
        AppConfig {
            workspace: dir.path().to_path_buf(),
            ..AppConfig::default()
        }
    }

    #[tokio::test]
    async fn test_memory_settings_are_persisted() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_in(&temp_dir);
        let cmd = MemoryCommand {
            window: Some(10),
            enabled: Some(false),
            json: true,
        };

        cmd.execute(&config).await.unwrap();

        let saved = std::fs::read_to_string(config.config_path()).unwrap();
        assert!(saved.contains("windowSize: 10"));
        assert!(saved.contains("enabled: false"));
    }

    #[tokio::test]
    async fn test_invalid_window_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_in(&temp_dir);
        let cmd = MemoryCommand {
            window: Some(7),
            enabled: None,
            json: false,
        };

        assert!(matches!(cmd.execute(&config).await, Err(AppError::Config(_))));
        assert!(!config.config_path().exists());
    }

    #[tokio::test]
    async fn test_unchanged_settings_are_not_written() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_in(&temp_dir);
        let cmd = MemoryCommand {
            window: None,
            enabled: None,
            json: false,
        };

        cmd.execute(&config).await.unwrap();
        assert!(!config.config_path().exists());
    }
}
