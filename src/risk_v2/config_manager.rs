// =============================================================================
// Config manager — one JSON file per risk-v2 module, hot-reloaded on a poll
// =============================================================================
//
// Mirrors `crate::config`'s atomic tmp + rename save. Each `save` also writes
// a timestamped snapshot alongside the live file so a bad reload can be
// rolled back by hand.
// =============================================================================

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::time::interval;
use tracing::{info, warn};

pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

pub struct ModuleConfigManager {
    dir: PathBuf,
}

impl ModuleConfigManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, module: &str) -> PathBuf {
        self.dir.join(format!("{module}.json"))
    }

    pub fn load<T: DeserializeOwned + Default>(&self, module: &str) -> Result<T> {
        let path = self.path_for(module);
        if !path.exists() {
            return Ok(T::default());
        }
        let data = std::fs::read_to_string(&path)
            .with_context(|| format!("reading risk-v2 config {}", path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("parsing risk-v2 config {}", path.display()))
    }

    pub fn save<T: Serialize>(&self, module: &str, value: &T) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating risk-v2 config dir {}", self.dir.display()))?;

        let path = self.path_for(module);
        let json = serde_json::to_string_pretty(value)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)
            .with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("renaming into place {}", path.display()))?;

        let snapshot = self
            .dir
            .join(format!("{module}.{}.snapshot.json", Utc::now().format("%Y%m%dT%H%M%S")));
        std::fs::write(&snapshot, &json)
            .with_context(|| format!("writing snapshot {}", snapshot.display()))?;

        info!(module, path = %path.display(), "risk-v2 module config saved");
        Ok(())
    }

    pub fn restore_snapshot(&self, snapshot_path: &Path) -> Result<()> {
        let module = snapshot_path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.split('.').next())
            .context("malformed snapshot filename")?;
        let data = std::fs::read_to_string(snapshot_path)
            .with_context(|| format!("reading snapshot {}", snapshot_path.display()))?;
        let path = self.path_for(module);
        std::fs::write(&path, data)
            .with_context(|| format!("restoring {}", path.display()))?;
        warn!(module, snapshot = %snapshot_path.display(), "risk-v2 module config restored from snapshot");
        Ok(())
    }

    fn file_mtime(&self, module: &str) -> Option<SystemTime> {
        std::fs::metadata(self.path_for(module))
            .and_then(|m| m.modified())
            .ok()
    }

    fn append_change_log(&self, module: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating risk-v2 config dir {}", self.dir.display()))?;
        let log_path = self.dir.join("config_changes.log");
        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("opening {}", log_path.display()))?;
        writeln!(f, "{} module={module} reloaded", Utc::now().to_rfc3339())
            .with_context(|| format!("writing {}", log_path.display()))?;
        Ok(())
    }

    /// Spawn a background poll loop watching `{module}.json`'s mtime every
    /// [`POLL_INTERVAL`]. On change, parses the file and hands the value to
    /// `on_reload`, then appends a line to `config_changes.log`. Intended for
    /// `tokio::spawn`; runs until the task is aborted.
    pub async fn poll_loop<T, F>(&self, module: &'static str, mut on_reload: F)
    where
        T: DeserializeOwned + Default,
        F: FnMut(T) + Send,
    {
        let mut last_mtime = self.file_mtime(module);
        let mut ticker = interval(POLL_INTERVAL);
        loop {
            ticker.tick().await;
            let mtime = self.file_mtime(module);
            if mtime.is_none() || mtime == last_mtime {
                continue;
            }
            last_mtime = mtime;

            match self.load::<T>(module) {
                Ok(value) => {
                    info!(module, "risk-v2 config change detected, reloading");
                    if let Err(e) = self.append_change_log(module) {
                        warn!(module, error = %e, "failed to append config change log");
                    }
                    on_reload(value);
                }
                Err(e) => {
                    warn!(module, error = %e, "risk-v2 config reload failed to parse, keeping previous value");
                }
            }
        }
    }
}
