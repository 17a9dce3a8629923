use crate::history::persist;
use crate::history::{HistoryStore, SharedHistory};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::PoisonError;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HistoryOptions {
    pub path: PathBuf,
    pub capacity: usize,
    pub autosave_interval: Duration,
    pub column_width: usize,
    pub load_on_startup: bool,
}

/// Owns the shared history and the thread that periodically saves it.
///
/// The store is persisted once on start, every `autosave_interval` while the
/// service lives, and once more on [`HistoryService::shutdown`] (or drop).
pub struct HistoryService {
    store: SharedHistory,
    path: PathBuf,
    column_width: usize,
    stop: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl HistoryService {
    pub fn start(options: HistoryOptions) -> Result<Self> {
        let store = if options.load_on_startup {
            persist::load(&options.path, options.capacity)?
        } else {
            HistoryStore::with_capacity(options.capacity)
        };
        let store = store.into_shared();

        save_or_warn(&store, &options.path, options.column_width);

        let (stop, rx) = mpsc::channel::<()>();
        let worker = {
            let store = store.clone();
            let path = options.path.clone();
            let width = options.column_width;
            let interval = options.autosave_interval;
            thread::Builder::new()
                .name("history-autosave".to_string())
                .spawn(move || {
                    loop {
                        match rx.recv_timeout(interval) {
                            Err(RecvTimeoutError::Timeout) => {
                                debug!("Autosaving history to {}", path.display());
                                save_or_warn(&store, &path, width);
                            }
                            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                        }
                    }
                })
                .context("Failed to start history autosave thread")?
        };

        {
            let store = store.lock().unwrap_or_else(PoisonError::into_inner);
            info!(
                "History file: {} ({} of {} records)",
                options.path.display(),
                store.len(),
                store.capacity()
            );
        }
        Ok(Self {
            store,
            path: options.path,
            column_width: options.column_width,
            stop: Some(stop),
            worker: Some(worker),
        })
    }

    pub fn store(&self) -> SharedHistory {
        self.store.clone()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stops the autosave thread, waits for it and writes a final snapshot.
    pub fn shutdown(mut self) {
        self.stop_worker();
    }

    fn stop_worker(&mut self) {
        let Some(stop) = self.stop.take() else {
            return;
        };
        let _ = stop.send(());
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("History autosave thread panicked");
            }
        }
        save_or_warn(&self.store, &self.path, self.column_width);
    }
}

impl Drop for HistoryService {
    fn drop(&mut self) {
        self.stop_worker();
    }
}

fn save_or_warn(store: &SharedHistory, path: &Path, width: usize) {
    if let Err(err) = persist::persist(store, path, width) {
        warn!("{}", err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::persist::DEFAULT_COLUMN_WIDTH;
    use std::fs;

    fn options(name: &str, interval: Duration) -> HistoryOptions {
        HistoryOptions {
            path: std::env::temp_dir().join(format!("mysh_service_{}_{}", std::process::id(), name)),
            capacity: 500,
            autosave_interval: interval,
            column_width: DEFAULT_COLUMN_WIDTH,
            load_on_startup: false,
        }
    }

    #[test]
    fn test_start_writes_file_and_shutdown_flushes() {
        let opts = options("flush", Duration::from_secs(3600));
        let service = HistoryService::start(opts.clone()).unwrap();
        assert_eq!(fs::read_to_string(&opts.path).unwrap(), "");

        service.store().lock().unwrap().add_or_touch("echo hi", "/");
        service.shutdown();

        let content = fs::read_to_string(&opts.path).unwrap();
        assert!(content.starts_with("echo hi"));
        fs::remove_file(&opts.path).unwrap();
    }

    #[test]
    fn test_autosave_runs_periodically() {
        let opts = options("periodic", Duration::from_millis(20));
        let service = HistoryService::start(opts.clone()).unwrap();
        service.store().lock().unwrap().add_or_touch("make", "/");

        let mut saved = false;
        for _ in 0..100 {
            thread::sleep(Duration::from_millis(20));
            if fs::read_to_string(&opts.path).unwrap_or_default().contains("make") {
                saved = true;
                break;
            }
        }
        drop(service);
        assert!(saved);
        fs::remove_file(&opts.path).unwrap();
    }

    #[test]
    fn test_load_on_startup_restores_previous_session() {
        let mut opts = options("reload", Duration::from_secs(3600));
        let first = HistoryService::start(opts.clone()).unwrap();
        first.store().lock().unwrap().add_or_touch("cargo build", "/");
        first.store().lock().unwrap().add_or_touch("cargo build", "/");
        first.shutdown();

        opts.load_on_startup = true;
        let second = HistoryService::start(opts.clone()).unwrap();
        {
            let store = second.store();
            let store = store.lock().unwrap();
            assert_eq!(store.get("cargo build").unwrap().usage_count, 2);
        }
        second.shutdown();

        // Without loading, the startup save starts the file over
        opts.load_on_startup = false;
        HistoryService::start(opts.clone()).unwrap().shutdown();
        assert_eq!(fs::read_to_string(&opts.path).unwrap(), "");
        fs::remove_file(&opts.path).unwrap();
    }
}
