use crate::models::Snapshot;
use anyhow::{Context, Result};
use chrono::{Days, NaiveDate};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

// ── Snapshot store ────────────────────────────────────────────────────────────

/// A directory of daily snapshots, one `YYYY-MM-DD.json` file per calendar
/// date. The store owns the on-disk layout; nothing else reads or writes
/// these files.
pub struct SnapshotStore {
    dir: PathBuf,
    keep_last: usize,
}

impl SnapshotStore {
    pub fn open(config: &crate::config::StorageConfig) -> Result<Self> {
        Self::at(&config.dir, config.keep_last)
    }

    pub fn at(dir: &Path, keep_last: usize) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("could not create snapshot dir {dir:?}"))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            keep_last,
        })
    }

    fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{date}.json"))
    }

    /// Write the snapshot under its date key (overwriting any earlier write
    /// for that date), then read it back and return the re-hydrated copy, so
    /// callers hold exactly what a later `load` would see.
    pub fn store(&self, snapshot: &Snapshot) -> Result<Snapshot> {
        let path = self.path_for(snapshot.date);
        let json = serde_json::to_string_pretty(snapshot).context("serializing snapshot")?;
        fs::write(&path, json).with_context(|| format!("writing snapshot {path:?}"))?;
        info!("snapshot for {} stored at {:?}", snapshot.date, path);

        self.load(snapshot.date)
            .with_context(|| format!("stored snapshot {path:?} failed to read back"))
    }

    /// `None` covers both "never stored" and "stored but unreadable"; the
    /// caller re-scrapes either way.
    pub fn load(&self, date: NaiveDate) -> Option<Snapshot> {
        let path = self.path_for(date);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                debug!("no snapshot for {date}: {e}");
                return None;
            }
        };
        match serde_json::from_str(&text) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("snapshot {path:?} is unreadable: {e}");
                None
            }
        }
    }

    /// All dates with a snapshot file, oldest first.
    pub fn list_dates(&self) -> Result<Vec<NaiveDate>> {
        let mut dates = self.dated_files()?.into_iter().map(|(d, _)| d).collect::<Vec<_>>();
        dates.sort_unstable();
        Ok(dates)
    }

    /// Retention sweep: keep the files for the `keep_last` most recent
    /// calendar dates counting back from `today`, plus the newest existing
    /// file whatever its age, and delete the rest. Returns how many files
    /// were removed.
    pub fn prune(&self, today: NaiveDate) -> Result<usize> {
        let window: HashSet<NaiveDate> = (0..self.keep_last as u64)
            .filter_map(|i| today.checked_sub_days(Days::new(i)))
            .collect();

        let dated = self.dated_files()?;
        let newest = dated.iter().map(|(date, _)| *date).max();

        let mut removed = 0;
        for (date, path) in dated {
            if window.contains(&date) || Some(date) == newest {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => {
                    info!("retention: removed snapshot {path:?}");
                    removed += 1;
                }
                Err(e) => warn!("retention: could not remove {path:?}: {e}"),
            }
        }
        Ok(removed)
    }

    /// Files in the store directory whose name is a valid `YYYY-MM-DD.json`
    /// date key. Anything else in the directory is ignored.
    fn dated_files(&self) -> Result<Vec<(NaiveDate, PathBuf)>> {
        let mut files = Vec::new();
        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("listing snapshot dir {:?}", self.dir))?;
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() || path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let Some(date) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<NaiveDate>().ok())
            else {
                continue;
            };
            files.push((date, path));
        }
        Ok(files)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Snapshot, Stock};
    use chrono::Utc;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn snapshot(on: &str) -> Snapshot {
        let mut stock = Stock::empty(1120, Utc::now().naive_utc());
        stock.name = Some("Al Rajhi Bank".into());
        stock.price = Some(80.4);
        Snapshot::assemble(date(on), vec![stock])
    }

    fn store_with_files(keep_last: usize, days: &[&str]) -> (tempfile::TempDir, SnapshotStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::at(dir.path(), keep_last).unwrap();
        for day in days {
            store.store(&snapshot(day)).unwrap();
        }
        (dir, store)
    }

    #[test]
    fn store_then_load_round_trips() {
        let (_dir, store) = store_with_files(5, &[]);
        let original = snapshot("2024-03-01");

        let stored = store.store(&original).unwrap();
        assert_eq!(stored, original);

        let loaded = store.load(date("2024-03-01")).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn store_overwrites_same_date() {
        let (_dir, store) = store_with_files(5, &["2024-03-01"]);

        let mut replacement = snapshot("2024-03-01");
        replacement.stocks[0].price = Some(81.0);
        store.store(&replacement).unwrap();

        let loaded = store.load(date("2024-03-01")).unwrap();
        assert_eq!(loaded.stocks[0].price, Some(81.0));
        assert_eq!(store.list_dates().unwrap().len(), 1);
    }

    #[test]
    fn load_missing_is_none() {
        let (_dir, store) = store_with_files(5, &[]);
        assert!(store.load(date("2024-03-01")).is_none());
    }

    #[test]
    fn load_corrupt_file_is_none() {
        let (dir, store) = store_with_files(5, &[]);
        fs::write(dir.path().join("2024-03-01.json"), "{not json").unwrap();
        assert!(store.load(date("2024-03-01")).is_none());
    }

    #[test]
    fn prune_keeps_window_and_removes_the_rest() {
        let (_dir, store) = store_with_files(
            3,
            &["2024-03-10", "2024-03-09", "2024-03-08", "2024-03-01", "2024-02-20"],
        );

        let removed = store.prune(date("2024-03-10")).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(
            store.list_dates().unwrap(),
            vec![date("2024-03-08"), date("2024-03-09"), date("2024-03-10")]
        );
    }

    #[test]
    fn prune_protects_newest_outside_window() {
        // Every file predates the window; the newest one must survive.
        let (_dir, store) = store_with_files(3, &["2024-01-05", "2024-01-02"]);

        let removed = store.prune(date("2024-03-10")).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.list_dates().unwrap(), vec![date("2024-01-05")]);
    }

    #[test]
    fn prune_ignores_unrelated_files() {
        let (dir, store) = store_with_files(3, &["2024-01-02"]);
        fs::write(dir.path().join("notes.txt"), "keep me").unwrap();
        fs::write(dir.path().join("backup.json"), "{}").unwrap();

        store.prune(date("2024-03-10")).unwrap();
        assert!(dir.path().join("notes.txt").exists());
        assert!(dir.path().join("backup.json").exists());
    }
}
