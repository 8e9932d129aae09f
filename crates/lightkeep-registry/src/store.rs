//! RegistryStore — exclusive-lock CRUD over one JSON file.
//!
//! Every operation runs its whole read-parse-mutate-rewrite cycle under a
//! single process-wide mutex, so concurrent callers (HTTP handlers and the
//! background sweep) never interleave mid-operation. Writes go to a temp
//! file which is fsynced and renamed over the target, so a crash mid-write
//! cannot leave a half-written document behind.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::error::{RegistryError, RegistryResult};
use crate::types::*;

/// Thread-safe registry store backed by a JSON file.
#[derive(Clone)]
pub struct RegistryStore {
    inner: Arc<Inner>,
}

struct Inner {
    path: PathBuf,
    /// Guards the full read-modify-write cycle of every operation. The
    /// guarded value is the highest id issued by this store instance, so
    /// ids stay monotonic even after the record with the max id is deleted.
    lock: Mutex<ServiceId>,
}

impl RegistryStore {
    /// Open a store backed by the given file, creating the file (and its
    /// parent directory) when absent.
    pub fn open(path: impl Into<PathBuf>) -> RegistryResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(RegistryError::Write)?;
            }
        }
        let store = Self {
            inner: Arc::new(Inner {
                path,
                lock: Mutex::new(0),
            }),
        };
        {
            let _guard = store.lock();
            if !store.inner.path.exists() {
                store.write_document(&RegistryDocument::default())?;
            }
        }
        debug!(path = ?store.inner.path, "registry store opened");
        Ok(store)
    }

    /// All records in insertion order. Sorting by `display_order` is a
    /// presentation concern, not a store invariant.
    pub fn list(&self) -> RegistryResult<Vec<ServiceRecord>> {
        let _guard = self.lock();
        Ok(self.read_document()?.services)
    }

    /// The record with that id, if any.
    pub fn find(&self, id: ServiceId) -> RegistryResult<Option<ServiceRecord>> {
        let _guard = self.lock();
        Ok(self
            .read_document()?
            .services
            .into_iter()
            .find(|s| s.id == id))
    }

    /// Create a record and return its id.
    ///
    /// Assigns the next id and appends at the end of the display order;
    /// `status` starts as `unknown` until the first probe writes it.
    pub fn create(&self, data: NewService) -> RegistryResult<ServiceId> {
        let mut issued = self.lock();
        let mut doc = self.read_document()?;
        let max_id = doc.services.iter().map(|s| s.id).max().unwrap_or(0);
        let id = max_id.max(*issued) + 1;
        let max_order = doc
            .services
            .iter()
            .map(|s| s.display_order)
            .max()
            .unwrap_or(0);
        let now = now_stamp();
        doc.services.push(ServiceRecord {
            id,
            name: data.name,
            url: data.url,
            health_check_url: data.health_check_url,
            address: data.address,
            port: data.port,
            display_order: max_order + 1,
            status: HealthStatus::Unknown,
            last_checked: now.clone(),
            created_at: now.clone(),
            updated_at: now,
        });
        self.write_document(&doc)?;
        *issued = id;
        debug!(id, "service created");
        Ok(id)
    }

    /// Apply a partial update. Returns whether the id existed.
    pub fn update(&self, id: ServiceId, patch: ServiceUpdate) -> RegistryResult<bool> {
        let _guard = self.lock();
        let mut doc = self.read_document()?;
        let Some(record) = doc.services.iter_mut().find(|s| s.id == id) else {
            return Ok(false);
        };
        if let Some(name) = patch.name {
            record.name = name;
        }
        if let Some(url) = patch.url {
            record.url = Some(url);
        }
        // Only `health_check_url` is clearable: an explicit null or empty
        // string removes the override, an absent key leaves it untouched.
        if let Some(value) = patch.health_check_url {
            record.health_check_url = value.filter(|v| !v.trim().is_empty());
        }
        if let Some(address) = patch.address {
            record.address = Some(address);
        }
        if let Some(port) = patch.port {
            record.port = Some(port);
        }
        record.updated_at = now_stamp();
        self.write_document(&doc)?;
        debug!(id, "service updated");
        Ok(true)
    }

    /// Remove a record. Returns whether a removal occurred.
    pub fn delete(&self, id: ServiceId) -> RegistryResult<bool> {
        let _guard = self.lock();
        let mut doc = self.read_document()?;
        let before = doc.services.len();
        doc.services.retain(|s| s.id != id);
        if doc.services.len() == before {
            return Ok(false);
        }
        self.write_document(&doc)?;
        debug!(id, "service deleted");
        Ok(true)
    }

    /// Record a probe result. Returns whether the id existed.
    pub fn update_health(&self, id: ServiceId, status: HealthStatus) -> RegistryResult<bool> {
        let _guard = self.lock();
        let mut doc = self.read_document()?;
        let Some(record) = doc.services.iter_mut().find(|s| s.id == id) else {
            return Ok(false);
        };
        record.status = status;
        record.last_checked = now_stamp();
        self.write_document(&doc)?;
        Ok(true)
    }

    /// Apply a batch of `(id, display_order)` mappings in one operation.
    ///
    /// Unmatched ids are ignored; records whose order actually changes get
    /// a fresh `updated_at`; everything else keeps its prior order.
    pub fn reorder(&self, entries: &[ReorderEntry]) -> RegistryResult<()> {
        let _guard = self.lock();
        let mut doc = self.read_document()?;
        let mut changed = false;
        for entry in entries {
            if let Some(record) = doc.services.iter_mut().find(|s| s.id == entry.id) {
                if record.display_order != entry.display_order {
                    record.display_order = entry.display_order;
                    record.updated_at = now_stamp();
                    changed = true;
                }
            }
        }
        if changed {
            self.write_document(&doc)?;
        }
        debug!(entries = entries.len(), changed, "services reordered");
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, ServiceId> {
        self.inner.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read and parse the backing file. An absent or empty file is an empty
    /// registry; unparseable content is logged and treated as empty for
    /// this read, leaving the on-disk bytes alone until the next write.
    fn read_document(&self) -> RegistryResult<RegistryDocument> {
        let raw = match fs::read_to_string(&self.inner.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(RegistryDocument::default());
            }
            Err(e) => return Err(RegistryError::Read(e)),
        };
        if raw.trim().is_empty() {
            return Ok(RegistryDocument::default());
        }
        match serde_json::from_str(&raw) {
            Ok(doc) => Ok(doc),
            Err(e) => {
                warn!(path = ?self.inner.path, error = %e, "registry file is not valid JSON, treating as empty");
                Ok(RegistryDocument::default())
            }
        }
    }

    /// Serialize the whole document and atomically replace the file
    /// (write temp, fsync, rename).
    fn write_document(&self, doc: &RegistryDocument) -> RegistryResult<()> {
        let body = serde_json::to_string_pretty(doc).map_err(RegistryError::Serialize)?;
        let tmp = self.inner.path.with_extension("tmp");
        let mut file = fs::File::create(&tmp).map_err(RegistryError::Write)?;
        file.write_all(body.as_bytes()).map_err(RegistryError::Write)?;
        file.sync_all().map_err(RegistryError::Write)?;
        drop(file);
        fs::rename(&tmp, &self.inner.path).map_err(RegistryError::Write)?;
        Ok(())
    }
}

fn now_stamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> (tempfile::TempDir, RegistryStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = RegistryStore::open(dir.path().join("services.json")).unwrap();
        (dir, store)
    }

    fn named(name: &str) -> NewService {
        NewService {
            name: name.to_string(),
            ..Default::default()
        }
    }

    // ── Creation ───────────────────────────────────────────────────

    #[test]
    fn open_creates_empty_registry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("services.json");
        let store = RegistryStore::open(&path).unwrap();

        assert!(path.exists());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn create_assigns_sequential_ids_and_orders() {
        let (_dir, store) = test_store();

        assert_eq!(store.create(named("a")).unwrap(), 1);
        assert_eq!(store.create(named("b")).unwrap(), 2);
        assert_eq!(store.create(named("c")).unwrap(), 3);

        let services = store.list().unwrap();
        let orders: Vec<u32> = services.iter().map(|s| s.display_order).collect();
        assert_eq!(orders, vec![1, 2, 3]);
    }

    #[test]
    fn create_defaults_status_and_timestamps() {
        let (_dir, store) = test_store();
        let id = store
            .create(NewService {
                name: "Router".to_string(),
                url: Some("http://192.168.0.1".to_string()),
                ..Default::default()
            })
            .unwrap();

        let record = store.find(id).unwrap().unwrap();
        assert_eq!(record.status, HealthStatus::Unknown);
        assert!(!record.created_at.is_empty());
        assert_eq!(record.created_at, record.updated_at);
        assert_eq!(record.url.as_deref(), Some("http://192.168.0.1"));
        assert_eq!(record.health_check_url, None);
    }

    #[test]
    fn create_preserves_legacy_fields_as_given() {
        let (_dir, store) = test_store();
        let id = store
            .create(NewService {
                name: "Plex".to_string(),
                address: Some("192.168.0.30".to_string()),
                port: Some(32400),
                ..Default::default()
            })
            .unwrap();

        let record = store.find(id).unwrap().unwrap();
        assert_eq!(record.address.as_deref(), Some("192.168.0.30"));
        assert_eq!(record.port, Some(32400));
        assert_eq!(record.url, None);
    }

    #[test]
    fn ids_are_not_reused_after_deleting_the_max() {
        let (_dir, store) = test_store();
        store.create(named("a")).unwrap();
        let b = store.create(named("b")).unwrap();
        assert_eq!(b, 2);

        assert!(store.delete(b).unwrap());
        // max(existing) is 1 again, but id 2 was already issued.
        assert_eq!(store.create(named("c")).unwrap(), 3);
    }

    // ── Lookup ─────────────────────────────────────────────────────

    #[test]
    fn find_missing_returns_none() {
        let (_dir, store) = test_store();
        assert!(store.find(42).unwrap().is_none());
    }

    #[test]
    fn list_keeps_insertion_order() {
        let (_dir, store) = test_store();
        store.create(named("first")).unwrap();
        store.create(named("second")).unwrap();

        let names: Vec<String> = store.list().unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    // ── Updates ────────────────────────────────────────────────────

    #[test]
    fn partial_update_leaves_untouched_fields() {
        let (_dir, store) = test_store();
        let id = store
            .create(NewService {
                name: "old".to_string(),
                url: Some("http://b".to_string()),
                ..Default::default()
            })
            .unwrap();

        let applied = store
            .update(
                id,
                ServiceUpdate {
                    name: Some("new".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(applied);

        let record = store.find(id).unwrap().unwrap();
        assert_eq!(record.name, "new");
        assert_eq!(record.url.as_deref(), Some("http://b"));
        assert_eq!(record.status, HealthStatus::Unknown);
        assert_eq!(record.display_order, 1);
    }

    #[test]
    fn update_missing_returns_false() {
        let (_dir, store) = test_store();
        let applied = store
            .update(
                9,
                ServiceUpdate {
                    name: Some("x".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(!applied);
    }

    #[test]
    fn health_check_url_clears_on_explicit_null() {
        let (_dir, store) = test_store();
        let id = store
            .create(NewService {
                name: "svc".to_string(),
                health_check_url: Some("http://a/health".to_string()),
                ..Default::default()
            })
            .unwrap();

        // Absent key: untouched.
        store.update(id, ServiceUpdate::default()).unwrap();
        let record = store.find(id).unwrap().unwrap();
        assert_eq!(record.health_check_url.as_deref(), Some("http://a/health"));

        // Explicit null: cleared.
        store
            .update(
                id,
                ServiceUpdate {
                    health_check_url: Some(None),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(store.find(id).unwrap().unwrap().health_check_url, None);
    }

    #[test]
    fn health_check_url_clears_on_empty_string() {
        let (_dir, store) = test_store();
        let id = store
            .create(NewService {
                name: "svc".to_string(),
                health_check_url: Some("http://a/health".to_string()),
                ..Default::default()
            })
            .unwrap();

        store
            .update(
                id,
                ServiceUpdate {
                    health_check_url: Some(Some(String::new())),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(store.find(id).unwrap().unwrap().health_check_url, None);
    }

    // ── Deletion ───────────────────────────────────────────────────

    #[test]
    fn delete_reports_whether_a_removal_occurred() {
        let (_dir, store) = test_store();
        let id = store.create(named("gone")).unwrap();

        assert!(store.delete(id).unwrap());
        assert!(!store.delete(id).unwrap());
        assert!(store.find(id).unwrap().is_none());
    }

    // ── Health writes ──────────────────────────────────────────────

    #[test]
    fn update_health_sets_status_and_last_checked() {
        let (_dir, store) = test_store();
        let id = store.create(named("svc")).unwrap();

        assert!(store.update_health(id, HealthStatus::Unhealthy).unwrap());
        let record = store.find(id).unwrap().unwrap();
        assert_eq!(record.status, HealthStatus::Unhealthy);
        assert!(!record.last_checked.is_empty());

        assert!(!store.update_health(99, HealthStatus::Healthy).unwrap());
    }

    // ── Reorder ────────────────────────────────────────────────────

    #[test]
    fn reorder_applies_batch_and_ignores_unmatched() {
        let (_dir, store) = test_store();
        let a = store.create(named("a")).unwrap();
        let b = store.create(named("b")).unwrap();
        let c = store.create(named("c")).unwrap();

        store
            .reorder(&[
                ReorderEntry {
                    id: c,
                    display_order: 0,
                },
                ReorderEntry {
                    id: a,
                    display_order: 1,
                },
                ReorderEntry {
                    id: 999,
                    display_order: 7,
                },
            ])
            .unwrap();

        let services = store.list().unwrap();
        let order_of = |id| {
            services
                .iter()
                .find(|s| s.id == id)
                .unwrap()
                .display_order
        };
        assert_eq!(order_of(c), 0);
        assert_eq!(order_of(a), 1);
        // Unlisted record keeps its prior order.
        assert_eq!(order_of(b), 2);
    }

    #[test]
    fn reorder_then_status_survives() {
        let (_dir, store) = test_store();
        let id = store
            .create(NewService {
                name: "Router".to_string(),
                url: Some("http://192.168.0.1".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(id, 1);
        store.update_health(id, HealthStatus::Unhealthy).unwrap();

        store
            .reorder(&[ReorderEntry {
                id,
                display_order: 5,
            }])
            .unwrap();

        let record = store.find(id).unwrap().unwrap();
        assert_eq!(record.display_order, 5);
        assert_eq!(record.status, HealthStatus::Unhealthy);
    }

    // ── Persistence protocol ───────────────────────────────────────

    #[test]
    fn empty_file_is_an_empty_registry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("services.json");
        std::fs::write(&path, "").unwrap();

        let store = RegistryStore::open(&path).unwrap();
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn malformed_file_recovers_to_empty_without_touching_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("services.json");
        let store = RegistryStore::open(&path).unwrap();
        std::fs::write(&path, "{ not json").unwrap();

        assert!(store.list().unwrap().is_empty());
        // The broken bytes survive until the next write.
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");

        // The next create starts over from id 1 and repairs the file.
        assert_eq!(store.create(named("fresh")).unwrap(), 1);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn writes_leave_no_temp_residue() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("services.json");
        let store = RegistryStore::open(&path).unwrap();
        store.create(named("svc")).unwrap();

        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("services.json");

        {
            let store = RegistryStore::open(&path).unwrap();
            store
                .create(NewService {
                    name: "Router".to_string(),
                    url: Some("http://192.168.0.1".to_string()),
                    ..Default::default()
                })
                .unwrap();
        }

        let store = RegistryStore::open(&path).unwrap();
        let services = store.list().unwrap();
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].name, "Router");
        assert_eq!(services[0].id, 1);
    }

    // ── Concurrency ────────────────────────────────────────────────

    #[test]
    fn concurrent_updates_to_distinct_ids_lose_nothing() {
        let (_dir, store) = test_store();
        let ids: Vec<ServiceId> = (0..8)
            .map(|i| store.create(named(&format!("svc-{i}"))).unwrap())
            .collect();

        let handles: Vec<_> = ids
            .iter()
            .map(|&id| {
                let store = store.clone();
                std::thread::spawn(move || {
                    store
                        .update(
                            id,
                            ServiceUpdate {
                                name: Some(format!("renamed-{id}")),
                                ..Default::default()
                            },
                        )
                        .unwrap()
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }

        let services = store.list().unwrap();
        assert_eq!(services.len(), ids.len());
        for record in services {
            assert_eq!(record.name, format!("renamed-{}", record.id));
        }
    }

    #[test]
    fn concurrent_creates_issue_unique_ids() {
        let (_dir, store) = test_store();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || store.create(named(&format!("svc-{i}"))).unwrap())
            })
            .collect();
        let mut ids: Vec<ServiceId> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 8);
        assert_eq!(store.list().unwrap().len(), 8);
    }
}
