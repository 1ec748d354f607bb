//! Per-tenant file catalog seam.
//!
//! Duplicate detection needs three things from the platform's file
//! registry: lookup by raw content hash, a bounded most-recent-files
//! listing, and a place to persist simhash fingerprints. The registry
//! itself is an external collaborator; [`FileCatalog`] is the trait at
//! that seam and [`MemoryCatalog`] the in-process implementation used by
//! tests and local runs.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::FileEntry;

#[async_trait]
pub trait FileCatalog: Send + Sync {
    /// All files of the tenant whose raw content hash equals `content_hash`.
    /// Includes the file itself if registered; callers exclude self.
    async fn find_by_content_hash(
        &self,
        tenant_id: &str,
        content_hash: &str,
    ) -> Result<Vec<FileEntry>>;

    /// The tenant's most recently created files, newest first, at most
    /// `limit` entries.
    async fn recent_files(&self, tenant_id: &str, limit: usize) -> Result<Vec<FileEntry>>;

    /// Persist the file's simhash fingerprint for future comparisons.
    async fn record_fingerprint(&self, tenant_id: &str, file_id: &str, simhash: u64)
        -> Result<()>;
}

/// In-memory catalog keyed by tenant.
#[derive(Default)]
pub struct MemoryCatalog {
    files: Mutex<HashMap<String, Vec<FileEntry>>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file for a tenant. Re-registering a file id replaces it.
    pub fn add_file(&self, tenant_id: &str, entry: FileEntry) {
        let mut files = self.files.lock().expect("catalog lock");
        let entries = files.entry(tenant_id.to_string()).or_default();
        entries.retain(|e| e.file_id != entry.file_id);
        entries.push(entry);
    }
}

#[async_trait]
impl FileCatalog for MemoryCatalog {
    async fn find_by_content_hash(
        &self,
        tenant_id: &str,
        content_hash: &str,
    ) -> Result<Vec<FileEntry>> {
        let files = self.files.lock().expect("catalog lock");
        Ok(files
            .get(tenant_id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| e.content_hash == content_hash)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn recent_files(&self, tenant_id: &str, limit: usize) -> Result<Vec<FileEntry>> {
        let files = self.files.lock().expect("catalog lock");
        let mut entries = files.get(tenant_id).cloned().unwrap_or_default();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries.truncate(limit);
        Ok(entries)
    }

    async fn record_fingerprint(
        &self,
        tenant_id: &str,
        file_id: &str,
        simhash: u64,
    ) -> Result<()> {
        let mut files = self.files.lock().expect("catalog lock");
        if let Some(entries) = files.get_mut(tenant_id) {
            for entry in entries.iter_mut() {
                if entry.file_id == file_id {
                    entry.simhash = Some(simhash);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn entry(file_id: &str, hash: &str, age_secs: i64) -> FileEntry {
        FileEntry {
            file_id: file_id.to_string(),
            filename: format!("{file_id}.pdf"),
            content_hash: hash.to_string(),
            simhash: None,
            created_at: Utc::now() - Duration::seconds(age_secs),
        }
    }

    #[tokio::test]
    async fn test_hash_lookup_scoped_to_tenant() {
        let catalog = MemoryCatalog::new();
        catalog.add_file("t1", entry("f1", "abc", 10));
        catalog.add_file("t2", entry("f2", "abc", 5));

        let matches = catalog.find_by_content_hash("t1", "abc").await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].file_id, "f1");
    }

    #[tokio::test]
    async fn test_recent_files_newest_first_bounded() {
        let catalog = MemoryCatalog::new();
        for i in 0..10i64 {
            catalog.add_file("t1", entry(&format!("f{i}"), "h", i * 60));
        }
        let recent = catalog.recent_files("t1", 3).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].file_id, "f0");
        assert_eq!(recent[2].file_id, "f2");
    }

    #[tokio::test]
    async fn test_record_fingerprint() {
        let catalog = MemoryCatalog::new();
        catalog.add_file("t1", entry("f1", "h", 0));
        catalog.record_fingerprint("t1", "f1", 42).await.unwrap();

        let recent = catalog.recent_files("t1", 10).await.unwrap();
        assert_eq!(recent[0].simhash, Some(42));
    }
}
