//! # RocksDB Cache Store
//!
//! Durable `CacheStore`. Members live in the `members` column family keyed
//! by node; the watermark is a single key in `meta`. A commit is one
//! `WriteBatch`, so a crash never leaves a mutation without its watermark.
//!
//! ## Column Families
//!
//! - `members` - `node -> MemberRecord` (JSON)
//! - `meta` - `watermark -> EventPosition` (JSON)

use async_trait::async_trait;
use parking_lot::RwLock;
use rocksdb::{ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, WriteOptions, DB};
use tracing::info;

use registry_telemetry::WATERMARK_BLOCK;
use shared_types::EventPosition;

use crate::domain::{
    apply_mutation, CommitOutcome, MemberFilter, MemberMutation, MemberRecord, RegistryCacheError,
};
use crate::ports::CacheStore;

/// Member records.
pub const CF_MEMBERS: &str = "members";
/// Watermark and other singletons.
pub const CF_META: &str = "meta";

const WATERMARK_KEY: &[u8] = b"watermark";

/// RocksDB store configuration.
#[derive(Debug, Clone)]
pub struct RocksDbStoreConfig {
    /// Database directory.
    pub path: String,
    /// fsync every write.
    pub sync_writes: bool,
    /// Write buffer size in bytes.
    pub write_buffer_size: usize,
}

impl Default for RocksDbStoreConfig {
    fn default() -> Self {
        Self {
            path: "./data/registry-cache".to_string(),
            sync_writes: true,
            write_buffer_size: 16 * 1024 * 1024,
        }
    }
}

impl RocksDbStoreConfig {
    /// Small buffers, no fsync.
    pub fn for_testing(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            sync_writes: false,
            write_buffer_size: 1024 * 1024,
        }
    }
}

/// RocksDB-backed cache store.
pub struct RocksDbCacheStore {
    db: RwLock<DB>,
    config: RocksDbStoreConfig,
}

fn db_error(context: &str, e: impl std::fmt::Display) -> RegistryCacheError {
    RegistryCacheError::DatabaseConnection(format!("{}: {}", context, e))
}

impl RocksDbCacheStore {
    /// Open or create the database.
    pub fn open(config: RocksDbStoreConfig) -> Result<Self, RegistryCacheError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let cf_descriptors = [CF_MEMBERS, CF_META]
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, &config.path, cf_descriptors)
            .map_err(|e| db_error("Failed to open RocksDB", e))?;
        info!(path = %config.path, "Opened registry cache database");

        Ok(Self {
            db: RwLock::new(db),
            config,
        })
    }

    fn write_options(&self) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.config.sync_writes);
        opts
    }

    fn read_member(db: &DB, node: &str) -> Result<Option<MemberRecord>, RegistryCacheError> {
        let cf = db
            .cf_handle(CF_MEMBERS)
            .ok_or_else(|| db_error("Missing column family", CF_MEMBERS))?;
        match db.get_cf(cf, node.as_bytes()).map_err(|e| db_error("get failed", e))? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| db_error("Corrupt member record", e)),
            None => Ok(None),
        }
    }

    fn read_watermark(db: &DB) -> Result<Option<EventPosition>, RegistryCacheError> {
        let cf = db
            .cf_handle(CF_META)
            .ok_or_else(|| db_error("Missing column family", CF_META))?;
        match db.get_cf(cf, WATERMARK_KEY).map_err(|e| db_error("get failed", e))? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| db_error("Corrupt watermark", e)),
            None => Ok(None),
        }
    }

    fn scan_members(db: &DB) -> Result<Vec<MemberRecord>, RegistryCacheError> {
        let cf = db
            .cf_handle(CF_MEMBERS)
            .ok_or_else(|| db_error("Missing column family", CF_MEMBERS))?;
        db.iterator_cf(cf, IteratorMode::Start)
            .map(|item| {
                let (_, value) = item.map_err(|e| db_error("iteration failed", e))?;
                serde_json::from_slice(&value).map_err(|e| db_error("Corrupt member record", e))
            })
            .collect()
    }

    /// Add the watermark write to `batch` unless it would move backwards.
    fn stage_watermark(
        db: &DB,
        batch: &mut WriteBatch,
        position: EventPosition,
    ) -> Result<EventPosition, RegistryCacheError> {
        let next = match Self::read_watermark(db)? {
            Some(current) if current >= position => current,
            _ => position,
        };
        let cf = db
            .cf_handle(CF_META)
            .ok_or_else(|| db_error("Missing column family", CF_META))?;
        let bytes = serde_json::to_vec(&next).map_err(|e| db_error("encode failed", e))?;
        batch.put_cf(cf, WATERMARK_KEY, bytes);
        Ok(next)
    }
}

#[async_trait]
impl CacheStore for RocksDbCacheStore {
    async fn clear_all(&self) -> Result<(), RegistryCacheError> {
        let db = self.db.write();
        let mut batch = WriteBatch::default();
        for name in [CF_MEMBERS, CF_META] {
            let cf = db
                .cf_handle(name)
                .ok_or_else(|| db_error("Missing column family", name))?;
            for item in db.iterator_cf(cf, IteratorMode::Start) {
                let (key, _) = item.map_err(|e| db_error("iteration failed", e))?;
                batch.delete_cf(cf, key);
            }
        }
        db.write_opt(batch, &self.write_options())
            .map_err(|e| db_error("clear failed", e))
    }

    async fn find_by_node(&self, node: &str) -> Result<Option<MemberRecord>, RegistryCacheError> {
        Self::read_member(&self.db.read(), node)
    }

    async fn find_by_parent_and_label(
        &self,
        parent_node: &str,
        label: &str,
    ) -> Result<Option<MemberRecord>, RegistryCacheError> {
        Ok(Self::scan_members(&self.db.read())?
            .into_iter()
            .find(|m| m.parent_node == parent_node && m.label == label))
    }

    async fn get_members(
        &self,
        filter: &MemberFilter,
    ) -> Result<Vec<MemberRecord>, RegistryCacheError> {
        Ok(Self::scan_members(&self.db.read())?
            .into_iter()
            .filter(|m| filter.matches(m))
            .collect())
    }

    async fn last_event_processed(&self) -> Result<Option<EventPosition>, RegistryCacheError> {
        Self::read_watermark(&self.db.read())
    }

    async fn create_or_update_watermark(
        &self,
        position: EventPosition,
    ) -> Result<(), RegistryCacheError> {
        let db = self.db.write();
        let mut batch = WriteBatch::default();
        let next = Self::stage_watermark(&db, &mut batch, position)?;
        db.write_opt(batch, &self.write_options())
            .map_err(|e| db_error("watermark write failed", e))?;
        WATERMARK_BLOCK.set(next.block_number as f64);
        Ok(())
    }

    async fn commit(
        &self,
        mutation: MemberMutation,
        position: EventPosition,
    ) -> Result<CommitOutcome, RegistryCacheError> {
        let db = self.db.write();
        let mut batch = WriteBatch::default();
        let mut outcome = CommitOutcome::WatermarkOnly;

        if let Some(node) = mutation.target_node().map(str::to_string) {
            let current = Self::read_member(&db, &node)?;
            if let Some(record) = apply_mutation(current, mutation) {
                let cf = db
                    .cf_handle(CF_MEMBERS)
                    .ok_or_else(|| db_error("Missing column family", CF_MEMBERS))?;
                let bytes = serde_json::to_vec(&record).map_err(|e| db_error("encode failed", e))?;
                batch.put_cf(cf, node.as_bytes(), bytes);
                outcome = CommitOutcome::Written;
            }
        }

        let next = Self::stage_watermark(&db, &mut batch, position)?;
        db.write_opt(batch, &self.write_options())
            .map_err(|e| db_error("commit failed", e))?;
        WATERMARK_BLOCK.set(next.block_number as f64);
        Ok(outcome)
    }
}
