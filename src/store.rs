use std::{collections::BTreeMap, path::PathBuf, time::Instant};

use metrics::{counter, histogram};
use parking_lot::{Mutex, MutexGuard};
use rocksdb::{DBWithThreadMode, MultiThreaded, Options, SnapshotWithThreadMode, WriteBatch};

use crate::error::{DialError, Result};

const SEP: u8 = 0x1F;
const PREFIX_BUCKET: &str = "bucket";

pub const BUCKET_DIALS: &str = "dials";
pub const BUCKET_BOARDS: &str = "boards";

type Db = DBWithThreadMode<MultiThreaded>;

/// Embedded transactional key-value store.
///
/// Values live under `bucket \x1F key` so each named bucket is an
/// independent key space. Writes funnel through a store-wide lock: at
/// most one read-write transaction is in flight at a time, while any
/// number of read-only transactions run concurrently against pinned
/// snapshots.
pub struct DialStore {
    db: Db,
    write_lock: Mutex<()>,
}

impl DialStore {
    pub fn open(path: PathBuf) -> Result<Self> {
        let mut options = Options::default();
        options.create_if_missing(true);
        let db = Db::open(&options, path).map_err(|err| DialError::Storage(err.to_string()))?;

        Ok(Self {
            db,
            write_lock: Mutex::new(()),
        })
    }

    /// Begins a read-only transaction over a consistent point-in-time
    /// snapshot, unaffected by writers that commit while it is open.
    pub fn begin_read(&self) -> ReadTxn<'_> {
        ReadTxn {
            snapshot: self.db.snapshot(),
        }
    }

    /// Begins the single in-flight read-write transaction. Staged writes
    /// are applied atomically on `commit`; dropping the transaction
    /// without committing discards them.
    pub fn begin_write(&self) -> WriteTxn<'_> {
        WriteTxn {
            _guard: self.write_lock.lock(),
            db: &self.db,
            batch: WriteBatch::default(),
            staged: BTreeMap::new(),
            started: Instant::now(),
        }
    }
}

pub struct ReadTxn<'a> {
    snapshot: SnapshotWithThreadMode<'a, Db>,
}

impl ReadTxn<'_> {
    pub fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let started = Instant::now();
        let result = self
            .snapshot
            .get(record_key(bucket, key))
            .map_err(|err| DialError::Storage(err.to_string()));
        record_store_op(
            "snapshot_get",
            if result.is_ok() { "ok" } else { "err" },
            started.elapsed().as_secs_f64(),
        );
        result
    }
}

pub struct WriteTxn<'a> {
    // Held for the lifetime of the transaction; serializes all writers.
    _guard: MutexGuard<'a, ()>,
    db: &'a Db,
    batch: WriteBatch,
    staged: BTreeMap<Vec<u8>, Vec<u8>>,
    started: Instant,
}

impl WriteTxn<'_> {
    /// Reads through the transaction's own staged writes first, then the
    /// underlying store. With the write lock held, nothing can change
    /// underneath the transaction.
    pub fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let full_key = record_key(bucket, key);
        if let Some(value) = self.staged.get(&full_key) {
            return Ok(Some(value.clone()));
        }
        self.db
            .get(&full_key)
            .map_err(|err| DialError::Storage(err.to_string()))
    }

    pub fn put(&mut self, bucket: &str, key: &str, value: Vec<u8>) {
        let full_key = record_key(bucket, key);
        self.batch.put(&full_key, &value);
        self.staged.insert(full_key, value);
    }

    /// Creates the named bucket if it does not exist yet.
    pub fn ensure_bucket(&mut self, name: &str) -> Result<()> {
        let marker = record_key(PREFIX_BUCKET, name);
        if self.staged.contains_key(&marker) {
            return Ok(());
        }
        let existing = self
            .db
            .get(&marker)
            .map_err(|err| DialError::Storage(err.to_string()))?;
        if existing.is_none() {
            self.batch.put(&marker, b"1");
            self.staged.insert(marker, b"1".to_vec());
        }
        Ok(())
    }

    pub fn commit(self) -> Result<()> {
        let result = self
            .db
            .write(self.batch)
            .map_err(|err| DialError::Storage(err.to_string()));
        record_store_op(
            "write_commit",
            if result.is_ok() { "ok" } else { "err" },
            self.started.elapsed().as_secs_f64(),
        );
        result
    }
}

fn record_key(bucket: &str, key: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(bucket.len() + 1 + key.len());
    out.extend_from_slice(bucket.as_bytes());
    out.push(SEP);
    out.extend_from_slice(key.as_bytes());
    out
}

fn record_store_op(operation: &'static str, status: &'static str, duration: f64) {
    let labels = [("operation", operation), ("status", status)];
    counter!("dialdb_store_operations_total", &labels).increment(1);
    histogram!("dialdb_store_operation_duration_seconds", &labels).record(duration);
}
