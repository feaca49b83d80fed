use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{
    clock::Clock,
    error::{DialError, Result},
    model::{Board, BoardId, Dial, DialId},
    snowflake::{MAX_WORKER_ID, SnowflakeGenerator},
    store::{BUCKET_BOARDS, BUCKET_DIALS, DialStore},
};

/// Sink for per-dial resolution failures during board materialization.
///
/// Resolution failures are deliberately non-fatal: the failing reference
/// is omitted from the returned board and reported here instead.
pub trait ResolutionObserver: Send + Sync {
    fn dial_skipped(&self, board_id: &BoardId, dial_id: &DialId, reason: &DialError);
}

/// Default observer; emits a structured log line per skipped dial.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl ResolutionObserver for TracingObserver {
    fn dial_skipped(&self, board_id: &BoardId, dial_id: &DialId, reason: &DialError) {
        warn!(board = %board_id, dial = %dial_id, error = %reason, "failed to resolve board dial");
    }
}

/// Persistence and aggregation service for dials and boards.
///
/// Each operation runs exactly one transaction against the store, except
/// `get_board`, which resolves every referenced dial in its own
/// independent read transaction and is therefore not atomic across the
/// whole materialization.
pub struct DialService {
    store: Arc<DialStore>,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn ResolutionObserver>,
    ids: Mutex<SnowflakeGenerator>,
}

impl DialService {
    /// Creates the service, ensuring the `dials` and `boards` buckets
    /// exist. Failure here is fatal; the service is never usable in a
    /// partially-initialized state.
    pub fn new(
        store: Arc<DialStore>,
        clock: Arc<dyn Clock>,
        observer: Arc<dyn ResolutionObserver>,
    ) -> Result<Self> {
        Self::with_worker_id(store, clock, observer, 0)
    }

    /// As `new`, with an explicit snowflake worker id for deployments
    /// that run several id-allocating processes.
    pub fn with_worker_id(
        store: Arc<DialStore>,
        clock: Arc<dyn Clock>,
        observer: Arc<dyn ResolutionObserver>,
        worker_id: u16,
    ) -> Result<Self> {
        if worker_id > MAX_WORKER_ID {
            return Err(DialError::Storage(format!(
                "snowflake worker id {worker_id} exceeds maximum {MAX_WORKER_ID}"
            )));
        }

        let mut txn = store.begin_write();
        txn.ensure_bucket(BUCKET_DIALS)
            .map_err(|err| err.with_op("ensure_bucket", BUCKET_DIALS))?;
        txn.ensure_bucket(BUCKET_BOARDS)
            .map_err(|err| err.with_op("ensure_bucket", BUCKET_BOARDS))?;
        txn.commit()
            .map_err(|err| err.with_op("service_init", "commit"))?;

        Ok(Self {
            store,
            clock,
            observer,
            ids: Mutex::new(SnowflakeGenerator::new(worker_id)),
        })
    }

    /// Creates a dial with the given display name, owned by `token`.
    /// The returned record includes the token; callers outside the
    /// immediate boundary must never re-expose it.
    pub fn create_dial(
        &self,
        cancel: &CancellationToken,
        name: &str,
        token: &str,
    ) -> Result<Dial> {
        check_cancel(cancel)?;

        let dial = Dial {
            id: DialId::generate(self.ids.lock().next_id()),
            token: token.to_string(),
            name: name.to_string(),
            value: 0.0,
            updated_at: self.now_utc(),
        };

        let result = (|| {
            let mut txn = self.store.begin_write();
            txn.put(BUCKET_DIALS, dial.id.as_str(), serde_json::to_vec(&dial)?);
            check_cancel(cancel)?;
            txn.commit()
        })();
        result.map_err(|err| err.with_op("create_dial", dial.id.as_str()))?;

        Ok(dial)
    }

    /// Retrieves a dial by id. Anyone who knows the id can read it.
    pub fn get_dial(&self, cancel: &CancellationToken, id: &DialId) -> Result<Dial> {
        check_cancel(cancel)?;

        let result: Result<Dial> = (|| {
            let txn = self.store.begin_read();
            let bytes = txn
                .get(BUCKET_DIALS, id.as_str())?
                .ok_or(DialError::DialNotFound)?;
            // Decoding renormalizes updated_at to UTC whatever offset the
            // stored representation carried.
            Ok(serde_json::from_slice::<Dial>(&bytes)?)
        })();
        result.map_err(|err| err.with_op("get_dial", id.as_str()))
    }

    /// Updates the dial value. Authorized by the token the dial was
    /// created with; the read-check-write sequence is atomic with
    /// respect to other writers.
    pub fn set_dial(
        &self,
        cancel: &CancellationToken,
        id: &DialId,
        token: &str,
        value: f64,
    ) -> Result<()> {
        check_cancel(cancel)?;

        let result = (|| {
            let mut txn = self.store.begin_write();
            let bytes = txn
                .get(BUCKET_DIALS, id.as_str())?
                .ok_or(DialError::DialNotFound)?;
            let mut dial: Dial = serde_json::from_slice(&bytes)?;

            // Existence is confirmed before the token is examined, so a
            // wrong token against a missing dial reports DialNotFound.
            if token != dial.token {
                return Err(DialError::Unauthorized);
            }

            dial.value = value;
            dial.updated_at = self.now_utc();

            txn.put(BUCKET_DIALS, id.as_str(), serde_json::to_vec(&dial)?);
            check_cancel(cancel)?;
            txn.commit()
        })();
        result.map_err(|err| err.with_op("set_dial", id.as_str()))
    }

    /// Creates a board with the given display name and no dial
    /// references, owned by `token`.
    pub fn create_board(
        &self,
        cancel: &CancellationToken,
        name: &str,
        token: &str,
    ) -> Result<Board> {
        check_cancel(cancel)?;

        let board = Board {
            id: BoardId::generate(self.ids.lock().next_id()),
            token: token.to_string(),
            name: name.to_string(),
            dial_refs: Vec::new(),
            dials: Vec::new(),
            updated_at: self.now_utc(),
        };

        let result = (|| {
            let mut txn = self.store.begin_write();
            txn.put(BUCKET_BOARDS, board.id.as_str(), serde_json::to_vec(&board)?);
            check_cancel(cancel)?;
            txn.commit()
        })();
        result.map_err(|err| err.with_op("create_board", board.id.as_str()))?;

        Ok(board)
    }

    /// Retrieves a board and materializes its dials: every stored
    /// reference is re-resolved to the dial's current state, in stored
    /// order, each in its own read transaction. References that fail to
    /// resolve are omitted from `dials` (never removed from
    /// `dial_refs`) and reported to the observer.
    pub fn get_board(&self, cancel: &CancellationToken, id: &BoardId) -> Result<Board> {
        check_cancel(cancel)?;

        let mut board = (|| {
            let txn = self.store.begin_read();
            let bytes = txn
                .get(BUCKET_BOARDS, id.as_str())?
                .ok_or(DialError::BoardNotFound)?;
            Ok(serde_json::from_slice::<Board>(&bytes)?)
        })()
        .map_err(|err: DialError| err.with_op("get_board", id.as_str()))?;

        let (resolved, skipped) = self.resolve_dials(cancel, &board.dial_refs)?;
        for (dial_id, reason) in &skipped {
            self.observer.dial_skipped(&board.id, dial_id, reason);
        }
        if !skipped.is_empty() {
            counter!("dialdb_board_dials_skipped_total").increment(skipped.len() as u64);
        }

        board.dials = resolved;
        Ok(board)
    }

    /// Replaces the board's dial references wholesale. The referenced
    /// dials are not checked for existence; missing ones surface lazily
    /// at `get_board` time.
    pub fn set_board(
        &self,
        cancel: &CancellationToken,
        id: &BoardId,
        token: &str,
        dial_ids: Vec<DialId>,
    ) -> Result<()> {
        check_cancel(cancel)?;

        let result = (|| {
            let mut txn = self.store.begin_write();
            let bytes = txn
                .get(BUCKET_BOARDS, id.as_str())?
                .ok_or(DialError::BoardNotFound)?;
            let mut board: Board = serde_json::from_slice(&bytes)?;

            if token != board.token {
                return Err(DialError::Unauthorized);
            }

            board.dial_refs = dial_ids;
            board.updated_at = self.now_utc();

            txn.put(BUCKET_BOARDS, id.as_str(), serde_json::to_vec(&board)?);
            check_cancel(cancel)?;
            txn.commit()
        })();
        result.map_err(|err| err.with_op("set_board", id.as_str()))
    }

    /// Folds the reference list into resolved dials plus the skip list.
    /// Only cancellation aborts the fold; every other failure becomes a
    /// skip entry.
    fn resolve_dials(
        &self,
        cancel: &CancellationToken,
        refs: &[DialId],
    ) -> Result<(Vec<Dial>, Vec<(DialId, DialError)>)> {
        let mut resolved = Vec::with_capacity(refs.len());
        let mut skipped = Vec::new();

        for dial_id in refs {
            match self.get_dial(cancel, dial_id) {
                Ok(dial) => resolved.push(dial),
                Err(DialError::Canceled) => return Err(DialError::Canceled),
                Err(err) => skipped.push((dial_id.clone(), err)),
            }
        }

        Ok((resolved, skipped))
    }

    fn now_utc(&self) -> DateTime<Utc> {
        self.clock.now().with_timezone(&Utc)
    }
}

fn check_cancel(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(DialError::Canceled);
    }
    Ok(())
}
