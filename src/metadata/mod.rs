// Metadata Registry Module
//
// In-process catalog of the tables the harness believes exist on the server.
// DDL actions consult and update it instead of querying the database before
// every statement. It is updated only after the SQL succeeded, so it can
// diverge from the real catalog; callers tolerate SQL failures caused by that.
//
// Layout: a fixed-capacity array of slots. Each slot holds an atomically
// swappable `Arc<Table>` handle, a writer mutex, and a moved-to forward
// pointer. Reads clone the handle without touching any writer mutex; a clone
// is a consistent snapshot for as long as the reader keeps it.
//
// Writers take the slot mutex through a Reservation and hold it across the
// SQL statement. The mutated copy is swapped in on `complete()`; `cancel()`
// releases without publishing. Drops defragment: the tail snapshot moves into
// the vacated slot so lookups below `size()` never cross holes, and the
// vacated tail records where its occupant went in `moved_to`. Creates reserve
// capacity up front and pick their final index only at completion, locking
// the current tail first. Because drops also lock the tail, shrink and append
// serialize on that slot while unrelated alters proceed untouched.
//
// Counters change only while the governing slot mutex (plus, for tail
// transitions, the old-tail mutex) is held. `table_count` is the logical
// size; `reserved_size` additionally counts in-flight creations.

pub mod error;
pub mod table;

pub use error::MetadataError;
pub use table::{Column, ColumnType, Generated, Index, Table, TableType};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock};

/// Sizing constants for the registry and its snapshot containers.
pub mod limits {
    pub const MAXIMUM_TABLE_COUNT: usize = 200;
    pub const OPTIMIZED_COLUMN_COUNT: usize = 32;
    pub const OPTIMIZED_INDEX_COLUMN_COUNT: usize = 10;
    pub const OPTIMIZED_INDEX_COUNT: usize = 16;
}

/// Sentinel index meaning "not an index": unset Reservation indexes and
/// moved-to entries with nothing recorded.
pub const NPOS: usize = usize::MAX;

struct Slot {
    handle: RwLock<Option<Arc<Table>>>,
    lock: Mutex<()>,
    moved_to: AtomicUsize,
}

impl Slot {
    fn new() -> Self {
        Slot {
            handle: RwLock::new(None),
            lock: Mutex::new(()),
            moved_to: AtomicUsize::new(NPOS),
        }
    }
}

/// The concurrent table catalog.
pub struct Metadata {
    slots: Vec<Slot>,
    table_count: AtomicUsize,
    reserved_size: AtomicUsize,
}

impl Default for Metadata {
    fn default() -> Self {
        Self::new()
    }
}

impl Metadata {
    pub fn new() -> Self {
        Self::with_capacity(limits::MAXIMUM_TABLE_COUNT)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Metadata {
            slots: (0..capacity).map(|_| Slot::new()).collect(),
            table_count: AtomicUsize::new(0),
            reserved_size: AtomicUsize::new(0),
        }
    }

    /// Number of occupied slots from the front.
    pub fn size(&self) -> usize {
        self.table_count.load(Ordering::SeqCst)
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Occupied slots plus in-flight creations.
    pub fn reserved_size(&self) -> usize {
        self.reserved_size.load(Ordering::SeqCst)
    }

    /// The published snapshot at `idx`, if any.
    ///
    /// May return `None` even for `idx < size()`: there is no locking between
    /// a `size()` call and this read, so a concurrent drop can empty the slot
    /// in that window. Callers tolerate it and retry.
    pub fn get(&self, idx: usize) -> Option<Arc<Table>> {
        self.slots.get(idx).and_then(|slot| slot.handle.read().clone())
    }

    /// Snapshot of every currently published table, in slot order.
    pub fn tables(&self) -> Vec<Arc<Table>> {
        self.slots
            .iter()
            .filter_map(|slot| slot.handle.read().clone())
            .collect()
    }

    /// Where the last occupant of `idx` was relocated by a defragmenting
    /// drop, or `NPOS` if it was not.
    pub fn moved_to(&self, idx: usize) -> usize {
        self.slots
            .get(idx)
            .map(|slot| slot.moved_to.load(Ordering::SeqCst))
            .unwrap_or(NPOS)
    }

    /// Reserve capacity for a new table.
    ///
    /// The returned Reservation carries a fresh `Table` for the caller to
    /// fill in; the slot index is chosen only at completion. Returns a
    /// non-open Reservation when the catalog is full.
    pub fn create_table(&self) -> Reservation<'_> {
        if self.reserved_size.load(Ordering::SeqCst) < self.slots.len() {
            let reserved = self.reserved_size.fetch_add(1, Ordering::SeqCst) + 1;
            if reserved > self.slots.len() {
                self.reserved_size.fetch_sub(1, Ordering::SeqCst);
                return Reservation::unopened();
            }
            return Reservation {
                storage: Some(self),
                kind: ReservationKind::Create,
                working: Some(Table::default()),
                dropped: None,
                index: NPOS,
                guard: None,
            };
        }
        Reservation::unopened()
    }

    /// Lock slot `idx` for modification and hand out a deep copy of its
    /// snapshot. Returns a non-open Reservation when the slot is empty or out
    /// of range.
    pub fn alter_table(&self, idx: usize) -> Reservation<'_> {
        let Some(slot) = self.slots.get(idx) else {
            return Reservation::unopened();
        };
        let guard = slot.lock.lock();
        let Some(current) = slot.handle.read().clone() else {
            return Reservation::unopened();
        };
        Reservation {
            storage: Some(self),
            kind: ReservationKind::Alter,
            working: Some((*current).clone()),
            dropped: None,
            index: idx,
            guard: Some(guard),
        }
    }

    /// Lock slot `idx` for removal. Returns a non-open Reservation when the
    /// slot is empty or out of range.
    pub fn drop_table(&self, idx: usize) -> Reservation<'_> {
        let Some(slot) = self.slots.get(idx) else {
            return Reservation::unopened();
        };
        let guard = slot.lock.lock();
        let Some(current) = slot.handle.read().clone() else {
            return Reservation::unopened();
        };
        Reservation {
            storage: Some(self),
            kind: ReservationKind::Drop,
            working: None,
            dropped: Some(current),
            index: idx,
            guard: Some(guard),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ReservationKind {
    Create,
    Alter,
    Drop,
}

/// Scoped right to publish or withdraw one catalog mutation.
///
/// Alter and drop Reservations hold their slot mutex for their whole life;
/// create Reservations hold reserved capacity and no lock until completion.
/// Dropping an open Reservation completes it, so the SQL-first pattern
/// (execute the statement, call `complete()` only on success, `cancel()`
/// otherwise) publishes exactly the mutations the server accepted.
pub struct Reservation<'a> {
    storage: Option<&'a Metadata>,
    kind: ReservationKind,
    working: Option<Table>,
    dropped: Option<Arc<Table>>,
    index: usize,
    guard: Option<MutexGuard<'a, ()>>,
}

impl<'a> Reservation<'a> {
    fn unopened() -> Self {
        Reservation {
            storage: None,
            kind: ReservationKind::Create,
            working: None,
            dropped: None,
            index: NPOS,
            guard: None,
        }
    }

    /// Whether this Reservation still holds its lock or capacity.
    pub fn open(&self) -> bool {
        self.storage.is_some() && (self.guard.is_some() || self.index == NPOS)
    }

    /// The slot this Reservation refers to. For creates it is `NPOS` until
    /// `complete()` assigns the final index, which stays readable afterwards.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The snapshot under construction (create/alter) or slated for removal
    /// (drop).
    pub fn table(&self) -> Option<&Table> {
        match self.kind {
            ReservationKind::Drop => self.dropped.as_deref(),
            _ => self.working.as_ref(),
        }
    }

    /// Mutable access to the snapshot under construction. `None` for drops.
    pub fn table_mut(&mut self) -> Option<&mut Table> {
        self.working.as_mut()
    }

    /// Publish the mutation and release all resources.
    pub fn complete(&mut self) -> Result<(), MetadataError> {
        let storage = self.storage.ok_or(MetadataError::InvalidReservation)?;
        if self.guard.is_none() && self.index != NPOS {
            // Alters and drops released their lock on the first complete;
            // creates record their index then. Either way this is a repeat.
            return Err(MetadataError::DoubleComplete);
        }
        match self.kind {
            ReservationKind::Alter => {
                if let Some(table) = self.working.take() {
                    *storage.slots[self.index].handle.write() = Some(Arc::new(table));
                }
                self.guard = None;
            }
            ReservationKind::Drop => self.complete_drop(storage),
            ReservationKind::Create => self.complete_create(storage),
        }
        Ok(())
    }

    fn complete_drop(&mut self, storage: &'a Metadata) {
        loop {
            // size() >= 1 is guaranteed: we hold the lock of an occupied slot.
            let last = storage.size() - 1;
            if self.index == last {
                // Tail drop, no defragmentation. A concurrent create wants
                // this slot's lock before appending, so it waits until the
                // counters below are consistent.
                let slot = &storage.slots[self.index];
                *slot.handle.write() = None;
                storage.table_count.fetch_sub(1, Ordering::SeqCst);
                storage.reserved_size.fetch_sub(1, Ordering::SeqCst);
                slot.moved_to.store(NPOS, Ordering::SeqCst);
                self.guard = None;
                return;
            }

            // Interior drop: lock the tail and move it into the hole.
            let last_slot = &storage.slots[last];
            let inner = last_slot.lock.lock();
            let tail = last_slot.handle.read().clone();
            if tail.is_some() && last == storage.size() - 1 {
                *storage.slots[self.index].handle.write() = tail;
                self.guard = None;
                storage.table_count.fetch_sub(1, Ordering::SeqCst);
                storage.reserved_size.fetch_sub(1, Ordering::SeqCst);
                *last_slot.handle.write() = None;
                last_slot.moved_to.store(self.index, Ordering::SeqCst);
                drop(inner);
                return;
            }
            // A create or drop moved the tail before we locked it; retry
            // against the new last slot (which may now be ours).
        }
    }

    fn complete_create(&mut self, storage: &'a Metadata) {
        // No lock is held yet, only reserved capacity.
        loop {
            let next = storage.size();
            let outer = if next > 0 {
                let last_slot = &storage.slots[next - 1];
                let guard = last_slot.lock.lock();
                if last_slot.handle.read().is_none() || next != storage.size() {
                    // No longer the last slot; a create or drop got in first.
                    continue;
                }
                Some(guard)
            } else {
                None
            };

            // Size only changes under the tail lock, so holding it pins the
            // append position. The slot after the tail cannot be contended:
            // every create and drop locks the tail first, and we hold it.
            let next_slot = &storage.slots[next];
            let inner = next_slot.lock.lock();
            if outer.is_none() && storage.size() != 0 {
                // Raced another first-create on an empty catalog; it
                // published while we waited for slot zero. Retry with a
                // proper tail lock so we append instead of overwriting.
                drop(inner);
                continue;
            }

            if let Some(table) = self.working.take() {
                *next_slot.handle.write() = Some(Arc::new(table));
            }
            storage.table_count.fetch_add(1, Ordering::SeqCst);
            self.index = next;
            drop(inner);
            drop(outer);
            return;
        }
    }

    /// Release all resources without publishing. A no-op after `complete()`.
    pub fn cancel(&mut self) {
        if self.index == NPOS {
            // An in-flight creation frees its reserved slot.
            if let Some(storage) = self.storage {
                storage.reserved_size.fetch_sub(1, Ordering::SeqCst);
            }
        }
        self.storage = None;
        self.working = None;
        self.dropped = None;
        self.index = NPOS;
        self.guard = None;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        // A Reservation that was neither completed nor cancelled publishes on
        // the way out.
        if self.open() {
            if let Err(err) = self.complete() {
                log::warn!("implicit reservation completion failed: {}", err);
            }
        }
    }
}
