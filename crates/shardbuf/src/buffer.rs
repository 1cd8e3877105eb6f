use crossbeam_utils::{Backoff, CachePadded};
use std::cell::UnsafeCell;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

// =============================================================================
// MEMORY ORDERING & SYNCHRONIZATION STRATEGY
// =============================================================================
//
// A `LogBuffer` is a multi-producer single-drainer byte region with the
// following protocol:
//
// ## Reserve-Then-Copy (producers)
//
// 1. Load `sealed` with Acquire; a sealed region accepts nothing
// 2. Load `cursor` with Acquire, compute the end of the framed record
// 3. CAS `cursor` forward to claim the range; on failure, retry from step 1
// 4. Copy the record into the claimed range (no ordering needed - every
//    claimed range is disjoint, so the copies never overlap)
// 5. Add the framed length to `committed` with Release (publishes the copy)
//
// The lock-based path runs the identical sequence under `write_lock`. The
// mutex serializes producers against each other, but the reservation is still
// a CAS: the drain side never takes the lock, and only a CAS can detect that
// a reset moved the cursor between a writer's sealed check and its claim.
// `cursor` and `committed` remain atomics for the same reason.
//
// ## Seal-Settle-Drain (consumer)
//
// The cursor alone does not prove the bytes are there: a producer advances
// `cursor` *before* it copies. The drain side must therefore:
//
// 1. Store `sealed = true` with Release (stops new reservations)
// 2. Spin until `committed` catches up with a stable `cursor` (`settle`).
//    Producers that slipped past the sealed check before step 1 are absorbed
//    here: their CAS still lands, and the settle loop re-reads the cursor
//    until no reservation is outstanding
// 3. Read `[0, cursor)` - the Acquire load of `committed` synchronizes with
//    every producer's Release add, so the copies are visible
// 4. `reset`: zero `committed` and `cursor`, bump `generation`, then clear
//    `sealed` with Release so a producer that observes WRITABLE also observes
//    the zeroed cursor
//
// ## Single-Drainer Invariant
//
// `settle`, `filled` and `reset` are drain-side operations. Exactly one
// consumer may run them at a time, and only on a region that producers can no
// longer reach (sealed, or swapped out of the active designation). The engine
// enforces this with its flush permit; this crate documents it.
//
// =============================================================================

/// How a producer claims space in a region.
///
/// Both modes share the seal/settle/reset lifecycle and the observable append
/// contract; they differ only in whether producers serialize on a mutex
/// before running the reserve-then-copy sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Compare-and-swap reservation, copy outside any lock.
    Cas,
    /// The whole append runs under an internal mutex.
    Locked,
}

/// A successful append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Written {
    /// Framed bytes placed in the region (record plus terminator if added).
    pub len: usize,
    /// The append filled the region exactly and sealed it.
    pub sealed: bool,
}

/// Error types for append operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PushError {
    /// The region is sealed (or this record would overflow it) and needs a
    /// flush before it can accept more data.
    #[error("buffer is sealed and awaiting flush")]
    Sealed,
}

/// Fixed-capacity byte region with an atomic reserve-and-copy append path.
///
/// Records are newline-framed: a terminator is appended unless the record
/// already ends with one. The region seals itself when an append would
/// overflow or lands exactly on the capacity boundary.
pub struct LogBuffer {
    // === PRODUCER HOT === (cache-line padded)
    /// Reservation offset. Monotone non-decreasing up to `capacity` between
    /// resets; its value after seal is the exact byte length to flush.
    cursor: CachePadded<AtomicUsize>,
    /// Bytes whose copy has completed. `committed == cursor` means no copy is
    /// in flight.
    committed: CachePadded<AtomicUsize>,

    // === COLD STATE ===
    /// WRITABLE / SEALED state machine. Cleared only by the drain side.
    sealed: AtomicBool,
    /// Bumped on every reset; identifies buffer generations in diagnostics.
    generation: AtomicU64,
    /// Serializes appends in `WriteMode::Locked`.
    write_lock: Mutex<()>,
    capacity: usize,

    // === DATA ===
    storage: UnsafeCell<Box<[u8]>>,
}

// Safety: the reserve-then-copy protocol guarantees that concurrent writers
// touch disjoint ranges of `storage`, and the drain side reads only after
// `settle` has observed every copy via the committed counter.
unsafe impl Send for LogBuffer {}
unsafe impl Sync for LogBuffer {}

impl LogBuffer {
    /// Creates a new region of the given capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "buffer capacity must be greater than zero");
        Self {
            cursor: CachePadded::new(AtomicUsize::new(0)),
            committed: CachePadded::new(AtomicUsize::new(0)),
            sealed: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            write_lock: Mutex::new(()),
            capacity,
            storage: UnsafeCell::new(vec![0u8; capacity].into_boxed_slice()),
        }
    }

    // ---------------------------------------------------------------------
    // STATUS
    // ---------------------------------------------------------------------

    /// Returns the region capacity in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the current reservation offset.
    #[inline]
    pub fn len(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    /// Returns true if nothing has been reserved since the last reset.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if at least one byte has been reserved.
    #[inline]
    pub fn has_data(&self) -> bool {
        !self.is_empty()
    }

    /// Returns true if the region is sealed.
    #[inline]
    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    /// Returns the current generation counter.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }

    /// Framed length of a record: a newline terminator is added unless the
    /// record already carries one.
    #[inline]
    pub fn framed_len(record: &[u8]) -> usize {
        record.len() + usize::from(!record.ends_with(b"\n"))
    }

    // ---------------------------------------------------------------------
    // PRODUCER API
    // ---------------------------------------------------------------------

    /// Appends a record using the mode-appropriate protocol.
    #[inline]
    pub fn push_with(&self, mode: WriteMode, record: &[u8]) -> Result<Written, PushError> {
        match mode {
            WriteMode::Cas => self.push(record),
            WriteMode::Locked => self.push_locked(record),
        }
    }

    /// Lock-free append: CAS reserve, then copy into the claimed range.
    ///
    /// Seals the region (idempotently) when the record does not fit, and
    /// reports `sealed` when this append lands exactly on the capacity
    /// boundary.
    pub fn push(&self, record: &[u8]) -> Result<Written, PushError> {
        let need = Self::framed_len(record);
        loop {
            if self.is_sealed() {
                return Err(PushError::Sealed);
            }

            let cur = self.cursor.load(Ordering::Acquire);
            let end = cur + need;
            if end > self.capacity {
                self.seal();
                return Err(PushError::Sealed);
            }

            if self
                .cursor
                .compare_exchange_weak(cur, end, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                // Lost the range: a peer writer claimed it, the drain side
                // reset the region, or the weak CAS failed spuriously.
                continue;
            }

            self.copy_into(cur, record, need);
            self.committed.fetch_add(need, Ordering::Release);

            let sealed = end == self.capacity;
            if sealed {
                self.seal();
            }
            return Ok(Written { len: need, sealed });
        }
    }

    /// Lock-based append: the identical contract with the whole sequence
    /// serialized under a mutex.
    ///
    /// The reservation stays a CAS even though writer-writer contention is
    /// gone: the drain side does not take the lock, so a reset can move the
    /// cursor between this writer's sealed check and its claim, and a plain
    /// store would silently re-expose recycled bytes. The CAS fails in that
    /// window and the loop re-reads the fresh state.
    pub fn push_locked(&self, record: &[u8]) -> Result<Written, PushError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.push(record)
    }

    /// Seals the region. Idempotent; sealed regions reject all appends until
    /// the drain side resets them.
    #[inline]
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::Release);
    }

    fn copy_into(&self, offset: usize, record: &[u8], framed: usize) {
        // SAFETY: [offset, offset + framed) was claimed exclusively by this
        // writer's CAS on `cursor`. No other writer touches the range, and
        // the drain side reads it only after `settle` observes the matching
        // `committed` add.
        unsafe {
            let storage = &mut *self.storage.get();
            let dst = storage.as_mut_ptr().add(offset);
            ptr::copy_nonoverlapping(record.as_ptr(), dst, record.len());
            if framed > record.len() {
                *dst.add(record.len()) = b'\n';
            }
        }
    }

    // ---------------------------------------------------------------------
    // DRAIN API (single consumer, sealed or swapped-out regions only)
    // ---------------------------------------------------------------------

    /// Waits until every in-flight copy has landed and returns the stable
    /// byte length of the region.
    ///
    /// Call after `seal` (or after the region left the active designation):
    /// only finitely many writers can still be between their sealed check and
    /// their reservation, so the loop terminates.
    pub fn settle(&self) -> usize {
        let outer = Backoff::new();
        loop {
            let cur = self.cursor.load(Ordering::Acquire);

            let wait = Backoff::new();
            while self.committed.load(Ordering::Acquire) < cur {
                wait.snooze();
            }

            // A straggler may have reserved between the two loads; only a
            // stable cursor proves the region is quiescent.
            if self.cursor.load(Ordering::Acquire) == cur {
                return cur;
            }
            outer.snooze();
        }
    }

    /// Returns the drained view `[0, len)` where `len` came from `settle`.
    pub fn filled(&self, len: usize) -> &[u8] {
        assert!(len <= self.capacity, "filled length exceeds capacity");
        // SAFETY: `len` was returned by `settle`, so every byte below it has
        // been published with Release and observed with Acquire. Producers
        // cannot claim below `cursor`, so the view is immutable until `reset`.
        unsafe {
            let storage = &*self.storage.get();
            std::slice::from_raw_parts(storage.as_ptr(), len)
        }
    }

    /// Recycles the region for a new generation.
    ///
    /// Drain side only, after a successful sink write (or for an empty
    /// region). Clearing `sealed` last, with Release, guarantees a producer
    /// that observes WRITABLE also observes the zeroed cursor.
    pub fn reset(&self) {
        self.committed.store(0, Ordering::Relaxed);
        self.cursor.store(0, Ordering::Relaxed);
        self.generation.fetch_add(1, Ordering::Relaxed);
        self.sealed.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for LogBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogBuffer")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("sealed", &self.is_sealed())
            .field("generation", &self.generation())
            .finish()
    }
}
