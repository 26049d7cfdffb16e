//! Parent/Child Lifecycle Records
//!
//! One record per spawned child, held in a kernel-wide arena keyed by the
//! child's identifier. The record carries everything the `exec`/`wait`
//! handshake needs: who the parent is, whether the child finished loading,
//! and the exit status once the child is gone.
//!
//! # State Machine
//! ```text
//!             report_load(true)            record_exit(s)
//!   Loading ──────────────────▶ Running ─────────────────▶ Exited(s)
//!      │                          │                           │
//!      │ report_load(false)       │ parent exits              │ wait() collects,
//!      ▼                          ▼                           ▼ record removed
//!  LoadFailed                 Reclaimed ◀─ parent exits ── (removed)
//!  (exec reaps, -1)           (child's exit removes it)
//! ```
//! Removal from the arena is reclamation; the `Reclaimed` variant marks a
//! record whose parent is gone and which the child's own exit will remove.
//!
//! # Ordering
//! The exit status is written and the waiting parent made runnable by one
//! state transition taken under the arena lock, so a parent released from
//! `await_exit` can never observe a stale or missing status. Blocking
//! never spins without yielding: both waits re-check state under the lock
//! and hand the processor back between observations.

use hashbrown::hash_map::Entry;
use hashbrown::HashMap;
use spin::Mutex;

use super::ProcessId;

/// Where a child is in its life, as seen from the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Spawned; the loader has not reported yet.
    Loading,
    /// The loader gave up; `exec` reports failure and reaps the record.
    LoadFailed,
    /// Running normally; exit status unknown.
    Running,
    /// Exited with this status; awaiting collection by `wait`.
    Exited(i32),
    /// Abandoned by its parent; the child's exit removes the record.
    Reclaimed,
}

/// One parent/child link.
#[derive(Debug)]
struct Link {
    parent: ProcessId,
    state: LinkState,
}

/// Arena of lifecycle records for every live parent/child pair.
///
/// The arena lock is the only synchronization between a parent and its
/// children; each record's state is written by exactly one side per
/// transition and read by the other under the same lock.
pub struct LinkTable {
    links: Mutex<HashMap<ProcessId, Link>>,
}

impl LinkTable {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self {
            links: Mutex::new(HashMap::new()),
        }
    }

    /// Track a freshly spawned child of `parent`.
    ///
    /// Called by `exec` after `spawn` returns and before the parent first
    /// yields, so the record exists before the child can report anything.
    pub fn register(&self, parent: ProcessId, child: ProcessId) {
        let mut links = self.links.lock();
        links.insert(
            child,
            Link {
                parent,
                state: LinkState::Loading,
            },
        );
    }

    /// The loader's verdict on the child. Meaningful only once, while the
    /// record is still `Loading`.
    pub fn report_load(&self, child: ProcessId, ok: bool) {
        let mut links = self.links.lock();
        if let Some(link) = links.get_mut(&child) {
            if link.state == LinkState::Loading {
                link.state = if ok {
                    LinkState::Running
                } else {
                    LinkState::LoadFailed
                };
            }
        }
    }

    /// Block until the child's load outcome is known.
    ///
    /// Returns `true` if the child loaded (even if it has already exited
    /// again by the time the parent looks). On failure the record is
    /// reaped here, so a later `wait` on the same id reports no such
    /// child.
    pub fn await_load(&self, child: ProcessId, mut yield_fn: impl FnMut()) -> bool {
        loop {
            {
                let mut links = self.links.lock();
                match links.get(&child).map(|link| link.state) {
                    None => return false,
                    Some(LinkState::Loading) => {}
                    Some(LinkState::LoadFailed) => {
                        links.remove(&child);
                        return false;
                    }
                    Some(_) => return true,
                }
            }
            yield_fn();
        }
    }

    /// Record the exit status of `child` and wake a waiting parent.
    ///
    /// Called exactly once by the child itself, on its own exit path. A
    /// child with no record (no live parent, or never spawned through
    /// `exec`) is a valid, quiet case. A record already abandoned by the
    /// parent is garbage now that both sides are done with it.
    pub fn record_exit(&self, child: ProcessId, status: i32) {
        let mut links = self.links.lock();
        if let Entry::Occupied(mut entry) = links.entry(child) {
            match entry.get().state {
                LinkState::Loading | LinkState::Running => {
                    entry.get_mut().state = LinkState::Exited(status);
                }
                LinkState::Reclaimed => {
                    entry.remove();
                }
                // First writer wins; the status is written exactly once.
                LinkState::LoadFailed | LinkState::Exited(_) => {}
            }
        }
    }

    /// Block until `child` exits and collect its status.
    ///
    /// Returns -1 when there is no live link owned by the caller: the id
    /// was never a child of `parent`, the child was already waited for, or
    /// it never started. Collecting the status reclaims the record, so a
    /// second wait on the same child reports -1.
    pub fn await_exit(&self, parent: ProcessId, child: ProcessId, mut yield_fn: impl FnMut()) -> i32 {
        loop {
            {
                let mut links = self.links.lock();
                match links.get(&child) {
                    None => return -1,
                    Some(link) if link.parent != parent => return -1,
                    Some(link) => match link.state {
                        LinkState::Exited(status) => {
                            links.remove(&child);
                            return status;
                        }
                        LinkState::LoadFailed | LinkState::Reclaimed => return -1,
                        LinkState::Loading | LinkState::Running => {}
                    },
                }
            }
            yield_fn();
        }
    }

    /// Abandon every record `parent` owns.
    ///
    /// Called when the parent exits without waiting. Records of children
    /// that already finished are garbage immediately; records of running
    /// children stay behind as `Reclaimed` until the child's own exit
    /// removes them.
    pub fn detach(&self, parent: ProcessId) {
        let mut links = self.links.lock();
        links.retain(|_, link| {
            if link.parent != parent {
                return true;
            }
            match link.state {
                LinkState::Loading | LinkState::Running => {
                    link.state = LinkState::Reclaimed;
                    true
                }
                _ => false,
            }
        });
    }

    /// Current state of a child's record, if one exists.
    pub fn state(&self, child: ProcessId) -> Option<LinkState> {
        self.links.lock().get(&child).map(|link| link.state)
    }

    /// Number of records in the arena.
    pub fn len(&self) -> usize {
        self.links.lock().len()
    }

    /// Whether the arena holds no records at all.
    pub fn is_empty(&self) -> bool {
        self.links.lock().is_empty()
    }
}

impl Default for LinkTable {
    fn default() -> Self {
        Self::new()
    }
}
