/// Lock/reachability pair. Only constructible in shapes where an unreachable
/// vault is also locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockState {
    locked: bool,
    backend_reachable: bool,
}

impl LockState {
    pub const fn initial() -> Self {
        Self::unreachable()
    }

    pub const fn unreachable() -> Self {
        Self {
            locked: true,
            backend_reachable: false,
        }
    }

    pub const fn reachable(locked: bool) -> Self {
        Self {
            locked,
            backend_reachable: true,
        }
    }

    pub fn locked(&self) -> bool {
        self.locked
    }

    pub fn is_unlocked(&self) -> bool {
        !self.locked
    }

    pub fn backend_reachable(&self) -> bool {
        self.backend_reachable
    }
}

impl Default for LockState {
    fn default() -> Self {
        Self::initial()
    }
}

/// Sequence number handed out when a state-affecting request is issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Seq(u64);

/// Last-writer-wins holder: an outcome is applied only if no request issued
/// after it has already applied its own.
#[derive(Debug, Default)]
pub struct LockTracker {
    state: LockState,
    issued: u64,
    applied: u64,
}

impl LockTracker {
    pub fn state(&self) -> LockState {
        self.state
    }

    pub fn begin(&mut self) -> Seq {
        self.issued += 1;
        Seq(self.issued)
    }

    pub fn apply(&mut self, seq: Seq, next: LockState) -> bool {
        if seq.0 <= self.applied {
            return false;
        }
        self.applied = seq.0;
        self.state = next;
        true
    }
}
