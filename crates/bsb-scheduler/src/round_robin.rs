//! Round-robin server cursor.
//!
//! A rotating pointer over the active-server list. Each selection scans
//! forward from the pointer (wrapping) for the first server with room and
//! moves the pointer just past it.

/// Outcome of a cursor scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    /// Index of the chosen server.
    pub index: usize,
    /// Index the scan started at, i.e. the server whose turn it was.
    pub preferred: usize,
}

impl Selection {
    /// True when the preferred server was full and the scan moved on.
    pub fn redirected(&self) -> bool {
        self.index != self.preferred
    }
}

/// Rotating pointer for round-robin server selection.
#[derive(Debug, Default)]
pub struct RoundRobinCursor {
    position: usize,
}

impl RoundRobinCursor {
    pub fn new() -> Self {
        Self { position: 0 }
    }

    /// Scan at most `count` servers starting at the pointer and return the
    /// first index accepted by `has_room`.
    ///
    /// Returns `None` if `count` is zero or every server is full; the
    /// pointer does not move in that case.
    pub fn select(
        &mut self,
        count: usize,
        mut has_room: impl FnMut(usize) -> bool,
    ) -> Option<Selection> {
        if count == 0 {
            return None;
        }
        let start = self.position % count;
        for step in 0..count {
            let idx = (start + step) % count;
            if has_room(idx) {
                self.position = (idx + 1) % count;
                return Some(Selection {
                    index: idx,
                    preferred: start,
                });
            }
        }
        None
    }
}
