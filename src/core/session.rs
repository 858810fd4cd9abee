// This module provides arena-based generation session management using the bumpalo crate.
// GenerationSession borrows the arena that holds the decision tree built for one generator
// run, so every DecisionNode shares a single lifetime and the whole tree is released at once
// when the arena is dropped after emission. The session also keeps SessionStats: how many
// branch nodes and leaves were built, how deep the tree went, the widest discriminator and
// the number of bytes of Rust text emitted. The driver logs the statistics at info level
// after each run, which is the quickest way to see how a table change reshaped the tree.

//! Arena-based generation session.
//!
//! All decision-tree nodes of one run are allocated in the session arena.

use bumpalo::Bump;
use std::cell::RefCell;
use std::fmt;

/// Arena-backed state for one generator run.
pub struct GenerationSession<'arena> {
    arena: &'arena Bump,
    stats: RefCell<SessionStats>,
}

impl<'arena> GenerationSession<'arena> {
    /// Create a new session over the given arena.
    pub fn new(arena: &'arena Bump) -> Self {
        Self {
            arena,
            stats: RefCell::new(SessionStats::default()),
        }
    }

    /// Get access to the arena allocator.
    pub fn arena(&self) -> &'arena Bump {
        self.arena
    }

    /// Allocate an object in the session arena.
    pub fn alloc<T>(&self, value: T) -> &'arena T {
        self.arena.alloc(value)
    }

    /// Record a branch node discriminating on `width` bits at `depth`.
    pub fn record_branch(&self, width: u8, depth: usize) {
        let mut stats = self.stats.borrow_mut();
        stats.branches += 1;
        stats.widest_branch = stats.widest_branch.max(width);
        stats.max_depth = stats.max_depth.max(depth);
    }

    /// Record a leaf at `depth`.
    pub fn record_leaf(&self, depth: usize) {
        let mut stats = self.stats.borrow_mut();
        stats.leaves += 1;
        stats.max_depth = stats.max_depth.max(depth);
    }

    /// Record emitted text.
    pub fn record_emitted(&self, bytes: usize) {
        self.stats.borrow_mut().emitted_bytes += bytes;
    }

    /// Get generation statistics.
    pub fn stats(&self) -> SessionStats {
        self.stats.borrow().clone()
    }
}

impl fmt::Debug for GenerationSession<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationSession")
            .field("allocated_bytes", &self.arena.allocated_bytes())
            .field("stats", &self.stats.borrow())
            .finish()
    }
}

/// Generation statistics.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionStats {
    /// Branch nodes in the decision tree.
    pub branches: usize,
    /// Leaves, one per instruction.
    pub leaves: usize,
    /// Deepest node (root is depth 0).
    pub max_depth: usize,
    /// Largest discriminator width at any node.
    pub widest_branch: u8,
    /// Bytes of Rust source emitted.
    pub emitted_bytes: usize,
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Generation Session Statistics:")?;
        writeln!(f, "  Branch nodes: {}", self.branches)?;
        writeln!(f, "  Leaves: {}", self.leaves)?;
        writeln!(f, "  Max depth: {}", self.max_depth)?;
        writeln!(f, "  Widest branch: {} bits", self.widest_branch)?;
        write!(f, "  Emitted: {} bytes", self.emitted_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_accumulate() {
        let arena = Bump::new();
        let session = GenerationSession::new(&arena);
        session.record_branch(6, 0);
        session.record_branch(3, 1);
        session.record_leaf(2);
        session.record_leaf(1);
        session.record_emitted(120);

        let stats = session.stats();
        assert_eq!(stats.branches, 2);
        assert_eq!(stats.leaves, 2);
        assert_eq!(stats.max_depth, 2);
        assert_eq!(stats.widest_branch, 6);
        assert_eq!(stats.emitted_bytes, 120);
        assert!(stats.to_string().contains("Leaves: 2"));
    }
}
