//! Causality counter attached to every journey.
//!
//! A stepper is a path in a tree of counters. Each journey owns one slot (its
//! cursor) and sees the slots of its ancestors as they were when it branched
//! off. Rendering the path gives a sortable string that correlates log lines
//! with their position in the journey:
//!
//! ```
//! use journey_runtime::Stepper;
//!
//! let root = Stepper::new();
//! assert_eq!(root.to_string(), "0000");
//!
//! root.inc();
//! assert_eq!(root.to_string(), "0001");
//!
//! let child = root.branch_off();
//! assert_eq!(child.to_string(), "0002_0000");
//! assert_eq!(root.to_string(), "0002");
//! ```
//!
//! Ancestor slots are an immutable prefix shared with nothing that mutates
//! it; only the node's own slot changes, and it changes through a single
//! atomic read-modify-write. Concurrent `inc` and `branch_off` calls on the
//! same node are therefore linearized without a lock, and every branch
//! observes a distinct slot value.

use std::fmt::{self, Write as _};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Tree-shaped monotonic counter.
#[derive(Debug)]
pub struct Stepper {
    ancestors: Arc<[u32]>,
    current: AtomicU32,
}

impl Stepper {
    /// A root counter: `[0]`, cursor 0.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ancestors: Arc::from(Vec::new()),
            current: AtomicU32::new(0),
        }
    }

    /// Increment the slot at the cursor and return its new value.
    pub fn inc(&self) -> u32 {
        self.current.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
    }

    /// Mark a branch in this counter and return the child's counter.
    ///
    /// The child holds this counter's path (including the increment just made)
    /// followed by a fresh zero slot.
    #[must_use]
    pub fn branch_off(&self) -> Self {
        let marked = self.inc();

        let mut path = Vec::with_capacity(self.ancestors.len() + 1);
        path.extend_from_slice(&self.ancestors);
        path.push(marked);

        Self {
            ancestors: Arc::from(path),
            current: AtomicU32::new(0),
        }
    }

    /// Index of this counter's own slot.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.ancestors.len()
    }

    /// Value of this counter's own slot.
    #[must_use]
    pub fn current(&self) -> u32 {
        self.current.load(Ordering::Acquire)
    }

    /// Snapshot of every slot from the root to the cursor.
    #[must_use]
    pub fn steps(&self) -> Vec<u32> {
        let mut steps = self.ancestors.to_vec();
        steps.push(self.current());
        steps
    }
}

impl Default for Stepper {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Stepper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::with_capacity((self.ancestors.len() + 1) * 5);
        for step in self.ancestors.iter() {
            write!(out, "{step:04}_")?;
        }
        write!(out, "{:04}", self.current())?;
        f.write_str(&out)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn test_fresh_counter_renders_single_slot() {
        let stepper = Stepper::new();
        assert_eq!(stepper.to_string(), "0000");
        assert_eq!(stepper.depth(), 0);
        assert_eq!(stepper.steps(), vec![0]);
    }

    #[test]
    fn test_inc_returns_new_value() {
        let stepper = Stepper::new();
        assert_eq!(stepper.inc(), 1);
        assert_eq!(stepper.inc(), 2);
        assert_eq!(stepper.to_string(), "0002");
    }

    #[test]
    fn test_branch_off_marks_parent_and_appends_slot() {
        let parent = Stepper::new();
        parent.inc();
        let child = parent.branch_off();

        // Parent slot was bumped by the branch itself.
        assert_eq!(child.to_string(), "0002_0000");
        assert_eq!(parent.to_string(), "0002");

        assert_eq!(parent.inc(), 3);
        assert_eq!(parent.to_string(), "0003");
    }

    #[test]
    fn test_branch_from_fresh_root() {
        let root = Stepper::new();
        let child = root.branch_off();

        assert_eq!(child.to_string(), "0001_0000");
        assert_eq!(root.inc(), 2);
        assert_eq!(root.to_string(), "0002");
    }

    #[test]
    fn test_child_is_isolated_from_parent() {
        let parent = Stepper::new();
        let child = parent.branch_off();

        child.inc();
        child.inc();
        parent.inc();

        assert_eq!(child.to_string(), "0001_0002");
        assert_eq!(parent.to_string(), "0002");
    }

    #[test]
    fn test_nested_branches() {
        let root = Stepper::new();
        let child = root.branch_off();
        child.inc();
        let grandchild = child.branch_off();

        assert_eq!(grandchild.to_string(), "0001_0002_0000");
        assert_eq!(grandchild.depth(), 2);
    }

    #[test]
    fn test_concurrent_inc_loses_nothing() {
        const THREADS: u32 = 8;
        const PER_THREAD: u32 = 1_000;

        let stepper = Arc::new(Stepper::new());
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let stepper = Arc::clone(&stepper);
                thread::spawn(move || {
                    for _ in 0..PER_THREAD {
                        stepper.inc();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(stepper.current(), THREADS * PER_THREAD);
    }

    #[test]
    fn test_concurrent_branch_off_yields_distinct_slots() {
        const THREADS: usize = 16;

        let parent = Arc::new(Stepper::new());
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let parent = Arc::clone(&parent);
                thread::spawn(move || parent.branch_off().steps())
            })
            .collect();

        let paths: HashSet<Vec<u32>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(paths.len(), THREADS);
        assert_eq!(parent.current(), u32::try_from(THREADS).unwrap());
        for path in &paths {
            assert_eq!(path.len(), 2);
            assert_eq!(path[1], 0);
        }
    }

    proptest! {
        #[test]
        fn prop_rendering_matches_steps(incs in proptest::collection::vec(0_u32..20, 1..6)) {
            let mut stepper = Stepper::new();
            for (depth, n) in incs.iter().enumerate() {
                for _ in 0..*n {
                    stepper.inc();
                }
                if depth + 1 < incs.len() {
                    stepper = stepper.branch_off();
                }
            }

            let expected = stepper
                .steps()
                .iter()
                .map(|s| format!("{s:04}"))
                .collect::<Vec<_>>()
                .join("_");
            prop_assert_eq!(stepper.to_string(), expected);
            prop_assert_eq!(stepper.depth(), incs.len() - 1);
        }

        #[test]
        fn prop_branch_marks_exactly_once(before in 0_u32..50, branches in 1_usize..10) {
            let parent = Stepper::new();
            for _ in 0..before {
                parent.inc();
            }
            let children: Vec<_> = (0..branches).map(|_| parent.branch_off()).collect();

            prop_assert_eq!(parent.current(), before + u32::try_from(branches).unwrap());
            for (i, child) in children.iter().enumerate() {
                prop_assert_eq!(child.steps(), vec![before + u32::try_from(i).unwrap() + 1, 0]);
            }
        }
    }
}
