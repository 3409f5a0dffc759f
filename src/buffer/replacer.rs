//! Recency tracking for frame replacement.
//!
//! Frames are kept in a doubly linked list ordered by access recency:
//! head = most recently used, tail = least recently used. The list is an
//! arena of nodes addressed by frame index, so linkage never allocates and
//! removal is O(1).

use serde::{Deserialize, Serialize};

/// Victim selection order when the pool is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplacementPolicy {
    /// Evict the least recently used unpinned frame (scan from the tail)
    Lru,
    /// Evict the most recently used unpinned frame (scan from the head)
    Mru,
}

#[derive(Clone, Copy, Default)]
struct Node {
    prev: Option<usize>,
    next: Option<usize>,
    linked: bool,
}

/// Recency list over frame indices
pub struct Replacer {
    nodes: Vec<Node>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl Replacer {
    /// Create a replacer able to track `capacity` frames
    pub fn new(capacity: usize) -> Self {
        Self {
            nodes: vec![Node::default(); capacity],
            head: None,
            tail: None,
        }
    }

    /// Record an access: move the frame to the head (most recently used),
    /// linking it first if needed
    pub fn touch(&mut self, frame: usize) {
        if self.nodes[frame].linked {
            if self.head == Some(frame) {
                return;
            }
            self.unlink(frame);
        }
        self.link_head(frame);
    }

    /// Drop a frame from the list entirely (eviction or file release)
    pub fn remove(&mut self, frame: usize) {
        if self.nodes[frame].linked {
            self.unlink(frame);
        }
    }

    /// Find a victim frame according to `policy`, skipping frames for which
    /// `evictable` returns false (pinned frames). Returns `None` if every
    /// linked frame is pinned.
    pub fn victim<F>(&self, policy: ReplacementPolicy, evictable: F) -> Option<usize>
    where
        F: Fn(usize) -> bool,
    {
        match policy {
            ReplacementPolicy::Lru => {
                let mut cur = self.tail;
                while let Some(frame) = cur {
                    if evictable(frame) {
                        return Some(frame);
                    }
                    cur = self.nodes[frame].prev;
                }
                None
            }
            ReplacementPolicy::Mru => {
                let mut cur = self.head;
                while let Some(frame) = cur {
                    if evictable(frame) {
                        return Some(frame);
                    }
                    cur = self.nodes[frame].next;
                }
                None
            }
        }
    }

    fn link_head(&mut self, frame: usize) {
        self.nodes[frame] = Node {
            prev: None,
            next: self.head,
            linked: true,
        };
        if let Some(old_head) = self.head {
            self.nodes[old_head].prev = Some(frame);
        }
        self.head = Some(frame);
        if self.tail.is_none() {
            self.tail = Some(frame);
        }
    }

    fn unlink(&mut self, frame: usize) {
        let node = self.nodes[frame];

        match node.prev {
            Some(prev) => self.nodes[prev].next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => self.nodes[next].prev = node.prev,
            None => self.tail = node.prev,
        }

        self.nodes[frame] = Node::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lru_order() {
        let mut r = Replacer::new(4);
        r.touch(0);
        r.touch(1);
        r.touch(2);

        assert_eq!(r.victim(ReplacementPolicy::Lru, |_| true), Some(0));

        // Touching 0 makes 1 the oldest
        r.touch(0);
        assert_eq!(r.victim(ReplacementPolicy::Lru, |_| true), Some(1));
    }

    #[test]
    fn test_mru_order() {
        let mut r = Replacer::new(4);
        r.touch(0);
        r.touch(1);
        r.touch(2);

        assert_eq!(r.victim(ReplacementPolicy::Mru, |_| true), Some(2));

        r.touch(0);
        assert_eq!(r.victim(ReplacementPolicy::Mru, |_| true), Some(0));
    }

    #[test]
    fn test_victim_skips_pinned() {
        let mut r = Replacer::new(4);
        r.touch(0);
        r.touch(1);
        r.touch(2);

        // 0 is oldest but pinned
        assert_eq!(r.victim(ReplacementPolicy::Lru, |f| f != 0), Some(1));
        assert_eq!(r.victim(ReplacementPolicy::Lru, |_| false), None);
    }

    #[test]
    fn test_remove_relinks_neighbors() {
        let mut r = Replacer::new(4);
        r.touch(0);
        r.touch(1);
        r.touch(2);

        r.remove(1);
        assert_eq!(r.victim(ReplacementPolicy::Lru, |_| true), Some(0));
        r.remove(0);
        assert_eq!(r.victim(ReplacementPolicy::Lru, |_| true), Some(2));
        r.remove(2);
        assert_eq!(r.victim(ReplacementPolicy::Lru, |_| true), None);
    }
}
