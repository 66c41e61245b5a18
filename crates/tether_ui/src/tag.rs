//! View tag allocation

use std::sync::atomic::{AtomicU32, Ordering};

use tether_core::ViewTag;

/// Hands out view tags for natively created views.
///
/// Tags start at 1; tag 0 is never valid. Tags chosen by script are reported
/// through [`observe`](Self::observe) so native allocations never collide
/// with them.
#[derive(Debug)]
pub struct ViewTagAllocator {
    next: AtomicU32,
}

impl Default for ViewTagAllocator {
    fn default() -> Self {
        Self {
            next: AtomicU32::new(1),
        }
    }
}

impl ViewTagAllocator {
    /// Create an allocator starting at tag 1
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh tag
    pub fn allocate(&self) -> ViewTag {
        ViewTag::new(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Record a tag chosen elsewhere so it is never handed out
    pub fn observe(&self, tag: ViewTag) {
        self.next.fetch_max(tag.raw().saturating_add(1), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_skips_observed() {
        let tags = ViewTagAllocator::new();
        assert_eq!(tags.allocate(), ViewTag::new(1));
        tags.observe(ViewTag::new(10));
        assert_eq!(tags.allocate(), ViewTag::new(11));
        tags.observe(ViewTag::new(4));
        assert_eq!(tags.allocate(), ViewTag::new(12));
    }
}
