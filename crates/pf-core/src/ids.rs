use core::fmt;
use core::num::NonZeroU32;

/// Compact identifier handed out by the reactive runtime.
///
/// - `u32` keeps memory small
/// - `NonZero` enables `Option<Id>` to be pointer-optimized
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(NonZeroU32);

impl Id {
    /// Create an Id from a 0-based index by storing index+1.
    ///
    /// Returns `None` once the index space is exhausted.
    pub fn from_index(index: u32) -> Option<Self> {
        index.checked_add(1).and_then(NonZeroU32::new).map(Self)
    }

    /// Recover the 0-based index.
    pub fn index(self) -> u32 {
        self.0.get() - 1
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.index())
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// Sequential allocator for [`Id`]s.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the next id, wrapping back to zero if the space runs out.
    pub fn next_id(&mut self) -> Id {
        let id = match Id::from_index(self.next) {
            Some(id) => id,
            None => {
                self.next = 0;
                Id(NonZeroU32::MIN)
            }
        };
        self.next = self.next.wrapping_add(1);
        id
    }
}

/// Aliases naming what an id refers to.
pub type NodeId = Id;
pub type ListenerId = Id;
