//! Debug-only guard against reentrant calls into a map.
//!
//! While an insert, removal or rehash is relinking entries, the bucket
//! index can briefly disagree with the entry sequence. The only user code
//! that runs during those windows is `K: Hash`/`K: Eq`; if such code calls
//! back into the same map, the guard panics in debug builds. Release builds
//! compile the guard away.

#[cfg(debug_assertions)]
use core::cell::Cell;
use core::marker::PhantomData;

#[derive(Debug)]
pub(crate) struct DebugReentrancy {
    #[cfg(debug_assertions)]
    busy: Cell<bool>,
    // The map is single-threaded: keep it !Send + !Sync in every build.
    _unsync: PhantomData<*mut ()>,
}

impl DebugReentrancy {
    pub(crate) const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            busy: Cell::new(false),
            _unsync: PhantomData,
        }
    }

    /// Mark the owner as busy until the returned guard drops.
    #[inline]
    pub(crate) fn enter(&self) -> ReentrancyGuard<'_> {
        #[cfg(debug_assertions)]
        {
            assert!(
                !self.busy.replace(true),
                "reentrant call into ChainedHashMap from key Hash/Eq"
            );
            ReentrancyGuard { owner: self }
        }

        #[cfg(not(debug_assertions))]
        {
            ReentrancyGuard { _owner: PhantomData }
        }
    }
}

impl Default for DebugReentrancy {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) struct ReentrancyGuard<'a> {
    #[cfg(debug_assertions)]
    owner: &'a DebugReentrancy,
    #[cfg(not(debug_assertions))]
    _owner: PhantomData<&'a DebugReentrancy>,
}

impl Drop for ReentrancyGuard<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        self.owner.busy.set(false);
    }
}
