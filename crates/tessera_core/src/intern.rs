//! Interned identifiers.
//!
//! An [`Id`] is a small integer handle standing for a string that was interned
//! once for the lifetime of the process. Comparing and hashing ids is as cheap as
//! comparing integers; the name can be recovered with [`Id::name`].
//!
//! The table is read-mostly: lookups of an already interned string only take the
//! read lock. String storage is leaked into a process-wide arena, so handing out
//! `&'static str` names is sound and nothing ever has to be freed.
//!
//! ```rust
//! use tessera_core::Id;
//!
//! let a = Id::new("images");
//! let b = Id::new("images");
//! assert_eq!(a, b);
//! assert_eq!(a.name(), "images");
//! ```

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroU32;
use std::sync::LazyLock;

static TABLE: LazyLock<Interner> = LazyLock::new(Interner::new);

/// Handle to an interned string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(NonZeroU32);

impl Id {
    /// Interns `name` and returns its handle.
    ///
    /// Interning the same content twice yields the same id.
    pub fn new(name: &str) -> Self {
        TABLE.intern(name)
    }

    /// Returns the handle for `name` if it was interned before.
    #[must_use]
    pub fn lookup(name: &str) -> Option<Self> {
        TABLE.lookup(name)
    }

    /// Returns the interned string.
    #[must_use]
    pub fn name(self) -> &'static str {
        TABLE.name(self)
    }

    /// Returns the raw integer value.
    #[must_use]
    pub fn as_u32(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<&str> for Id {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

struct Interner {
    inner: RwLock<InternerState>,
}

#[derive(Default)]
struct InternerState {
    by_name: HashMap<&'static str, Id>,
    names: Vec<&'static str>,
}

impl Interner {
    fn new() -> Self {
        Self {
            inner: RwLock::new(InternerState::default()),
        }
    }

    fn lookup(&self, name: &str) -> Option<Id> {
        self.inner.read().by_name.get(name).copied()
    }

    fn intern(&self, name: &str) -> Id {
        if let Some(id) = self.lookup(name) {
            return id;
        }

        let mut state = self.inner.write();
        // Another thread may have interned it between the two locks.
        if let Some(id) = state.by_name.get(name) {
            return *id;
        }

        let stored: &'static str = Box::leak(name.to_owned().into_boxed_str());
        state.names.push(stored);
        let raw = u32::try_from(state.names.len()).unwrap_or(u32::MAX);
        let id = Id(NonZeroU32::MIN.saturating_add(raw - 1));
        state.by_name.insert(stored, id);
        id
    }

    fn name(&self, id: Id) -> &'static str {
        let index = (id.0.get() - 1) as usize;
        self.inner.read().names.get(index).copied().unwrap_or("")
    }
}
