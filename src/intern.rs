//! Name interning for repeated field and layer names.
//!
//! A tshark export repeats the same field names (`"ip.src"`, `"tcp.port"`,
//! ...) once per packet, so a million-frame capture would otherwise allocate
//! millions of copies of a few hundred distinct strings. The [`Interner`]
//! canonicalizes each name to a shared [`NameHandle`]; handle comparison is a
//! pointer check in the common case.
//!
//! The interner is an explicit, injectable object rather than process-global
//! state: share one `Arc<Interner>` across readers to pool their names, or
//! give each reader its own.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, RwLock};

use serde::{Serialize, Serializer};

/// An opaque, cheaply-comparable identifier for an interned name string.
///
/// Two handles compare equal iff the underlying strings are equal. Handles
/// from the same [`Interner`] share storage, so equality is normally a single
/// pointer comparison; handles from different interners fall back to a string
/// comparison, preserving the same semantics.
#[derive(Clone)]
pub struct NameHandle(Arc<str>);

impl NameHandle {
    /// The interned name string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for NameHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for NameHandle {}

impl std::hash::Hash for NameHandle {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        // Hash the string, not the pointer: equal strings from different
        // interners must land in the same bucket.
        self.0.hash(state);
    }
}

impl fmt::Debug for NameHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NameHandle({:?})", &*self.0)
    }
}

impl fmt::Display for NameHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for NameHandle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Handles for the names the decoder matches by identity.
///
/// Registered once at interner construction, before any decoding.
#[derive(Debug, Clone)]
pub struct WellKnownNames {
    pub frame: NameHandle,
    pub frame_number: NameHandle,
    pub frame_len: NameHandle,
    pub frame_time_epoch: NameHandle,
    pub frame_time_relative: NameHandle,
}

/// Deduplicating registry of name strings.
///
/// Safe for concurrent use; multiple readers decoding in parallel may share
/// one interner behind an `Arc`.
pub struct Interner {
    names: RwLock<HashSet<Arc<str>>>,
    well_known: WellKnownNames,
}

impl Interner {
    pub fn new() -> Self {
        let names = RwLock::new(HashSet::new());
        Self {
            well_known: WellKnownNames {
                frame: intern_into(&names, "frame"),
                frame_number: intern_into(&names, "frame.number"),
                frame_len: intern_into(&names, "frame.len"),
                frame_time_epoch: intern_into(&names, "frame.time_epoch"),
                frame_time_relative: intern_into(&names, "frame.time_relative"),
            },
            names,
        }
    }

    /// Canonicalize `name` to a shared handle.
    ///
    /// Idempotent: repeated calls with equal strings return equal handles
    /// backed by the same allocation.
    pub fn intern(&self, name: &str) -> NameHandle {
        if let Some(existing) = self
            .names
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name)
        {
            return NameHandle(Arc::clone(existing));
        }
        intern_into(&self.names, name)
    }

    /// Handles for the well-known `frame` layer fields.
    pub fn well_known(&self) -> &WellKnownNames {
        &self.well_known
    }

    /// Number of distinct names currently registered.
    pub fn len(&self) -> usize {
        self.names.read().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Interner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interner").field("names", &self.len()).finish()
    }
}

fn intern_into(names: &RwLock<HashSet<Arc<str>>>, name: &str) -> NameHandle {
    let mut table = names.write().unwrap_or_else(|poisoned| poisoned.into_inner());
    // Re-check under the write lock: another thread may have inserted the
    // name between our read and write.
    if let Some(existing) = table.get(name) {
        return NameHandle(Arc::clone(existing));
    }
    let shared: Arc<str> = Arc::from(name);
    table.insert(Arc::clone(&shared));
    NameHandle(shared)
}
