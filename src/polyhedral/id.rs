//! Tuple identities.
//!
//! Every statement domain carries a tuple identity. Identities are compared
//! by their handle, never by name: two identities may print the same and
//! still denote different statements.

use crate::utils::intern::{Symbol, SymbolInterner};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// An opaque tuple identity.
#[derive(Clone, Serialize)]
pub struct TupleId {
    handle: u32,
    name: String,
}

impl TupleId {
    /// The handle assigned by the owning [`IdContext`].
    pub fn handle(&self) -> u32 {
        self.handle
    }

    /// The printable name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for TupleId {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl Eq for TupleId {}

impl Hash for TupleId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.handle.hash(state);
    }
}

impl fmt::Debug for TupleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.handle)
    }
}

impl fmt::Display for TupleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Allocates tuple identities.
///
/// `id` hands out one canonical identity per name, which is what the
/// frontend uses when it reads `S[i]` twice. `fresh` always allocates a new
/// identity, even for a name that is already known.
#[derive(Debug, Default)]
pub struct IdContext {
    names: SymbolInterner,
    canonical: HashMap<Symbol, TupleId>,
    next_handle: u32,
}

impl IdContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// The canonical identity for `name`.
    pub fn id(&mut self, name: &str) -> TupleId {
        let sym = self.names.intern(name);
        if let Some(id) = self.canonical.get(&sym) {
            return id.clone();
        }
        let id = self.allocate(name);
        self.canonical.insert(sym, id.clone());
        id
    }

    /// A new identity that compares unequal to every other identity.
    pub fn fresh(&mut self, name: &str) -> TupleId {
        self.names.intern(name);
        self.allocate(name)
    }

    /// Look up the canonical identity of `name` without allocating.
    pub fn lookup(&self, name: &str) -> Option<&TupleId> {
        let sym = self.names.get(name)?;
        self.canonical.get(&sym)
    }

    /// Number of identities handed out so far.
    pub fn len(&self) -> usize {
        self.next_handle as usize
    }

    pub fn is_empty(&self) -> bool {
        self.next_handle == 0
    }

    fn allocate(&mut self, name: &str) -> TupleId {
        let id = TupleId { handle: self.next_handle, name: name.to_string() };
        self.next_handle += 1;
        id
    }
}
