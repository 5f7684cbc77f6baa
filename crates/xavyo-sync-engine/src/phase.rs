//! Phase stack ("bag").
//!
//! One logical listing can walk several independently paginated
//! sub-collections. Each sub-collection is a [`Phase`] keyed by a
//! listing-specific enum; the active phase is the top of a [`PhaseStack`].
//! The whole stack round-trips through the same opaque token format as a bare
//! [`Cursor`], and a bare cursor token decodes as a one-phase stack of the
//! default kind.

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::cursor::{decode_token, encode_token, Cursor};
use crate::error::{SyncError, SyncResult};

/// Key identifying what a phase enumerates.
///
/// Implemented automatically for any enum (or other type) with the listed
/// traits. `Default` is the kind synthesized for bare-cursor tokens.
pub trait PhaseKind:
    Serialize + DeserializeOwned + Clone + Debug + PartialEq + Default + Send + Sync
{
}

impl<T> PhaseKind for T where
    T: Serialize + DeserializeOwned + Clone + Debug + PartialEq + Default + Send + Sync
{
}

/// Phase kind for listings that only ever have one phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinglePhase {
    #[default]
    All,
}

/// One named sub-enumeration and its position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Phase<K> {
    pub kind: K,
    pub cursor: Cursor,
}

impl<K> Phase<K> {
    pub fn new(kind: K, cursor: Cursor) -> Self {
        Self { kind, cursor }
    }
}

/// Ordered stack of phases, top = active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhaseStack<K> {
    /// Bottom first; the last element is the active phase.
    phases: Vec<Phase<K>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TokenRepr<K> {
    Stack(PhaseStack<K>),
    Cursor(Cursor),
}

impl<K> Default for PhaseStack<K> {
    fn default() -> Self {
        Self { phases: Vec::new() }
    }
}

impl<K: PhaseKind> PhaseStack<K> {
    /// Create an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a token.
    ///
    /// An empty token gives an empty stack (nothing started yet). A bare
    /// cursor gives a single phase of `K::default()`.
    pub fn from_token(token: &str) -> SyncResult<Self> {
        if token.is_empty() {
            return Ok(Self::new());
        }

        match decode_token::<TokenRepr<K>>(token)? {
            TokenRepr::Stack(stack) => {
                if stack.phases.is_empty() {
                    return Err(SyncError::malformed("phase stack token with no phases"));
                }
                for phase in &stack.phases {
                    phase.cursor.validate()?;
                }
                Ok(stack)
            }
            TokenRepr::Cursor(cursor) => {
                cursor.validate()?;
                Ok(Self {
                    phases: vec![Phase::new(K::default(), cursor)],
                })
            }
        }
    }

    /// Encode to a token. An empty stack encodes as the empty token, which
    /// callers read as "fully synced".
    pub fn to_token(&self) -> String {
        if self.phases.is_empty() {
            return String::new();
        }
        encode_token(self)
    }

    /// Push a phase on top; it becomes active.
    pub fn push(&mut self, phase: Phase<K>) {
        self.phases.push(phase);
    }

    /// Push several phases so that the first one ends up on top.
    pub fn push_all(&mut self, phases: impl IntoIterator<Item = Phase<K>>) {
        let mut phases: Vec<_> = phases.into_iter().collect();
        phases.reverse();
        self.phases.extend(phases);
    }

    /// Remove and return the active phase.
    pub fn pop(&mut self) -> Option<Phase<K>> {
        self.phases.pop()
    }

    /// The active phase, or `None` once synchronization is complete.
    pub fn current(&self) -> Option<&Phase<K>> {
        self.phases.last()
    }

    /// Replace the active phase, returning the previous one.
    pub fn replace_top(&mut self, phase: Phase<K>) -> Option<Phase<K>> {
        let previous = self.phases.pop();
        self.phases.push(phase);
        previous
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// Phases from the active one down to the bottom.
    pub fn iter(&self) -> impl Iterator<Item = &Phase<K>> {
        self.phases.iter().rev()
    }
}
