//! Identifiers and tags for the staffing graph
//!
//! The store hands out node and edge ids counting up from 1. A simulation
//! overlay mints its own ids counting down from `u64::MAX` through an
//! [`IdMint`], so anything above the midpoint belongs to a scenario and
//! never reaches the store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

const HYPOTHETICAL_FLOOR: u64 = u64::MAX / 2;

macro_rules! arena_id {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl $name {
            pub fn new(id: u64) -> Self {
                $name(id)
            }

            pub fn as_u64(&self) -> u64 {
                self.0
            }

            /// True for ids minted by a simulation overlay rather than the store
            pub fn is_hypothetical(&self) -> bool {
                self.0 > HYPOTHETICAL_FLOOR
            }

            pub(crate) fn slot(&self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_hypothetical() {
                    write!(f, "{}~{}", $prefix, u64::MAX - self.0)
                } else {
                    write!(f, "{}{}", $prefix, self.0)
                }
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                $name(id)
            }
        }
    };
}

arena_id!(
    /// Slot of a candidate, project, skill or affiliation node
    NodeId,
    "n"
);

arena_id!(
    /// Slot of a skill, affiliation or assignment edge
    EdgeId,
    "e"
);

/// Hands out hypothetical ids for one scenario, newest first
#[derive(Debug, Clone)]
pub struct IdMint<T> {
    next: u64,
    _kind: PhantomData<T>,
}

impl<T: From<u64>> IdMint<T> {
    pub fn new() -> Self {
        Self {
            next: u64::MAX,
            _kind: PhantomData,
        }
    }

    pub fn mint(&mut self) -> T {
        let id = self.next;
        self.next -= 1;
        T::from(id)
    }

    /// Number of ids handed out so far
    pub fn minted(&self) -> u64 {
        u64::MAX - self.next
    }
}

impl<T: From<u64>> Default for IdMint<T> {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! graph_tag {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            pub fn new(tag: impl Into<String>) -> Self {
                $name(tag.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }
    };
}

graph_tag!(
    /// Node label such as `Candidate` or `Company`
    Label
);

graph_tag!(
    /// Relationship type such as `HAS_SKILL` or `ASSIGNED_TO`
    EdgeType
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_ids_display_and_order() {
        assert_eq!(NodeId::new(7).to_string(), "n7");
        assert_eq!(EdgeId::new(3).to_string(), "e3");
        assert!(NodeId::new(1) < NodeId::new(2));
        assert!(!NodeId::new(42).is_hypothetical());
    }

    #[test]
    fn test_mint_counts_down_from_the_top() {
        let mut edges: IdMint<EdgeId> = IdMint::new();
        let first = edges.mint();
        let second = edges.mint();
        assert_eq!(first.as_u64(), u64::MAX);
        assert!(second < first);
        assert!(first.is_hypothetical() && second.is_hypothetical());
        assert_eq!(second.to_string(), "e~1");
        assert_eq!(edges.minted(), 2);

        let mut nodes: IdMint<NodeId> = IdMint::default();
        assert!(nodes.mint().is_hypothetical());
    }

    #[test]
    fn test_label_and_edge_type() {
        let label: Label = "Candidate".into();
        assert_eq!(label.as_str(), "Candidate");
        assert_eq!(EdgeType::new("ASSIGNED_TO").to_string(), "ASSIGNED_TO");
    }
}
