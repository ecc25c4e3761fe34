use std::io;

use thiserror::Error;

use crate::Balance;

/// An error returned when editing through a [`CursorMut`](crate::CursorMut).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum CursorError {
    /// The cursor points at the "ghost" non-element, which cannot be removed.
    #[error("the cursor is not pointing at an element")]
    Ghost,
}

/// A structural invariant of an [`AvlTree`](crate::AvlTree) that does not hold.
///
/// Returned by [`AvlTree::check_invariants`](crate::AvlTree::check_invariants). Only the first
/// violation found is reported.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum Violation {
    /// A node's parent link does not point at the node it hangs from.
    #[error("parent link does not point at the node's parent")]
    ParentLink,

    /// A node's key is not within the bounds set by its ancestors.
    #[error("key is out of order with respect to its ancestors")]
    Ordering,

    /// The heights of a node's subtrees differ by more than one.
    #[error("subtree heights differ by {skew}")]
    Unbalanced { skew: i32 },

    /// A node's balance tag does not match the heights of its subtrees.
    #[error("balance tag is {recorded:?} but the subtree heights differ by {actual}")]
    BalanceTag { recorded: Balance, actual: i32 },

    /// The cached length does not match the number of reachable nodes.
    #[error("tree records {recorded} elements but {counted} are reachable")]
    Size { recorded: usize, counted: usize },
}

/// An error encountered while parsing a driver command.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown operation `{0}`")]
    UnknownOperation(String),

    #[error("operation `{0}` requires a key")]
    MissingKey(String),

    #[error("invalid key `{0}`")]
    InvalidKey(String),

    #[error("unexpected trailing input `{0}`")]
    TrailingInput(String),
}

/// An error that stops the command driver.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("I/O error")]
    Io(#[from] io::Error),

    #[error("sanity check failed after `{command}`")]
    Insane {
        command: String,
        #[source]
        violation: Violation,
    },
}
