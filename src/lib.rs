//! An intrusive AVL tree.
//!
//! [`AvlTree`] keeps its elements in a height-balanced binary search tree whose links are stored
//! inside the elements themselves, in the manner of [`cordyceps`]. [`AvlSet`] builds an owning,
//! by-value ordered set on top of it.
//!
//! Besides the usual lookup, insertion and removal operations, the tree can verify its own
//! structure in a single pass with [`AvlTree::check_invariants`].

// Conventions used in comments:
// - The height of a missing subtree is -1, so a leaf has height 0.
// - The skew of a node `x` is `h(right(x)) - h(left(x))`. Every node caches the sign of its skew
//   as a `Balance` tag.
// - A node is over-balanced if its skew is -2 or +2. Over-balanced nodes only exist transiently
//   during rebalancing and are never recorded in a tag.
//
// The fundamental invariants of an AVL tree are:
// 1. Keys in the left subtree of `x` are less than `x`'s key, keys in the right subtree are greater.
// 2. All skews are -1, 0 or +1.
//
// Corollaries:
// 3. Insertion changes the height of at most one subtree on the path to the root without
//    restoring it, and a single (single or double) rotation restores it. Thus insertion performs
//    at most one rotation.
// 4. A rotation after removal may itself shrink the rotated subtree, so removal may rotate at
//    every level up to the root.

use core::{
    cell::UnsafeCell, cmp::Ordering, fmt, marker::PhantomPinned, ops::Not, pin::Pin,
    ptr::NonNull,
};
use std::borrow::Borrow;

use cordyceps::Linked;

mod cursor;
mod debug;
mod error;
mod iter;
mod sanity;
mod set;
pub mod shell;

#[cfg(any(test, feature = "model"))]
pub mod model;

#[cfg(test)]
mod tests;

pub use cursor::{Cursor, CursorMut};
pub use error::{CursorError, ParseError, ShellError, Violation};
pub use iter::Iter;
pub use set::AvlSet;

pub trait TreeNode<L>: Linked<L> {
    type Key: Ord + fmt::Debug;

    fn key(&self) -> &Self::Key;
}

/// An intrusive AVL tree.
///
/// Every node caches which of its subtrees is taller (its [`Balance`]), and insertion and removal
/// restore the balance invariant with rotations on the way back up to the root.
pub struct AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    root: Link<T>,
    len: usize,
}

/// Links to other nodes in an [`AvlTree`].
///
/// In order to be part of an `AvlTree`, a type must contain an instance of this type and implement
/// [`TreeNode`].
pub struct Links<T: ?Sized> {
    inner: UnsafeCell<LinksInner<T>>,
}

/// Which subtree of a node, if any, is one level taller than the other.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Balance {
    LeftHigh,
    Equal,
    RightHigh,
}

impl Balance {
    /// Returns the skew this tag stands for: `-1`, `0` or `+1`.
    pub const fn skew(self) -> i8 {
        match self {
            Balance::LeftHigh => -1,
            Balance::Equal => 0,
            Balance::RightHigh => 1,
        }
    }

    /// Returns the tag for `skew`, or `None` if the skew is not allowed in an AVL tree.
    pub const fn from_skew(skew: i32) -> Option<Balance> {
        match skew {
            -1 => Some(Balance::LeftHigh),
            0 => Some(Balance::Equal),
            1 => Some(Balance::RightHigh),
            _ => None,
        }
    }

    const fn toward(dir: Dir) -> Balance {
        match dir {
            Dir::Left => Balance::LeftHigh,
            Dir::Right => Balance::RightHigh,
        }
    }

    // Returns the tag after the `dir` subtree grew by one level relative to its sibling.
    //
    // Returns `None` if the node becomes over-balanced.
    const fn tilted(self, dir: Dir) -> Option<Balance> {
        Balance::from_skew(self.skew() as i32 + dir.sign() as i32)
    }

    const fn negated(self) -> Balance {
        match self {
            Balance::LeftHigh => Balance::RightHigh,
            Balance::Equal => Balance::Equal,
            Balance::RightHigh => Balance::LeftHigh,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Dir {
    Left = 0,
    Right = 1,
}

impl Dir {
    const fn sign(self) -> i8 {
        match self {
            Dir::Left => -1,
            Dir::Right => 1,
        }
    }
}

impl Not for Dir {
    type Output = Dir;

    fn not(self) -> Self::Output {
        match self {
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
        }
    }
}

#[repr(C)]
struct LinksInner<T: ?Sized> {
    parent: Link<T>,
    children: [Link<T>; 2],
    balance: Balance,
    _unpin: PhantomPinned,
}

type Link<T> = Option<NonNull<T>>;

#[inline]
unsafe fn links<'a, T>(node: NonNull<T>) -> &'a Links<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    unsafe { T::links(node).as_ref() }
}

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns a new empty tree.
    pub const fn new() -> AvlTree<T> {
        AvlTree { root: None, len: 0 }
    }

    /// Returns `true` if the tree contains no elements.
    pub const fn is_empty(&self) -> bool {
        let empty = self.len() == 0;

        if cfg!(debug_assertions) {
            // Can't use assert_eq!() in const fn.
            assert!(empty == self.root.is_none());
        }

        empty
    }

    /// Returns the number of elements in the tree.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns the height of the tree, or `None` if it is empty.
    ///
    /// A tree with a single element has height 0. The height is found by following the taller
    /// side of every node, so this completes in _O(log(n))_ time but trusts the balance tags.
    pub fn height(&self) -> Option<usize> {
        let mut cur = self.root?;
        let mut height = 0;

        loop {
            let cur_links = unsafe { links(cur) };
            let next = match cur_links.balance() {
                Balance::RightHigh => cur_links.right(),
                Balance::LeftHigh | Balance::Equal => cur_links.left(),
            };

            match next {
                Some(next) => {
                    cur = next;
                    height += 1;
                }
                None => return Some(height),
            }
        }
    }

    /// Returns `true` if the tree contains an element with the given key.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get_raw(key).is_some()
    }

    /// Returns a reference to the element corresponding to `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<Pin<&T>>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let ptr = self.get_raw(key)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_ref())) }
    }

    /// Returns a cursor pointing at the element corresponding to `key`.
    ///
    /// If there is no such element, the cursor points at the "ghost" non-element, which is equal
    /// to [`cursor_end`](AvlTree::cursor_end).
    pub fn find<Q>(&self, key: &Q) -> Cursor<'_, T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let ptr = self.get_raw(key);
        Cursor::at(self, ptr)
    }

    /// Returns a mutable cursor pointing at the element corresponding to `key`.
    pub fn find_mut<Q>(&mut self, key: &Q) -> CursorMut<'_, T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let ptr = self.get_raw(key);
        CursorMut::at(self, ptr)
    }

    pub(crate) fn get_raw<Q>(&self, key: &Q) -> Link<T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut opt_cur = self.root;

        loop {
            let cur = opt_cur?;

            unsafe {
                match key.cmp(cur.as_ref().key().borrow()) {
                    Ordering::Less => opt_cur = links(cur).left(),
                    Ordering::Equal => return Some(cur),
                    Ordering::Greater => opt_cur = links(cur).right(),
                }
            }
        }
    }

    /// Returns the minimum element of the tree.
    pub fn first(&self) -> Option<Pin<&T>> {
        self.first_raw()
            .map(|first| unsafe { Pin::new_unchecked(first.as_ref()) })
    }

    /// Returns the maximum element of the tree.
    pub fn last(&self) -> Option<Pin<&T>> {
        self.last_raw()
            .map(|last| unsafe { Pin::new_unchecked(last.as_ref()) })
    }

    /// Removes and returns the minimum element of the tree.
    pub fn pop_first(&mut self) -> Option<T::Handle> {
        let first = self.first_raw()?;
        Some(unsafe { self.remove_at(first) })
    }

    /// Removes and returns the maximum element of the tree.
    pub fn pop_last(&mut self) -> Option<T::Handle> {
        let last = self.last_raw()?;
        Some(unsafe { self.remove_at(last) })
    }

    /// Returns a cursor pointing at the minimum element of the tree.
    pub fn cursor_first(&self) -> Cursor<'_, T> {
        Cursor::first(self)
    }

    /// Returns a cursor pointing at the maximum element of the tree.
    pub fn cursor_last(&self) -> Cursor<'_, T> {
        Cursor::last(self)
    }

    /// Returns a cursor pointing at the "ghost" non-element past the maximum element.
    pub fn cursor_end(&self) -> Cursor<'_, T> {
        Cursor::at(self, None)
    }

    /// Returns a mutable cursor pointing at the minimum element of the tree.
    pub fn cursor_first_mut(&mut self) -> CursorMut<'_, T> {
        CursorMut::first(self)
    }

    /// Returns a mutable cursor pointing at the maximum element of the tree.
    pub fn cursor_last_mut(&mut self) -> CursorMut<'_, T> {
        CursorMut::last(self)
    }

    /// Returns an iterator over the elements of the tree in ascending key order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self)
    }

    pub(crate) fn first_raw(&self) -> Link<T> {
        self.root.map(|root| unsafe { self.min_in_subtree(root).0 })
    }

    pub(crate) fn last_raw(&self) -> Link<T> {
        self.root.map(|root| unsafe { self.max_in_subtree(root) })
    }

    // Returns the in-order successor of `node`, or `None` if `node` is the maximum.
    pub(crate) unsafe fn successor_raw(&self, node: NonNull<T>) -> Link<T> {
        unsafe {
            if let Some(right) = links(node).right() {
                return Some(self.min_in_subtree(right).0);
            }

            // Climb until arriving from a left child.
            let mut cur = node;
            while let Some(parent) = links(cur).parent() {
                if links(parent).left() == Some(cur) {
                    return Some(parent);
                }

                cur = parent;
            }

            None
        }
    }

    // Returns the in-order predecessor of `node`, or `None` if `node` is the minimum.
    pub(crate) unsafe fn predecessor_raw(&self, node: NonNull<T>) -> Link<T> {
        unsafe {
            if let Some(left) = links(node).left() {
                return Some(self.max_in_subtree(left));
            }

            // Climb until arriving from a right child.
            let mut cur = node;
            while let Some(parent) = links(cur).parent() {
                if links(parent).right() == Some(cur) {
                    return Some(parent);
                }

                cur = parent;
            }

            None
        }
    }

    unsafe fn maybe_set_parent(&mut self, opt_node: Link<T>, parent: Link<T>) {
        let Some(node) = opt_node else {
            return;
        };

        unsafe { links(node).set_parent(parent) };
    }

    #[inline]
    unsafe fn replace_child_or_set_root(
        &mut self,
        parent: Link<T>,
        old_child: NonNull<T>,
        new_child: Link<T>,
    ) {
        match parent {
            Some(parent) => unsafe { self.replace_child(parent, old_child, new_child) },
            None => self.root = new_child,
        }
    }

    // Replaces the child pointer of `parent` pointing at `old_child` with `new_child`.
    //
    // `new_child`'s parent pointer is not updated.
    //
    // # Safety
    //
    // The caller must ensure that the following conditions hold:
    // - `old_child` is a child node of `parent`.
    // - `new_child` is not a child node of `parent`.
    #[inline]
    unsafe fn replace_child(&mut self, parent: NonNull<T>, old_child: NonNull<T>, new_child: Link<T>) {
        unsafe {
            let parent_links = links(parent);
            let dir = self.which_child(parent, old_child);

            debug_assert!(
                new_child.is_none() || parent_links.child(!dir) != new_child,
                "`new_child` must not be a child of `parent`"
            );

            parent_links.set_child(dir, new_child);
        }
    }

    // Rotates the subtree rooted at `a` towards `dir`: `a`'s `!dir` child `b` takes `a`'s place and
    // `a` becomes `b`'s `dir` child. `b`'s inner subtree moves across to `a`.
    //
    //           P?            P?
    //           |             |
    //           A             B
    //          / \           / \
    //         B   C?  =>    D?  A
    //        / \               / \
    //       D?  E?            E?  C?
    //
    // (drawn for `dir == Right`; nodes marked with ? may not exist)
    //
    // Balance tags are not updated; the caller knows why the rotation happened.
    unsafe fn rotate(&mut self, a: NonNull<T>, dir: Dir) {
        unsafe {
            let b = links(a)
                .child(!dir)
                .expect("rotation requires a child to lift");
            let e = links(b).child(dir);
            let parent = links(a).parent();

            log::trace!(
                "rotating {dir:?} at {:?}, lifting {:?}",
                a.as_ref().key(),
                b.as_ref().key()
            );

            links(a).set_child(!dir, e);
            links(a).set_parent(Some(b));

            links(b).set_child(dir, Some(a));
            links(b).set_parent(parent);

            self.maybe_set_parent(e, Some(a));
            self.replace_child_or_set_root(parent, a, Some(b));
        }
    }

    // Performs a double rotation at `a`, whose `!dir` child `b` is heavy on its `dir` side. `b`'s
    // `dir` child `e` takes `a`'s place with `b` and `a` as its children, and `e`'s subtrees are
    // split between them.
    //
    //           P?            P?          P?
    //           |             |           |
    //           A             A           E
    //          / \           / \        /   \
    //         B   C?  =>    E   C? =>  B     A
    //        / \           / \        / \   / \
    //       D?  E         B   G?     D?  F?G?  C?
    //          / \       / \
    //         F?  G?    D?  F?
    //
    // (drawn for `dir == Right`; nodes marked with ? may not exist)
    //
    // Unlike `rotate`, this sets the balance tags of all three nodes, since they only depend on
    // `e`'s tag. Returns `e`, the new subtree root.
    unsafe fn double_rotate(&mut self, b: NonNull<T>, a: NonNull<T>, dir: Dir) -> NonNull<T> {
        unsafe {
            let e = links(b)
                .child(dir)
                .expect("double rotation requires an inner grandchild");
            let f = links(e).child(!dir);
            let g = links(e).child(dir);
            let parent = links(a).parent();

            log::trace!(
                "double rotating {dir:?} at {:?}, lifting {:?}",
                a.as_ref().key(),
                e.as_ref().key()
            );

            let e_balance = links(e).balance();
            let e_skew = e_balance.skew() * dir.sign();

            links(a).set_child(!dir, g);
            links(a).set_parent(Some(e));
            links(a).set_balance(if e_skew >= 0 {
                Balance::Equal
            } else {
                e_balance.negated()
            });

            links(b).set_child(dir, f);
            links(b).set_parent(Some(e));
            links(b).set_balance(if e_skew <= 0 {
                Balance::Equal
            } else {
                e_balance.negated()
            });

            links(e).set_child(dir, Some(a));
            links(e).set_child(!dir, Some(b));
            links(e).set_parent(parent);
            links(e).set_balance(Balance::Equal);

            self.maybe_set_parent(g, Some(a));
            self.maybe_set_parent(f, Some(b));
            self.replace_child_or_set_root(parent, a, Some(e));

            e
        }
    }

    /// Inserts an item into the tree.
    ///
    /// If the tree already contains an element with an equal key, the tree is left unchanged and
    /// `item` is handed back.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn insert(&mut self, item: T::Handle) -> Option<T::Handle> {
        let ptr = T::into_ptr(item);

        unsafe { links(ptr).clear() };

        let Some(root) = self.root else {
            // Tree is empty. Set `item` as the root and return.
            self.root = Some(ptr);
            self.len += 1;
            return None;
        };

        let mut parent = root;

        // Descend the tree, looking for an empty slot.
        loop {
            let ordering = unsafe { ptr.as_ref().key().cmp(parent.as_ref().key()) };

            let dir = match ordering {
                Ordering::Less => Dir::Left,
                Ordering::Greater => Dir::Right,
                Ordering::Equal => {
                    log::trace!("{:?} is already present", unsafe { ptr.as_ref().key() });
                    return Some(unsafe { T::from_ptr(ptr) });
                }
            };

            unsafe {
                match links(parent).child(dir) {
                    // Descend.
                    Some(child) => parent = child,

                    // Set `item` as child.
                    None => {
                        links(parent).set_child(dir, Some(ptr));
                        links(ptr).set_parent(Some(parent));
                        break;
                    }
                }
            }
        }

        self.len += 1;
        unsafe { self.rebalance_inserted(ptr) };

        None
    }

    // Performs a bottom-up rebalance of the tree after the insertion of the leaf `node`.
    unsafe fn rebalance_inserted(&mut self, node: NonNull<T>) {
        unsafe {
            let Some(parent) = links(node).parent() else {
                return;
            };

            // `node` filled an empty slot, so its parent was either a leaf or heavy on the other
            // side. It cannot become over-balanced and needs no rotation.
            let dir = self.which_child(parent, node);
            let balance = links(parent)
                .balance()
                .tilted(dir)
                .expect("parent of a new leaf cannot be over-balanced");
            links(parent).set_balance(balance);

            if balance == Balance::Equal {
                // The parent's height did not change.
                return;
            }

            // The subtree rooted at `child` grew by one level.
            let mut child = parent;
            while let Some(parent) = links(child).parent() {
                if self.rebalance_grown(child, parent) {
                    return;
                }

                child = parent;
            }
        }
    }

    // Handles the growth by one level of the subtree rooted at `child`, a child of `parent`.
    //
    // Returns `true` if the tree is balanced again, or `false` if the subtree rooted at `parent`
    // also grew by one level and the caller should continue up the tree. If `false` is returned, no
    // rotation was performed.
    unsafe fn rebalance_grown(&mut self, child: NonNull<T>, parent: NonNull<T>) -> bool {
        unsafe {
            let dir = self.which_child(parent, child);

            if let Some(balance) = links(parent).balance().tilted(dir) {
                links(parent).set_balance(balance);

                // If the parent was equal it is now one level taller; otherwise the growth evened
                // it out.
                return balance == Balance::Equal;
            }

            // The parent is over-balanced towards `dir`. `child` grew, so it cannot be equal.
            if links(child).balance() == Balance::toward(dir) {
                // `child` is heavy in the same direction as `parent`.
                self.rotate(parent, !dir);
                links(parent).set_balance(Balance::Equal);
                links(child).set_balance(Balance::Equal);
            } else {
                // `child` is heavy in the opposite direction.
                self.double_rotate(child, parent, !dir);
            }

            // The rotated subtree has its height from before the insertion.
            true
        }
    }

    // Returns the minimum node in the subtree.
    //
    // If the subtree root is not the minimum, also returns the minimum node's parent.
    #[inline]
    unsafe fn min_in_subtree(&self, root: NonNull<T>) -> (NonNull<T>, Option<NonNull<T>>) {
        let mut parent = None;
        let mut cur = root;

        while let Some(left) = unsafe { links(cur).left() } {
            parent = Some(cur);
            cur = left;
        }

        (cur, parent)
    }

    #[inline]
    unsafe fn max_in_subtree(&self, root: NonNull<T>) -> NonNull<T> {
        let mut cur = root;

        while let Some(right) = unsafe { links(cur).right() } {
            cur = right;
        }

        cur
    }

    /// Removes the element corresponding to `key` from the tree and returns it.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<T::Handle>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let node = self.get_raw(key)?;
        Some(unsafe { self.remove_at(node) })
    }

    /// Removes an arbitrary node from the tree.
    ///
    /// # Safety
    ///
    /// It is the caller's responsibility to ensure that `node` is an element of `self`, and not any
    /// other tree.
    pub unsafe fn remove_at(&mut self, node: NonNull<T>) -> T::Handle {
        unsafe {
            let mut shrunk = self.unlink(node);

            while let Some((parent, dir)) = shrunk {
                shrunk = self.rebalance_shrunk(parent, dir);
            }

            links(node).clear();
            self.len -= 1;

            T::from_ptr(node)
        }
    }

    // Unlinks `node` from the tree without rebalancing.
    //
    // Returns the node whose subtree shrank by one level and the side that shrank, or `None` if
    // no rebalancing is necessary.
    unsafe fn unlink(&mut self, node: NonNull<T>) -> Option<(NonNull<T>, Dir)> {
        unsafe {
            let left = links(node).left();
            let right = links(node).right();

            if let (Some(left), Some(right)) = (left, right) {
                return Some(self.swap_with_successor(node, left, right));
            }

            // `node` has at most one child, which takes its place.
            let child = left.or(right);
            let parent = links(node).parent();
            self.maybe_set_parent(child, parent);

            match parent {
                Some(parent) => {
                    let dir = self.which_child(parent, node);
                    links(parent).set_child(dir, child);
                    Some((parent, dir))
                }

                // `node` was the root; its child is balanced on its own.
                None => {
                    self.root = child;
                    None
                }
            }
        }
    }

    // Replaces `node`, which has two children, with its successor[^1] and unlinks it.
    //
    // The successor by definition has no left child. Its right child is elevated to replace it,
    // and it assumes `node`'s links and balance tag.
    //
    // Returns the node whose subtree shrank and the side that shrank. This is the successor's
    // old parent, or the successor itself if it was `node`'s right child.
    //
    // [^1]: The successor of a node `a` is the least node in `a`'s right subtree.
    unsafe fn swap_with_successor(
        &mut self,
        node: NonNull<T>,
        left: NonNull<T>,
        right: NonNull<T>,
    ) -> (NonNull<T>, Dir) {
        unsafe {
            let (successor, successor_parent) = self.min_in_subtree(right);

            let shrunk = match successor_parent {
                //     P?           P?
                //     |            |
                //     X            Y
                //    / \          / \
                //   A   Y    =>  A   B?
                //        \
                //         B?
                None => (successor, Dir::Right),

                //     P?           P?
                //     |            |
                //     X            Y
                //    / \          / \
                //   A  ...  =>   A  ...
                //       |            |
                //       Q            Q
                //      /            /
                //     Y            B?
                //      \
                //       B?
                Some(successor_parent) => {
                    let successor_right = links(successor).right();
                    links(successor_parent).set_left(successor_right);
                    self.maybe_set_parent(successor_right, Some(successor_parent));

                    links(successor).set_right(Some(right));
                    links(right).set_parent(Some(successor));

                    (successor_parent, Dir::Left)
                }
            };

            links(successor).set_left(Some(left));
            links(left).set_parent(Some(successor));
            links(successor).set_balance(links(node).balance());

            let parent = links(node).parent();
            links(successor).set_parent(parent);
            self.replace_child_or_set_root(parent, node, Some(successor));

            shrunk
        }
    }

    // Handles the shrinking by one level of the `shrunk` subtree of `parent`.
    //
    // Returns `None` if the tree is balanced again. Otherwise the subtree rooted at `parent` (or at
    // whichever node replaced it in a rotation) also shrank, and its parent and the side it hangs
    // from are returned.
    unsafe fn rebalance_shrunk(
        &mut self,
        parent: NonNull<T>,
        shrunk: Dir,
    ) -> Option<(NonNull<T>, Dir)> {
        unsafe {
            let heavy = !shrunk;
            let old_balance = links(parent).balance();

            let top = match old_balance.tilted(heavy) {
                Some(balance) => {
                    links(parent).set_balance(balance);

                    if old_balance == Balance::Equal {
                        // The parent is now heavy on one side, but its height is unchanged.
                        return None;
                    }

                    // The parent evened out and is one level shorter.
                    parent
                }

                None => {
                    let child = links(parent)
                        .child(heavy)
                        .expect("over-balanced node must have a heavy child");
                    let child_balance = links(child).balance();

                    if child_balance == Balance::toward(shrunk) {
                        self.double_rotate(child, parent, shrunk)
                    } else {
                        self.rotate(parent, shrunk);

                        if child_balance == Balance::Equal {
                            // The child's inner subtree keeps the parent one level taller on the
                            // heavy side, and the rotated subtree keeps its height.
                            links(parent).set_balance(Balance::toward(heavy));
                            links(child).set_balance(Balance::toward(shrunk));
                            return None;
                        }

                        links(parent).set_balance(Balance::Equal);
                        links(child).set_balance(Balance::Equal);
                        child
                    }
                }
            };

            let grandparent = links(top).parent()?;
            Some((grandparent, self.which_child(grandparent, top)))
        }
    }

    /// Clears the tree, removing all elements.
    pub fn clear(&mut self) {
        let mut opt_cur = self.root;

        while let Some(cur) = opt_cur {
            unsafe {
                // Descend to the minimum node.
                let (cur, parent) = self.min_in_subtree(cur);
                let parent = parent.or_else(|| links(cur).parent());

                let right = links(cur).right();

                // Elevate the node's right child (which may be None).
                self.replace_child_or_set_root(parent, cur, right);
                self.maybe_set_parent(right, parent);

                // Drop the node.
                links(cur).clear();
                drop(T::from_ptr(cur));
                self.len -= 1;

                // If the node had no right child, climb to the parent. If the node had no parent,
                // the tree is empty.
                opt_cur = right.or(parent);
            }
        }

        debug_assert!(self.root.is_none());
        debug_assert_eq!(self.len(), 0);
    }

    // Support methods ========================================================

    unsafe fn which_child(&self, parent: NonNull<T>, child: NonNull<T>) -> Dir {
        if unsafe { links(parent).left() } == Some(child) {
            Dir::Left
        } else {
            Dir::Right
        }
    }
}

impl<T> Default for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T> fmt::Debug for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(self.iter().map(|node| node.key()))
            .finish()
    }
}

impl<'tree, T> IntoIterator for &'tree AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    type Item = &'tree T;
    type IntoIter = Iter<'tree, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: ?Sized> Links<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: UnsafeCell::new(LinksInner {
                parent: None,
                children: [None; 2],
                balance: Balance::Equal,
                _unpin: PhantomPinned,
            }),
        }
    }

    #[inline]
    fn balance(&self) -> Balance {
        unsafe { (*self.inner.get()).balance }
    }

    #[inline]
    fn parent(&self) -> Link<T> {
        unsafe { (*self.inner.get()).parent }
    }

    #[inline]
    fn child(&self, dir: Dir) -> Link<T> {
        unsafe { (*self.inner.get()).children[dir as usize] }
    }

    #[inline]
    fn left(&self) -> Link<T> {
        self.child(Dir::Left)
    }

    #[inline]
    fn right(&self) -> Link<T> {
        self.child(Dir::Right)
    }

    // The setters write through the `UnsafeCell` so that no `&mut` to a node's links is ever
    // created while other references to the same node may be live.

    #[inline]
    fn set_parent(&self, parent: Link<T>) {
        unsafe { (*self.inner.get()).parent = parent };
    }

    #[inline]
    fn set_child(&self, dir: Dir, child: Link<T>) {
        unsafe { (*self.inner.get()).children[dir as usize] = child };
    }

    #[inline]
    fn set_left(&self, left: Link<T>) {
        self.set_child(Dir::Left, left)
    }

    #[inline]
    fn set_right(&self, right: Link<T>) {
        self.set_child(Dir::Right, right)
    }

    #[inline]
    fn set_balance(&self, balance: Balance) {
        unsafe { (*self.inner.get()).balance = balance };
    }

    // Resets the links to the state of a detached node.
    fn clear(&self) {
        self.set_parent(None);
        self.set_left(None);
        self.set_right(None);
        self.set_balance(Balance::Equal);
    }
}

impl<T: ?Sized> Default for Links<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Links<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Links")
            .field("parent", &self.parent())
            .field("left", &self.left())
            .field("right", &self.right())
            .field("balance", &self.balance())
            .finish()
    }
}
