extern crate alloc;

use alloc::boxed::Box;
use core::{borrow::Borrow, fmt, iter::FusedIterator, marker::PhantomPinned, ptr::NonNull};

use cordyceps::Linked;

use crate::{AvlTree, Cursor, CursorError, CursorMut, Iter, Links, TreeNode, Violation};

/// An ordered set based on an [AVL tree].
///
/// Every key is stored in its own heap-allocated node, which is freed when the key is removed.
///
/// [AVL tree]: https://en.wikipedia.org/wiki/AVL_tree
pub struct AvlSet<K: Ord + fmt::Debug> {
    tree: AvlTree<SetNode<K>>,
}

struct SetNode<K> {
    links: Links<SetNode<K>>,
    key: K,
    _unpin: PhantomPinned,
}

impl<K> SetNode<K> {
    fn new(key: K) -> Box<SetNode<K>> {
        Box::new(SetNode {
            links: Links::new(),
            key,
            _unpin: PhantomPinned,
        })
    }

    #[allow(clippy::boxed_local)]
    fn into_key(self: Box<Self>) -> K {
        let SetNode { key, .. } = *self;
        key
    }
}

unsafe impl<K> Linked<Links<SetNode<K>>> for SetNode<K> {
    type Handle = Box<Self>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        Box::leak(r).into()
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<SetNode<K>>> {
        let ptr = ptr.as_ptr();
        unsafe { NonNull::new_unchecked(core::ptr::addr_of_mut!((*ptr).links)) }
    }
}

impl<K: Ord + fmt::Debug> TreeNode<Links<SetNode<K>>> for SetNode<K> {
    type Key = K;

    fn key(&self) -> &Self::Key {
        &self.key
    }
}

impl<K: Ord + fmt::Debug> AvlSet<K> {
    /// Creates a new, empty `AvlSet`.
    pub const fn new() -> Self {
        Self {
            tree: AvlTree::new(),
        }
    }

    /// Returns `true` if the set contains no elements.
    pub const fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Returns the number of elements in the set.
    pub const fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns the height of the underlying tree, or `None` if the set is empty.
    pub fn height(&self) -> Option<usize> {
        self.tree.height()
    }

    /// Adds `key` to the set.
    ///
    /// Returns `false`, leaving the set unchanged, if an equal key is already present.
    pub fn insert(&mut self, key: K) -> bool {
        self.tree.insert(SetNode::new(key)).is_none()
    }

    /// Returns `true` if the set contains `key`.
    #[inline]
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.contains_key(key)
    }

    /// Returns a reference to the key in the set that is equal to `key`.
    #[inline]
    pub fn get<Q>(&self, key: &Q) -> Option<&K>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.get(key).map(|node| &node.get_ref().key)
    }

    /// Returns a cursor pointing at `key`, or at the end of the set if `key` is not present.
    #[inline]
    pub fn lookup<Q>(&self, key: &Q) -> SetCursor<'_, K>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        SetCursor {
            inner: self.tree.find(key),
        }
    }

    /// Returns a mutable cursor pointing at `key`, or at the end of the set if `key` is not
    /// present.
    #[inline]
    pub fn lookup_mut<Q>(&mut self, key: &Q) -> SetCursorMut<'_, K>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        SetCursorMut {
            inner: self.tree.find_mut(key),
        }
    }

    /// Removes `key` from the set, returning `true` if it was present.
    #[inline]
    pub fn remove<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.take(key).is_some()
    }

    /// Removes and returns the key in the set that is equal to `key`.
    #[inline]
    pub fn take<Q>(&mut self, key: &Q) -> Option<K>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.remove(key).map(SetNode::into_key)
    }

    /// Returns the minimum key in the set.
    #[inline]
    pub fn first(&self) -> Option<&K> {
        self.tree.first().map(|node| &node.get_ref().key)
    }

    /// Removes and returns the minimum key in the set.
    #[inline]
    pub fn pop_first(&mut self) -> Option<K> {
        self.tree.pop_first().map(SetNode::into_key)
    }

    /// Returns the maximum key in the set.
    #[inline]
    pub fn last(&self) -> Option<&K> {
        self.tree.last().map(|node| &node.get_ref().key)
    }

    /// Removes and returns the maximum key in the set.
    #[inline]
    pub fn pop_last(&mut self) -> Option<K> {
        self.tree.pop_last().map(SetNode::into_key)
    }

    /// Clears the set, removing all elements.
    #[inline]
    pub fn clear(&mut self) {
        self.tree.clear();
    }

    /// Returns an iterator over the keys of the set, in ascending order.
    pub fn iter(&self) -> SetIter<'_, K> {
        SetIter {
            inner: self.tree.iter(),
        }
    }

    /// Returns a cursor pointing at the minimum key.
    pub fn cursor_first(&self) -> SetCursor<'_, K> {
        SetCursor {
            inner: self.tree.cursor_first(),
        }
    }

    /// Returns a cursor pointing at the end of the set.
    pub fn cursor_end(&self) -> SetCursor<'_, K> {
        SetCursor {
            inner: self.tree.cursor_end(),
        }
    }

    /// Returns a mutable cursor pointing at the minimum key.
    pub fn cursor_first_mut(&mut self) -> SetCursorMut<'_, K> {
        SetCursorMut {
            inner: self.tree.cursor_first_mut(),
        }
    }

    /// Returns `true` if all structural invariants of the underlying tree hold.
    pub fn sanity_check(&self) -> bool {
        self.tree.sanity_check()
    }

    /// Verifies the structure of the underlying tree.
    ///
    /// See [`AvlTree::check_invariants`].
    pub fn check_invariants(&self) -> Result<(), Violation> {
        self.tree.check_invariants()
    }

    /// Writes the underlying tree in graphviz format.
    pub fn dotgraph<W>(&self, name: &str, w: W) -> fmt::Result
    where
        W: fmt::Write,
        K: fmt::Display,
    {
        self.tree.dotgraph(name, w)
    }
}

impl<K: Ord + fmt::Debug> Default for AvlSet<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + fmt::Debug> fmt::Debug for AvlSet<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<K: Ord + fmt::Debug + Clone> Clone for AvlSet<K> {
    fn clone(&self) -> Self {
        self.iter().cloned().collect()
    }
}

impl<K: Ord + fmt::Debug> FromIterator<K> for AvlSet<K> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut set = AvlSet::new();
        set.extend(iter);
        set
    }
}

impl<K: Ord + fmt::Debug> Extend<K> for AvlSet<K> {
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        for key in iter {
            self.insert(key);
        }
    }
}

impl<'set, K: Ord + fmt::Debug> IntoIterator for &'set AvlSet<K> {
    type Item = &'set K;
    type IntoIter = SetIter<'set, K>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// An iterator over the keys of an [`AvlSet`], in ascending order.
pub struct SetIter<'set, K: Ord + fmt::Debug> {
    inner: Iter<'set, SetNode<K>>,
}

impl<'set, K: Ord + fmt::Debug> Iterator for SetIter<'set, K> {
    type Item = &'set K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|node| &node.key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K: Ord + fmt::Debug> DoubleEndedIterator for SetIter<'_, K> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|node| &node.key)
    }
}

impl<K: Ord + fmt::Debug> ExactSizeIterator for SetIter<'_, K> {}

impl<K: Ord + fmt::Debug> FusedIterator for SetIter<'_, K> {}

/// A cursor over an [`AvlSet`].
///
/// Two cursors are equal if they point at the same key, or if both point at the end of the set.
pub struct SetCursor<'set, K: Ord + fmt::Debug> {
    inner: Cursor<'set, SetNode<K>>,
}

impl<'set, K: Ord + fmt::Debug> SetCursor<'set, K> {
    /// Returns the key the cursor points at, or `None` at the end of the set.
    pub fn get(&self) -> Option<&'set K> {
        self.inner.get().map(|node| &node.key)
    }

    /// Returns `true` if the cursor points at the end of the set.
    pub fn is_end(&self) -> bool {
        self.inner.is_ghost()
    }

    /// Moves the cursor to the next key, or from the last key to the end of the set.
    ///
    /// Moving past the end of the set wraps around to the first key.
    pub fn move_next(&mut self) {
        self.inner.move_next();
    }

    /// Moves the cursor to the previous key, or from the first key to the end of the set.
    pub fn move_prev(&mut self) {
        self.inner.move_prev();
    }
}

impl<K: Ord + fmt::Debug> Clone for SetCursor<'_, K> {
    fn clone(&self) -> Self {
        SetCursor {
            inner: self.inner.clone(),
        }
    }
}

impl<K: Ord + fmt::Debug> PartialEq for SetCursor<'_, K> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<K: Ord + fmt::Debug> Eq for SetCursor<'_, K> {}

impl<K: Ord + fmt::Debug> fmt::Debug for SetCursor<'_, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SetCursor").field(&self.get()).finish()
    }
}

/// A cursor over an [`AvlSet`] which can remove keys.
pub struct SetCursorMut<'set, K: Ord + fmt::Debug> {
    inner: CursorMut<'set, SetNode<K>>,
}

impl<K: Ord + fmt::Debug> SetCursorMut<'_, K> {
    /// Returns the key the cursor points at, or `None` at the end of the set.
    pub fn get(&self) -> Option<&K> {
        self.inner.get().map(|node| &node.key)
    }

    /// Returns `true` if the cursor points at the end of the set.
    pub fn is_end(&self) -> bool {
        self.inner.is_ghost()
    }

    /// Moves the cursor to the next key, or from the last key to the end of the set.
    pub fn move_next(&mut self) {
        self.inner.move_next();
    }

    /// Moves the cursor to the previous key, or from the first key to the end of the set.
    pub fn move_prev(&mut self) {
        self.inner.move_prev();
    }

    /// Removes the key the cursor points at and moves the cursor to the next key.
    ///
    /// Fails with [`CursorError::Ghost`] at the end of the set.
    pub fn remove_current(&mut self) -> Result<K, CursorError> {
        self.inner.remove_current().map(SetNode::into_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_is_idempotent() {
        let mut set = AvlSet::new();

        assert!(set.insert(3));
        assert!(set.insert(1));
        assert!(!set.insert(3));

        assert_eq!(set.len(), 2);
        assert_eq!(set.iter().copied().collect::<Vec<_>>(), [1, 3]);
        assert!(set.sanity_check());
    }

    #[test]
    fn lookup_finds_present_keys_only() {
        let set: AvlSet<u32> = [5, 3, 8].into_iter().collect();

        assert_eq!(set.lookup(&3).get(), Some(&3));
        assert_eq!(set.lookup(&4), set.cursor_end());
        assert!(set.lookup(&4).is_end());
    }

    #[test]
    fn cursor_walks_in_order() {
        let set: AvlSet<u32> = [5, 3, 8, 1, 4, 7, 9].into_iter().collect();

        let mut cursor = set.cursor_first();
        let mut seen = Vec::new();
        while let Some(&key) = cursor.get() {
            seen.push(key);
            cursor.move_next();
        }

        assert_eq!(seen, [1, 3, 4, 5, 7, 8, 9]);
        assert_eq!(cursor, set.cursor_end());

        // Stepping past the end starts over.
        cursor.move_next();
        assert_eq!(cursor, set.cursor_first());
    }

    #[test]
    fn cursor_removal() {
        let mut set: AvlSet<u32> = (0..10).collect();

        let mut cursor = set.lookup_mut(&4);
        assert_eq!(cursor.remove_current(), Ok(4));
        assert_eq!(cursor.get(), Some(&5));

        let mut end = set.lookup_mut(&42);
        assert_eq!(end.remove_current(), Err(CursorError::Ghost));

        assert_eq!(set.len(), 9);
        assert!(!set.contains(&4));
        assert!(set.sanity_check());
    }

    #[test]
    fn pop_first_and_last() {
        let mut set: AvlSet<u32> = (0..5).collect();

        assert_eq!(set.pop_first(), Some(0));
        assert_eq!(set.pop_last(), Some(4));
        assert_eq!(set.first(), Some(&1));
        assert_eq!(set.last(), Some(&3));
        assert!(set.sanity_check());
    }

    #[test]
    fn clone_and_borrowed_lookups() {
        let set: AvlSet<String> = ["pear", "apple", "fig"].map(String::from).into_iter().collect();
        let copy = set.clone();

        assert!(copy.contains("fig"));
        assert_eq!(copy.get("apple").map(String::as_str), Some("apple"));
        assert_eq!(format!("{copy:?}"), r#"{"apple", "fig", "pear"}"#);
        assert!(copy.sanity_check());
    }
}
