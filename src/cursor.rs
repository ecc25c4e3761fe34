use core::{fmt, marker::PhantomData, pin::Pin, ptr::NonNull};

use crate::{AvlTree, CursorError, Link, Links, TreeNode};

/// A cursor over an [`AvlTree`].
///
/// A cursor points either to an element of the tree or to a "ghost" non-element that connects the
/// last element to the first. The ghost plays the role of the end position: a failed lookup
/// returns it, and two cursors are equal exactly when they point at the same element or both
/// point at the ghost.
pub struct Cursor<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    curs: CursorRaw<T>,
    phantom: PhantomData<&'tree AvlTree<T>>,
}

impl<'tree, T> Cursor<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    pub(crate) fn at(tree: &'tree AvlTree<T>, ptr: Link<T>) -> Cursor<'tree, T> {
        Cursor {
            curs: CursorRaw {
                tree: NonNull::from(tree),
                ptr,
            },
            phantom: PhantomData,
        }
    }

    pub(crate) fn first(tree: &'tree AvlTree<T>) -> Cursor<'tree, T> {
        Cursor::at(tree, tree.first_raw())
    }

    pub(crate) fn last(tree: &'tree AvlTree<T>) -> Cursor<'tree, T> {
        Cursor::at(tree, tree.last_raw())
    }

    /// Returns `true` if the cursor points at the "ghost" non-element.
    pub fn is_ghost(&self) -> bool {
        self.curs.ptr.is_none()
    }

    /// Moves the cursor to the next element of the `AvlTree`.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method moves it to the first
    /// element. If it is pointing to the last element, this method moves it to the "ghost"
    /// non-element.
    pub fn move_next(&mut self) {
        unsafe { self.curs.move_next() }
    }

    /// Moves the cursor to the previous element of the `AvlTree`.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method moves it to the last
    /// element. If it is pointing to the first element, this method moves it to the "ghost"
    /// non-element.
    pub fn move_prev(&mut self) {
        unsafe { self.curs.move_prev() }
    }

    /// Returns a reference to the item pointed to by the cursor.
    ///
    /// This returns `None` if the cursor is currently pointing to the "ghost" non-element.
    pub fn get(&self) -> Option<&'tree T> {
        unsafe { self.curs.get() }
    }

    /// Returns a reference to the next item.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method returns the first element.
    /// If it is pointing to the last element, this method returns `None`.
    pub fn peek_next(&self) -> Option<&'tree T> {
        unsafe { self.curs.peek_next() }
    }

    /// Returns a reference to the previous item.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method returns the last element.
    /// If it is pointing to the first element, this method returns `None`.
    pub fn peek_prev(&self) -> Option<&'tree T> {
        unsafe { self.curs.peek_prev() }
    }
}

impl<T> Clone for Cursor<'_, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn clone(&self) -> Self {
        Cursor {
            curs: CursorRaw {
                tree: self.curs.tree,
                ptr: self.curs.ptr,
            },
            phantom: PhantomData,
        }
    }
}

impl<T> PartialEq for Cursor<'_, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn eq(&self, other: &Self) -> bool {
        self.curs.ptr == other.curs.ptr
    }
}

impl<T> Eq for Cursor<'_, T> where T: TreeNode<Links<T>> + ?Sized {}

impl<T> fmt::Debug for Cursor<'_, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Cursor")
            .field(&self.get().map(|node| node.key()))
            .finish()
    }
}

/// A cursor over an [`AvlTree`] which supports editing operations.
///
/// A cursor points either to an element of the tree or to a "ghost" non-element that connects the
/// last element to the first.
pub struct CursorMut<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    curs: CursorRaw<T>,
    phantom: PhantomData<&'tree mut AvlTree<T>>,
}

impl<'tree, T> CursorMut<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    pub(crate) fn at(tree: &'tree mut AvlTree<T>, ptr: Link<T>) -> CursorMut<'tree, T> {
        CursorMut {
            curs: CursorRaw {
                tree: NonNull::from(tree),
                ptr,
            },
            phantom: PhantomData,
        }
    }

    pub(crate) fn first(tree: &'tree mut AvlTree<T>) -> CursorMut<'tree, T> {
        let ptr = tree.first_raw();
        CursorMut::at(tree, ptr)
    }

    pub(crate) fn last(tree: &'tree mut AvlTree<T>) -> CursorMut<'tree, T> {
        let ptr = tree.last_raw();
        CursorMut::at(tree, ptr)
    }

    /// Returns a read-only cursor pointing to the current element.
    ///
    /// The `CursorMut` remains immutably borrowed for the lifetime of the returned `Cursor`.
    pub fn as_cursor(&self) -> Cursor<'_, T> {
        Cursor {
            curs: CursorRaw {
                tree: self.curs.tree,
                ptr: self.curs.ptr,
            },
            phantom: PhantomData,
        }
    }

    /// Returns `true` if the cursor points at the "ghost" non-element.
    pub fn is_ghost(&self) -> bool {
        self.curs.ptr.is_none()
    }

    /// Moves the cursor to the next element of the `AvlTree`.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method will move it to the first
    /// element. If it is pointing to the last element, this method will move it to the "ghost"
    /// non-element.
    pub fn move_next(&mut self) {
        unsafe { self.curs.move_next() }
    }

    /// Moves the cursor to the previous element of the `AvlTree`.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method will move it to the last
    /// element. If it is pointing to the first element, this method will move it to the "ghost"
    /// non-element.
    pub fn move_prev(&mut self) {
        unsafe { self.curs.move_prev() }
    }

    /// Returns a reference to the item pointed to by the cursor.
    ///
    /// This returns `None` if the cursor is currently pointing to the "ghost" non-element.
    pub fn get(&self) -> Option<&T> {
        unsafe { self.curs.get() }
    }

    /// Returns a pinned mutable reference to the item pointed to by the cursor.
    ///
    /// This returns `None` if the cursor is currently pointing to the "ghost" non-element.
    ///
    /// # Safety
    ///
    /// The caller must ensure that modifications to the returned value do not violate the
    /// invariants of the tree. In particular, the result of comparisons between the key of the
    /// returned item and the keys of other items in the tree must not change.
    pub unsafe fn get_mut(&mut self) -> Option<Pin<&mut T>> {
        unsafe { self.curs.get_mut() }
    }

    /// Returns a reference to the next item.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method returns the first element.
    /// If it is pointing to the last element, this method returns `None`.
    pub fn peek_next(&self) -> Option<&T> {
        unsafe { self.curs.peek_next() }
    }

    /// Returns a reference to the previous item.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method returns the last element.
    /// If it is pointing to the first element, this method returns `None`.
    pub fn peek_prev(&self) -> Option<&T> {
        unsafe { self.curs.peek_prev() }
    }

    /// Removes the current element from the tree.
    ///
    /// This returns the removed element and moves the cursor to the next element. If the cursor is
    /// pointing to the "ghost" non-element, this method returns [`CursorError::Ghost`], and neither
    /// the tree nor the cursor is modified.
    pub fn remove_current(&mut self) -> Result<T::Handle, CursorError> {
        unsafe { self.curs.remove_current() }
    }

    /// Removes the current element from the tree.
    ///
    /// This returns the removed element and moves the cursor to the previous element. If the
    /// cursor is pointing to the "ghost" non-element, this method returns [`CursorError::Ghost`],
    /// and neither the tree nor the cursor is modified.
    pub fn remove_current_and_move_prev(&mut self) -> Result<T::Handle, CursorError> {
        unsafe { self.curs.remove_current_and_move_prev() }
    }
}

struct CursorRaw<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    tree: NonNull<AvlTree<T>>,
    ptr: Link<T>,
}

impl<T> CursorRaw<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    unsafe fn move_next(&mut self) {
        let tree = unsafe { self.tree.as_ref() };

        self.ptr = match self.ptr {
            Some(p) => unsafe { tree.successor_raw(p) },
            None => tree.first_raw(),
        };
    }

    unsafe fn move_prev(&mut self) {
        let tree = unsafe { self.tree.as_ref() };

        self.ptr = match self.ptr {
            Some(p) => unsafe { tree.predecessor_raw(p) },
            None => tree.last_raw(),
        };
    }

    unsafe fn get<'a>(&self) -> Option<&'a T> {
        self.ptr.map(|p| unsafe { p.as_ref() })
    }

    unsafe fn get_mut<'a>(&mut self) -> Option<Pin<&'a mut T>> {
        self.ptr
            .map(|mut p| unsafe { Pin::new_unchecked(p.as_mut()) })
    }

    unsafe fn peek_next<'a>(&self) -> Option<&'a T> {
        let tree = unsafe { self.tree.as_ref() };

        let next_ptr = match self.ptr {
            Some(p) => unsafe { tree.successor_raw(p) },
            None => tree.first_raw(),
        };

        next_ptr.map(|p| unsafe { p.as_ref() })
    }

    unsafe fn peek_prev<'a>(&self) -> Option<&'a T> {
        let tree = unsafe { self.tree.as_ref() };

        let prev_ptr = match self.ptr {
            Some(p) => unsafe { tree.predecessor_raw(p) },
            None => tree.last_raw(),
        };

        prev_ptr.map(|p| unsafe { p.as_ref() })
    }

    unsafe fn remove_current(&mut self) -> Result<T::Handle, CursorError> {
        let remove = self.ptr.ok_or(CursorError::Ghost)?;

        unsafe {
            self.move_next();

            let tree = self.tree.as_mut();
            Ok(tree.remove_at(remove))
        }
    }

    unsafe fn remove_current_and_move_prev(&mut self) -> Result<T::Handle, CursorError> {
        let remove = self.ptr.ok_or(CursorError::Ghost)?;

        unsafe {
            self.move_prev();

            let tree = self.tree.as_mut();
            Ok(tree.remove_at(remove))
        }
    }
}
