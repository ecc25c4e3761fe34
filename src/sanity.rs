use crate::{links, AvlTree, Link, Links, TreeNode, Violation};

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns `true` if all structural invariants of the tree hold.
    ///
    /// See [`check_invariants`](AvlTree::check_invariants) for what is checked.
    pub fn sanity_check(&self) -> bool {
        self.check_invariants().is_ok()
    }

    /// Verifies the structure of the tree in a single traversal.
    ///
    /// For every node, this checks that:
    /// - its parent link points at the node it hangs from,
    /// - its key lies strictly between the bounds set by its ancestors,
    /// - the heights of its two subtrees differ by at most one,
    /// - its balance tag agrees with the heights of its two subtrees.
    ///
    /// Finally, the number of nodes reachable from the root must equal [`len`](AvlTree::len).
    ///
    /// This operation completes in _O(n)_ time and does not modify the tree.
    pub fn check_invariants(&self) -> Result<(), Violation> {
        let mut counted = 0;

        unsafe { self.check_subtree(self.root, None, None, None, &mut counted) }?;

        if counted != self.len {
            log::debug!("tree records {} elements but {counted} are reachable", self.len);

            return Err(Violation::Size {
                recorded: self.len,
                counted,
            });
        }

        Ok(())
    }

    // Checks the subtree rooted at `node`, which hangs from `parent`, and returns its height.
    //
    // All keys in the subtree must lie strictly between `lower` and `upper`, where `None` means
    // unbounded. Nodes are counted even when a violation has already been found, so that the
    // final count reflects the whole tree.
    unsafe fn check_subtree<'a>(
        &'a self,
        node: Link<T>,
        parent: Link<T>,
        lower: Option<&'a T::Key>,
        upper: Option<&'a T::Key>,
        counted: &mut usize,
    ) -> Result<i32, Violation> {
        let Some(node) = node else {
            return Ok(-1);
        };

        *counted += 1;

        let (node_links, key) = unsafe { (links(node), node.as_ref().key()) };

        let local = if node_links.parent() != parent {
            Err(Violation::ParentLink)
        } else if lower.is_some_and(|lower| key <= lower) || upper.is_some_and(|upper| key >= upper)
        {
            Err(Violation::Ordering)
        } else {
            Ok(())
        };

        let left = unsafe {
            self.check_subtree(node_links.left(), Some(node), lower, Some(key), counted)
        };
        let right = unsafe {
            self.check_subtree(node_links.right(), Some(node), Some(key), upper, counted)
        };

        if let Err(violation) = local {
            log::debug!("{violation} at {key:?}");
            return Err(violation);
        }

        let (left, right) = (left?, right?);

        let skew = right - left;
        if !(-1..=1).contains(&skew) {
            let violation = Violation::Unbalanced { skew };
            log::debug!("{violation} at {key:?}");
            return Err(violation);
        }

        let recorded = node_links.balance();
        if i32::from(recorded.skew()) != skew {
            let violation = Violation::BalanceTag {
                recorded,
                actual: skew,
            };
            log::debug!("{violation} at {key:?}");
            return Err(violation);
        }

        Ok(left.max(right) + 1)
    }
}
