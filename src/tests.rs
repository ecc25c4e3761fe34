extern crate std;

use std::{ops::Range, prelude::v1::*};

use cordyceps::Linked;
use proptest::prelude::*;

use crate::model::{self, TestNode};

use super::*;

fn tree_of(keys: &[u32]) -> AvlTree<TestNode> {
    let mut tree = AvlTree::new();

    for &key in keys {
        tree.insert(TestNode::new(key));
    }

    tree
}

fn keys(tree: &AvlTree<TestNode>) -> Vec<u32> {
    tree.iter().map(|node| node.key).collect()
}

fn root_key(tree: &AvlTree<TestNode>) -> Option<u32> {
    tree.root.map(|root| unsafe { root.as_ref().key })
}

fn insert_find_all(keys: &[u32]) {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for &key in keys {
        assert!(tree.insert(TestNode::new(key)).is_none());
        tree.check_invariants().expect("invariant violated");
    }

    for key in keys {
        let node = tree.get_raw(key).expect("item not found");
        assert_eq!(unsafe { node.as_ref().key() }, key);
    }
}

#[test]
fn zero_elems_find() {
    insert_find_all(&[]);
}

#[test]
fn single_elem_find() {
    insert_find_all(&[0]);
}

#[test]
fn two_elems_find() {
    insert_find_all(&[0, 1]);
    insert_find_all(&[1, 0]);
}

#[test]
fn three_elems_find() {
    insert_find_all(&[0, 1, 2]);
    insert_find_all(&[0, 2, 1]);
    insert_find_all(&[1, 0, 2]);
    insert_find_all(&[1, 2, 0]);
    insert_find_all(&[2, 0, 1]);
    insert_find_all(&[2, 1, 0]);
}

#[test]
fn four_elems_find() {
    insert_find_all(&[0, 1, 2, 3]);
    insert_find_all(&[0, 1, 3, 2]);
    insert_find_all(&[0, 2, 1, 3]);
    insert_find_all(&[0, 2, 3, 1]);
    insert_find_all(&[0, 3, 1, 2]);
    insert_find_all(&[0, 3, 2, 1]);

    insert_find_all(&[1, 0, 2, 3]);
    insert_find_all(&[1, 0, 3, 2]);
    insert_find_all(&[1, 2, 0, 3]);
    insert_find_all(&[1, 2, 3, 0]);
    insert_find_all(&[1, 3, 0, 2]);
    insert_find_all(&[1, 3, 2, 0]);

    insert_find_all(&[2, 0, 1, 3]);
    insert_find_all(&[2, 0, 3, 1]);
    insert_find_all(&[2, 1, 0, 3]);
    insert_find_all(&[2, 1, 3, 0]);
    insert_find_all(&[2, 3, 0, 1]);
    insert_find_all(&[2, 3, 1, 0]);

    insert_find_all(&[3, 0, 1, 2]);
    insert_find_all(&[3, 0, 2, 1]);
    insert_find_all(&[3, 1, 0, 2]);
    insert_find_all(&[3, 1, 2, 0]);
    insert_find_all(&[3, 2, 0, 1]);
    insert_find_all(&[3, 2, 1, 0]);
}

fn insert_remove_all(keys: &[u32]) {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for &key in keys {
        tree.insert(TestNode::new(key));
        tree.check_invariants().expect("invariant violated");
    }

    for key in keys {
        let node = tree.get_raw(key).expect("item not found");
        let removed = unsafe { tree.remove_at(node) };
        assert_eq!(removed.key, *key);
        tree.check_invariants().expect("invariant violated");
    }

    assert!(tree.is_empty());

    for &key in keys {
        tree.insert(TestNode::new(key));
        tree.check_invariants().expect("invariant violated");
    }

    for key in keys.iter().rev() {
        assert!(tree.remove(key).is_some());
        tree.check_invariants().expect("invariant violated");
    }

    assert!(tree.is_empty());
}

#[test]
fn remove_one() {
    insert_remove_all(&[0]);
}

#[test]
fn remove_two() {
    insert_remove_all(&[0, 1]);
    insert_remove_all(&[1, 0]);
}

#[test]
fn remove_three() {
    insert_remove_all(&[0, 1, 2]);
    insert_remove_all(&[0, 2, 1]);
    insert_remove_all(&[1, 0, 2]);
    insert_remove_all(&[1, 2, 0]);
    insert_remove_all(&[2, 0, 1]);
    insert_remove_all(&[2, 1, 0]);
}

#[test]
fn remove_four() {
    insert_remove_all(&[0, 1, 2, 3]);
    insert_remove_all(&[0, 1, 3, 2]);
    insert_remove_all(&[0, 2, 1, 3]);
    insert_remove_all(&[0, 2, 3, 1]);
    insert_remove_all(&[0, 3, 1, 2]);
    insert_remove_all(&[0, 3, 2, 1]);

    insert_remove_all(&[1, 0, 2, 3]);
    insert_remove_all(&[1, 0, 3, 2]);
    insert_remove_all(&[1, 2, 0, 3]);
    insert_remove_all(&[1, 2, 3, 0]);
    insert_remove_all(&[1, 3, 0, 2]);
    insert_remove_all(&[1, 3, 2, 0]);

    insert_remove_all(&[2, 0, 1, 3]);
    insert_remove_all(&[2, 0, 3, 1]);
    insert_remove_all(&[2, 1, 0, 3]);
    insert_remove_all(&[2, 1, 3, 0]);
    insert_remove_all(&[2, 3, 0, 1]);
    insert_remove_all(&[2, 3, 1, 0]);

    insert_remove_all(&[3, 0, 1, 2]);
    insert_remove_all(&[3, 0, 2, 1]);
    insert_remove_all(&[3, 1, 0, 2]);
    insert_remove_all(&[3, 1, 2, 0]);
    insert_remove_all(&[3, 2, 0, 1]);
    insert_remove_all(&[3, 2, 1, 0]);
}

#[test]
fn balanced_insertions_need_no_rotation() {
    let tree = tree_of(&[5, 3, 8, 1, 4, 7, 9]);

    assert_eq!(keys(&tree), [1, 3, 4, 5, 7, 8, 9]);
    assert_eq!(root_key(&tree), Some(5));
    assert_eq!(tree.height(), Some(2));
    assert!(tree.sanity_check());
}

#[test]
fn ascending_insertions_rotate() {
    let tree = tree_of(&[1, 2, 3, 4, 5]);

    assert_eq!(keys(&tree), [1, 2, 3, 4, 5]);
    assert_eq!(root_key(&tree), Some(2));
    assert_eq!(tree.height(), Some(2));
    assert!(tree.sanity_check());
}

#[test]
fn double_rotations() {
    // Left-right and right-left cases on three nodes.
    for keys_in in [[3, 1, 2], [1, 3, 2]] {
        let tree = tree_of(&keys_in);

        assert_eq!(root_key(&tree), Some(2));
        assert_eq!(tree.height(), Some(1));
        tree.check_invariants().expect("invariant violated");
    }
}

#[test]
fn removing_the_root_promotes_its_successor() {
    let mut tree = tree_of(&[10, 5, 15, 3, 7, 12, 20]);

    let removed = tree.remove(&10).expect("root not found");
    assert_eq!(removed.key, 10);

    assert_eq!(root_key(&tree), Some(12));
    assert_eq!(keys(&tree), [3, 5, 7, 12, 15, 20]);
    tree.check_invariants().expect("invariant violated");
}

#[test]
fn removal_rotates_at_several_levels() {
    // A Fibonacci tree of height 4: removing its shallowest leaf unbalances two ancestors.
    let mut tree = tree_of(&[8, 5, 11, 3, 7, 10, 12, 2, 4, 6, 9, 1]);
    assert_eq!(tree.height(), Some(4));

    assert!(tree.remove(&12).is_some());

    tree.check_invariants().expect("invariant violated");
    assert_eq!(tree.height(), Some(3));
    assert_eq!(root_key(&tree), Some(5));
    assert_eq!(keys(&tree), [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11]);
}

#[test]
fn empty_tree() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    assert!(tree.is_empty());
    assert_eq!(tree.len(), 0);
    assert_eq!(tree.height(), None);
    assert!(tree.iter().next().is_none());
    assert!(tree.first().is_none());
    assert!(tree.pop_last().is_none());
    assert!(tree.find(&1).is_ghost());
    assert_eq!(tree.find(&1), tree.cursor_end());
    assert!(tree.sanity_check());
    assert_eq!(format!("{tree:?}"), "{}");
}

#[test]
fn removing_a_missing_key_changes_nothing() {
    let mut tree = tree_of(&[2, 1, 3]);

    assert!(tree.remove(&4).is_none());

    let mut cursor = tree.cursor_last_mut();
    cursor.move_next();
    assert!(matches!(cursor.remove_current(), Err(CursorError::Ghost)));
    assert!(cursor.is_ghost());

    assert_eq!(tree.len(), 3);
    assert_eq!(keys(&tree), [1, 2, 3]);
    tree.check_invariants().expect("invariant violated");
}

#[test]
fn removing_the_only_element_empties_the_tree() {
    let mut tree = tree_of(&[42]);

    let removed = tree.remove(&42).expect("item not found");
    assert_eq!(removed.key, 42);

    assert!(tree.is_empty());
    assert_eq!(root_key(&tree), None);
    assert!(tree.sanity_check());
}

#[test]
fn duplicate_insertion_hands_the_item_back() {
    let mut tree = tree_of(&[1, 2, 3]);

    let rejected = tree.insert(TestNode::new(2)).expect("duplicate accepted");
    assert_eq!(rejected.key, 2);

    assert_eq!(tree.len(), 3);
    tree.check_invariants().expect("invariant violated");
}

#[test]
fn find_and_cursors() {
    let mut tree = tree_of(&[4, 2, 6, 1, 3, 5, 7]);

    let mut cursor = tree.find(&3);
    assert_eq!(cursor.get().map(|node| node.key), Some(3));
    cursor.move_next();
    assert_eq!(cursor.get().map(|node| node.key), Some(4));
    assert_eq!(cursor.peek_prev().map(|node| node.key), Some(3));

    let mut cursor = tree.cursor_last();
    cursor.move_next();
    assert_eq!(cursor, tree.cursor_end());
    cursor.move_next();
    assert_eq!(cursor, tree.cursor_first());

    let mut cursor = tree.find_mut(&4);
    let removed = cursor.remove_current().expect("cursor at ghost");
    assert_eq!(removed.key, 4);
    assert_eq!(cursor.get().map(|node| node.key), Some(5));

    let removed = cursor
        .remove_current_and_move_prev()
        .expect("cursor at ghost");
    assert_eq!(removed.key, 5);
    assert_eq!(cursor.get().map(|node| node.key), Some(3));

    assert_eq!(keys(&tree), [1, 2, 3, 6, 7]);
    tree.check_invariants().expect("invariant violated");
}

#[test]
fn iterates_from_both_ends() {
    let tree = tree_of(&[3, 1, 4, 5, 9, 2, 6]);

    let mut iter = tree.iter();
    assert_eq!(iter.len(), 7);
    assert_eq!(iter.next().map(|node| node.key), Some(1));
    assert_eq!(iter.next_back().map(|node| node.key), Some(9));
    assert_eq!(iter.len(), 5);

    let middle = iter.map(|node| node.key).collect::<Vec<_>>();
    assert_eq!(middle, [2, 3, 4, 5, 6]);

    let rev = tree.iter().rev().map(|node| node.key).collect::<Vec<_>>();
    assert_eq!(rev, [9, 6, 5, 4, 3, 2, 1]);
}

#[test]
fn clear_then_reuse() {
    let mut tree = tree_of(&[5, 4, 3, 2, 1]);

    tree.clear();
    assert!(tree.is_empty());
    assert!(tree.sanity_check());

    tree.insert(TestNode::new(7));
    assert_eq!(keys(&tree), [7]);
    assert_eq!(tree.height(), Some(0));
}

#[test]
fn max_height_follows_sparsest_trees() {
    assert_eq!(model::max_height(0), None);
    assert_eq!(model::max_height(1), Some(0));
    assert_eq!(model::max_height(2), Some(1));
    assert_eq!(model::max_height(3), Some(1));
    assert_eq!(model::max_height(4), Some(2));
    assert_eq!(model::max_height(7), Some(3));
    assert_eq!(model::max_height(12), Some(4));
    assert_eq!(model::max_height(20), Some(5));
}

#[test]
fn detects_wrong_balance_tag() {
    let tree = tree_of(&[2, 1, 3]);
    let root = tree.root.expect("empty tree");

    unsafe { links(root).set_balance(Balance::RightHigh) };
    assert_eq!(
        tree.check_invariants(),
        Err(Violation::BalanceTag {
            recorded: Balance::RightHigh,
            actual: 0,
        })
    );
    assert!(!tree.sanity_check());

    unsafe { links(root).set_balance(Balance::Equal) };
    assert_eq!(tree.check_invariants(), Ok(()));
}

#[test]
fn detects_wrong_parent_link() {
    let tree = tree_of(&[2, 1, 3]);
    let leaf = tree.get_raw(&1).expect("item not found");
    let parent = unsafe { links(leaf).parent() };

    unsafe { links(leaf).set_parent(None) };
    assert_eq!(tree.check_invariants(), Err(Violation::ParentLink));

    unsafe { links(leaf).set_parent(parent) };
    assert_eq!(tree.check_invariants(), Ok(()));
}

#[test]
fn detects_out_of_order_keys() {
    let tree = tree_of(&[2, 1, 3]);
    let leaf = tree.get_raw(&1).expect("item not found");

    unsafe { (*leaf.as_ptr()).key = 10 };
    assert_eq!(tree.check_invariants(), Err(Violation::Ordering));

    unsafe { (*leaf.as_ptr()).key = 1 };
    assert_eq!(tree.check_invariants(), Ok(()));
}

#[test]
fn detects_wrong_length() {
    let mut tree = tree_of(&[2, 1, 3]);

    tree.len += 1;
    assert_eq!(
        tree.check_invariants(),
        Err(Violation::Size {
            recorded: 4,
            counted: 3,
        })
    );

    tree.len -= 1;
    assert_eq!(tree.check_invariants(), Ok(()));
}

#[test]
fn detects_unbalanced_subtree() {
    let mut tree = tree_of(&[2, 1, 3]);
    let three = tree.get_raw(&3).expect("item not found");

    // Hang a chain of two nodes off the right of 3 without rebalancing.
    let four = TestNode::into_ptr(TestNode::new(4));
    let five = TestNode::into_ptr(TestNode::new(5));
    unsafe {
        links(three).set_right(Some(four));
        links(four).set_parent(Some(three));
        links(four).set_right(Some(five));
        links(four).set_balance(Balance::RightHigh);
        links(five).set_parent(Some(four));
    }
    tree.len += 2;

    assert_eq!(
        tree.check_invariants(),
        Err(Violation::Unbalanced { skew: 2 })
    );
}

#[cfg(miri)]
const FUZZ_RANGE: Range<usize> = 0..10;

#[cfg(not(miri))]
const FUZZ_RANGE: Range<usize> = 0..1000;

proptest::proptest! {
    #![proptest_config(ProptestConfig {
        max_shrink_iters: 65536,
        .. ProptestConfig::default()
    })]

    #[test]
    fn btree_equivalence(ops in proptest::collection::vec(model::op_strategy(), FUZZ_RANGE)) {
        model::run_btree_equivalence(ops);
    }

    #[test]
    fn cursor_equivalence(
        values in proptest::collection::vec(0u32..1000, 0..100),
        ops in proptest::collection::vec(model::cursor_op_strategy(), FUZZ_RANGE),
    ) {
        model::run_cursor_equivalence(values, ops);
    }

    #[test]
    fn insertion_is_idempotent(keys_in in proptest::collection::vec(0u32..100, 0..200)) {
        let mut tree = tree_of(&keys_in);
        let before = keys(&tree);

        for &key in &keys_in {
            prop_assert!(tree.insert(TestNode::new(key)).is_some());
        }

        prop_assert_eq!(keys(&tree), before);
        prop_assert!(tree.sanity_check());
    }

    #[test]
    fn height_stays_logarithmic(keys_in in proptest::collection::vec(any::<u32>(), 1..500)) {
        let tree = tree_of(&keys_in);

        prop_assert!(tree.height() <= model::max_height(tree.len()));
    }
}
