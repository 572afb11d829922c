use alloc::sync::Arc;
use alloc::vec::Vec;

use super::node::{make_mut, Direction, Node, NodeRef, Target};
use super::owner::Owner;

/// The core B-tree implementation backing `CowTree`.
///
/// Owns the root edge, the item count, the branching parameter, the order
/// predicate, and the identity under which nodes may be edited in place.
pub(crate) struct RawCowTree<T, C> {
    /// Edge to the root node, if the tree is non-empty.
    root: Option<NodeRef<T>>,
    /// Total number of items in the tree.
    len: usize,
    /// Branching parameter; every non-root node holds between `degree - 1`
    /// and `2 * degree - 1` items.
    degree: usize,
    /// The caller's strict weak order.
    less: C,
    /// Identity stamped onto nodes this tree may edit in place.
    owner: Owner,
}

impl<T, C> RawCowTree<T, C> {
    /// Creates a new, empty tree.
    ///
    /// # Panics
    ///
    /// Panics if `degree < 2`.
    pub(crate) fn new(degree: usize, less: C) -> Self {
        assert!(degree >= 2, "`RawCowTree::new()` - `degree` must be at least 2!");
        Self {
            root: None,
            len: 0,
            degree,
            less,
            owner: Owner::new(),
        }
    }

    /// Returns the number of items in the tree.
    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the tree contains no items.
    pub(crate) const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the branching parameter the tree was built with.
    pub(crate) const fn degree(&self) -> usize {
        self.degree
    }

    /// Returns the order predicate.
    pub(crate) fn less(&self) -> &C {
        &self.less
    }

    /// Returns the root node, if any.
    pub(crate) fn root_node(&self) -> Option<&Node<T>> {
        self.root.as_deref()
    }

    /// Maximum number of items per node.
    const fn max_items(&self) -> usize {
        2 * self.degree - 1
    }

    /// Minimum number of items per non-root node.
    const fn min_items(&self) -> usize {
        self.degree - 1
    }

    /// Removes all items from the tree, keeping degree and order.
    pub(crate) fn clear(&mut self) {
        self.release_root();
        self.len = 0;
    }

    /// Drops the root edge without recursing through the node drop glue.
    ///
    /// Exclusively owned nodes are unwrapped and their child edges pushed
    /// onto an explicit worklist; shared nodes die later by refcount alone.
    fn release_root(&mut self) {
        let mut worklist: Vec<NodeRef<T>> = Vec::new();
        worklist.extend(self.root.take());
        while let Some(edge) = worklist.pop() {
            if let Ok(node) = Arc::try_unwrap(edge) {
                worklist.extend(node.into_children());
            }
        }
    }
}

impl<T, C> Drop for RawCowTree<T, C> {
    fn drop(&mut self) {
        self.release_root();
    }
}

impl<T, C: Clone> Clone for RawCowTree<T, C> {
    /// Logical snapshot in O(1): the root edge is shared and the copy gets
    /// a fresh identity, so neither tree will edit shared nodes in place.
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            len: self.len,
            degree: self.degree,
            less: self.less.clone(),
            owner: Owner::new(),
        }
    }
}

impl<T, C> RawCowTree<T, C>
where
    C: Fn(&T, &T) -> bool,
{
    /// Returns the item comparing equal to `key`, if present.
    pub(crate) fn get(&self, key: &T) -> Option<&T> {
        self.root.as_ref()?.get(key, &self.less)
    }

    /// Returns true if an item comparing equal to `key` is present.
    pub(crate) fn contains(&self, key: &T) -> bool {
        self.get(key).is_some()
    }

    /// Returns the smallest item in the tree.
    pub(crate) fn first(&self) -> Option<&T> {
        self.root.as_ref()?.min()
    }

    /// Returns the largest item in the tree.
    pub(crate) fn last(&self) -> Option<&T> {
        self.root.as_ref()?.max()
    }

    /// Calls `f` for every item in ascending order until `f` returns false.
    pub(crate) fn ascend<F: FnMut(&T) -> bool>(&self, mut f: F) {
        if let Some(root) = &self.root {
            root.iterate(Direction::Ascend, None, None, false, false, &self.less, &mut f);
        }
    }

    /// Calls `f` for every item in `[lo, hi)` in ascending order.
    pub(crate) fn ascend_range<F: FnMut(&T) -> bool>(&self, lo: &T, hi: &T, mut f: F) {
        if let Some(root) = &self.root {
            root.iterate(Direction::Ascend, Some(lo), Some(hi), true, false, &self.less, &mut f);
        }
    }

    /// Calls `f` for every item less than `pivot` in ascending order.
    pub(crate) fn ascend_less_than<F: FnMut(&T) -> bool>(&self, pivot: &T, mut f: F) {
        if let Some(root) = &self.root {
            root.iterate(Direction::Ascend, None, Some(pivot), false, false, &self.less, &mut f);
        }
    }

    /// Calls `f` for every item greater than or equal to `pivot` in
    /// ascending order.
    pub(crate) fn ascend_greater_or_equal<F: FnMut(&T) -> bool>(&self, pivot: &T, mut f: F) {
        if let Some(root) = &self.root {
            root.iterate(Direction::Ascend, Some(pivot), None, true, false, &self.less, &mut f);
        }
    }

    /// Calls `f` for every item in descending order until `f` returns false.
    pub(crate) fn descend<F: FnMut(&T) -> bool>(&self, mut f: F) {
        if let Some(root) = &self.root {
            root.iterate(Direction::Descend, None, None, false, false, &self.less, &mut f);
        }
    }

    /// Calls `f` descending from the greatest item `<= hi` down to, but not
    /// including, `lo`.
    pub(crate) fn descend_range<F: FnMut(&T) -> bool>(&self, hi: &T, lo: &T, mut f: F) {
        if let Some(root) = &self.root {
            root.iterate(Direction::Descend, Some(hi), Some(lo), true, false, &self.less, &mut f);
        }
    }

    /// Calls `f` for every item less than or equal to `pivot` in descending
    /// order.
    pub(crate) fn descend_less_or_equal<F: FnMut(&T) -> bool>(&self, pivot: &T, mut f: F) {
        if let Some(root) = &self.root {
            root.iterate(Direction::Descend, Some(pivot), None, true, false, &self.less, &mut f);
        }
    }

    /// Calls `f` for every item greater than `pivot` in descending order.
    pub(crate) fn descend_greater_than<F: FnMut(&T) -> bool>(&self, pivot: &T, mut f: F) {
        if let Some(root) = &self.root {
            root.iterate(Direction::Descend, None, Some(pivot), false, false, &self.less, &mut f);
        }
    }
}

impl<T, C> RawCowTree<T, C>
where
    T: Clone,
    C: Fn(&T, &T) -> bool,
{
    /// Inserts `item`, replacing and returning the previous item with the
    /// same key if one exists.
    ///
    /// A full root is split under a new root before the descent begins;
    /// after that a single top-down pass suffices.
    pub(crate) fn insert(&mut self, item: T) -> Option<T> {
        let max_items = self.max_items();
        let Some(mut edge) = self.root.take() else {
            self.root = Some(Arc::new(Node::new_leaf(self.owner.clone(), item)));
            self.len = 1;
            return None;
        };
        let root = make_mut(&mut edge, &self.owner);
        if root.len() >= max_items {
            let (median, right) = root.split(max_items / 2);
            let right = Arc::new(right);
            edge = Arc::new(Node::new_root(self.owner.clone(), median, edge, right));
        }
        let out = make_mut(&mut edge, &self.owner).insert(item, max_items, &self.owner, &self.less);
        self.root = Some(edge);
        if out.is_none() {
            self.len += 1;
        }
        out
    }

    /// Removes and returns the item comparing equal to `key`, if present.
    pub(crate) fn remove(&mut self, key: &T) -> Option<T> {
        self.delete(Target::Key(key))
    }

    /// Removes and returns the smallest item, if any.
    pub(crate) fn pop_first(&mut self) -> Option<T> {
        self.delete(Target::Min)
    }

    /// Removes and returns the largest item, if any.
    pub(crate) fn pop_last(&mut self) -> Option<T> {
        self.delete(Target::Max)
    }

    /// Single top-down removal pass; minimal children are fattened before
    /// the descent enters them.
    fn delete(&mut self, target: Target<'_, T>) -> Option<T> {
        let min_items = self.min_items();
        let Some(mut edge) = self.root.take() else {
            return None;
        };
        let out = make_mut(&mut edge, &self.owner).remove(target, min_items, &self.owner, &self.less);
        if edge.len() == 0 {
            // The root drained; a leaf root goes away entirely, an internal
            // one hands its single child up and the tree loses a level.
            if !edge.is_leaf() {
                let child = make_mut(&mut edge, &self.owner).take_first_child();
                self.root = Some(child);
            }
        } else {
            self.root = Some(edge);
        }
        if out.is_some() {
            self.len -= 1;
        }
        out
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use alloc::collections::BTreeSet;
    use alloc::vec::Vec;
    use proptest::prelude::*;

    impl<T, C: Fn(&T, &T) -> bool> RawCowTree<T, C> {
        /// Validates all B-tree invariants. Panics with a descriptive
        /// message if any are violated. Intended for tests only.
        pub(crate) fn validate_invariants(&self) {
            let Some(root) = &self.root else {
                assert_eq!(self.len, 0, "empty root but len = {}", self.len);
                return;
            };
            assert!(root.len() > 0, "non-empty tree with an itemless root");
            let mut count = 0usize;
            let mut leaf_depth = None;
            self.validate_node(root, 0, true, None, None, &mut leaf_depth, &mut count);
            assert_eq!(count, self.len, "len = {} but {} items reachable", self.len, count);
        }

        #[allow(clippy::too_many_arguments)]
        fn validate_node(
            &self,
            node: &Node<T>,
            depth: usize,
            is_root: bool,
            lower: Option<&T>,
            upper: Option<&T>,
            leaf_depth: &mut Option<usize>,
            count: &mut usize,
        ) {
            let less = &self.less;
            if !is_root {
                assert!(
                    node.len() >= self.min_items(),
                    "node below minimum occupancy: {} < {}",
                    node.len(),
                    self.min_items()
                );
            }
            assert!(
                node.len() <= self.max_items(),
                "node above maximum occupancy: {} > {}",
                node.len(),
                self.max_items()
            );
            for pair in node.items().windows(2) {
                assert!(less(&pair[0], &pair[1]), "items within a node out of order");
            }
            if let Some(lower) = lower {
                assert!(less(lower, node.item(0)), "item at or below its lower separator");
            }
            if let Some(upper) = upper {
                assert!(
                    less(node.item(node.len() - 1), upper),
                    "item at or above its upper separator"
                );
            }
            *count += node.len();
            if node.is_leaf() {
                match *leaf_depth {
                    None => *leaf_depth = Some(depth),
                    Some(expected) => assert_eq!(depth, expected, "leaves at differing depths"),
                }
                return;
            }
            assert_eq!(
                node.child_edges().len(),
                node.len() + 1,
                "internal node child count mismatch"
            );
            for (i, child) in node.child_edges().iter().enumerate() {
                let lower = if i == 0 { lower } else { Some(node.item(i - 1)) };
                let upper = if i == node.len() { upper } else { Some(node.item(i)) };
                self.validate_node(child, depth + 1, false, lower, upper, leaf_depth, count);
            }
        }
    }

    type IntTree = RawCowTree<i64, fn(&i64, &i64) -> bool>;

    fn int_tree(degree: usize) -> IntTree {
        RawCowTree::new(degree, |a, b| a < b)
    }

    fn contents(tree: &IntTree) -> Vec<i64> {
        let mut out = Vec::new();
        tree.ascend(|item| {
            out.push(*item);
            true
        });
        out
    }

    #[test]
    #[should_panic(expected = "`RawCowTree::new()` - `degree` must be at least 2!")]
    fn degree_below_two_is_a_usage_error() {
        let _ = int_tree(1);
    }

    #[derive(Clone, Debug)]
    enum Op {
        Insert(i64),
        Remove(i64),
        PopFirst,
        PopLast,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            8 => (-200i64..200).prop_map(Op::Insert),
            4 => (-200i64..200).prop_map(Op::Remove),
            1 => Just(Op::PopFirst),
            1 => Just(Op::PopLast),
        ]
    }

    proptest! {
        /// Replays a random op sequence against `BTreeSet` and checks every
        /// tree invariant after each step.
        #[test]
        fn tree_matches_model(degree in 2usize..8, ops in prop::collection::vec(op_strategy(), 0..300)) {
            let mut tree = int_tree(degree);
            let mut model: BTreeSet<i64> = BTreeSet::new();

            for op in ops {
                match op {
                    Op::Insert(k) => {
                        let previous = tree.insert(k);
                        let fresh = model.insert(k);
                        prop_assert_eq!(previous, if fresh { None } else { Some(k) });
                    }
                    Op::Remove(k) => {
                        let removed = tree.remove(&k);
                        let had = model.remove(&k);
                        prop_assert_eq!(removed, had.then_some(k));
                    }
                    Op::PopFirst => {
                        prop_assert_eq!(tree.pop_first(), model.pop_first());
                    }
                    Op::PopLast => {
                        prop_assert_eq!(tree.pop_last(), model.pop_last());
                    }
                }
                tree.validate_invariants();
                prop_assert_eq!(tree.len(), model.len());
                prop_assert_eq!(tree.first(), model.first());
                prop_assert_eq!(tree.last(), model.last());
            }

            let expected: Vec<i64> = model.iter().copied().collect();
            prop_assert_eq!(contents(&tree), expected);
        }

        /// A clone never observes mutations applied to its sibling, in
        /// either direction.
        #[test]
        fn clones_are_independent(
            degree in 2usize..8,
            keys in prop::collection::btree_set(-500i64..500, 0..200),
            into_original in prop::collection::vec(-500i64..500, 0..60),
            into_clone in prop::collection::vec(-500i64..500, 0..60),
        ) {
            let mut tree = int_tree(degree);
            for key in &keys {
                tree.insert(*key);
            }
            let snapshot = contents(&tree);

            let mut copy = tree.clone();
            prop_assert_eq!(&contents(&copy), &snapshot);

            for key in &into_original {
                tree.insert(*key);
                tree.remove(&(key / 2));
            }
            tree.validate_invariants();
            prop_assert_eq!(&contents(&copy), &snapshot);

            for key in &into_clone {
                copy.remove(key);
                copy.insert(key + 1);
            }
            copy.validate_invariants();
            tree.validate_invariants();

            drop(tree);
            copy.validate_invariants();
        }
    }
}
