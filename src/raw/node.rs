use core::mem;

use alloc::sync::Arc;
use alloc::vec::Vec;

use super::owner::Owner;

/// Shared edge between a parent and a child node (or a tree and its root).
///
/// Clones of a tree hold the same edges; the atomic reference count on each
/// edge is what lets sibling clones release nodes without coordination.
pub(crate) type NodeRef<T> = Arc<Node<T>>;

/// A single B-tree page: a sorted run of items and, for internal nodes, one
/// more child edge than items. `children` is empty for leaves.
#[derive(Clone)]
pub(crate) struct Node<T> {
    owner: Owner,
    items: Vec<T>,
    children: Vec<NodeRef<T>>,
}

/// Which slot a delete descent is after.
#[derive(Clone, Copy)]
pub(crate) enum Target<'a, T> {
    /// The item comparing equal to the key, wherever it sits.
    Key(&'a T),
    /// The leftmost item in the subtree.
    Min,
    /// The rightmost item in the subtree.
    Max,
}

/// Traversal direction for [`Node::iterate`].
#[derive(Clone, Copy)]
pub(crate) enum Direction {
    Ascend,
    Descend,
}

/// Grants in-place access to the node behind `edge` on behalf of the tree
/// identified by `owner`.
///
/// An edge whose node carries another tree's tag is repointed at a value
/// copy stamped with `owner`; an edge that is still shared at the refcount
/// level is copied by `make_mut` itself. Either way the caller receives a
/// node no other tree can observe.
pub(crate) fn make_mut<'a, T: Clone>(edge: &'a mut NodeRef<T>, owner: &Owner) -> &'a mut Node<T> {
    if !edge.owner.is(owner) {
        *edge = Arc::new(edge.copy_for(owner));
    }
    Arc::make_mut(edge)
}

impl<T> Node<T> {
    /// Creates a single-item leaf, the root of a previously empty tree.
    pub(crate) fn new_leaf(owner: Owner, item: T) -> Self {
        Self {
            owner,
            items: alloc::vec![item],
            children: Vec::new(),
        }
    }

    /// Creates the root produced by splitting a full root: one separator
    /// over the two halves. The tree grows in height here and nowhere else.
    pub(crate) fn new_root(owner: Owner, separator: T, left: NodeRef<T>, right: NodeRef<T>) -> Self {
        Self {
            owner,
            items: alloc::vec![separator],
            children: alloc::vec![left, right],
        }
    }

    /// Returns the number of items held directly by this node.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if this node has no children.
    #[inline]
    pub(crate) fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Returns the item at the given index.
    #[inline]
    pub(crate) fn item(&self, index: usize) -> &T {
        &self.items[index]
    }

    /// Returns all items. Used by the invariant validator.
    #[cfg(test)]
    pub(crate) fn items(&self) -> &[T] {
        &self.items
    }

    /// Returns the child node at the given index.
    #[inline]
    pub(crate) fn child(&self, index: usize) -> &Node<T> {
        &self.children[index]
    }

    /// Returns all child edges. Used by the invariant validator.
    #[cfg(test)]
    pub(crate) fn child_edges(&self) -> &[NodeRef<T>] {
        &self.children
    }

    /// Consumes the node, handing back its child edges. Used by the
    /// worklist drop so no drop glue recurses through a tall tree.
    pub(crate) fn into_children(self) -> Vec<NodeRef<T>> {
        self.children
    }

    /// Removes and returns the first child edge. Only meaningful on the
    /// root after a delete emptied it, when the tree shrinks in height.
    pub(crate) fn take_first_child(&mut self) -> NodeRef<T> {
        self.children.remove(0)
    }

    /// Binary search under `less`. Returns `(index, true)` when an item
    /// compares equal to `key`, otherwise `(insertion_point, false)`.
    pub(crate) fn find<C>(&self, key: &T, less: &C) -> (usize, bool)
    where
        C: Fn(&T, &T) -> bool,
    {
        // First index whose item is greater than `key`.
        let mut lo = 0;
        let mut hi = self.items.len();
        while lo < hi {
            let mid = (lo + hi) / 2;
            if less(key, &self.items[mid]) {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        if lo > 0 && !less(&self.items[lo - 1], key) {
            (lo - 1, true)
        } else {
            (lo, false)
        }
    }

    /// Returns the leftmost item of the subtree rooted here.
    pub(crate) fn min(&self) -> Option<&T> {
        let mut node = self;
        while !node.is_leaf() {
            node = node.child(0);
        }
        node.items.first()
    }

    /// Returns the rightmost item of the subtree rooted here.
    pub(crate) fn max(&self) -> Option<&T> {
        let mut node = self;
        while !node.is_leaf() {
            node = node.child(node.items.len());
        }
        node.items.last()
    }

    /// Returns the item comparing equal to `key`, if present.
    pub(crate) fn get<C>(&self, key: &T, less: &C) -> Option<&T>
    where
        C: Fn(&T, &T) -> bool,
    {
        let mut node = self;
        loop {
            let (i, found) = node.find(key, less);
            if found {
                return Some(&node.items[i]);
            }
            if node.is_leaf() {
                return None;
            }
            node = node.child(i);
        }
    }
}

impl<T: Clone> Node<T> {
    /// Value copy carrying `owner`'s tag. Items are duplicated; child
    /// edges are shared, so the copy costs one node regardless of the
    /// subtree below it.
    fn copy_for(&self, owner: &Owner) -> Self {
        Self {
            owner: owner.clone(),
            items: self.items.clone(),
            children: self.children.clone(),
        }
    }

    /// Splits off everything to the right of `at`. Returns the median item
    /// and the new right sibling; the caller wires both into the parent.
    pub(crate) fn split(&mut self, at: usize) -> (T, Node<T>) {
        let right_items = self.items.split_off(at + 1);
        let median = self.items.pop().expect("split of an empty node");
        let right_children = if self.is_leaf() {
            Vec::new()
        } else {
            self.children.split_off(at + 1)
        };
        let right = Node {
            owner: self.owner.clone(),
            items: right_items,
            children: right_children,
        };
        (median, right)
    }

    /// Splits the full child at `index`, inserting the promoted median and
    /// the new sibling edge into this node.
    fn split_child(&mut self, index: usize, at: usize, owner: &Owner) {
        let child = make_mut(&mut self.children[index], owner);
        let (median, right) = child.split(at);
        self.items.insert(index, median);
        self.children.insert(index + 1, Arc::new(right));
    }

    /// Inserts into the subtree rooted at this node, which the caller has
    /// already made privately owned and non-full.
    ///
    /// Returns the previous item with the same key, if any. Any full child
    /// on the way down is split before being entered, so the descent never
    /// needs to back up.
    pub(crate) fn insert<C>(&mut self, item: T, max_items: usize, owner: &Owner, less: &C) -> Option<T>
    where
        C: Fn(&T, &T) -> bool,
    {
        let (mut i, found) = self.find(&item, less);
        if found {
            return Some(mem::replace(&mut self.items[i], item));
        }
        if self.is_leaf() {
            self.items.insert(i, item);
            return None;
        }
        if self.children[i].len() >= max_items {
            self.split_child(i, max_items / 2, owner);
            let separator = &self.items[i];
            if less(separator, &item) {
                // Key sorts after the promoted median; follow the new sibling.
                i += 1;
            } else if !less(&item, separator) {
                // The promoted median is the key itself.
                return Some(mem::replace(&mut self.items[i], item));
            }
        }
        make_mut(&mut self.children[i], owner).insert(item, max_items, owner, less)
    }

    /// Removes the targeted item from the subtree rooted at this node,
    /// which the caller has already made privately owned and fat enough to
    /// lose one item.
    ///
    /// Any minimal child on the way down is grown to at least `min_items + 1`
    /// items before being entered, so removal from the leaf level never
    /// leaves a node underfull.
    pub(crate) fn remove<C>(&mut self, target: Target<'_, T>, min_items: usize, owner: &Owner, less: &C) -> Option<T>
    where
        C: Fn(&T, &T) -> bool,
    {
        let (i, found) = match target {
            Target::Max => {
                if self.is_leaf() {
                    return self.items.pop();
                }
                (self.items.len(), false)
            }
            Target::Min => {
                if self.is_leaf() {
                    if self.items.is_empty() {
                        return None;
                    }
                    return Some(self.items.remove(0));
                }
                (0, false)
            }
            Target::Key(key) => {
                let (i, found) = self.find(key, less);
                if self.is_leaf() {
                    return found.then(|| self.items.remove(i));
                }
                (i, found)
            }
        };
        if self.children[i].len() <= min_items {
            return self.grow_child_and_remove(i, target, min_items, owner, less);
        }
        let child = make_mut(&mut self.children[i], owner);
        if found {
            // The key sits in this internal node; swap in its in-order
            // predecessor, the maximum of the left subtree.
            let predecessor = child
                .remove(Target::Max, min_items, owner, less)
                .expect("fattened child holds a predecessor");
            return Some(mem::replace(&mut self.items[i], predecessor));
        }
        child.remove(target, min_items, owner, less)
    }

    /// Grows the minimal child at `index` by one item, then restarts the
    /// removal step at this node. The child index may shift when siblings
    /// merge, which is why the step restarts instead of resuming.
    fn grow_child_and_remove<C>(
        &mut self,
        mut index: usize,
        target: Target<'_, T>,
        min_items: usize,
        owner: &Owner,
        less: &C,
    ) -> Option<T>
    where
        C: Fn(&T, &T) -> bool,
    {
        if index > 0 && self.children[index - 1].len() > min_items {
            self.steal_from_left(index, owner);
        } else if index < self.items.len() && self.children[index + 1].len() > min_items {
            self.steal_from_right(index, owner);
        } else {
            if index >= self.items.len() {
                index -= 1;
            }
            self.merge_with_right(index, owner);
        }
        self.remove(target, min_items, owner, less)
    }

    /// Rotates the left sibling's last item up through the separator and
    /// the separator down into the child; an internal sibling also hands
    /// over its last child edge.
    fn steal_from_left(&mut self, index: usize, owner: &Owner) {
        let (stolen_item, stolen_child) = {
            let left = make_mut(&mut self.children[index - 1], owner);
            let item = left.items.pop().expect("lending sibling is not empty");
            let child = left.children.pop();
            (item, child)
        };
        let separator = mem::replace(&mut self.items[index - 1], stolen_item);
        let child = make_mut(&mut self.children[index], owner);
        child.items.insert(0, separator);
        if let Some(edge) = stolen_child {
            child.children.insert(0, edge);
        }
    }

    /// Mirror of [`Node::steal_from_left`].
    fn steal_from_right(&mut self, index: usize, owner: &Owner) {
        let (stolen_item, stolen_child) = {
            let right = make_mut(&mut self.children[index + 1], owner);
            let item = right.items.remove(0);
            let child = if right.is_leaf() {
                None
            } else {
                Some(right.children.remove(0))
            };
            (item, child)
        };
        let separator = mem::replace(&mut self.items[index], stolen_item);
        let child = make_mut(&mut self.children[index], owner);
        child.items.push(separator);
        if let Some(edge) = stolen_child {
            child.children.push(edge);
        }
    }

    /// Fuses the child at `index` with its right sibling and the separator
    /// between them. This node loses one item and one child edge.
    fn merge_with_right(&mut self, index: usize, owner: &Owner) {
        let separator = self.items.remove(index);
        let right_edge = self.children.remove(index + 1);
        // A still-shared sibling is copied out rather than moved.
        let right = match Arc::try_unwrap(right_edge) {
            Ok(node) => node,
            Err(edge) => (*edge).clone(),
        };
        let child = make_mut(&mut self.children[index], owner);
        child.items.push(separator);
        child.items.extend(right.items);
        child.children.extend(right.children);
    }
}

impl<T> Node<T> {
    /// Recursive range walker behind every traversal operation.
    ///
    /// `start` and `stop` prune subtrees under `less`; `include_start`
    /// decides whether an item comparing equal to `start` is emitted, and
    /// `hit` latches once emission begins so that item is skipped at most
    /// once. Returns `(hit, keep_going)`; a `false` from the predicate
    /// propagates the stop signal up the recursion.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn iterate<C, F>(
        &self,
        dir: Direction,
        start: Option<&T>,
        stop: Option<&T>,
        include_start: bool,
        mut hit: bool,
        less: &C,
        f: &mut F,
    ) -> (bool, bool)
    where
        C: Fn(&T, &T) -> bool,
        F: FnMut(&T) -> bool,
    {
        match dir {
            Direction::Ascend => {
                let first = match start {
                    Some(start) => self.find(start, less).0,
                    None => 0,
                };
                for i in first..self.items.len() {
                    if !self.is_leaf() {
                        let (h, keep_going) =
                            self.children[i].iterate(dir, start, stop, include_start, hit, less, f);
                        hit = h;
                        if !keep_going {
                            return (hit, false);
                        }
                    }
                    if !include_start && !hit {
                        if let Some(start) = start {
                            if !less(start, &self.items[i]) {
                                hit = true;
                                continue;
                            }
                        }
                    }
                    hit = true;
                    if let Some(stop) = stop {
                        if !less(&self.items[i], stop) {
                            return (hit, false);
                        }
                    }
                    if !f(&self.items[i]) {
                        return (hit, false);
                    }
                }
                if !self.is_leaf() {
                    let (h, keep_going) =
                        self.children[self.items.len()].iterate(dir, start, stop, include_start, hit, less, f);
                    hit = h;
                    if !keep_going {
                        return (hit, false);
                    }
                }
            }
            Direction::Descend => {
                // One past the first candidate item, scanning right to left.
                let mut i = match start {
                    Some(start) => {
                        let (index, found) = self.find(start, less);
                        if found { index + 1 } else { index }
                    }
                    None => self.items.len(),
                };
                while i > 0 {
                    let index = i - 1;
                    if let Some(start) = start {
                        if !less(&self.items[index], start)
                            && (!include_start || hit || less(start, &self.items[index]))
                        {
                            i -= 1;
                            continue;
                        }
                    }
                    if !self.is_leaf() {
                        let (h, keep_going) =
                            self.children[index + 1].iterate(dir, start, stop, include_start, hit, less, f);
                        hit = h;
                        if !keep_going {
                            return (hit, false);
                        }
                    }
                    if let Some(stop) = stop {
                        if !less(stop, &self.items[index]) {
                            return (hit, false);
                        }
                    }
                    hit = true;
                    if !f(&self.items[index]) {
                        return (hit, false);
                    }
                    i -= 1;
                }
                if !self.is_leaf() {
                    let (h, keep_going) =
                        self.children[0].iterate(dir, start, stop, include_start, hit, less, f);
                    hit = h;
                    if !keep_going {
                        return (hit, false);
                    }
                }
            }
        }
        (hit, true)
    }
}
