use core::fmt;

use smallvec::SmallVec;

use super::CowTree;
use crate::raw::Node;

/// One step of the root-to-position path: the node and either the current
/// item index (topmost frame) or the child index the path descended into
/// (every other frame).
struct Frame<'a, T> {
    node: &'a Node<T>,
    index: usize,
}

/// Where the cursor currently sits relative to the items.
#[derive(Clone, Copy)]
enum Position {
    /// Fresh cursor; no call has placed it yet.
    Unplaced,
    /// On the item named by the top frame.
    OnItem,
    /// Ran off the front; `prev` returned `None`.
    BeforeFirst,
    /// Ran off the back; `next` returned `None`.
    AfterLast,
}

/// A bidirectional cursor over a [`CowTree`].
///
/// Created by [`CowTree::cursor`]. The cursor keeps an explicit path of
/// `(node, index)` frames from the root to its current item, so every move
/// costs at most one walk along the tree height and steady-state iteration
/// allocates nothing; the path lives inline for trees of realistic height.
///
/// The cursor holds a shared borrow of its tree: mutating the tree while a
/// cursor exists is rejected at compile time.
///
/// # Examples
///
/// ```
/// use kauri_tree::CowTree;
///
/// let mut tree = CowTree::new(3, |a: &i32, b: &i32| a < b);
/// for value in [50, 10, 30, 20, 40] {
///     tree.insert(value);
/// }
///
/// let mut cursor = tree.cursor();
/// assert_eq!(cursor.seek(&25), Some(&30));
/// assert_eq!(cursor.next(), Some(&40));
/// assert_eq!(cursor.prev(), Some(&30));
/// assert_eq!(cursor.prev(), Some(&20));
/// ```
pub struct Cursor<'a, T, C> {
    tree: &'a CowTree<T, C>,
    path: SmallVec<[Frame<'a, T>; 16]>,
    position: Position,
}

impl<'a, T, C> Cursor<'a, T, C> {
    pub(super) fn new(tree: &'a CowTree<T, C>) -> Self {
        Self {
            tree,
            path: SmallVec::new(),
            position: Position::Unplaced,
        }
    }

    fn top_item(&self) -> &'a T {
        let top = self.path.last().expect("positioned cursor has a path");
        top.node.item(top.index)
    }

    /// Moves to the smallest item and returns it, or `None` if the tree is
    /// empty.
    pub fn first(&mut self) -> Option<&'a T> {
        self.path.clear();
        let Some(mut node) = self.tree.raw().root_node() else {
            self.position = Position::Unplaced;
            return None;
        };
        loop {
            self.path.push(Frame { node, index: 0 });
            if node.is_leaf() {
                break;
            }
            node = node.child(0);
        }
        self.position = Position::OnItem;
        Some(self.top_item())
    }

    /// Moves to the largest item and returns it, or `None` if the tree is
    /// empty.
    pub fn last(&mut self) -> Option<&'a T> {
        self.path.clear();
        let Some(mut node) = self.tree.raw().root_node() else {
            self.position = Position::Unplaced;
            return None;
        };
        loop {
            if node.is_leaf() {
                self.path.push(Frame { node, index: node.len() - 1 });
                break;
            }
            self.path.push(Frame { node, index: node.len() });
            node = node.child(node.len());
        }
        self.position = Position::OnItem;
        Some(self.top_item())
    }

    /// Moves one item forward and returns it, or `None` once past the
    /// largest item.
    ///
    /// A fresh cursor, or one that ran off the front, starts over from the
    /// smallest item.
    pub fn next(&mut self) -> Option<&'a T> {
        match self.position {
            Position::Unplaced | Position::BeforeFirst => return self.first(),
            Position::AfterLast => return None,
            Position::OnItem => {}
        }
        let top = self.path.last_mut().expect("positioned cursor has a path");
        let parent: &'a Node<T> = top.node;
        if !parent.is_leaf() {
            // Smallest item of the right subtree comes next.
            top.index += 1;
            let mut node = parent.child(top.index);
            loop {
                self.path.push(Frame { node, index: 0 });
                if node.is_leaf() {
                    break;
                }
                node = node.child(0);
            }
            return Some(self.top_item());
        }
        top.index += 1;
        while let Some(top) = self.path.last() {
            // A frame's child index doubles as the index of the item that
            // follows that child.
            if top.index < top.node.len() {
                return Some(self.top_item());
            }
            self.path.pop();
        }
        self.position = Position::AfterLast;
        None
    }

    /// Moves one item backward and returns it, or `None` once past the
    /// smallest item.
    ///
    /// A fresh cursor, or one that ran off the back, starts over from the
    /// largest item.
    pub fn prev(&mut self) -> Option<&'a T> {
        match self.position {
            Position::Unplaced | Position::AfterLast => return self.last(),
            Position::BeforeFirst => return None,
            Position::OnItem => {}
        }
        let top = self.path.last().expect("positioned cursor has a path");
        let parent: &'a Node<T> = top.node;
        if !parent.is_leaf() {
            // Largest item of the left subtree comes before this one.
            let mut node = parent.child(top.index);
            loop {
                if node.is_leaf() {
                    self.path.push(Frame { node, index: node.len() - 1 });
                    break;
                }
                self.path.push(Frame { node, index: node.len() });
                node = node.child(node.len());
            }
            return Some(self.top_item());
        }
        let top = self.path.last_mut().expect("positioned cursor has a path");
        if top.index > 0 {
            top.index -= 1;
            return Some(self.top_item());
        }
        self.path.pop();
        while let Some(top) = self.path.last_mut() {
            if top.index > 0 {
                // The item before child `i` is item `i - 1`.
                top.index -= 1;
                return Some(self.top_item());
            }
            self.path.pop();
        }
        self.position = Position::BeforeFirst;
        None
    }
}

impl<'a, T, C> Cursor<'a, T, C>
where
    C: Fn(&T, &T) -> bool,
{
    /// Moves to the first item at or after `key` and returns it, or `None`
    /// (leaving the cursor off the back) when every item orders before
    /// `key`.
    ///
    /// # Examples
    ///
    /// ```
    /// use kauri_tree::CowTree;
    ///
    /// let mut tree = CowTree::new(2, |a: &i32, b: &i32| a < b);
    /// for value in [10, 20, 30] {
    ///     tree.insert(value);
    /// }
    ///
    /// let mut cursor = tree.cursor();
    /// assert_eq!(cursor.seek(&20), Some(&20));
    /// assert_eq!(cursor.seek(&21), Some(&30));
    /// assert_eq!(cursor.seek(&31), None);
    /// assert_eq!(cursor.prev(), Some(&30));
    /// ```
    pub fn seek(&mut self, key: &T) -> Option<&'a T> {
        self.path.clear();
        let less = self.tree.raw().less();
        let Some(mut node) = self.tree.raw().root_node() else {
            self.position = Position::Unplaced;
            return None;
        };
        loop {
            let (index, found) = node.find(key, less);
            self.path.push(Frame { node, index });
            if found {
                self.position = Position::OnItem;
                return Some(self.top_item());
            }
            if node.is_leaf() {
                break;
            }
            node = node.child(index);
        }
        // No exact match; the successor is the first ancestor whose frame
        // still points at an item.
        while let Some(top) = self.path.last() {
            if top.index < top.node.len() {
                self.position = Position::OnItem;
                return Some(self.top_item());
            }
            self.path.pop();
        }
        self.position = Position::AfterLast;
        None
    }
}

impl<T, C> fmt::Debug for Cursor<'_, T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.position {
            Position::Unplaced => "unplaced",
            Position::OnItem => "on-item",
            Position::BeforeFirst => "before-first",
            Position::AfterLast => "after-last",
        };
        f.debug_struct("Cursor").field("position", &state).finish_non_exhaustive()
    }
}

/// An iterator over the items of a [`CowTree`] in ascending order.
///
/// Created by [`CowTree::iter`]. This is a thin wrapper over [`Cursor`],
/// so iteration allocates nothing beyond the inline path.
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Iter<'a, T, C> {
    cursor: Cursor<'a, T, C>,
}

impl<'a, T, C> Iter<'a, T, C> {
    pub(super) fn new(tree: &'a CowTree<T, C>) -> Self {
        Self {
            cursor: Cursor::new(tree),
        }
    }
}

impl<'a, T, C> Iterator for Iter<'a, T, C> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        self.cursor.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.cursor.tree.len()))
    }
}

impl<T, C> core::iter::FusedIterator for Iter<'_, T, C> {}
