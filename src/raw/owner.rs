use core::fmt;

use alloc::sync::Arc;

/// Marker allocation whose address identifies one tree.
struct Tag;

/// The identity a tree stamps onto every node it may edit in place.
///
/// Two owners are the same identity only if they are literally the same
/// allocation; a freshly minted owner matches no existing node, which is
/// what forces the first mutation after a clone to copy its path.
#[derive(Clone)]
pub(crate) struct Owner(Arc<Tag>);

impl Owner {
    pub(crate) fn new() -> Self {
        Self(Arc::new(Tag))
    }

    /// Returns true if `self` and `other` are the same identity.
    #[inline]
    pub(crate) fn is(&self, other: &Owner) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Owner").field(&Arc::as_ptr(&self.0)).finish()
    }
}
