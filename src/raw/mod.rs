mod node;
mod owner;
mod raw_cow_tree;

pub(crate) use node::Node;
pub(crate) use raw_cow_tree::RawCowTree;
