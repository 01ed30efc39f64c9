mod merge;
mod model;
mod tree;

pub use merge::{Direction, merge};
pub use model::{GraphError, GraphModel};
pub use tree::{TreeSeed, build_tree};
