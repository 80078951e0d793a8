//! Analysis passes over the program model.
//!
//! The passes run in a fixed order once ingestion is done: vtable scanning
//! augments the edge set, reachability reports garbage, the dominator
//! engine computes immediate dominators, and the weight pass rolls sizes up
//! the dominator tree.

pub mod dominators;
pub mod reachability;
pub mod vtable;
pub mod weights;
