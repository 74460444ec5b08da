//! Dependency resolution engine: concurrent recursive resolution against a
//! prioritized source set, exactly-once resolve and fetch, circular
//! dependency rejection, and the resolved tree view.

pub mod failure;
pub mod fetch;
pub mod graph;
pub mod registry;
pub mod resolver;
