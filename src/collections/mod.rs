//! Collections guarded by the access monitor.

pub mod shared_list;

pub use shared_list::{Iter, RemovalBound, SharedList};
