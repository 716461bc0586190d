pub mod allocator;
pub mod backing_store;
