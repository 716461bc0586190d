mod file_store;
mod memory_store;

pub use file_store::FileBackingStoreModule;
pub use memory_store::MemoryBackingStoreModule;

use crate::os_sim_config::OSSimConfig;

/// Ledger of processes that were evicted from main memory.
///
/// Only used for inspection, the process data itself is never written anywhere.
pub trait BackingStoreModule: Send {
    /// Appends `name` to the ledger
    fn store(&mut self, name: &str) -> Result<(), ()>;

    /// Removes every entry that equals `name`.
    ///
    /// Returns `true` if at least one entry was removed.
    fn remove(&mut self, name: &str) -> Result<bool, ()>;

    /// All entries in the order they were stored
    fn entries(&self) -> Vec<String>;

    fn contains(&self, name: &str) -> bool {
        self.entries().iter().any(|entry| entry == name)
    }
}

impl<T: BackingStoreModule + ?Sized> BackingStoreModule for Box<T> {
    fn store(&mut self, name: &str) -> Result<(), ()> {
        (**self).store(name)
    }

    fn remove(&mut self, name: &str) -> Result<bool, ()> {
        (**self).remove(name)
    }

    fn entries(&self) -> Vec<String> {
        (**self).entries()
    }

    fn contains(&self, name: &str) -> bool {
        (**self).contains(name)
    }
}

/// Creates a file ledger if `config` names a path, otherwise an in memory one
pub fn backing_store_from_config(
    config: &OSSimConfig,
) -> std::io::Result<Box<dyn BackingStoreModule>> {
    match &config.backing_store_path {
        Some(path) => Ok(Box::new(FileBackingStoreModule::new(path.clone())?)),
        None => Ok(Box::new(MemoryBackingStoreModule::new())),
    }
}
