use super::BackingStoreModule;

/// Backing store ledger that only lives in memory
#[derive(Debug, Default)]
pub struct MemoryBackingStoreModule {
    entries: Vec<String>,
}

impl MemoryBackingStoreModule {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BackingStoreModule for MemoryBackingStoreModule {
    fn store(&mut self, name: &str) -> Result<(), ()> {
        self.entries.push(name.to_string());
        Ok(())
    }

    fn remove(&mut self, name: &str) -> Result<bool, ()> {
        let prev_len = self.entries.len();
        self.entries.retain(|entry| entry != name);
        Ok(self.entries.len() != prev_len)
    }

    fn entries(&self) -> Vec<String> {
        self.entries.clone()
    }

    fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|entry| entry == name)
    }
}
