/*
 *  Copyright (C) 2025  Markus Elias Gerber
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  You should have received a copy of the GNU General Public License
 *  along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use std::{
    fs::{remove_file, File},
    io::{Seek, SeekFrom, Write},
    mem::ManuallyDrop,
    path::Path,
};

use log::error;

use super::BackingStoreModule;

/// Backing store ledger kept in a plain text file, one process name per line
pub struct FileBackingStoreModule {
    /// underlying ledger file
    file: ManuallyDrop<File>,

    /// path of file, save for deleting file later
    file_path: String,

    /// cached ledger lines, so no reads are necessary
    entries: Vec<String>,
}

impl FileBackingStoreModule {
    /// Creates a new, empty ledger at `filepath`. An existing file is truncated.
    pub fn new(filepath: String) -> std::io::Result<Self> {
        let file = File::options()
            .read(true)
            .write(true)
            .truncate(true)
            .create(true)
            .open(filepath.clone())?;

        Ok(Self {
            file: ManuallyDrop::new(file),
            file_path: filepath,
            entries: Vec::new(),
        })
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    /// Replaces the file contents with `entries`
    fn rewrite(&mut self, entries: &[String]) -> std::io::Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        for entry in entries.iter() {
            writeln!(self.file, "{}", entry)?;
        }
        self.file.flush()
    }
}

impl BackingStoreModule for FileBackingStoreModule {
    fn store(&mut self, name: &str) -> Result<(), ()> {
        debug_assert!(!name.contains('\n'), "names must fit into a single line");

        self.file.seek(SeekFrom::End(0)).map_err(|_| ())?;
        writeln!(self.file, "{}", name).map_err(|err| {
            error!("could not append {} to {}: {}", name, self.file_path, err);
        })?;
        self.file.flush().map_err(|_| ())?;

        self.entries.push(name.to_string());
        Ok(())
    }

    fn remove(&mut self, name: &str) -> Result<bool, ()> {
        if !self.contains(name) {
            return Ok(false);
        }

        // cache is only updated once the file agrees with it
        let remaining: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| *entry != name)
            .cloned()
            .collect();
        self.rewrite(&remaining).map_err(|err| {
            error!("could not remove {} from {}: {}", name, self.file_path, err);
        })?;

        self.entries = remaining;
        Ok(true)
    }

    fn entries(&self) -> Vec<String> {
        self.entries.clone()
    }

    fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|entry| entry == name)
    }
}

impl Drop for FileBackingStoreModule {
    fn drop(&mut self) {
        // drop and close file before removing
        // note that after this call, file should never be accessed again...
        unsafe {
            ManuallyDrop::drop(&mut self.file);
        }

        if Path::new(self.file_path.as_str()).exists() {
            let _ = remove_file(self.file_path.as_str());
        }
    }
}

#[cfg(test)]
mod test {
    use std::fs::{read_to_string, File};

    use super::FileBackingStoreModule;
    use crate::modules::backing_store::{
        test::{test_backing_store_exact_match, test_backing_store_normal},
        BackingStoreModule,
    };

    #[test]
    fn test_file_backing_store_normal() {
        let store =
            FileBackingStoreModule::new("/tmp/test_file_backing_store_normal.tmp".into()).unwrap();
        test_backing_store_normal(store);
    }

    #[test]
    fn test_file_backing_store_exact_match() {
        let store =
            FileBackingStoreModule::new("/tmp/test_file_backing_store_exact_match.tmp".into())
                .unwrap();
        test_backing_store_exact_match(store);
    }

    #[test]
    fn test_file_backing_store_contents() {
        const PATH: &str = "/tmp/test_file_backing_store_contents.tmp";
        let mut store = FileBackingStoreModule::new(PATH.into()).unwrap();

        store.store("p1").unwrap();
        store.store("p2").unwrap();
        store.store("p3").unwrap();
        assert_eq!(read_to_string(PATH).unwrap(), "p1\np2\np3\n");

        store.remove("p2").unwrap();
        assert_eq!(read_to_string(PATH).unwrap(), "p1\np3\n");

        store.remove("p1").unwrap();
        store.remove("p3").unwrap();
        assert_eq!(read_to_string(PATH).unwrap(), "");

        drop(store);
        assert!(!std::path::Path::new(PATH).exists());
    }

    #[test]
    fn test_file_backing_store_failed_remove() {
        const PATH: &str = "/tmp/test_file_backing_store_failed_remove.tmp";
        let mut store = FileBackingStoreModule::new(PATH.into()).unwrap();
        store.store("p1").unwrap();
        store.store("p2").unwrap();

        // truncating a read only handle fails
        *store.file = File::open(PATH).unwrap();
        assert_eq!(store.remove("p1"), Err(()));

        assert!(store.contains("p1"));
        assert_eq!(store.entries(), vec!["p1", "p2"]);
        assert_eq!(read_to_string(PATH).unwrap(), "p1\np2\n");

        // unknown names never touch the file
        assert_eq!(store.remove("p3"), Ok(false));
    }
}
