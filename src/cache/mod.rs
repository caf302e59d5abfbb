use bytes::Bytes;
use log::debug;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::netcdf::{ArrayTable, Decoder};

/// In-memory cache of decoded leaf tables, keyed by full member path.
///
/// Entries live until [`DecodeCache::clear`]; archives are read-only, so a
/// cached table never goes stale. Failed decodes are not recorded and the
/// next access tries again.
///
/// Uses `Rc`/`RefCell` and is therefore confined to one thread.
#[derive(Debug, Default)]
pub struct DecodeCache {
    tables: RefCell<HashMap<String, Rc<ArrayTable>>>,
    decodes: Cell<usize>,
}

impl DecodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a decoded table from the cache
    pub fn get(&self, path: &str) -> Option<Rc<ArrayTable>> {
        self.tables.borrow().get(path).cloned()
    }

    /// Return the cached table for `full_path`, decoding it on a miss.
    ///
    /// On a miss `raw_bytes` is called once to fetch the member's bytes,
    /// which are handed to `decoder`. Only successful results are stored.
    pub fn get_or_decode<F>(
        &self,
        full_path: &str,
        raw_bytes: F,
        decoder: &dyn Decoder,
    ) -> Result<Rc<ArrayTable>>
    where
        F: FnOnce(&str) -> Result<Bytes>,
    {
        if let Some(table) = self.get(full_path) {
            return Ok(table);
        }

        debug!("decoding {full_path}");
        let bytes = raw_bytes(full_path)?;
        let table = decoder.decode(&bytes).map_err(|source| Error::Decode {
            path: full_path.to_string(),
            source,
        })?;

        let table = Rc::new(table);
        self.tables
            .borrow_mut()
            .insert(full_path.to_string(), Rc::clone(&table));
        self.decodes.set(self.decodes.get() + 1);
        Ok(table)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.tables.borrow().contains_key(path)
    }

    /// Number of cached tables
    pub fn len(&self) -> usize {
        self.tables.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of successful decodes since creation
    pub fn decode_count(&self) -> usize {
        self.decodes.get()
    }

    /// Drop every cached table
    pub fn clear(&self) {
        self.tables.borrow_mut().clear();
    }
}
