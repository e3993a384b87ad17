//! Generic sled-backed entity store.
//!
//! Each entity owns one tree and the store is the sole writer of that tree,
//! including the `created_at`/`updated_at` stamps.

use crate::error::{MarketError, Result};
use crate::types::TimeStamp;
use chrono::Utc;
use minicbor::{Decode, Encode};
use sled::{Db, Tree};
use std::marker::PhantomData;

/// A persisted marketplace entity.
pub trait Record: Encode<()> + for<'b> Decode<'b, ()> {
    /// Name used in NotFound errors.
    const ENTITY: &'static str;
    /// Name of the sled tree holding this entity.
    const TREE: &'static str;

    fn id(&self) -> &str;
    fn owner(&self) -> &str;
    fn stamp_created(&mut self, at: TimeStamp<Utc>);
    fn stamp_updated(&mut self, at: TimeStamp<Utc>);
}

/// Pagination window for list/search operations.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

pub struct Store<T> {
    tree: Tree,
    _marker: PhantomData<T>,
}

impl<T: Record> Store<T> {
    pub fn open(db: &Db) -> Result<Self> {
        let tree = db.open_tree(T::TREE)?;
        Ok(Self {
            tree,
            _marker: PhantomData,
        })
    }

    /// Persist a new record, stamping both timestamps.
    pub fn create(&self, mut record: T) -> Result<T> {
        let now = TimeStamp::now();
        record.stamp_created(now.clone());
        record.stamp_updated(now);
        self.put(&record)?;
        Ok(record)
    }

    /// Write back a mutated record, refreshing `updated_at`.
    pub fn save(&self, record: &mut T) -> Result<()> {
        record.stamp_updated(TimeStamp::now());
        self.put(record)
    }

    pub fn find_by_id(&self, id: &str) -> Result<Option<T>> {
        match self.tree.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Like `find_by_id` but raises NotFound for an absent id.
    pub fn get(&self, id: &str) -> Result<T> {
        self.find_by_id(id)?
            .ok_or_else(|| MarketError::not_found(T::ENTITY, id))
    }

    pub fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.tree.remove(id.as_bytes())?.is_some())
    }

    pub fn find_by_owner(&self, owner: &str, page: Page) -> Result<(Vec<T>, usize)> {
        self.search(|record| record.owner() == owner, page)
    }

    /// Paged predicate search. Returns the page rows and the total match count.
    pub fn search<F>(&self, matches: F, page: Page) -> Result<(Vec<T>, usize)>
    where
        F: Fn(&T) -> bool,
    {
        let all = self.scan(matches)?;
        let total = all.len();
        let rows = all.into_iter().skip(page.offset).take(page.limit).collect();
        Ok((rows, total))
    }

    /// Unpaged predicate scan, used by the batch sweeps.
    pub fn scan<F>(&self, matches: F) -> Result<Vec<T>>
    where
        F: Fn(&T) -> bool,
    {
        let mut found = Vec::new();
        for entry in self.tree.iter() {
            let (_, bytes) = entry?;
            let record: T = decode(&bytes)?;
            if matches(&record) {
                found.push(record);
            }
        }
        Ok(found)
    }

    fn put(&self, record: &T) -> Result<()> {
        let bytes = encode(record)?;
        self.tree.insert(record.id().as_bytes(), bytes)?;
        Ok(())
    }
}

fn encode<T: Encode<()>>(value: &T) -> Result<Vec<u8>> {
    minicbor::to_vec(value).map_err(|err| MarketError::Internal(anyhow::anyhow!("cbor encode: {err}")))
}

fn decode<T: for<'b> Decode<'b, ()>>(bytes: &[u8]) -> Result<T> {
    minicbor::decode(bytes).map_err(|err| MarketError::Internal(anyhow::anyhow!("cbor decode: {err}")))
}
