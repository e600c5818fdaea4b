// Copyright 2019 Arnau Siches
//
// Licensed under the MIT license <LICENSE or http://opensource.org/licenses/MIT>.
// This file may not be copied, modified, or distributed except
// according to those terms.

//! The identity map behind navigators.

use crate::navigator::Resource;
use log::debug;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Maps canonical URLs to the one resource record shared by every navigator
/// pointing at that URL. Entries live as long as the API they belong to.
#[derive(Default)]
pub struct ResourceCache {
    entries: RefCell<HashMap<String, Rc<Resource>>>,
}

impl ResourceCache {
    pub fn new() -> ResourceCache {
        ResourceCache::default()
    }

    /// Returns the record for `url`, creating it with `make` the first time.
    /// `make` runs while the cache is borrowed and must not use it.
    pub(crate) fn get_or_create<F>(&self, url: &str, make: F) -> Rc<Resource>
    where
        F: FnOnce() -> Resource,
    {
        let mut entries = self.entries.borrow_mut();

        entries
            .entry(url.to_string())
            .or_insert_with(|| {
                debug!("caching {}", url);
                Rc::new(make())
            })
            .clone()
    }

    /// Stores `resource` under `url`, returning the record it replaces.
    pub(crate) fn put(&self, url: &str, resource: Rc<Resource>) -> Option<Rc<Resource>> {
        debug!("caching {}", url);
        self.entries.borrow_mut().insert(url.to_string(), resource)
    }

    pub(crate) fn get(&self, url: &str) -> Option<Rc<Resource>> {
        self.entries.borrow().get(url).cloned()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries.borrow().contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}
