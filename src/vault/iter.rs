//! Lazy key iteration.

use std::collections::VecDeque;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;

use super::Vault;
use crate::codec;
use crate::error::Result;

/// Iterator over a vault's keys, fetched a page at a time
///
/// Each page is read in its own short transaction, so writes from other
/// callers may land between pages. Pages resume strictly after the last
/// key seen; a key is never yielded twice, while keys inserted behind the
/// cursor are not yielded at all.
pub struct Keys<'v, K> {
    vault: &'v Vault,
    after: Option<Vec<u8>>,
    buffer: VecDeque<Vec<u8>>,
    exhausted: bool,
    _key: PhantomData<fn() -> K>,
}

impl<'v, K> Keys<'v, K> {
    pub(crate) fn new(vault: &'v Vault) -> Self {
        Self {
            vault,
            after: None,
            buffer: VecDeque::new(),
            exhausted: false,
            _key: PhantomData,
        }
    }

    fn refill(&mut self) -> Result<()> {
        let limit = self.vault.page_size();
        let page = self.vault.keys_page(self.after.as_deref(), limit)?;
        if page.len() < limit {
            self.exhausted = true;
        }
        if let Some(last) = page.last() {
            self.after = Some(last.clone());
        }
        self.buffer.extend(page);
        Ok(())
    }
}

impl<K: DeserializeOwned> Iterator for Keys<'_, K> {
    type Item = Result<K>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(e) = self.refill() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
        let raw = self.buffer.pop_front()?;
        Some(codec::decode(&raw))
    }
}
