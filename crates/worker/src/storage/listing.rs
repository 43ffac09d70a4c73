use std::collections::VecDeque;

use super::{ContentStore, StorageError};

/// Lazy, finite, non-restartable enumeration of the keys under a prefix.
///
/// Pages are fetched on demand as the single consumer advances. After the
/// last page or the first listing error the sequence is over.
pub struct ObjectKeys<'a> {
    store: &'a dyn ContentStore,
    prefix: &'a str,
    buffered: VecDeque<String>,
    next_token: Option<String>,
    exhausted: bool,
    pages_fetched: usize,
}

impl<'a> ObjectKeys<'a> {
    pub fn new(store: &'a dyn ContentStore, prefix: &'a str) -> Self {
        Self {
            store,
            prefix,
            buffered: VecDeque::new(),
            next_token: None,
            exhausted: false,
            pages_fetched: 0,
        }
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    pub async fn next_key(&mut self) -> Option<Result<String, StorageError>> {
        loop {
            if let Some(key) = self.buffered.pop_front() {
                return Some(Ok(key));
            }
            if self.exhausted {
                return None;
            }

            let result = self.store.list_page(self.prefix, self.next_token.as_deref()).await;
            match result {
                Ok(page) => {
                    self.pages_fetched += 1;
                    self.buffered.extend(page.keys);
                    self.exhausted = page.next_token.is_none();
                    self.next_token = page.next_token;
                }
                Err(error) => {
                    self.exhausted = true;
                    self.buffered.clear();
                    return Some(Err(error));
                }
            }
        }
    }

    /// Consume the whole sequence. Any listing error discards what was
    /// collected so far.
    pub async fn drain(mut self) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        while let Some(key) = self.next_key().await {
            keys.push(key?);
        }
        Ok(keys)
    }
}
