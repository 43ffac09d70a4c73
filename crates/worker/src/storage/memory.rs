// In-memory content store for unit tests. Keys are listed in insertion
// order so tests control enumeration order.

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use super::{ContentStore, ObjectPage, ObjectReader, StorageError, StoreFuture};

#[derive(Clone, Default)]
pub(crate) struct MemoryContentStore {
    objects: Vec<(String, Vec<u8>)>,
    page_size: usize,
    fail_list_page: Option<usize>,
    fail_read_key: Option<String>,
    list_calls: Arc<Mutex<usize>>,
    opened: Arc<Mutex<Vec<String>>>,
}

impl MemoryContentStore {
    pub(crate) fn new(page_size: usize) -> Self {
        Self { page_size: page_size.max(1), ..Self::default() }
    }

    pub(crate) fn with_object(mut self, key: &str, content: &str) -> Self {
        self.objects.push((key.to_string(), content.as_bytes().to_vec()));
        self
    }

    /// Fail the n-th (1-based) listing request.
    pub(crate) fn failing_list_on_page(mut self, page: usize) -> Self {
        self.fail_list_page = Some(page);
        self
    }

    pub(crate) fn failing_read(mut self, key: &str) -> Self {
        self.fail_read_key = Some(key.to_string());
        self
    }

    pub(crate) fn list_calls(&self) -> usize {
        *self.list_calls.lock().expect("list calls lock poisoned")
    }

    pub(crate) fn opened(&self) -> Vec<String> {
        self.opened.lock().expect("opened lock poisoned").clone()
    }
}

impl ContentStore for MemoryContentStore {
    fn list_page<'a>(
        &'a self,
        prefix: &'a str,
        continuation: Option<&'a str>,
    ) -> StoreFuture<'a, ObjectPage> {
        Box::pin(async move {
            let call = {
                let mut calls = self.list_calls.lock().expect("list calls lock poisoned");
                *calls += 1;
                *calls
            };
            if self.fail_list_page == Some(call) {
                return Err(StorageError::List {
                    prefix: prefix.to_string(),
                    message: format!("injected failure on page {call}"),
                });
            }

            let start: usize = continuation.and_then(|token| token.parse().ok()).unwrap_or(0);
            let matching: Vec<&String> =
                self.objects.iter().map(|(key, _)| key).filter(|key| key.starts_with(prefix)).collect();
            let end = (start + self.page_size).min(matching.len());
            let keys = matching[start.min(end)..end].iter().map(|key| key.to_string()).collect();
            let next_token = (end < matching.len()).then(|| end.to_string());
            Ok(ObjectPage { keys, next_token })
        })
    }

    fn open<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ObjectReader> {
        Box::pin(async move {
            self.opened.lock().expect("opened lock poisoned").push(key.to_string());
            if self.fail_read_key.as_deref() == Some(key) {
                return Err(StorageError::Read {
                    key: key.to_string(),
                    message: "injected read failure".to_string(),
                });
            }

            let content = self
                .objects
                .iter()
                .find(|(candidate, _)| candidate == key)
                .map(|(_, content)| content.clone())
                .ok_or_else(|| StorageError::Read {
                    key: key.to_string(),
                    message: "no such object".to_string(),
                })?;
            let reader: ObjectReader = Box::pin(Cursor::new(content));
            Ok(reader)
        })
    }
}
