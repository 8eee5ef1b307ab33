//! Task context: the string-keyed argument/result container.
//!
//! The executor never inspects the contents, it only moves the shared
//! reference around; the task body reads its arguments from here and writes
//! its results back. Values are `serde_json::Value`, so anything
//! serializable fits.
//!
//! # 設計メモ
//! - すべてのメソッドは `&self` を取る（内部は `RwLock`）。Task 本体と
//!   submitter が別スレッドから同時に触っても安全。
//! - ロックはメソッド内で完結し、呼び出し側コードを跨いで保持しない。

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Mutable string-keyed container shared between a task and its submitter.
#[derive(Debug, Default)]
pub struct TaskContext {
    entries: RwLock<HashMap<String, Value>>,
}

impl TaskContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Value>> {
        // A poisoned map is still a valid map; carry on with it.
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Value>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a value, returning the previous one under the same key.
    pub fn put(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.write().insert(key.into(), value)
    }

    /// Serialize and store any serializable value.
    pub fn put_value<T: Serialize>(
        &self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<Option<Value>, serde_json::Error> {
        Ok(self.put(key, serde_json::to_value(value)?))
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.read().get(key).cloned()
    }

    /// Fetch and deserialize. `None` when the key is absent or the value
    /// does not decode as `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        serde_json::from_value(value).ok()
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.write().remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    /// Snapshot of the current keys (unordered).
    pub fn keys(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    /// Copy every entry into `acceptor`. With `replace = false`, keys the
    /// acceptor already holds are left untouched.
    pub fn merge_into(&self, acceptor: &TaskContext, replace: bool) {
        if std::ptr::eq(self, acceptor) {
            return;
        }
        let source = self.read();
        let mut target = acceptor.write();
        for (key, value) in source.iter() {
            if replace || !target.contains_key(key) {
                target.insert(key.clone(), value.clone());
            }
        }
    }

    /// Drop every entry the predicate rejects.
    pub fn retain(&self, mut criteria: impl FnMut(&str, &Value) -> bool) {
        self.write().retain(|k, v| criteria(k, v));
    }

    /// New context holding only the entries the predicate accepts.
    pub fn copy_if(&self, mut criteria: impl FnMut(&str, &Value) -> bool) -> TaskContext {
        let source = self.read();
        let entries = source
            .iter()
            .filter(|(k, v)| criteria(k, v))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        TaskContext {
            entries: RwLock::new(entries),
        }
    }
}
