//! Lazy metadata hydration / 元数据延迟加载
//!
//! A resource has a few fixed identity fields (bucket, name, ...) and a map
//! of extra metadata. Looking up an unknown attribute fetches the metadata at
//! most once; afterwards unknown names fail without I/O.
//!
//! Merge policy: fetched data overwrites locally set extra attributes, but
//! never a set identity field.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::error::{GcsError, Result};
use crate::utils::unwrap_single_key;

/// Mutable hydration state / 加载状态
#[derive(Debug, Default)]
pub struct LazyState {
    /// Extra metadata / 额外元数据
    attrs: Map<String, Value>,
    /// Metadata has been fetched or supplied / 是否已获取数据
    data_retrieved: bool,
    /// `Some(false)` once a fetch returned not found / 是否存在
    exists: Option<bool>,
}

impl LazyState {
    fn merge<F>(&mut self, data: Value, is_identity: F)
    where
        F: Fn(&str) -> bool,
    {
        self.data_retrieved = true;
        if let Value::Object(map) = data {
            for (key, value) in map {
                if is_identity(&key) {
                    continue;
                }
                self.attrs.insert(key, unwrap_single_key(value));
            }
        }
    }
}

/// Lock-protected lazy state / 带锁的加载状态
/// The lock is held across the fetch, so concurrent lookups fetch once.
#[derive(Debug, Default)]
pub struct LazyAttrs {
    state: Mutex<LazyState>,
}

impl LazyAttrs {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A resource whose metadata is fetched on demand / 可延迟填充的资源
pub trait Fillable {
    /// Type name used in "no attribute" errors / 资源类型名
    const RESOURCE: &'static str;

    fn lazy(&self) -> &LazyAttrs;

    /// Value of a set identity field / 身份字段的值
    fn identity(&self, name: &str) -> Option<Value>;

    /// Fetch the full metadata from GCS / 从GCS获取完整元数据
    fn get_data(&self) -> Result<Value>;

    /// Look up an attribute, fetching metadata once if needed / 获取属性
    fn attr(&self, name: &str) -> Result<Value> {
        if let Some(value) = self.identity(name) {
            return Ok(value);
        }

        let missing = || GcsError::NoSuchAttribute {
            resource: Self::RESOURCE,
            name: name.to_string(),
        };

        let mut state = self.lazy().state.lock();
        if let Some(value) = state.attrs.get(name) {
            return Ok(value.clone());
        }
        if state.data_retrieved || state.exists == Some(false) {
            return Err(missing());
        }

        tracing::debug!("Fetching {} metadata for attribute '{}'", Self::RESOURCE, name);
        match self.get_data() {
            Ok(data) => {
                state.exists = Some(true);
                state.merge(data, |key| self.identity(key).is_some());
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!("{} does not exist", Self::RESOURCE);
                state.exists = Some(false);
                return Err(missing());
            }
            Err(e) => return Err(e),
        }

        state.attrs.get(name).cloned().ok_or_else(missing)
    }

    /// String attribute; non-string values are rendered as JSON / 字符串属性
    fn attr_str(&self, name: &str) -> Result<String> {
        Ok(match self.attr(name)? {
            Value::String(s) => s,
            other => other.to_string(),
        })
    }

    /// Integer attribute; GCS sends 64-bit integers as strings / 整数属性
    fn attr_u64(&self, name: &str) -> Result<u64> {
        let value = self.attr(name)?;
        let parsed = match &value {
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n.as_u64(),
            _ => None,
        };
        parsed.ok_or_else(|| GcsError::BadResponse(format!("{} is not an integer: {}", name, value)))
    }

    /// RFC 3339 timestamp attribute / 时间属性
    fn attr_time(&self, name: &str) -> Result<DateTime<Utc>> {
        let raw = self.attr_str(name)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| GcsError::BadResponse(format!("{} is not a timestamp ({}): {}", name, raw, e)))
    }

    /// Set an extra attribute locally / 本地设置属性
    fn set_attr(&self, name: &str, value: Value) {
        self.lazy().state.lock().attrs.insert(name.to_string(), value);
    }

    /// Merge known data and mark the resource as hydrated / 用已知数据填充
    fn fill_with_data(&self, data: Value) {
        let mut state = self.lazy().state.lock();
        state.merge(data, |key| self.identity(key).is_some());
    }

    fn data_retrieved(&self) -> bool {
        self.lazy().state.lock().data_retrieved
    }

    /// `None` until a fetch has been attempted / 是否存在（未知为None）
    fn exists_hint(&self) -> Option<bool> {
        self.lazy().state.lock().exists
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HttpError;
    use serde_json::json;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    /// Resource with scripted fetch results / 脚本化的测试资源
    struct Dummy {
        name: Option<String>,
        lazy: LazyAttrs,
        fetches: Cell<usize>,
        replies: RefCell<VecDeque<Result<Value>>>,
    }

    impl Dummy {
        fn new(name: Option<&str>, replies: Vec<Result<Value>>) -> Self {
            Self {
                name: name.map(str::to_string),
                lazy: LazyAttrs::new(),
                fetches: Cell::new(0),
                replies: RefCell::new(replies.into()),
            }
        }
    }

    impl Fillable for Dummy {
        const RESOURCE: &'static str = "Dummy";

        fn lazy(&self) -> &LazyAttrs {
            &self.lazy
        }

        fn identity(&self, name: &str) -> Option<Value> {
            match name {
                "name" => self.name.clone().map(Value::String),
                _ => None,
            }
        }

        fn get_data(&self) -> Result<Value> {
            self.fetches.set(self.fetches.get() + 1);
            self.replies
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(GcsError::Transport("unexpected fetch".into())))
        }
    }

    #[test]
    fn test_known_attribute_needs_no_fetch() {
        let dummy = Dummy::new(Some("a"), vec![]);
        assert_eq!(dummy.attr("name").unwrap(), json!("a"));
        dummy.set_attr("color", json!("red"));
        assert_eq!(dummy.attr("color").unwrap(), json!("red"));
        assert_eq!(dummy.fetches.get(), 0);
    }

    #[test]
    fn test_fetch_once_then_cached() {
        let dummy = Dummy::new(Some("a"), vec![Ok(json!({"size": "10", "etag": "xyz"}))]);
        assert_eq!(dummy.attr("size").unwrap(), json!("10"));
        assert_eq!(dummy.attr("etag").unwrap(), json!("xyz"));
        assert_eq!(dummy.attr_u64("size").unwrap(), 10);
        assert_eq!(dummy.fetches.get(), 1);
        assert!(dummy.data_retrieved());
        assert_eq!(dummy.exists_hint(), Some(true));
    }

    #[test]
    fn test_unknown_attribute_single_flight() {
        let dummy = Dummy::new(Some("a"), vec![Ok(json!({"size": "10"}))]);
        assert!(matches!(dummy.attr("missing"), Err(GcsError::NoSuchAttribute { .. })));
        assert!(matches!(dummy.attr("missing"), Err(GcsError::NoSuchAttribute { .. })));
        assert_eq!(dummy.fetches.get(), 1);
    }

    #[test]
    fn test_not_found_marks_nonexistent() {
        let dummy = Dummy::new(Some("a"), vec![Err(HttpError::new(404, "").into())]);
        let err = dummy.attr("size").unwrap_err();
        assert_eq!(err.to_string(), "'Dummy' object has no attribute 'size'");
        assert_eq!(dummy.exists_hint(), Some(false));
        assert!(!dummy.data_retrieved());

        assert!(dummy.attr("etag").is_err());
        assert_eq!(dummy.fetches.get(), 1);
    }

    #[test]
    fn test_other_errors_propagate_and_allow_retry() {
        let dummy = Dummy::new(
            Some("a"),
            vec![Err(HttpError::new(403, "denied").into()), Ok(json!({"size": "3"}))],
        );
        assert_eq!(dummy.attr("size").unwrap_err().http_code(), Some(403));
        assert_eq!(dummy.exists_hint(), None);

        assert_eq!(dummy.attr("size").unwrap(), json!("3"));
        assert_eq!(dummy.fetches.get(), 2);
    }

    #[test]
    fn test_fetched_data_overwrites_extras_not_identity() {
        let dummy = Dummy::new(
            Some("local-name"),
            vec![Ok(json!({"name": "server-name", "color": "blue", "size": "1"}))],
        );
        dummy.set_attr("color", json!("red"));

        assert_eq!(dummy.attr("size").unwrap(), json!("1"));
        assert_eq!(dummy.attr("color").unwrap(), json!("blue"));
        assert_eq!(dummy.attr("name").unwrap(), json!("local-name"));
    }

    #[test]
    fn test_unset_identity_is_filled() {
        let dummy = Dummy::new(None, vec![]);
        dummy.fill_with_data(json!({"name": "from-data"}));
        assert_eq!(dummy.attr("name").unwrap(), json!("from-data"));
    }

    #[test]
    fn test_fill_with_data_skips_fetch() {
        let dummy = Dummy::new(Some("a"), vec![]);
        dummy.fill_with_data(json!({"owner": {"entity": "user-x"}, "acl": {"a": 1, "b": 2}}));

        assert_eq!(dummy.attr("owner").unwrap(), json!("user-x"));
        assert_eq!(dummy.attr("acl").unwrap(), json!({"a": 1, "b": 2}));
        assert!(dummy.attr("missing").is_err());
        assert_eq!(dummy.fetches.get(), 0);
    }

    #[test]
    fn test_attr_time() {
        let dummy = Dummy::new(Some("a"), vec![]);
        dummy.fill_with_data(json!({"updated": "2024-01-02T03:04:05.678Z", "bad": "yesterday"}));
        assert_eq!(dummy.attr_time("updated").unwrap().timestamp(), 1704164645);
        assert!(matches!(dummy.attr_time("bad"), Err(GcsError::BadResponse(_))));
    }
}
