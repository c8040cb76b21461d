//! Object resource / 对象资源

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt;

use crate::client::GcsClient;
use crate::error::{GcsError, Result};
use crate::http::{HttpRequest, Method};
use crate::retry::RetrySetting;
use crate::storage::file::OpenOptions;
use crate::storage::{validate_chunk_size, Mode, ObjectFile};

use super::head_exists;
use super::lazy::{Fillable, LazyAttrs};

/// Preconditions for deleting an object / 删除对象的条件参数
#[derive(Debug, Clone, Default)]
pub struct DeleteObjectOptions {
    /// Permanently delete this revision / 删除指定版本
    pub generation: Option<i64>,
    pub if_generation_match: Option<i64>,
    pub if_generation_not_match: Option<i64>,
    pub if_metageneration_match: Option<i64>,
    pub if_metageneration_not_match: Option<i64>,
}

/// GCS stored object / GCS存储对象
pub struct Object {
    client: GcsClient,
    bucket: String,
    name: String,
    /// Pinned revision; latest when unset / 指定版本（为空表示最新）
    generation: Option<i64>,
    chunk_size: Option<usize>,
    lazy: LazyAttrs,
}

impl Object {
    pub fn new(client: GcsClient, bucket: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            name: name.into(),
            generation: None,
            chunk_size: None,
            lazy: LazyAttrs::new(),
        }
    }

    /// Build from listing data / 从列表数据创建
    pub fn from_data(client: &GcsClient, data: Value) -> Result<Self> {
        let field = |key: &str| {
            data[key]
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| GcsError::BadResponse(format!("object data has no {}: {}", key, data)))
        };
        let mut object = Self::new(client.clone(), field("bucket")?, field("name")?);
        object.generation = parse_generation(&data["generation"])?;
        object.fill_with_data(data);
        Ok(object)
    }

    pub fn with_generation(mut self, generation: i64) -> Self {
        self.generation = Some(generation);
        self
    }

    /// Chunk size used by handles opened from this object / 分片大小
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Result<Self> {
        self.chunk_size = Some(validate_chunk_size(chunk_size)?);
        Ok(self)
    }

    pub fn with_retry(mut self, retry: impl Into<RetrySetting>) -> Self {
        self.client = self.client.with_retry(retry);
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn generation(&self) -> Option<i64> {
        self.generation
    }

    pub fn exists(&self) -> Result<bool> {
        head_exists(&self.client, &self.client.object_url(&self.bucket, &self.name))
    }

    /// Delete the object / 删除对象
    /// Falls back to the pinned generation when none is given.
    pub fn delete(&self, options: DeleteObjectOptions) -> Result<()> {
        let request = HttpRequest::new(Method::Delete, self.client.object_url(&self.bucket, &self.name))
            .query_opt("generation", options.generation.or(self.generation))
            .query_opt("ifGenerationMatch", options.if_generation_match)
            .query_opt("ifGenerationNotMatch", options.if_generation_not_match)
            .query_opt("ifMetagenerationMatch", options.if_metageneration_match)
            .query_opt("ifMetagenerationNotMatch", options.if_metageneration_not_match);

        self.client
            .retry()
            .call(|| self.client.execute(request.clone(), &[204]))?;
        tracing::info!("Deleted gs://{}/{}", self.bucket, self.name);
        Ok(())
    }

    pub fn open(&self, mode: Mode) -> Result<ObjectFile> {
        let options = OpenOptions {
            generation: self.generation,
            chunk_size: self.chunk_size,
            retry: None,
        };
        ObjectFile::open_with(&self.client, self.bucket.clone(), self.name.clone(), mode, options)
    }

    /// Open, run `f`, always close / 打开对象执行操作后关闭
    pub fn with_file<T, F>(&self, mode: Mode, f: F) -> Result<T>
    where
        F: FnOnce(&mut ObjectFile) -> Result<T>,
    {
        self.open(mode)?.scoped(f)
    }

    pub fn size(&self) -> Result<u64> {
        self.attr_u64("size")
    }

    pub fn etag(&self) -> Result<String> {
        self.attr_str("etag")
    }

    pub fn content_type(&self) -> Result<String> {
        self.attr_str("contentType")
    }

    pub fn md5_hash(&self) -> Result<String> {
        self.attr_str("md5Hash")
    }

    pub fn storage_class(&self) -> Result<String> {
        self.attr_str("storageClass")
    }

    pub fn updated(&self) -> Result<DateTime<Utc>> {
        self.attr_time("updated")
    }
}

/// Generations arrive as decimal strings, occasionally as numbers / 解析版本号
fn parse_generation(value: &Value) -> Result<Option<i64>> {
    let parsed = match value {
        Value::Null => return Ok(None),
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_i64(),
        _ => None,
    };
    parsed
        .map(Some)
        .ok_or_else(|| GcsError::BadResponse(format!("object generation is not an integer: {}", value)))
}

impl Fillable for Object {
    const RESOURCE: &'static str = "Object";

    fn lazy(&self) -> &LazyAttrs {
        &self.lazy
    }

    fn identity(&self, name: &str) -> Option<Value> {
        match name {
            "bucket" => Some(Value::String(self.bucket.clone())),
            "name" => Some(Value::String(self.name.clone())),
            "generation" => self.generation.map(|g| Value::String(g.to_string())),
            _ => None,
        }
    }

    fn get_data(&self) -> Result<Value> {
        let request = HttpRequest::new(Method::Get, self.client.object_url(&self.bucket, &self.name))
            .query_opt("generation", self.generation);
        let response = self
            .client
            .retry()
            .call(|| self.client.execute(request.clone(), &[200]))?;
        response.json()
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.name)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("bucket", &self.bucket)
            .field("name", &self.name)
            .field("generation", &self.generation)
            .finish()
    }
}
