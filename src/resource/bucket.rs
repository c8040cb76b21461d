//! Bucket resource / 存储桶资源

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt;

use crate::client::GcsClient;
use crate::error::{GcsError, Result};
use crate::http::{HttpRequest, Method};
use crate::retry::RetrySetting;
use crate::storage::file::OpenOptions;
use crate::storage::{Mode, ObjectFile};

use super::lazy::{Fillable, LazyAttrs};
use super::object::Object;
use super::{head_exists, list_pages, PrefixContext, Resource};

/// Object listing filters / 对象列表参数
#[derive(Debug, Clone, Default)]
pub struct ListObjectsOptions {
    /// Only names starting with this / 名称前缀
    pub prefix: Option<String>,
    /// Page size / 每页数量
    pub max_results: Option<u32>,
    /// Include every object version / 包含所有版本
    pub versions: Option<bool>,
    /// Group names sharing a prefix up to this / 分隔符
    pub delimiter: Option<String>,
    /// `full` or `noAcl` / 投影
    pub projection: Option<String>,
}

/// List the objects of `bucket` / 列出存储桶中的对象
pub(crate) fn list_objects(client: &GcsClient, bucket: &str, options: &ListObjectsOptions) -> Result<Vec<Resource>> {
    let mut query = Vec::new();
    crate::utils::push_opt(&mut query, "prefix", options.prefix.as_deref());
    crate::utils::push_opt(&mut query, "maxResults", options.max_results);
    crate::utils::push_opt(&mut query, "versions", options.versions);
    crate::utils::push_opt(&mut query, "delimiter", options.delimiter.as_deref());
    crate::utils::push_opt(&mut query, "projection", options.projection.as_deref());

    let url = format!("{}/o", client.bucket_url(bucket));
    let ctx = PrefixContext {
        bucket,
        delimiter: options.delimiter.as_deref(),
    };
    list_pages(client, &url, query, Some(ctx))
}

/// GCS bucket / GCS存储桶
pub struct Bucket {
    client: GcsClient,
    name: String,
    lazy: LazyAttrs,
}

impl Bucket {
    pub fn new(client: GcsClient, name: impl Into<String>) -> Self {
        Self {
            client,
            name: name.into(),
            lazy: LazyAttrs::new(),
        }
    }

    /// Build from listing or creation data, no fetch needed / 从已有数据创建
    pub fn from_data(client: &GcsClient, data: Value) -> Result<Self> {
        let name = data["name"]
            .as_str()
            .ok_or_else(|| GcsError::BadResponse(format!("bucket data has no name: {}", data)))?
            .to_string();
        let bucket = Self::new(client.clone(), name);
        bucket.fill_with_data(data);
        Ok(bucket)
    }

    pub fn with_retry(mut self, retry: impl Into<RetrySetting>) -> Self {
        self.client = self.client.with_retry(retry);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn exists(&self) -> Result<bool> {
        head_exists(&self.client, &self.client.bucket_url(&self.name))
    }

    pub fn list(&self, options: ListObjectsOptions) -> Result<Vec<Resource>> {
        list_objects(&self.client, &self.name, &options)
    }

    /// Delete the (empty) bucket / 删除存储桶
    pub fn delete(&self, if_metageneration_match: Option<i64>, if_metageneration_not_match: Option<i64>) -> Result<()> {
        let request = HttpRequest::new(Method::Delete, self.client.bucket_url(&self.name))
            .query_opt("ifMetagenerationMatch", if_metageneration_match)
            .query_opt("ifMetagenerationNotMatch", if_metageneration_not_match);

        self.client
            .retry()
            .call(|| self.client.execute(request.clone(), &[204]))?;
        tracing::info!("Deleted bucket {}", self.name);
        Ok(())
    }

    pub fn object(&self, name: impl Into<String>) -> Object {
        Object::new(self.client.clone(), self.name.clone(), name)
    }

    /// Open an object of this bucket / 打开存储桶中的对象
    pub fn open(&self, name: impl Into<String>, mode: Mode, generation: Option<i64>) -> Result<ObjectFile> {
        let options = OpenOptions {
            generation,
            ..Default::default()
        };
        ObjectFile::open_with(&self.client, self.name.clone(), name, mode, options)
    }

    pub fn location(&self) -> Result<String> {
        self.attr_str("location")
    }

    pub fn storage_class(&self) -> Result<String> {
        self.attr_str("storageClass")
    }

    pub fn etag(&self) -> Result<String> {
        self.attr_str("etag")
    }

    pub fn time_created(&self) -> Result<DateTime<Utc>> {
        self.attr_time("timeCreated")
    }
}

impl Fillable for Bucket {
    const RESOURCE: &'static str = "Bucket";

    fn lazy(&self) -> &LazyAttrs {
        &self.lazy
    }

    fn identity(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(Value::String(self.name.clone())),
            _ => None,
        }
    }

    fn get_data(&self) -> Result<Value> {
        let request = HttpRequest::new(Method::Get, self.client.bucket_url(&self.name));
        let response = self
            .client
            .retry()
            .call(|| self.client.execute(request.clone(), &[200]))?;
        response.json()
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Debug for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bucket").field("name", &self.name).finish()
    }
}
