//! GCS resources / GCS资源
//!
//! Buckets, objects and prefixes returned by listings are built through a
//! static registry keyed by the `kind` string GCS puts in every response.

use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashMap;

use crate::client::GcsClient;
use crate::error::{GcsError, Result};
use crate::http::{HttpRequest, Method};

pub mod bucket;
pub mod lazy;
pub mod object;
pub mod prefix;
pub mod project;

pub use bucket::{Bucket, ListObjectsOptions};
pub use lazy::{Fillable, LazyAttrs};
pub use object::{DeleteObjectOptions, Object};
pub use prefix::Prefix;
pub use project::{CreateBucketOptions, ListBucketsOptions, Project};

/// Listing entry / 列表项
#[derive(Debug)]
pub enum Resource {
    Bucket(Bucket),
    Object(Object),
    Prefix(Prefix),
}

impl Resource {
    /// Display name: bucket name, `bucket/object` or the prefix / 显示名称
    pub fn display_name(&self) -> String {
        match self {
            Resource::Bucket(b) => b.name().to_string(),
            Resource::Object(o) => o.to_string(),
            Resource::Prefix(p) => p.prefix().to_string(),
        }
    }
}

type Constructor = fn(&GcsClient, Value) -> Result<Resource>;

/// `kind` → constructor / 资源类型注册表
static KIND_REGISTRY: Lazy<HashMap<&'static str, Constructor>> = Lazy::new(|| {
    let mut registry: HashMap<&'static str, Constructor> = HashMap::new();

    registry.insert("storage#bucket", bucket_from_data);
    registry.insert("storage#buckets", bucket_from_data);
    registry.insert("storage#object", object_from_data);
    registry.insert("storage#objects", object_from_data);
    registry
});

fn bucket_from_data(client: &GcsClient, data: Value) -> Result<Resource> {
    Ok(Resource::Bucket(Bucket::from_data(client, data)?))
}

fn object_from_data(client: &GcsClient, data: Value) -> Result<Resource> {
    Ok(Resource::Object(Object::from_data(client, data)?))
}

/// Build a resource from server data of the given kind / 根据kind创建资源
pub fn from_data(client: &GcsClient, kind: &str, data: Value) -> Result<Resource> {
    match KIND_REGISTRY.get(kind) {
        Some(constructor) => constructor(client, data),
        None => Err(GcsError::BadResponse(format!("unknown resource kind: {}", kind))),
    }
}

/// Where prefixes in a listing belong / 列表中前缀所属的位置
pub(crate) struct PrefixContext<'a> {
    pub bucket: &'a str,
    pub delimiter: Option<&'a str>,
}

/// Collect every page of a listing / 获取全部分页结果
/// Each page request is retried on its own.
pub(crate) fn list_pages(
    client: &GcsClient,
    url: &str,
    query: Vec<(String, String)>,
    prefixes: Option<PrefixContext<'_>>,
) -> Result<Vec<Resource>> {
    let mut result = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let mut request = HttpRequest::new(Method::Get, url);
        request.query = query.clone();
        let request = request.query_opt("pageToken", page_token.as_deref());

        let response = client
            .retry()
            .call(|| client.execute(request.clone(), &[200]))?;
        let page: Value = response.json()?;
        let list_kind = page["kind"].as_str().unwrap_or_default().to_string();

        if let Some(items) = page["items"].as_array() {
            for item in items {
                let kind = item["kind"].as_str().unwrap_or(&list_kind);
                result.push(from_data(client, kind, item.clone())?);
            }
        }

        if let (Some(ctx), Some(names)) = (&prefixes, page["prefixes"].as_array()) {
            for name in names.iter().filter_map(Value::as_str) {
                result.push(Resource::Prefix(Prefix::new(
                    client.clone(),
                    ctx.bucket,
                    name,
                    ctx.delimiter.map(str::to_string),
                )));
            }
        }

        page_token = page["nextPageToken"]
            .as_str()
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        if page_token.is_none() {
            break;
        }
        tracing::debug!("Listing {} continues, {} entries so far", url, result.len());
    }

    Ok(result)
}

/// `HEAD` the resource; not found and bad request mean absent / 判断资源是否存在
pub(crate) fn head_exists(client: &GcsClient, url: &str) -> Result<bool> {
    let request = HttpRequest::new(Method::Head, url);
    match client.retry().call(|| client.execute(request.clone(), &[200])) {
        Ok(_) => Ok(true),
        Err(e) if matches!(e.http_code(), Some(404) | Some(400)) => Ok(false),
        Err(e) => Err(e),
    }
}
