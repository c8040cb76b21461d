//! Project resource / 项目资源

use serde_json::json;
use std::fmt;

use crate::client::GcsClient;
use crate::constants::{projection, storage_class};
use crate::error::Result;
use crate::http::{HttpRequest, Method};
use crate::retry::RetrySetting;

use super::bucket::Bucket;
use super::{list_pages, Resource};

/// Bucket listing filters / 存储桶列表参数
#[derive(Debug, Clone, Default)]
pub struct ListBucketsOptions {
    pub prefix: Option<String>,
    pub max_results: Option<u32>,
    pub projection: Option<String>,
}

/// New bucket settings / 新建存储桶参数
#[derive(Debug, Clone)]
pub struct CreateBucketOptions {
    pub location: String,
    pub storage_class: String,
    /// Bucket ACL, see [`crate::constants::acl`] / 存储桶ACL
    pub predefined_acl: Option<String>,
    /// Default ACL of new objects / 新对象的默认ACL
    pub predefined_default_object_acl: Option<String>,
    pub projection: String,
}

impl Default for CreateBucketOptions {
    fn default() -> Self {
        Self {
            location: "US".to_string(),
            storage_class: storage_class::NEARLINE.to_string(),
            predefined_acl: None,
            predefined_default_object_acl: None,
            projection: projection::NO_ACL.to_string(),
        }
    }
}

/// GCS project / GCS项目
pub struct Project {
    client: GcsClient,
    project_id: String,
}

impl Project {
    pub fn new(client: GcsClient, project_id: impl Into<String>) -> Self {
        Self {
            client,
            project_id: project_id.into(),
        }
    }

    pub fn with_retry(mut self, retry: impl Into<RetrySetting>) -> Self {
        self.client = self.client.with_retry(retry);
        self
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// `<project_id>.appspot.com` / 默认存储桶名称
    pub fn default_bucket_name(&self) -> String {
        format!("{}.appspot.com", self.project_id)
    }

    /// List the project's buckets / 列出项目的存储桶
    pub fn list(&self, options: ListBucketsOptions) -> Result<Vec<Bucket>> {
        let mut query = vec![("project".to_string(), self.project_id.clone())];
        crate::utils::push_opt(&mut query, "prefix", options.prefix.as_deref());
        crate::utils::push_opt(&mut query, "maxResults", options.max_results);
        crate::utils::push_opt(&mut query, "projection", options.projection.as_deref());

        let entries = list_pages(&self.client, &self.client.buckets_url(), query, None)?;
        Ok(entries
            .into_iter()
            .filter_map(|entry| match entry {
                Resource::Bucket(b) => Some(b),
                _ => None,
            })
            .collect())
    }

    /// Create a bucket in this project / 在项目中创建存储桶
    pub fn create_bucket(&self, name: &str, options: CreateBucketOptions) -> Result<Bucket> {
        let body = json!({
            "name": name,
            "location": options.location,
            "storageClass": options.storage_class,
        });
        let request = HttpRequest::new(Method::Post, self.client.buckets_url())
            .query("project", &self.project_id)
            .query_opt("predefinedAcl", options.predefined_acl.as_deref())
            .query_opt("predefinedDefaultObjectAcl", options.predefined_default_object_acl.as_deref())
            .query("projection", &options.projection)
            .json(&body)?;

        let response = self
            .client
            .retry()
            .call(|| self.client.execute(request.clone(), &[200]))?;
        let bucket = Bucket::from_data(&self.client, response.json()?)?;
        tracing::info!("Created bucket {} in project {}", bucket.name(), self.project_id);
        Ok(bucket)
    }
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.project_id)
    }
}

impl fmt::Debug for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Project").field("project_id", &self.project_id).finish()
    }
}
