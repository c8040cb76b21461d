//! Prefix ("directory") inside a bucket / 存储桶中的前缀（目录）

use std::fmt;

use crate::client::GcsClient;
use crate::error::Result;

use super::bucket::{list_objects, ListObjectsOptions};
use super::Resource;

pub struct Prefix {
    client: GcsClient,
    bucket: String,
    prefix: String,
    delimiter: Option<String>,
}

impl Prefix {
    pub fn new(client: GcsClient, bucket: impl Into<String>, prefix: impl Into<String>, delimiter: Option<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: prefix.into(),
            delimiter,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn delimiter(&self) -> Option<&str> {
        self.delimiter.as_deref()
    }

    /// List entries under this prefix / 列出前缀下的条目
    /// Unset `prefix` and `delimiter` default to this prefix's own.
    pub fn list(&self, mut options: ListObjectsOptions) -> Result<Vec<Resource>> {
        if options.prefix.is_none() {
            options.prefix = Some(self.prefix.clone());
        }
        if options.delimiter.is_none() {
            options.delimiter = self.delimiter.clone();
        }
        list_objects(&self.client, &self.bucket, &options)
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prefix)
    }
}

impl fmt::Debug for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Prefix")
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .field("delimiter", &self.delimiter)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::mock_client;
    use serde_json::json;

    #[test]
    fn test_list_defaults_to_own_prefix() {
        let (client, mock) = mock_client();
        mock.push_json(
            200,
            json!({"kind": "storage#objects", "prefixes": ["photos/2016/"], "items": []}),
        );

        let prefix = Prefix::new(client, "b", "photos/", Some("/".to_string()));
        let entries = prefix.list(ListObjectsOptions::default()).unwrap();

        assert_eq!(entries.len(), 1);
        match &entries[0] {
            Resource::Prefix(p) => {
                assert_eq!(p.prefix(), "photos/2016/");
                assert_eq!(p.bucket(), "b");
                assert_eq!(p.delimiter(), Some("/"));
            }
            other => panic!("unexpected entry: {:?}", other),
        }

        let request = mock.last().unwrap();
        assert_eq!(request.url, "https://www.googleapis.com/storage/v1/b/b/o");
        assert_eq!(request.query_value("prefix"), Some("photos/"));
        assert_eq!(request.query_value("delimiter"), Some("/"));
    }

    #[test]
    fn test_explicit_options_win() {
        let (client, mock) = mock_client();
        mock.push_json(200, json!({"kind": "storage#objects"}));

        let prefix = Prefix::new(client, "b", "photos/", Some("/".to_string()));
        prefix
            .list(ListObjectsOptions {
                prefix: Some("photos/2016/".to_string()),
                delimiter: Some("-".to_string()),
                ..Default::default()
            })
            .unwrap();

        let request = mock.last().unwrap();
        assert_eq!(request.query_value("prefix"), Some("photos/2016/"));
        assert_eq!(request.query_value("delimiter"), Some("-"));
    }
}
