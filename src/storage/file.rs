//! Object file handle / 对象文件句柄
//!
//! Lifecycle: `open` (metadata request or upload session initiation) →
//! reads or writes → `close` (final chunk for writers). A closed handle
//! never reopens.

use crate::client::GcsClient;
use crate::error::{GcsError, HttpError, Result};
use crate::http::{HttpRequest, HttpResponse, Method};
use crate::retry::RetrySetting;

use super::{validate_chunk_size, ByteBuffer, Mode};

/// Optional open parameters / 可选的打开参数
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    /// Specific object revision (read mode) / 指定对象版本（读模式）
    pub generation: Option<i64>,
    /// Overrides the client's chunk size / 覆盖客户端分片大小
    pub chunk_size: Option<usize>,
    /// Overrides the client's retry setting / 覆盖客户端重试配置
    pub retry: Option<RetrySetting>,
}

/// File-like handle over a GCS object / GCS对象的类文件句柄
pub struct ObjectFile {
    pub(super) client: GcsClient,
    /// Bucket name / 存储桶名称
    pub(super) bucket: String,
    /// Object name / 对象名称
    pub(super) name: String,
    pub(super) generation: Option<i64>,
    pub(super) mode: Mode,
    /// Network transfer unit / 网络传输单元
    pub(super) chunk_size: usize,
    pub(super) retry: RetrySetting,
    /// Object URL (read) or upload session URL (write) / 对象地址或上传会话地址
    pub(super) location: String,
    /// Read-ahead or pending upload bytes / 预读或待上传的数据
    pub(super) buffer: ByteBuffer,
    /// Caller-visible position / 调用方可见的位置
    pub(super) cursor: u64,
    /// Next offset to fetch or send / 下一个要获取或发送的偏移
    pub(super) remote_cursor: u64,
    /// Object size (read) or bytes written so far (write) / 对象大小或已写入字节数
    pub(super) size: u64,
    pub(super) eof: bool,
    pub(super) closed: bool,
}

/// Accept `ok` statuses, classify the rest / 检查响应状态码
/// Failures at or above 400 become HTTP errors (and may be retried);
/// anything else unexpected breaks the protocol.
pub(super) fn expect_status(response: HttpResponse, ok: &[u16], step: &'static str) -> Result<HttpResponse> {
    if ok.contains(&response.status) {
        Ok(response)
    } else if response.status >= 400 {
        Err(HttpError::new(response.status, response.text()).into())
    } else {
        Err(GcsError::Protocol {
            step,
            status: response.status,
        })
    }
}

impl ObjectFile {
    /// Open with the client's chunk size and retry setting / 使用客户端默认参数打开
    pub fn open(client: &GcsClient, bucket: impl Into<String>, name: impl Into<String>, mode: Mode) -> Result<Self> {
        Self::open_with(client, bucket, name, mode, OpenOptions::default())
    }

    pub fn open_with(
        client: &GcsClient,
        bucket: impl Into<String>,
        name: impl Into<String>,
        mode: Mode,
        options: OpenOptions,
    ) -> Result<Self> {
        let chunk_size = validate_chunk_size(options.chunk_size.unwrap_or_else(|| client.chunk_size()))?;
        let mut file = Self {
            client: client.clone(),
            bucket: bucket.into(),
            name: name.into(),
            generation: options.generation,
            mode,
            chunk_size,
            retry: options.retry.unwrap_or_else(|| client.retry().clone()),
            location: String::new(),
            buffer: ByteBuffer::new(),
            cursor: 0,
            remote_cursor: 0,
            size: 0,
            eof: false,
            closed: true,
        };

        match mode {
            Mode::Read => file.open_for_read()?,
            Mode::Write => file.open_for_write()?,
        }
        file.closed = false;

        tracing::info!(
            "Opened gs://{}/{} for {} (size={}, chunk_size={})",
            file.bucket,
            file.name,
            file.mode,
            file.size,
            file.chunk_size
        );
        Ok(file)
    }

    /// Learn the object size / 获取对象大小
    fn open_for_read(&mut self) -> Result<()> {
        let url = self.client.object_url(&self.bucket, &self.name);
        let request = HttpRequest::new(Method::Get, url.clone())
            .query("fields", "size")
            .query_opt("generation", self.generation);

        let response = self
            .retry
            .call(|| self.client.execute(request.clone(), &[200]))?;

        let data: serde_json::Value = response.json()?;
        let size = match &data["size"] {
            serde_json::Value::String(s) => s.parse::<u64>().ok(),
            serde_json::Value::Number(n) => n.as_u64(),
            _ => None,
        };
        self.size = size.ok_or_else(|| GcsError::BadResponse(format!("no object size in {}", data)))?;
        self.location = url;
        Ok(())
    }

    /// Start a resumable upload session / 创建可恢复上传会话
    fn open_for_write(&mut self) -> Result<()> {
        let request = HttpRequest::new(Method::Post, self.client.upload_url(&self.bucket))
            .query("uploadType", "resumable")
            .query("name", &self.name)
            .header("x-goog-resumable", "start")
            .header("Content-Type", "application/octet-stream");

        let response = self
            .retry
            .call(|| self.client.execute(request.clone(), &[200]))?;

        self.location = response
            .header("location")
            .map(str::to_string)
            .ok_or_else(|| GcsError::BadResponse("upload session has no Location header".into()))?;
        tracing::debug!("Upload session created for gs://{}/{}", self.bucket, self.name);
        Ok(())
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn generation(&self) -> Option<i64> {
        self.generation
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Object size in read mode, bytes written in write mode / 对象大小或已写入字节数
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn eof(&self) -> bool {
        self.eof
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Bytes currently buffered / 当前缓冲字节数
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Current position / 当前位置
    pub fn tell(&self) -> Result<u64> {
        self.check_open()?;
        Ok(self.cursor)
    }

    /// Close the handle, finalizing an upload / 关闭句柄（写模式下完成上传）
    /// Closing twice is a no-op. If the final chunk cannot be sent the handle
    /// stays open with its buffered bytes, so `close` may be called again.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        if self.mode == Mode::Write {
            let data = self.buffer.read(None);
            if let Err(e) = self.send_data(data.clone(), true) {
                self.buffer.unread(data);
                return Err(e);
            }
        }

        self.closed = true;
        self.buffer.clear();
        tracing::info!("Closed gs://{}/{} ({} bytes)", self.bucket, self.name, self.size);
        Ok(())
    }

    /// Run `f` and always close afterwards / 执行后总是关闭句柄
    /// The first error wins; a handle whose close failed here is abandoned.
    pub fn scoped<T, F>(mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut ObjectFile) -> Result<T>,
    {
        let result = f(&mut self);
        let closed = self.close();
        if closed.is_err() {
            self.abandon();
        }
        match (result, closed) {
            (Err(e), _) => Err(e),
            (Ok(_), Err(e)) => Err(e),
            (Ok(value), Ok(())) => Ok(value),
        }
    }

    /// Drop pending data without finalizing / 放弃未发送的数据
    fn abandon(&mut self) {
        if !self.buffer.is_empty() {
            tracing::warn!(
                "Discarding {} unsent bytes of gs://{}/{}",
                self.buffer.len(),
                self.bucket,
                self.name
            );
        }
        self.buffer.clear();
        self.closed = true;
    }

    pub(super) fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(GcsError::Closed);
        }
        Ok(())
    }

    pub(super) fn check_mode(&self, expected: Mode, action: &'static str) -> Result<()> {
        self.check_open()?;
        if self.mode != expected {
            return Err(GcsError::WrongMode { mode: self.mode, action });
        }
        Ok(())
    }
}

impl Drop for ObjectFile {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.close() {
            tracing::error!("Failed to close gs://{}/{} on drop: {}", self.bucket, self.name, e);
        }
    }
}

impl std::fmt::Debug for ObjectFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectFile")
            .field("bucket", &self.bucket)
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("size", &self.size)
            .field("cursor", &self.cursor)
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::mock_client;
    use crate::http::HttpResponse;
    use crate::retry::RetryParams;
    use crate::storage::{Whence, BLOCK_MULTIPLE};
    use serde_json::json;

    #[test]
    fn test_open_read_fetches_size() {
        let (client, mock) = mock_client();
        mock.push_json(200, json!({"size": "1234"}));

        let file = ObjectFile::open_with(
            &client,
            "bucket",
            "dir/obj",
            Mode::Read,
            OpenOptions {
                generation: Some(7),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(file.size(), 1234);
        assert_eq!(file.tell().unwrap(), 0);
        assert!(!file.eof());

        let request = mock.last().unwrap();
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.url, "https://www.googleapis.com/storage/v1/b/bucket/o/dir%2Fobj");
        assert_eq!(request.query_value("fields"), Some("size"));
        assert_eq!(request.query_value("generation"), Some("7"));
    }

    #[test]
    fn test_open_read_missing_object() {
        let (client, mock) = mock_client();
        mock.push_status(404);
        let err = ObjectFile::open(&client, "bucket", "missing", Mode::Read).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_open_read_bad_size() {
        let (client, mock) = mock_client();
        mock.push_json(200, json!({"name": "obj"}));
        let err = ObjectFile::open(&client, "bucket", "obj", Mode::Read).unwrap_err();
        assert!(matches!(err, GcsError::BadResponse(_)));
    }

    #[test]
    fn test_open_write_starts_session() {
        let (client, mock) = mock_client();
        mock.push(HttpResponse::new(200).with_header("Location", "https://upload/session"));

        let mut file = ObjectFile::open(&client, "bucket", "new obj", Mode::Write).unwrap();
        assert_eq!(file.size(), 0);
        assert_eq!(file.location, "https://upload/session");

        let request = mock.last().unwrap();
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.url, "https://www.googleapis.com/upload/storage/v1/b/bucket/o");
        assert_eq!(request.query_value("uploadType"), Some("resumable"));
        assert_eq!(request.query_value("name"), Some("new obj"));
        assert_eq!(request.header_value("x-goog-resumable"), Some("start"));

        file.abandon();
    }

    #[test]
    fn test_open_write_without_location() {
        let (client, mock) = mock_client();
        mock.push_status(200);
        let err = ObjectFile::open(&client, "bucket", "obj", Mode::Write).unwrap_err();
        assert!(matches!(err, GcsError::BadResponse(_)));
    }

    #[test]
    fn test_open_retries_transient_failures() {
        let (client, mock) = mock_client();
        let client = client.with_retry(RetryParams::new(2, 0.0, 0.0, 2.0, false));
        mock.push_status(503);
        mock.push_json(200, json!({"size": "10"}));

        let file = ObjectFile::open(&client, "bucket", "obj", Mode::Read).unwrap();
        assert_eq!(file.size(), 10);
        assert_eq!(mock.count(), 2);
    }

    #[test]
    fn test_invalid_chunk_size() {
        let (client, mock) = mock_client();
        let options = OpenOptions {
            chunk_size: Some(BLOCK_MULTIPLE + 1),
            ..Default::default()
        };
        let err = ObjectFile::open_with(&client, "bucket", "obj", Mode::Read, options).unwrap_err();
        assert!(matches!(err, GcsError::InvalidChunkSize { .. }));
        assert_eq!(mock.count(), 0);
    }

    #[test]
    fn test_closed_handle_rejects_operations() {
        let (client, mock) = mock_client();
        mock.push_json(200, json!({"size": "10"}));
        let mut file = ObjectFile::open(&client, "bucket", "obj", Mode::Read).unwrap();

        file.close().unwrap();
        assert!(file.is_closed());
        file.close().unwrap();

        assert!(matches!(file.tell(), Err(GcsError::Closed)));
        assert!(matches!(file.read(None), Err(GcsError::Closed)));
        assert!(matches!(file.seek(0, Whence::Set), Err(GcsError::Closed)));
        assert_eq!(mock.count(), 1);
    }

    #[test]
    fn test_scoped_closes_on_error() {
        let (client, mock) = mock_client();
        mock.push(HttpResponse::new(200).with_header("Location", "https://upload/session"));
        mock.push_status(200);

        let file = ObjectFile::open(&client, "bucket", "obj", Mode::Write).unwrap();
        let result: Result<()> = file.scoped(|f| {
            f.write(&b"partial"[..])?;
            Err(GcsError::Closed)
        });

        assert!(matches!(result, Err(GcsError::Closed)));
        let finalize = mock.last().unwrap();
        assert_eq!(finalize.method, Method::Put);
        assert_eq!(finalize.header_value("Content-Range"), Some("bytes 0-6/7"));
    }

    #[test]
    fn test_drop_finalizes_upload() {
        let (client, mock) = mock_client();
        mock.push(HttpResponse::new(200).with_header("Location", "https://upload/session"));
        mock.push_status(200);

        {
            let mut file = ObjectFile::open(&client, "bucket", "obj", Mode::Write).unwrap();
            file.write(&b"abc"[..]).unwrap();
        }

        assert_eq!(mock.count(), 2);
        assert_eq!(mock.last().unwrap().header_value("Content-Range"), Some("bytes 0-2/3"));
    }
}
