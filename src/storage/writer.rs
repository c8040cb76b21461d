//! Resumable upload / 可恢复上传

use bytes::Bytes;
use std::io;

use crate::error::Result;
use crate::http::{HttpRequest, Method};
use crate::utils::{content_range, finalize_range};

use super::file::{expect_status, ObjectFile};
use super::Mode;

/// 308 Resume Incomplete / 继续上传
const CHUNK_OK: &[u16] = &[308];
const FINAL_OK: &[u16] = &[200, 201];

impl ObjectFile {
    /// Buffer `data`, sending every full chunk / 写入数据，满一个分片即上传
    /// A trailing partial chunk stays buffered until more data or `close`.
    ///
    /// When a send fails, only the part of `data` already uploaded counts as
    /// written (see [`ObjectFile::tell`]); the rest is dropped so the caller
    /// can write it again.
    pub fn write(&mut self, data: impl Into<Bytes>) -> Result<()> {
        self.check_mode(Mode::Write, "write")?;

        let data = data.into();
        let len = data.len() as u64;
        let held = self.buffer.len() as u64;
        let sent_before = self.remote_cursor;
        self.size += len;
        self.cursor += len;
        self.buffer.write(data);

        while self.buffer.len() >= self.chunk_size {
            let chunk = self.buffer.read(Some(self.chunk_size));
            if let Err(e) = self.send_data(chunk.clone(), false) {
                self.buffer.unread(chunk);
                let sent = self.remote_cursor - sent_before;
                let rejected = len - sent.saturating_sub(held);
                self.buffer.truncate(held.saturating_sub(sent) as usize);
                self.size -= rejected;
                self.cursor -= rejected;
                return Err(e);
            }
        }
        Ok(())
    }

    /// PUT one chunk to the upload session / 上传一个分片
    /// An empty final chunk only confirms the total size.
    pub(super) fn send_data(&mut self, data: Bytes, finalize: bool) -> Result<()> {
        if data.is_empty() && !finalize {
            return Ok(());
        }

        let len = data.len() as u64;
        let (range, expected) = if data.is_empty() {
            (finalize_range(self.size), FINAL_OK)
        } else if finalize {
            (content_range(self.remote_cursor, len, Some(self.size)), FINAL_OK)
        } else {
            (content_range(self.remote_cursor, len, None), CHUNK_OK)
        };

        tracing::debug!(
            "Uploading gs://{}/{}: Content-Range {} (final={})",
            self.bucket,
            self.name,
            range,
            finalize
        );

        let request = HttpRequest::new(Method::Put, self.location.clone())
            .header("Content-Range", range)
            .body(data);

        self.retry.call(|| {
            let response = self.client.send(request.clone())?;
            expect_status(response, expected, "uploading a chunk")
        })?;

        self.remote_cursor += len;
        Ok(())
    }
}

impl io::Write for ObjectFile {
    /// Reports a short write when some chunks went out before a failure.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let before = self.cursor;
        match ObjectFile::write(self, Bytes::copy_from_slice(buf)) {
            Ok(()) => Ok(buf.len()),
            Err(e) if self.cursor > before => {
                tracing::warn!("Short write to gs://{}/{}: {}", self.bucket, self.name, e);
                Ok((self.cursor - before) as usize)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Partial chunks can only go out as the final chunk, so nothing to do.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::mock_client;
    use crate::error::GcsError;
    use crate::http::mock::MockTransport;
    use crate::http::HttpResponse;
    use crate::retry::RetryParams;
    use crate::storage::file::OpenOptions;
    use crate::storage::{Whence, BLOCK_MULTIPLE};
    use std::io::Write as _;
    use std::sync::Arc;

    const SESSION: &str = "https://upload.example/session/1";

    fn open_writer(chunk_size: usize) -> (ObjectFile, Arc<MockTransport>) {
        let (client, mock) = mock_client();
        mock.push(HttpResponse::new(200).with_header("Location", SESSION));
        let options = OpenOptions {
            chunk_size: Some(chunk_size),
            ..Default::default()
        };
        let file = ObjectFile::open_with(&client, "bucket", "obj", Mode::Write, options).unwrap();
        (file, mock)
    }

    fn ranges(mock: &MockTransport) -> Vec<String> {
        mock.requests()
            .iter()
            .filter(|r| r.method == Method::Put)
            .map(|r| r.header_value("Content-Range").unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn test_write_then_close_scenario() {
        let chunk_size = 2 * BLOCK_MULTIPLE;
        let (mut file, mock) = open_writer(chunk_size);

        file.write(vec![b'a'; chunk_size - 1]).unwrap();
        assert_eq!(mock.count(), 1);
        assert_eq!(file.buffered(), chunk_size - 1);

        mock.push_status(308);
        file.write(vec![b'b'; 2]).unwrap();
        assert_eq!(mock.count(), 2);
        assert_eq!(file.buffered(), 1);

        let sent = mock.last().unwrap();
        assert_eq!(sent.url, SESSION);
        let body = sent.body.unwrap();
        assert_eq!(body.len(), chunk_size);
        assert_eq!(body[chunk_size - 1], b'b');

        mock.push_status(200);
        file.close().unwrap();
        assert!(file.is_closed());

        assert_eq!(&mock.last().unwrap().body.unwrap()[..], b"b");
        assert_eq!(
            ranges(&mock),
            vec![
                format!("bytes 0-{}/*", chunk_size - 1),
                format!("bytes {}-{}/{}", chunk_size, chunk_size, chunk_size + 1),
            ]
        );
    }

    #[test]
    fn test_partial_chunk_carries_over() {
        let (mut file, mock) = open_writer(BLOCK_MULTIPLE);

        file.write(vec![b'*'; BLOCK_MULTIPLE - 1]).unwrap();
        assert_eq!(mock.count(), 1);

        mock.push_status(308);
        file.write(vec![b'-'; BLOCK_MULTIPLE]).unwrap();
        let first = mock.last().unwrap().body.unwrap();
        assert_eq!(first.len(), BLOCK_MULTIPLE);
        assert_eq!(first[BLOCK_MULTIPLE - 1], b'-');

        mock.push_status(200);
        file.close().unwrap();
        let last = mock.last().unwrap();
        assert_eq!(last.body.as_ref().unwrap().len(), BLOCK_MULTIPLE - 1);
        assert_eq!(
            last.header_value("Content-Range").unwrap(),
            format!("bytes {}-{}/{}", BLOCK_MULTIPLE, 2 * BLOCK_MULTIPLE - 2, 2 * BLOCK_MULTIPLE - 1)
        );
    }

    #[test]
    fn test_exact_boundary_sends_empty_finalize() {
        let (mut file, mock) = open_writer(BLOCK_MULTIPLE);
        mock.push_status(308);
        file.write(vec![7u8; BLOCK_MULTIPLE]).unwrap();
        assert_eq!(file.buffered(), 0);

        mock.push_status(200);
        file.close().unwrap();

        assert_eq!(
            ranges(&mock),
            vec![format!("bytes 0-{}/*", BLOCK_MULTIPLE - 1), format!("bytes */{}", BLOCK_MULTIPLE)]
        );
        assert!(mock.last().unwrap().body.unwrap().is_empty());
    }

    #[test]
    fn test_empty_object_finalize() {
        let (mut file, mock) = open_writer(BLOCK_MULTIPLE);
        mock.push_status(200);
        file.close().unwrap();
        assert_eq!(ranges(&mock), vec!["bytes */0".to_string()]);
    }

    #[test]
    fn test_large_write_sends_several_chunks() {
        let (mut file, mock) = open_writer(BLOCK_MULTIPLE);
        for _ in 0..3 {
            mock.push_status(308);
        }
        file.write(vec![1u8; 3 * BLOCK_MULTIPLE + 10]).unwrap();
        assert_eq!(file.buffered(), 10);
        assert_eq!(file.tell().unwrap(), 3 * BLOCK_MULTIPLE as u64 + 10);

        mock.push_status(200);
        file.close().unwrap();
        assert_eq!(
            ranges(&mock),
            vec![
                "bytes 0-262143/*".to_string(),
                "bytes 262144-524287/*".to_string(),
                "bytes 524288-786431/*".to_string(),
                "bytes 786432-786441/786442".to_string(),
            ]
        );
    }

    #[test]
    fn test_second_close_is_noop() {
        let (mut file, mock) = open_writer(BLOCK_MULTIPLE);
        mock.push_status(200);
        file.close().unwrap();
        file.close().unwrap();
        assert_eq!(mock.count(), 2);
        assert!(matches!(file.write(&b"late"[..]), Err(GcsError::Closed)));
    }

    #[test]
    fn test_unexpected_success_is_protocol_error() {
        let (mut file, mock) = open_writer(BLOCK_MULTIPLE);
        mock.push_status(200);
        let err = file.write(vec![0u8; BLOCK_MULTIPLE]).unwrap_err();
        assert!(matches!(err, GcsError::Protocol { status: 200, .. }));
        file.closed = true;
    }

    #[test]
    fn test_failed_close_keeps_data() {
        let (mut file, mock) = open_writer(BLOCK_MULTIPLE);
        file.write(&b"hello"[..]).unwrap();

        mock.push_status(403);
        assert_eq!(file.close().unwrap_err().http_code(), Some(403));
        assert!(!file.is_closed());
        assert_eq!(file.buffered(), 5);

        mock.push_status(200);
        file.close().unwrap();
        assert!(file.is_closed());
        assert_eq!(ranges(&mock), vec!["bytes 0-4/5".to_string(), "bytes 0-4/5".to_string()]);
    }

    #[test]
    fn test_failed_write_can_be_retried() {
        let (mut file, mock) = open_writer(BLOCK_MULTIPLE);
        let data = vec![b'x'; BLOCK_MULTIPLE];

        mock.push_status(403);
        assert_eq!(file.write(data.clone()).unwrap_err().http_code(), Some(403));
        assert_eq!(file.tell().unwrap(), 0);
        assert_eq!(file.size(), 0);
        assert_eq!(file.buffered(), 0);

        mock.push_status(308);
        file.write(data).unwrap();
        mock.push_status(200);
        file.close().unwrap();

        assert_eq!(file.size(), BLOCK_MULTIPLE as u64);
        assert_eq!(
            ranges(&mock),
            vec![
                format!("bytes 0-{}/*", BLOCK_MULTIPLE - 1),
                format!("bytes 0-{}/*", BLOCK_MULTIPLE - 1),
                format!("bytes */{}", BLOCK_MULTIPLE),
            ]
        );
    }

    #[test]
    fn test_failed_write_keeps_earlier_bytes() {
        let (mut file, mock) = open_writer(BLOCK_MULTIPLE);
        file.write(&b"hello"[..]).unwrap();

        mock.push_status(403);
        assert!(file.write(vec![0u8; BLOCK_MULTIPLE]).is_err());
        assert_eq!(file.tell().unwrap(), 5);
        assert_eq!(file.buffered(), 5);

        mock.push_status(200);
        file.close().unwrap();
        assert_eq!(ranges(&mock).last().unwrap(), "bytes 0-4/5");
        assert_eq!(&mock.last().unwrap().body.unwrap()[..], b"hello");
    }

    #[test]
    fn test_io_write_reports_short_write() {
        let (mut file, mock) = open_writer(BLOCK_MULTIPLE);
        file.write(&b"hello"[..]).unwrap();

        mock.push_status(308);
        mock.push_status(403);
        let accepted = io::Write::write(&mut file, &vec![1u8; 2 * BLOCK_MULTIPLE]).unwrap();
        assert_eq!(accepted, BLOCK_MULTIPLE - 5);
        assert_eq!(file.tell().unwrap(), BLOCK_MULTIPLE as u64);
        assert_eq!(file.buffered(), 0);

        mock.push_status(403);
        let err = io::Write::write(&mut file, &vec![2u8; BLOCK_MULTIPLE]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert_eq!(file.tell().unwrap(), BLOCK_MULTIPLE as u64);

        mock.push_status(200);
        file.close().unwrap();
        assert_eq!(ranges(&mock).last().unwrap(), &format!("bytes */{}", BLOCK_MULTIPLE));
    }

    #[test]
    fn test_chunk_send_retried() {
        let (client, mock) = mock_client();
        let client = client.with_retry(RetryParams::new(2, 0.0, 0.0, 2.0, false));
        mock.push(HttpResponse::new(200).with_header("Location", SESSION));
        let options = OpenOptions {
            chunk_size: Some(BLOCK_MULTIPLE),
            ..Default::default()
        };
        let mut file = ObjectFile::open_with(&client, "bucket", "obj", Mode::Write, options).unwrap();

        mock.push_status(503);
        mock.push_status(308);
        file.write(vec![0u8; BLOCK_MULTIPLE]).unwrap();

        mock.push_status(200);
        file.close().unwrap();
        assert_eq!(mock.count(), 4);
    }

    #[test]
    fn test_write_mode_rejects_read_and_seek() {
        let (mut file, mock) = open_writer(BLOCK_MULTIPLE);
        assert!(matches!(file.read(None), Err(GcsError::WrongMode { mode: Mode::Write, .. })));
        assert!(matches!(file.read_chunk(), Err(GcsError::WrongMode { .. })));
        let err = file.seek(0, Whence::Set).unwrap_err();
        assert_eq!(err.to_string(), "file open for writing, cannot seek");

        mock.push_status(200);
        file.close().unwrap();
    }

    #[test]
    fn test_io_write_trait() {
        let (mut file, mock) = open_writer(BLOCK_MULTIPLE);
        file.write_all(b"streamed").unwrap();
        file.flush().unwrap();
        assert_eq!(mock.count(), 1);

        mock.push_status(200);
        file.close().unwrap();
        assert_eq!(ranges(&mock), vec!["bytes 0-7/8".to_string()]);
    }
}
