//! Ranged reads / 分段读取

use bytes::Bytes;
use std::io::{self, SeekFrom};

use crate::error::Result;
use crate::http::{HttpRequest, Method};
use crate::utils::{byte_range, parse_content_range_total};

use super::file::{expect_status, ObjectFile};
use super::{Mode, Whence};

/// Acceptable statuses for a ranged GET / 分段下载允许的状态码
const FETCH_OK: &[u16] = &[200, 206, 416];

impl ObjectFile {
    /// Read up to `size` bytes, or everything until EOF with `None` / 读取数据
    /// Fetches whole chunks until enough bytes are buffered.
    pub fn read(&mut self, size: Option<usize>) -> Result<Bytes> {
        self.check_mode(Mode::Read, "read")?;

        if size == Some(0) || (self.eof && self.buffer.is_empty()) {
            return Ok(Bytes::new());
        }

        while !self.eof && size.map_or(true, |n| self.buffer.len() < n) {
            self.fetch_chunk()?;
        }

        let data = self.buffer.read(size);
        self.cursor += data.len() as u64;
        Ok(data)
    }

    /// Buffered bytes, or exactly one freshly fetched chunk / 读取一个分片
    /// Returns empty once EOF is reached and the buffer is drained.
    pub fn read_chunk(&mut self) -> Result<Bytes> {
        self.check_mode(Mode::Read, "read")?;

        if self.buffer.is_empty() && !self.eof {
            self.fetch_chunk()?;
        }

        let data = self.buffer.read(None);
        self.cursor += data.len() as u64;
        Ok(data)
    }

    /// Move the cursor; returns the new absolute position / 移动读取位置
    /// The target is clamped to `[0, size]` and the read-ahead buffer is dropped.
    pub fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        self.check_mode(Mode::Read, "seek")?;

        let base = match whence {
            Whence::Set => 0,
            Whence::Cur => self.cursor as i64,
            Whence::End => self.size as i64,
        };
        let position = base.saturating_add(offset).clamp(0, self.size as i64) as u64;

        self.cursor = position;
        self.remote_cursor = position;
        self.eof = false;
        self.buffer.clear();
        tracing::trace!("Seek gs://{}/{} to {}", self.bucket, self.name, position);
        Ok(position)
    }

    /// Fetch one chunk at `remote_cursor` into the buffer / 获取一个分片
    fn fetch_chunk(&mut self) -> Result<()> {
        let requested = self.chunk_size as u64;
        let request = HttpRequest::new(Method::Get, self.location.clone())
            .query("alt", "media")
            .query_opt("generation", self.generation)
            .header("Range", byte_range(self.remote_cursor, requested));

        let response = self.retry.call(|| {
            let response = self.client.send(request.clone())?;
            expect_status(response, FETCH_OK, "downloading a chunk")
        })?;

        if response.status == 416 {
            self.eof = true;
            tracing::debug!("Range at {} not satisfiable, end of gs://{}/{}", self.remote_cursor, self.bucket, self.name);
            return Ok(());
        }

        let received = response.body.len() as u64;
        self.remote_cursor += received;

        match response.header("content-range").and_then(parse_content_range_total) {
            Some(total) => {
                self.size = total;
                self.eof = total <= self.remote_cursor;
            }
            None => self.eof = received < requested,
        }

        tracing::debug!(
            "Fetched {} bytes of gs://{}/{} (next offset {}, eof={})",
            received,
            self.bucket,
            self.name,
            self.remote_cursor,
            self.eof
        );
        self.buffer.write(response.body);
        Ok(())
    }
}

impl io::Read for ObjectFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let data = ObjectFile::read(self, Some(buf.len()))?;
        buf[..data.len()].copy_from_slice(&data);
        Ok(data.len())
    }
}

impl io::Seek for ObjectFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (offset, whence) = match pos {
            SeekFrom::Start(n) => (i64::try_from(n).unwrap_or(i64::MAX), Whence::Set),
            SeekFrom::Current(n) => (n, Whence::Cur),
            SeekFrom::End(n) => (n, Whence::End),
        };
        Ok(ObjectFile::seek(self, offset, whence)?)
    }
}
