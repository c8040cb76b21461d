//! Byte accumulator / 字节累积缓冲区
//!
//! Decouples the caller's read/write granularity from the fixed chunk size
//! used on the wire. Spans are immutable `Bytes` views: consuming part of a
//! span splits it without copying the remainder.

use bytes::{Bytes, BytesMut};
use std::collections::VecDeque;

/// Ordered queue of byte spans / 有序字节片段队列
#[derive(Debug, Default)]
pub struct ByteBuffer {
    spans: VecDeque<Bytes>,
    /// Sum of all span lengths / 所有片段长度之和
    len: usize,
}

impl ByteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append a span; empty input is ignored / 追加数据
    pub fn write(&mut self, data: impl Into<Bytes>) {
        let data = data.into();
        if data.is_empty() {
            return;
        }
        self.len += data.len();
        self.spans.push_back(data);
    }

    /// Remove up to `size` bytes from the front / 从头部取出最多 size 字节
    /// `None` (or a size larger than the buffer) drains everything.
    pub fn read(&mut self, size: Option<usize>) -> Bytes {
        let size = match size {
            Some(n) if n < self.len => n,
            _ => self.len,
        };
        if size == 0 {
            return Bytes::new();
        }

        // A single leading span can be handed out without copying.
        let front_len = self.spans.front().map_or(0, Bytes::len);
        if front_len >= size {
            let out = if front_len == size {
                self.spans.pop_front().unwrap_or_default()
            } else {
                self.spans[0].split_to(size)
            };
            self.len -= size;
            return out;
        }

        let mut out = BytesMut::with_capacity(size);
        let mut remaining = size;
        while remaining > 0 {
            let Some(mut span) = self.spans.pop_front() else {
                break;
            };
            if span.len() > remaining {
                let head = span.split_to(remaining);
                self.spans.push_front(span);
                span = head;
            }
            remaining -= span.len();
            out.extend_from_slice(&span);
        }

        self.len -= size - remaining;
        out.freeze()
    }

    /// Put bytes back at the front, e.g. after a failed send / 将数据放回头部
    pub fn unread(&mut self, data: Bytes) {
        if data.is_empty() {
            return;
        }
        self.len += data.len();
        self.spans.push_front(data);
    }

    /// Keep only the first `len` bytes / 仅保留前 len 字节
    pub fn truncate(&mut self, len: usize) {
        while self.len > len {
            let Some(mut span) = self.spans.pop_back() else {
                break;
            };
            let excess = self.len - len;
            if span.len() > excess {
                span.truncate(span.len() - excess);
                self.len -= excess;
                self.spans.push_back(span);
            } else {
                self.len -= span.len();
            }
        }
    }

    pub fn clear(&mut self) {
        self.spans.clear();
        self.len = 0;
    }
}
