//! Chunked object transfer / 分片对象传输
//!
//! [`ObjectFile`] is a file-like handle over a remote object: ranged reads in
//! read mode, a resumable upload session in write mode. Network I/O always
//! happens in `chunk_size` units, strictly in increasing offset order.

use std::fmt;

use crate::error::{GcsError, Result};

pub mod buffer;
pub mod file;
mod reader;
mod writer;

pub use buffer::ByteBuffer;
pub use file::{ObjectFile, OpenOptions};

/// Chunk sizes must be a multiple of this / 分片大小必须是该值的整数倍
pub const BLOCK_MULTIPLE: usize = 256 * 1024;

/// Default chunk size (1 MiB) / 默认分片大小
pub const DEFAULT_CHUNK_SIZE: usize = 4 * BLOCK_MULTIPLE;

/// Open mode / 打开模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Read,
    Write,
}

impl Mode {
    /// Parse `"r"` / `"w"` / 解析模式字符串
    pub fn parse(mode: &str) -> Result<Self> {
        match mode {
            "r" => Ok(Mode::Read),
            "w" => Ok(Mode::Write),
            other => Err(GcsError::InvalidMode(other.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Read => f.write_str("reading"),
            Mode::Write => f.write_str("writing"),
        }
    }
}

/// Reference point of a seek / 定位基准
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    /// Absolute position / 绝对位置
    Set,
    /// Relative to the cursor / 相对当前位置
    Cur,
    /// Relative to the object size / 相对文件末尾
    End,
}

/// Reject chunk sizes that are zero or not block aligned / 校验分片大小
pub fn validate_chunk_size(size: usize) -> Result<usize> {
    if size == 0 || size % BLOCK_MULTIPLE != 0 {
        return Err(GcsError::InvalidChunkSize {
            size,
            multiple: BLOCK_MULTIPLE,
        });
    }
    Ok(size)
}
