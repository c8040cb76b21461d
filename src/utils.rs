/// Wire format helpers / 协议格式工具函数

use serde_json::Value;

/// Percent-encode a path segment with no safe characters / 对路径段进行完整URL编码
/// Bucket and object names may contain `/`, which must not split the URL path.
pub fn quote(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

/// `Range` header for a download: inclusive end / 下载用Range头（闭区间）
pub fn byte_range(begin: u64, size: u64) -> String {
    format!("bytes={}-{}", begin, begin + size - 1)
}

/// `Content-Range` header for an upload chunk / 上传分片的Content-Range头
/// `total` is `None` while the object size is still unknown (`*`).
pub fn content_range(begin: u64, len: u64, total: Option<u64>) -> String {
    let end = begin + len - 1;
    match total {
        Some(total) => format!("bytes {}-{}/{}", begin, end, total),
        None => format!("bytes {}-{}/*", begin, end),
    }
}

/// `Content-Range` header of a zero-byte finalize request / 空分片确认上传完成
pub fn finalize_range(total: u64) -> String {
    format!("bytes */{}", total)
}

/// Total size from a `Content-Range: bytes a-b/total` response header / 从Content-Range解析总大小
/// Returns `None` for `*` or anything unparseable.
pub fn parse_content_range_total(header: &str) -> Option<u64> {
    header.rsplit('/').next()?.trim().parse().ok()
}

/// Unwrap `{"key": value}` to `value`, keep everything else / 单键对象解包
pub fn unwrap_single_key(value: Value) -> Value {
    match value {
        Value::Object(map) if map.len() == 1 => match map.into_iter().next() {
            Some((_, inner)) => inner,
            None => Value::Null,
        },
        other => other,
    }
}

/// Append `key=value` to a query list when a value is present / 仅在有值时追加查询参数
pub fn push_opt<T: ToString>(query: &mut Vec<(String, String)>, key: &str, value: Option<T>) {
    if let Some(v) = value {
        query.push((key.to_string(), v.to_string()));
    }
}
