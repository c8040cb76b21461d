//! GCS constants / GCS常量

/// Predefined ACLs / 预定义访问控制
pub mod acl {
    /// Owner gets OWNER, authenticated users get READER.
    pub const AUTH_READ: &str = "authenticatedRead";
    pub const OWNER_FULL: &str = "bucketOwnerFullControl";
    pub const OWNER_READ: &str = "bucketOwnerRead";
    pub const PRIVATE: &str = "private";
    pub const PROJECT_PRIVATE: &str = "projectPrivate";
    pub const PUBLIC_READ: &str = "publicRead";
    pub const PUBLIC_READ_WRITE: &str = "publicReadWrite";
}

/// Response projections / 返回字段投影
pub mod projection {
    /// Include all properties / 包含全部属性
    pub const FULL: &str = "full";
    /// Omit the `acl` property / 省略acl属性
    pub const NO_ACL: &str = "noAcl";
}

/// Storage classes / 存储类别
pub mod storage_class {
    pub const STANDARD: &str = "STANDARD";
    pub const NEARLINE: &str = "NEARLINE";
    pub const DURABLE_REDUCED_AVAILABILITY: &str = "DURABLE_REDUCED_AVAILABILITY";
}
