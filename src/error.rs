//! 错误类型定义
//!
//! 提供块存储层和块缓存操作的错误类型。
//!
//! 只有“可恢复”的错误才通过 [`Error`] 返回（设备 I/O 失败、内存不足、
//! 未初始化等）。违反调用约定的情况（块大小为 0、`offset + length`
//! 超出逻辑块、设备返回的字节数与请求不一致）直接 panic。

use core::fmt;

/// 块存储操作错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    message: &'static str,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// I/O 错误
    Io,
    /// 无效参数
    InvalidInput,
    /// 无效状态（如未初始化、重复初始化）
    InvalidState,
    /// 缓存中没有可用槽位
    NoSpace,
    /// 内存分配失败
    NoMemory,
    /// 访问超出设备范围
    OutOfBounds,
    /// 设备只读
    ReadOnly,
    /// 不支持的操作
    Unsupported,
}

impl Error {
    /// 创建新错误
    pub const fn new(kind: ErrorKind, message: &'static str) -> Self {
        Self { kind, message }
    }

    /// 获取错误类型
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// 获取错误消息
    pub const fn message(&self) -> &'static str {
        self.message
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "std")]
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => {
                Error::new(ErrorKind::ReadOnly, "device opened read-only")
            }
            std::io::ErrorKind::UnexpectedEof => {
                Error::new(ErrorKind::OutOfBounds, "device access past end of file")
            }
            std::io::ErrorKind::OutOfMemory => Error::new(ErrorKind::NoMemory, "out of memory"),
            _ => Error::new(ErrorKind::Io, "device I/O error"),
        }
    }
}

/// Result 类型别名
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_error_accessors() {
        let err = Error::new(ErrorKind::NoSpace, "all slots dirty");
        assert_eq!(err.kind(), ErrorKind::NoSpace);
        assert_eq!(err.message(), "all slots dirty");
    }

    #[test]
    fn test_error_display() {
        let err = Error::new(ErrorKind::Io, "short read");
        assert_eq!(err.to_string(), "Io: short read");
    }
}
