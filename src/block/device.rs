//! 块设备接口
//!
//! 块存储层只使用设备的“按字节偏移随机读写”能力，块号到字节偏移的换算由
//! [`BlockStore`](crate::store::BlockStore) 完成。

use crate::error::Result;

/// 块设备接口
///
/// 实现此 trait 以提供底层设备访问。设备必须支持在任意字节偏移处读写，
/// 并且可以被多个线程同时调用（`&self` 方法 + `Send + Sync`）。
///
/// # 示例
///
/// ```rust,ignore
/// use bcache_core::{BlockDevice, Result};
///
/// struct MyDevice {
///     // ...
/// }
///
/// impl BlockDevice for MyDevice {
///     fn block_size(&self) -> u32 {
///         512
///     }
///
///     fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
///         // 从 offset 读取 buf.len() 字节
///         Ok(buf.len())
///     }
///
///     fn write_at(&self, offset: u64, buf: &[u8]) -> Result<usize> {
///         // 向 offset 写入 buf.len() 字节
///         Ok(buf.len())
///     }
/// }
/// ```
pub trait BlockDevice: Send + Sync {
    /// 物理块大小（通常 512）
    fn block_size(&self) -> u32;

    /// 从字节偏移 `offset` 读取 `buf.len()` 字节
    ///
    /// # 返回
    ///
    /// 成功返回实际读取的字节数
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// 向字节偏移 `offset` 写入 `buf`
    ///
    /// # 返回
    ///
    /// 成功返回实际写入的字节数
    fn write_at(&self, offset: u64, buf: &[u8]) -> Result<usize>;

    /// 将设备自身的缓冲写入稳定存储（如 fsync）
    fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// 是否只读，只读设备上的逻辑块写入和原始写入直接返回 `ReadOnly`
    fn is_read_only(&self) -> bool {
        false
    }

    /// 关闭设备
    ///
    /// 在停止使用设备后调用，用于清理设备资源。
    /// 默认实现什么都不做，设备可以根据需要覆盖此方法。
    fn close(&self) -> Result<()> {
        Ok(())
    }
}
