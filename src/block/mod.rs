//! 块设备抽象
//!
//! - block/device.rs 定义设备接口：按字节偏移随机读写
//! - block/memory.rs 提供内存设备，测试和内存文件系统使用
//! - block/file.rs 提供文件/磁盘镜像设备（需要 `std` 特性）

mod device;
mod memory;
#[cfg(all(feature = "std", unix))]
mod file;

pub use device::BlockDevice;
pub use memory::MemoryDevice;
#[cfg(all(feature = "std", unix))]
pub use file::FileDevice;
