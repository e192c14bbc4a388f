//! bcache_core: 块级写回缓存与块存储层
//!
//! 为文件系统格式层提供按逻辑块读写底层设备的能力：
//! - **固定容量**的写回缓存，只驱逐干净块
//! - **脏块**在显式刷新或缓存全脏时写回设备
//! - 可绕过缓存的逻辑块 I/O 与按物理块的原始 I/O
//!
//! # 示例
//!
//! ```rust,ignore
//! use bcache_core::{BlockStore, MemoryDevice, StoreConfig, Result};
//!
//! fn main() -> Result<()> {
//!     let device = MemoryDevice::new(1 << 20);
//!     let config = StoreConfig::default().with_logical_block_size(4096);
//!     let store = BlockStore::with_config(device, config)?;
//!     store.initialize()?;
//!
//!     // 写入块（只进入缓存）
//!     store.write_block(3, &[0xAB; 16], 16, 100, true)?;
//!
//!     // 读取块
//!     let mut buf = vec![0u8; 4096];
//!     store.read_block(3, Some(&mut buf), 4096, 0, true)?;
//!
//!     // 写回设备
//!     store.flush_writes()?;
//!     Ok(())
//! }
//! ```
//!
//! # 模块结构
//!
//! - [`error`] - 错误类型定义
//! - [`consts`] - 常量定义
//! - [`block`] - 块设备抽象与内置设备
//! - [`cache`] - 块缓存
//! - [`store`] - 块存储（缓存 + 设备 I/O）

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

#[cfg(any(test, feature = "std"))]
extern crate std;

// ===== 核心模块 =====

/// 错误处理
pub mod error;

/// 常量定义
pub mod consts;

/// 块设备抽象
pub mod block;

/// 块缓存
pub mod cache;

/// 块存储
pub mod store;

// ===== 重新导出 =====

pub use error::{Error, ErrorKind, Result};

pub use block::{BlockDevice, MemoryDevice};

#[cfg(all(feature = "std", unix))]
pub use block::FileDevice;

pub use cache::{BlockCache, BlockIndex, CacheSlot, CacheStats, SlotFlags, SlotId};

pub use store::{BlockStore, FlushHook, NoHook, StoreConfig, StoreStats};

pub use consts::DEFAULT_CACHE_ENTRIES;
