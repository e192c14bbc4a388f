//! 块缓存模块
//!
//! 固定容量、写回式（write-back）的逻辑块缓存。
//!
//! # 主要组件
//!
//! - [`CacheSlot`] - 单个缓存槽位的元数据（承载的块号、状态标志）
//! - [`BlockCache`] - 块缓存管理器：哈希索引 + 干净 LRU 链表 + 脏链表
//! - [`SlotFlags`] - 槽位状态标志
//! - [`CacheStats`] - 缓存统计信息
//!
//! # 设计原理
//!
//! 所有槽位的数据位于一块 `capacity * block_size` 的连续分配中，槽位之间
//! 的链表关系用下标（[`SlotId`]）表示，不存在自引用指针：
//!
//! 1. **驱逐**：只从干净链表的 LRU 端选择牺牲者
//! 2. **脏块**：移入脏链表，直到被刷回之前不会被重新分配
//! 3. **满载**：所有槽位都脏时，先刷回全部脏块再分配
//!
//! # 使用示例
//!
//! ```rust,ignore
//! use bcache_core::cache::BlockCache;
//!
//! let mut cache = BlockCache::new(10000, 1024)?;
//!
//! // 获取槽位（可能驱逐干净块，或在全脏时刷回）
//! let slot = cache.ensure(100, |block, data| write_to_device(block, data))?;
//! if !cache.has_data(slot) {
//!     read_from_device(100, cache.data_mut(slot))?;
//!     cache.set_has_data(slot);
//! }
//!
//! // 修改数据
//! cache.data_mut(slot)[0] = 42;
//! cache.mark_dirty(slot);
//!
//! // 刷新所有脏块
//! cache.flush_all(|block, data| write_to_device(block, data));
//! ```
//!
//! # 性能特性
//!
//! - **查找**: O(1) - `hashbrown::HashMap`
//! - **LRU 更新/驱逐**: O(1) - 下标链表摘除与插入
//! - **刷新**: O(k) - k 为脏块数量

mod block_cache;
mod list;
mod slot;

/// 逻辑块号
pub type BlockIndex = u64;

pub use block_cache::{BlockCache, CacheStats};
pub use slot::{CacheSlot, SlotFlags, SlotId};
