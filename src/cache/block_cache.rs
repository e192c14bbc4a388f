//! 块缓存实现
//!
//! 固定容量的槽位数组 + 块号哈希索引 + 两条基于下标的链表：
//!
//! ```text
//! struct BlockCache {
//!     slots: Vec<CacheSlot>,            // 槽位元数据
//!     links: Vec<Links>,                // 链表指针（干净/脏链表共用）
//!     data: Vec<u8>,                    // capacity * block_size 的连续缓冲区
//!     index: HashMap<u64, SlotId>,      // 块号 -> 槽位
//!     clean: SlotList,                  // MRU -> LRU
//!     dirty: SlotList,                  // 只追踪成员，不参与驱逐
//! }
//! ```
//!
//! 不变量：
//! - `index.len() <= capacity`
//! - `index` 中每个键指向的槽位的 `block` 等于该键
//! - 每个槽位恰好位于 `clean`/`dirty` 中的一条链表
//! - 槽位在 `dirty` 中当且仅当它在上次刷回之后被写过
//! - 脏槽位永远不会被重新分配

use super::list::{Links, SlotList};
use super::slot::{CacheSlot, SlotFlags, SlotId};
use super::BlockIndex;
use crate::error::{Error, ErrorKind, Result};
use alloc::vec::Vec;
use core::ops::Range;
use hashbrown::HashMap;

/// 缓存统计信息
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// 总访问次数
    pub total_accesses: u64,
    /// 缓存命中次数
    pub hits: u64,
    /// 缓存未命中次数
    pub misses: u64,
    /// 驱逐次数（槽位从一个块重新分配给另一个块）
    pub evictions: u64,
    /// 脏块写回次数
    pub writebacks: u64,
    /// 写回失败次数
    pub failed_writebacks: u64,
    /// 因所有槽位都脏而触发的强制刷新次数
    pub forced_flushes: u64,
    /// 当前脏块数量
    pub dirty_blocks: usize,
}

impl CacheStats {
    /// 计算命中率
    pub fn hit_rate(&self) -> f64 {
        if self.total_accesses == 0 {
            0.0
        } else {
            self.hits as f64 / self.total_accesses as f64
        }
    }
}

/// 块缓存
///
/// 本身不带锁，由 [`BlockStore`](crate::store::BlockStore) 用单个互斥锁保护。
/// 除 [`ensure`](Self::ensure) 外所有操作都不会失败。
pub struct BlockCache {
    slots: Vec<CacheSlot>,
    links: Vec<Links>,
    data: Vec<u8>,
    block_size: usize,
    index: HashMap<BlockIndex, SlotId>,
    clean: SlotList,
    dirty: SlotList,
    stats: CacheStats,
}

fn out_of_memory(_: impl core::fmt::Debug) -> Error {
    Error::new(ErrorKind::NoMemory, "failed to allocate block cache memory")
}

impl BlockCache {
    /// 创建新的块缓存
    ///
    /// 一次性分配 `capacity * block_size` 字节的数据缓冲区，所有槽位初始为空，
    /// 按下标顺序排在干净链表中（槽位 0 最先被使用）。
    ///
    /// # 参数
    ///
    /// * `capacity` - 缓存容量（槽位数量）
    /// * `block_size` - 逻辑块大小（字节）
    ///
    /// # 示例
    ///
    /// ```rust,ignore
    /// let cache = BlockCache::new(10000, 1024)?;  // 10000 个 1KB 块
    /// ```
    pub fn new(capacity: usize, block_size: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "cache capacity must be non-zero"));
        }
        if block_size == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "block size must be non-zero"));
        }
        let total = capacity
            .checked_mul(block_size)
            .ok_or(Error::new(ErrorKind::NoMemory, "block cache size overflows usize"))?;

        let mut data = Vec::new();
        data.try_reserve_exact(total).map_err(out_of_memory)?;
        data.resize(total, 0);

        let mut slots = Vec::new();
        slots.try_reserve_exact(capacity).map_err(out_of_memory)?;
        slots.resize(capacity, CacheSlot::empty());

        let mut links = Vec::new();
        links.try_reserve_exact(capacity).map_err(out_of_memory)?;
        links.resize(capacity, Links::default());

        let mut index = HashMap::new();
        index.try_reserve(capacity).map_err(out_of_memory)?;

        let mut clean = SlotList::new();
        for id in 0..capacity {
            clean.push_front(&mut links, id);
        }

        log::debug!(
            "[CACHE] created capacity={} block_size={} ({} bytes)",
            capacity,
            block_size,
            total
        );

        Ok(Self {
            slots,
            links,
            data,
            block_size,
            index,
            clean,
            dirty: SlotList::new(),
            stats: CacheStats::default(),
        })
    }

    /// 查找块
    ///
    /// 命中且槽位干净时，将其移到干净链表的 MRU 端；脏槽位不参与 LRU 排序。
    /// 未命中时没有副作用。
    pub fn get(&mut self, block: BlockIndex) -> Option<SlotId> {
        self.stats.total_accesses += 1;
        match self.index.get(&block).copied() {
            Some(id) => {
                self.stats.hits += 1;
                if !self.slots[id].is_dirty() {
                    self.clean.move_to_front(&mut self.links, id);
                }
                log::trace!(
                    "[CACHE] get block={} HIT slot={} (dirty={})",
                    block,
                    id,
                    self.slots[id].is_dirty()
                );
                Some(id)
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// 查找块，不更新 LRU 顺序和统计信息
    pub fn peek(&self, block: BlockIndex) -> Option<SlotId> {
        self.index.get(&block).copied()
    }

    /// 获取块对应的槽位，不存在时分配
    ///
    /// # 分配策略
    ///
    /// 1. 命中则直接返回
    /// 2. 取干净链表 LRU 端的槽位作为牺牲者：从索引中移除旧块号，移到 MRU 端，
    ///    登记新块号，并清除 `HAS_DATA`（旧数据作废，首次读取时重新填充）
    /// 3. 若干净链表为空（所有槽位都脏），通过 `write_back` 刷回全部脏块，
    ///    然后重试一次
    ///
    /// **绝不重新分配脏槽位。**
    ///
    /// # 参数
    ///
    /// * `block` - 逻辑块号
    /// * `write_back` - 强制刷新时用于写回单个脏块的回调，写回失败只记录日志
    ///
    /// # 错误
    ///
    /// 索引扩容失败返回 `NoMemory`；强制刷新后仍没有干净槽位返回 `NoSpace`
    pub fn ensure<F>(&mut self, block: BlockIndex, mut write_back: F) -> Result<SlotId>
    where
        F: FnMut(BlockIndex, &[u8]) -> Result<()>,
    {
        if let Some(id) = self.get(block) {
            return Ok(id);
        }
        self.index.try_reserve(1).map_err(out_of_memory)?;

        for forced in [false, true] {
            if let Some(victim) = self.clean.back() {
                if let Some(old) = self.slots[victim].block.take() {
                    self.index.remove(&old);
                    self.stats.evictions += 1;
                    log::debug!("[CACHE] evict block={} from slot={} for block={}", old, victim, block);
                }
                self.clean.move_to_front(&mut self.links, victim);
                self.index.insert(block, victim);

                let slot = &mut self.slots[victim];
                slot.block = Some(block);
                slot.flags.remove(SlotFlags::HAS_DATA);
                log::debug!(
                    "[CACHE] ensure block={} MISS -> slot={}, cache={}/{}",
                    block,
                    victim,
                    self.index.len(),
                    self.slots.len()
                );
                return Ok(victim);
            }

            if forced {
                break;
            }
            log::warn!(
                "[CACHE] all {} slots are dirty, flushing before reuse",
                self.dirty.len()
            );
            self.stats.forced_flushes += 1;
            self.flush_all(&mut write_back);
        }

        log::error!("[CACHE] no clean slot for block={} after forced flush", block);
        Err(Error::new(
            ErrorKind::NoSpace,
            "no clean cache slot available after flushing dirty blocks",
        ))
    }

    /// 标记槽位为脏，移入脏链表
    pub fn mark_dirty(&mut self, id: SlotId) {
        debug_assert!(self.slots[id].block.is_some(), "marking an unassigned slot dirty");
        if self.slots[id].is_dirty() {
            return;
        }
        self.clean.unlink(&mut self.links, id);
        self.dirty.push_front(&mut self.links, id);
        self.slots[id].flags.insert(SlotFlags::DIRTY);
    }

    /// 标记槽位为干净，放到干净链表的 MRU 端
    pub fn mark_clean(&mut self, id: SlotId) {
        if !self.slots[id].is_dirty() {
            self.clean.move_to_front(&mut self.links, id);
            return;
        }
        self.dirty.unlink(&mut self.links, id);
        self.clean.push_front(&mut self.links, id);
        self.slots[id].flags.remove(SlotFlags::DIRTY);
    }

    /// 将所有脏槽位标记为干净
    ///
    /// 从最早变脏的槽位开始处理，最近写入的块最终位于 MRU 端。
    pub fn mark_all_clean(&mut self) {
        while let Some(id) = self.dirty.back() {
            self.mark_clean(id);
        }
    }

    /// 遍历所有脏槽位：`(槽位, 块号, 数据)`
    pub fn for_each_dirty<F>(&self, mut f: F)
    where
        F: FnMut(SlotId, BlockIndex, &[u8]),
    {
        for id in self.dirty.iter(&self.links) {
            if let Some(block) = self.slots[id].block {
                f(id, block, &self.data[self.range(id)]);
            }
        }
    }

    /// 写回所有脏块并全部标记为干净
    ///
    /// 单个块写回失败只记录日志和统计，槽位仍被标记为干净。
    ///
    /// # 返回
    ///
    /// 尝试写回的块数量
    pub fn flush_all<F>(&mut self, mut write_back: F) -> usize
    where
        F: FnMut(BlockIndex, &[u8]) -> Result<()>,
    {
        if self.dirty.is_empty() {
            return 0;
        }

        let mut flushed = 0usize;
        let mut failed = 0u64;
        self.for_each_dirty(|_, block, data| {
            flushed += 1;
            if let Err(e) = write_back(block, data) {
                failed += 1;
                log::warn!("[CACHE] write-back of block={} failed: {}", block, e);
            }
        });
        self.mark_all_clean();

        self.stats.writebacks += flushed as u64 - failed;
        self.stats.failed_writebacks += failed;
        log::debug!("[CACHE] flushed {} dirty blocks ({} failed)", flushed, failed);
        flushed
    }

    /// 让驻留且干净的块在下次访问时重新从设备读取
    ///
    /// 脏块保持不变：缓存中的数据比设备上的新。
    pub fn invalidate_data(&mut self, block: BlockIndex) {
        if let Some(id) = self.peek(block) {
            if !self.slots[id].is_dirty() {
                self.slots[id].flags.remove(SlotFlags::HAS_DATA);
            }
        }
    }

    fn range(&self, id: SlotId) -> Range<usize> {
        let start = id * self.block_size;
        start..start + self.block_size
    }

    /// 槽位元数据
    pub fn slot(&self, id: SlotId) -> &CacheSlot {
        &self.slots[id]
    }

    /// 槽位数据（只读）
    pub fn data(&self, id: SlotId) -> &[u8] {
        let range = self.range(id);
        &self.data[range]
    }

    /// 槽位数据（可写）
    ///
    /// 不会自动标记为脏，写入后需要调用 [`mark_dirty`](Self::mark_dirty)。
    pub fn data_mut(&mut self, id: SlotId) -> &mut [u8] {
        let range = self.range(id);
        &mut self.data[range]
    }

    /// 槽位数据是否有效
    pub fn has_data(&self, id: SlotId) -> bool {
        self.slots[id].has_data()
    }

    /// 标记槽位数据有效
    pub fn set_has_data(&mut self, id: SlotId) {
        self.slots[id].flags.insert(SlotFlags::HAS_DATA);
    }

    /// 块是否驻留在缓存中
    pub fn contains(&self, block: BlockIndex) -> bool {
        self.index.contains_key(&block)
    }

    /// 块是否驻留且为脏
    pub fn is_block_dirty(&self, block: BlockIndex) -> bool {
        self.peek(block).is_some_and(|id| self.slots[id].is_dirty())
    }

    /// 获取缓存统计信息
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.dirty_blocks = self.dirty.len();
        stats
    }

    /// 获取缓存容量
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// 获取当前驻留的块数量
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// 检查缓存是否为空
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// 获取脏块数量
    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    /// 获取块大小
    pub fn block_size(&self) -> usize {
        self.block_size
    }
}

impl core::fmt::Debug for BlockCache {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BlockCache")
            .field("capacity", &self.slots.len())
            .field("len", &self.index.len())
            .field("clean", &self.clean.len())
            .field("dirty_count", &self.dirty.len())
            .field("block_size", &self.block_size)
            .field("stats", &self.stats)
            .finish()
    }
}
