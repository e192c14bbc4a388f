//! 块存储层
//!
//! [`BlockStore`] 拥有底层设备和唯一的 [`BlockCache`]，对上层文件系统提供：
//!
//! - store/io.rs: 按逻辑块读写（`read_block`/`write_block` 等），可选择是否经过缓存
//! - store/raw.rs: 按物理块直接读写设备（`raw_read`/`raw_write` 等），不依赖缓存
//! - 本文件: 初始化、刷新（`flush_writes`/`flush_specific_block_if_needed`）
//!
//! # 并发
//!
//! 缓存由一个 `spin::Mutex` 保护，所有缓存操作（包括只读命中）都串行执行。
//! 缓存未命中时的填充读取、全脏时的强制刷新以及按需刷新都在持锁期间执行
//! 设备 I/O，一个线程的慢速 I/O 会阻塞其他线程的缓存访问。

mod config;
mod hook;
mod io;
mod raw;

pub use config::StoreConfig;
pub use hook::{FlushHook, NoHook};

use crate::block::BlockDevice;
use crate::cache::{BlockCache, BlockIndex, CacheStats};
use crate::consts::MAX_LOGICAL_BLOCK_SIZE;
use crate::error::{Error, ErrorKind, Result};
use core::sync::atomic::{AtomicU64, Ordering};
use spin::{Mutex, Once};

/// 块存储 I/O 统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// 逻辑读取次数（包括缓存命中）
    pub read_count: u64,
    /// 逻辑写入次数（包括缓存写入）
    pub write_count: u64,
    /// 物理读取次数（实际设备操作）
    pub physical_read_count: u64,
    /// 物理写入次数（实际设备操作）
    pub physical_write_count: u64,
}

#[derive(Debug, Default)]
struct Counters {
    reads: AtomicU64,
    writes: AtomicU64,
    physical_reads: AtomicU64,
    physical_writes: AtomicU64,
}

/// 逻辑块大小必须不超过上限，且是设备物理块大小的整数倍（0 表示尚未设置）
fn check_logical_block_size(size: usize, device_block_size: usize) -> Result<()> {
    if size > MAX_LOGICAL_BLOCK_SIZE {
        return Err(Error::new(ErrorKind::InvalidInput, "logical block size too large"));
    }
    if size % device_block_size != 0 {
        return Err(Error::new(
            ErrorKind::Unsupported,
            "logical block size must be a multiple of the device block size",
        ));
    }
    Ok(())
}

/// 块存储
///
/// # 生命周期
///
/// 1. `BlockStore::new` / `with_config` / `with_hook` 创建，此时没有缓存
/// 2. 确定逻辑块大小（配置或 [`set_logical_block_size`](Self::set_logical_block_size)）
/// 3. 调用一次 [`initialize`](Self::initialize) 分配缓存
/// 4. 块 I/O
/// 5. [`close`](Self::close) 或 [`flush_writes`](Self::flush_writes) 后丢弃；
///    未刷新的脏块在丢弃时丢失
///
/// 物理块读写（`raw_*`）不依赖缓存，在 `initialize` 之前即可使用（例如读取超级块
/// 以确定逻辑块大小）。
///
/// # 示例
///
/// ```rust,ignore
/// let mut store = BlockStore::new(device)?;
/// let mut sb = [0u8; 512];
/// store.raw_read(2, &mut sb)?;
/// store.set_logical_block_size(parse_block_size(&sb))?;
/// store.initialize()?;
///
/// store.write_block(7, &data, data.len(), 0, true)?;
/// store.flush_writes()?;
/// ```
pub struct BlockStore<D: BlockDevice, H: FlushHook = NoHook> {
    device: D,
    hook: H,
    cache_entries: usize,
    logical_block_size: usize,
    device_block_size: usize,
    cache: Once<Mutex<BlockCache>>,
    counters: Counters,
}

impl<D: BlockDevice> BlockStore<D, NoHook> {
    /// 使用默认配置创建块存储
    pub fn new(device: D) -> Result<Self> {
        Self::with_config(device, StoreConfig::default())
    }

    /// 使用指定配置创建块存储
    pub fn with_config(device: D, config: StoreConfig) -> Result<Self> {
        Self::with_hook(device, NoHook, config)
    }
}

impl<D: BlockDevice, H: FlushHook> BlockStore<D, H> {
    /// 创建带刷新钩子的块存储
    ///
    /// # 错误
    ///
    /// - 缓存槽位数为 0、设备物理块大小为 0 或逻辑块大小超过上限时返回 `InvalidInput`
    /// - 逻辑块大小不是物理块大小的整数倍时返回 `Unsupported`
    pub fn with_hook(device: D, hook: H, config: StoreConfig) -> Result<Self> {
        if config.cache_entries == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "cache must have at least one entry"));
        }
        let device_block_size = device.block_size() as usize;
        if device_block_size == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "device block size must be non-zero"));
        }
        check_logical_block_size(config.logical_block_size, device_block_size)?;

        Ok(Self {
            device,
            hook,
            cache_entries: config.cache_entries,
            logical_block_size: config.logical_block_size,
            device_block_size,
            cache: Once::new(),
            counters: Counters::default(),
        })
    }

    /// 设置逻辑块大小
    ///
    /// 只能在 [`initialize`](Self::initialize) 之前调用。
    pub fn set_logical_block_size(&mut self, size: usize) -> Result<()> {
        if self.is_initialized() {
            return Err(Error::new(
                ErrorKind::InvalidState,
                "logical block size is fixed after initialize",
            ));
        }
        check_logical_block_size(size, self.device_block_size)?;
        self.logical_block_size = size;
        Ok(())
    }

    /// 分配块缓存
    ///
    /// 必须在确定逻辑块大小之后、任何逻辑块 I/O 之前调用一次。
    ///
    /// # Panics
    ///
    /// 逻辑块大小为 0 时 panic
    ///
    /// # 错误
    ///
    /// - 重复初始化返回 `InvalidState`
    /// - 逻辑块大小不是物理块大小的整数倍时返回 `Unsupported`
    /// - 缓存内存分配失败返回 `NoMemory`
    pub fn initialize(&self) -> Result<()> {
        assert!(
            self.logical_block_size != 0,
            "logical block size must be set before initialize"
        );
        check_logical_block_size(self.logical_block_size, self.device_block_size)?;
        if self.is_initialized() {
            return Err(Error::new(ErrorKind::InvalidState, "block store already initialized"));
        }

        let cache = BlockCache::new(self.cache_entries, self.logical_block_size)?;
        let mut installed = false;
        self.cache.call_once(|| {
            installed = true;
            Mutex::new(cache)
        });
        if !installed {
            return Err(Error::new(ErrorKind::InvalidState, "block store already initialized"));
        }

        log::info!(
            "[STORE] initialized: logical_block_size={} device_block_size={} cache_entries={}",
            self.logical_block_size,
            self.device_block_size,
            self.cache_entries
        );
        Ok(())
    }

    /// 是否已初始化
    pub fn is_initialized(&self) -> bool {
        self.cache.is_completed()
    }

    pub(crate) fn cache(&self) -> Result<&Mutex<BlockCache>> {
        self.cache
            .get()
            .ok_or(Error::new(ErrorKind::InvalidState, "block store not initialized"))
    }

    /// 逻辑块内 `offset` 处的设备字节偏移
    pub(crate) fn byte_offset(&self, index: BlockIndex, offset: usize) -> Result<u64> {
        index
            .checked_mul(self.logical_block_size as u64)
            .and_then(|base| base.checked_add(offset as u64))
            .ok_or(Error::new(ErrorKind::OutOfBounds, "block offset overflows u64"))
    }

    pub(crate) fn check_writable(&self) -> Result<()> {
        if self.device.is_read_only() {
            return Err(Error::new(ErrorKind::ReadOnly, "device is read-only"));
        }
        Ok(())
    }

    /// 将整个逻辑块写回设备（缓存写回路径）
    pub(crate) fn write_back(&self, index: BlockIndex, data: &[u8]) -> Result<()> {
        let base = self.byte_offset(index, 0)?;
        let written = self.device.write_at(base, data)?;
        self.counters.physical_writes.fetch_add(1, Ordering::Relaxed);
        if written != data.len() {
            return Err(Error::new(ErrorKind::Io, "short write-back to device"));
        }
        Ok(())
    }

    /// 如果指定块在缓存中且为脏，将其写回设备
    ///
    /// 尽力而为：写回失败只记录日志，不返回错误，槽位同样被标记为干净。
    /// 通常在绕过缓存的读写之前调用，使设备上的内容是最新的；之后绕过缓存的
    /// 写入会让这个干净副本失效，不会被旧数据覆盖。
    pub fn flush_specific_block_if_needed(&self, index: BlockIndex) {
        let Some(cache) = self.cache.get() else {
            return;
        };
        let mut cache = cache.lock();
        if cache.dirty_count() == 0 {
            return;
        }
        let Some(slot) = cache.peek(index) else {
            return;
        };
        if !cache.slot(slot).is_dirty() {
            return;
        }

        match self.write_back(index, cache.data(slot)) {
            Ok(()) => log::debug!("[STORE] flushed block={} on demand", index),
            Err(e) => log::warn!("[STORE] on-demand flush of block={} failed: {}", index, e),
        }
        cache.mark_clean(slot);
    }

    /// 刷新所有脏块
    ///
    /// 依次调用钩子的 `before_flush`、写回全部脏块、钩子的 `after_flush`。
    /// 单个块写回失败只记录日志，槽位仍被标记为干净；只有 `before_flush`
    /// 的错误会被返回。未初始化时什么都不做。
    pub fn flush_writes(&self) -> Result<()> {
        self.hook.before_flush()?;
        let flushed = self.flush_writes_impl();
        self.hook.after_flush(flushed);
        Ok(())
    }

    fn flush_writes_impl(&self) -> usize {
        let Some(cache) = self.cache.get() else {
            return 0;
        };
        let mut cache = cache.lock();
        if cache.dirty_count() == 0 {
            return 0;
        }
        cache.flush_all(|block, data| self.write_back(block, data))
    }

    /// 刷新所有缓存
    ///
    /// 先刷新缓存中的脏块，然后调用设备的 flush。
    /// 这是两层刷新：缓存层和硬件层。
    pub fn sync(&self) -> Result<()> {
        self.flush_writes()?;
        self.device.flush()
    }

    /// 关闭块存储
    ///
    /// 先刷新所有数据，然后调用设备的 `close()`。
    pub fn close(&self) -> Result<()> {
        self.sync()?;
        self.device.close()
    }

    /// 获取底层设备的引用
    pub fn device(&self) -> &D {
        &self.device
    }

    /// 获取刷新钩子的引用
    pub fn hook(&self) -> &H {
        &self.hook
    }

    /// 获取逻辑块大小
    pub fn logical_block_size(&self) -> usize {
        self.logical_block_size
    }

    /// 获取设备物理块大小
    pub fn device_block_size(&self) -> usize {
        self.device_block_size
    }

    /// 获取缓存容量（槽位数）
    pub fn cache_capacity(&self) -> usize {
        self.cache_entries
    }

    /// 当前驻留在缓存中的块数量
    pub fn cached_block_count(&self) -> usize {
        self.cache.get().map_or(0, |cache| cache.lock().len())
    }

    /// 当前脏块数量
    pub fn dirty_block_count(&self) -> usize {
        self.cache.get().map_or(0, |cache| cache.lock().dirty_count())
    }

    /// 指定块是否驻留在缓存中且为脏
    pub fn is_block_dirty(&self, index: BlockIndex) -> bool {
        self.cache
            .get()
            .is_some_and(|cache| cache.lock().is_block_dirty(index))
    }

    /// 获取缓存统计信息，未初始化时返回 `None`
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.get().map(|cache| cache.lock().stats())
    }

    /// 获取 I/O 统计
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            read_count: self.counters.reads.load(Ordering::Relaxed),
            write_count: self.counters.writes.load(Ordering::Relaxed),
            physical_read_count: self.counters.physical_reads.load(Ordering::Relaxed),
            physical_write_count: self.counters.physical_writes.load(Ordering::Relaxed),
        }
    }
}

impl<D: BlockDevice, H: FlushHook> Drop for BlockStore<D, H> {
    fn drop(&mut self) {
        if let Some(cache) = self.cache.get_mut() {
            let dirty = cache.get_mut().dirty_count();
            if dirty > 0 {
                log::warn!("[STORE] dropping block store with {} unflushed dirty blocks", dirty);
            }
        }
    }
}

impl<D: BlockDevice, H: FlushHook> core::fmt::Debug for BlockStore<D, H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BlockStore")
            .field("logical_block_size", &self.logical_block_size)
            .field("device_block_size", &self.device_block_size)
            .field("cache_entries", &self.cache_entries)
            .field("initialized", &self.is_initialized())
            .field("stats", &self.stats())
            .finish()
    }
}
