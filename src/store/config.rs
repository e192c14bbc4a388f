//! 块存储配置

use crate::consts::DEFAULT_CACHE_ENTRIES;

/// 块存储配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// 块缓存大小（槽位数）
    pub cache_entries: usize,
    /// 逻辑块大小（字节），0 表示稍后通过 `set_logical_block_size` 设置
    pub logical_block_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cache_entries: DEFAULT_CACHE_ENTRIES,
            logical_block_size: 0,
        }
    }
}

impl StoreConfig {
    /// 设置缓存槽位数
    pub fn with_cache_entries(mut self, entries: usize) -> Self {
        self.cache_entries = entries;
        self
    }

    /// 设置逻辑块大小
    pub fn with_logical_block_size(mut self, size: usize) -> Self {
        self.logical_block_size = size;
        self
    }
}
