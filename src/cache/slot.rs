//! 缓存槽位
//!
//! 一个槽位对应缓存中的一行：当前承载的逻辑块号和状态标志。槽位的数据
//! 缓冲区位于 `BlockCache` 的连续分配中，按槽位下标切片访问，生命周期内
//! 不会改变大小。

use super::BlockIndex;
use bitflags::bitflags;

/// 槽位 ID，即槽位在缓存数组中的下标
pub type SlotId = usize;

bitflags! {
    /// 槽位状态标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SlotFlags: u8 {
        /// 数据缓冲区持有设备块的有效副本
        const HAS_DATA = 0x01;
        /// 写入后尚未刷回设备，位于脏链表
        const DIRTY    = 0x02;
    }
}

/// 缓存槽位
///
/// 状态迁移：`Empty -> Clean <-> Dirty -> Clean -> 被驱逐/重新分配`。
/// 只有 Clean 状态的槽位可以被重新分配给其他块。
#[derive(Debug, Clone)]
pub struct CacheSlot {
    /// 当前承载的逻辑块号，首次使用前为 `None`
    pub(crate) block: Option<BlockIndex>,
    /// 状态标志
    pub(crate) flags: SlotFlags,
}

impl CacheSlot {
    pub(crate) const fn empty() -> Self {
        Self {
            block: None,
            flags: SlotFlags::empty(),
        }
    }

    /// 当前承载的逻辑块号
    pub fn block(&self) -> Option<BlockIndex> {
        self.block
    }

    /// 数据是否有效
    pub fn has_data(&self) -> bool {
        self.flags.contains(SlotFlags::HAS_DATA)
    }

    /// 是否是脏块
    pub fn is_dirty(&self) -> bool {
        self.flags.contains(SlotFlags::DIRTY)
    }

    /// 状态标志
    pub fn flags(&self) -> SlotFlags {
        self.flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_slot() {
        let slot = CacheSlot::empty();
        assert_eq!(slot.block(), None);
        assert!(!slot.has_data());
        assert!(!slot.is_dirty());
        assert_eq!(slot.flags(), SlotFlags::empty());
    }

    #[test]
    fn test_flags() {
        let mut slot = CacheSlot::empty();
        slot.flags.insert(SlotFlags::HAS_DATA | SlotFlags::DIRTY);
        assert!(slot.has_data());
        assert!(slot.is_dirty());

        slot.flags.remove(SlotFlags::DIRTY);
        assert!(slot.has_data());
        assert!(!slot.is_dirty());
    }
}
