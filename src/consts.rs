//! 块存储常量定义
//!
//! 缓存容量和块大小的默认值与取值范围。

//=============================================================================
// 缓存
//=============================================================================

/// 默认缓存槽位数量
pub const DEFAULT_CACHE_ENTRIES: usize = 10000;

//=============================================================================
// 块大小
//=============================================================================

/// 默认物理块大小（扇区大小，512 字节）
pub const DEFAULT_DEVICE_BLOCK_SIZE: u32 = 512;

/// 最大逻辑块大小（65536 字节）
pub const MAX_LOGICAL_BLOCK_SIZE: usize = 65536;
