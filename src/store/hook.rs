//! 刷新钩子
//!
//! 让上层在 [`BlockStore::flush_writes`](super::BlockStore::flush_writes)
//! 前后插入自己的逻辑（例如提交日志、更新统计），而不需要重新实现刷新。

use crate::error::Result;

/// 刷新钩子 trait
///
/// `BlockStore` 对钩子类型泛型，默认使用 [`NoHook`]。
///
/// # 调用时机
///
/// - `before_flush` 在获取缓存锁之前调用，返回错误时本次刷新被取消
/// - `after_flush` 在释放缓存锁之后调用，参数为本次写回的块数量
///
/// 钩子由 store 持有，拿不到 store 的引用，只能处理自己管理的状态；
/// 需要先写成脏块的数据应由上层在调用 `flush_writes` 之前写入。
///
/// # 示例
///
/// ```rust,ignore
/// struct JournalHook { journal: Journal }
///
/// impl FlushHook for JournalHook {
///     fn before_flush(&self) -> Result<()> {
///         // 数据块写回之前先提交日志
///         self.journal.commit()
///     }
/// }
///
/// let store = BlockStore::with_hook(device, JournalHook { .. }, StoreConfig::default())?;
/// ```
pub trait FlushHook: Send + Sync {
    /// 刷新前调用，返回错误时取消本次刷新
    fn before_flush(&self) -> Result<()> {
        Ok(())
    }

    /// 刷新后调用
    fn after_flush(&self, _flushed: usize) {}
}

/// 空钩子（默认）
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHook;

impl FlushHook for NoHook {}
