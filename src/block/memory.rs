//! 内存块设备
//!
//! 以一段 `Vec<u8>` 作为后备存储的设备，用于测试和内存文件系统。

use super::BlockDevice;
use crate::consts::DEFAULT_DEVICE_BLOCK_SIZE;
use crate::error::{Error, ErrorKind, Result};
use alloc::vec;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};
use spin::Mutex;

/// 内存块设备
///
/// 读写语义与普通文件的 `pread`/`pwrite` 一致：越过末尾的访问返回较短的
/// 字节数而不是错误。
pub struct MemoryDevice {
    storage: Mutex<Vec<u8>>,
    block_size: u32,
    read_only: bool,
    /// 设备读调用次数
    reads: AtomicU64,
    /// 设备写调用次数
    writes: AtomicU64,
}

impl MemoryDevice {
    /// 创建 `len` 字节、全零的设备，物理块大小为 512
    pub fn new(len: usize) -> Self {
        Self::with_block_size(len, DEFAULT_DEVICE_BLOCK_SIZE)
    }

    /// 创建指定物理块大小的设备
    pub fn with_block_size(len: usize, block_size: u32) -> Self {
        Self::from_vec(vec![0u8; len], block_size)
    }

    /// 以已有数据作为设备内容
    pub fn from_vec(data: Vec<u8>, block_size: u32) -> Self {
        Self {
            storage: Mutex::new(data),
            block_size,
            read_only: false,
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    /// 设置为只读设备
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// 设备读调用次数
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// 设备写调用次数
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// 设备总字节数
    pub fn len_bytes(&self) -> u64 {
        self.storage.lock().len() as u64
    }

    /// 复制 `[offset, offset + len)` 处的内容，绕过计数器
    pub fn snapshot(&self, offset: usize, len: usize) -> Vec<u8> {
        let storage = self.storage.lock();
        let start = offset.min(storage.len());
        let end = offset.saturating_add(len).min(storage.len());
        storage[start..end].to_vec()
    }
}

impl BlockDevice for MemoryDevice {
    fn block_size(&self) -> u32 {
        self.block_size
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let storage = self.storage.lock();
        let start = usize::try_from(offset)
            .map_err(|_| Error::new(ErrorKind::OutOfBounds, "offset does not fit in memory"))?;
        if start >= storage.len() {
            return Ok(0);
        }
        let len = buf.len().min(storage.len() - start);
        buf[..len].copy_from_slice(&storage[start..start + len]);
        Ok(len)
    }

    fn write_at(&self, offset: u64, buf: &[u8]) -> Result<usize> {
        if self.read_only {
            return Err(Error::new(ErrorKind::ReadOnly, "memory device is read-only"));
        }
        self.writes.fetch_add(1, Ordering::Relaxed);
        let mut storage = self.storage.lock();
        let start = usize::try_from(offset)
            .map_err(|_| Error::new(ErrorKind::OutOfBounds, "offset does not fit in memory"))?;
        if start >= storage.len() {
            return Ok(0);
        }
        let len = buf.len().min(storage.len() - start);
        storage[start..start + len].copy_from_slice(&buf[..len]);
        Ok(len)
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }
}

impl core::fmt::Debug for MemoryDevice {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MemoryDevice")
            .field("len", &self.storage.lock().len())
            .field("block_size", &self.block_size)
            .field("read_only", &self.read_only)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write_roundtrip() {
        let dev = MemoryDevice::new(1024);
        assert_eq!(dev.write_at(10, &[1, 2, 3]).unwrap(), 3);

        let mut buf = [0u8; 5];
        assert_eq!(dev.read_at(9, &mut buf).unwrap(), 5);
        assert_eq!(buf, [0, 1, 2, 3, 0]);
        assert_eq!(dev.read_count(), 1);
        assert_eq!(dev.write_count(), 1);
    }

    #[test]
    fn test_short_transfer_at_end() {
        let dev = MemoryDevice::new(8);
        let mut buf = [0xAAu8; 4];
        assert_eq!(dev.read_at(6, &mut buf).unwrap(), 2);
        assert_eq!(dev.read_at(8, &mut buf).unwrap(), 0);
        assert_eq!(dev.write_at(7, &[9, 9]).unwrap(), 1);
        assert_eq!(dev.snapshot(6, 10), vec![0, 9]);
    }

    #[test]
    fn test_read_only() {
        let dev = MemoryDevice::new(16).read_only();
        assert!(dev.is_read_only());
        let err = dev.write_at(0, &[1]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReadOnly);
        assert_eq!(dev.write_count(), 0);
    }
}
