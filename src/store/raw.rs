//! 物理块直接 I/O
//!
//! 以设备物理块为单位，完全绕过缓存；不检查缓存中是否有同一区域的脏数据。

use super::{BlockStore, FlushHook};
use crate::block::BlockDevice;
use crate::error::{Error, ErrorKind, Result};
use core::sync::atomic::Ordering;

impl<D: BlockDevice, H: FlushHook> BlockStore<D, H> {
    fn raw_offset(&self, index: u64) -> Result<u64> {
        index
            .checked_mul(self.device_block_size as u64)
            .ok_or(Error::new(ErrorKind::OutOfBounds, "device block offset overflows u64"))
    }

    /// 读取一个物理块
    ///
    /// # Panics
    ///
    /// `buffer` 短于设备块大小，或设备返回的字节数不足
    pub fn raw_read(&self, index: u64, buffer: &mut [u8]) -> Result<()> {
        self.raw_read_blocks(index, 1, buffer)
    }

    /// 写入一个物理块
    ///
    /// # Panics
    ///
    /// `buffer` 短于设备块大小，或设备写入的字节数不足
    pub fn raw_write(&self, index: u64, buffer: &[u8]) -> Result<()> {
        self.raw_write_blocks(index, 1, buffer)
    }

    /// 读取连续的多个物理块（一次设备调用）
    pub fn raw_read_blocks(&self, index: u64, count: usize, buffer: &mut [u8]) -> Result<()> {
        let len = count
            .checked_mul(self.device_block_size)
            .filter(|&len| buffer.len() >= len);
        let Some(len) = len else {
            panic!("buffer too small for raw read");
        };
        let offset = self.raw_offset(index)?;

        let read = self.device.read_at(offset, &mut buffer[..len])?;
        self.counters.physical_reads.fetch_add(1, Ordering::Relaxed);
        assert_eq!(read, len, "short raw read at device block {}", index);
        Ok(())
    }

    /// 写入连续的多个物理块（一次设备调用）
    pub fn raw_write_blocks(&self, index: u64, count: usize, buffer: &[u8]) -> Result<()> {
        let len = count
            .checked_mul(self.device_block_size)
            .filter(|&len| buffer.len() >= len);
        let Some(len) = len else {
            panic!("buffer too small for raw write");
        };
        self.check_writable()?;
        let offset = self.raw_offset(index)?;

        let written = self.device.write_at(offset, &buffer[..len])?;
        self.counters.physical_writes.fetch_add(1, Ordering::Relaxed);
        assert_eq!(written, len, "short raw write at device block {}", index);
        Ok(())
    }
}
