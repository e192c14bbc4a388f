//! 逻辑块 I/O 操作实现

use super::{BlockStore, FlushHook};
use crate::block::BlockDevice;
use crate::cache::BlockIndex;
use crate::error::{Error, ErrorKind, Result};
use alloc::vec::Vec;
use core::sync::atomic::Ordering;

fn check_range(offset: usize, count: usize, block_size: usize) {
    assert!(
        offset.checked_add(count).is_some_and(|end| end <= block_size),
        "range {}+{} exceeds logical block size {}",
        offset,
        count,
        block_size
    );
}

impl<D: BlockDevice, H: FlushHook> BlockStore<D, H> {
    /// 读取逻辑块中的一段字节
    ///
    /// # 参数
    ///
    /// * `index` - 逻辑块号
    /// * `buffer` - 目标缓冲区，`None` 表示只把块载入缓存
    /// * `count` - 读取的字节数
    /// * `offset` - 块内偏移
    /// * `allow_cache` - 是否经过缓存
    ///
    /// # 缓存路径
    ///
    /// 1. `ensure` 获取槽位（可能驱逐干净块，或在全脏时刷回所有脏块）
    /// 2. 槽位没有有效数据时，从设备读取**整个**逻辑块
    /// 3. 复制 `[offset, offset + count)` 到 `buffer`
    ///
    /// # 无缓存路径
    ///
    /// 先刷回该块（如果在缓存中为脏），再直接从设备读取。
    ///
    /// # Panics
    ///
    /// `offset + count` 超过逻辑块大小、`buffer` 短于 `count`，
    /// 或设备返回的字节数与请求不一致
    pub fn read_block(
        &self,
        index: BlockIndex,
        buffer: Option<&mut [u8]>,
        count: usize,
        offset: usize,
        allow_cache: bool,
    ) -> Result<()> {
        let cache = self.cache()?;
        let block_size = self.logical_block_size;
        check_range(offset, count, block_size);
        if let Some(buf) = buffer.as_deref() {
            assert!(buf.len() >= count, "buffer shorter than requested count");
        }
        self.counters.reads.fetch_add(1, Ordering::Relaxed);

        if !allow_cache {
            self.flush_specific_block_if_needed(index);
            let Some(buf) = buffer else {
                return Ok(());
            };
            let base = self.byte_offset(index, offset)?;
            let read = self.device.read_at(base, &mut buf[..count])?;
            self.counters.physical_reads.fetch_add(1, Ordering::Relaxed);
            assert_eq!(read, count, "short device read of block {}", index);
            return Ok(());
        }

        let mut cache = cache.lock();
        let slot = cache.ensure(index, |block, data| self.write_back(block, data))?;
        if !cache.has_data(slot) {
            self.fill_block(index, cache.data_mut(slot))?;
            cache.set_has_data(slot);
        }
        if let Some(buf) = buffer {
            buf[..count].copy_from_slice(&cache.data(slot)[offset..offset + count]);
        }
        Ok(())
    }

    /// 向逻辑块中的一段字节写入
    ///
    /// 源数据先复制到私有缓冲区，再获取缓存锁，持锁期间不读取调用者的内存。
    ///
    /// # 缓存路径
    ///
    /// 1. `ensure` 获取槽位
    /// 2. 写入不覆盖整个块且槽位没有有效数据时，先从设备读取整个块，
    ///    保证未写入的部分是设备上的内容
    /// 3. 复制数据到槽位并标记为脏；脏块只在被刷新时写回设备
    ///
    /// # 无缓存路径
    ///
    /// 先刷回该块（如果为脏），直接写入设备，然后让缓存中干净的旧副本失效。
    ///
    /// # Panics
    ///
    /// `offset + count` 超过逻辑块大小、`buffer` 短于 `count`，
    /// 或设备返回的字节数与请求不一致
    ///
    /// # 错误
    ///
    /// 只读设备返回 `ReadOnly`，不会在缓存中留下无法写回的脏块
    pub fn write_block(
        &self,
        index: BlockIndex,
        buffer: &[u8],
        count: usize,
        offset: usize,
        allow_cache: bool,
    ) -> Result<()> {
        let cache = self.cache()?;
        let block_size = self.logical_block_size;
        check_range(offset, count, block_size);
        assert!(buffer.len() >= count, "buffer shorter than requested count");
        self.check_writable()?;
        self.counters.writes.fetch_add(1, Ordering::Relaxed);

        if !allow_cache {
            self.flush_specific_block_if_needed(index);
            let base = self.byte_offset(index, offset)?;
            let written = self.device.write_at(base, &buffer[..count])?;
            self.counters.physical_writes.fetch_add(1, Ordering::Relaxed);
            assert_eq!(written, count, "short device write of block {}", index);
            cache.lock().invalidate_data(index);
            return Ok(());
        }

        let mut scratch = Vec::new();
        scratch
            .try_reserve_exact(count)
            .map_err(|_| Error::new(ErrorKind::NoMemory, "failed to allocate write buffer"))?;
        scratch.extend_from_slice(&buffer[..count]);

        let mut cache = cache.lock();
        let slot = cache.ensure(index, |block, data| self.write_back(block, data))?;
        if count < block_size && !cache.has_data(slot) {
            self.fill_block(index, cache.data_mut(slot))?;
        }
        cache.data_mut(slot)[offset..offset + count].copy_from_slice(&scratch);
        cache.set_has_data(slot);
        cache.mark_dirty(slot);
        Ok(())
    }

    /// 从设备读取整个逻辑块到槽位缓冲区
    fn fill_block(&self, index: BlockIndex, data: &mut [u8]) -> Result<()> {
        let base = self.byte_offset(index, 0)?;
        let read = self.device.read_at(base, data)?;
        self.counters.physical_reads.fetch_add(1, Ordering::Relaxed);
        assert_eq!(
            read,
            data.len(),
            "short device read while filling block {}",
            index
        );
        Ok(())
    }

    /// 读取连续的多个完整逻辑块
    ///
    /// 逐块调用 [`read_block`](Self::read_block)，不合并设备 I/O。
    pub fn read_blocks(
        &self,
        index: BlockIndex,
        count: usize,
        buffer: &mut [u8],
        allow_cache: bool,
    ) -> Result<()> {
        self.cache()?;
        let block_size = self.logical_block_size;
        assert!(
            count.checked_mul(block_size).is_some_and(|len| buffer.len() >= len),
            "buffer too small for requested blocks"
        );

        for (i, chunk) in buffer.chunks_exact_mut(block_size).take(count).enumerate() {
            let block = next_block(index, i)?;
            self.read_block(block, Some(chunk), block_size, 0, allow_cache)?;
        }
        Ok(())
    }

    /// 写入连续的多个完整逻辑块
    ///
    /// 逐块调用 [`write_block`](Self::write_block)，不合并设备 I/O。
    pub fn write_blocks(
        &self,
        index: BlockIndex,
        count: usize,
        buffer: &[u8],
        allow_cache: bool,
    ) -> Result<()> {
        self.cache()?;
        let block_size = self.logical_block_size;
        assert!(
            count.checked_mul(block_size).is_some_and(|len| buffer.len() >= len),
            "buffer too small for requested blocks"
        );

        for (i, chunk) in buffer.chunks_exact(block_size).take(count).enumerate() {
            let block = next_block(index, i)?;
            self.write_block(block, chunk, block_size, 0, allow_cache)?;
        }
        Ok(())
    }

    /// 读取字节
    ///
    /// 从任意字节偏移读取，经过缓存，自动处理跨块情况。
    ///
    /// # 示例
    ///
    /// ```rust,ignore
    /// let mut buf = vec![0u8; 100];
    /// store.read_bytes(1024, &mut buf)?;
    /// ```
    pub fn read_bytes(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        self.cache()?;
        let block_size = self.logical_block_size as u64;

        let mut done = 0;
        while done < buf.len() {
            let pos = offset
                .checked_add(done as u64)
                .ok_or(Error::new(ErrorKind::OutOfBounds, "byte offset overflows u64"))?;
            let in_block = (pos % block_size) as usize;
            let len = (block_size as usize - in_block).min(buf.len() - done);
            self.read_block(pos / block_size, Some(&mut buf[done..done + len]), len, in_block, true)?;
            done += len;
        }
        Ok(buf.len())
    }

    /// 写入字节
    ///
    /// 向任意字节偏移写入，经过缓存，自动处理跨块情况。
    /// 不完整的块由 [`write_block`](Self::write_block) 先从设备读取。
    ///
    /// # 示例
    ///
    /// ```rust,ignore
    /// let data = b"Hello, block store!";
    /// store.write_bytes(1024, data)?;
    /// ```
    pub fn write_bytes(&self, offset: u64, buf: &[u8]) -> Result<usize> {
        self.cache()?;
        let block_size = self.logical_block_size as u64;

        let mut done = 0;
        while done < buf.len() {
            let pos = offset
                .checked_add(done as u64)
                .ok_or(Error::new(ErrorKind::OutOfBounds, "byte offset overflows u64"))?;
            let in_block = (pos % block_size) as usize;
            let len = (block_size as usize - in_block).min(buf.len() - done);
            self.write_block(pos / block_size, &buf[done..done + len], len, in_block, true)?;
            done += len;
        }
        Ok(buf.len())
    }
}

fn next_block(index: BlockIndex, i: usize) -> Result<BlockIndex> {
    index
        .checked_add(i as u64)
        .ok_or(Error::new(ErrorKind::OutOfBounds, "block index overflows u64"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::MemoryDevice;
    use crate::store::StoreConfig;
    use alloc::vec;

    const BS: usize = 16;

    fn store(entries: usize, blocks: usize) -> BlockStore<MemoryDevice> {
        let device = MemoryDevice::with_block_size(blocks * BS, 8);
        let config = StoreConfig::default()
            .with_cache_entries(entries)
            .with_logical_block_size(BS);
        let store = BlockStore::with_config(device, config).unwrap();
        store.initialize().unwrap();
        store
    }

    #[test]
    fn test_read_after_write() {
        let store = store(4, 8);
        store.write_block(3, &[0xAB; 5], 5, 7, true).unwrap();

        let mut buf = [0u8; 5];
        store.read_block(3, Some(&mut buf), 5, 7, true).unwrap();
        assert_eq!(buf, [0xAB; 5]);
        // 写入只在缓存中
        assert_eq!(store.device().snapshot(3 * BS, BS), vec![0u8; BS]);
        assert!(store.is_block_dirty(3));
    }

    #[test]
    fn test_read_fills_whole_block_once() {
        let store = store(4, 8);
        store.device().write_at(BS as u64, &[7u8; BS]).unwrap();
        let reads_before = store.device().read_count();

        let mut head = [0u8; 4];
        store.read_block(1, Some(&mut head), 4, 0, true).unwrap();
        let mut tail = [0u8; 4];
        store.read_block(1, Some(&mut tail), 4, 12, true).unwrap();

        assert_eq!(head, [7; 4]);
        assert_eq!(tail, [7; 4]);
        assert_eq!(store.device().read_count(), reads_before + 1);
    }

    #[test]
    fn test_read_probe_populates_cache() {
        let store = store(4, 8);
        store.read_block(2, None, 0, 0, true).unwrap();
        assert_eq!(store.cached_block_count(), 1);
        assert_eq!(store.device().read_count(), 1);

        let mut buf = [1u8; BS];
        store.read_block(2, Some(&mut buf), BS, 0, true).unwrap();
        assert_eq!(store.device().read_count(), 1);
        assert_eq!(buf, [0u8; BS]);
    }

    #[test]
    fn test_partial_write_refills_untouched_bytes() {
        let store = store(4, 8);
        let original: Vec<u8> = (0..BS as u8).collect();
        store.device().write_at(5 * BS as u64, &original).unwrap();

        store.write_block(5, &[0xFF; 3], 3, 4, true).unwrap();

        let mut buf = [0u8; BS];
        store.read_block(5, Some(&mut buf), BS, 0, true).unwrap();
        let mut expected = original.clone();
        expected[4..7].copy_from_slice(&[0xFF; 3]);
        assert_eq!(&buf[..], &expected[..]);
    }

    #[test]
    fn test_full_write_skips_refill() {
        let store = store(4, 8);
        store.write_block(0, &[3u8; BS], BS, 0, true).unwrap();
        assert_eq!(store.device().read_count(), 0);
        assert_eq!(store.stats().physical_read_count, 0);
    }

    #[test]
    fn test_uncached_read_sees_dirty_block() {
        let store = store(4, 8);
        store.write_block(1, &[9u8; BS], BS, 0, true).unwrap();

        let mut buf = [0u8; 4];
        store.read_block(1, Some(&mut buf), 4, 2, false).unwrap();
        assert_eq!(buf, [9; 4]);
        assert!(!store.is_block_dirty(1));
        assert_eq!(store.device().snapshot(BS, BS), vec![9u8; BS]);
    }

    #[test]
    fn test_uncached_write_invalidates_clean_copy() {
        let store = store(4, 8);
        let mut buf = [0u8; BS];
        store.read_block(6, Some(&mut buf), BS, 0, true).unwrap();

        store.write_block(6, &[4u8; 2], 2, 0, false).unwrap();
        store.read_block(6, Some(&mut buf), BS, 0, true).unwrap();
        assert_eq!(&buf[..2], &[4, 4]);
        assert_eq!(&buf[2..], &[0u8; BS - 2][..]);
    }

    #[test]
    fn test_uncached_write_flushes_dirty_first() {
        let store = store(4, 8);
        store.write_block(2, &[1u8; BS], BS, 0, true).unwrap();
        store.write_block(2, &[2u8; 4], 4, 0, false).unwrap();

        let mut expected = vec![1u8; BS];
        expected[..4].copy_from_slice(&[2; 4]);
        assert_eq!(store.device().snapshot(2 * BS, BS), expected);
        assert_eq!(store.dirty_block_count(), 0);
    }

    #[test]
    fn test_read_write_blocks() {
        let store = store(2, 8);
        let data: Vec<u8> = (0..(3 * BS) as u8).collect();
        store.write_blocks(1, 3, &data, true).unwrap();

        let mut out = vec![0u8; 3 * BS];
        store.read_blocks(1, 3, &mut out, true).unwrap();
        assert_eq!(out, data);

        store.flush_writes().unwrap();
        assert_eq!(store.device().snapshot(BS, 3 * BS), data);

        let mut direct = vec![0u8; 3 * BS];
        store.read_blocks(1, 3, &mut direct, false).unwrap();
        assert_eq!(direct, data);
    }

    #[test]
    fn test_read_write_bytes_across_blocks() {
        let store = store(4, 8);
        let data: Vec<u8> = (1..=40).collect();
        assert_eq!(store.write_bytes(10, &data).unwrap(), 40);

        let mut out = vec![0u8; 40];
        assert_eq!(store.read_bytes(10, &mut out).unwrap(), 40);
        assert_eq!(out, data);

        store.flush_writes().unwrap();
        assert_eq!(store.device().snapshot(10, 40), data);
        assert_eq!(store.device().snapshot(0, 10), vec![0u8; 10]);
    }

    #[test]
    fn test_io_before_initialize() {
        let device = MemoryDevice::with_block_size(1024, 8);
        let config = StoreConfig::default().with_logical_block_size(BS);
        let store = BlockStore::with_config(device, config).unwrap();

        let mut buf = [0u8; 4];
        let err = store.read_block(0, Some(&mut buf), 4, 0, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        let err = store.write_block(0, &buf, 4, 0, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(store.read_bytes(0, &mut buf).unwrap_err().kind(), ErrorKind::InvalidState);
    }

    #[test]
    #[should_panic(expected = "exceeds logical block size")]
    fn test_range_past_block_end_panics() {
        let store = store(4, 8);
        let mut buf = [0u8; 8];
        let _ = store.read_block(0, Some(&mut buf), 8, 12, true);
    }

    #[test]
    #[should_panic(expected = "buffer too small for requested blocks")]
    fn test_block_count_overflow_panics() {
        let store = store(4, 8);
        let mut buf = [0u8; BS];
        let _ = store.read_blocks(0, usize::MAX, &mut buf, true);
    }

    #[test]
    #[should_panic(expected = "short device read")]
    fn test_short_device_read_panics() {
        // 设备只有 1.5 个逻辑块
        let device = MemoryDevice::with_block_size(BS + BS / 2, 8);
        let config = StoreConfig::default()
            .with_cache_entries(2)
            .with_logical_block_size(BS);
        let store = BlockStore::with_config(device, config).unwrap();
        store.initialize().unwrap();

        let mut buf = [0u8; BS];
        let _ = store.read_block(1, Some(&mut buf), BS, 0, true);
    }
}
