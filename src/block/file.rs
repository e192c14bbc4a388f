//! 文件块设备（需要 `std` 特性）
//!
//! 使用 `std::os::unix::fs::FileExt` 的 `read_at`/`write_at`，
//! 不依赖共享的文件游标，可以被多个线程同时调用。

use super::BlockDevice;
use crate::consts::DEFAULT_DEVICE_BLOCK_SIZE;
use crate::error::{Error, ErrorKind, Result};
use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::Path;

/// 以普通文件或磁盘镜像作为后备存储的设备
#[derive(Debug)]
pub struct FileDevice {
    file: File,
    len: u64,
    block_size: u32,
    writable: bool,
}

impl FileDevice {
    /// 打开镜像文件，无写权限时退化为只读
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_block_size(path, DEFAULT_DEVICE_BLOCK_SIZE)
    }

    /// 以指定物理块大小打开镜像文件
    pub fn open_with_block_size(path: impl AsRef<Path>, block_size: u32) -> Result<Self> {
        let (file, writable) = match OpenOptions::new().read(true).write(true).open(path.as_ref()) {
            Ok(file) => (file, true),
            Err(_) => (OpenOptions::new().read(true).open(path.as_ref())?, false),
        };
        let len = file.metadata()?.len();
        log::debug!(
            "[FILE] opened image len={} block_size={} writable={}",
            len,
            block_size,
            writable
        );
        Ok(Self {
            file,
            len,
            block_size,
            writable,
        })
    }

    /// 打开时的镜像文件字节数
    pub fn len_bytes(&self) -> u64 {
        self.len
    }
}

impl BlockDevice for FileDevice {
    fn block_size(&self) -> u32 {
        self.block_size
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        Ok(FileExt::read_at(&self.file, buf, offset)?)
    }

    fn write_at(&self, offset: u64, buf: &[u8]) -> Result<usize> {
        if !self.writable {
            return Err(Error::new(ErrorKind::ReadOnly, "image opened read-only"));
        }
        Ok(FileExt::write_at(&self.file, buf, offset)?)
    }

    fn flush(&self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    fn is_read_only(&self) -> bool {
        !self.writable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_file_device_read_write() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&[0u8; 4096]).unwrap();
        tmp.flush().unwrap();

        let dev = FileDevice::open(tmp.path()).unwrap();
        assert_eq!(dev.len_bytes(), 4096);
        assert!(!dev.is_read_only());

        assert_eq!(dev.write_at(512, &[7u8; 512]).unwrap(), 512);
        dev.flush().unwrap();

        let mut buf = [0u8; 512];
        assert_eq!(dev.read_at(512, &mut buf).unwrap(), 512);
        assert!(buf.iter().all(|&b| b == 7));
    }
}
