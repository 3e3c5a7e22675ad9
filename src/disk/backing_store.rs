use std::{
    alloc::{alloc_zeroed, Layout},
    fmt, ptr,
};

use crate::disk::error::{DiskError, Result};

/// 设备背后的一整块连续内存
///
/// 只归属于一个设备。拆除时交还给分配它的分配器，内存本身在值被 drop 时释放。
pub struct BackingStore {
    data: Box<[u8]>,
}

impl BackingStore {
    /// 分配 `bytes` 字节的清零内存，内存不足时返回 None 而不是直接 abort
    pub fn allocate(bytes: u64) -> Result<Self> {
        let err = DiskError::Allocation { bytes };
        let len = usize::try_from(bytes).map_err(|_| err.clone())?;
        if len == 0 {
            return Ok(Self {
                data: Box::default(),
            });
        }

        let layout = Layout::array::<u8>(len).map_err(|_| err.clone())?;
        // SAFETY: layout has a non-zero size; a null return is handled below.
        let raw = unsafe { alloc_zeroed(layout) };
        if raw.is_null() {
            return Err(err);
        }
        // SAFETY: `raw` was allocated by the global allocator with the layout
        // of a `[u8; len]`, is zero-initialized and owned by nobody else.
        let data = unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(raw, len)) };
        Ok(Self { data })
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 从 `offset` 开始把 `src` 拷进存储区
    ///
    /// 调用方已经校验过范围；万一越界会 panic，绝不会碰到存储区以外的内存
    pub(crate) fn copy_in(&mut self, offset: usize, src: &[u8]) {
        self.data[offset..offset + src.len()].copy_from_slice(src);
    }

    /// 从 `offset` 开始拷出到 `dst`
    pub(crate) fn copy_out(&self, offset: usize, dst: &mut [u8]) {
        dst.copy_from_slice(&self.data[offset..offset + dst.len()]);
    }

    #[cfg(test)]
    pub(crate) fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Debug for BackingStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackingStore")
            .field("len", &self.data.len())
            .finish()
    }
}

/// 设备存储区的来源
///
/// `release` 会消耗句柄，所以一块存储区只能交还一次
pub trait StoreAllocator: Send + Sync {
    fn allocate(&self, bytes: u64) -> Result<BackingStore>;
    fn release(&self, store: BackingStore);
}

/// 从进程堆上分配存储区，相当于内核里的 `vmalloc`
#[derive(Debug, Default, Clone, Copy)]
pub struct VmallocAllocator;

impl StoreAllocator for VmallocAllocator {
    fn allocate(&self, bytes: u64) -> Result<BackingStore> {
        BackingStore::allocate(bytes)
    }

    fn release(&self, store: BackingStore) {
        drop(store);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_is_zero_filled() {
        let store = BackingStore::allocate(64 * 1024).unwrap();
        assert_eq!(store.len(), 64 * 1024);
        assert!(store.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn impossible_allocation_is_reported() {
        let err = BackingStore::allocate(u64::MAX).unwrap_err();
        assert_eq!(err, DiskError::Allocation { bytes: u64::MAX });
    }

    #[test]
    fn copies_stay_inside_requested_span() {
        let mut store = VmallocAllocator.allocate(4096).unwrap();
        store.copy_in(1024, &[0x5A; 512]);

        let mut out = [0u8; 1024];
        store.copy_out(768, &mut out);
        assert!(out[..256].iter().all(|&b| b == 0));
        assert!(out[256..768].iter().all(|&b| b == 0x5A));
        assert!(out[768..].iter().all(|&b| b == 0));
        VmallocAllocator.release(store);
    }

    #[test]
    #[should_panic]
    fn copy_past_the_end_panics() {
        let mut store = BackingStore::allocate(512).unwrap();
        store.copy_in(256, &[1; 512]);
    }
}
