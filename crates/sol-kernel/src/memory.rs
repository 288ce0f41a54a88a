//! Per-process virtual address spaces.
//!
//! An [`AddressSpace`] tracks the regions a process may touch and
//! mediates every kernel access to user memory. Syscall handlers never
//! dereference a raw user pointer; they go through [`AddressSpace::read_bytes`]
//! and friends, which validate the range against the region map first.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use spin::Mutex;

use crate::error::KernelError;

pub const PAGE_SIZE: u64 = 4096;

/// Base of the user allocation window. Anything below is never mapped.
pub const USER_ALLOC_BASE: u64 = 0x4000_0000;

/// Access permissions for a region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegionFlags {
    pub read: bool,
    pub write: bool,
}

impl RegionFlags {
    pub const fn read_only() -> Self {
        Self {
            read: true,
            write: false,
        }
    }

    pub const fn read_write() -> Self {
        Self {
            read: true,
            write: true,
        }
    }
}

/// A contiguous mapped range.
pub struct Region {
    pub base: u64,
    pub size: u64,
    pub flags: RegionFlags,
    /// Backing bytes. `None` until the first access commits the region
    /// zero-filled.
    data: Option<Vec<u8>>,
}

impl Region {
    fn commit(&mut self) -> &mut Vec<u8> {
        self.data.get_or_insert_with(|| vec![0u8; self.size as usize])
    }

    fn contains(&self, addr: u64, len: u64) -> bool {
        addr >= self.base && addr.saturating_add(len) <= self.base + self.size
    }
}

struct SpaceInner {
    regions: BTreeMap<u64, Region>,
    next_base: u64,
}

impl SpaceInner {
    /// Region containing `addr`, found via the greatest base <= addr.
    fn region_for(&mut self, addr: u64, len: u64) -> Option<&mut Region> {
        let (_, region) = self.regions.range_mut(..=addr).next_back()?;
        if region.contains(addr, len) {
            Some(region)
        } else {
            None
        }
    }
}

/// One process's region map.
pub struct AddressSpace {
    inner: Mutex<SpaceInner>,
}

impl AddressSpace {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SpaceInner {
                regions: BTreeMap::new(),
                next_base: USER_ALLOC_BASE,
            }),
        }
    }

    /// Map a fresh region of at least `size` bytes and return its base.
    ///
    /// The size is rounded up to a whole number of pages. Regions are
    /// carved from a bump cursor and never overlap; freed address
    /// ranges are not recycled.
    pub fn alloc_region(
        &self,
        size: u64,
        flags: RegionFlags,
        commit_now: bool,
    ) -> Result<u64, KernelError> {
        if size == 0 {
            return Err(KernelError::InvalidArgument);
        }
        let size = size
            .checked_add(PAGE_SIZE - 1)
            .ok_or(KernelError::InvalidArgument)?
            & !(PAGE_SIZE - 1);

        let mut inner = self.inner.lock();
        let base = inner.next_base;
        inner.next_base = base
            .checked_add(size)
            .ok_or(KernelError::InvalidArgument)?;

        let mut region = Region {
            base,
            size,
            flags,
            data: None,
        };
        if commit_now {
            region.commit();
        }
        inner.regions.insert(base, region);
        Ok(base)
    }

    /// Total bytes currently mapped.
    pub fn mapped_bytes(&self) -> u64 {
        self.inner.lock().regions.values().map(|r| r.size).sum()
    }

    /// Copy `buf.len()` bytes out of user memory at `addr`.
    ///
    /// The whole range must fall inside a single readable region.
    pub fn read_bytes(&self, addr: u64, buf: &mut [u8]) -> Result<(), KernelError> {
        if buf.is_empty() {
            return self.check_access(addr, 0, false);
        }
        let mut inner = self.inner.lock();
        let region = inner
            .region_for(addr, buf.len() as u64)
            .ok_or(KernelError::InvalidArgument)?;
        if !region.flags.read {
            return Err(KernelError::InvalidArgument);
        }
        let off = (addr - region.base) as usize;
        let data = region.commit();
        buf.copy_from_slice(&data[off..off + buf.len()]);
        Ok(())
    }

    /// Copy `buf` into user memory at `addr`.
    ///
    /// The whole range must fall inside a single writable region.
    pub fn write_bytes(&self, addr: u64, buf: &[u8]) -> Result<(), KernelError> {
        if buf.is_empty() {
            return self.check_access(addr, 0, true);
        }
        let mut inner = self.inner.lock();
        let region = inner
            .region_for(addr, buf.len() as u64)
            .ok_or(KernelError::InvalidArgument)?;
        if !region.flags.write {
            return Err(KernelError::InvalidArgument);
        }
        let off = (addr - region.base) as usize;
        let data = region.commit();
        data[off..off + buf.len()].copy_from_slice(buf);
        Ok(())
    }

    /// Read a NUL-terminated string from user memory, up to `max_len`
    /// bytes of content.
    ///
    /// Fails with `InvalidArgument` if the bytes are not valid UTF-8,
    /// run off the end of the region, or no NUL appears within
    /// `max_len` bytes.
    pub fn read_cstr(&self, addr: u64, max_len: usize) -> Result<String, KernelError> {
        let mut inner = self.inner.lock();
        let region = inner
            .region_for(addr, 1)
            .ok_or(KernelError::InvalidArgument)?;
        if !region.flags.read {
            return Err(KernelError::InvalidArgument);
        }
        let base = region.base;
        let size = region.size as usize;
        let data = region.commit();

        let start = (addr - base) as usize;
        let mut out = Vec::new();
        for i in 0..=max_len {
            let idx = start + i;
            if idx >= size {
                return Err(KernelError::InvalidArgument);
            }
            let b = data[idx];
            if b == 0 {
                return String::from_utf8(out).map_err(|_| KernelError::InvalidArgument);
            }
            if i == max_len {
                break;
            }
            out.push(b);
        }
        Err(KernelError::InvalidArgument)
    }

    /// Validate that `[addr, addr+len)` is accessible without copying.
    pub fn check_access(&self, addr: u64, len: u64, for_write: bool) -> Result<(), KernelError> {
        let mut inner = self.inner.lock();
        let region = inner
            .region_for(addr, len)
            .ok_or(KernelError::InvalidArgument)?;
        let ok = if for_write {
            region.flags.write
        } else {
            region.flags.read
        };
        if ok {
            Ok(())
        } else {
            Err(KernelError::InvalidArgument)
        }
    }
}

impl Default for AddressSpace {
    fn default() -> Self {
        Self::new()
    }
}
