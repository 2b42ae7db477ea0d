//! # Paged Memory
//!
//! A sparse address space of 4096-byte pages. Pages exist only once `map`
//! has created them; every access must stay inside a single mapped page.
//! Multi-byte helpers use the byte order of the ISA.

use std::collections::HashMap;

use mapache_spec::{Endian, PAGE_SIZE};

use crate::error::{Result, RuntimeError};

type Page = Box<[u8; PAGE_SIZE as usize]>;

#[derive(Debug, Clone)]
pub struct Memory {
    endian: Endian,
    pages: HashMap<u64, Page>,
}

#[inline]
fn page_of(addr: u64) -> u64 {
    addr & !(PAGE_SIZE - 1)
}

impl Memory {
    pub fn new(endian: Endian) -> Self {
        Self {
            endian,
            pages: HashMap::new(),
        }
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Map `size` bytes of zeroed memory at `start`
    ///
    /// Both must be page aligned and the range must not touch a mapped page.
    /// Nothing is allocated unless the whole range can be mapped.
    pub fn map(&mut self, start: u64, size: u64) -> Result<()> {
        let bad = |reason| RuntimeError::BadMapping { start, size, reason };
        if size == 0 {
            return Err(bad("size must be positive"));
        }
        if start % PAGE_SIZE != 0 || size % PAGE_SIZE != 0 {
            return Err(bad("not page aligned"));
        }
        let end = start.checked_add(size).ok_or_else(|| bad("range wraps around"))?;

        let pages: Vec<u64> = (start..end).step_by(PAGE_SIZE as usize).collect();
        if let Some(&address) = pages.iter().find(|p| self.pages.contains_key(p)) {
            return Err(RuntimeError::AlreadyMapped { address });
        }
        for page in pages {
            self.pages.insert(page, Box::new([0; PAGE_SIZE as usize]));
        }
        Ok(())
    }

    pub fn is_mapped(&self, addr: u64) -> bool {
        self.pages.contains_key(&page_of(addr))
    }

    /// Base addresses of all mapped pages, ascending
    pub fn mapped_pages(&self) -> Vec<u64> {
        let mut pages: Vec<u64> = self.pages.keys().copied().collect();
        pages.sort_unstable();
        pages
    }

    /// Page and offset of an access, after the single-page checks
    fn locate(&self, addr: u64, size: usize) -> Result<(u64, usize)> {
        if size == 0 {
            return Err(RuntimeError::EmptyAccess { address: addr });
        }
        let page = page_of(addr);
        let offset = (addr - page) as usize;
        if offset.checked_add(size).map_or(true, |end| end > PAGE_SIZE as usize) {
            return Err(RuntimeError::CrossPage { address: addr, size });
        }
        if !self.pages.contains_key(&page) {
            return Err(RuntimeError::Unmapped { address: addr });
        }
        Ok((page, offset))
    }

    /// `size` bytes starting at `addr`
    pub fn read(&self, addr: u64, size: usize) -> Result<&[u8]> {
        let (page, offset) = self.locate(addr, size)?;
        match self.pages.get(&page) {
            Some(bytes) => Ok(&bytes[offset..offset + size]),
            None => Err(RuntimeError::Unmapped { address: addr }),
        }
    }

    pub fn write(&mut self, addr: u64, data: &[u8]) -> Result<()> {
        let (page, offset) = self.locate(addr, data.len())?;
        match self.pages.get_mut(&page) {
            Some(bytes) => {
                bytes[offset..offset + data.len()].copy_from_slice(data);
                Ok(())
            }
            None => Err(RuntimeError::Unmapped { address: addr }),
        }
    }

    /// Write a block that may span several pages, one page at a time
    pub fn load(&mut self, addr: u64, data: &[u8]) -> Result<()> {
        let mut at = addr;
        let mut rest = data;
        while !rest.is_empty() {
            let room = (PAGE_SIZE - (at - page_of(at))) as usize;
            let (chunk, tail) = rest.split_at(room.min(rest.len()));
            self.write(at, chunk)?;
            rest = tail;
            if rest.is_empty() {
                break;
            }
            at = at
                .checked_add(chunk.len() as u64)
                .ok_or(RuntimeError::Unmapped { address: at })?;
        }
        Ok(())
    }

    fn read_uint(&self, addr: u64, size: usize) -> Result<u64> {
        Ok(self.endian.read(self.read(addr, size)?))
    }

    fn write_uint(&mut self, addr: u64, value: u64, size: usize) -> Result<()> {
        let bytes = self.endian.write(value, size);
        self.write(addr, &bytes)
    }

    pub fn read_u8(&self, addr: u64) -> Result<u8> {
        Ok(self.read(addr, 1)?[0])
    }

    pub fn read_u16(&self, addr: u64) -> Result<u16> {
        Ok(self.read_uint(addr, 2)? as u16)
    }

    pub fn read_u32(&self, addr: u64) -> Result<u32> {
        Ok(self.read_uint(addr, 4)? as u32)
    }

    pub fn read_u64(&self, addr: u64) -> Result<u64> {
        self.read_uint(addr, 8)
    }

    pub fn read_i8(&self, addr: u64) -> Result<i8> {
        Ok(self.read_u8(addr)? as i8)
    }

    pub fn read_i16(&self, addr: u64) -> Result<i16> {
        Ok(self.read_u16(addr)? as i16)
    }

    pub fn read_i32(&self, addr: u64) -> Result<i32> {
        Ok(self.read_u32(addr)? as i32)
    }

    pub fn read_i64(&self, addr: u64) -> Result<i64> {
        Ok(self.read_u64(addr)? as i64)
    }

    pub fn write_u8(&mut self, addr: u64, value: u8) -> Result<()> {
        self.write(addr, &[value])
    }

    pub fn write_u16(&mut self, addr: u64, value: u16) -> Result<()> {
        self.write_uint(addr, value as u64, 2)
    }

    pub fn write_u32(&mut self, addr: u64, value: u32) -> Result<()> {
        self.write_uint(addr, value as u64, 4)
    }

    pub fn write_u64(&mut self, addr: u64, value: u64) -> Result<()> {
        self.write_uint(addr, value, 8)
    }
}
