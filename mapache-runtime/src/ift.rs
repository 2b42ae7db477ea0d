//! # Information Flow Tracking
//!
//! Shadow memory holding a taint field for every 32-bit data word.
//!
//! The upper part of the data region and the lower part of the stack region
//! are carved off as shadow space. With a ratio of `r`, one shadow word
//! covers `r` program words and each program word owns a `32 / r` bit field:
//!
//! ```text
//!   data_base        data_shadow        main_end
//!   |  program data  |  data shadow     |
//!
//!   stack_base       stack_floor        stack_top
//!   |  stack shadow  |  program stack   |
//! ```
//!
//! Stack words are indexed downward from the top so the shadow grows with
//! the stack.

use mapache_spec::{DefinitionError, MemoryLayout};

use crate::error::{Result, RuntimeError};
use crate::memory::Memory;

const WORD: u64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowLayout {
    ratio: u32,
    data_base: u64,
    data_shadow: u64,
    main_end: u64,
    stack_base: u64,
    stack_floor: u64,
    stack_top: u64,
}

/// Bytes of a region of `size` bytes left to the program
fn program_share(size: u64, ratio: u32) -> u64 {
    let r = ratio as u128;
    (size as u128 * r / (r + 1)) as u64
}

impl ShadowLayout {
    /// Carve shadow space out of `layout` for `ratio` words per shadow word
    pub fn new(ratio: u32, layout: &MemoryLayout) -> std::result::Result<Self, DefinitionError> {
        if ratio == 0 || ratio > 32 || 32 % ratio != 0 {
            return Err(DefinitionError::IftRatio(ratio));
        }
        if layout.data_base % WORD != 0 {
            return Err(DefinitionError::Layout(format!(
                "data base {:#x} is not word aligned",
                layout.data_base
            )));
        }

        let main_end = layout.main_end();
        let data = program_share(main_end - layout.data_base, ratio);
        let data_shadow = (layout.data_base + data) & !(WORD - 1);

        // keep a whole number of words so the shadow below covers every one
        let stack_top = layout.stack_top();
        let stack = program_share(layout.stack_size, ratio) & !(WORD - 1);
        let stack_floor = stack_top - stack;

        Ok(Self {
            ratio,
            data_base: layout.data_base,
            data_shadow,
            main_end,
            stack_base: layout.stack_base,
            stack_floor,
            stack_top,
        })
    }

    pub fn ratio(&self) -> u32 {
        self.ratio
    }

    /// Taint bits per program word
    pub fn field_width(&self) -> u32 {
        32 / self.ratio
    }

    /// Program-visible data range `[data_base, data_shadow)`
    pub fn data_range(&self) -> std::ops::Range<u64> {
        self.data_base..self.data_shadow
    }

    /// Program-visible stack range `[stack_floor, stack_top)`
    pub fn stack_range(&self) -> std::ops::Range<u64> {
        self.stack_floor..self.stack_top
    }

    fn is_reserved(&self, addr: u64) -> bool {
        (self.data_shadow..self.main_end).contains(&addr)
            || (self.stack_base..self.stack_floor).contains(&addr)
    }

    /// Fail if any byte of `[start, start + len)` lies in shadow space
    pub fn check_range(&self, start: u64, len: u64) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        let end = start.saturating_add(len);
        for (lo, hi) in [
            (self.data_shadow, self.main_end),
            (self.stack_base, self.stack_floor),
        ] {
            if start < hi && lo < end {
                return Err(RuntimeError::ReservedIft {
                    address: start.max(lo),
                });
            }
        }
        Ok(())
    }

    /// Fail unless `addr` is program-visible tracked memory
    pub fn check_access(&self, addr: u64) -> Result<()> {
        self.locate(addr).map(|_| ())
    }

    /// Shadow base and word index of a tracked address
    fn locate(&self, addr: u64) -> Result<(u64, u64)> {
        if self.is_reserved(addr) {
            return Err(RuntimeError::ReservedIft { address: addr });
        }
        if self.data_range().contains(&addr) {
            Ok((self.data_shadow, (addr - self.data_base) / WORD))
        } else if self.stack_range().contains(&addr) {
            Ok((self.stack_base, (self.stack_top - 1 - addr) / WORD))
        } else {
            Err(RuntimeError::UntrackedAddress { address: addr })
        }
    }

    /// Address of the shadow word holding the taint of `addr`
    pub fn ift_addr(&self, addr: u64) -> Result<u64> {
        let (base, index) = self.locate(addr)?;
        Ok(base + WORD * (index / self.ratio as u64))
    }

    /// Lowest bit of `addr`'s field within its shadow word
    pub fn ift_bit(&self, addr: u64) -> Result<u32> {
        let (_, index) = self.locate(addr)?;
        Ok((index % self.ratio as u64) as u32 * self.field_width())
    }

    fn field_mask(&self) -> u32 {
        if self.field_width() == 32 {
            u32::MAX
        } else {
            (1 << self.field_width()) - 1
        }
    }

    /// Taint of the word containing `addr`
    pub fn ift_load(&self, memory: &Memory, addr: u64) -> Result<u64> {
        let shadow = self.ift_addr(addr)?;
        let bit = self.ift_bit(addr)?;
        let word = memory.read_u32(shadow)?;
        Ok(((word >> bit) & self.field_mask()) as u64)
    }

    /// Set the taint of the word containing `addr`, leaving its neighbours alone
    pub fn ift_store(&self, memory: &mut Memory, addr: u64, taint: u64) -> Result<()> {
        if taint > self.field_mask() as u64 {
            return Err(RuntimeError::TaintWidth {
                taint,
                width: self.field_width(),
            });
        }
        let shadow = self.ift_addr(addr)?;
        let bit = self.ift_bit(addr)?;
        let word = memory.read_u32(shadow)?;
        let cleared = word & !(self.field_mask() << bit);
        memory.write_u32(shadow, cleared | ((taint as u32) << bit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapache_spec::Endian;

    fn small() -> MemoryLayout {
        MemoryLayout {
            text_base: 0,
            data_base: 0x1000,
            main_size: 0x2000,
            stack_base: 0x8000,
            stack_size: 0x1000,
        }
    }

    fn memory(layout: &MemoryLayout) -> Memory {
        let mut mem = Memory::new(Endian::Big);
        mem.map(layout.text_base, layout.main_size).unwrap();
        mem.map(layout.stack_base, layout.stack_size).unwrap();
        mem
    }

    #[test]
    fn test_rejects_bad_ratio() {
        for ratio in [0, 3, 5, 64] {
            assert_eq!(
                ShadowLayout::new(ratio, &small()).unwrap_err(),
                DefinitionError::IftRatio(ratio)
            );
        }
    }

    #[test]
    fn test_regions_ratio_one() {
        let shadow = ShadowLayout::new(1, &small()).unwrap();
        assert_eq!(shadow.field_width(), 32);
        assert_eq!(shadow.data_range(), 0x1000..0x1800);
        assert_eq!(shadow.stack_range(), 0x8800..0x9000);
        assert_eq!(shadow.ift_addr(0x1000).unwrap(), 0x1800);
        assert_eq!(shadow.ift_addr(0x1004).unwrap(), 0x1804);
        assert_eq!(shadow.ift_addr(0x8ffc).unwrap(), 0x8000);
        assert_eq!(shadow.ift_addr(0x8ff8).unwrap(), 0x8004);
        assert_eq!(shadow.ift_bit(0x1004).unwrap(), 0);
    }

    #[test]
    fn test_regions_ratio_thirty_two() {
        let shadow = ShadowLayout::new(32, &small()).unwrap();
        assert_eq!(shadow.field_width(), 1);
        assert_eq!(shadow.data_range(), 0x1000..0x1f80);
        assert_eq!(shadow.stack_range(), 0x8080..0x9000);
        assert_eq!(shadow.ift_addr(0x1000 + 4 * 33).unwrap(), 0x1f84);
        assert_eq!(shadow.ift_bit(0x1000 + 4 * 33).unwrap(), 1);
        assert_eq!(shadow.ift_bit(0x1002).unwrap(), 0);
    }

    #[test]
    fn test_shadow_covers_every_word() {
        let layout = MemoryLayout::DEFAULT;
        for ratio in [1, 2, 4, 8, 16, 32] {
            let shadow = ShadowLayout::new(ratio, &layout).unwrap();
            let last_data = shadow.data_range().end - 1;
            assert!(shadow.ift_addr(last_data).unwrap() + 4 <= layout.main_end());
            let lowest_stack = shadow.stack_range().start;
            assert!(shadow.ift_addr(lowest_stack).unwrap() + 4 <= lowest_stack);
        }
    }

    #[test]
    fn test_check_access() {
        let shadow = ShadowLayout::new(32, &small()).unwrap();
        assert!(shadow.check_access(0x1000).is_ok());
        assert!(shadow.check_access(0x8ffc).is_ok());
        assert_eq!(
            shadow.check_access(0x1f80).unwrap_err(),
            RuntimeError::ReservedIft { address: 0x1f80 }
        );
        assert_eq!(
            shadow.check_access(0x8000).unwrap_err(),
            RuntimeError::ReservedIft { address: 0x8000 }
        );
        assert_eq!(
            shadow.check_access(0x10).unwrap_err(),
            RuntimeError::UntrackedAddress { address: 0x10 }
        );
    }

    #[test]
    fn test_check_range() {
        let shadow = ShadowLayout::new(32, &small()).unwrap();
        assert!(shadow.check_range(0x1000, 0xf80).is_ok());
        assert!(shadow.check_range(0x1f80, 0).is_ok());
        assert!(shadow.check_range(0x8080, 0xf80).is_ok());
        assert_eq!(
            shadow.check_range(0x1f00, 0x81).unwrap_err(),
            RuntimeError::ReservedIft { address: 0x1f80 }
        );
        assert_eq!(
            shadow.check_range(0x7000, 0x1004).unwrap_err(),
            RuntimeError::ReservedIft { address: 0x8000 }
        );
        assert_eq!(
            shadow.check_range(0x1f84, u64::MAX).unwrap_err(),
            RuntimeError::ReservedIft { address: 0x1f84 }
        );
    }

    #[test]
    fn test_store_load_isolated_fields() {
        let layout = small();
        let mut mem = memory(&layout);
        let shadow = ShadowLayout::new(8, &layout).unwrap();
        assert_eq!(shadow.field_width(), 4);

        shadow.ift_store(&mut mem, 0x1000, 0xf).unwrap();
        shadow.ift_store(&mut mem, 0x1004, 0x5).unwrap();
        assert_eq!(shadow.ift_load(&mem, 0x1000).unwrap(), 0xf);
        assert_eq!(shadow.ift_load(&mem, 0x1004).unwrap(), 0x5);
        assert_eq!(shadow.ift_load(&mem, 0x1008).unwrap(), 0);

        shadow.ift_store(&mut mem, 0x1000, 0x2).unwrap();
        assert_eq!(shadow.ift_load(&mem, 0x1000).unwrap(), 0x2);
        assert_eq!(shadow.ift_load(&mem, 0x1004).unwrap(), 0x5);
    }

    #[test]
    fn test_store_rejects_wide_taint() {
        let layout = small();
        let mut mem = memory(&layout);
        let shadow = ShadowLayout::new(32, &layout).unwrap();
        assert_eq!(
            shadow.ift_store(&mut mem, 0x1000, 2).unwrap_err(),
            RuntimeError::TaintWidth { taint: 2, width: 1 }
        );
    }

    #[test]
    fn test_full_word_taint() {
        let layout = small();
        let mut mem = memory(&layout);
        let shadow = ShadowLayout::new(1, &layout).unwrap();
        shadow.ift_store(&mut mem, 0x8ffc, 0xffff_ffff).unwrap();
        assert_eq!(shadow.ift_load(&mem, 0x8ffc).unwrap(), 0xffff_ffff);
        assert_eq!(mem.read_u32(0x8000).unwrap(), u32::MAX);
    }
}
