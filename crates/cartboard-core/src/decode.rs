//! Bus decode rules.
//!
//! Real boards rarely decode contiguous ranges; they compare a handful of
//! address lines, so a register can be reachable through many mirrored
//! addresses (`A & 0xF003 == 0x9000` style). A [`DecodeRule`] captures one
//! such comparison; the rule's position in the chip's static table is the id
//! handed back to the chip on a qualifying write.

use crate::error::LoadError;
use crate::memory::cpu;

/// One bitmask-and-compare decode term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeRule {
    pub mask: u16,
    pub value: u16,
}

impl DecodeRule {
    pub const fn new(mask: u16, value: u16) -> Self {
        Self { mask, value }
    }

    #[inline]
    pub fn matches(self, addr: u16) -> bool {
        addr & self.mask == self.value
    }
}

/// A chip's complete decode table.
#[derive(Debug, Clone, Copy)]
pub struct DecodeTable {
    rules: &'static [DecodeRule],
}

impl DecodeTable {
    pub fn new(rules: &'static [DecodeRule]) -> Self {
        Self { rules }
    }

    /// First rule matching `addr`, if any. With a verified table this is also
    /// the only matching rule.
    pub fn lookup(&self, addr: u16) -> Option<usize> {
        self.rules.iter().position(|r| r.matches(addr))
    }

    /// Prove that no two rules overlap anywhere in the cartridge-claimed
    /// address range. Runs once at attach time; a brute scan of 48 KiB of
    /// addresses is cheaper than getting the bit algebra wrong.
    pub fn verify_exclusive(&self) -> Result<(), LoadError> {
        for addr in cpu::CART_SPACE_START..=cpu::PRG_ROM_END {
            let mut first_hit = None;
            for (index, rule) in self.rules.iter().enumerate() {
                if !rule.matches(addr) {
                    continue;
                }
                match first_hit {
                    None => first_hit = Some(index),
                    Some(first) => {
                        return Err(LoadError::AmbiguousDecode {
                            addr,
                            first,
                            second: index,
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
