//! Per-chip register files.
//!
//! Each chip declares its register set as a static table of named
//! definitions; the engine instantiates one owned [`RegisterFile`] per board.
//! The names drive the save-state field order, so they are part of a chip's
//! stable interface — renaming one is a format change.

/// Width of a single register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegWidth {
    Byte,
    Word,
}

impl RegWidth {
    fn mask(self) -> u16 {
        match self {
            RegWidth::Byte => 0x00FF,
            RegWidth::Word => 0xFFFF,
        }
    }
}

/// Static description of one register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterDef {
    /// Save-state field name, namespaced by chip (e.g. `"mmc3.bank.r0"`).
    pub name: &'static str,
    pub width: RegWidth,
    /// Value the register holds at power-on before any chip adjustment.
    pub power_on: u16,
}

impl RegisterDef {
    pub const fn byte(name: &'static str, power_on: u8) -> Self {
        Self {
            name,
            width: RegWidth::Byte,
            power_on: power_on as u16,
        }
    }

    pub const fn word(name: &'static str, power_on: u16) -> Self {
        Self {
            name,
            width: RegWidth::Word,
            power_on,
        }
    }
}

/// Owned, per-instance register values. Mutated only by the decode/dispatch
/// path; the sync step reads it but never writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterFile {
    defs: &'static [RegisterDef],
    values: Box<[u16]>,
}

impl RegisterFile {
    pub fn new(defs: &'static [RegisterDef]) -> Self {
        let values = defs.iter().map(|d| d.power_on & d.width.mask()).collect();
        Self { defs, values }
    }

    pub fn reset_to_power_on(&mut self) {
        for (value, def) in self.values.iter_mut().zip(self.defs) {
            *value = def.power_on & def.width.mask();
        }
    }

    pub fn defs(&self) -> &'static [RegisterDef] {
        self.defs
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> u16 {
        self.values[index]
    }

    pub fn get8(&self, index: usize) -> u8 {
        self.values[index] as u8
    }

    pub fn set(&mut self, index: usize, value: u16) {
        self.values[index] = value & self.defs[index].width.mask();
    }

    /// Iterate `(def, value)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static RegisterDef, u16)> + '_ {
        self.defs.iter().zip(self.values.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static DEFS: &[RegisterDef] = &[
        RegisterDef::byte("t.ctrl", 0x0C),
        RegisterDef::word("t.page", 0x1FF),
    ];

    #[test]
    fn power_on_values_applied_and_masked() {
        let r = RegisterFile::new(DEFS);
        assert_eq!(r.get(0), 0x0C);
        assert_eq!(r.get(1), 0x1FF);
    }

    #[test]
    fn byte_registers_truncate_writes() {
        let mut r = RegisterFile::new(DEFS);
        r.set(0, 0x1234);
        assert_eq!(r.get(0), 0x34);
        r.set(1, 0x1234);
        assert_eq!(r.get(1), 0x1234);
    }

    #[test]
    fn files_compare_by_contents() {
        let a = RegisterFile::new(DEFS);
        let mut b = RegisterFile::new(DEFS);
        assert_eq!(a, b);
        b.set(0, 0x55);
        assert_ne!(a, b);
    }

    #[test]
    fn reset_restores_power_on_state() {
        let mut r = RegisterFile::new(DEFS);
        r.set(0, 0xFF);
        r.reset_to_power_on();
        assert_eq!(r.get(0), 0x0C);
    }
}
