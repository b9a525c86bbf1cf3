//! Named register access for debuggers.

use std::collections::BTreeMap;

use super::flags::StatusFlags;
use super::link::CpuLink;
use super::Mos6502;
use crate::api::RegisterValue;
use crate::error::{Capability, CoreError, Result};

const FLAG_NAMES: [(&str, StatusFlags); 8] = [
    ("Flag C", StatusFlags::C),
    ("Flag Z", StatusFlags::Z),
    ("Flag I", StatusFlags::I),
    ("Flag D", StatusFlags::D),
    ("Flag B", StatusFlags::B),
    ("Flag T", StatusFlags::T),
    ("Flag V", StatusFlags::V),
    ("Flag N", StatusFlags::N),
];

/// Core name reported in capability errors.
pub const CORE_NAME: &str = "6502";

impl<L: CpuLink> Mos6502<L> {
    /// Every register and flag by name, with its width.
    #[must_use]
    pub fn registers(&self) -> BTreeMap<String, RegisterValue> {
        let mut map = BTreeMap::new();
        map.insert("A".to_owned(), RegisterValue::byte(self.a));
        map.insert("X".to_owned(), RegisterValue::byte(self.x));
        map.insert("Y".to_owned(), RegisterValue::byte(self.y));
        map.insert("S".to_owned(), RegisterValue::byte(self.s));
        map.insert("P".to_owned(), RegisterValue::byte(self.p.bits()));
        map.insert("PC".to_owned(), RegisterValue::word(self.pc));
        for (name, flag) in FLAG_NAMES {
            map.insert(name.to_owned(), RegisterValue::flag(self.p.contains(flag)));
        }
        map
    }

    /// Writes one register or flag by name; values are truncated to the register width.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnsupportedCapability`] for an unknown name.
    pub fn set_register(&mut self, name: &str, value: u32) -> Result<()> {
        let byte = value as u8;
        match name {
            "A" => self.a = byte,
            "X" => self.x = byte,
            "Y" => self.y = byte,
            "S" => self.s = byte,
            "PC" => self.pc = value as u16,
            "P" => self.set_p(StatusFlags::from_bits_retain(byte)),
            _ => {
                let Some((_, flag)) = FLAG_NAMES.iter().find(|(flag_name, _)| *flag_name == name) else {
                    return Err(CoreError::unsupported(
                        CORE_NAME,
                        Capability::Register(name.to_owned()),
                    ));
                };
                let mut p = self.p;
                p.set(*flag, value != 0);
                self.set_p(p);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::cpu::{FlatMemory, Mos6502, StatusFlags};
    use crate::error::ErrorKind;

    #[test]
    fn register_map_lists_registers_and_flags() {
        let cpu = Mos6502::new(FlatMemory::new());
        let registers = cpu.registers();
        assert_eq!(registers.len(), 14);
        assert_eq!(registers["PC"].bit_width, 16);
        assert_eq!(registers["Flag T"].value, 1);
        assert_eq!(registers["Flag C"].value, 0);
    }

    #[test]
    fn set_register_truncates_and_updates_flags() {
        let mut cpu = Mos6502::new(FlatMemory::new());
        cpu.set_register("A", 0x1FF).expect("known");
        assert_eq!(cpu.a(), 0xFF);
        cpu.set_register("PC", 0x1_C000).expect("known");
        assert_eq!(cpu.pc(), 0xC000);
        cpu.set_register("Flag C", 1).expect("known");
        assert!(cpu.p().contains(StatusFlags::C));
        cpu.set_register("Flag I", 0).expect("known");
        assert!(!cpu.iflag_pending());
    }

    #[test]
    fn unknown_register_is_unsupported() {
        let mut cpu = Mos6502::new(FlatMemory::new());
        let error = cpu.set_register("R7", 0).expect_err("unknown");
        assert_eq!(error.kind(), ErrorKind::UnsupportedCapability);
    }
}
