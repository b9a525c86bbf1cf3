//! Processor status register and flag lookup tables.

use bitflags::bitflags;

bitflags! {
    /// The `P` register, `NVTBDIZC` from bit 7 down.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
    pub struct StatusFlags: u8 {
        /// Carry.
        const C = 0x01;
        /// Zero.
        const Z = 0x02;
        /// IRQ disable.
        const I = 0x04;
        /// Decimal mode.
        const D = 0x08;
        /// Break; only meaningful in pushed copies.
        const B = 0x10;
        /// Unused bit, reads as one.
        const T = 0x20;
        /// Overflow.
        const V = 0x40;
        /// Negative.
        const N = 0x80;
    }
}

impl StatusFlags {
    /// `P` after power-on and reset: only `T` set.
    pub const POWER_ON: Self = Self::T;

    /// Letter rendering used in traces, uppercase when set.
    #[must_use]
    pub fn letters(self) -> String {
        const LETTERS: [(StatusFlags, char); 8] = [
            (StatusFlags::N, 'N'),
            (StatusFlags::V, 'V'),
            (StatusFlags::T, 'T'),
            (StatusFlags::B, 'B'),
            (StatusFlags::D, 'D'),
            (StatusFlags::I, 'I'),
            (StatusFlags::Z, 'Z'),
            (StatusFlags::C, 'C'),
        ];
        LETTERS
            .iter()
            .map(|(flag, letter)| {
                if self.contains(*flag) {
                    *letter
                } else {
                    letter.to_ascii_lowercase()
                }
            })
            .collect()
    }
}

const fn build_nz_table() -> [u8; 256] {
    let mut table = [0_u8; 256];
    let mut value = 0;
    while value < 256 {
        table[value] = if value == 0 {
            StatusFlags::Z.bits()
        } else if value >= 0x80 {
            StatusFlags::N.bits()
        } else {
            0
        };
        value += 1;
    }
    table
}

/// `N` and `Z` bits for every result byte.
pub static TABLE_NZ: [u8; 256] = build_nz_table();

/// Mask covering the bits [`TABLE_NZ`] produces.
pub const NZ_MASK: u8 = StatusFlags::N.bits() | StatusFlags::Z.bits();

/// Non-maskable interrupt vector.
pub const NMI_VECTOR: u16 = 0xFFFA;
/// Reset vector.
pub const RESET_VECTOR: u16 = 0xFFFC;
/// IRQ and BRK vector.
pub const IRQ_VECTOR: u16 = 0xFFFE;
