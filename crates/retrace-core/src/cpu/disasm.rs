//! Disassembler and trace row formatting.

use super::link::CpuLink;
use super::Mos6502;
use crate::api::TraceInfo;

/// Operand shape of an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// No operand.
    Implied,
    /// Operates on `A`.
    Accumulator,
    /// `#$nn`.
    Immediate,
    /// `$nn`.
    ZeroPage,
    /// `$nn,X`.
    ZeroPageX,
    /// `$nn,Y`.
    ZeroPageY,
    /// `$nnnn`.
    Absolute,
    /// `$nnnn,X`.
    AbsoluteX,
    /// `$nnnn,Y`.
    AbsoluteY,
    /// `($nnnn)`.
    Indirect,
    /// `($nn,X)`.
    IndexedIndirect,
    /// `($nn),Y`.
    IndirectIndexed,
    /// Branch offset.
    Relative,
}

impl Mode {
    /// Instruction length including the opcode byte.
    #[must_use]
    pub const fn length(self) -> u16 {
        match self {
            Self::Implied | Self::Accumulator => 1,
            Self::Absolute | Self::AbsoluteX | Self::AbsoluteY | Self::Indirect => 3,
            _ => 2,
        }
    }
}

#[rustfmt::skip]
const MNEMONICS: [&str; 256] = [
    "BRK", "ORA", "JAM", "SLO", "NOP", "ORA", "ASL", "SLO", "PHP", "ORA", "ASL", "ANC", "NOP", "ORA", "ASL", "SLO",
    "BPL", "ORA", "JAM", "SLO", "NOP", "ORA", "ASL", "SLO", "CLC", "ORA", "NOP", "SLO", "NOP", "ORA", "ASL", "SLO",
    "JSR", "AND", "JAM", "RLA", "BIT", "AND", "ROL", "RLA", "PLP", "AND", "ROL", "ANC", "BIT", "AND", "ROL", "RLA",
    "BMI", "AND", "JAM", "RLA", "NOP", "AND", "ROL", "RLA", "SEC", "AND", "NOP", "RLA", "NOP", "AND", "ROL", "RLA",
    "RTI", "EOR", "JAM", "SRE", "NOP", "EOR", "LSR", "SRE", "PHA", "EOR", "LSR", "ALR", "JMP", "EOR", "LSR", "SRE",
    "BVC", "EOR", "JAM", "SRE", "NOP", "EOR", "LSR", "SRE", "CLI", "EOR", "NOP", "SRE", "NOP", "EOR", "LSR", "SRE",
    "RTS", "ADC", "JAM", "RRA", "NOP", "ADC", "ROR", "RRA", "PLA", "ADC", "ROR", "ARR", "JMP", "ADC", "ROR", "RRA",
    "BVS", "ADC", "JAM", "RRA", "NOP", "ADC", "ROR", "RRA", "SEI", "ADC", "NOP", "RRA", "NOP", "ADC", "ROR", "RRA",
    "NOP", "STA", "NOP", "SAX", "STY", "STA", "STX", "SAX", "DEY", "NOP", "TXA", "XAA", "STY", "STA", "STX", "SAX",
    "BCC", "STA", "JAM", "SHA", "STY", "STA", "STX", "SAX", "TYA", "STA", "TXS", "TAS", "SHY", "STA", "SHX", "SHA",
    "LDY", "LDA", "LDX", "LAX", "LDY", "LDA", "LDX", "LAX", "TAY", "LDA", "TAX", "LXA", "LDY", "LDA", "LDX", "LAX",
    "BCS", "LDA", "JAM", "LAX", "LDY", "LDA", "LDX", "LAX", "CLV", "LDA", "TSX", "LAS", "LDY", "LDA", "LDX", "LAX",
    "CPY", "CMP", "NOP", "DCP", "CPY", "CMP", "DEC", "DCP", "INY", "CMP", "DEX", "SBX", "CPY", "CMP", "DEC", "DCP",
    "BNE", "CMP", "JAM", "DCP", "NOP", "CMP", "DEC", "DCP", "CLD", "CMP", "NOP", "DCP", "NOP", "CMP", "DEC", "DCP",
    "CPX", "SBC", "NOP", "ISC", "CPX", "SBC", "INC", "ISC", "INX", "SBC", "NOP", "SBC", "CPX", "SBC", "INC", "ISC",
    "BEQ", "SBC", "JAM", "ISC", "NOP", "SBC", "INC", "ISC", "SED", "SBC", "NOP", "ISC", "NOP", "SBC", "INC", "ISC",
];

/// Addressing mode of `opcode`, derived from the regular layout of the opcode matrix.
#[must_use]
pub const fn mode(opcode: u8) -> Mode {
    let row = opcode >> 4;
    let odd_row = row & 1 == 1;
    match opcode & 0x0F {
        0x00 => match opcode {
            0x20 => Mode::Absolute,
            0x00 | 0x40 | 0x60 => Mode::Implied,
            _ if odd_row => Mode::Relative,
            _ => Mode::Immediate,
        },
        0x01 | 0x03 => {
            if odd_row {
                Mode::IndirectIndexed
            } else {
                Mode::IndexedIndirect
            }
        }
        0x02 => match opcode {
            0x82 | 0xA2 | 0xC2 | 0xE2 => Mode::Immediate,
            _ => Mode::Implied,
        },
        0x04 | 0x05 | 0x06 | 0x07 => match opcode {
            0x96 | 0x97 | 0xB6 | 0xB7 => Mode::ZeroPageY,
            _ if odd_row => Mode::ZeroPageX,
            _ => Mode::ZeroPage,
        },
        0x08 => Mode::Implied,
        0x09 | 0x0B => {
            if odd_row {
                Mode::AbsoluteY
            } else {
                Mode::Immediate
            }
        }
        0x0A => match opcode {
            0x0A | 0x2A | 0x4A | 0x6A => Mode::Accumulator,
            _ => Mode::Implied,
        },
        0x0C => match opcode {
            0x6C => Mode::Indirect,
            _ if odd_row => Mode::AbsoluteX,
            _ => Mode::Absolute,
        },
        _ => match opcode {
            0x9E | 0x9F | 0xBE | 0xBF => Mode::AbsoluteY,
            _ if odd_row => Mode::AbsoluteX,
            _ => Mode::Absolute,
        },
    }
}

/// Mnemonic of `opcode`, undocumented opcodes included.
#[must_use]
pub const fn mnemonic(opcode: u8) -> &'static str {
    MNEMONICS[opcode as usize]
}

/// Disassembles the instruction at `pc`, returning the text and its length in bytes.
pub fn disassemble(pc: u16, peek: impl Fn(u16) -> u8) -> (String, u16) {
    let opcode = peek(pc);
    let mode = mode(opcode);
    let lo = peek(pc.wrapping_add(1));
    let hi = peek(pc.wrapping_add(2));
    let word = u16::from_le_bytes([lo, hi]);
    let name = mnemonic(opcode);
    let text = match mode {
        Mode::Implied => name.to_owned(),
        Mode::Accumulator => format!("{name} A"),
        Mode::Immediate => format!("{name} #${lo:02X}"),
        Mode::ZeroPage => format!("{name} ${lo:02X}"),
        Mode::ZeroPageX => format!("{name} ${lo:02X},X"),
        Mode::ZeroPageY => format!("{name} ${lo:02X},Y"),
        Mode::Absolute => format!("{name} ${word:04X}"),
        Mode::AbsoluteX => format!("{name} ${word:04X},X"),
        Mode::AbsoluteY => format!("{name} ${word:04X},Y"),
        Mode::Indirect => format!("{name} (${word:04X})"),
        Mode::IndexedIndirect => format!("{name} (${lo:02X},X)"),
        Mode::IndirectIndexed => format!("{name} (${lo:02X}),Y"),
        Mode::Relative => {
            let target = pc.wrapping_add(2).wrapping_add(lo as i8 as u16);
            format!("{name} ${target:04X}")
        }
    };
    (text, mode.length())
}

impl<L: CpuLink> Mos6502<L> {
    /// Disassembles the instruction at `pc` using side-effect free reads.
    #[must_use]
    pub fn disassemble(&self, pc: u16) -> (String, u16) {
        disassemble(pc, |addr| self.link.peek_memory(addr))
    }

    /// Trace row for the instruction about to execute at `PC`.
    #[must_use]
    pub fn trace_state(&self) -> TraceInfo {
        let (text, length) = self.disassemble(self.pc);
        let raw: Vec<String> = (0..length)
            .map(|offset| format!("{:02X}", self.link.peek_memory(self.pc.wrapping_add(offset))))
            .collect();
        let disassembly = format!("{:04X}:  {:<9} {}", self.pc, raw.join(" "), text);
        let register_info = [
            format!("A:{:02X}", self.a),
            format!("X:{:02X}", self.x),
            format!("Y:{:02X}", self.y),
            format!("SP:{:02X}", self.s),
            format!("P:{:02X}", self.p.bits()),
            self.p.letters(),
            format!("Cy:{}", self.total_executed_cycles),
            format!("PPU-Cy:{}", self.ext_ppu_cycle),
        ]
        .join("  ");
        TraceInfo {
            disassembly: format!("{disassembly:<32}"),
            register_info,
        }
    }
}
