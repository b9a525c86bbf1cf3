//! Arithmetic, logic and flag updates.

use super::flags::{StatusFlags, NZ_MASK, TABLE_NZ};
use super::link::CpuLink;
use super::microcode::{ImpOp, ReadOp, RmwOp};
use super::Mos6502;

/// Bits XAA forces into `A` before masking; varies between real chips.
pub const XAA_MAGIC: u8 = 0xEE;
/// Bits LXA forces into `A` before masking; varies between real chips.
pub const LXA_MAGIC: u8 = 0xFF;

impl<L: CpuLink> Mos6502<L> {
    pub(super) fn set_nz(&mut self, value: u8) {
        self.p = StatusFlags::from_bits_retain(
            (self.p.bits() & !NZ_MASK) | TABLE_NZ[usize::from(value)],
        );
    }

    fn carry(&self) -> u8 {
        u8::from(self.p.contains(StatusFlags::C))
    }

    fn decimal_active(&self) -> bool {
        self.bcd_enabled && self.p.contains(StatusFlags::D)
    }

    fn adc(&mut self, value: u8) {
        if self.decimal_active() {
            self.adc_decimal(value);
        } else {
            self.adc_binary(value);
        }
    }

    fn adc_binary(&mut self, value: u8) {
        let a = self.a;
        let sum = u16::from(a) + u16::from(value) + u16::from(self.carry());
        let result = sum as u8;
        self.p
            .set(StatusFlags::V, (!(a ^ value) & (a ^ result) & 0x80) != 0);
        self.p.set(StatusFlags::C, sum > 0xFF);
        self.a = result;
        self.set_nz(result);
    }

    // NMOS decimal mode: N and V come from the half-adjusted sum, Z from the binary sum.
    fn adc_decimal(&mut self, value: u8) {
        let a = i32::from(self.a);
        let v = i32::from(value);
        let c = i32::from(self.carry());
        let mut low = (a & 0x0F) + (v & 0x0F) + c;
        if low >= 0x0A {
            low = ((low + 0x06) & 0x0F) + 0x10;
        }
        let mut sum = (a & 0xF0) + (v & 0xF0) + low;
        self.p.set(StatusFlags::Z, (a + v + c) & 0xFF == 0);
        self.p.set(StatusFlags::N, sum & 0x80 != 0);
        self.p
            .set(StatusFlags::V, ((a ^ sum) & !(a ^ v) & 0x80) != 0);
        if sum >= 0xA0 {
            sum += 0x60;
        }
        self.p.set(StatusFlags::C, sum >= 0x100);
        self.a = sum as u8;
    }

    fn sbc(&mut self, value: u8) {
        if !self.decimal_active() {
            self.adc_binary(!value);
            return;
        }
        // Flags are those of the binary subtraction; only A is decimal-adjusted.
        let a = i32::from(self.a);
        let v = i32::from(value);
        let borrow = 1 - i32::from(self.carry());
        let mut low = (a & 0x0F) - (v & 0x0F) - borrow;
        if low < 0 {
            low = ((low - 0x06) & 0x0F) - 0x10;
        }
        let mut result = (a & 0xF0) - (v & 0xF0) + low;
        if result < 0 {
            result -= 0x60;
        }
        self.adc_binary(!value);
        self.a = result as u8;
    }

    fn compare(&mut self, register: u8, value: u8) {
        self.p.set(StatusFlags::C, register >= value);
        self.set_nz(register.wrapping_sub(value));
    }

    fn bit(&mut self, value: u8) {
        self.p.set(StatusFlags::Z, self.a & value == 0);
        self.p.set(StatusFlags::N, value & 0x80 != 0);
        self.p.set(StatusFlags::V, value & 0x40 != 0);
    }

    fn asl(&mut self, value: u8) -> u8 {
        self.p.set(StatusFlags::C, value & 0x80 != 0);
        let result = value << 1;
        self.set_nz(result);
        result
    }

    fn lsr(&mut self, value: u8) -> u8 {
        self.p.set(StatusFlags::C, value & 0x01 != 0);
        let result = value >> 1;
        self.set_nz(result);
        result
    }

    fn rol(&mut self, value: u8) -> u8 {
        let result = (value << 1) | self.carry();
        self.p.set(StatusFlags::C, value & 0x80 != 0);
        self.set_nz(result);
        result
    }

    fn ror(&mut self, value: u8) -> u8 {
        let result = (value >> 1) | (self.carry() << 7);
        self.p.set(StatusFlags::C, value & 0x01 != 0);
        self.set_nz(result);
        result
    }

    fn arr(&mut self, value: u8) {
        let t = self.a & value;
        let carry_in = self.carry();
        let mut result = (t >> 1) | (carry_in << 7);
        if self.decimal_active() {
            self.p.set(StatusFlags::N, carry_in != 0);
            self.p.set(StatusFlags::Z, result == 0);
            self.p.set(StatusFlags::V, (t ^ result) & 0x40 != 0);
            if (t & 0x0F) + (t & 0x01) > 0x05 {
                result = (result & 0xF0) | (result.wrapping_add(0x06) & 0x0F);
            }
            let high_adjust = u16::from(t & 0xF0) + u16::from(t & 0x10) > 0x50;
            if high_adjust {
                result = result.wrapping_add(0x60);
            }
            self.p.set(StatusFlags::C, high_adjust);
        } else {
            self.set_nz(result);
            self.p.set(StatusFlags::C, result & 0x40 != 0);
            self.p
                .set(StatusFlags::V, ((result >> 6) ^ (result >> 5)) & 0x01 != 0);
        }
        self.a = result;
    }

    pub(super) fn apply_read(&mut self, op: ReadOp, value: u8) {
        match op {
            ReadOp::Ora => {
                self.a |= value;
                self.set_nz(self.a);
            }
            ReadOp::And => {
                self.a &= value;
                self.set_nz(self.a);
            }
            ReadOp::Eor => {
                self.a ^= value;
                self.set_nz(self.a);
            }
            ReadOp::Adc => self.adc(value),
            ReadOp::Sbc => self.sbc(value),
            ReadOp::Cmp => self.compare(self.a, value),
            ReadOp::Cpx => self.compare(self.x, value),
            ReadOp::Cpy => self.compare(self.y, value),
            ReadOp::Bit => self.bit(value),
            ReadOp::Lda => {
                self.a = value;
                self.set_nz(value);
            }
            ReadOp::Ldx => {
                self.x = value;
                self.set_nz(value);
            }
            ReadOp::Ldy => {
                self.y = value;
                self.set_nz(value);
            }
            ReadOp::Lax => {
                self.a = value;
                self.x = value;
                self.set_nz(value);
            }
            ReadOp::Las => {
                let result = value & self.s;
                self.a = result;
                self.x = result;
                self.s = result;
                self.set_nz(result);
            }
            ReadOp::Nop => {}
            ReadOp::Anc => {
                self.a &= value;
                self.set_nz(self.a);
                self.p
                    .set(StatusFlags::C, self.p.contains(StatusFlags::N));
            }
            ReadOp::Alr => {
                let masked = self.a & value;
                self.a = self.lsr(masked);
            }
            ReadOp::Arr => self.arr(value),
            ReadOp::Sbx => {
                let masked = self.a & self.x;
                self.p.set(StatusFlags::C, masked >= value);
                self.x = masked.wrapping_sub(value);
                self.set_nz(self.x);
            }
            ReadOp::Xaa => {
                self.a = (self.a | XAA_MAGIC) & self.x & value;
                self.set_nz(self.a);
            }
            ReadOp::Lxa => {
                let result = (self.a | LXA_MAGIC) & value;
                self.a = result;
                self.x = result;
                self.set_nz(result);
            }
        }
    }

    pub(super) fn apply_rmw(&mut self, op: RmwOp, value: u8) -> u8 {
        match op {
            RmwOp::Asl => self.asl(value),
            RmwOp::Lsr => self.lsr(value),
            RmwOp::Rol => self.rol(value),
            RmwOp::Ror => self.ror(value),
            RmwOp::Inc => {
                let result = value.wrapping_add(1);
                self.set_nz(result);
                result
            }
            RmwOp::Dec => {
                let result = value.wrapping_sub(1);
                self.set_nz(result);
                result
            }
            RmwOp::Slo => {
                let result = self.asl(value);
                self.a |= result;
                self.set_nz(self.a);
                result
            }
            RmwOp::Rla => {
                let result = self.rol(value);
                self.a &= result;
                self.set_nz(self.a);
                result
            }
            RmwOp::Sre => {
                let result = self.lsr(value);
                self.a ^= result;
                self.set_nz(self.a);
                result
            }
            RmwOp::Rra => {
                let result = self.ror(value);
                self.adc(result);
                result
            }
            RmwOp::Dcp => {
                let result = value.wrapping_sub(1);
                self.compare(self.a, result);
                result
            }
            RmwOp::Isc => {
                let result = value.wrapping_add(1);
                self.sbc(result);
                result
            }
        }
    }

    pub(super) fn apply_imp(&mut self, op: ImpOp) {
        match op {
            ImpOp::Nop => {}
            ImpOp::Tax => {
                self.x = self.a;
                self.set_nz(self.x);
            }
            ImpOp::Tay => {
                self.y = self.a;
                self.set_nz(self.y);
            }
            ImpOp::Txa => {
                self.a = self.x;
                self.set_nz(self.a);
            }
            ImpOp::Tya => {
                self.a = self.y;
                self.set_nz(self.a);
            }
            ImpOp::Tsx => {
                self.x = self.s;
                self.set_nz(self.x);
            }
            ImpOp::Txs => self.s = self.x,
            ImpOp::Inx => {
                self.x = self.x.wrapping_add(1);
                self.set_nz(self.x);
            }
            ImpOp::Iny => {
                self.y = self.y.wrapping_add(1);
                self.set_nz(self.y);
            }
            ImpOp::Dex => {
                self.x = self.x.wrapping_sub(1);
                self.set_nz(self.x);
            }
            ImpOp::Dey => {
                self.y = self.y.wrapping_sub(1);
                self.set_nz(self.y);
            }
            ImpOp::Clc => self.p.remove(StatusFlags::C),
            ImpOp::Sec => self.p.insert(StatusFlags::C),
            // I itself changes at the next opcode fetch, one instruction late.
            ImpOp::Cli => self.iflag_pending = false,
            ImpOp::Sei => self.iflag_pending = true,
            ImpOp::Cld => self.p.remove(StatusFlags::D),
            ImpOp::Sed => self.p.insert(StatusFlags::D),
            ImpOp::Clv => self.p.remove(StatusFlags::V),
            ImpOp::AslA => self.a = self.asl(self.a),
            ImpOp::LsrA => self.a = self.lsr(self.a),
            ImpOp::RolA => self.a = self.rol(self.a),
            ImpOp::RorA => self.a = self.ror(self.a),
        }
    }
}
