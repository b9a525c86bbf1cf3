//! One-cycle micro-op dispatch.

use super::flags::{StatusFlags, IRQ_VECTOR, NMI_VECTOR, RESET_VECTOR};
use super::link::CpuLink;
use super::microcode::{
    Index, Uop, WriteOp, VOP_BRANCH_PAGE_FIX, VOP_BRANCH_TAKEN, VOP_FETCH1,
    VOP_FETCH1_NO_INTERRUPT, VOP_IRQ, VOP_NMI,
};
use super::{page_wrap_successor, Mos6502};

impl<L: CpuLink> Mos6502<L> {
    /// Runs the micro-op at `(opcode, mi)`. Read cycles stall while `RDY` is low.
    pub(super) fn execute_uop(&mut self) {
        let uop = self.current_uop();
        if uop.is_read_cycle() && !self.rdy {
            self.rdy_freeze = true;
            return;
        }

        match uop {
            Uop::Fetch1 => self.fetch1(),
            Uop::Fetch1Real => self.fetch1_real(),
            Uop::Fetch2 => self.opcode2 = self.read_pc_inc(),
            Uop::FetchZp => {
                self.opcode2 = self.read_pc_inc();
                self.ea = u16::from(self.opcode2);
            }
            Uop::FetchAbsHi => {
                self.opcode3 = self.read_pc_inc();
                self.ea = u16::from_le_bytes([self.opcode2, self.opcode3]);
            }
            Uop::FetchDummy => {
                self.link.dummy_read_memory(self.pc);
            }
            Uop::Imp(op) => {
                self.link.dummy_read_memory(self.pc);
                self.apply_imp(op);
            }
            Uop::Imm(op) => {
                let value = self.read_pc_inc();
                self.apply_read(op, value);
            }
            Uop::ZpIdx(index) => {
                self.link.dummy_read_memory(u16::from(self.opcode2));
                self.ea = u16::from(self.opcode2.wrapping_add(self.index(index)));
            }
            Uop::AbsIdx(index) => {
                self.opcode3 = self.read_pc_inc();
                self.alu_temp = i32::from(self.opcode2) + i32::from(self.index(index));
                self.ea = u16::from_le_bytes([self.alu_temp as u8, self.opcode3]);
            }
            Uop::IdxFixupRead(op) => {
                if self.page_crossed() {
                    self.link.dummy_read_memory(self.ea);
                    self.ea = self.ea.wrapping_add(0x100);
                } else {
                    let value = self.link.read_memory(self.ea);
                    self.apply_read(op, value);
                    // Skip the second read; the instruction ends a cycle early.
                    self.mi += 1;
                }
            }
            Uop::IdxFixup => {
                self.link.dummy_read_memory(self.ea);
                if self.page_crossed() {
                    self.ea = self.ea.wrapping_add(0x100);
                }
            }
            Uop::IdxIndPointer => {
                self.link.dummy_read_memory(u16::from(self.opcode2));
                self.alu_temp = i32::from(self.opcode2.wrapping_add(self.x));
            }
            Uop::IdxIndLo => {
                let pointer = self.alu_temp as u8;
                self.ea = u16::from(self.link.read_memory(u16::from(pointer)));
            }
            Uop::IdxIndHi => {
                let pointer = (self.alu_temp as u8).wrapping_add(1);
                let hi = self.link.read_memory(u16::from(pointer));
                self.ea |= u16::from(hi) << 8;
            }
            Uop::IndIdxLo => {
                self.alu_temp = i32::from(self.link.read_memory(u16::from(self.opcode2)));
            }
            Uop::IndIdxHi => {
                self.opcode3 = self
                    .link
                    .read_memory(u16::from(self.opcode2.wrapping_add(1)));
                self.alu_temp += i32::from(self.y);
                self.ea = u16::from_le_bytes([self.alu_temp as u8, self.opcode3]);
            }
            Uop::Read(op) => {
                let value = self.link.read_memory(self.ea);
                self.apply_read(op, value);
            }
            Uop::Write(op) => self.store(op),
            Uop::RmwRead => self.alu_temp = i32::from(self.link.read_memory(self.ea)),
            Uop::RmwDummyWrite(op) => {
                let value = self.alu_temp as u8;
                self.link.write_memory(self.ea, value);
                self.alu_temp = i32::from(self.apply_rmw(op, value));
            }
            Uop::RmwWrite => self.link.write_memory(self.ea, self.alu_temp as u8),
            Uop::PushPch => self.push((self.pc >> 8) as u8),
            Uop::PushPcl => self.push(self.pc as u8),
            Uop::PushA => self.push(self.a),
            Uop::PushP => self.push((self.p | StatusFlags::B | StatusFlags::T).bits()),
            Uop::PushPBrk | Uop::PushPIrq => {
                let brk = if uop == Uop::PushPBrk {
                    StatusFlags::B
                } else {
                    StatusFlags::empty()
                };
                self.push(((self.p - StatusFlags::B) | brk | StatusFlags::T).bits());
                self.mask_interrupts();
                // An NMI latched during BRK or IRQ entry takes over the vector fetch.
                self.ea = if self.nmi {
                    self.nmi = false;
                    NMI_VECTOR
                } else {
                    IRQ_VECTOR
                };
            }
            Uop::PushPNmi => {
                self.push(((self.p - StatusFlags::B) | StatusFlags::T).bits());
                self.mask_interrupts();
                self.ea = NMI_VECTOR;
            }
            Uop::PushPReset => {
                self.link.dummy_read_memory(self.stack_addr());
                self.s = self.s.wrapping_sub(1);
                self.mask_interrupts();
                self.ea = RESET_VECTOR;
            }
            Uop::PushDummy => {
                self.link.dummy_read_memory(self.stack_addr());
                self.s = self.s.wrapping_sub(1);
            }
            Uop::IncS => {
                self.link.dummy_read_memory(self.stack_addr());
                self.s = self.s.wrapping_add(1);
            }
            Uop::PullA => {
                self.a = self.link.read_memory(self.stack_addr());
                self.set_nz(self.a);
            }
            Uop::PullP => {
                let pulled = StatusFlags::from_bits_retain(self.link.read_memory(self.stack_addr()));
                // The pulled I reaches P at the next opcode fetch.
                self.iflag_pending = pulled.contains(StatusFlags::I);
                let keep_i = self.p & StatusFlags::I;
                self.p = (pulled - StatusFlags::I) | keep_i | StatusFlags::T;
            }
            Uop::PullPRti => {
                let pulled = self.link.read_memory(self.stack_addr());
                self.p = StatusFlags::from_bits_retain(pulled) | StatusFlags::T;
                self.s = self.s.wrapping_add(1);
            }
            Uop::PullPcl => {
                let lo = self.link.read_memory(self.stack_addr());
                self.pc = (self.pc & 0xFF00) | u16::from(lo);
                self.s = self.s.wrapping_add(1);
            }
            Uop::PullPch => {
                let hi = self.link.read_memory(self.stack_addr());
                self.pc = (self.pc & 0x00FF) | (u16::from(hi) << 8);
            }
            Uop::IncPc => {
                self.link.dummy_read_memory(self.pc);
                self.pc = self.pc.wrapping_add(1);
            }
            Uop::JsrDummy => {
                self.link.dummy_read_memory(self.stack_addr());
            }
            Uop::JumpAbs => {
                let hi = self.link.read_memory(self.pc);
                self.pc = u16::from_le_bytes([self.opcode2, hi]);
            }
            Uop::JmpIndLo | Uop::FetchPclVector => {
                self.alu_temp = i32::from(self.link.read_memory(self.ea));
            }
            Uop::JmpIndHi => {
                let hi = self.link.read_memory(page_wrap_successor(self.ea));
                self.pc = u16::from_le_bytes([self.alu_temp as u8, hi]);
            }
            Uop::FetchPchVector => {
                let hi = self.link.read_memory(self.ea.wrapping_add(1));
                self.pc = u16::from_le_bytes([self.alu_temp as u8, hi]);
            }
            Uop::Branch(condition) => {
                self.opcode2 = self.read_pc_inc();
                if condition.holds(self.p) {
                    self.redirect(VOP_BRANCH_TAKEN);
                }
            }
            Uop::BranchTaken => self.branch_taken(),
            Uop::BranchPageFix => {
                self.link.dummy_read_memory(self.pc);
                self.pc = if self.alu_temp < 0 {
                    self.pc.wrapping_sub(0x100)
                } else {
                    self.pc.wrapping_add(0x100)
                };
            }
            Uop::Jam => {
                self.link.dummy_read_memory(0xFFFF);
                self.mi -= 1;
                if !self.jam_reported {
                    self.jam_reported = true;
                    tracing::warn!(pc = self.pc.wrapping_sub(1), "cpu jammed");
                }
            }
            Uop::End | Uop::EndISpecial | Uop::EndSuppressInterrupt | Uop::EndBranchSpecial => {
                // Only reachable from a hand-edited state; finish the instruction and fetch.
                self.finish_instruction(uop);
                self.execute_uop();
            }
        }
    }

    /// Applies an end marker's bookkeeping without consuming a cycle.
    pub(super) fn finish_instruction(&mut self, end: Uop) {
        match end {
            Uop::End | Uop::EndBranchSpecial => {
                self.iflag_pending = self.p.contains(StatusFlags::I);
                self.opcode = VOP_FETCH1;
            }
            Uop::EndISpecial => self.opcode = VOP_FETCH1,
            Uop::EndSuppressInterrupt => self.opcode = VOP_FETCH1_NO_INTERRUPT,
            _ => return,
        }
        self.mi = 0;
    }

    fn fetch1(&mut self) {
        let was_masked = self.p.contains(StatusFlags::I);
        self.p.set(StatusFlags::I, self.iflag_pending);
        if !self.branch_irq_hack {
            self.interrupt_pending = false;
            if self.nmi {
                tracing::trace!(pc = self.pc, "nmi");
                self.nmi = false;
                self.ea = NMI_VECTOR;
                self.begin_program(VOP_NMI);
                return;
            }
            if self.irq && !was_masked {
                tracing::trace!(pc = self.pc, "irq");
                self.begin_program(VOP_IRQ);
                return;
            }
        }
        self.fetch1_real();
    }

    fn fetch1_real(&mut self) {
        self.branch_irq_hack = false;
        self.link.on_exec_fetch(self.pc);
        if self.trace.is_some() {
            let row = self.trace_state();
            if let Some(sink) = self.trace.as_mut() {
                sink.on_trace(&row);
            }
        }
        self.opcode = u16::from(self.read_pc_inc());
        self.mi = -1;
    }

    fn branch_taken(&mut self) {
        self.link.dummy_read_memory(self.pc);
        self.alu_temp = i32::from(self.pc as u8) + i32::from(self.opcode2 as i8);
        self.pc = (self.pc & 0xFF00) | u16::from(self.alu_temp as u8);
        if self.alu_temp & 0x100 != 0 {
            self.redirect(VOP_BRANCH_PAGE_FIX);
        } else if !self.interrupt_pending {
            // A taken branch without a page cross delays interrupt polling by one instruction.
            self.branch_irq_hack = true;
        }
    }

    fn begin_program(&mut self, opcode: u16) {
        self.opcode = opcode;
        self.mi = 0;
        self.execute_uop();
    }

    /// Switches to another program; the cycle's `mi += 1` lands on its first uop.
    fn redirect(&mut self, opcode: u16) {
        self.opcode = opcode;
        self.mi = -1;
    }

    fn store(&mut self, op: WriteOp) {
        let value = match op {
            WriteOp::Sta => self.a,
            WriteOp::Stx => self.x,
            WriteOp::Sty => self.y,
            WriteOp::Sax => self.a & self.x,
            WriteOp::Sha => self.unstable_store(self.a & self.x),
            WriteOp::Shx => self.unstable_store(self.x),
            WriteOp::Shy => self.unstable_store(self.y),
            WriteOp::Tas => {
                self.s = self.a & self.x;
                self.unstable_store(self.s)
            }
        };
        self.link.write_memory(self.ea, value);
    }

    // SHA/SHX/SHY/TAS: AND with base-high + 1; a page cross replaces the high address byte.
    fn unstable_store(&mut self, register: u8) -> u8 {
        let value = register & self.opcode3.wrapping_add(1);
        if (self.ea >> 8) as u8 != self.opcode3 {
            self.ea = u16::from_le_bytes([self.ea as u8, value]);
        }
        value
    }

    const fn index(&self, index: Index) -> u8 {
        match index {
            Index::X => self.x,
            Index::Y => self.y,
        }
    }

    const fn page_crossed(&self) -> bool {
        self.alu_temp & 0x100 != 0
    }

    const fn stack_addr(&self) -> u16 {
        0x0100 | self.s as u16
    }

    fn read_pc_inc(&mut self) -> u8 {
        let value = self.link.read_memory(self.pc);
        self.pc = self.pc.wrapping_add(1);
        value
    }

    fn push(&mut self, value: u8) {
        self.link.write_memory(self.stack_addr(), value);
        self.s = self.s.wrapping_sub(1);
    }

    fn mask_interrupts(&mut self) {
        self.p.insert(StatusFlags::I);
        self.iflag_pending = true;
    }
}
