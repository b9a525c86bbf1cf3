//! Cycle-exact NMOS 6502 interpreter.
//!
//! Each call to [`Mos6502::step`] advances exactly one bus cycle by running
//! one micro-op from [`microcode::MICROCODE`]. Instructions, interrupt entry
//! and reset are all programs in that table; between cycles the CPU is fully
//! described by its registers, the current program and the index into it, so
//! a state captured mid-instruction resumes exactly.

mod alu;
/// Disassembler and trace rows.
pub mod disasm;
mod execute;
/// Status register and vectors.
pub mod flags;
/// Bus interface.
pub mod link;
/// Micro-op programs.
pub mod microcode;
mod registers;

use std::fmt;

pub use alu::{LXA_MAGIC, XAA_MAGIC};
pub use flags::{StatusFlags, IRQ_VECTOR, NMI_VECTOR, RESET_VECTOR};
pub use link::{CpuLink, FlatMemory};
pub use microcode::{Uop, VOP_FETCH1, VOP_FETCH1_NO_INTERRUPT, VOP_NUM, VOP_RESET};
pub use registers::CORE_NAME;

use crate::api::TraceSink;
use crate::sync::{Serializer, Statable, SyncError, SyncResult};

/// Upper bound on cycles [`Mos6502::step_instruction`] runs before giving up.
///
/// Covers the longest instruction plus an interrupt entry; only a jammed CPU
/// or a held `RDY` line reaches it.
pub const MAX_INSTRUCTION_CYCLES: u32 = 32;

/// Address following `addr` within the same page.
///
/// Models the missing carry of `JMP ($xxFF)` and zero-page pointer fetches.
#[must_use]
pub const fn page_wrap_successor(addr: u16) -> u16 {
    (addr & 0xFF00) | (addr.wrapping_add(1) & 0x00FF)
}

/// NMOS 6502 core bound to a bus implementation.
pub struct Mos6502<L: CpuLink> {
    link: L,
    a: u8,
    x: u8,
    y: u8,
    p: StatusFlags,
    pc: u16,
    s: u8,
    nmi: bool,
    irq: bool,
    rdy: bool,
    total_executed_cycles: u64,
    opcode: u16,
    opcode2: u8,
    opcode3: u8,
    ea: u16,
    alu_temp: i32,
    mi: i32,
    iflag_pending: bool,
    interrupt_pending: bool,
    branch_irq_hack: bool,
    rdy_freeze: bool,
    ext_ppu_cycle: i32,
    bcd_enabled: bool,
    jam_reported: bool,
    trace: Option<Box<dyn TraceSink>>,
}

impl<L: CpuLink> Mos6502<L> {
    /// Creates a core in the reset state; the reset sequence runs on the first cycles.
    pub fn new(link: L) -> Self {
        let mut cpu = Self {
            link,
            a: 0,
            x: 0,
            y: 0,
            p: StatusFlags::POWER_ON,
            pc: 0,
            s: 0,
            nmi: false,
            irq: false,
            rdy: true,
            total_executed_cycles: 0,
            opcode: VOP_RESET,
            opcode2: 0,
            opcode3: 0,
            ea: 0,
            alu_temp: 0,
            mi: 0,
            iflag_pending: true,
            interrupt_pending: false,
            branch_irq_hack: false,
            rdy_freeze: false,
            ext_ppu_cycle: 0,
            bcd_enabled: true,
            jam_reported: false,
            trace: None,
        };
        cpu.reset();
        cpu
    }

    /// Hard reset: clears the registers and internal latches and queues the reset sequence.
    ///
    /// The IRQ and NMI inputs are driven from outside and keep their levels.
    pub fn reset(&mut self) {
        self.a = 0;
        self.x = 0;
        self.y = 0;
        self.p = StatusFlags::POWER_ON;
        self.pc = 0;
        self.s = 0;
        self.rdy = true;
        self.total_executed_cycles = 0;
        self.opcode2 = 0;
        self.opcode3 = 0;
        self.ea = 0;
        self.alu_temp = 0;
        self.interrupt_pending = false;
        self.branch_irq_hack = false;
        self.rdy_freeze = false;
        self.ext_ppu_cycle = 0;
        self.jam_reported = false;
        self.queue_reset_sequence();
        tracing::debug!("cpu reset");
    }

    /// Reset line pulse: registers and cycle count survive, the reset sequence runs next.
    pub fn soft_reset(&mut self) {
        self.interrupt_pending = false;
        self.branch_irq_hack = false;
        self.rdy_freeze = false;
        self.jam_reported = false;
        self.queue_reset_sequence();
        tracing::debug!(pc = self.pc, "cpu soft reset");
    }

    fn queue_reset_sequence(&mut self) {
        self.opcode = VOP_RESET;
        self.mi = 0;
        self.iflag_pending = true;
    }

    /// Executes exactly one bus cycle.
    ///
    /// # Panics
    ///
    /// Panics if the program/index pair has been corrupted (only possible by
    /// loading a state whose values were edited to be out of range).
    pub fn step(&mut self) {
        self.total_executed_cycles += 1;
        if !self.rdy_freeze {
            self.interrupt_pending |= self.interrupt_asserted();
        }
        self.rdy_freeze = false;
        self.execute_uop();
        if !self.rdy_freeze {
            self.mi += 1;
            self.settle();
        }
    }

    /// Runs cycles until the next instruction boundary, returning how many ran.
    ///
    /// Stops after [`MAX_INSTRUCTION_CYCLES`] when the CPU cannot reach one.
    pub fn step_instruction(&mut self) -> u32 {
        let mut cycles = 0;
        loop {
            self.step();
            cycles += 1;
            if self.at_instruction_boundary() || cycles >= MAX_INSTRUCTION_CYCLES {
                return cycles;
            }
        }
    }

    // Applies a pending end marker so that boundaries are visible between cycles.
    fn settle(&mut self) {
        let next = self.current_uop();
        if next.is_end() {
            self.finish_instruction(next);
        }
    }

    fn current_uop(&self) -> Uop {
        let program = microcode::MICROCODE.get(usize::from(self.opcode));
        let uop = program.and_then(|program| {
            usize::try_from(self.mi)
                .ok()
                .and_then(|index| program.get(index))
        });
        match uop {
            Some(uop) => *uop,
            None => panic!(
                "corrupted interpreter state: opcode {:#05X} micro-op {}",
                self.opcode, self.mi
            ),
        }
    }

    const fn interrupt_asserted(&self) -> bool {
        self.rdy && (self.nmi || (self.irq && !self.p.contains(StatusFlags::I)))
    }

    /// Returns `true` when the next cycle starts a new instruction.
    #[must_use]
    pub const fn at_instruction_boundary(&self) -> bool {
        (self.opcode == VOP_FETCH1 || self.opcode == VOP_FETCH1_NO_INTERRUPT) && self.mi == 0
    }

    /// Bus read through the link, with side effects.
    pub fn read_memory(&mut self, addr: u16) -> u8 {
        self.link.read_memory(addr)
    }

    /// Little-endian word read through the link.
    pub fn read_word(&mut self, addr: u16) -> u16 {
        let lo = self.link.read_memory(addr);
        let hi = self.link.read_memory(addr.wrapping_add(1));
        u16::from_le_bytes([lo, hi])
    }

    /// Little-endian word read whose high byte comes from the same page.
    pub fn read_word_page_wrap(&mut self, addr: u16) -> u16 {
        let lo = self.link.read_memory(addr);
        let hi = self.link.read_memory(page_wrap_successor(addr));
        u16::from_le_bytes([lo, hi])
    }

    /// Side-effect free word read.
    #[must_use]
    pub fn peek_word(&self, addr: u16) -> u16 {
        u16::from_le_bytes([
            self.link.peek_memory(addr),
            self.link.peek_memory(addr.wrapping_add(1)),
        ])
    }

    /// Asserts or releases the level-triggered IRQ line.
    pub fn set_irq(&mut self, asserted: bool) {
        self.irq = asserted;
    }

    /// Latches an NMI edge; it is serviced at the next poll and then cleared.
    pub fn set_nmi(&mut self, latched: bool) {
        self.nmi = latched;
    }

    /// Drives the `RDY` line; while low, read cycles stall.
    pub fn set_rdy(&mut self, ready: bool) {
        self.rdy = ready;
    }

    /// SO pin: sets the overflow flag.
    pub fn set_overflow(&mut self) {
        self.p.insert(StatusFlags::V);
    }

    /// Enables or disables decimal mode arithmetic.
    pub fn set_bcd_enabled(&mut self, enabled: bool) {
        self.bcd_enabled = enabled;
    }

    /// Returns `true` when `D` affects ADC/SBC.
    #[must_use]
    pub const fn bcd_enabled(&self) -> bool {
        self.bcd_enabled
    }

    /// External counter shown in trace rows (for example a video cycle count).
    pub fn set_ext_ppu_cycle(&mut self, cycle: i32) {
        self.ext_ppu_cycle = cycle;
    }

    /// Installs or removes the trace sink called at every opcode fetch.
    pub fn set_trace_sink(&mut self, sink: Option<Box<dyn TraceSink>>) {
        self.trace = sink;
    }

    /// Returns `true` when a trace sink is installed.
    #[must_use]
    pub fn is_tracing(&self) -> bool {
        self.trace.is_some()
    }

    /// Bus implementation.
    #[must_use]
    pub const fn link(&self) -> &L {
        &self.link
    }

    /// Mutable bus implementation.
    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// Accumulator.
    #[must_use]
    pub const fn a(&self) -> u8 {
        self.a
    }

    /// `X` index.
    #[must_use]
    pub const fn x(&self) -> u8 {
        self.x
    }

    /// `Y` index.
    #[must_use]
    pub const fn y(&self) -> u8 {
        self.y
    }

    /// Status register.
    #[must_use]
    pub const fn p(&self) -> StatusFlags {
        self.p
    }

    /// Program counter.
    #[must_use]
    pub const fn pc(&self) -> u16 {
        self.pc
    }

    /// Stack pointer (offset into page one).
    #[must_use]
    pub const fn s(&self) -> u8 {
        self.s
    }

    /// Sets `A`.
    pub fn set_a(&mut self, value: u8) {
        self.a = value;
    }

    /// Sets `X`.
    pub fn set_x(&mut self, value: u8) {
        self.x = value;
    }

    /// Sets `Y`.
    pub fn set_y(&mut self, value: u8) {
        self.y = value;
    }

    /// Sets `P`, including the pending `I` latch so the change survives the next fetch.
    pub fn set_p(&mut self, value: StatusFlags) {
        self.p = value;
        self.iflag_pending = value.contains(StatusFlags::I);
    }

    /// Sets `PC`.
    pub fn set_pc(&mut self, value: u16) {
        self.pc = value;
    }

    /// Sets `S`.
    pub fn set_s(&mut self, value: u8) {
        self.s = value;
    }

    /// Level of the IRQ line.
    #[must_use]
    pub const fn irq(&self) -> bool {
        self.irq
    }

    /// Pending NMI latch.
    #[must_use]
    pub const fn nmi(&self) -> bool {
        self.nmi
    }

    /// Level of the `RDY` line.
    #[must_use]
    pub const fn rdy(&self) -> bool {
        self.rdy
    }

    /// Cycles executed since the last hard reset, stalled cycles included.
    #[must_use]
    pub const fn total_executed_cycles(&self) -> u64 {
        self.total_executed_cycles
    }

    /// Current program: an opcode below 256 or a pseudo-opcode.
    #[must_use]
    pub const fn opcode(&self) -> u16 {
        self.opcode
    }

    /// Index of the next micro-op within the current program.
    #[must_use]
    pub const fn micro_index(&self) -> i32 {
        self.mi
    }

    /// Effective address latch.
    #[must_use]
    pub const fn ea(&self) -> u16 {
        self.ea
    }

    /// `I` value the next opcode fetch will install.
    #[must_use]
    pub const fn iflag_pending(&self) -> bool {
        self.iflag_pending
    }

    /// Returns `true` while the current read cycle is stalled by `RDY`.
    #[must_use]
    pub const fn rdy_frozen(&self) -> bool {
        self.rdy_freeze
    }
}

impl<L: CpuLink> Statable for Mos6502<L> {
    fn sync_state(&mut self, ser: &mut Serializer<'_>) -> SyncResult<()> {
        ser.begin_section("MOS6502")?;
        ser.sync("A", &mut self.a)?;
        ser.sync("X", &mut self.x)?;
        ser.sync("Y", &mut self.y)?;
        let mut p = self.p.bits();
        ser.sync("P", &mut p)?;
        self.p = StatusFlags::from_bits_retain(p);
        ser.sync("PC", &mut self.pc)?;
        ser.sync("S", &mut self.s)?;
        ser.sync("NMI", &mut self.nmi)?;
        ser.sync("IRQ", &mut self.irq)?;
        ser.sync("RDY", &mut self.rdy)?;
        ser.sync("TotalExecutedCycles", &mut self.total_executed_cycles)?;
        ser.sync("opcode", &mut self.opcode)?;
        ser.sync("opcode2", &mut self.opcode2)?;
        ser.sync("opcode3", &mut self.opcode3)?;
        ser.sync("ea", &mut self.ea)?;
        ser.sync("alu_temp", &mut self.alu_temp)?;
        ser.sync("mi", &mut self.mi)?;
        ser.sync("iflag_pending", &mut self.iflag_pending)?;
        ser.sync("interrupt_pending", &mut self.interrupt_pending)?;
        ser.sync("branch_irq_hack", &mut self.branch_irq_hack)?;
        ser.sync("rdy_freeze", &mut self.rdy_freeze)?;
        ser.sync("ext_ppu_cycle", &mut self.ext_ppu_cycle)?;
        ser.end_section()?;

        if ser.is_reader() {
            self.validate_program_position()?;
        }
        Ok(())
    }
}

impl<L: CpuLink> Mos6502<L> {
    fn validate_program_position(&self) -> SyncResult<()> {
        let Some(program) = microcode::MICROCODE.get(usize::from(self.opcode)) else {
            return Err(SyncError::InvalidValue {
                field: "MOS6502/opcode".to_owned(),
                value: i64::from(self.opcode),
            });
        };
        if usize::try_from(self.mi).map_or(true, |mi| mi >= program.len()) {
            return Err(SyncError::InvalidValue {
                field: "MOS6502/mi".to_owned(),
                value: i64::from(self.mi),
            });
        }
        Ok(())
    }
}

impl<L: CpuLink> fmt::Debug for Mos6502<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mos6502")
            .field("a", &self.a)
            .field("x", &self.x)
            .field("y", &self.y)
            .field("p", &self.p)
            .field("pc", &self.pc)
            .field("s", &self.s)
            .field("opcode", &self.opcode)
            .field("mi", &self.mi)
            .field("total_executed_cycles", &self.total_executed_cycles)
            .finish_non_exhaustive()
    }
}
