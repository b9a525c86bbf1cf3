//! Per-opcode micro-op programs.
//!
//! Every program is a list of one-cycle micro-ops. Indices below 256 are real
//! opcodes; the pseudo-opcodes above them hold the shared sequences for the
//! opcode fetch, taken branches and interrupt entry. A program ends with one
//! of the `End*` markers, which cost no cycle of their own.

use super::flags::StatusFlags;

/// Opcode fetch with interrupt polling.
pub const VOP_FETCH1: u16 = 256;
/// Second half of a taken branch.
pub const VOP_BRANCH_TAKEN: u16 = 257;
/// Page-crossing fixup of a taken branch.
pub const VOP_BRANCH_PAGE_FIX: u16 = 258;
/// NMI entry sequence.
pub const VOP_NMI: u16 = 259;
/// IRQ entry sequence.
pub const VOP_IRQ: u16 = 260;
/// Reset sequence.
pub const VOP_RESET: u16 = 261;
/// Opcode fetch that skips interrupt polling (after BRK and interrupt entry).
pub const VOP_FETCH1_NO_INTERRUPT: u16 = 262;
/// Number of programs in [`MICROCODE`].
pub const VOP_NUM: u16 = 263;

/// Index register used by an indexed addressing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Index {
    /// `X`.
    X,
    /// `Y`.
    Y,
}

/// Branch condition tested against `P`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    /// BPL.
    Plus,
    /// BMI.
    Minus,
    /// BVC.
    OverflowClear,
    /// BVS.
    OverflowSet,
    /// BCC.
    CarryClear,
    /// BCS.
    CarrySet,
    /// BNE.
    NotEqual,
    /// BEQ.
    Equal,
}

impl Condition {
    /// Returns `true` when the branch is taken.
    #[must_use]
    pub const fn holds(self, p: StatusFlags) -> bool {
        match self {
            Self::Plus => !p.contains(StatusFlags::N),
            Self::Minus => p.contains(StatusFlags::N),
            Self::OverflowClear => !p.contains(StatusFlags::V),
            Self::OverflowSet => p.contains(StatusFlags::V),
            Self::CarryClear => !p.contains(StatusFlags::C),
            Self::CarrySet => p.contains(StatusFlags::C),
            Self::NotEqual => !p.contains(StatusFlags::Z),
            Self::Equal => p.contains(StatusFlags::Z),
        }
    }
}

/// Operations consuming one operand byte.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadOp {
    Ora,
    And,
    Eor,
    Adc,
    Sbc,
    Cmp,
    Cpx,
    Cpy,
    Bit,
    Lda,
    Ldx,
    Ldy,
    Lax,
    Las,
    Nop,
    Anc,
    Alr,
    Arr,
    Sbx,
    Xaa,
    Lxa,
}

/// Operations producing the byte to store.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteOp {
    Sta,
    Stx,
    Sty,
    Sax,
    Sha,
    Shx,
    Shy,
    Tas,
}

/// Read-modify-write transforms.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RmwOp {
    Asl,
    Lsr,
    Rol,
    Ror,
    Inc,
    Dec,
    Slo,
    Rla,
    Sre,
    Rra,
    Dcp,
    Isc,
}

/// Single-cycle register operations.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImpOp {
    Nop,
    Tax,
    Tay,
    Txa,
    Tya,
    Tsx,
    Txs,
    Inx,
    Iny,
    Dex,
    Dey,
    Clc,
    Sec,
    Cli,
    Sei,
    Cld,
    Sed,
    Clv,
    AslA,
    LsrA,
    RolA,
    RorA,
}

/// One bus cycle of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Uop {
    /// Poll interrupts, then fetch an opcode.
    Fetch1,
    /// Fetch an opcode without polling.
    Fetch1Real,
    /// `opcode2 = read(PC++)`.
    Fetch2,
    /// `opcode2 = read(PC++)`, `ea = opcode2`.
    FetchZp,
    /// `opcode3 = read(PC++)`, `ea = opcode3:opcode2`.
    FetchAbsHi,
    /// Discarded read of `PC`.
    FetchDummy,
    /// Register-only operation, with the dummy read of `PC`.
    Imp(ImpOp),
    /// Immediate operand.
    Imm(ReadOp),
    /// Zero page index: dummy read of the base, wrap within page zero.
    ZpIdx(Index),
    /// Absolute index: fetch the high byte, add the index to the low byte only.
    AbsIdx(Index),
    /// Read at the partially indexed address; finishes early when no page was crossed.
    IdxFixupRead(ReadOp),
    /// Dummy read at the partially indexed address, then carry into the high byte.
    IdxFixup,
    /// `(zp,X)`: dummy read of the pointer, add `X`.
    IdxIndPointer,
    /// `(zp,X)`: effective address low byte.
    IdxIndLo,
    /// `(zp,X)`: effective address high byte, wrapping within page zero.
    IdxIndHi,
    /// `(zp),Y`: base low byte.
    IndIdxLo,
    /// `(zp),Y`: base high byte and low byte indexing.
    IndIdxHi,
    /// Read at `ea`.
    Read(ReadOp),
    /// Store at `ea`.
    Write(WriteOp),
    /// Read-modify-write: fetch the operand.
    RmwRead,
    /// Read-modify-write: write the old value back, then transform it.
    RmwDummyWrite(RmwOp),
    /// Read-modify-write: store the transformed value.
    RmwWrite,
    /// Push `PC` high.
    PushPch,
    /// Push `PC` low.
    PushPcl,
    /// Push `A`.
    PushA,
    /// Push `P` with `B` set (PHP).
    PushP,
    /// Push `P` with `B` set and enter the IRQ vector.
    PushPBrk,
    /// Push `P` with `B` clear and enter the IRQ vector.
    PushPIrq,
    /// Push `P` with `B` clear and enter the NMI vector.
    PushPNmi,
    /// Reset: suppressed push that selects the reset vector.
    PushPReset,
    /// Suppressed push (a read) during reset.
    PushDummy,
    /// Dummy stack read, then `S++`.
    IncS,
    /// Pull `A`.
    PullA,
    /// Pull `P` for PLP.
    PullP,
    /// Pull `P` for RTI.
    PullPRti,
    /// Pull `PC` low, `S++`.
    PullPcl,
    /// Pull `PC` high.
    PullPch,
    /// Dummy read of `PC`, then `PC++`.
    IncPc,
    /// JSR internal cycle: dummy stack read.
    JsrDummy,
    /// `PC = read(PC):opcode2`.
    JumpAbs,
    /// JMP indirect: target low byte.
    JmpIndLo,
    /// JMP indirect: target high byte, without carry into the pointer high byte.
    JmpIndHi,
    /// Vector low byte from `ea`.
    FetchPclVector,
    /// Vector high byte from `ea + 1`.
    FetchPchVector,
    /// Branch operand fetch and condition test.
    Branch(Condition),
    /// Taken branch: add the offset to `PCL`.
    BranchTaken,
    /// Taken branch across a page: fix `PCH`.
    BranchPageFix,
    /// Halted CPU: repeat this cycle forever.
    Jam,
    /// Normal end: latch `I` for the next poll.
    End,
    /// End that keeps the `I` latch set by CLI, SEI or PLP.
    EndISpecial,
    /// End that skips the next interrupt poll.
    EndSuppressInterrupt,
    /// End of a taken branch.
    EndBranchSpecial,
}

impl Uop {
    /// Returns `true` for the zero-cycle end markers.
    #[must_use]
    pub const fn is_end(self) -> bool {
        matches!(
            self,
            Self::End | Self::EndISpecial | Self::EndSuppressInterrupt | Self::EndBranchSpecial
        )
    }

    /// Returns `true` when this cycle reads the bus; such cycles stall while `RDY` is low.
    #[must_use]
    pub const fn is_read_cycle(self) -> bool {
        !matches!(
            self,
            Self::Write(_)
                | Self::RmwDummyWrite(_)
                | Self::RmwWrite
                | Self::PushPch
                | Self::PushPcl
                | Self::PushA
                | Self::PushP
                | Self::PushPBrk
                | Self::PushPIrq
                | Self::PushPNmi
        ) && !self.is_end()
    }
}

use Uop::{
    AbsIdx, Branch, BranchPageFix, BranchTaken, End, EndBranchSpecial, EndISpecial,
    EndSuppressInterrupt, Fetch1, Fetch1Real, Fetch2, FetchAbsHi, FetchDummy, FetchPchVector,
    FetchPclVector, FetchZp, IdxFixup, IdxFixupRead, IdxIndHi, IdxIndLo, IdxIndPointer, Imm, Imp,
    IncPc, IncS, IndIdxHi, IndIdxLo, Jam, JmpIndHi, JmpIndLo, JsrDummy, JumpAbs, PullA, PullP,
    PullPRti, PullPch, PullPcl, PushA, PushDummy, PushP, PushPBrk, PushPIrq, PushPNmi,
    PushPReset, PushPch, PushPcl, Read, RmwDummyWrite, RmwRead, RmwWrite, Write, ZpIdx,
};

macro_rules! imp {
    ($op:ident) => {
        &[Imp(ImpOp::$op), End]
    };
}
macro_rules! imm {
    ($op:ident) => {
        &[Imm(ReadOp::$op), End]
    };
}
macro_rules! zp_r {
    ($op:ident) => {
        &[FetchZp, Read(ReadOp::$op), End]
    };
}
macro_rules! zp_w {
    ($op:ident) => {
        &[FetchZp, Write(WriteOp::$op), End]
    };
}
macro_rules! zp_m {
    ($op:ident) => {
        &[FetchZp, RmwRead, RmwDummyWrite(RmwOp::$op), RmwWrite, End]
    };
}
macro_rules! zpi_r {
    ($ix:ident, $op:ident) => {
        &[Fetch2, ZpIdx(Index::$ix), Read(ReadOp::$op), End]
    };
}
macro_rules! zpi_w {
    ($ix:ident, $op:ident) => {
        &[Fetch2, ZpIdx(Index::$ix), Write(WriteOp::$op), End]
    };
}
macro_rules! zpi_m {
    ($ix:ident, $op:ident) => {
        &[Fetch2, ZpIdx(Index::$ix), RmwRead, RmwDummyWrite(RmwOp::$op), RmwWrite, End]
    };
}
macro_rules! abs_r {
    ($op:ident) => {
        &[Fetch2, FetchAbsHi, Read(ReadOp::$op), End]
    };
}
macro_rules! abs_w {
    ($op:ident) => {
        &[Fetch2, FetchAbsHi, Write(WriteOp::$op), End]
    };
}
macro_rules! abs_m {
    ($op:ident) => {
        &[Fetch2, FetchAbsHi, RmwRead, RmwDummyWrite(RmwOp::$op), RmwWrite, End]
    };
}
macro_rules! absi_r {
    ($ix:ident, $op:ident) => {
        &[Fetch2, AbsIdx(Index::$ix), IdxFixupRead(ReadOp::$op), Read(ReadOp::$op), End]
    };
}
macro_rules! absi_w {
    ($ix:ident, $op:ident) => {
        &[Fetch2, AbsIdx(Index::$ix), IdxFixup, Write(WriteOp::$op), End]
    };
}
macro_rules! absi_m {
    ($ix:ident, $op:ident) => {
        &[
            Fetch2,
            AbsIdx(Index::$ix),
            IdxFixup,
            RmwRead,
            RmwDummyWrite(RmwOp::$op),
            RmwWrite,
            End,
        ]
    };
}
macro_rules! izx_r {
    ($op:ident) => {
        &[Fetch2, IdxIndPointer, IdxIndLo, IdxIndHi, Read(ReadOp::$op), End]
    };
}
macro_rules! izx_w {
    ($op:ident) => {
        &[Fetch2, IdxIndPointer, IdxIndLo, IdxIndHi, Write(WriteOp::$op), End]
    };
}
macro_rules! izx_m {
    ($op:ident) => {
        &[
            Fetch2,
            IdxIndPointer,
            IdxIndLo,
            IdxIndHi,
            RmwRead,
            RmwDummyWrite(RmwOp::$op),
            RmwWrite,
            End,
        ]
    };
}
macro_rules! izy_r {
    ($op:ident) => {
        &[Fetch2, IndIdxLo, IndIdxHi, IdxFixupRead(ReadOp::$op), Read(ReadOp::$op), End]
    };
}
macro_rules! izy_w {
    ($op:ident) => {
        &[Fetch2, IndIdxLo, IndIdxHi, IdxFixup, Write(WriteOp::$op), End]
    };
}
macro_rules! izy_m {
    ($op:ident) => {
        &[
            Fetch2,
            IndIdxLo,
            IndIdxHi,
            IdxFixup,
            RmwRead,
            RmwDummyWrite(RmwOp::$op),
            RmwWrite,
            End,
        ]
    };
}
macro_rules! branch {
    ($cond:ident) => {
        &[Branch(Condition::$cond), End]
    };
}

const JAM: &[Uop] = &[Jam];

/// Micro-op programs indexed by opcode, then by cycle.
pub static MICROCODE: [&[Uop]; VOP_NUM as usize] = [
    // 0x00
    &[Fetch2, PushPch, PushPcl, PushPBrk, FetchPclVector, FetchPchVector, EndSuppressInterrupt],
    izx_r!(Ora),
    JAM,
    izx_m!(Slo),
    zp_r!(Nop),
    zp_r!(Ora),
    zp_m!(Asl),
    zp_m!(Slo),
    &[FetchDummy, PushP, End],
    imm!(Ora),
    imp!(AslA),
    imm!(Anc),
    abs_r!(Nop),
    abs_r!(Ora),
    abs_m!(Asl),
    abs_m!(Slo),
    // 0x10
    branch!(Plus),
    izy_r!(Ora),
    JAM,
    izy_m!(Slo),
    zpi_r!(X, Nop),
    zpi_r!(X, Ora),
    zpi_m!(X, Asl),
    zpi_m!(X, Slo),
    imp!(Clc),
    absi_r!(Y, Ora),
    imp!(Nop),
    absi_m!(Y, Slo),
    absi_r!(X, Nop),
    absi_r!(X, Ora),
    absi_m!(X, Asl),
    absi_m!(X, Slo),
    // 0x20
    &[Fetch2, JsrDummy, PushPch, PushPcl, JumpAbs, End],
    izx_r!(And),
    JAM,
    izx_m!(Rla),
    zp_r!(Bit),
    zp_r!(And),
    zp_m!(Rol),
    zp_m!(Rla),
    &[FetchDummy, IncS, PullP, EndISpecial],
    imm!(And),
    imp!(RolA),
    imm!(Anc),
    abs_r!(Bit),
    abs_r!(And),
    abs_m!(Rol),
    abs_m!(Rla),
    // 0x30
    branch!(Minus),
    izy_r!(And),
    JAM,
    izy_m!(Rla),
    zpi_r!(X, Nop),
    zpi_r!(X, And),
    zpi_m!(X, Rol),
    zpi_m!(X, Rla),
    imp!(Sec),
    absi_r!(Y, And),
    imp!(Nop),
    absi_m!(Y, Rla),
    absi_r!(X, Nop),
    absi_r!(X, And),
    absi_m!(X, Rol),
    absi_m!(X, Rla),
    // 0x40
    &[FetchDummy, IncS, PullPRti, PullPcl, PullPch, End],
    izx_r!(Eor),
    JAM,
    izx_m!(Sre),
    zp_r!(Nop),
    zp_r!(Eor),
    zp_m!(Lsr),
    zp_m!(Sre),
    &[FetchDummy, PushA, End],
    imm!(Eor),
    imp!(LsrA),
    imm!(Alr),
    &[Fetch2, JumpAbs, End],
    abs_r!(Eor),
    abs_m!(Lsr),
    abs_m!(Sre),
    // 0x50
    branch!(OverflowClear),
    izy_r!(Eor),
    JAM,
    izy_m!(Sre),
    zpi_r!(X, Nop),
    zpi_r!(X, Eor),
    zpi_m!(X, Lsr),
    zpi_m!(X, Sre),
    &[Imp(ImpOp::Cli), EndISpecial],
    absi_r!(Y, Eor),
    imp!(Nop),
    absi_m!(Y, Sre),
    absi_r!(X, Nop),
    absi_r!(X, Eor),
    absi_m!(X, Lsr),
    absi_m!(X, Sre),
    // 0x60
    &[FetchDummy, IncS, PullPcl, PullPch, IncPc, End],
    izx_r!(Adc),
    JAM,
    izx_m!(Rra),
    zp_r!(Nop),
    zp_r!(Adc),
    zp_m!(Ror),
    zp_m!(Rra),
    &[FetchDummy, IncS, PullA, End],
    imm!(Adc),
    imp!(RorA),
    imm!(Arr),
    &[Fetch2, FetchAbsHi, JmpIndLo, JmpIndHi, End],
    abs_r!(Adc),
    abs_m!(Ror),
    abs_m!(Rra),
    // 0x70
    branch!(OverflowSet),
    izy_r!(Adc),
    JAM,
    izy_m!(Rra),
    zpi_r!(X, Nop),
    zpi_r!(X, Adc),
    zpi_m!(X, Ror),
    zpi_m!(X, Rra),
    &[Imp(ImpOp::Sei), EndISpecial],
    absi_r!(Y, Adc),
    imp!(Nop),
    absi_m!(Y, Rra),
    absi_r!(X, Nop),
    absi_r!(X, Adc),
    absi_m!(X, Ror),
    absi_m!(X, Rra),
    // 0x80
    imm!(Nop),
    izx_w!(Sta),
    imm!(Nop),
    izx_w!(Sax),
    zp_w!(Sty),
    zp_w!(Sta),
    zp_w!(Stx),
    zp_w!(Sax),
    imp!(Dey),
    imm!(Nop),
    imp!(Txa),
    imm!(Xaa),
    abs_w!(Sty),
    abs_w!(Sta),
    abs_w!(Stx),
    abs_w!(Sax),
    // 0x90
    branch!(CarryClear),
    izy_w!(Sta),
    JAM,
    izy_w!(Sha),
    zpi_w!(X, Sty),
    zpi_w!(X, Sta),
    zpi_w!(Y, Stx),
    zpi_w!(Y, Sax),
    imp!(Tya),
    absi_w!(Y, Sta),
    imp!(Txs),
    absi_w!(Y, Tas),
    absi_w!(X, Shy),
    absi_w!(X, Sta),
    absi_w!(Y, Shx),
    absi_w!(Y, Sha),
    // 0xA0
    imm!(Ldy),
    izx_r!(Lda),
    imm!(Ldx),
    izx_r!(Lax),
    zp_r!(Ldy),
    zp_r!(Lda),
    zp_r!(Ldx),
    zp_r!(Lax),
    imp!(Tay),
    imm!(Lda),
    imp!(Tax),
    imm!(Lxa),
    abs_r!(Ldy),
    abs_r!(Lda),
    abs_r!(Ldx),
    abs_r!(Lax),
    // 0xB0
    branch!(CarrySet),
    izy_r!(Lda),
    JAM,
    izy_r!(Lax),
    zpi_r!(X, Ldy),
    zpi_r!(X, Lda),
    zpi_r!(Y, Ldx),
    zpi_r!(Y, Lax),
    imp!(Clv),
    absi_r!(Y, Lda),
    imp!(Tsx),
    absi_r!(Y, Las),
    absi_r!(X, Ldy),
    absi_r!(X, Lda),
    absi_r!(Y, Ldx),
    absi_r!(Y, Lax),
    // 0xC0
    imm!(Cpy),
    izx_r!(Cmp),
    imm!(Nop),
    izx_m!(Dcp),
    zp_r!(Cpy),
    zp_r!(Cmp),
    zp_m!(Dec),
    zp_m!(Dcp),
    imp!(Iny),
    imm!(Cmp),
    imp!(Dex),
    imm!(Sbx),
    abs_r!(Cpy),
    abs_r!(Cmp),
    abs_m!(Dec),
    abs_m!(Dcp),
    // 0xD0
    branch!(NotEqual),
    izy_r!(Cmp),
    JAM,
    izy_m!(Dcp),
    zpi_r!(X, Nop),
    zpi_r!(X, Cmp),
    zpi_m!(X, Dec),
    zpi_m!(X, Dcp),
    imp!(Cld),
    absi_r!(Y, Cmp),
    imp!(Nop),
    absi_m!(Y, Dcp),
    absi_r!(X, Nop),
    absi_r!(X, Cmp),
    absi_m!(X, Dec),
    absi_m!(X, Dcp),
    // 0xE0
    imm!(Cpx),
    izx_r!(Sbc),
    imm!(Nop),
    izx_m!(Isc),
    zp_r!(Cpx),
    zp_r!(Sbc),
    zp_m!(Inc),
    zp_m!(Isc),
    imp!(Inx),
    imm!(Sbc),
    imp!(Nop),
    imm!(Sbc),
    abs_r!(Cpx),
    abs_r!(Sbc),
    abs_m!(Inc),
    abs_m!(Isc),
    // 0xF0
    branch!(Equal),
    izy_r!(Sbc),
    JAM,
    izy_m!(Isc),
    zpi_r!(X, Nop),
    zpi_r!(X, Sbc),
    zpi_m!(X, Inc),
    zpi_m!(X, Isc),
    imp!(Sed),
    absi_r!(Y, Sbc),
    imp!(Nop),
    absi_m!(Y, Isc),
    absi_r!(X, Nop),
    absi_r!(X, Sbc),
    absi_m!(X, Inc),
    absi_m!(X, Isc),
    // VOP_FETCH1
    &[Fetch1],
    // VOP_BRANCH_TAKEN
    &[BranchTaken, EndBranchSpecial],
    // VOP_BRANCH_PAGE_FIX
    &[BranchPageFix, End],
    // VOP_NMI
    &[
        FetchDummy,
        FetchDummy,
        PushPch,
        PushPcl,
        PushPNmi,
        FetchPclVector,
        FetchPchVector,
        EndSuppressInterrupt,
    ],
    // VOP_IRQ
    &[
        FetchDummy,
        FetchDummy,
        PushPch,
        PushPcl,
        PushPIrq,
        FetchPclVector,
        FetchPchVector,
        EndSuppressInterrupt,
    ],
    // VOP_RESET
    &[
        FetchDummy,
        FetchDummy,
        PushDummy,
        PushDummy,
        PushPReset,
        FetchPclVector,
        FetchPchVector,
        EndSuppressInterrupt,
    ],
    // VOP_FETCH1_NO_INTERRUPT
    &[Fetch1Real],
];

/// Base cycle count of `opcode`, excluding page-cross and branch penalties.
#[must_use]
pub fn base_cycles(opcode: u8) -> usize {
    let program = MICROCODE[usize::from(opcode)];
    // Opcode fetch plus every non-end uop, minus the skipped second read of indexed loads.
    let skipped = program
        .iter()
        .filter(|uop| matches!(uop, Uop::IdxFixupRead(_)))
        .count();
    1 + program.iter().filter(|uop| !uop.is_end()).count() - skipped
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{base_cycles, Condition, Uop, MICROCODE, VOP_FETCH1, VOP_NUM};
    use crate::cpu::flags::StatusFlags;

    #[test]
    fn every_program_is_terminated_or_jams() {
        for (opcode, program) in MICROCODE.iter().enumerate() {
            let last = program.last().copied();
            let terminated = last.is_some_and(Uop::is_end)
                || last == Some(Uop::Jam)
                || opcode >= usize::from(VOP_FETCH1) && program.len() == 1;
            assert!(terminated, "program {opcode:#X} has no terminator");
            assert!(
                program[..program.len() - 1].iter().all(|uop| !uop.is_end()),
                "program {opcode:#X} ends early"
            );
            assert!(!program[0].is_end(), "program {opcode:#X} is empty");
        }
        assert_eq!(MICROCODE.len(), usize::from(VOP_NUM));
    }

    #[rstest]
    #[case(0xEA, 2)]
    #[case(0xA9, 2)]
    #[case(0xA5, 3)]
    #[case(0xB5, 4)]
    #[case(0xAD, 4)]
    #[case(0xBD, 4)]
    #[case(0x9D, 5)]
    #[case(0xA1, 6)]
    #[case(0xB1, 5)]
    #[case(0x91, 6)]
    #[case(0x06, 5)]
    #[case(0x16, 6)]
    #[case(0x0E, 6)]
    #[case(0x1E, 7)]
    #[case(0x03, 8)]
    #[case(0x13, 8)]
    #[case(0x4C, 3)]
    #[case(0x6C, 5)]
    #[case(0x20, 6)]
    #[case(0x60, 6)]
    #[case(0x40, 6)]
    #[case(0x00, 7)]
    #[case(0x48, 3)]
    #[case(0x68, 4)]
    #[case(0x08, 3)]
    #[case(0x28, 4)]
    #[case(0x10, 2)]
    fn base_cycle_counts(#[case] opcode: u8, #[case] cycles: usize) {
        assert_eq!(base_cycles(opcode), cycles);
    }

    #[test]
    fn conditions_test_their_flag() {
        let p = StatusFlags::N | StatusFlags::C;
        assert!(Condition::Minus.holds(p));
        assert!(!Condition::Plus.holds(p));
        assert!(Condition::CarrySet.holds(p));
        assert!(Condition::NotEqual.holds(p));
        assert!(Condition::OverflowClear.holds(p));
    }

    #[test]
    fn write_cycles_do_not_stall() {
        assert!(!Uop::PushPch.is_read_cycle());
        assert!(!Uop::RmwWrite.is_read_cycle());
        assert!(Uop::PushDummy.is_read_cycle());
        assert!(Uop::Fetch1.is_read_cycle());
        assert!(!Uop::End.is_read_cycle());
    }
}
