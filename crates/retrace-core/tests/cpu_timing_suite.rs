//! Cycle timing, interrupt latency and undocumented opcode coverage for the 6502 core.

#![allow(clippy::pedantic, clippy::nursery)]

use proptest as _;
use retrace_core::{
    FlatMemory, Mos6502, StatusFlags, IRQ_VECTOR, MAX_INSTRUCTION_CYCLES, NMI_VECTOR, RESET_VECTOR,
};
use rstest::rstest;
#[cfg(feature = "serde")]
use serde as _;
use sha2 as _;
use thiserror as _;
use tracing as _;
use tracing_subscriber as _;
use bitflags as _;

const ORIGIN: u16 = 0x0400;
const IRQ_HANDLER: u16 = 0x0600;
const NMI_HANDLER: u16 = 0x0700;

fn boot_at(origin: u16, program: &[u8]) -> Mos6502<FlatMemory> {
    let mut memory = FlatMemory::new();
    memory.load(RESET_VECTOR, &origin.to_le_bytes());
    memory.load(IRQ_VECTOR, &IRQ_HANDLER.to_le_bytes());
    memory.load(NMI_VECTOR, &NMI_HANDLER.to_le_bytes());
    memory.load(origin, program);
    let mut cpu = Mos6502::new(memory);
    assert_eq!(cpu.step_instruction(), 7, "reset sequence");
    cpu
}

fn boot(program: &[u8]) -> Mos6502<FlatMemory> {
    boot_at(ORIGIN, program)
}

fn pushed(cpu: &Mos6502<FlatMemory>, offset: u8) -> u8 {
    cpu.link().bytes()[0x0100 | usize::from(cpu.s().wrapping_add(offset))]
}

#[rstest]
#[case::lda_abs_x_same_page(&[0xBD, 0x00, 0x30], 0x10, 0x00, 4)]
#[case::lda_abs_x_page_cross(&[0xBD, 0xF8, 0x30], 0x10, 0x00, 5)]
#[case::lda_abs_y_page_cross(&[0xB9, 0xFF, 0x30], 0x00, 0x01, 5)]
#[case::sta_abs_x_always_fixes(&[0x9D, 0x00, 0x30], 0x10, 0x00, 5)]
#[case::inc_abs_x(&[0xFE, 0x00, 0x30], 0x01, 0x00, 7)]
#[case::lda_zp_x_wraps(&[0xB5, 0xF0], 0x20, 0x00, 4)]
#[case::nop_abs_x_page_cross(&[0x1C, 0xFF, 0x30], 0x01, 0x00, 5)]
#[case::slo_abs_y(&[0x1B, 0x00, 0x30], 0x00, 0x01, 7)]
#[case::jsr(&[0x20, 0x00, 0x05], 0x00, 0x00, 6)]
#[case::pha(&[0x48], 0x00, 0x00, 3)]
#[case::pla(&[0x68], 0x00, 0x00, 4)]
fn instruction_cycle_counts(
    #[case] program: &[u8],
    #[case] x: u8,
    #[case] y: u8,
    #[case] cycles: u32,
) {
    let mut cpu = boot(program);
    cpu.set_x(x);
    cpu.set_y(y);
    assert_eq!(cpu.step_instruction(), cycles);
}

#[rstest]
#[case::same_page(0x00, 5)]
#[case::page_cross(0x10, 6)]
fn indirect_indexed_load_pays_for_page_cross(#[case] y: u8, #[case] cycles: u32) {
    // LDA ($10),Y with the pointer at $30F8
    let mut cpu = boot(&[0xB1, 0x10]);
    cpu.link_mut().load(0x0010, &[0xF8, 0x30]);
    cpu.link_mut().load(0x30F8_u16.wrapping_add(u16::from(y)), &[0x5A]);
    cpu.set_y(y);
    assert_eq!(cpu.step_instruction(), cycles);
    assert_eq!(cpu.a(), 0x5A);
}

#[test]
fn branch_timing_depends_on_outcome_and_page() {
    // BEQ not taken: Z is clear after reset.
    let mut cpu = boot(&[0xF0, 0x10]);
    assert_eq!(cpu.step_instruction(), 2);
    assert_eq!(cpu.pc(), ORIGIN + 2);

    let mut cpu = boot(&[0xD0, 0x10]);
    assert_eq!(cpu.step_instruction(), 3);
    assert_eq!(cpu.pc(), ORIGIN + 0x12);

    let mut cpu = boot_at(0x04FD, &[0xD0, 0x10]);
    assert_eq!(cpu.step_instruction(), 4);
    assert_eq!(cpu.pc(), 0x050F);

    let mut cpu = boot_at(0x0500, &[0xD0, 0xF0]);
    assert_eq!(cpu.step_instruction(), 4);
    assert_eq!(cpu.pc(), 0x04F2);
}

#[test]
fn jmp_indirect_does_not_carry_into_pointer_high_byte() {
    let mut cpu = boot(&[0x6C, 0xFF, 0x02]);
    cpu.link_mut().load(0x02FF, &[0x34, 0x56]);
    cpu.link_mut().load(0x0200, &[0x12]);
    assert_eq!(cpu.step_instruction(), 5);
    assert_eq!(cpu.pc(), 0x1234);
}

#[rstest]
#[case::decimal(true, 0x10)]
#[case::binary(false, 0x0A)]
fn decimal_adc_honours_bcd_switch(#[case] bcd: bool, #[case] expected: u8) {
    // SED; CLC; LDA #$09; ADC #$01
    let mut cpu = boot(&[0xF8, 0x18, 0xA9, 0x09, 0x69, 0x01]);
    cpu.set_bcd_enabled(bcd);
    for _ in 0..4 {
        cpu.step_instruction();
    }
    assert_eq!(cpu.a(), expected);
    assert!(!cpu.p().contains(StatusFlags::C));
}

#[test]
fn decimal_sbc_borrows_across_digits() {
    // SED; SEC; LDA #$10; SBC #$01
    let mut cpu = boot(&[0xF8, 0x38, 0xA9, 0x10, 0xE9, 0x01]);
    for _ in 0..4 {
        cpu.step_instruction();
    }
    assert_eq!(cpu.a(), 0x09);
    assert!(cpu.p().contains(StatusFlags::C));
}

#[test]
fn irq_waits_one_instruction_after_cli() {
    // CLI; NOP; NOP
    let mut cpu = boot(&[0x58, 0xEA, 0xEA]);
    cpu.set_irq(true);
    assert_eq!(cpu.step_instruction(), 2);
    assert_eq!(cpu.step_instruction(), 2, "the instruction after CLI still runs");
    assert_eq!(cpu.pc(), ORIGIN + 2);

    assert_eq!(cpu.step_instruction(), 7);
    assert_eq!(cpu.pc(), IRQ_HANDLER);
    assert!(cpu.p().contains(StatusFlags::I));
    let status = pushed(&cpu, 1);
    assert_eq!(status & StatusFlags::B.bits(), 0);
    assert_eq!(status & StatusFlags::T.bits(), StatusFlags::T.bits());
    assert_eq!(pushed(&cpu, 2), 0x02);
    assert_eq!(pushed(&cpu, 3), 0x04);
}

#[test]
fn taken_branch_defers_irq_by_one_instruction() {
    // CLI; NOP; BNE +2; NOP; NOP; NOP; NOP
    let mut cpu = boot(&[0x58, 0xEA, 0xD0, 0x02, 0xEA, 0xEA, 0xEA, 0xEA]);
    cpu.step_instruction();
    cpu.step_instruction();
    assert_eq!(cpu.step_instruction(), 3, "taken, same page");
    assert_eq!(cpu.pc(), ORIGIN + 6);

    cpu.set_irq(true);
    assert_eq!(cpu.step_instruction(), 2, "the branch target still runs");
    assert_eq!(cpu.pc(), ORIGIN + 7);
    assert_eq!(cpu.step_instruction(), 7);
    assert_eq!(cpu.pc(), IRQ_HANDLER);
    assert_eq!(pushed(&cpu, 2), 0x07);
    assert_eq!(pushed(&cpu, 3), 0x04);
}

#[test]
fn irq_seen_before_branch_completes_is_not_deferred() {
    // CLI; NOP; BNE +2
    let mut cpu = boot(&[0x58, 0xEA, 0xD0, 0x02, 0xEA, 0xEA, 0xEA]);
    cpu.step_instruction();
    cpu.step_instruction();
    cpu.step();
    cpu.set_irq(true);
    cpu.step();
    cpu.step();
    assert!(cpu.at_instruction_boundary());
    assert_eq!(cpu.pc(), ORIGIN + 6);
    assert_eq!(cpu.step_instruction(), 7);
    assert_eq!(cpu.pc(), IRQ_HANDLER);
}

#[test]
fn page_crossing_branch_polls_normally() {
    // CLI; NOP; BNE +$10 from $04FD into the next page
    let mut cpu = boot_at(0x04F9, &[0x58, 0xEA, 0xD0, 0x10]);
    cpu.step_instruction();
    cpu.step_instruction();
    assert_eq!(cpu.step_instruction(), 4);
    assert_eq!(cpu.pc(), 0x050D);

    cpu.set_irq(true);
    assert_eq!(cpu.step_instruction(), 7);
    assert_eq!(cpu.pc(), IRQ_HANDLER);
    assert_eq!(pushed(&cpu, 2), 0x0D);
    assert_eq!(pushed(&cpu, 3), 0x05);
}

#[test]
fn irq_is_ignored_while_masked() {
    let mut cpu = boot(&[0xEA, 0xEA]);
    cpu.set_irq(true);
    cpu.step_instruction();
    cpu.step_instruction();
    assert_eq!(cpu.pc(), ORIGIN + 2);
}

#[test]
fn nmi_is_taken_at_the_next_boundary() {
    // The first fetch after reset never polls, so let one instruction run.
    let mut cpu = boot(&[0xEA, 0xEA]);
    cpu.step_instruction();
    cpu.set_nmi(true);
    assert_eq!(cpu.step_instruction(), 7);
    assert_eq!(cpu.pc(), NMI_HANDLER);
    assert!(!cpu.nmi());
}

#[test]
fn brk_pushes_break_flag_and_skips_padding_byte() {
    let mut cpu = boot(&[0x00, 0xFF]);
    assert_eq!(cpu.step_instruction(), 7);
    assert_eq!(cpu.pc(), IRQ_HANDLER);
    assert_ne!(pushed(&cpu, 1) & StatusFlags::B.bits(), 0);
    assert_eq!(pushed(&cpu, 2), 0x02);
    assert_eq!(pushed(&cpu, 3), 0x04);
}

#[test]
fn nmi_during_brk_pushes_takes_nmi_vector() {
    let mut cpu = boot(&[0x00, 0xFF]);
    cpu.link_mut().load(NMI_HANDLER, &[0xEA]);
    // Opcode, padding byte and PCH push.
    for _ in 0..3 {
        cpu.step();
    }
    cpu.set_nmi(true);
    assert_eq!(cpu.step_instruction(), 4);
    assert_eq!(cpu.pc(), NMI_HANDLER);
    assert!(!cpu.nmi(), "the hijack consumes the edge");
    assert!(cpu.p().contains(StatusFlags::I));
    assert_ne!(pushed(&cpu, 1) & StatusFlags::B.bits(), 0, "B still marks a BRK");
    assert_eq!(pushed(&cpu, 2), 0x02);
    assert_eq!(pushed(&cpu, 3), 0x04);

    assert_eq!(cpu.step_instruction(), 2);
    assert_eq!(cpu.pc(), NMI_HANDLER + 1);
}

#[test]
fn nmi_after_brk_status_push_waits_for_handler() {
    let mut cpu = boot(&[0x00, 0xFF]);
    cpu.link_mut().load(IRQ_HANDLER, &[0xEA]);
    // Up to and including the status push.
    for _ in 0..5 {
        cpu.step();
    }
    cpu.set_nmi(true);
    assert_eq!(cpu.step_instruction(), 2);
    assert_eq!(cpu.pc(), IRQ_HANDLER);
    assert!(cpu.nmi());

    assert_eq!(cpu.step_instruction(), 2, "no poll on the first handler fetch");
    assert_eq!(cpu.step_instruction(), 7);
    assert_eq!(cpu.pc(), NMI_HANDLER);
}

#[test]
fn jsr_and_rts_round_trip() {
    let mut cpu = boot(&[0x20, 0x00, 0x05]);
    cpu.link_mut().load(0x0500, &[0x60]);
    assert_eq!(cpu.step_instruction(), 6);
    assert_eq!(cpu.pc(), 0x0500);
    assert_eq!(cpu.step_instruction(), 6);
    assert_eq!(cpu.pc(), ORIGIN + 3);
    assert_eq!(cpu.s(), 0xFD);
}

#[test]
fn rdy_low_stalls_read_cycles() {
    let mut cpu = boot(&[0xA9, 0x33]);
    cpu.set_rdy(false);
    for _ in 0..5 {
        cpu.step();
    }
    assert!(cpu.rdy_frozen());
    assert_eq!(cpu.pc(), ORIGIN);
    assert_eq!(cpu.total_executed_cycles(), 12);
    cpu.set_rdy(true);
    assert_eq!(cpu.step_instruction(), 2);
    assert_eq!(cpu.a(), 0x33);
}

#[test]
fn jam_halts_the_core() {
    let mut cpu = boot(&[0x02, 0xEA]);
    assert_eq!(cpu.step_instruction(), MAX_INSTRUCTION_CYCLES);
    assert!(!cpu.at_instruction_boundary());
    assert_eq!(cpu.pc(), ORIGIN + 1);
    cpu.step();
    assert_eq!(cpu.pc(), ORIGIN + 1);
}

#[test]
fn lax_and_sax_use_both_registers() {
    // LAX $10; LDA #$0F; SAX $11
    let mut cpu = boot(&[0xA7, 0x10, 0xA9, 0x0F, 0x87, 0x11]);
    cpu.link_mut().load(0x0010, &[0x3C]);
    cpu.step_instruction();
    assert_eq!((cpu.a(), cpu.x()), (0x3C, 0x3C));
    cpu.step_instruction();
    cpu.step_instruction();
    assert_eq!(cpu.link().bytes()[0x11], 0x0C);
}

#[test]
fn dcp_decrements_then_compares() {
    // LDA #$40; DCP $10
    let mut cpu = boot(&[0xA9, 0x40, 0xC7, 0x10]);
    cpu.link_mut().load(0x0010, &[0x41]);
    cpu.step_instruction();
    assert_eq!(cpu.step_instruction(), 5);
    assert_eq!(cpu.link().bytes()[0x10], 0x40);
    assert!(cpu.p().contains(StatusFlags::Z));
    assert!(cpu.p().contains(StatusFlags::C));
}

#[test]
fn plp_delays_interrupt_mask_change() {
    // PHP with I clear is pushed by hand; PLP; NOP
    let mut cpu = boot(&[0x28, 0xEA, 0xEA]);
    cpu.link_mut().load(0x01FE, &[StatusFlags::T.bits()]);
    cpu.set_irq(true);
    assert_eq!(cpu.step_instruction(), 4);
    assert!(cpu.p().contains(StatusFlags::I), "I changes at the next fetch");
    assert!(!cpu.iflag_pending());
    cpu.step_instruction();
    assert_eq!(cpu.step_instruction(), 7);
    assert_eq!(cpu.pc(), IRQ_HANDLER);
}
