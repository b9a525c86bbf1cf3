//! Save-state transparency: restoring a state at any cycle replays identically.

#![allow(clippy::pedantic, clippy::nursery)]

use bitflags as _;
use proptest::prelude::*;
use retrace_core::{
    diff_states, FieldValue, Machine, MachineConfig, SaveState, Statable, SyncError, RAM_DOMAIN,
    STATE_HEADER_BYTES, STATE_MAGIC,
};
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use sha2 as _;
use thiserror as _;
use tracing as _;
use tracing_subscriber as _;

// Counts in zero page and writes a rolling pattern through an indexed store.
const COUNTER_PROGRAM: &[u8] = &[
    0xE6, 0x10, // INC $10
    0xA5, 0x10, // LDA $10
    0x69, 0x03, // ADC #$03
    0x9D, 0x00, 0x03, // STA $0300,X
    0xE8, // INX
    0xD0, 0xF5, // BNE back to LDA
    0x4C, 0x00, 0x80, // JMP $8000
];

#[derive(Debug, Clone, PartialEq, Eq)]
struct Snapshot {
    pc: u16,
    a: u8,
    x: u8,
    y: u8,
    s: u8,
    p: u8,
    opcode: u16,
    micro_index: i32,
    cycles: u64,
}

fn snapshot(machine: &Machine) -> Snapshot {
    let cpu = machine.cpu();
    Snapshot {
        pc: cpu.pc(),
        a: cpu.a(),
        x: cpu.x(),
        y: cpu.y(),
        s: cpu.s(),
        p: cpu.p().bits(),
        opcode: cpu.opcode(),
        micro_index: cpu.micro_index(),
        cycles: cpu.total_executed_cycles(),
    }
}

fn run_trace(machine: &mut Machine, cycles: u32) -> Vec<Snapshot> {
    (0..cycles)
        .map(|_| {
            machine.step_cycle();
            snapshot(machine)
        })
        .collect()
}

fn ram_hash(machine: &Machine) -> [u8; 32] {
    let ram = machine.domains().get(RAM_DOMAIN).expect("ram");
    ram.hash_region(0, ram.size()).expect("whole domain")
}

fn booted(image_tail: &[u8], program: &[u8]) -> Machine {
    let mut image = vec![0xEA; 0x8000];
    image[..program.len()].copy_from_slice(program);
    let tail = image.len() - image_tail.len();
    image[tail..].copy_from_slice(image_tail);
    let mut machine = Machine::new(MachineConfig::default());
    machine.load_rom(&image).expect("fits");
    machine.reset();
    machine
}

fn counter_machine() -> Machine {
    booted(&[0x00, 0x80, 0x00, 0x80], COUNTER_PROGRAM)
}

#[test]
fn save_run_restore_run_is_identical_mid_instruction() {
    let mut machine = counter_machine();
    machine.run_cycles(1_001);
    let state = machine.save_state().expect("save");

    let first = run_trace(&mut machine, 5_000);
    let first_ram = ram_hash(&machine);
    machine.load_state(&state).expect("load");
    let second = run_trace(&mut machine, 5_000);

    assert_eq!(first, second);
    assert_eq!(first_ram, ram_hash(&machine));
}

#[test]
fn restore_survives_irq_and_nmi_in_flight() {
    let mut machine = counter_machine();
    machine.run_cycles(200);
    machine.set_nmi(true);
    machine.run_cycles(3);
    let state = machine.save_state().expect("save");
    let first = run_trace(&mut machine, 600);
    machine.load_state(&state).expect("load");
    assert_eq!(first, run_trace(&mut machine, 600));
}

#[test]
fn state_blob_has_header_and_checksum() {
    let mut machine = counter_machine();
    machine.run_cycles(50);
    let state = machine.save_state().expect("save");
    assert_eq!(&state.as_bytes()[..8], &STATE_MAGIC);
    assert!(state.len() > STATE_HEADER_BYTES + 0x8000);

    let mut corrupted = state.clone().into_bytes();
    let last = corrupted.len() - 1;
    corrupted[last] ^= 0xFF;
    assert_eq!(
        machine.load_state(&SaveState::from_bytes(corrupted)),
        Err(SyncError::ChecksumMismatch)
    );

    let mut bad_magic = state.into_bytes();
    bad_magic[0] = b'X';
    assert_eq!(
        machine.load_state(&SaveState::from_bytes(bad_magic)),
        Err(SyncError::BadMagic)
    );
}

#[test]
fn state_from_other_ram_size_is_rejected() {
    let mut small = Machine::new(MachineConfig {
        ram_size: 0x800,
        ..MachineConfig::default()
    });
    let state = small.save_state().expect("save");
    let mut machine = counter_machine();
    assert!(matches!(
        machine.load_state(&state),
        Err(SyncError::LengthMismatch { ref field, expected: 0x8000, found: 0x800 })
            if field == "Machine/RAM"
    ));
}

#[test]
fn rejected_state_keeps_the_running_machine() {
    let mut small = Machine::new(MachineConfig {
        ram_size: 0x800,
        ..MachineConfig::default()
    });
    let foreign = small.save_state().expect("save");

    let mut machine = counter_machine();
    machine.frame_advance();
    machine.run_cycles(37);
    let before = machine.save_state().expect("save");
    let ram_before = ram_hash(&machine);

    assert!(machine.load_state(&foreign).is_err());
    assert_eq!(machine.frame(), 1);
    assert_eq!(ram_hash(&machine), ram_before);
    assert_eq!(machine.save_state().expect("save").digest(), before.digest());

    let resumed = run_trace(&mut machine, 300);
    machine.load_state(&before).expect("load");
    assert_eq!(resumed, run_trace(&mut machine, 300));
}

#[test]
fn inspection_diff_names_changed_fields() {
    let mut machine = counter_machine();
    machine.run_cycles(20);
    let before = machine.inspect_state().expect("inspect");
    machine.step_cycle();
    let after = machine.inspect_state().expect("inspect");

    let diffs = diff_states(&before, &after);
    let cycles = diffs
        .iter()
        .find(|diff| diff.path == "MOS6502/TotalExecutedCycles")
        .expect("cycle counter changed");
    assert_eq!(cycles.left, Some(FieldValue::Unsigned(20)));
    assert_eq!(cycles.right, Some(FieldValue::Unsigned(21)));
    assert!(diffs.iter().all(|diff| diff.path != "Machine/Frame"));
    assert!(before.iter().any(|field| field.path == "Machine/RAM"));
}

#[test]
fn identical_inputs_give_identical_fingerprints() {
    let fingerprint = || {
        let mut machine = counter_machine();
        for _ in 0..3 {
            machine.frame_advance();
        }
        (ram_hash(&machine), machine.save_state().expect("save").digest())
    };
    assert_eq!(fingerprint(), fingerprint());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn restore_is_transparent_for_arbitrary_programs(
        program in proptest::collection::vec(any::<u8>(), 64),
        warmup in 0_u32..400,
        window in 1_u32..400,
    ) {
        let mut machine = booted(&[0x00, 0x80, 0x00, 0x80, 0x00, 0x80], &program);
        machine.run_cycles(warmup);
        let state = machine.save_state().expect("save");
        let first = run_trace(&mut machine, window);
        machine.load_state(&state).expect("load");
        prop_assert_eq!(first, run_trace(&mut machine, window));
    }
}
