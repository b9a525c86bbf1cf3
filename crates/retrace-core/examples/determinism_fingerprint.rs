//! Deterministic replay fingerprint used for cross-host comparison.
//!
//! Boots a fixed program, saves mid-frame, replays from the save and prints
//! a digest over both runs. Any divergence between hosts changes the output.

use bitflags as _;
use proptest as _;
use retrace_core::{Machine, MachineConfig, Statable, RAM_DOMAIN};
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use sha2::{Digest, Sha256};
use thiserror as _;
use tracing as _;
use tracing_subscriber::EnvFilter;

// Fills page $03 with a running sum and keeps a frame-independent counter at $10.
const PROGRAM: &[u8] = &[
    0xA2, 0x00, // LDX #$00
    0xE6, 0x10, // INC $10
    0x8A, // TXA
    0x65, 0x10, // ADC $10
    0x9D, 0x00, 0x03, // STA $0300,X
    0xE8, // INX
    0xD0, 0xF5, // BNE
    0x4C, 0x02, 0x80, // JMP $8002
];

fn image() -> Vec<u8> {
    let mut image = vec![0xEA; 0x8000];
    image[..PROGRAM.len()].copy_from_slice(PROGRAM);
    image[0x7FFC..0x7FFE].copy_from_slice(&[0x00, 0x80]);
    image
}

fn fingerprint() -> Result<String, Box<dyn std::error::Error>> {
    let mut machine = Machine::new(MachineConfig::default());
    machine.load_rom(&image())?;
    machine.reset();
    machine.frame_advance();
    machine.run_cycles(1_234);
    let checkpoint = machine.save_state()?;

    let mut hash = Sha256::new();
    for _ in 0..2 {
        machine.load_state(&checkpoint)?;
        machine.frame_advance();
        let ram = machine.domains().get(RAM_DOMAIN)?;
        hash.update(ram.hash_region(0, ram.size())?);
        hash.update(machine.cpu().total_executed_cycles().to_le_bytes());
        hash.update(machine.save_state()?.digest());
    }
    Ok(format!("{:X}", hash.finalize()))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    println!("{}", fingerprint()?);
    Ok(())
}
