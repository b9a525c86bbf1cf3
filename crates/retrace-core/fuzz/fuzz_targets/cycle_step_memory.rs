#![no_main]

use libfuzzer_sys::fuzz_target;
use retrace_core::{
    AccessWidth, Machine, MachineConfig, SaveState, Statable, RAM_DOMAIN, SYSTEM_BUS,
};

fuzz_target!(|data: &[u8]| {
    if data.len() < 8 {
        return;
    }

    let (header, rom) = data.split_at(8);
    let cycles = u32::from(u16::from_le_bytes([header[0], header[1]]));
    let addr = i64::from(i32::from_le_bytes([header[2], header[3], header[4], header[5]]));
    let width = match header[6] & 3 {
        0 => AccessWidth::One,
        1 => AccessWidth::Two,
        2 => AccessWidth::Three,
        _ => AccessWidth::Four,
    };

    let mut machine = Machine::new(MachineConfig::default());
    if !rom.is_empty() && machine.load_rom(rom).is_err() {
        return;
    }
    machine.reset();
    machine.set_irq(header[7] & 1 != 0);
    machine.set_nmi(header[7] & 2 != 0);
    machine.run_cycles(cycles);

    if let Ok(bus) = machine.domains_mut().get_mut(SYSTEM_BUS) {
        let _ = bus.read_unsigned(addr, width);
        let _ = bus.write_unsigned(addr, u32::from(header[7]), width);
    }
    if let Ok(ram) = machine.domains().get(RAM_DOMAIN) {
        let _ = ram.read_region(addr, u64::from(header[6]));
    }

    let state = machine.save_state().expect("save never fails");
    let before = machine.cpu().total_executed_cycles();
    machine.run_cycles(64);
    machine.load_state(&state).expect("own state loads");
    assert_eq!(machine.cpu().total_executed_cycles(), before);

    let _ = machine.load_state(&SaveState::from_bytes(data.to_vec()));
});
