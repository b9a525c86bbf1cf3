//! Reference machine: a 6502 wired to RAM, an optional ROM image and watchpoints.
//!
//! RAM is mapped from `$0000`. A loaded ROM image is mirrored across the rest
//! of the bus so that its last byte sits at `$FFFF`, which puts the vectors at
//! the end of the image. Without a ROM, reads above RAM return the open-bus
//! value (the last byte driven on the bus).

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::api::{Debuggable, MachineConfig, RegisterValue, StepType, TraceInfo, TraceSink};
use crate::cpu::{CpuLink, Mos6502, CORE_NAME};
use crate::error::{Capability, CoreError, Result};
use crate::memory::{
    DomainBackend, Endian, MemoryDomain, MemoryDomainList, ADDRESS_SPACE_BYTES, SYSTEM_BUS,
};
use crate::sync::{Serializer, Statable, SyncResult};
use crate::watch::MemoryCallbackSystem;

/// Name of the RAM domain.
pub const RAM_DOMAIN: &str = "RAM";
/// Name of the ROM domain, present once an image is loaded.
pub const ROM_DOMAIN: &str = "ROM";

#[derive(Debug)]
struct Bus {
    ram: Box<[u8]>,
    rom: Box<[u8]>,
    open_bus: u8,
}

type SharedBus = Rc<RefCell<Bus>>;

impl Bus {
    fn new(ram_size: usize) -> Self {
        Self {
            ram: vec![0; ram_size].into_boxed_slice(),
            rom: Box::default(),
            open_bus: 0,
        }
    }

    fn peek(&self, addr: u16) -> u8 {
        let index = usize::from(addr);
        if let Some(byte) = self.ram.get(index) {
            return *byte;
        }
        let len = self.rom.len();
        if len == 0 {
            return self.open_bus;
        }
        let from_top = ADDRESS_SPACE_BYTES - index;
        self.rom[(len - from_top % len) % len]
    }

    fn read(&mut self, addr: u16) -> u8 {
        let value = self.peek(addr);
        self.open_bus = value;
        value
    }

    fn write(&mut self, addr: u16, value: u8) {
        self.poke(addr, value);
        self.open_bus = value;
    }

    // Writes above RAM land on ROM and are dropped.
    fn poke(&mut self, addr: u16, value: u8) {
        if let Some(byte) = self.ram.get_mut(usize::from(addr)) {
            *byte = value;
        }
    }
}

/// The CPU's view of the machine bus.
///
/// Data reads, writes and opcode fetches are reported to the watchpoint
/// registry under the [`SYSTEM_BUS`] scope. Dummy reads reach the bus (and
/// update open bus) without firing read watchpoints. The bus borrow is always
/// released before a callback runs.
pub struct SystemBusLink {
    bus: SharedBus,
    callbacks: Rc<MemoryCallbackSystem>,
}

impl CpuLink for SystemBusLink {
    fn read_memory(&mut self, addr: u16) -> u8 {
        let value = self.bus.borrow_mut().read(addr);
        self.callbacks
            .call_reads(SYSTEM_BUS, u32::from(addr), u32::from(value));
        value
    }

    fn dummy_read_memory(&mut self, addr: u16) -> u8 {
        self.bus.borrow_mut().read(addr)
    }

    fn peek_memory(&self, addr: u16) -> u8 {
        self.bus.borrow().peek(addr)
    }

    fn write_memory(&mut self, addr: u16, value: u8) {
        self.bus.borrow_mut().write(addr, value);
        self.callbacks
            .call_writes(SYSTEM_BUS, u32::from(addr), u32::from(value));
    }

    fn on_exec_fetch(&mut self, addr: u16) {
        if self.callbacks.has_executes() {
            let opcode = self.bus.borrow().peek(addr);
            self.callbacks
                .call_executes(SYSTEM_BUS, u32::from(addr), u32::from(opcode));
        }
    }
}

impl fmt::Debug for SystemBusLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemBusLink")
            .field("open_bus", &self.bus.borrow().open_bus)
            .finish_non_exhaustive()
    }
}

/// Trace sink forwarding rows to `tracing` at `trace` level.
#[derive(Debug, Default)]
pub struct LogTraceSink;

impl TraceSink for LogTraceSink {
    fn on_trace(&mut self, info: &TraceInfo) {
        tracing::trace!(target: "retrace::trace", "{}{}", info.disassembly, info.register_info);
    }
}

fn build_domains(bus: &SharedBus, callbacks: &Rc<MemoryCallbackSystem>) -> MemoryDomainList {
    let ram_size = bus.borrow().ram.len();
    let ram = {
        let peek_bus = Rc::clone(bus);
        let poke_bus = Rc::clone(bus);
        MemoryDomain::new(
            RAM_DOMAIN,
            Endian::Little,
            1,
            DomainBackend::from_fns(
                ram_size as u64,
                move |addr| peek_bus.borrow().ram[addr as usize],
                Some(Box::new(move |addr: u64, value: u8| {
                    poke_bus.borrow_mut().ram[addr as usize] = value;
                })),
            ),
        )
    };
    let system_bus = {
        let peek_bus = Rc::clone(bus);
        let poke_bus = Rc::clone(bus);
        MemoryDomain::new(
            SYSTEM_BUS,
            Endian::Little,
            1,
            DomainBackend::from_fns(
                ADDRESS_SPACE_BYTES as u64,
                move |addr| peek_bus.borrow().peek(addr as u16),
                Some(Box::new(move |addr: u64, value: u8| {
                    poke_bus.borrow_mut().poke(addr as u16, value);
                })),
            ),
        )
        .with_write_callbacks(Rc::clone(callbacks))
    };
    let mut domains = vec![ram, system_bus];
    let rom = bus.borrow().rom.clone();
    if !rom.is_empty() {
        domains.push(MemoryDomain::new(
            ROM_DOMAIN,
            Endian::Little,
            1,
            DomainBackend::read_only(&rom),
        ));
    }
    MemoryDomainList::new(domains)
}

/// A 6502 with RAM, an optional ROM and watchpoint wiring.
pub struct Machine {
    config: MachineConfig,
    bus: SharedBus,
    callbacks: Rc<MemoryCallbackSystem>,
    cpu: Mos6502<SystemBusLink>,
    domains: MemoryDomainList,
    frame: u64,
}

impl Machine {
    /// Powers on a machine; the CPU runs its reset sequence on the first cycles.
    ///
    /// `ram_size` is capped at the 64 KiB address space.
    #[must_use]
    pub fn new(config: MachineConfig) -> Self {
        let ram_size = config.ram_size.min(ADDRESS_SPACE_BYTES);
        let bus = Rc::new(RefCell::new(Bus::new(ram_size)));
        let callbacks = Rc::new(MemoryCallbackSystem::new(CORE_NAME, [SYSTEM_BUS]));
        let mut cpu = Mos6502::new(SystemBusLink {
            bus: Rc::clone(&bus),
            callbacks: Rc::clone(&callbacks),
        });
        cpu.set_bcd_enabled(config.bcd_enabled);
        if config.tracing_enabled {
            cpu.set_trace_sink(Some(Box::new(LogTraceSink)));
        }
        let domains = build_domains(&bus, &callbacks);
        tracing::debug!(
            ram_size,
            cycles_per_frame = config.cycles_per_frame,
            bcd = config.bcd_enabled,
            "machine power-on"
        );
        Self {
            config,
            bus,
            callbacks,
            cpu,
            domains,
            frame: 0,
        }
    }

    /// Maps `image` at the top of the bus, mirrored down to the end of RAM.
    ///
    /// Call [`Machine::reset`] afterwards to boot from the image's vectors.
    ///
    /// # Errors
    ///
    /// Fails with an address error when the image is empty or larger than the
    /// space above RAM.
    pub fn load_rom(&mut self, image: &[u8]) -> Result<()> {
        let ram_size = self.bus.borrow().ram.len();
        if image.is_empty() {
            return Err(CoreError::InvalidLength {
                domain: ROM_DOMAIN.to_owned(),
                len: 0,
            });
        }
        if image.len() > ADDRESS_SPACE_BYTES - ram_size {
            return Err(CoreError::RangeOutOfRange {
                domain: SYSTEM_BUS.to_owned(),
                addr: ram_size as i64,
                len: image.len() as u64,
                size: ADDRESS_SPACE_BYTES as u64,
            });
        }
        self.bus.borrow_mut().rom = image.into();
        self.domains = build_domains(&self.bus, &self.callbacks);
        tracing::debug!(bytes = image.len(), "rom loaded");
        Ok(())
    }

    /// Hard reset: clears RAM, open bus and the frame counter, and resets the CPU.
    pub fn reset(&mut self) {
        {
            let mut bus = self.bus.borrow_mut();
            bus.ram.fill(0);
            bus.open_bus = 0;
        }
        self.cpu.reset();
        self.frame = 0;
        tracing::debug!("machine reset");
    }

    /// Pulses the reset line; RAM and registers survive.
    pub fn soft_reset(&mut self) {
        self.cpu.soft_reset();
    }

    /// Advances one CPU cycle.
    pub fn step_cycle(&mut self) {
        self.cpu.step();
    }

    /// Advances `cycles` CPU cycles.
    pub fn run_cycles(&mut self, cycles: u32) {
        for _ in 0..cycles {
            self.cpu.step();
        }
    }

    /// Runs one frame's worth of cycles and bumps the frame counter.
    pub fn frame_advance(&mut self) {
        self.run_cycles(self.config.cycles_per_frame);
        self.frame += 1;
    }

    /// Frames completed since the last hard reset.
    #[must_use]
    pub const fn frame(&self) -> u64 {
        self.frame
    }

    /// Configuration the machine was built with.
    #[must_use]
    pub const fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Drives the IRQ line.
    pub fn set_irq(&mut self, asserted: bool) {
        self.cpu.set_irq(asserted);
    }

    /// Latches an NMI.
    pub fn set_nmi(&mut self, latched: bool) {
        self.cpu.set_nmi(latched);
    }

    /// Drives the `RDY` line.
    pub fn set_rdy(&mut self, ready: bool) {
        self.cpu.set_rdy(ready);
    }

    /// Installs or removes a per-instruction trace sink.
    pub fn set_trace_sink(&mut self, sink: Option<Box<dyn TraceSink>>) {
        self.cpu.set_trace_sink(sink);
    }

    /// The CPU.
    #[must_use]
    pub const fn cpu(&self) -> &Mos6502<SystemBusLink> {
        &self.cpu
    }

    /// Mutable CPU, for tests and tools that poke registers directly.
    pub fn cpu_mut(&mut self) -> &mut Mos6502<SystemBusLink> {
        &mut self.cpu
    }

    /// Exposed memory domains.
    #[must_use]
    pub const fn domains(&self) -> &MemoryDomainList {
        &self.domains
    }

    /// Mutable domain list, for pokes.
    pub fn domains_mut(&mut self) -> &mut MemoryDomainList {
        &mut self.domains
    }

    /// Watchpoint registry.
    #[must_use]
    pub fn callbacks(&self) -> &MemoryCallbackSystem {
        &self.callbacks
    }
}

impl fmt::Debug for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Machine")
            .field("config", &self.config)
            .field("frame", &self.frame)
            .field("cpu", &self.cpu)
            .field("domains", &self.domains)
            .finish_non_exhaustive()
    }
}

impl Statable for Machine {
    fn sync_state(&mut self, ser: &mut Serializer<'_>) -> SyncResult<()> {
        ser.begin_section("Machine")?;
        ser.sync("Frame", &mut self.frame)?;
        {
            let mut bus = self.bus.borrow_mut();
            ser.sync_bytes("RAM", &mut bus.ram)?;
            ser.sync("OpenBus", &mut bus.open_bus)?;
        }
        ser.end_section()?;
        self.cpu.sync_state(ser)
    }
}

impl Debuggable for Machine {
    fn core_name(&self) -> &str {
        CORE_NAME
    }

    fn cpu_flags_and_registers(&self) -> Result<BTreeMap<String, RegisterValue>> {
        Ok(self.cpu.registers())
    }

    fn set_cpu_register(&mut self, register: &str, value: u32) -> Result<()> {
        self.cpu.set_register(register, value)
    }

    fn memory_callbacks(&self) -> Option<&MemoryCallbackSystem> {
        Some(&self.callbacks)
    }

    fn can_step(&self, step: StepType) -> bool {
        step == StepType::Into
    }

    fn step(&mut self, step: StepType) -> Result<()> {
        match step {
            StepType::Into => {
                self.cpu.step_instruction();
                Ok(())
            }
            StepType::Out | StepType::Over => {
                Err(CoreError::unsupported(CORE_NAME, Capability::Step(step)))
            }
        }
    }

    fn total_executed_cycles(&self) -> u64 {
        self.cpu.total_executed_cycles()
    }
}
