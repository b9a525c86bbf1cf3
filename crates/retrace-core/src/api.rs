//! Host-facing configuration, debugger surface and trace hooks.

use std::collections::BTreeMap;

use crate::error::{Capability, CoreError, Result};
use crate::watch::MemoryCallbackSystem;

/// CPU cycles per emulated frame (NTSC NES timing).
pub const DEFAULT_CYCLES_PER_FRAME: u32 = 29_781;

/// Default RAM size of the reference machine; the upper half of the bus is ROM.
pub const DEFAULT_RAM_BYTES: usize = 0x8000;

/// Reference machine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MachineConfig {
    /// Bytes of RAM mapped from `$0000`.
    pub ram_size: usize,
    /// Cycles executed by one frame advance.
    pub cycles_per_frame: u32,
    /// Honour the decimal flag in ADC/SBC. Off for CPUs with BCD fused out.
    pub bcd_enabled: bool,
    /// Emit a trace row per instruction at `trace` level on the `retrace::trace` target.
    pub tracing_enabled: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            ram_size: DEFAULT_RAM_BYTES,
            cycles_per_frame: DEFAULT_CYCLES_PER_FRAME,
            bcd_enabled: true,
            tracing_enabled: false,
        }
    }
}

/// Debugger stepping granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum StepType {
    /// Run to the next instruction boundary.
    Into,
    /// Run until the current subroutine returns.
    Out,
    /// Step over subroutine calls.
    Over,
}

/// Register contents together with their width in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RegisterValue {
    /// Zero-extended value.
    pub value: u64,
    /// Meaningful bits in `value`.
    pub bit_width: u8,
}

impl RegisterValue {
    /// 8-bit register.
    #[must_use]
    pub const fn byte(value: u8) -> Self {
        Self {
            value: value as u64,
            bit_width: 8,
        }
    }

    /// 16-bit register.
    #[must_use]
    pub const fn word(value: u16) -> Self {
        Self {
            value: value as u64,
            bit_width: 16,
        }
    }

    /// Single flag bit.
    #[must_use]
    pub const fn flag(set: bool) -> Self {
        Self {
            value: set as u64,
            bit_width: 1,
        }
    }
}

/// Debugger surface of an emulated system.
///
/// Every method has a refusing default so a core only implements what it
/// actually supports; refusals surface as
/// [`ErrorKind::UnsupportedCapability`](crate::ErrorKind).
pub trait Debuggable {
    /// Short core name used in error messages.
    fn core_name(&self) -> &str;

    /// Snapshot of every named register and flag.
    ///
    /// # Errors
    ///
    /// Refuses by default.
    fn cpu_flags_and_registers(&self) -> Result<BTreeMap<String, RegisterValue>> {
        Err(CoreError::unsupported(
            self.core_name(),
            Capability::Register("*".to_owned()),
        ))
    }

    /// Writes one named register or flag.
    ///
    /// # Errors
    ///
    /// Refuses by default.
    fn set_cpu_register(&mut self, register: &str, _value: u32) -> Result<()> {
        Err(CoreError::unsupported(
            self.core_name(),
            Capability::Register(register.to_owned()),
        ))
    }

    /// Watchpoint registry, when the core dispatches memory callbacks.
    fn memory_callbacks(&self) -> Option<&MemoryCallbackSystem> {
        None
    }

    /// Returns `true` when [`Debuggable::step`] accepts `step`.
    fn can_step(&self, _step: StepType) -> bool {
        false
    }

    /// Advances by one unit of `step`.
    ///
    /// # Errors
    ///
    /// Refuses by default.
    fn step(&mut self, step: StepType) -> Result<()> {
        Err(CoreError::unsupported(self.core_name(), Capability::Step(step)))
    }

    /// Cycles executed since power-on.
    fn total_executed_cycles(&self) -> u64;
}

/// Column header matching [`TraceInfo::register_info`].
pub const TRACE_HEADER: &str =
    "6502: PC, machine code, mnemonic, operands, registers (A, X, Y, P, SP), flags (NVTBDIZC), cycles";

/// One trace row, produced at each opcode fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct TraceInfo {
    /// Address, raw bytes and disassembly, padded to a fixed column.
    pub disassembly: String,
    /// Registers, flag letters and cycle counters.
    pub register_info: String,
}

/// Receives trace rows in execution order.
pub trait TraceSink {
    /// Records one row.
    fn on_trace(&mut self, info: &TraceInfo);
}

impl TraceSink for Vec<TraceInfo> {
    fn on_trace(&mut self, info: &TraceInfo) {
        self.push(info.clone());
    }
}
