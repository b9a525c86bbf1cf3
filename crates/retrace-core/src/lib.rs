//! Cycle-exact 6502 core with memory domains, watchpoints and deterministic state sync.
//!
//! The CPU advances one bus cycle per [`Mos6502::step`]. Host tools observe
//! the machine through named [`MemoryDomain`]s and [`Watchpoint`]s, and
//! capture or restore its full state at any cycle through [`Statable`].

/// Host-facing configuration, debugger surface and trace hooks.
pub mod api;
pub use api::{
    Debuggable, MachineConfig, RegisterValue, StepType, TraceInfo, TraceSink,
    DEFAULT_CYCLES_PER_FRAME, DEFAULT_RAM_BYTES, TRACE_HEADER,
};

/// Error taxonomy shared by domains, watchpoints and the debugger surface.
pub mod error;
pub use error::{AccessFault, Capability, CoreError, ErrorKind, Result};

/// Micro-op 6502 interpreter.
pub mod cpu;
pub use cpu::{
    CpuLink, FlatMemory, Mos6502, StatusFlags, IRQ_VECTOR, MAX_INSTRUCTION_CYCLES, NMI_VECTOR,
    RESET_VECTOR,
};

/// Named, bounds-checked memory domains.
pub mod memory;
pub use memory::{
    new_address_space, AccessWidth, DomainAccess, DomainBackend, Endian, MemoryDomain,
    MemoryDomainList, SharedBytes, ADDRESS_SPACE_BYTES, SYSTEM_BUS,
};

/// Memory watchpoints.
pub mod watch;
pub use watch::{
    CallbackType, MemoryCallbackFlags, MemoryCallbackFn, MemoryCallbackSystem, Scope, Watchpoint,
};

/// Deterministic save, load and inspection of component state.
pub mod sync;
pub use sync::{
    diff_states, FieldDiff, FieldValue, NamedField, SaveState, Serializer, Statable, StateVersion,
    SyncError, SyncResult, SyncValue, STATE_HEADER_BYTES, STATE_MAGIC,
};

/// Reference machine wiring the CPU to RAM, ROM and watchpoints.
pub mod machine;
pub use machine::{LogTraceSink, Machine, SystemBusLink, RAM_DOMAIN, ROM_DOMAIN};

/// Threaded adapter for foreign emulation engines.
pub mod bridge;
pub use bridge::{BridgeError, BridgeHandle, EngineBridge, ForeignEngine, FrameReport};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use tracing_subscriber as _;
