//! Bus interface the CPU drives every cycle.

/// Memory and hook callbacks supplied by the host system.
///
/// Each method is invoked synchronously from inside a CPU cycle. An
/// implementation must not hold a borrow of shared system state across a
/// call into user callbacks, since those callbacks may touch the same state.
pub trait CpuLink {
    /// Bus read with side effects (I/O registers, read watchpoints).
    fn read_memory(&mut self, addr: u16) -> u8;

    /// Bus read whose value the CPU discards.
    ///
    /// Defaults to a normal read so that read-sensitive hardware still sees it.
    fn dummy_read_memory(&mut self, addr: u16) -> u8 {
        self.read_memory(addr)
    }

    /// Side-effect free read for disassembly and tracing.
    fn peek_memory(&self, addr: u16) -> u8;

    /// Bus write.
    fn write_memory(&mut self, addr: u16, value: u8);

    /// Called once per opcode fetch, before the fetch is performed.
    fn on_exec_fetch(&mut self, _addr: u16) {}
}

/// Flat 64 KiB array with no side effects; useful for tests and tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatMemory {
    bytes: Box<[u8]>,
}

impl FlatMemory {
    /// Zeroed 64 KiB.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bytes: crate::memory::new_address_space(),
        }
    }

    /// Copies `data` to `addr`, wrapping at the top of the address space.
    pub fn load(&mut self, addr: u16, data: &[u8]) {
        for (offset, byte) in data.iter().enumerate() {
            let index = usize::from(addr.wrapping_add(offset as u16));
            self.bytes[index] = *byte;
        }
    }

    /// Whole address space.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl Default for FlatMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuLink for FlatMemory {
    fn read_memory(&mut self, addr: u16) -> u8 {
        self.bytes[usize::from(addr)]
    }

    fn peek_memory(&self, addr: u16) -> u8 {
        self.bytes[usize::from(addr)]
    }

    fn write_memory(&mut self, addr: u16, value: u8) {
        self.bytes[usize::from(addr)] = value;
    }
}
