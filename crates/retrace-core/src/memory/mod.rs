//! Memory domains: named, bounds-checked views of emulated address spaces.

/// Domain type, storage backends and byte primitives.
pub mod domain;
/// Multi-byte codecs layered on the byte primitives.
pub mod codec;
/// Case-insensitive domain collection.
pub mod list;

pub use codec::AccessWidth;
pub use domain::{DomainAccess, DomainBackend, Endian, MemoryDomain, SharedBytes};
pub use list::{MemoryDomainList, SYSTEM_BUS};

/// Size in bytes of the 6502 address space (64 KiB).
pub const ADDRESS_SPACE_BYTES: usize = u16::MAX as usize + 1;

/// Allocates a zeroed 64 KiB backing store.
#[must_use]
pub fn new_address_space() -> Box<[u8]> {
    vec![0; ADDRESS_SPACE_BYTES].into_boxed_slice()
}
