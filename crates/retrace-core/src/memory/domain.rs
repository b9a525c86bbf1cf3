//! Named, bounds-checked address spaces and their storage backends.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use sha2::{Digest, Sha256};

use crate::error::{AccessFault, CoreError, Result};
use crate::watch::MemoryCallbackSystem;

/// Byte order a domain reports for its multi-byte values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Endian {
    /// Least significant byte at the lowest address.
    #[default]
    Little,
    /// Most significant byte at the lowest address.
    Big,
    /// The hardware has no natural byte order (byte-wide buses).
    Unknown,
}

/// Byte buffer shared between a domain and the component that owns the memory.
pub type SharedBytes = Rc<RefCell<Box<[u8]>>>;

/// Custom accessor pair for domains whose bytes live behind hardware logic.
///
/// `peek` must not have side effects; it is what tools use to inspect memory
/// without disturbing the emulated machine. An accessor that cannot reach its
/// storage reports an [`AccessFault`], which the domain surfaces as
/// [`CoreError::BackendFault`].
pub trait DomainAccess {
    /// Reads one byte at an already bounds-checked offset.
    ///
    /// # Errors
    ///
    /// Fails when the storage is unreachable.
    fn peek(&self, addr: u64) -> std::result::Result<u8, AccessFault>;

    /// Writes one byte at an already bounds-checked offset.
    ///
    /// # Errors
    ///
    /// Fails when the storage is unreachable.
    fn poke(&mut self, addr: u64, value: u8) -> std::result::Result<(), AccessFault>;

    /// Returns `false` when the accessor has no write path.
    fn writable(&self) -> bool {
        true
    }
}

type PeekFn = Box<dyn Fn(u64) -> u8>;
type PokeFn = Box<dyn FnMut(u64, u8)>;

struct FnAccess {
    peek: PeekFn,
    poke: Option<PokeFn>,
}

impl DomainAccess for FnAccess {
    fn peek(&self, addr: u64) -> std::result::Result<u8, AccessFault> {
        Ok((self.peek)(addr))
    }

    fn poke(&mut self, addr: u64, value: u8) -> std::result::Result<(), AccessFault> {
        let poke = self
            .poke
            .as_mut()
            .ok_or_else(|| AccessFault::new("no write accessor"))?;
        poke(addr, value);
        Ok(())
    }

    fn writable(&self) -> bool {
        self.poke.is_some()
    }
}

/// Storage behind a [`MemoryDomain`].
pub enum DomainBackend {
    /// Bytes owned by the domain itself.
    Owned {
        /// Backing storage; its length is the domain size.
        bytes: Box<[u8]>,
        /// Whether pokes are accepted.
        writable: bool,
    },
    /// Bytes shared with the component that emulates them.
    Shared {
        /// Backing storage; its length is the domain size.
        bytes: SharedBytes,
        /// Whether pokes are accepted.
        writable: bool,
    },
    /// Arbitrary accessor logic (system buses, foreign engines).
    Custom {
        /// Address count exposed by the accessor.
        size: u64,
        /// Accessor implementation.
        access: Box<dyn DomainAccess>,
    },
}

impl DomainBackend {
    /// Zero-filled writable storage of `size` bytes.
    #[must_use]
    pub fn zeroed(size: usize) -> Self {
        Self::Owned {
            bytes: vec![0; size].into_boxed_slice(),
            writable: true,
        }
    }

    /// Read-only storage holding a copy of `image`.
    #[must_use]
    pub fn read_only(image: &[u8]) -> Self {
        Self::Owned {
            bytes: image.into(),
            writable: false,
        }
    }

    /// Custom backend built from a peek closure and an optional poke closure.
    pub fn from_fns<P>(size: u64, peek: P, poke: Option<Box<dyn FnMut(u64, u8)>>) -> Self
    where
        P: Fn(u64) -> u8 + 'static,
    {
        Self::Custom {
            size,
            access: Box::new(FnAccess {
                peek: Box::new(peek),
                poke,
            }),
        }
    }

    fn size(&self) -> u64 {
        match self {
            Self::Owned { bytes, .. } => bytes.len() as u64,
            Self::Shared { bytes, .. } => bytes.borrow().len() as u64,
            Self::Custom { size, .. } => *size,
        }
    }

    fn writable(&self) -> bool {
        match self {
            Self::Owned { writable, .. } | Self::Shared { writable, .. } => *writable,
            Self::Custom { access, .. } => access.writable(),
        }
    }

    fn peek(&self, index: usize) -> std::result::Result<u8, AccessFault> {
        match self {
            Self::Owned { bytes, .. } => bytes.get(index).copied().ok_or_else(shrunk),
            Self::Shared { bytes, .. } => bytes.borrow().get(index).copied().ok_or_else(shrunk),
            Self::Custom { access, .. } => access.peek(index as u64),
        }
    }

    fn poke(&mut self, index: usize, value: u8) -> std::result::Result<(), AccessFault> {
        match self {
            Self::Owned { bytes, .. } => bytes
                .get_mut(index)
                .map(|slot| *slot = value)
                .ok_or_else(shrunk),
            Self::Shared { bytes, .. } => bytes
                .borrow_mut()
                .get_mut(index)
                .map(|slot| *slot = value)
                .ok_or_else(shrunk),
            Self::Custom { access, .. } => access.poke(index as u64, value),
        }
    }
}

fn shrunk() -> AccessFault {
    AccessFault::new("backing buffer is shorter than the checked range")
}

impl fmt::Debug for DomainBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Owned { bytes, writable } => f
                .debug_struct("Owned")
                .field("len", &bytes.len())
                .field("writable", writable)
                .finish(),
            Self::Shared { bytes, writable } => f
                .debug_struct("Shared")
                .field("len", &bytes.borrow().len())
                .field("writable", writable)
                .finish(),
            Self::Custom { size, access } => f
                .debug_struct("Custom")
                .field("size", size)
                .field("writable", &access.writable())
                .finish(),
        }
    }
}

/// A named, bounds-checked address space.
///
/// `peek_byte` and `poke_byte` are the only primitives; region, codec and hash
/// helpers are all built on them so the bounds and write policy live here once.
pub struct MemoryDomain {
    name: String,
    endian: Endian,
    word_size: u8,
    backend: DomainBackend,
    write_callbacks: Option<Rc<MemoryCallbackSystem>>,
}

impl MemoryDomain {
    /// Creates a domain over `backend`; the size is taken from the backend.
    pub fn new(name: impl Into<String>, endian: Endian, word_size: u8, backend: DomainBackend) -> Self {
        Self {
            name: name.into(),
            endian,
            word_size: word_size.max(1),
            backend,
            write_callbacks: None,
        }
    }

    /// Routes every successful poke through write watchpoints scoped to this domain.
    #[must_use]
    pub fn with_write_callbacks(mut self, callbacks: Rc<MemoryCallbackSystem>) -> Self {
        self.write_callbacks = Some(callbacks);
        self
    }

    /// Domain name, unique within its list.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of addressable bytes.
    ///
    /// Read from the backend on every call, so a shared buffer the owner
    /// replaced is reflected immediately.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.backend.size()
    }

    /// Reported byte order.
    #[must_use]
    pub const fn endian(&self) -> Endian {
        self.endian
    }

    /// Bytes per natural unit; informational only, byte access is always allowed.
    #[must_use]
    pub const fn word_size(&self) -> u8 {
        self.word_size
    }

    /// Returns `true` when the domain has a write accessor.
    #[must_use]
    pub fn can_poke(&self) -> bool {
        self.backend.writable()
    }

    /// Validates `[addr, addr + len)` against this domain and returns the start offset.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorKind::AddressOutOfRange`](crate::ErrorKind) error for a
    /// negative address, an address at or past the end, an empty range, or a
    /// range that runs past the end.
    pub fn check_range(&self, addr: i64, len: u64) -> Result<usize> {
        let size = self.size();
        if addr < 0 {
            return Err(CoreError::AddressNegative {
                domain: self.name.clone(),
                addr,
            });
        }
        let start = addr.unsigned_abs();
        if start >= size {
            return Err(CoreError::AddressOutOfRange {
                domain: self.name.clone(),
                addr,
                size,
            });
        }
        if len < 1 {
            return Err(CoreError::InvalidLength {
                domain: self.name.clone(),
                len,
            });
        }
        match start.checked_add(len) {
            Some(end) if end <= size => {}
            _ => {
                return Err(CoreError::RangeOutOfRange {
                    domain: self.name.clone(),
                    addr,
                    len,
                    size,
                })
            }
        }
        usize::try_from(start).map_err(|_| CoreError::AddressOutOfRange {
            domain: self.name.clone(),
            addr,
            size,
        })
    }

    pub(crate) fn check_writable(&self) -> Result<()> {
        if self.can_poke() {
            Ok(())
        } else {
            Err(CoreError::ReadOnlyDomainWrite {
                domain: self.name.clone(),
            })
        }
    }

    /// Reads one byte without side effects.
    ///
    /// # Errors
    ///
    /// Returns an address error when `addr` is outside the domain.
    pub fn peek_byte(&self, addr: i64) -> Result<u8> {
        let index = self.check_range(addr, 1)?;
        self.peek_at(index)
    }

    /// Writes one byte.
    ///
    /// # Errors
    ///
    /// Returns an address error when `addr` is outside the domain,
    /// [`CoreError::ReadOnlyDomainWrite`] when the domain has no write accessor
    /// and [`CoreError::BackendFault`] when the backend cannot be reached.
    pub fn poke_byte(&mut self, addr: i64, value: u8) -> Result<()> {
        let index = self.check_range(addr, 1)?;
        self.check_writable()?;
        self.poke_at(index, value)
    }

    fn backend_fault(&self, index: usize, fault: AccessFault) -> CoreError {
        tracing::warn!(domain = %self.name, index, %fault, "domain backend failed");
        CoreError::BackendFault {
            domain: self.name.clone(),
            addr: index as u64,
            fault,
        }
    }

    pub(crate) fn peek_at(&self, index: usize) -> Result<u8> {
        self.backend
            .peek(index)
            .map_err(|fault| self.backend_fault(index, fault))
    }

    // Write watchpoints fire only once the backend accepted the byte.
    pub(crate) fn poke_at(&mut self, index: usize, value: u8) -> Result<()> {
        if let Err(fault) = self.backend.poke(index, value) {
            return Err(self.backend_fault(index, fault));
        }
        if let Some(callbacks) = &self.write_callbacks {
            // Domain offsets above u32 range cannot be watched.
            if let Ok(addr) = u32::try_from(index) {
                callbacks.call_writes(&self.name, addr, u32::from(value));
            }
        }
        Ok(())
    }

    /// Reads `count` consecutive bytes starting at `addr`.
    ///
    /// # Errors
    ///
    /// Returns an address error when the range does not fit the domain.
    pub fn read_region(&self, addr: i64, count: u64) -> Result<Vec<u8>> {
        let start = self.check_range(addr, count)?;
        let count = usize::try_from(count).map_err(|_| CoreError::RangeOutOfRange {
            domain: self.name.clone(),
            addr,
            len: count,
            size: self.size(),
        })?;
        (start..start + count)
            .map(|index| self.peek_at(index))
            .collect()
    }

    /// Writes `data` starting at `addr`.
    ///
    /// The whole range and the write policy are validated before the first byte
    /// is written, so an address or read-only error leaves the domain untouched.
    /// A failing custom backend stops the write at the byte it refused.
    ///
    /// # Errors
    ///
    /// Returns an address error when the range does not fit the domain and
    /// [`CoreError::ReadOnlyDomainWrite`] for a read-only domain.
    pub fn write_region(&mut self, addr: i64, data: &[u8]) -> Result<()> {
        let start = self.check_range(addr, data.len() as u64)?;
        self.check_writable()?;
        for (offset, byte) in data.iter().enumerate() {
            self.poke_at(start + offset, *byte)?;
        }
        Ok(())
    }

    /// SHA-256 digest of the bytes in `[addr, addr + count)`.
    ///
    /// # Errors
    ///
    /// Returns an address error when the range does not fit the domain.
    pub fn hash_region(&self, addr: i64, count: u64) -> Result<[u8; 32]> {
        let bytes = self.read_region(addr, count)?;
        Ok(Sha256::digest(&bytes).into())
    }

    /// Uppercase hex rendering of [`Self::hash_region`].
    ///
    /// # Errors
    ///
    /// Returns an address error when the range does not fit the domain.
    pub fn hash_region_hex(&self, addr: i64, count: u64) -> Result<String> {
        let digest = self.hash_region(addr, count)?;
        Ok(digest.iter().map(|byte| format!("{byte:02X}")).collect())
    }
}

impl fmt::Debug for MemoryDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryDomain")
            .field("name", &self.name)
            .field("size", &self.size())
            .field("endian", &self.endian)
            .field("word_size", &self.word_size)
            .field("backend", &self.backend)
            .field("watched", &self.write_callbacks.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::{DomainAccess, DomainBackend, Endian, MemoryDomain};
    use crate::error::{AccessFault, CoreError, ErrorKind};

    fn ram(size: usize) -> MemoryDomain {
        MemoryDomain::new("RAM", Endian::Little, 1, DomainBackend::zeroed(size))
    }

    #[test]
    fn poke_then_peek_roundtrips() {
        let mut domain = ram(0x100);
        domain.poke_byte(0x42, 0x99).expect("in range");
        assert_eq!(domain.peek_byte(0x42), Ok(0x99));
        assert_eq!(domain.size(), 0x100);
        assert!(domain.can_poke());
    }

    #[test]
    fn bounds_are_checked_in_taxonomy_order() {
        let domain = ram(0x10);
        assert!(matches!(
            domain.peek_byte(-1),
            Err(CoreError::AddressNegative { addr: -1, .. })
        ));
        assert!(matches!(
            domain.peek_byte(0x10),
            Err(CoreError::AddressOutOfRange { addr: 0x10, size: 0x10, .. })
        ));
        assert!(matches!(
            domain.read_region(0x0F, 2),
            Err(CoreError::RangeOutOfRange { len: 2, .. })
        ));
        assert!(matches!(
            domain.read_region(0x00, 0),
            Err(CoreError::InvalidLength { len: 0, .. })
        ));
    }

    #[test]
    fn read_only_domain_rejects_pokes_and_region_writes() {
        let mut rom = MemoryDomain::new("ROM", Endian::Little, 1, DomainBackend::read_only(&[1, 2, 3]));
        assert!(!rom.can_poke());
        let error = rom.poke_byte(0, 9).expect_err("read-only");
        assert_eq!(error.kind(), ErrorKind::ReadOnlyDomainWrite);
        assert_eq!(
            rom.write_region(0, &[7, 7]).map_err(|e| e.kind()),
            Err(ErrorKind::ReadOnlyDomainWrite)
        );
        assert_eq!(rom.read_region(0, 3), Ok(vec![1, 2, 3]));
    }

    #[test]
    fn failed_region_write_leaves_domain_untouched() {
        let mut domain = ram(4);
        assert!(domain.write_region(2, &[1, 2, 3]).is_err());
        assert_eq!(domain.read_region(0, 4), Ok(vec![0, 0, 0, 0]));
    }

    #[test]
    fn shared_backend_sees_owner_updates() {
        let bytes = Rc::new(RefCell::new(vec![0_u8; 8].into_boxed_slice()));
        let mut domain = MemoryDomain::new(
            "WRAM",
            Endian::Little,
            1,
            DomainBackend::Shared {
                bytes: Rc::clone(&bytes),
                writable: true,
            },
        );
        bytes.borrow_mut()[3] = 0x5A;
        assert_eq!(domain.peek_byte(3), Ok(0x5A));
        domain.poke_byte(4, 0xA5).expect("writable");
        assert_eq!(bytes.borrow()[4], 0xA5);
    }

    #[test]
    fn shared_backend_follows_a_replaced_buffer() {
        let bytes = Rc::new(RefCell::new(vec![7_u8; 0x40].into_boxed_slice()));
        let mut domain = MemoryDomain::new(
            "WRAM",
            Endian::Little,
            1,
            DomainBackend::Shared {
                bytes: Rc::clone(&bytes),
                writable: true,
            },
        );
        *bytes.borrow_mut() = vec![1_u8; 0x10].into_boxed_slice();
        assert_eq!(domain.size(), 0x10);
        assert_eq!(domain.peek_byte(0x0F), Ok(1));
        assert!(matches!(
            domain.peek_byte(0x20),
            Err(CoreError::AddressOutOfRange { addr: 0x20, size: 0x10, .. })
        ));
        assert_eq!(
            domain.poke_byte(0x30, 0).map_err(|e| e.kind()),
            Err(ErrorKind::AddressOutOfRange)
        );
        assert!(domain.read_region(0x08, 0x10).is_err());
    }

    struct Unplugged;

    impl DomainAccess for Unplugged {
        fn peek(&self, _addr: u64) -> Result<u8, AccessFault> {
            Err(AccessFault::new("cartridge removed"))
        }

        fn poke(&mut self, _addr: u64, _value: u8) -> Result<(), AccessFault> {
            Err(AccessFault::new("cartridge removed"))
        }
    }

    #[test]
    fn backend_faults_surface_as_errors() {
        let mut domain = MemoryDomain::new(
            "Cart",
            Endian::Little,
            1,
            DomainBackend::Custom {
                size: 0x10,
                access: Box::new(Unplugged),
            },
        );
        let error = domain.peek_byte(4).expect_err("unplugged");
        assert_eq!(error.kind(), ErrorKind::BackendUnavailable);
        assert!(matches!(
            domain.poke_byte(4, 1),
            Err(CoreError::BackendFault { addr: 4, .. })
        ));
        assert!(domain.read_unsigned_little(0, crate::memory::AccessWidth::Two).is_err());
        assert!(domain.hash_region(0, 0x10).is_err());
    }

    #[test]
    fn custom_backend_without_poke_is_read_only() {
        let domain = MemoryDomain::new(
            "Mirror",
            Endian::Big,
            2,
            DomainBackend::from_fns(0x20, |addr| (addr & 0xFF) as u8, None),
        );
        assert!(!domain.can_poke());
        assert_eq!(domain.peek_byte(0x1F), Ok(0x1F));
        assert_eq!(domain.endian(), Endian::Big);
        assert_eq!(domain.word_size(), 2);
    }

    #[test]
    fn hash_region_is_content_sensitive() {
        let mut domain = ram(0x40);
        let before = domain.hash_region(0, 0x40).expect("in range");
        assert_eq!(before, domain.hash_region(0, 0x40).expect("in range"));
        domain.poke_byte(0x3F, 1).expect("in range");
        assert_ne!(before, domain.hash_region(0, 0x40).expect("in range"));
        assert_eq!(domain.hash_region_hex(0, 1).expect("in range").len(), 64);
    }
}
