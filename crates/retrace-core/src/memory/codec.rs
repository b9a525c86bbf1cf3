//! Multi-byte integer access on top of the byte primitives.

use super::domain::{Endian, MemoryDomain};
use crate::error::Result;

/// Width of a multi-byte access, one to four bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum AccessWidth {
    /// 8-bit.
    One = 1,
    /// 16-bit.
    Two = 2,
    /// 24-bit.
    Three = 3,
    /// 32-bit.
    Four = 4,
}

impl AccessWidth {
    /// Number of bytes covered.
    #[must_use]
    pub const fn bytes(self) -> usize {
        self as usize
    }

    /// Keeps the low `8 * width` bits of `value`.
    #[must_use]
    pub const fn truncate(self, value: u32) -> u32 {
        match self {
            Self::Four => value,
            _ => value & ((1_u32 << (8 * self as u32)) - 1),
        }
    }

    /// Sign-extends the low `8 * width` bits of `value`.
    #[must_use]
    pub const fn to_signed(self, value: u32) -> i32 {
        let shift = 8 * (4 - self as u32);
        ((value << shift) as i32) >> shift
    }
}

/// Byte order of one multi-byte access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Order {
    Little,
    Big,
}

impl MemoryDomain {
    fn read_ordered(&self, addr: i64, width: AccessWidth, order: Order) -> Result<u32> {
        let start = self.check_range(addr, width.bytes() as u64)?;
        let mut value = 0_u32;
        for offset in 0..width.bytes() {
            let byte = u32::from(self.peek_at(start + offset)?);
            value |= match order {
                Order::Little => byte << (8 * offset),
                Order::Big => byte << (8 * (width.bytes() - 1 - offset)),
            };
        }
        Ok(value)
    }

    fn write_ordered(&mut self, addr: i64, value: u32, width: AccessWidth, order: Order) -> Result<()> {
        let start = self.check_range(addr, width.bytes() as u64)?;
        self.check_writable()?;
        for offset in 0..width.bytes() {
            let shift = match order {
                Order::Little => 8 * offset,
                Order::Big => 8 * (width.bytes() - 1 - offset),
            };
            self.poke_at(start + offset, (value >> shift) as u8)?;
        }
        Ok(())
    }

    const fn native_order(&self) -> Order {
        match self.endian() {
            Endian::Big => Order::Big,
            Endian::Little | Endian::Unknown => Order::Little,
        }
    }

    /// Unsigned little-endian read of `width` bytes.
    ///
    /// # Errors
    ///
    /// Returns an address error when the access does not fit the domain.
    pub fn read_unsigned_little(&self, addr: i64, width: AccessWidth) -> Result<u32> {
        self.read_ordered(addr, width, Order::Little)
    }

    /// Unsigned big-endian read of `width` bytes.
    ///
    /// # Errors
    ///
    /// Returns an address error when the access does not fit the domain.
    pub fn read_unsigned_big(&self, addr: i64, width: AccessWidth) -> Result<u32> {
        self.read_ordered(addr, width, Order::Big)
    }

    /// Unsigned read in the domain's own byte order (little for [`Endian::Unknown`]).
    ///
    /// # Errors
    ///
    /// Returns an address error when the access does not fit the domain.
    pub fn read_unsigned(&self, addr: i64, width: AccessWidth) -> Result<u32> {
        self.read_ordered(addr, width, self.native_order())
    }

    /// Sign-extended little-endian read.
    ///
    /// # Errors
    ///
    /// Returns an address error when the access does not fit the domain.
    pub fn read_signed_little(&self, addr: i64, width: AccessWidth) -> Result<i32> {
        self.read_unsigned_little(addr, width).map(|v| width.to_signed(v))
    }

    /// Sign-extended big-endian read.
    ///
    /// # Errors
    ///
    /// Returns an address error when the access does not fit the domain.
    pub fn read_signed_big(&self, addr: i64, width: AccessWidth) -> Result<i32> {
        self.read_unsigned_big(addr, width).map(|v| width.to_signed(v))
    }

    /// Little-endian write of the low `width` bytes of `value`.
    ///
    /// # Errors
    ///
    /// Returns an address error when the access does not fit the domain and a
    /// read-only error when the domain cannot be poked. Nothing is written on error.
    pub fn write_unsigned_little(&mut self, addr: i64, value: u32, width: AccessWidth) -> Result<()> {
        self.write_ordered(addr, value, width, Order::Little)
    }

    /// Big-endian write of the low `width` bytes of `value`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::write_unsigned_little`].
    pub fn write_unsigned_big(&mut self, addr: i64, value: u32, width: AccessWidth) -> Result<()> {
        self.write_ordered(addr, value, width, Order::Big)
    }

    /// Write in the domain's own byte order.
    ///
    /// # Errors
    ///
    /// Same as [`Self::write_unsigned_little`].
    pub fn write_unsigned(&mut self, addr: i64, value: u32, width: AccessWidth) -> Result<()> {
        self.write_ordered(addr, value, width, self.native_order())
    }

    /// Little-endian write of a signed value (two's complement, truncated).
    ///
    /// # Errors
    ///
    /// Same as [`Self::write_unsigned_little`].
    pub fn write_signed_little(&mut self, addr: i64, value: i32, width: AccessWidth) -> Result<()> {
        self.write_unsigned_little(addr, value as u32, width)
    }

    /// Big-endian write of a signed value (two's complement, truncated).
    ///
    /// # Errors
    ///
    /// Same as [`Self::write_unsigned_little`].
    pub fn write_signed_big(&mut self, addr: i64, value: i32, width: AccessWidth) -> Result<()> {
        self.write_unsigned_big(addr, value as u32, width)
    }

    /// 16-bit little-endian read.
    ///
    /// # Errors
    ///
    /// Returns an address error when the access does not fit the domain.
    pub fn read_u16_le(&self, addr: i64) -> Result<u16> {
        self.read_unsigned_little(addr, AccessWidth::Two).map(|v| v as u16)
    }

    /// 16-bit big-endian read.
    ///
    /// # Errors
    ///
    /// Returns an address error when the access does not fit the domain.
    pub fn read_u16_be(&self, addr: i64) -> Result<u16> {
        self.read_unsigned_big(addr, AccessWidth::Two).map(|v| v as u16)
    }

    /// 32-bit little-endian read.
    ///
    /// # Errors
    ///
    /// Returns an address error when the access does not fit the domain.
    pub fn read_u32_le(&self, addr: i64) -> Result<u32> {
        self.read_unsigned_little(addr, AccessWidth::Four)
    }

    /// 32-bit big-endian read.
    ///
    /// # Errors
    ///
    /// Returns an address error when the access does not fit the domain.
    pub fn read_u32_be(&self, addr: i64) -> Result<u32> {
        self.read_unsigned_big(addr, AccessWidth::Four)
    }

    /// 16-bit little-endian write.
    ///
    /// # Errors
    ///
    /// Same as [`Self::write_unsigned_little`].
    pub fn write_u16_le(&mut self, addr: i64, value: u16) -> Result<()> {
        self.write_unsigned_little(addr, u32::from(value), AccessWidth::Two)
    }

    /// 16-bit big-endian write.
    ///
    /// # Errors
    ///
    /// Same as [`Self::write_unsigned_little`].
    pub fn write_u16_be(&mut self, addr: i64, value: u16) -> Result<()> {
        self.write_unsigned_big(addr, u32::from(value), AccessWidth::Two)
    }
}
