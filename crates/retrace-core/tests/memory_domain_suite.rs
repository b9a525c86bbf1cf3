//! Memory domain bounds, codecs, hashing and list lookup.

#![allow(clippy::pedantic, clippy::nursery)]

use std::cell::RefCell;
use std::rc::Rc;

use bitflags as _;
use proptest::prelude::*;
use retrace_core::{
    AccessWidth, CoreError, DomainBackend, Endian, ErrorKind, MemoryDomain, MemoryDomainList,
    SYSTEM_BUS,
};
use rstest::rstest;
#[cfg(feature = "serde")]
use serde as _;
use sha2 as _;
use thiserror as _;
use tracing as _;
use tracing_subscriber as _;

fn zeroed(name: &str, size: usize) -> MemoryDomain {
    MemoryDomain::new(name, Endian::Little, 1, DomainBackend::zeroed(size))
}

#[test]
fn full_address_space_little_endian_scenario() {
    let mut domain = zeroed("System Bus", 0x10000);
    domain.poke_byte(0x100, 0xAB).expect("in range");
    domain.poke_byte(0x101, 0xCD).expect("in range");
    assert_eq!(domain.read_u16_le(0x100).expect("in range"), 0xCDAB);
    assert_eq!(domain.read_u16_be(0x100).expect("in range"), 0xABCD);
}

#[rstest]
#[case::negative(-1, 1)]
#[case::at_size(0x100, 1)]
#[case::past_size(0x1000, 1)]
#[case::range_runs_off_end(0xFF, 2)]
#[case::empty_range(0x10, 0)]
fn out_of_range_accesses_are_rejected(#[case] addr: i64, #[case] len: u64) {
    let domain = zeroed("RAM", 0x100);
    let error = domain.read_region(addr, len).expect_err("rejected");
    assert_eq!(error.kind(), ErrorKind::AddressOutOfRange);
    assert_eq!(error.domain(), Some("RAM"));
}

#[test]
fn error_messages_name_the_domain() {
    let domain = zeroed("WRAM", 0x800);
    let error = domain.peek_byte(0x800).expect_err("past end");
    assert_eq!(
        error.to_string(),
        "requested address 800 is outside of memory domain WRAM's range of 800"
    );
    assert!(matches!(
        domain.peek_byte(-4),
        Err(CoreError::AddressNegative { addr: -4, .. })
    ));
}

#[test]
fn read_only_domain_refuses_every_write_path() {
    let mut rom = MemoryDomain::new("ROM", Endian::Little, 1, DomainBackend::read_only(&[1, 2, 3, 4]));
    assert!(!rom.can_poke());
    assert_eq!(
        rom.poke_byte(0, 9).map_err(|e| e.kind()),
        Err(ErrorKind::ReadOnlyDomainWrite)
    );
    assert_eq!(
        rom.write_region(0, &[9, 9]).map_err(|e| e.kind()),
        Err(ErrorKind::ReadOnlyDomainWrite)
    );
    assert_eq!(
        rom.write_u16_le(0, 0x0909).map_err(|e| e.kind()),
        Err(ErrorKind::ReadOnlyDomainWrite)
    );
    assert_eq!(rom.read_region(0, 4).expect("readable"), [1, 2, 3, 4]);
}

#[test]
fn range_errors_take_precedence_over_write_policy() {
    let mut rom = MemoryDomain::new("ROM", Endian::Little, 1, DomainBackend::read_only(&[0; 4]));
    assert_eq!(
        rom.poke_byte(4, 0).map_err(|e| e.kind()),
        Err(ErrorKind::AddressOutOfRange)
    );
}

#[test]
fn failed_region_write_leaves_domain_untouched() {
    let mut domain = zeroed("RAM", 0x10);
    assert!(domain.write_region(0x0E, &[1, 2, 3]).is_err());
    assert_eq!(domain.read_region(0, 0x10).expect("in range"), vec![0; 0x10]);
}

#[rstest]
#[case(AccessWidth::One, 0xFF, -1)]
#[case(AccessWidth::Two, 0x8000, -32768)]
#[case(AccessWidth::Three, 0x00FF_FFFF, -1)]
#[case(AccessWidth::Four, 0x7FFF_FFFF, i32::MAX)]
fn signed_reads_sign_extend(#[case] width: AccessWidth, #[case] stored: u32, #[case] expected: i32) {
    let mut domain = zeroed("RAM", 0x10);
    domain.write_unsigned_little(4, stored, width).expect("in range");
    assert_eq!(domain.read_signed_little(4, width).expect("in range"), expected);
    domain.write_unsigned_big(8, stored, width).expect("in range");
    assert_eq!(domain.read_signed_big(8, width).expect("in range"), expected);
}

#[test]
fn native_order_follows_domain_endian() {
    let mut big = MemoryDomain::new("VRAM", Endian::Big, 2, DomainBackend::zeroed(0x10));
    big.write_unsigned(0, 0x1234, AccessWidth::Two).expect("in range");
    assert_eq!(big.read_region(0, 2).expect("in range"), [0x12, 0x34]);
    assert_eq!(big.word_size(), 2);
}

#[test]
fn shared_backend_sees_component_writes() {
    let bytes = Rc::new(RefCell::new(vec![0_u8; 0x20].into_boxed_slice()));
    let domain = MemoryDomain::new(
        "WRAM",
        Endian::Little,
        1,
        DomainBackend::Shared {
            bytes: Rc::clone(&bytes),
            writable: true,
        },
    );
    bytes.borrow_mut()[0x1F] = 0x99;
    assert_eq!(domain.peek_byte(0x1F).expect("in range"), 0x99);
}

#[test]
fn domain_list_lookup_is_case_insensitive() {
    let list = MemoryDomainList::new(vec![zeroed("RAM", 0x800), zeroed(SYSTEM_BUS, 0x10000)]);
    assert_eq!(list.get("ram").expect("present").size(), 0x800);
    assert_eq!(list.get("SYSTEM BUS").expect("present").name(), SYSTEM_BUS);
    assert!(list.has_system_bus());
    assert_eq!(
        list.get("VRAM").map(|_| ()).map_err(|e| e.kind()),
        Err(ErrorKind::DomainNotFound)
    );
    assert_eq!(
        list.checked("ram", 0x7FF, 2).map(|_| ()).map_err(|e| e.kind()),
        Err(ErrorKind::AddressOutOfRange)
    );
}

#[test]
#[should_panic(expected = "duplicate memory domain name")]
fn duplicate_names_are_rejected() {
    let _ = MemoryDomainList::new(vec![zeroed("RAM", 1), zeroed("ram", 1)]);
}

proptest! {
    #[test]
    fn poke_then_peek_returns_value(addr in 0_i64..0x400, value in any::<u8>()) {
        let mut domain = zeroed("RAM", 0x400);
        domain.poke_byte(addr, value).expect("in range");
        prop_assert_eq!(domain.peek_byte(addr).expect("in range"), value);
    }

    #[test]
    fn unsigned_round_trip_truncates_to_width(
        addr in 0_i64..0x3C,
        value in any::<u32>(),
        width in prop_oneof![
            Just(AccessWidth::One),
            Just(AccessWidth::Two),
            Just(AccessWidth::Three),
            Just(AccessWidth::Four),
        ],
        big in any::<bool>(),
    ) {
        let mut domain = zeroed("RAM", 0x40);
        let read = if big {
            domain.write_unsigned_big(addr, value, width).expect("in range");
            domain.read_unsigned_big(addr, width).expect("in range")
        } else {
            domain.write_unsigned_little(addr, value, width).expect("in range");
            domain.read_unsigned_little(addr, width).expect("in range")
        };
        let mask = if width.bytes() == 4 { u32::MAX } else { (1 << (8 * width.bytes())) - 1 };
        prop_assert_eq!(read, value & mask);
    }

    #[test]
    fn hash_changes_with_any_single_byte(index in 0_i64..0x80, delta in 1_u8..=255) {
        let mut domain = zeroed("RAM", 0x80);
        let before = domain.hash_region(0, 0x80).expect("in range");
        prop_assert_eq!(before, domain.hash_region(0, 0x80).expect("in range"));
        let old = domain.peek_byte(index).expect("in range");
        domain.poke_byte(index, old.wrapping_add(delta)).expect("in range");
        prop_assert_ne!(before, domain.hash_region(0, 0x80).expect("in range"));
    }
}
