//! Ordered, name-addressed collection of a system's memory domains.

use super::domain::MemoryDomain;
use crate::error::{CoreError, Result};

/// Conventional name of the CPU-visible address space.
pub const SYSTEM_BUS: &str = "System Bus";

/// Domains exposed by one system, looked up by case-insensitive name.
///
/// The list is rebuilt whenever the system is reconfigured; domains are
/// never added or removed one at a time.
#[derive(Debug)]
pub struct MemoryDomainList {
    domains: Vec<MemoryDomain>,
    main_memory: usize,
}

impl MemoryDomainList {
    /// Builds a list whose main memory is the first domain.
    ///
    /// # Panics
    ///
    /// Panics if `domains` is empty or two domains share a name (ignoring case).
    #[must_use]
    pub fn new(domains: Vec<MemoryDomain>) -> Self {
        assert!(!domains.is_empty(), "a domain list needs at least one domain");
        for (index, domain) in domains.iter().enumerate() {
            assert!(
                !domains[..index]
                    .iter()
                    .any(|other| other.name().eq_ignore_ascii_case(domain.name())),
                "duplicate memory domain name {:?}",
                domain.name()
            );
        }
        Self {
            domains,
            main_memory: 0,
        }
    }

    /// Designates `name` as the main memory domain.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DomainNotFound`] when no domain has that name.
    pub fn with_main_memory(mut self, name: &str) -> Result<Self> {
        self.main_memory = self.position(name)?;
        Ok(self)
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.domains
            .iter()
            .position(|domain| domain.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| CoreError::DomainNotFound {
                name: name.to_owned(),
            })
    }

    /// Looks a domain up by name.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DomainNotFound`] for an unknown name.
    pub fn get(&self, name: &str) -> Result<&MemoryDomain> {
        self.position(name).map(|index| &self.domains[index])
    }

    /// Mutable lookup by name.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DomainNotFound`] for an unknown name.
    pub fn get_mut(&mut self, name: &str) -> Result<&mut MemoryDomain> {
        let index = self.position(name)?;
        Ok(&mut self.domains[index])
    }

    /// Looks a domain up and validates a `len`-byte access at `addr` in one go.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DomainNotFound`] or the address error for the range.
    pub fn checked(&self, name: &str, addr: i64, len: u64) -> Result<&MemoryDomain> {
        let domain = self.get(name)?;
        domain.check_range(addr, len)?;
        Ok(domain)
    }

    /// Mutable counterpart of [`Self::checked`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DomainNotFound`] or the address error for the range.
    pub fn checked_mut(&mut self, name: &str, addr: i64, len: u64) -> Result<&mut MemoryDomain> {
        let domain = self.get_mut(name)?;
        domain.check_range(addr, len)?;
        Ok(domain)
    }

    /// Returns the domain designated as main memory.
    #[must_use]
    pub fn main_memory(&self) -> &MemoryDomain {
        &self.domains[self.main_memory]
    }

    /// Returns the `"System Bus"` domain when the system exposes one.
    #[must_use]
    pub fn system_bus(&self) -> Option<&MemoryDomain> {
        self.get(SYSTEM_BUS).ok()
    }

    /// Returns `true` when a `"System Bus"` domain exists.
    #[must_use]
    pub fn has_system_bus(&self) -> bool {
        self.system_bus().is_some()
    }

    /// Domain names in list order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.domains.iter().map(MemoryDomain::name)
    }

    /// Iterates domains in list order.
    pub fn iter(&self) -> std::slice::Iter<'_, MemoryDomain> {
        self.domains.iter()
    }

    /// Number of domains.
    #[must_use]
    pub fn len(&self) -> usize {
        self.domains.len()
    }

    /// Always `false`; construction rejects empty lists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

impl<'a> IntoIterator for &'a MemoryDomainList {
    type Item = &'a MemoryDomain;
    type IntoIter = std::slice::Iter<'a, MemoryDomain>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
