//! Memory watchpoints: registration and synchronous dispatch.
//!
//! Callbacks run on the emulation thread inside the access that triggered
//! them, so they observe the machine mid-cycle and stall emulation until
//! they return. Registration uses interior mutability so a callback may add
//! or remove watchpoints (including itself) while it is being dispatched.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;

use crate::error::{Capability, CoreError, Result};

/// Access kind a watchpoint fires on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum CallbackType {
    /// Data reads.
    Read,
    /// Data writes.
    Write,
    /// Opcode fetches.
    Execute,
}

impl CallbackType {
    const fn access_flag(self) -> MemoryCallbackFlags {
        match self {
            Self::Read => MemoryCallbackFlags::ACCESS_READ,
            Self::Write => MemoryCallbackFlags::ACCESS_WRITE,
            Self::Execute => MemoryCallbackFlags::ACCESS_EXECUTE,
        }
    }
}

impl fmt::Display for CallbackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Execute => "execute",
        })
    }
}

bitflags! {
    /// Size and access bits handed to every callback invocation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemoryCallbackFlags: u32 {
        /// One-byte access.
        const SIZE_BYTE = 0x01 << 16;
        /// Two-byte access.
        const SIZE_WORD = 0x02 << 16;
        /// Four-byte access.
        const SIZE_LONG = 0x03 << 16;
        /// Read access.
        const ACCESS_READ = 0x01 << 12;
        /// Write access.
        const ACCESS_WRITE = 0x02 << 12;
        /// Opcode fetch.
        const ACCESS_EXECUTE = 0x04 << 12;
    }
}

/// Callback signature: `(address, value, flags)`.
pub type MemoryCallbackFn = Rc<dyn Fn(u32, u32, MemoryCallbackFlags)>;

/// Which domain a watchpoint listens on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Scope {
    /// Every domain the core dispatches for.
    Any,
    /// One named domain, matched case-insensitively.
    Domain(String),
}

impl Scope {
    fn matches(&self, domain: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Domain(name) => name.eq_ignore_ascii_case(domain),
        }
    }
}

impl From<&str> for Scope {
    fn from(name: &str) -> Self {
        Self::Domain(name.to_owned())
    }
}

/// One registered memory callback.
#[derive(Clone)]
pub struct Watchpoint {
    scope: Scope,
    kind: CallbackType,
    name: String,
    callback: MemoryCallbackFn,
    address: Option<u32>,
    mask: Option<u32>,
}

impl Watchpoint {
    /// Creates a watchpoint that fires on every address in `scope`.
    pub fn new<F>(scope: impl Into<Scope>, kind: CallbackType, name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(u32, u32, MemoryCallbackFlags) + 'static,
    {
        Self {
            scope: scope.into(),
            kind,
            name: name.into(),
            callback: Rc::new(callback),
            address: None,
            mask: None,
        }
    }

    /// Restricts the watchpoint to `address`.
    #[must_use]
    pub const fn at(mut self, address: u32) -> Self {
        self.address = Some(address);
        self
    }

    /// Treats set bits of `mask` as don't-care when comparing addresses.
    #[must_use]
    pub const fn with_mask(mut self, mask: u32) -> Self {
        self.mask = Some(mask);
        self
    }

    /// Name used for removal.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Access kind.
    #[must_use]
    pub const fn kind(&self) -> CallbackType {
        self.kind
    }

    /// Domain scope.
    #[must_use]
    pub const fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Watched address, `None` for all addresses.
    #[must_use]
    pub const fn address(&self) -> Option<u32> {
        self.address
    }

    /// Address mask, `None` meaning an exact match.
    #[must_use]
    pub const fn mask(&self) -> Option<u32> {
        self.mask
    }

    /// Returns `true` when an access of `kind` at `address` in `domain` fires this watchpoint.
    #[must_use]
    pub fn matches(&self, domain: &str, kind: CallbackType, address: u32) -> bool {
        if self.kind != kind || !self.scope.matches(domain) {
            return false;
        }
        match self.address {
            None => true,
            Some(watched) => {
                let care = !self.mask.unwrap_or(0);
                (address & care) == (watched & care)
            }
        }
    }
}

impl fmt::Debug for Watchpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watchpoint")
            .field("scope", &self.scope)
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("address", &self.address)
            .field("mask", &self.mask)
            .finish_non_exhaustive()
    }
}

/// Per-core registry of watchpoints.
pub struct MemoryCallbackSystem {
    core: String,
    scopes: Vec<String>,
    supported: MemoryCallbackFlags,
    entries: RefCell<Vec<Rc<Watchpoint>>>,
    has_reads: Cell<bool>,
    has_writes: Cell<bool>,
    has_executes: Cell<bool>,
}

impl MemoryCallbackSystem {
    /// Registry for `core` able to observe the given domain scopes, supporting every access type.
    pub fn new<I, S>(core: impl Into<String>, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            core: core.into(),
            scopes: scopes.into_iter().map(Into::into).collect(),
            supported: MemoryCallbackFlags::ACCESS_READ
                | MemoryCallbackFlags::ACCESS_WRITE
                | MemoryCallbackFlags::ACCESS_EXECUTE,
            entries: RefCell::new(Vec::new()),
            has_reads: Cell::new(false),
            has_writes: Cell::new(false),
            has_executes: Cell::new(false),
        }
    }

    /// Limits the access types this registry accepts.
    #[must_use]
    pub fn with_supported(mut self, kinds: &[CallbackType]) -> Self {
        self.supported = kinds
            .iter()
            .fold(MemoryCallbackFlags::empty(), |flags, kind| flags | kind.access_flag());
        self
    }

    /// Domain names watchpoints may be scoped to.
    #[must_use]
    pub fn available_scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Returns `true` when watchpoints of `kind` can be registered.
    #[must_use]
    pub fn supports(&self, kind: CallbackType) -> bool {
        self.supported.contains(kind.access_flag())
    }

    /// Registers a watchpoint.
    ///
    /// Names are unique within the registry: a watchpoint added under a name
    /// already in use takes the earlier one's place in dispatch order.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnsupportedCapability`] when the access type is not
    /// supported or the scope names a domain this core cannot observe.
    pub fn add(&self, watchpoint: Watchpoint) -> Result<()> {
        if !self.supports(watchpoint.kind) {
            return Err(CoreError::unsupported(
                &self.core,
                Capability::Callback(watchpoint.kind),
            ));
        }
        if let Scope::Domain(name) = &watchpoint.scope {
            if !self.scopes.iter().any(|scope| scope.eq_ignore_ascii_case(name)) {
                return Err(CoreError::unsupported(
                    &self.core,
                    Capability::CallbackScope(name.clone()),
                ));
            }
        }
        let watchpoint = Rc::new(watchpoint);
        let replaced = {
            let mut entries = self.entries.borrow_mut();
            match entries.iter_mut().find(|entry| entry.name == watchpoint.name) {
                Some(slot) => {
                    *slot = Rc::clone(&watchpoint);
                    true
                }
                None => {
                    entries.push(Rc::clone(&watchpoint));
                    false
                }
            }
        };
        tracing::debug!(
            name = watchpoint.name(),
            kind = %watchpoint.kind,
            address = ?watchpoint.address,
            replaced,
            "watchpoint added"
        );
        self.refresh();
        Ok(())
    }

    /// Removes the watchpoint called `name`, returning how many were removed (0 or 1).
    pub fn remove(&self, name: &str) -> usize {
        let removed = {
            let mut entries = self.entries.borrow_mut();
            let before = entries.len();
            entries.retain(|entry| entry.name != name);
            before - entries.len()
        };
        tracing::debug!(name, removed, "watchpoint removed");
        self.refresh();
        removed
    }

    /// Removes every watchpoint whose name is in `names`.
    pub fn remove_all<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> usize {
        names.into_iter().map(|name| self.remove(name)).sum()
    }

    /// Drops every watchpoint.
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
        self.refresh();
    }

    /// Number of registered watchpoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Returns `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Names of registered watchpoints in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.entries.borrow().iter().map(|entry| entry.name.clone()).collect()
    }

    /// Fast path: any read watchpoint registered.
    #[must_use]
    pub fn has_reads(&self) -> bool {
        self.has_reads.get()
    }

    /// Fast path: any write watchpoint registered.
    #[must_use]
    pub fn has_writes(&self) -> bool {
        self.has_writes.get()
    }

    /// Fast path: any execute watchpoint registered.
    #[must_use]
    pub fn has_executes(&self) -> bool {
        self.has_executes.get()
    }

    fn refresh(&self) {
        let entries = self.entries.borrow();
        let any = |kind| entries.iter().any(|entry: &Rc<Watchpoint>| entry.kind == kind);
        self.has_reads.set(any(CallbackType::Read));
        self.has_writes.set(any(CallbackType::Write));
        self.has_executes.set(any(CallbackType::Execute));
    }

    /// Invokes every watchpoint matching the access, in registration order.
    ///
    /// The matching set is captured before the first callback runs; changes a
    /// callback makes to the registry take effect from the next access.
    pub fn dispatch(&self, domain: &str, kind: CallbackType, address: u32, value: u32) {
        let matching: Vec<Rc<Watchpoint>> = self
            .entries
            .borrow()
            .iter()
            .filter(|entry| entry.matches(domain, kind, address))
            .cloned()
            .collect();
        let flags = MemoryCallbackFlags::SIZE_BYTE | kind.access_flag();
        for entry in matching {
            (entry.callback)(address, value, flags);
        }
    }

    /// Dispatches a read if any read watchpoint exists.
    pub fn call_reads(&self, domain: &str, address: u32, value: u32) {
        if self.has_reads() {
            self.dispatch(domain, CallbackType::Read, address, value);
        }
    }

    /// Dispatches a write if any write watchpoint exists.
    pub fn call_writes(&self, domain: &str, address: u32, value: u32) {
        if self.has_writes() {
            self.dispatch(domain, CallbackType::Write, address, value);
        }
    }

    /// Dispatches an opcode fetch if any execute watchpoint exists.
    pub fn call_executes(&self, domain: &str, address: u32, value: u32) {
        if self.has_executes() {
            self.dispatch(domain, CallbackType::Execute, address, value);
        }
    }
}

impl fmt::Debug for MemoryCallbackSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCallbackSystem")
            .field("core", &self.core)
            .field("scopes", &self.scopes)
            .field("supported", &self.supported)
            .field("entries", &self.entries.borrow())
            .finish()
    }
}
