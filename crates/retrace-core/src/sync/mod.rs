//! Bidirectional state serialization.
//!
//! A component implements [`Statable::sync_state`] once, naming each field
//! in a fixed order. The same code path then saves, loads or inspects its
//! state depending on the [`Serializer`] mode, so the save and load layouts
//! cannot drift apart. Any field left out of `sync_state` is simply not
//! restored, which surfaces as a desync later; [`diff_states`] helps find it.

mod error;
mod io;

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

pub use error::{SyncError, SyncResult};
pub use io::{FieldValue, SyncValue};

use io::{take, take_array, BYTES_TAG};

/// Leading bytes of every save state.
pub const STATE_MAGIC: [u8; 8] = *b"RTRCSAVE";

/// Bytes before the payload: magic, version, layout digest, checksum, payload length.
pub const STATE_HEADER_BYTES: usize = 8 + 2 + 32 + 32 + 4;

const SECTION_BEGIN_TAG: u8 = 0xF0;
const SECTION_END_TAG: u8 = 0xF1;

/// Save state format revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u16)]
pub enum StateVersion {
    /// Initial revision.
    V1 = 1,
}

impl StateVersion {
    /// Converts the wire value to a known revision.
    #[must_use]
    pub const fn from_u16(version: u16) -> Option<Self> {
        match version {
            1 => Some(Self::V1),
            _ => None,
        }
    }
}

/// Opaque save state blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SaveState(Vec<u8>);

impl SaveState {
    /// Wraps raw bytes, for example read back from disk. Validation happens on load.
    #[must_use]
    pub const fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consumes the blob.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Blob length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` for an empty blob.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// SHA-256 of the whole blob; equal digests mean equal machine state.
    #[must_use]
    pub fn digest(&self) -> [u8; 32] {
        Sha256::digest(&self.0).into()
    }
}

/// One field observed in inspect mode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct NamedField {
    /// Section path and field name, `/`-separated.
    pub path: String,
    /// Current value.
    pub value: FieldValue,
}

enum Mode<'a> {
    Save(Vec<u8>),
    Load(&'a [u8]),
    Inspect(Vec<NamedField>),
}

/// One save, load or inspect pass over a component tree.
pub struct Serializer<'a> {
    mode: Mode<'a>,
    sections: Vec<String>,
    layout: Sha256,
    expected_layout: [u8; 32],
}

impl Serializer<'static> {
    /// Session that records every synced field.
    #[must_use]
    pub fn saver() -> Self {
        Self::with_mode(Mode::Save(Vec::new()))
    }

    /// Session that collects field names and values without changing anything.
    #[must_use]
    pub fn inspector() -> Self {
        Self::with_mode(Mode::Inspect(Vec::new()))
    }
}

impl<'a> Serializer<'a> {
    fn with_mode(mode: Mode<'a>) -> Self {
        Self {
            mode,
            sections: Vec::new(),
            layout: Sha256::new(),
            expected_layout: [0; 32],
        }
    }

    /// Session that overwrites synced fields from `state`.
    ///
    /// # Errors
    ///
    /// Fails when the header is malformed, the version is unknown or the
    /// payload checksum does not match.
    pub fn loader(state: &'a SaveState) -> SyncResult<Self> {
        let mut input = state.as_bytes();
        let magic: [u8; 8] = take_array(&mut input, "header")?;
        if magic != STATE_MAGIC {
            return Err(SyncError::BadMagic);
        }
        let version = u16::from_le_bytes(take_array(&mut input, "header")?);
        if StateVersion::from_u16(version).is_none() {
            return Err(SyncError::UnsupportedVersion(version));
        }
        let layout: [u8; 32] = take_array(&mut input, "header")?;
        let checksum: [u8; 32] = take_array(&mut input, "header")?;
        let len = u32::from_le_bytes(take_array(&mut input, "header")?) as usize;
        let payload = take(&mut input, len, "payload")?;
        if !input.is_empty() {
            return Err(SyncError::TrailingData {
                remaining: input.len(),
            });
        }
        if <[u8; 32]>::from(Sha256::digest(payload)) != checksum {
            return Err(SyncError::ChecksumMismatch);
        }
        let mut serializer = Self::with_mode(Mode::Load(payload));
        serializer.expected_layout = layout;
        Ok(serializer)
    }

    /// Returns `true` while loading; components use it to re-derive cached values.
    #[must_use]
    pub const fn is_reader(&self) -> bool {
        matches!(self.mode, Mode::Load(_))
    }

    /// Returns `true` while saving.
    #[must_use]
    pub const fn is_writer(&self) -> bool {
        matches!(self.mode, Mode::Save(_))
    }

    fn path(&self, name: &str) -> String {
        let mut path = self.sections.join("/");
        if !path.is_empty() {
            path.push('/');
        }
        path.push_str(name);
        path
    }

    fn record_layout(&mut self, tag: u8, name: &str) {
        self.layout.update([tag]);
        self.layout.update((name.len() as u32).to_le_bytes());
        self.layout.update(name.as_bytes());
    }

    fn expect_tag(input: &mut &[u8], expected: u8, field: &str) -> SyncResult<()> {
        let [found] = take_array::<1>(input, field)?;
        if found == expected {
            Ok(())
        } else {
            Err(SyncError::TypeMismatch {
                field: field.to_owned(),
                expected,
                found,
            })
        }
    }

    /// Opens a named section; must be paired with [`Self::end_section`].
    ///
    /// # Errors
    ///
    /// While loading, fails when the blob holds a different section here.
    pub fn begin_section(&mut self, name: &str) -> SyncResult<()> {
        self.record_layout(SECTION_BEGIN_TAG, name);
        let path = self.path(name);
        match &mut self.mode {
            Mode::Save(out) => {
                out.push(SECTION_BEGIN_TAG);
                out.extend_from_slice(&(name.len() as u16).to_le_bytes());
                out.extend_from_slice(name.as_bytes());
            }
            Mode::Load(input) => {
                Self::expect_tag(input, SECTION_BEGIN_TAG, &path)?;
                let len = usize::from(u16::from_le_bytes(take_array(input, &path)?));
                let found = take(input, len, &path)?;
                if found != name.as_bytes() {
                    return Err(SyncError::SectionMismatch {
                        expected: name.to_owned(),
                        found: String::from_utf8_lossy(found).into_owned(),
                    });
                }
            }
            Mode::Inspect(_) => {}
        }
        self.sections.push(name.to_owned());
        Ok(())
    }

    /// Closes the innermost section.
    ///
    /// # Errors
    ///
    /// Fails when no section is open or, while loading, the blob is not at a section end.
    pub fn end_section(&mut self) -> SyncResult<()> {
        let Some(name) = self.sections.pop() else {
            return Err(SyncError::UnbalancedSection(String::new()));
        };
        self.record_layout(SECTION_END_TAG, &name);
        match &mut self.mode {
            Mode::Save(out) => out.push(SECTION_END_TAG),
            Mode::Load(input) => Self::expect_tag(input, SECTION_END_TAG, &name)?,
            Mode::Inspect(_) => {}
        }
        Ok(())
    }

    /// Saves, loads or inspects one scalar field.
    ///
    /// # Errors
    ///
    /// While loading, fails on truncation, a type change or an invalid encoding.
    pub fn sync<T: SyncValue>(&mut self, name: &str, value: &mut T) -> SyncResult<()> {
        self.record_layout(T::TAG, name);
        if let Mode::Save(out) = &mut self.mode {
            out.push(T::TAG);
            value.encode(out);
            return Ok(());
        }
        let path = self.path(name);
        match &mut self.mode {
            Mode::Load(input) => {
                Self::expect_tag(input, T::TAG, &path)?;
                *value = T::decode(input, &path)?;
            }
            Mode::Inspect(fields) => fields.push(NamedField {
                path,
                value: value.to_field(),
            }),
            Mode::Save(_) => {}
        }
        Ok(())
    }

    /// Saves, loads or inspects a fixed-length byte buffer.
    ///
    /// # Errors
    ///
    /// While loading, fails when the recorded length differs from `value.len()`.
    pub fn sync_bytes(&mut self, name: &str, value: &mut [u8]) -> SyncResult<()> {
        self.record_layout(BYTES_TAG, name);
        let path = self.path(name);
        match &mut self.mode {
            Mode::Save(out) => {
                out.push(BYTES_TAG);
                out.extend_from_slice(&(value.len() as u32).to_le_bytes());
                out.extend_from_slice(value);
            }
            Mode::Load(input) => {
                Self::expect_tag(input, BYTES_TAG, &path)?;
                let found = u32::from_le_bytes(take_array(input, &path)?) as usize;
                if found != value.len() {
                    return Err(SyncError::LengthMismatch {
                        field: path,
                        expected: value.len(),
                        found,
                    });
                }
                value.copy_from_slice(take(input, found, &path)?);
            }
            Mode::Inspect(fields) => fields.push(NamedField {
                path,
                value: FieldValue::Bytes(value.to_vec()),
            }),
        }
        Ok(())
    }

    fn check_closed(&self) -> SyncResult<()> {
        match self.sections.last() {
            Some(open) => Err(SyncError::UnbalancedSection(open.clone())),
            None => Ok(()),
        }
    }

    /// Ends a save session and returns the blob.
    ///
    /// # Errors
    ///
    /// Fails when a section is still open or the session is not saving.
    pub fn finish_save(self) -> SyncResult<SaveState> {
        self.check_closed()?;
        let Mode::Save(payload) = self.mode else {
            return Err(SyncError::WrongMode("save"));
        };
        let mut blob = Vec::with_capacity(STATE_HEADER_BYTES + payload.len());
        blob.extend_from_slice(&STATE_MAGIC);
        blob.extend_from_slice(&(StateVersion::V1 as u16).to_le_bytes());
        blob.extend_from_slice(&self.layout.finalize());
        blob.extend_from_slice(&Sha256::digest(&payload));
        blob.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        blob.extend_from_slice(&payload);
        tracing::debug!(bytes = blob.len(), "state saved");
        Ok(SaveState(blob))
    }

    /// Ends a load session, checking the whole payload was consumed in the recorded layout.
    ///
    /// # Errors
    ///
    /// Fails on leftover bytes, an open section or a layout digest mismatch.
    pub fn finish_load(self) -> SyncResult<()> {
        self.check_closed()?;
        let Mode::Load(input) = self.mode else {
            return Err(SyncError::WrongMode("load"));
        };
        if !input.is_empty() {
            return Err(SyncError::TrailingData {
                remaining: input.len(),
            });
        }
        if <[u8; 32]>::from(self.layout.finalize()) != self.expected_layout {
            return Err(SyncError::LayoutMismatch);
        }
        tracing::debug!("state loaded");
        Ok(())
    }

    /// Ends an inspect session and returns the fields in sync order.
    ///
    /// # Errors
    ///
    /// Fails when a section is still open or the session is not inspecting.
    pub fn finish_inspect(self) -> SyncResult<Vec<NamedField>> {
        self.check_closed()?;
        match self.mode {
            Mode::Inspect(fields) => Ok(fields),
            _ => Err(SyncError::WrongMode("inspect")),
        }
    }
}

/// A component whose full state can be saved and restored.
pub trait Statable {
    /// Visits every field of mutable state in a fixed order.
    ///
    /// # Errors
    ///
    /// Propagates serializer failures.
    fn sync_state(&mut self, serializer: &mut Serializer<'_>) -> SyncResult<()>;

    /// Captures the current state.
    ///
    /// # Errors
    ///
    /// Propagates serializer failures.
    fn save_state(&mut self) -> SyncResult<SaveState> {
        let mut serializer = Serializer::saver();
        self.sync_state(&mut serializer)?;
        serializer.finish_save()
    }

    /// Restores a state captured by [`Statable::save_state`].
    ///
    /// A rejected state leaves the component as it was: the current state is
    /// captured first and synced back if any field fails to load.
    ///
    /// # Errors
    ///
    /// Fails on a malformed blob or a layout that does not match this build.
    fn load_state(&mut self, state: &SaveState) -> SyncResult<()> {
        let mut serializer = Serializer::loader(state)?;
        let previous = self.save_state()?;
        let loaded = self
            .sync_state(&mut serializer)
            .and_then(|()| serializer.finish_load());
        if let Err(error) = loaded {
            tracing::warn!(%error, "state rejected, restoring previous state");
            let mut undo = Serializer::loader(&previous)?;
            self.sync_state(&mut undo)?;
            undo.finish_load()?;
            return Err(error);
        }
        Ok(())
    }

    /// Lists every field with its current value.
    ///
    /// # Errors
    ///
    /// Propagates serializer failures.
    fn inspect_state(&mut self) -> SyncResult<Vec<NamedField>> {
        let mut serializer = Serializer::inspector();
        self.sync_state(&mut serializer)?;
        serializer.finish_inspect()
    }
}

/// A field whose value differs between two inspections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDiff {
    /// Field path.
    pub path: String,
    /// Value on the left side, `None` when absent there.
    pub left: Option<FieldValue>,
    /// Value on the right side, `None` when absent there.
    pub right: Option<FieldValue>,
}

/// Compares two inspections field by field, in path order.
#[must_use]
pub fn diff_states(left: &[NamedField], right: &[NamedField]) -> Vec<FieldDiff> {
    let mut paths: BTreeMap<&str, (Option<&FieldValue>, Option<&FieldValue>)> = BTreeMap::new();
    for field in left {
        paths.entry(&field.path).or_default().0 = Some(&field.value);
    }
    for field in right {
        paths.entry(&field.path).or_default().1 = Some(&field.value);
    }
    paths
        .into_iter()
        .filter(|(_, (l, r))| l != r)
        .map(|(path, (l, r))| FieldDiff {
            path: path.to_owned(),
            left: l.cloned(),
            right: r.cloned(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{
        diff_states, FieldValue, SaveState, Serializer, Statable, SyncError, SyncResult,
        STATE_HEADER_BYTES,
    };

    #[derive(Debug, Default, PartialEq)]
    struct Widget {
        counter: u32,
        latch: bool,
        offset: i16,
        ram: [u8; 4],
    }

    impl Statable for Widget {
        fn sync_state(&mut self, ser: &mut Serializer<'_>) -> SyncResult<()> {
            ser.begin_section("Widget")?;
            ser.sync("counter", &mut self.counter)?;
            ser.sync("latch", &mut self.latch)?;
            ser.sync("offset", &mut self.offset)?;
            ser.sync_bytes("ram", &mut self.ram)?;
            ser.end_section()
        }
    }

    struct Renamed(u32);

    impl Statable for Renamed {
        fn sync_state(&mut self, ser: &mut Serializer<'_>) -> SyncResult<()> {
            ser.begin_section("Widget")?;
            ser.sync("count", &mut self.0)?;
            ser.end_section()
        }
    }

    // Same layout as `Widget` up to a longer `ram` field.
    struct WideWidget {
        counter: u32,
        ram: [u8; 8],
    }

    impl Statable for WideWidget {
        fn sync_state(&mut self, ser: &mut Serializer<'_>) -> SyncResult<()> {
            ser.begin_section("Widget")?;
            ser.sync("counter", &mut self.counter)?;
            ser.sync("latch", &mut false)?;
            ser.sync("offset", &mut 0_i16)?;
            ser.sync_bytes("ram", &mut self.ram)?;
            ser.end_section()
        }
    }

    fn sample() -> Widget {
        Widget {
            counter: 0xDEAD,
            latch: true,
            offset: -5,
            ram: [1, 2, 3, 4],
        }
    }

    #[test]
    fn load_restores_every_field() {
        let state = sample().save_state().expect("save");
        let mut restored = Widget::default();
        restored.load_state(&state).expect("load");
        assert_eq!(restored, sample());
    }

    #[test]
    fn same_state_saves_identically() {
        let a = sample().save_state().expect("save");
        let b = sample().save_state().expect("save");
        assert_eq!(a, b);
        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn corrupted_payload_is_rejected() {
        let state = sample().save_state().expect("save");
        let mut bytes = state.into_bytes();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        let corrupted = SaveState::from_bytes(bytes);
        assert_eq!(
            Widget::default().load_state(&corrupted),
            Err(SyncError::ChecksumMismatch)
        );

        let truncated = SaveState::from_bytes(vec![0; STATE_HEADER_BYTES - 1]);
        assert!(Widget::default().load_state(&truncated).is_err());
    }

    #[test]
    fn renamed_field_fails_the_layout_check() {
        let state = Renamed(7).save_state().expect("save");
        let mut widget = Widget::default();
        assert!(widget.load_state(&state).is_err());

        let mut other = Renamed(0);
        let original = sample().save_state().expect("save");
        assert!(other.load_state(&original).is_err());
    }

    #[test]
    fn rejected_state_leaves_component_untouched() {
        let wide = WideWidget {
            counter: 0x1234,
            ram: [9; 8],
        }
        .save_state()
        .expect("save");
        let mut widget = sample();
        assert!(matches!(
            widget.load_state(&wide),
            Err(SyncError::LengthMismatch { expected: 4, found: 8, .. })
        ));
        assert_eq!(widget, sample());
    }

    #[test]
    fn inspect_lists_paths_without_mutating() {
        let mut widget = sample();
        let fields = widget.inspect_state().expect("inspect");
        let paths: Vec<_> = fields.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, ["Widget/counter", "Widget/latch", "Widget/offset", "Widget/ram"]);
        assert_eq!(fields[2].value, FieldValue::Signed(-5));
        assert_eq!(widget, sample());
    }

    #[test]
    fn diff_reports_changed_fields_only() {
        let mut left = sample();
        let mut right = sample();
        right.latch = false;
        let diffs = diff_states(
            &left.inspect_state().expect("inspect"),
            &right.inspect_state().expect("inspect"),
        );
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].path, "Widget/latch");
        assert_eq!(diffs[0].left, Some(FieldValue::Bool(true)));
    }

    #[test]
    fn unbalanced_sections_are_errors() {
        let mut ser = Serializer::saver();
        assert!(ser.end_section().is_err());
        ser.begin_section("Open").expect("begin");
        assert!(matches!(
            ser.finish_save(),
            Err(SyncError::UnbalancedSection(name)) if name == "Open"
        ));
    }

    #[test]
    fn finishing_in_the_wrong_mode_fails() {
        assert_eq!(
            Serializer::inspector().finish_save(),
            Err(SyncError::WrongMode("save"))
        );
    }
}
