// Certvault — Artifact node
//
// Wraps one artifact variant with the user metadata that never takes part in
// identity: display name, comment, provenance, timestamps, file hint and the
// store key. Every metadata setter invalidates the memoized filter state.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use colored::Colorize;

use super::{
    content_hash, dump_filename, ics_vevent, strip_path_and_extension, underline, Artifact,
    ArtifactKind, MessageKind, RenderFormat, RenderOptions, Source,
};
use crate::crypto::CryptoError;
use crate::store::StoreKey;
use crate::tree::Filter;
use crate::variants::Payload;

/// Memoized result of the last filter evaluation.
#[derive(Debug, Clone)]
struct VisibilityMemo {
    pattern: String,
    visible: bool,
}

/// A managed artifact plus its metadata.
pub struct ArtifactNode {
    payload: Payload,
    name: String,
    comment: String,
    source: Source,
    created: Option<DateTime<Utc>>,
    store_key: Option<StoreKey>,
    file_hint: Option<PathBuf>,
    visibility: Mutex<Option<VisibilityMemo>>,
}

impl ArtifactNode {
    /// Create a node for a freshly produced artifact. The display name is
    /// taken from the artifact's own identity when it has one.
    pub fn new(payload: impl Into<Payload>, source: Source) -> Self {
        let payload = payload.into();
        let name = payload.suggested_name().unwrap_or_default();
        Self {
            payload,
            name,
            comment: String::new(),
            source,
            created: None,
            store_key: None,
            file_hint: None,
            visibility: Mutex::new(None),
        }
    }

    /// Create a node for an artifact read from external bytes.
    /// `hint` is the file (or other origin) it came from; may be empty.
    pub fn imported(payload: impl Into<Payload>, hint: &str) -> Self {
        let mut node = Self::new(payload, Source::Imported);
        node.created = Some(Utc::now());
        node.auto_name(hint);
        if !hint.is_empty() {
            node.file_hint = Some(PathBuf::from(hint));
        }
        node
    }

    /// Create a node derived from `origin` (e.g. a request promoted to a
    /// certificate). Name, comment and file hint are inherited.
    pub fn derived_from(payload: impl Into<Payload>, origin: &ArtifactNode) -> Self {
        let mut node = Self::new(payload, Source::Transformed);
        if !origin.name.is_empty() {
            node.name = origin.name.clone();
        }
        node.comment = origin.comment.clone();
        origin.inherit_file_hint(&mut node);
        node
    }

    /// Rehydrate a node from persisted metadata.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn restored(
        payload: Payload,
        key: StoreKey,
        name: String,
        comment: String,
        source: Source,
        created: DateTime<Utc>,
        file_hint: Option<PathBuf>,
    ) -> Self {
        Self {
            payload,
            name,
            comment,
            source,
            created: Some(created),
            store_key: Some(key),
            file_hint,
            visibility: Mutex::new(None),
        }
    }

    // ─── Identity ────────────────────────────────────────────────────────

    pub fn kind(&self) -> ArtifactKind {
        self.payload.kind()
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Mutable access for token residency bookkeeping. Never changes identity.
    pub(crate) fn payload_mut(&mut self) -> &mut Payload {
        self.recheck_visibility();
        &mut self.payload
    }

    pub fn canonical_encode(&self) -> &[u8] {
        self.payload.canonical()
    }

    pub fn content_hash(&self) -> u32 {
        content_hash(self.canonical_encode())
    }

    /// Byte identity of the canonical encodings. Metadata is ignored.
    pub fn equals(&self, other: &ArtifactNode) -> bool {
        self.kind() == other.kind() && self.canonical_encode() == other.canonical_encode()
    }

    // ─── Metadata ────────────────────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.recheck_visibility();
        self.name = name.into();
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.recheck_visibility();
        self.comment = comment.into();
    }

    /// Append a `(msg)` line to the comment.
    pub fn append_comment(&mut self, msg: &str) {
        let mut comment = self.comment.clone();
        if !comment.is_empty() && !comment.ends_with('\n') {
            comment.push('\n');
        }
        comment.push_str(&format!("({})", msg));
        self.set_comment(comment);
    }

    pub fn file_hint(&self) -> Option<&Path> {
        self.file_hint.as_deref()
    }

    pub fn set_file_hint(&mut self, path: impl Into<PathBuf>) {
        self.recheck_visibility();
        self.file_hint = Some(path.into());
    }

    pub fn inherit_file_hint(&self, other: &mut ArtifactNode) {
        if let Some(ref hint) = self.file_hint {
            other.set_file_hint(hint.clone());
        }
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn set_source(&mut self, source: Source) {
        self.source = source;
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.created
    }

    pub(crate) fn set_created(&mut self, created: DateTime<Utc>) {
        self.created = Some(created);
    }

    pub fn store_key(&self) -> Option<&StoreKey> {
        self.store_key.as_ref()
    }

    pub(crate) fn set_store_key(&mut self, key: Option<StoreKey>) {
        self.store_key = key;
    }

    /// Name the node after its own identity, falling back to the file name
    /// without directory and extension.
    pub fn auto_name(&mut self, file: &str) {
        let name = match self.payload.suggested_name() {
            Some(name) if !name.is_empty() => name,
            _ if !file.is_empty() => strip_path_and_extension(file),
            _ => return,
        };
        self.set_name(name);
    }

    // ─── Naming for export ───────────────────────────────────────────────

    pub fn underlined_name(&self) -> String {
        underline(&self.name)
    }

    /// Filesystem-safe default name, including the per-kind extension.
    pub fn default_export_name(&self) -> String {
        format!("{}{}", self.underlined_name(), self.kind().extension())
    }

    /// A path in `dir` that does not exist yet.
    pub fn dump_filename(&self, dir: &Path, ext: &str) -> PathBuf {
        dump_filename(dir, &self.underlined_name(), ext)
    }

    // ─── Rendering ───────────────────────────────────────────────────────

    pub fn render(&self, format: RenderFormat) -> Result<String, CryptoError> {
        self.render_with(format, RenderOptions::default())
    }

    pub fn render_with(
        &self,
        format: RenderFormat,
        options: RenderOptions,
    ) -> Result<String, CryptoError> {
        match format {
            RenderFormat::Dump => self.payload.dump(),
            RenderFormat::Pem => {
                let mut out = String::new();
                if options.pem_comment {
                    out.push_str(&self.pem_comment());
                }
                out.push_str(&self.payload.pem());
                Ok(out)
            }
            RenderFormat::Colored => Ok(self.colored_summary()),
        }
    }

    fn pem_comment(&self) -> String {
        let mut out = String::new();
        if !self.name.is_empty() {
            out.push_str(&format!("# {}\n", self.name));
        }
        for line in self.comment.lines() {
            out.push_str(&format!("# {}\n", line));
        }
        out
    }

    fn colored_summary(&self) -> String {
        let expired = self.payload.expires().map(|t| t < Utc::now()).unwrap_or(false);
        let name = if expired {
            self.name.red().bold()
        } else {
            self.name.bold()
        };
        format!(
            "{} {} [{}] {}",
            self.kind().label().cyan(),
            name,
            self.source.label().dimmed(),
            self.payload.summary()
        )
    }

    pub fn message(&self, kind: MessageKind) -> String {
        let label = self.kind().label().to_lowercase();
        match kind {
            MessageKind::Import => format!("Successfully imported the {} '{}'", label, self.name),
            MessageKind::Delete => format!("Delete the {} '{}'?", label, self.name),
            MessageKind::DeleteMultiple => format!("Delete the selected {}s?", label),
            MessageKind::Create => format!("Successfully created the {} '{}'", label, self.name),
        }
    }

    /// Ordered identity properties: generic metadata plus variant specifics.
    pub fn properties(&self) -> Result<BTreeMap<String, String>, CryptoError> {
        let mut props = BTreeMap::new();
        props.insert("name".to_string(), self.name.clone());
        props.insert("type".to_string(), self.kind().label().to_string());
        props.insert("source".to_string(), self.source.label().to_string());
        if let Some(created) = self.created {
            props.insert("created".to_string(), created.to_rfc3339());
        }
        if !self.comment.is_empty() {
            props.insert("comment".to_string(), self.comment.clone());
        }
        self.payload.collect_properties(&mut props)?;
        Ok(props)
    }

    /// VEVENT lines reminding of this artifact's expiry, if it expires.
    pub fn expiry_reminder(&self) -> Option<Vec<String>> {
        let expires = self.payload.expires()?;
        let summary = format!("{} '{}' expires", self.kind().label(), self.name);
        Some(ics_vevent(expires, &summary, &self.payload.summary()))
    }

    // ─── Visibility ──────────────────────────────────────────────────────

    /// Evaluate `filter` against the identity-relevant text, uncached.
    pub fn matches(&self, filter: &Filter) -> bool {
        filter.matches(&self.name)
            || filter.matches(&self.comment)
            || filter.matches(self.kind().label())
            || self.payload.search_text().iter().any(|t| filter.matches(t))
    }

    /// Memoized `matches`. Recomputed whenever the pattern changes or the
    /// memo has been invalidated.
    pub fn visible(&self, filter: &Filter) -> bool {
        let mut memo = self
            .visibility
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(ref cached) = *memo {
            if cached.pattern == filter.pattern() {
                return cached.visible;
            }
        }
        let visible = self.matches(filter);
        *memo = Some(VisibilityMemo {
            pattern: filter.pattern().to_string(),
            visible,
        });
        visible
    }

    /// Drop the memoized filter state.
    pub fn recheck_visibility(&self) {
        let mut memo = self
            .visibility
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *memo = None;
    }

    pub(crate) fn has_visibility_memo(&self) -> bool {
        self.visibility
            .lock()
            .map(|m| m.is_some())
            .unwrap_or(false)
    }
}

impl PartialEq for ArtifactNode {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl Eq for ArtifactNode {}

impl Hash for ArtifactNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind().hash(state);
        self.content_hash().hash(state);
    }
}

impl fmt::Display for ArtifactNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = self
            .store_key
            .as_ref()
            .map(|k| k.to_string())
            .unwrap_or_default();
        write!(f, "({}[{}]:{})", self.kind().class_name(), key, self.name)
    }
}

impl fmt::Debug for ArtifactNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactNode")
            .field("kind", &self.kind())
            .field("name", &self.name)
            .field("source", &self.source)
            .field("store_key", &self.store_key)
            .field("hash", &format_args!("{:08x}", self.content_hash()))
            .finish()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
