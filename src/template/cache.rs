//! Template cache: identifier resolution and memoized compilation

use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::engine::{CompileMode, CompileStatus, CompiledTemplate, TemplateEngine};
use crate::error::FactoryError;

/// A compiled template registered under its canonical URI.
///
/// Handles are never replaced in the cache. Status changes happen on the
/// shared compiled template.
pub struct TemplateHandle {
    uri: String,
    compiled: Rc<dyn CompiledTemplate>,
}

impl TemplateHandle {
    pub fn new(uri: impl Into<String>, compiled: Rc<dyn CompiledTemplate>) -> Self {
        Self {
            uri: uri.into(),
            compiled,
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn status(&self) -> CompileStatus {
        self.compiled.status()
    }

    pub fn is_ready(&self) -> bool {
        self.status() == CompileStatus::Ready
    }

    pub fn compiled(&self) -> &Rc<dyn CompiledTemplate> {
        &self.compiled
    }
}

impl std::fmt::Debug for TemplateHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateHandle")
            .field("uri", &self.uri)
            .field("status", &self.status())
            .finish()
    }
}

/// Whether `identifier` is already a full locator.
///
/// Absolute identifiers start with a URI scheme (`qrc:`, `file:`), a root
/// marker (`/` or `\`), or a drive letter (`C:`).
pub fn is_absolute(identifier: &str) -> bool {
    if identifier.starts_with('/') || identifier.starts_with('\\') {
        return true;
    }

    let Some(colon) = identifier.find(':') else {
        return false;
    };
    let scheme = &identifier[..colon];
    let mut chars = scheme.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        _ => false,
    }
}

/// Cache of compiled templates keyed by canonical URI
pub struct TemplateCache {
    base_path: String,
    mode: CompileMode,
    entries: HashMap<String, Rc<TemplateHandle>>,
}

impl TemplateCache {
    pub fn new(base_path: impl Into<String>, mode: CompileMode) -> Self {
        Self {
            base_path: base_path.into(),
            mode,
            entries: HashMap::new(),
        }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn mode(&self) -> CompileMode {
        self.mode
    }

    /// Map an identifier to its canonical URI
    pub fn resolve(&self, identifier: &str) -> String {
        if is_absolute(identifier) || self.base_path.is_empty() {
            return identifier.to_string();
        }
        if self.base_path.ends_with('/') {
            format!("{}{}", self.base_path, identifier)
        } else {
            format!("{}/{}", self.base_path, identifier)
        }
    }

    /// Return the cached handle for `uri`, compiling it on first use.
    ///
    /// A compile that fails immediately is reported and not cached, so the
    /// next request compiles again.
    pub fn get_or_create(
        &mut self,
        engine: Option<&dyn TemplateEngine>,
        uri: &str,
    ) -> Result<Rc<TemplateHandle>, FactoryError> {
        if let Some(handle) = self.entries.get(uri) {
            return Ok(Rc::clone(handle));
        }

        let engine = engine.ok_or(FactoryError::EngineNotBound)?;
        debug!(uri, mode = ?self.mode, "compiling template");
        let handle = Rc::new(TemplateHandle::new(uri, engine.compile(uri, self.mode)));

        if let CompileStatus::Error(detail) = handle.status() {
            warn!(uri, %detail, "template failed to compile");
            return Err(FactoryError::Compile {
                uri: uri.to_string(),
                detail,
            });
        }

        self.entries.insert(uri.to_string(), Rc::clone(&handle));
        Ok(handle)
    }

    pub fn get(&self, uri: &str) -> Option<&Rc<TemplateHandle>> {
        self.entries.get(uri)
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.entries.contains_key(uri)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All cached URIs, sorted
    pub fn uris(&self) -> Vec<&str> {
        let mut uris: Vec<&str> = self.entries.keys().map(|k| k.as_str()).collect();
        uris.sort_unstable();
        uris
    }

    /// Forget the handle for `uri` so the next request recompiles it
    pub fn evict(&mut self, uri: &str) -> Option<Rc<TemplateHandle>> {
        self.entries.remove(uri)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
