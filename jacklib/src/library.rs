use crate::signature::{Generation, SymbolEntry};
use crate::symbols::{Symbols, detect_generation};
use libloading::Library;
use std::ffi::c_void;
use std::path::Path;
use std::ptr::NonNull;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::info;

/// Anything exported symbols can be looked up in: the dynamically loaded
/// libjack, or an in-process table when testing.
pub trait SymbolSource {
    fn address(&self, name: &str) -> Option<NonNull<c_void>>;
}

impl SymbolSource for Library {
    fn address(&self, name: &str) -> Option<NonNull<c_void>> {
        // SAFETY: the symbol is read as an untyped address only; it is cast
        // to its declared function type by the signature registry.
        let symbol = unsafe { self.get::<*mut c_void>(name.as_bytes()) }.ok()?;
        NonNull::new(*symbol)
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("JACK is not available on this system ({name}): {source}")]
    Unavailable {
        name: String,
        #[source]
        source: libloading::Error,
    },
    #[error("JACK is not available on this system: {0}")]
    Cached(String),
}

/// Platform file name of the client library.
pub fn default_library_name() -> &'static str {
    if cfg!(target_os = "macos") {
        "libjack.dylib"
    } else if cfg!(windows) {
        if cfg!(target_pointer_width = "64") {
            "libjack64.dll"
        } else {
            "libjack.dll"
        }
    } else {
        "libjack.so.0"
    }
}

/// The loaded client library with its resolved function table. Immutable
/// after construction and shared freely between threads.
pub struct NativeLibrary {
    symbols: Symbols,
    entries: Vec<SymbolEntry>,
    generation: Generation,
    // Keeps every function pointer in `symbols` valid.
    _library: Option<Library>,
}

static SHARED: OnceLock<Result<Arc<NativeLibrary>, String>> = OnceLock::new();

impl NativeLibrary {
    /// Loads the platform default library.
    pub fn load() -> Result<Self, LoadError> {
        Self::load_from(default_library_name())
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        // SAFETY: loading libjack runs its initialisers, which have no
        // preconditions on the calling process.
        let library = unsafe { Library::new(path) }.map_err(|source| LoadError::Unavailable {
            name: path.display().to_string(),
            source,
        })?;
        // SAFETY: libjack exports its functions with the declared
        // signatures, and the library is stored next to the table below.
        let mut native = unsafe { Self::from_source(&library) };
        native._library = Some(library);
        info!(
            library = %path.display(),
            generation = %native.generation,
            resolved = native.resolved_count(),
            total = native.entries.len(),
            "loaded JACK client library"
        );
        Ok(native)
    }

    /// The process-wide instance, loaded on first use. A failed load is
    /// remembered as well.
    pub fn shared() -> Result<Arc<Self>, LoadError> {
        SHARED
            .get_or_init(|| Self::load().map(Arc::new).map_err(|e| e.to_string()))
            .clone()
            .map_err(LoadError::Cached)
    }

    /// Builds the function table from an arbitrary symbol source.
    ///
    /// # Safety
    /// Every address `source` returns must be a function with the C
    /// signature declared for that name, and must stay valid for as long as
    /// the returned table, or any `Api` built on it, is used.
    pub unsafe fn from_source(source: &dyn SymbolSource) -> Self {
        let generation = detect_generation(source);
        let (symbols, entries) = Symbols::resolve(source, generation);
        Self {
            symbols,
            entries,
            generation,
            _library: None,
        }
    }

    pub fn symbols(&self) -> &Symbols {
        &self.symbols
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn entries(&self) -> &[SymbolEntry] {
        &self.entries
    }

    /// Registry lookup by exported name.
    pub fn resolve(&self, name: &str) -> Option<&SymbolEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    pub fn is_resolved(&self, name: &str) -> bool {
        self.resolve(name).is_some_and(|entry| entry.resolved)
    }

    pub fn resolved_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.resolved).count()
    }

    pub fn unresolved(&self) -> impl Iterator<Item = &SymbolEntry> {
        self.entries.iter().filter(|entry| !entry.resolved)
    }
}

impl std::fmt::Debug for NativeLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeLibrary")
            .field("generation", &self.generation)
            .field("resolved", &self.resolved_count())
            .field("total", &self.entries.len())
            .field("loaded", &self._library.is_some())
            .finish()
    }
}
