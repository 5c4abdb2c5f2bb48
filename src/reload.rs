//! Swapping the render module while the host keeps running.
//!
//! The build writes the module to an artifact path beside the executable. Each frame the host
//! calls [Loader::poll]; when the artifact is newer than the last load, the old copy is unloaded,
//! the artifact is copied to a second path (so the build can overwrite the original while the copy
//! is mapped) and the copy is linked and rebound. The module's state lives in host memory and is
//! handed to the new code.

use std::{
    ffi::{c_void, OsString},
    fs, io,
    path::{Path, PathBuf},
    thread,
    time::SystemTime,
};

use libloading::{library_filename, Library, Symbol};
use log::{debug, info};
use thiserror::Error;

use crate::{
    abi::{
        EntryFn, HostApi, HostTable, KeyboardFn, ModuleTable, MouseFn, MouseInput, ReloadFn,
        RenderFn, StateHandoff, ABI_VERSION, ENTRY_SYMBOL,
    },
    backend::{BackendEntries, BackendTable},
};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("module does not provide `{0}`")]
    MissingEntry(&'static str),
    #[error("no backend provides `{0}`")]
    MissingBackend(&'static str),
    #[error("module was built for ABI version {found}, host speaks version {expected}")]
    AbiMismatch { expected: u32, found: u32 },
    #[error("couldn't copy {from} to {to}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("couldn't load {path}")]
    Library {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },
}

/// File names used next to the executable.
#[derive(Clone, Debug)]
pub struct ReloadNames {
    pub artifact: OsString,
    pub loaded: OsString,
    pub lock: OsString,
}

impl ReloadNames {
    /// Platform library names for a module crate called `module`.
    pub fn for_module(module: &str) -> Self {
        Self {
            artifact: library_filename(module),
            loaded: library_filename(format!("{module}_loaded")),
            lock: "build.lock".into(),
        }
    }

    pub fn with_lock(mut self, lock: impl Into<OsString>) -> Self {
        self.lock = lock.into();
        self
    }
}

impl Default for ReloadNames {
    fn default() -> Self {
        Self::for_module("hotglyph_module")
    }
}

#[derive(Clone, Debug)]
pub struct ReloadPaths {
    /// What the build writes.
    pub artifact: PathBuf,
    /// The copy that is actually linked.
    pub loaded: PathBuf,
    /// Present while a build is in progress.
    pub lock: PathBuf,
}

impl ReloadPaths {
    pub fn in_dir(dir: &Path, names: &ReloadNames) -> Self {
        Self {
            artifact: dir.join(&names.artifact),
            loaded: dir.join(&names.loaded),
            lock: dir.join(&names.lock),
        }
    }

    pub fn beside_executable(names: &ReloadNames) -> io::Result<Self> {
        let exe = std::env::current_exe()?;
        let dir = exe
            .parent()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "executable has no parent"))?;
        Ok(Self::in_dir(dir, names))
    }
}

/// Turns a module file into a live module and its table.
///
/// Dropping the returned module unloads it; the table must not be used after that.
pub trait Linker {
    type Module;

    fn link(&mut self, path: &Path) -> Result<(Self::Module, ModuleTable), LoadError>;
}

/// Links real dynamic libraries.
#[derive(Default)]
pub struct DylibLinker;

impl Linker for DylibLinker {
    type Module = Library;

    fn link(&mut self, path: &Path) -> Result<(Library, ModuleTable), LoadError> {
        // SAFETY: the module is built from this workspace; its initialisers have no side effects.
        let library = unsafe { Library::new(path) }.map_err(|source| LoadError::Library {
            path: path.to_path_buf(),
            source,
        })?;
        let table = {
            // SAFETY: the entry symbol is declared with `EntryFn`'s signature in the module.
            let entry: Symbol<EntryFn> = unsafe { library.get(ENTRY_SYMBOL) }
                .map_err(|_| LoadError::MissingEntry("hotglyph_module"))?;
            *entry()
        };
        Ok((library, table))
    }
}

/// Where backend entries come from: the renderer that is active right now, then a static set
/// that works without one.
#[derive(Clone, Copy)]
pub struct BackendSource {
    pub ctx: *mut c_void,
    pub primary: BackendEntries,
    pub fallback: BackendEntries,
}

#[derive(Clone, Copy)]
struct Entries {
    reload: ReloadFn,
    render: RenderFn,
    mouse: MouseFn,
    keyboard: KeyboardFn,
}

impl Entries {
    fn resolve(table: &ModuleTable) -> Result<Self, LoadError> {
        Ok(Self {
            reload: table.reload.ok_or(LoadError::MissingEntry("reload"))?,
            render: table.render.ok_or(LoadError::MissingEntry("render"))?,
            mouse: table.mouse.ok_or(LoadError::MissingEntry("mouse"))?,
            keyboard: table.keyboard.ok_or(LoadError::MissingEntry("keyboard"))?,
        })
    }
}

struct Bound<M> {
    entries: Entries,
    api: HostApi,
    // Declared last so the entries are gone before the code they point into.
    _module: M,
}

pub struct Loader<L: Linker> {
    linker: L,
    paths: ReloadPaths,
    host: HostTable,
    backend: BackendSource,
    bound: Option<Bound<L::Module>>,
    last_write: Option<SystemTime>,
    state: StateHandoff,
}

impl<L: Linker> Loader<L> {
    pub fn new(linker: L, paths: ReloadPaths, host: HostTable, backend: BackendSource) -> Self {
        Self {
            linker,
            paths,
            host,
            backend,
            bound: None,
            last_write: None,
            state: StateHandoff::fresh(),
        }
    }

    /// Reloads the module if the artifact changed since the last load. Returns whether it did.
    ///
    /// On error nothing is bound and the caller is expected to stop.
    pub fn poll(&mut self) -> Result<bool, LoadError> {
        let Some(written) = last_write(&self.paths.artifact) else {
            return Ok(false);
        };
        if self.last_write.is_some_and(|last| written <= last) {
            return Ok(false);
        }

        if self.bound.take().is_some() {
            debug!("unloaded {}", self.paths.loaded.display());
        }

        while self.paths.lock.exists() {
            thread::yield_now();
        }

        fs::copy(&self.paths.artifact, &self.paths.loaded).map_err(|source| LoadError::Copy {
            from: self.paths.artifact.clone(),
            to: self.paths.loaded.clone(),
            source,
        })?;
        self.last_write = Some(last_write(&self.paths.artifact).unwrap_or(written));

        let (module, table) = self.linker.link(&self.paths.loaded)?;
        if table.abi_version != ABI_VERSION {
            return Err(LoadError::AbiMismatch {
                expected: ABI_VERSION,
                found: table.abi_version,
            });
        }
        let entries = Entries::resolve(&table)?;
        let backend = BackendTable::resolve(
            self.backend.ctx,
            &self.backend.primary,
            &self.backend.fallback,
        )?;
        let api = HostApi {
            abi_version: ABI_VERSION,
            host: self.host,
            backend,
        };

        let state = (entries.reload)(&api, self.state);
        self.state = StateHandoff {
            state,
            version: table.state_version,
        };
        self.bound = Some(Bound {
            entries,
            api,
            _module: module,
        });

        info!(
            "loaded {} (state layout v{})",
            self.paths.artifact.display(),
            table.state_version
        );
        Ok(true)
    }

    pub fn render(&self, width: i32, height: i32) {
        if let Some(bound) = &self.bound {
            (bound.entries.render)(&bound.api, self.state.state, width, height);
        }
    }

    pub fn mouse(&self, input: MouseInput) {
        if let Some(bound) = &self.bound {
            (bound.entries.mouse)(&bound.api, self.state.state, input);
        }
    }

    pub fn keyboard(&self, codepoint: u32) {
        if let Some(bound) = &self.bound {
            (bound.entries.keyboard)(&bound.api, self.state.state, codepoint);
        }
    }

    pub fn state(&self) -> StateHandoff {
        self.state
    }

    pub fn is_loaded(&self) -> bool {
        self.bound.is_some()
    }

    pub fn paths(&self) -> &ReloadPaths {
        &self.paths
    }
}

fn last_write(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loaded_copy_keeps_the_platform_naming() {
        let names = ReloadNames::default();
        let paths = ReloadPaths::in_dir(Path::new("/opt/app"), &names);

        assert_eq!(paths.artifact, Path::new("/opt/app").join(library_filename("hotglyph_module")));
        assert_eq!(paths.lock, Path::new("/opt/app/build.lock"));
        assert_ne!(paths.artifact, paths.loaded);
        assert_eq!(paths.artifact.extension(), paths.loaded.extension());
    }
}
