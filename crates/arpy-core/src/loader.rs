use crate::index::ModuleIndex;
use crate::provider::{LoadedModule, ModuleProvider, ModuleSpec};
use crate::session::Session;
use crate::CoreError;
use arpy_archive::ArchiveReader;
use arpy_runtime::compile;
use arpy_schema::{Manifest, ModuleName};
use std::cell::RefCell;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, info};

/// Serves the modules of one opened archive.
///
/// The index and manifest are built once at open time. Entry data stays in
/// memory until [`ArchiveLoader::close`] (or [`ArchiveLoader::release`]);
/// after that every load fails with [`CoreError::ArchiveClosed`].
pub struct ArchiveLoader {
    path: PathBuf,
    display: String,
    index: ModuleIndex,
    manifest: Manifest,
    reader: RefCell<Option<ArchiveReader>>,
}

impl ArchiveLoader {
    pub fn open(path: impl AsRef<Path>) -> Result<Rc<Self>, CoreError> {
        let path = path.as_ref();
        let reader = ArchiveReader::open(path)?;
        let index = ModuleIndex::from_entry_names(reader.names())?;
        let manifest = reader.manifest().clone();
        info!(
            "opened archive {} ({} modules, {} packages)",
            path.display(),
            index.modules().count(),
            index.packages().count()
        );
        Ok(Rc::new(Self {
            path: path.to_path_buf(),
            display: path.display().to_string(),
            index,
            manifest,
            reader: RefCell::new(Some(reader)),
        }))
    }

    /// Open the archive at `path` and install it into `session`. The returned
    /// guard closes the loader when dropped.
    pub fn activate<'s>(
        session: &'s mut Session,
        path: impl AsRef<Path>,
    ) -> Result<LoaderGuard<'s>, CoreError> {
        let loader = Self::open(path)?;
        loader.install(session);
        Ok(LoaderGuard { session, loader })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn index(&self) -> &ModuleIndex {
        &self.index
    }

    /// Names of every entry in the archive, in archive order. Empty once
    /// closed.
    pub fn entry_names(&self) -> Vec<String> {
        self.reader
            .borrow()
            .as_ref()
            .map(|r| r.names().map(str::to_owned).collect())
            .unwrap_or_default()
    }

    pub fn is_closed(&self) -> bool {
        self.reader.borrow().is_none()
    }

    /// `arpy://<archive>#<entry>`
    pub fn origin_of(&self, entry: &str) -> String {
        format!("arpy://{}#{entry}", self.display)
    }

    /// Search path given to backed packages.
    pub fn search_path(&self) -> String {
        format!("arpy://{}", self.display)
    }

    fn as_provider(self: &Rc<Self>) -> Rc<dyn ModuleProvider> {
        Rc::clone(self) as Rc<dyn ModuleProvider>
    }

    /// Put this loader at the front of `session`'s provider chain. Installing
    /// twice is a no-op.
    pub fn install(self: &Rc<Self>, session: &mut Session) {
        if session.install(self.as_provider()) {
            info!("installed archive loader for {}", self.display);
        }
    }

    pub fn uninstall(self: &Rc<Self>, session: &mut Session) {
        session.uninstall(&self.as_provider());
    }

    /// Uninstall from `session` and release the archive data.
    pub fn close(self: &Rc<Self>, session: &mut Session) {
        self.uninstall(session);
        self.release();
    }

    /// Release the archive data without touching any session.
    pub fn release(&self) {
        if self.reader.borrow_mut().take().is_some() {
            debug!("closed archive {}", self.display);
        }
    }

    fn not_found(&self, name: &str) -> CoreError {
        CoreError::ModuleNotFound {
            archive: self.display.clone(),
            name: name.to_owned(),
        }
    }

    fn read_source(&self, entry: &str) -> Result<String, CoreError> {
        let guard = self.reader.borrow();
        let reader = guard
            .as_ref()
            .ok_or_else(|| CoreError::ArchiveClosed(self.display.clone()))?;
        let bytes = reader.read(entry).ok_or_else(|| self.not_found(entry))?;
        let text = std::str::from_utf8(bytes).map_err(|_| CoreError::InvalidSource {
            archive: self.display.clone(),
            entry: entry.to_owned(),
        })?;
        Ok(text.strip_prefix('\u{feff}').unwrap_or(text).to_owned())
    }
}

impl ModuleProvider for ArchiveLoader {
    fn label(&self) -> String {
        format!("ArchiveLoader({})", self.display)
    }

    fn provides(&self, name: &str) -> bool {
        self.index.contains(name)
    }

    fn describe(&self, name: &str) -> Option<ModuleSpec> {
        if !self.index.contains(name) {
            return None;
        }
        Some(ModuleSpec {
            name: ModuleName::new(name),
            is_package: self.index.is_package(name),
            origin: self.index.entry_for(name).map(|e| self.origin_of(e)),
        })
    }

    fn load(&self, name: &str) -> Result<LoadedModule, CoreError> {
        if self.is_closed() {
            return Err(CoreError::ArchiveClosed(self.display.clone()));
        }
        let spec = self.describe(name).ok_or_else(|| self.not_found(name))?;
        let code = match (self.index.entry_for(name), &spec.origin) {
            (Some(entry), Some(origin)) => {
                let source = self.read_source(entry)?;
                Some(compile(&source, origin)?)
            }
            _ => None,
        };
        let search_path = if spec.is_package && code.is_some() {
            vec![self.search_path()]
        } else {
            Vec::new()
        };
        debug!(
            "loaded {name} from {}",
            spec.origin.as_deref().unwrap_or("namespace package")
        );
        Ok(LoadedModule {
            spec,
            code,
            search_path,
            loader: self.label(),
        })
    }

    fn source(&self, name: &str) -> Option<String> {
        let entry = self.index.entry_for(name)?;
        self.read_source(entry).ok()
    }
}

/// An installed loader together with the session it is installed in.
/// Dropping the guard closes the loader.
pub struct LoaderGuard<'s> {
    session: &'s mut Session,
    loader: Rc<ArchiveLoader>,
}

impl LoaderGuard<'_> {
    pub fn loader(&self) -> &Rc<ArchiveLoader> {
        &self.loader
    }
}

impl Deref for LoaderGuard<'_> {
    type Target = Session;

    fn deref(&self) -> &Session {
        &*self.session
    }
}

impl DerefMut for LoaderGuard<'_> {
    fn deref_mut(&mut self) -> &mut Session {
        &mut *self.session
    }
}

impl Drop for LoaderGuard<'_> {
    fn drop(&mut self) {
        self.loader.close(&mut *self.session);
    }
}
