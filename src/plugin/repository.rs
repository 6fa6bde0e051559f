//! Component and controller repositories
//!
//! A repository is a set of directories scanned for plug-in libraries,
//! plus a table of builtin factories registered programmatically (used by
//! the test suite and by embedded deployments). Lookup prefers builtins;
//! among library files with the same class stem the most recently modified
//! one wins.

use crate::component::phy::PhyComponent;
use crate::component::stack::StackComponent;
use crate::controller::Controller;
use crate::error::{RadioError, Result};
use crate::plugin::library::{ControllerHandle, PhyHandle, SharedLibrary, StackHandle};
use crate::radio::descriptors::canonical;
use log::{debug, info};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

type PhyFactory = Box<dyn Fn(&str) -> Box<dyn PhyComponent> + Send + Sync>;
type StackFactory = Box<dyn Fn(&str) -> Box<dyn StackComponent> + Send + Sync>;
type ControllerFactory = Box<dyn Fn() -> Box<dyn Controller> + Send + Sync>;

#[derive(Debug, Clone)]
struct LibraryFile {
    stem: String,
    path: PathBuf,
    modified: SystemTime,
}

/// One repository of loadable classes
#[derive(Default)]
pub struct Repository {
    paths: Vec<PathBuf>,
    files: Vec<LibraryFile>,
    loaded: Mutex<HashMap<String, Arc<SharedLibrary>>>,
    builtin_phy: HashMap<String, PhyFactory>,
    builtin_stack: HashMap<String, StackFactory>,
    builtin_controller: HashMap<String, ControllerFactory>,
}

impl Repository {
    pub fn new() -> Self {
        Repository::default()
    }

    /// Add a `;`-separated list of directories and scan them for library
    /// files. A path that does not exist or is not a directory is refused.
    pub fn add_paths(&mut self, spec: &str) -> Result<()> {
        for part in spec.split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let dir = PathBuf::from(part);
            if !dir.is_dir() {
                return Err(RadioError::ResourceNotFound(format!(
                    "repository path {} does not exist or is not a directory",
                    dir.display()
                )));
            }
            self.scan_dir(&dir)?;
            self.paths.push(dir);
        }
        Ok(())
    }

    fn scan_dir(&mut self, dir: &Path) -> Result<()> {
        let entries = std::fs::read_dir(dir).map_err(|e| {
            RadioError::ResourceNotFound(format!("cannot read repository {}: {}", dir.display(), e))
        })?;
        for entry in entries.flatten() {
            let path = entry.path();
            if let Some(stem) = SharedLibrary::stem_of(&path) {
                let modified = entry
                    .metadata()
                    .and_then(|m| m.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                debug!("repository file: {} ({})", path.display(), stem);
                self.files.push(LibraryFile {
                    stem,
                    path,
                    modified,
                });
            }
        }
        Ok(())
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Register a builtin phy component factory under a class name
    pub fn register_builtin_phy<F>(&mut self, class: &str, factory: F)
    where
        F: Fn(&str) -> Box<dyn PhyComponent> + Send + Sync + 'static,
    {
        self.builtin_phy.insert(canonical(class), Box::new(factory));
    }

    /// Register a builtin stack component factory under a class name
    pub fn register_builtin_stack<F>(&mut self, class: &str, factory: F)
    where
        F: Fn(&str) -> Box<dyn StackComponent> + Send + Sync + 'static,
    {
        self.builtin_stack.insert(canonical(class), Box::new(factory));
    }

    /// Register a builtin controller factory under a class name
    pub fn register_builtin_controller<F>(&mut self, class: &str, factory: F)
    where
        F: Fn() -> Box<dyn Controller> + Send + Sync + 'static,
    {
        self.builtin_controller
            .insert(canonical(class), Box::new(factory));
    }

    /// Whether a class resolves to a builtin or a library file
    pub fn contains(&self, class: &str) -> bool {
        let class = canonical(class);
        self.builtin_phy.contains_key(&class)
            || self.builtin_stack.contains_key(&class)
            || self.builtin_controller.contains_key(&class)
            || self.files.iter().any(|f| f.stem == class)
    }

    /// Most recently modified library file carrying the class stem
    fn find_file(&self, class: &str) -> Option<&LibraryFile> {
        self.files
            .iter()
            .filter(|f| f.stem == class)
            .max_by_key(|f| f.modified)
    }

    /// Load (or reuse) the library for a class, enforcing the API version
    /// gate. A library failing the gate is dropped, not cached.
    fn library_for(&self, class: &str) -> Result<Arc<SharedLibrary>> {
        let mut loaded = self.loaded.lock().unwrap();
        if let Some(lib) = loaded.get(class) {
            return Ok(Arc::clone(lib));
        }
        let file = self.find_file(class).ok_or_else(|| {
            RadioError::ResourceNotFound(format!("could not find {} in repositories", class))
        })?;
        let library = Arc::new(SharedLibrary::open(&file.path)?);
        library.check_api_version()?;
        info!("loaded library {} for class {}", file.path.display(), class);
        loaded.insert(class.to_string(), Arc::clone(&library));
        Ok(library)
    }

    /// Instantiate a phy component by class
    pub fn create_phy(&self, class: &str, name: &str) -> Result<PhyHandle> {
        let class = canonical(class);
        let name = canonical(name);
        if let Some(factory) = self.builtin_phy.get(&class) {
            return Ok(PhyHandle::Builtin(factory(&name)));
        }
        self.library_for(&class)?.create_phy(&name)
    }

    /// Instantiate a stack component by class
    pub fn create_stack(&self, class: &str, name: &str) -> Result<StackHandle> {
        let class = canonical(class);
        let name = canonical(name);
        if let Some(factory) = self.builtin_stack.get(&class) {
            return Ok(StackHandle::Builtin(factory(&name)));
        }
        self.library_for(&class)?.create_stack(&name)
    }

    /// Instantiate a controller by class
    pub fn create_controller(&self, class: &str) -> Result<ControllerHandle> {
        let class = canonical(class);
        if let Some(factory) = self.builtin_controller.get(&class) {
            return Ok(ControllerHandle::Builtin(factory()));
        }
        self.library_for(&class)?.create_controller()
    }
}

/// The kinds of repository the facade accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryKind {
    Stack,
    Phy,
    Sdf,
    Controller,
}

impl RepositoryKind {
    pub fn parse(kind: &str) -> Option<RepositoryKind> {
        match canonical(kind).as_str() {
            "stack" => Some(RepositoryKind::Stack),
            "phy" => Some(RepositoryKind::Phy),
            "sdf" => Some(RepositoryKind::Sdf),
            "controller" => Some(RepositoryKind::Controller),
            _ => None,
        }
    }
}

/// The four repositories a radio loads from. The sdf repository is
/// accepted for configuration compatibility; no engine kind draws from it
/// yet.
#[derive(Default)]
pub struct RepositorySet {
    pub phy: Repository,
    pub stack: Repository,
    pub sdf: Repository,
    pub controller: Repository,
}

impl RepositorySet {
    pub fn new() -> Self {
        RepositorySet::default()
    }

    pub fn get_mut(&mut self, kind: RepositoryKind) -> &mut Repository {
        match kind {
            RepositoryKind::Stack => &mut self.stack,
            RepositoryKind::Phy => &mut self.phy,
            RepositoryKind::Sdf => &mut self.sdf,
            RepositoryKind::Controller => &mut self.controller,
        }
    }

    /// Register the builtin mock components and controller-free defaults
    /// into the phy and stack repositories
    pub fn register_mocks(&mut self) {
        use crate::component::mock;
        self.phy
            .register_builtin_phy("mocksource", |name| Box::new(mock::CounterSource::new(name)));
        self.phy
            .register_builtin_phy("mocksink", |name| Box::new(mock::CounterSink::new(name)));
        self.phy
            .register_builtin_phy("mockfork", |name| Box::new(mock::Fork::new(name)));
        self.phy.register_builtin_phy("mockpassthrough", |name| {
            Box::new(mock::Passthrough::<i32>::new(name))
        });
        self.stack.register_builtin_stack("mockstackreflect", |name| {
            Box::new(mock::StackReflector::new(name))
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::mock::CounterSource;

    #[test]
    fn test_missing_repository_path_rejected() {
        let mut repo = Repository::new();
        assert!(matches!(
            repo.add_paths("/definitely/not/here"),
            Err(RadioError::ResourceNotFound(_))
        ));
    }

    #[test]
    fn test_builtin_factory_resolution() {
        let mut repo = Repository::new();
        repo.register_builtin_phy("MockSource", |name| Box::new(CounterSource::new(name)));
        assert!(repo.contains("mocksource"));
        let handle = repo.create_phy("MOCKSOURCE", "Src1").unwrap();
        assert_eq!(handle.get().base().name(), "src1");
    }

    #[test]
    fn test_unknown_class_fails() {
        let repo = Repository::new();
        assert!(matches!(
            repo.create_phy("ghost", "g1"),
            Err(RadioError::ResourceNotFound(_))
        ));
    }

    #[test]
    fn test_scan_picks_up_library_stems() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join(format!(
            "{}demo{}",
            SharedLibrary::system_prefix(),
            SharedLibrary::system_extension()
        ));
        std::fs::write(&file, b"not a real library").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let mut repo = Repository::new();
        repo.add_paths(&format!("{};", dir.path().display())).unwrap();
        assert!(repo.contains("demo"));
        // The fake file is found but fails the OS loader
        assert!(matches!(
            repo.create_phy("demo", "d1"),
            Err(RadioError::LibraryLoad(_))
        ));
    }

    #[test]
    fn test_repository_kind_parse() {
        assert_eq!(RepositoryKind::parse("PHY"), Some(RepositoryKind::Phy));
        assert_eq!(RepositoryKind::parse("sdf"), Some(RepositoryKind::Sdf));
        assert_eq!(RepositoryKind::parse("fpga"), None);
    }
}
