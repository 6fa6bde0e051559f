//! Shared-library plug-ins
//!
//! A component or controller library exports exactly three symbols:
//! an API-version function, a factory, and a release function. The host
//! never frees a pointer it did not receive from the factory; destruction
//! always goes back through the library's release so allocation and
//! deallocation happen in the same compilation unit. Handles returned here
//! keep the library mapped for as long as the instance lives.

use crate::component::phy::PhyComponent;
use crate::component::stack::StackComponent;
use crate::controller::Controller;
use crate::error::{RadioError, Result};
use libloading::Library;
use std::ffi::{c_char, CStr, CString};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The host API version. A library whose version symbol reports anything
/// else is refused.
pub const API_VERSION: &str = "1.0.0";

/// Exported symbol names
pub const SYM_API_VERSION: &[u8] = b"skywave_api_version";
pub const SYM_CREATE_PHY: &[u8] = b"skywave_create_phy_component";
pub const SYM_RELEASE_PHY: &[u8] = b"skywave_release_phy_component";
pub const SYM_CREATE_STACK: &[u8] = b"skywave_create_stack_component";
pub const SYM_RELEASE_STACK: &[u8] = b"skywave_release_stack_component";
pub const SYM_CREATE_CONTROLLER: &[u8] = b"skywave_create_controller";
pub const SYM_RELEASE_CONTROLLER: &[u8] = b"skywave_release_controller";

type ApiVersionFn = unsafe extern "C" fn() -> *const c_char;
type CreatePhyFn = unsafe extern "C" fn(*const c_char) -> *mut Box<dyn PhyComponent>;
type ReleasePhyFn = unsafe extern "C" fn(*mut Box<dyn PhyComponent>);
type CreateStackFn = unsafe extern "C" fn(*const c_char) -> *mut Box<dyn StackComponent>;
type ReleaseStackFn = unsafe extern "C" fn(*mut Box<dyn StackComponent>);
type CreateControllerFn = unsafe extern "C" fn() -> *mut Box<dyn Controller>;
type ReleaseControllerFn = unsafe extern "C" fn(*mut Box<dyn Controller>);

/// A loaded plug-in library
pub struct SharedLibrary {
    path: PathBuf,
    library: Library,
}

impl SharedLibrary {
    /// Load a library from disk. The file must exist; OS loader failures
    /// surface as `LibraryLoad`.
    pub fn open(path: &Path) -> Result<SharedLibrary> {
        if !path.exists() {
            return Err(RadioError::FileNotFound(path.to_path_buf()));
        }
        let library = unsafe { Library::new(path) }
            .map_err(|e| RadioError::LibraryLoad(format!("{}: {}", path.display(), e)))?;
        Ok(SharedLibrary {
            path: path.to_path_buf(),
            library,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn symbol<T>(&self, name: &[u8]) -> Result<libloading::Symbol<'_, T>> {
        unsafe { self.library.get(name) }.map_err(|e| {
            RadioError::LibrarySymbol(format!(
                "{} in {}: {}",
                String::from_utf8_lossy(name),
                self.path.display(),
                e
            ))
        })
    }

    /// The API version string the library was built against
    pub fn api_version(&self) -> Result<String> {
        let f: libloading::Symbol<'_, ApiVersionFn> = self.symbol(SYM_API_VERSION)?;
        let version = unsafe { CStr::from_ptr(f()) };
        Ok(version.to_string_lossy().into_owned())
    }

    /// Refuse the library unless its API version equals the host's
    pub fn check_api_version(&self) -> Result<()> {
        let library = self.api_version()?;
        if library != API_VERSION {
            return Err(RadioError::ApiVersionMismatch {
                host: API_VERSION.to_string(),
                library,
            });
        }
        Ok(())
    }

    /// Instantiate a phy component out of this library
    pub fn create_phy(self: &Arc<Self>, name: &str) -> Result<PhyHandle> {
        let create: libloading::Symbol<'_, CreatePhyFn> = self.symbol(SYM_CREATE_PHY)?;
        // Resolve release up front so a bad library fails before creation
        let _release: libloading::Symbol<'_, ReleasePhyFn> = self.symbol(SYM_RELEASE_PHY)?;
        let c_name = CString::new(name).map_err(|e| RadioError::LibraryLoad(e.to_string()))?;
        let raw = unsafe { create(c_name.as_ptr()) };
        if raw.is_null() {
            return Err(RadioError::LibraryLoad(format!(
                "factory in {} returned null",
                self.path.display()
            )));
        }
        Ok(PhyHandle::Plugin {
            raw,
            library: Arc::clone(self),
        })
    }

    /// Instantiate a stack component out of this library
    pub fn create_stack(self: &Arc<Self>, name: &str) -> Result<StackHandle> {
        let create: libloading::Symbol<'_, CreateStackFn> = self.symbol(SYM_CREATE_STACK)?;
        let _release: libloading::Symbol<'_, ReleaseStackFn> = self.symbol(SYM_RELEASE_STACK)?;
        let c_name = CString::new(name).map_err(|e| RadioError::LibraryLoad(e.to_string()))?;
        let raw = unsafe { create(c_name.as_ptr()) };
        if raw.is_null() {
            return Err(RadioError::LibraryLoad(format!(
                "factory in {} returned null",
                self.path.display()
            )));
        }
        Ok(StackHandle::Plugin {
            raw,
            library: Arc::clone(self),
        })
    }

    /// Instantiate a controller out of this library
    pub fn create_controller(self: &Arc<Self>) -> Result<ControllerHandle> {
        let create: libloading::Symbol<'_, CreateControllerFn> =
            self.symbol(SYM_CREATE_CONTROLLER)?;
        let _release: libloading::Symbol<'_, ReleaseControllerFn> =
            self.symbol(SYM_RELEASE_CONTROLLER)?;
        let raw = unsafe { create() };
        if raw.is_null() {
            return Err(RadioError::LibraryLoad(format!(
                "factory in {} returned null",
                self.path.display()
            )));
        }
        Ok(ControllerHandle::Plugin {
            raw,
            library: Arc::clone(self),
        })
    }

    /// Platform prefix of shared-library file names
    pub fn system_prefix() -> &'static str {
        if cfg!(target_os = "windows") {
            ""
        } else {
            "lib"
        }
    }

    /// Platform extension of shared-library file names
    pub fn system_extension() -> &'static str {
        if cfg!(target_os = "windows") {
            ".dll"
        } else if cfg!(target_os = "macos") {
            ".dylib"
        } else {
            ".so"
        }
    }

    /// The lower-cased class stem of a library file name, if it has the
    /// platform prefix and extension
    pub fn stem_of(path: &Path) -> Option<String> {
        let file = path.file_name()?.to_str()?;
        let stem = file
            .strip_prefix(Self::system_prefix())?
            .strip_suffix(Self::system_extension())?;
        if stem.is_empty() {
            None
        } else {
            Some(stem.to_ascii_lowercase())
        }
    }
}

macro_rules! define_handle {
    ($name:ident, $trait:ident, $release_sym:expr, $release_ty:ty) => {
        /// An owned component/controller instance: either builtin (host
        /// allocated) or from a plug-in library (released by the library)
        pub enum $name {
            Builtin(Box<dyn $trait>),
            Plugin {
                raw: *mut Box<dyn $trait>,
                library: Arc<SharedLibrary>,
            },
        }

        impl $name {
            pub fn get(&self) -> &dyn $trait {
                match self {
                    $name::Builtin(b) => b.as_ref(),
                    // The raw pointer came from the library factory and is
                    // owned exclusively by this handle
                    $name::Plugin { raw, .. } => unsafe { (**raw).as_ref() },
                }
            }

            pub fn get_mut(&mut self) -> &mut dyn $trait {
                match self {
                    $name::Builtin(b) => b.as_mut(),
                    $name::Plugin { raw, .. } => unsafe { (**raw).as_mut() },
                }
            }

            /// Replace the held instance with a host-allocated one (used
            /// when a component specialises itself)
            pub fn replace(&mut self, instance: Box<dyn $trait>) {
                *self = $name::Builtin(instance);
            }
        }

        impl Drop for $name {
            fn drop(&mut self) {
                if let $name::Plugin { raw, library } = self {
                    if let Ok(release) =
                        library.symbol::<$release_ty>($release_sym)
                    {
                        unsafe { release(*raw) };
                    }
                }
            }
        }

        // The held instance is Send by trait bound; the raw pointer is
        // uniquely owned by this handle.
        unsafe impl Send for $name {}
    };
}

define_handle!(PhyHandle, PhyComponent, SYM_RELEASE_PHY, ReleasePhyFn);
define_handle!(StackHandle, StackComponent, SYM_RELEASE_STACK, ReleaseStackFn);
define_handle!(ControllerHandle, Controller, SYM_RELEASE_CONTROLLER, ReleaseControllerFn);
