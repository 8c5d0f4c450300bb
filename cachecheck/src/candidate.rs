use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::address::{AddressFields, Geometry};
use crate::config::CandidateConfig;
use crate::error::VerifyError;
use crate::outcome::{AccessOutcome, RunObservation, RunStatistics};
use crate::process::run_with_timeout;
use crate::trace::{AccessRecord, Operation};

/// Names of the build time constants the candidate source is compiled with
pub const VERIFICATION_DEFINE: &str = "CACHE_SIMULATION_VERIFICATION";
pub const INDEX_BITS_DEFINE: &str = "SRAM_CACHE_INDEX_LENGTH";
pub const OFFSET_BITS_DEFINE: &str = "SRAM_CACHE_OFFSET_LENGTH";
pub const ASSOCIATIVITY_DEFINE: &str = "NUM_CACHE_LINE_PER_SET";
pub const TAG_BITS_DEFINE: &str = "SRAM_CACHE_TAG_LENGTH";

/// State reported by a candidate right after an access
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct CandidateSnapshot {
    pub outcome: AccessOutcome,
    pub stats: RunStatistics,
}

/// The capabilities every candidate cache must provide.
///
/// Implementations hold all of their state, a fresh instance must behave as an empty cache
pub trait CandidateCache {
    fn read(&mut self, address: u64);

    fn write(&mut self, address: u64, byte: u8);

    /// The outcome of the most recent access and the counters so far
    fn snapshot(&self) -> Result<CandidateSnapshot, VerifyError>;
}

/// Produces a fresh candidate instance for a geometry.
///
/// No instance is ever reused between calls, and an instance borrows its source so the next one
/// can't be produced while it is alive
pub trait CandidateSource {
    type Instance<'a>: CandidateCache
    where
        Self: 'a;

    fn instantiate(&mut self, geometry: Geometry) -> Result<Self::Instance<'_>, VerifyError>;
}

/// Options for [`replay`]
#[derive(Debug, Copy, Clone)]
pub struct ReplayOptions {
    /// The byte written by every store
    pub store_byte: u8,
    /// Log the address fields, outcome, and counters of every access at debug level
    pub diagnostics: bool,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            store_byte: 1,
            diagnostics: false,
        }
    }
}

/// Replays a trace against a candidate, recording the outcome after every access.
///
/// The statistics are those reported after the final access, an empty trace reports all zeros
pub fn replay<C: CandidateCache + ?Sized>(
    cache: &mut C,
    geometry: Geometry,
    records: &[AccessRecord],
    options: ReplayOptions,
) -> Result<RunObservation, VerifyError> {
    replay_against(cache, geometry, records, &[], options)
}

/// As [`replay`], with the reference outcomes shown next to the candidate's in diagnostics.
///
/// `reference` only feeds the diagnostics, it may be shorter than the trace
pub fn replay_against<C: CandidateCache + ?Sized>(
    cache: &mut C,
    geometry: Geometry,
    records: &[AccessRecord],
    reference: &[AccessOutcome],
    options: ReplayOptions,
) -> Result<RunObservation, VerifyError> {
    let mut observation = RunObservation {
        outcomes: Vec::with_capacity(records.len()),
        stats: RunStatistics::default(),
    };
    for (i, record) in records.iter().enumerate() {
        match record.operation {
            Operation::Load => cache.read(record.address),
            Operation::Store => cache.write(record.address, options.store_byte),
        }
        let snapshot = cache.snapshot()?;
        if options.diagnostics {
            debug!("{}", describe_access(i, record, geometry, &snapshot, reference.get(i).copied()));
        }
        observation.outcomes.push(snapshot.outcome);
        observation.stats = snapshot.stats;
    }
    Ok(observation)
}

/// The diagnostic block logged for one access: the record, its address fields, and both outcomes
pub fn describe_access(
    index: usize,
    record: &AccessRecord,
    geometry: Geometry,
    snapshot: &CandidateSnapshot,
    reference: Option<AccessOutcome>,
) -> String {
    let table = AddressFields::decompose(record.address, geometry).render_table();
    let (reference, marker) = match reference {
        Some(outcome) if outcome != snapshot.outcome => (outcome.label(), " <<"),
        Some(outcome) => (outcome.label(), ""),
        None => ("-", ""),
    };
    format!(
        "[{index}] {record}\n{table}\ncandidate: {} reference: {reference}{marker} | {}",
        snapshot.outcome, snapshot.stats
    )
}

/// Compiles the candidate source into a shared object, once per geometry
pub struct CandidateBuilder {
    config: CandidateConfig,
}

impl CandidateBuilder {
    pub fn new(config: CandidateConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CandidateConfig {
        &self.config
    }

    fn command(&self, geometry: Geometry, artifact: &Path) -> Command {
        let config = &self.config;
        let mut cmd = Command::new(&config.compiler);
        cmd.args(&config.flags);
        for dir in &config.include_dirs {
            cmd.arg("-I").arg(dir);
        }
        cmd.arg(format!("-D{VERIFICATION_DEFINE}"))
            .arg(format!("-D{INDEX_BITS_DEFINE}={}", geometry.index_bits()))
            .arg(format!("-D{OFFSET_BITS_DEFINE}={}", geometry.offset_bits()))
            .arg(format!("-D{ASSOCIATIVITY_DEFINE}={}", geometry.associativity()))
            .arg(format!("-D{TAG_BITS_DEFINE}={}", geometry.tag_bits()))
            .args(["-shared", "-fPIC"])
            .arg(&config.source)
            .arg("-o")
            .arg(artifact);
        cmd
    }

    /// Builds the candidate for a geometry, returning the path of the shared object.
    ///
    /// The artifact path is the same for every geometry, any previous artifact is removed first
    pub fn build(&mut self, geometry: Geometry) -> Result<PathBuf, VerifyError> {
        let config = &self.config;
        if !config.source.is_file() {
            return Err(VerifyError::Build(format!(
                "candidate source {} doesn't exist",
                config.source.display()
            )));
        }
        fs::create_dir_all(&config.build_dir).map_err(|e| VerifyError::io(&config.build_dir, e))?;
        let artifact = config.artifact_path();
        match fs::remove_file(&artifact) {
            Err(e) if e.kind() != ErrorKind::NotFound => return Err(VerifyError::io(&artifact, e)),
            _ => {}
        }
        let output = run_with_timeout(&mut self.command(geometry, &artifact), config.build_timeout())
            .map_err(|e| VerifyError::Build(format!("{}: {e}", config.compiler)))?;
        if !output.status.success() {
            return Err(VerifyError::Build(format!(
                "{} exited with {}: {}",
                config.compiler,
                output.status,
                output.stderr_lossy()
            )));
        }
        if !artifact.is_file() {
            return Err(VerifyError::Build(format!("{} was not produced", artifact.display())));
        }
        info!("Built candidate for {geometry} at {}", artifact.display());
        Ok(artifact)
    }
}

#[cfg(unix)]
impl CandidateSource for CandidateBuilder {
    type Instance<'a> = LoadedCandidate<'a>;

    fn instantiate(&mut self, geometry: Geometry) -> Result<Self::Instance<'_>, VerifyError> {
        let artifact = self.build(geometry)?;
        LoadedCandidate::load(&artifact, self)
    }
}

#[cfg(unix)]
pub use self::dynamic::LoadedCandidate;

#[cfg(unix)]
mod dynamic {
    use std::ffi::{c_char, c_int, c_void, CStr, CString};
    use std::marker::PhantomData;
    use std::os::unix::ffi::OsStrExt;
    use std::path::{Path, PathBuf};

    use tracing::debug;

    use super::{CandidateBuilder, CandidateCache, CandidateSnapshot};
    use crate::error::VerifyError;
    use crate::outcome::{AccessOutcome, RunStatistics};

    type ReadFn = extern "C" fn(u64);
    type WriteFn = extern "C" fn(u64, u8);

    /// An open shared object, closed when dropped
    struct Library {
        handle: *mut c_void,
        path: PathBuf,
    }

    fn last_dl_error() -> String {
        // Safety: dlerror returns null or a valid C string owned by the loader
        unsafe {
            let message = libc::dlerror();
            if message.is_null() {
                "unknown loader error".to_string()
            } else {
                CStr::from_ptr(message).to_string_lossy().into_owned()
            }
        }
    }

    impl Library {
        fn open(path: &Path) -> Result<Self, VerifyError> {
            // An absolute path stops dlopen from searching the system library directories
            let path = path.canonicalize().map_err(|e| VerifyError::io(path, e))?;
            let c_path = CString::new(path.as_os_str().as_bytes())
                .map_err(|_| VerifyError::Load(format!("{} contains a nul byte", path.display())))?;
            // Safety: the path is a valid C string, the library's initialisers are trusted
            let handle = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };
            if handle.is_null() {
                return Err(VerifyError::Load(format!("{}: {}", path.display(), last_dl_error())));
            }
            debug!("Loaded {}", path.display());
            Ok(Self { handle, path })
        }

        fn symbol(&self, name: &str) -> Result<*mut c_void, VerifyError> {
            let c_name = CString::new(name).map_err(|_| VerifyError::Load(format!("symbol name {name:?} contains a nul byte")))?;
            // Safety: the handle is open for the lifetime of self
            let address = unsafe {
                libc::dlerror();
                libc::dlsym(self.handle, c_name.as_ptr())
            };
            if address.is_null() {
                return Err(VerifyError::Load(format!(
                    "{} doesn't export {name}: {}",
                    self.path.display(),
                    last_dl_error()
                )));
            }
            Ok(address)
        }
    }

    impl Drop for Library {
        fn drop(&mut self) {
            // Safety: the handle came from dlopen and is closed exactly once
            unsafe {
                libc::dlclose(self.handle);
            }
            debug!("Unloaded {}", self.path.display());
        }
    }

    /// A freshly loaded candidate module, its globals are the cache state.
    ///
    /// Every symbol is resolved when loading, so a module missing any of them is rejected before
    /// the replay starts. The module is unloaded when this is dropped, and it keeps the builder
    /// borrowed until then so the artifact can't be rebuilt underneath it
    pub struct LoadedCandidate<'a> {
        read: ReadFn,
        write: WriteFn,
        outcome: *const *const c_char,
        counters: [(*const c_int, String); 5],
        // Declared last, the symbols above must not outlive it
        _library: Library,
        _builder: PhantomData<&'a mut CandidateBuilder>,
    }

    impl<'a> LoadedCandidate<'a> {
        pub(super) fn load(path: &Path, builder: &'a mut CandidateBuilder) -> Result<Self, VerifyError> {
            let symbols = &builder.config().symbols;
            let library = Library::open(path)?;
            let read = library.symbol(&symbols.read)?;
            let write = library.symbol(&symbols.write)?;
            let outcome = library.symbol(&symbols.outcome)? as *const *const c_char;
            let mut counters = Vec::with_capacity(5);
            for name in symbols.counters() {
                counters.push((library.symbol(name)? as *const c_int, name.to_string()));
            }
            let counters: [(*const c_int, String); 5] = counters
                .try_into()
                .map_err(|_| VerifyError::Load("expected exactly five counters".to_string()))?;
            Ok(Self {
                // Safety: the entry points follow the candidate contract, (u64) and (u64, u8)
                read: unsafe { std::mem::transmute::<*mut c_void, ReadFn>(read) },
                write: unsafe { std::mem::transmute::<*mut c_void, WriteFn>(write) },
                outcome,
                counters,
                _library: library,
                _builder: PhantomData,
            })
        }
    }

    impl<'a> CandidateCache for LoadedCandidate<'a> {
        fn read(&mut self, address: u64) {
            (self.read)(address)
        }

        fn write(&mut self, address: u64, byte: u8) {
            (self.write)(address, byte)
        }

        fn snapshot(&self) -> Result<CandidateSnapshot, VerifyError> {
            // Safety: the symbol addresses stay valid while the library is loaded
            let label = unsafe { std::ptr::read_volatile(self.outcome) };
            if label.is_null() {
                return Err(VerifyError::Runtime("outcome symbol is a null pointer".to_string()));
            }
            // Safety: a non-null outcome points at a nul terminated label
            let label = unsafe { CStr::from_ptr(label) }
                .to_str()
                .map_err(|e| VerifyError::Runtime(format!("outcome label isn't text: {e}")))?;
            let outcome = AccessOutcome::from_label(label)
                .ok_or_else(|| VerifyError::Runtime(format!("unknown outcome label \"{label}\"")))?;
            let mut values = [0u64; 5];
            for (value, (address, name)) in values.iter_mut().zip(&self.counters) {
                // Safety: as above, each counter is a C int
                let raw = unsafe { std::ptr::read_volatile(*address) };
                *value = u64::try_from(raw)
                    .map_err(|_| VerifyError::Runtime(format!("counter {name} is negative ({raw})")))?;
            }
            Ok(CandidateSnapshot {
                outcome,
                stats: RunStatistics::from_array(values),
            })
        }
    }
}
