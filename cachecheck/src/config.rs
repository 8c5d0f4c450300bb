use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::address::Geometry;
use crate::error::VerifyError;
use crate::util::default_cases;

/// The whole harness configuration, every field has a default
#[derive(Debug, Clone, Deserialize)]
pub struct HarnessConfig {
    #[serde(default = "default_reference_timeout_secs")]
    pub reference_timeout_secs: u64,
    #[serde(default)]
    pub candidate: CandidateConfig,
    #[serde(default = "default_cases")]
    pub cases: Vec<SweepCase>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            reference_timeout_secs: default_reference_timeout_secs(),
            candidate: CandidateConfig::default(),
            cases: default_cases(),
        }
    }
}

impl HarnessConfig {
    pub fn from_file(path: &Path) -> Result<Self, VerifyError> {
        let file = File::open(path).map_err(|e| VerifyError::io(path, e))?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| VerifyError::Config(format!("couldn't parse {}: {e}", path.display())))
    }

    pub fn reference_timeout(&self) -> Duration {
        Duration::from_secs(self.reference_timeout_secs)
    }
}

fn default_reference_timeout_secs() -> u64 {
    60
}

/// How the candidate module is compiled and what it exports
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CandidateConfig {
    pub compiler: String,
    pub source: PathBuf,
    pub include_dirs: Vec<PathBuf>,
    pub flags: Vec<String>,
    pub build_dir: PathBuf,
    pub artifact: String,
    pub build_timeout_secs: u64,
    /// The byte passed to the write entry point for every store
    pub store_byte: u8,
    pub symbols: SymbolConfig,
}

impl Default for CandidateConfig {
    fn default() -> Self {
        Self {
            compiler: "cc".to_string(),
            source: PathBuf::from("src/hardware/cpu/sram.c"),
            include_dirs: vec![PathBuf::from("src")],
            flags: ["-Wall", "-g", "-O0", "-std=gnu99", "-Wno-unused-function"]
                .map(String::from)
                .to_vec(),
            build_dir: PathBuf::from("bin"),
            artifact: "csim.so".to_string(),
            build_timeout_secs: 300,
            store_byte: 1,
            symbols: SymbolConfig::default(),
        }
    }
}

impl CandidateConfig {
    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_secs)
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.build_dir.join(&self.artifact)
    }
}

/// Names of the symbols the candidate module must export
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SymbolConfig {
    pub read: String,
    pub write: String,
    pub outcome: String,
    pub hits: String,
    pub misses: String,
    pub evictions: String,
    pub dirty_resident: String,
    pub dirty_evicted: String,
}

impl Default for SymbolConfig {
    fn default() -> Self {
        Self {
            read: "sram_cache_read".to_string(),
            write: "sram_cache_write".to_string(),
            outcome: "trace_ptr".to_string(),
            hits: "cache_hit_count".to_string(),
            misses: "cache_miss_count".to_string(),
            evictions: "cache_evict_count".to_string(),
            dirty_resident: "dirty_bytes_in_cache_count".to_string(),
            dirty_evicted: "dirty_bytes_evicted_count".to_string(),
        }
    }
}

impl SymbolConfig {
    /// Counter symbols in reference summary order
    pub fn counters(&self) -> [&str; 5] {
        [
            &self.hits,
            &self.misses,
            &self.evictions,
            &self.dirty_resident,
            &self.dirty_evicted,
        ]
    }
}

/// One configuration of the sweep, the trace is relative to the trace directory
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct SweepCase {
    #[serde(alias = "s")]
    pub index_bits: u32,
    #[serde(alias = "E")]
    pub associativity: u32,
    #[serde(alias = "b")]
    pub offset_bits: u32,
    pub trace: String,
}

impl SweepCase {
    pub fn new(index_bits: u32, associativity: u32, offset_bits: u32, trace: &str) -> Self {
        Self {
            index_bits,
            associativity,
            offset_bits,
            trace: trace.to_string(),
        }
    }

    pub fn geometry(&self) -> Result<Geometry, VerifyError> {
        Geometry::new(self.index_bits, self.associativity, self.offset_bits)
    }
}

impl std::str::FromStr for SweepCase {
    type Err = String;

    /// Parses `s,E,b,trace`, as given on the command line
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let [index, ways, offset, trace] = parts.as_slice() else {
            return Err(format!("expected s,E,b,trace but got \"{s}\""));
        };
        let number = |name: &str, value: &str| value.parse::<u32>().map_err(|e| format!("invalid {name} \"{value}\": {e}"));
        if trace.is_empty() {
            return Err("missing trace file name".to_string());
        }
        Ok(Self::new(number("s", *index)?, number("E", *ways)?, number("b", *offset)?, *trace))
    }
}
