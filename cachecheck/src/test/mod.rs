use std::fs;
use std::path::{Path, PathBuf};

use crate::address::{AddressFields, Geometry};
use crate::candidate::{replay, CandidateCache, CandidateSnapshot, CandidateSource, ReplayOptions};
use crate::error::VerifyError;
use crate::outcome::{AccessOutcome, RunObservation, RunStatistics};
use crate::reference::Reference;
use crate::trace::AccessRecord;
use crate::util::find_executable;

mod address;
mod compare;
mod config;
mod process;

pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

pub fn fixture_source() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures").join("lru_cache.c")
}

/// The C compiler used for candidate tests, these tests are skipped without one
pub fn compiler() -> Option<PathBuf> {
    let found = find_executable("cc");
    if found.is_none() {
        println!("No C compiler on PATH, skipping");
    }
    found
}

pub fn geometry(s: u32, e: u32, b: u32) -> Geometry {
    Geometry::new(s, e, b).unwrap()
}

#[derive(Clone, Default)]
struct Line {
    tag: u64,
    dirty: bool,
    last_used: u64,
}

/// In-process write-back, write-allocate LRU cache, matching the C fixture
pub struct ModelCache {
    geometry: Geometry,
    sets: Vec<Vec<Line>>,
    now: u64,
    accesses: usize,
    last: Option<AccessOutcome>,
    stats: RunStatistics,
    /// Reports the wrong outcome for this access, to provoke a divergence
    flip_at: Option<usize>,
}

impl ModelCache {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            sets: vec![Vec::new(); 1 << geometry.index_bits()],
            now: 0,
            accesses: 0,
            last: None,
            stats: RunStatistics::default(),
            flip_at: None,
        }
    }

    pub fn flipping_at(geometry: Geometry, index: usize) -> Self {
        Self {
            flip_at: Some(index),
            ..Self::new(geometry)
        }
    }

    fn block_size(&self) -> u64 {
        1 << self.geometry.offset_bits()
    }

    fn touch(&mut self, address: u64, is_write: bool) {
        let fields = AddressFields::decompose(address, self.geometry);
        let block = self.block_size();
        let ways = self.geometry.associativity() as usize;
        self.now += 1;
        let now = self.now;
        let set = &mut self.sets[fields.index as usize];
        let outcome = if let Some(line) = set.iter_mut().find(|l| l.tag == fields.tag) {
            self.stats.hits += 1;
            line.last_used = now;
            if is_write && !line.dirty {
                line.dirty = true;
                self.stats.dirty_bytes_resident += block;
            }
            AccessOutcome::Hit
        } else {
            self.stats.misses += 1;
            let outcome = if set.len() < ways {
                AccessOutcome::Miss
            } else {
                let (victim, _) = set.iter().enumerate().min_by_key(|(_, l)| l.last_used).unwrap();
                let evicted = set.remove(victim);
                self.stats.evictions += 1;
                if evicted.dirty {
                    self.stats.dirty_bytes_evicted += block;
                    self.stats.dirty_bytes_resident -= block;
                }
                AccessOutcome::MissWithEviction
            };
            if is_write {
                self.stats.dirty_bytes_resident += block;
            }
            set.push(Line {
                tag: fields.tag,
                dirty: is_write,
                last_used: now,
            });
            outcome
        };
        self.last = Some(if self.flip_at == Some(self.accesses) {
            match outcome {
                AccessOutcome::Hit => AccessOutcome::Miss,
                _ => AccessOutcome::Hit,
            }
        } else {
            outcome
        });
        self.accesses += 1;
    }
}

impl CandidateCache for ModelCache {
    fn read(&mut self, address: u64) {
        self.touch(address, false)
    }

    fn write(&mut self, address: u64, _byte: u8) {
        self.touch(address, true)
    }

    fn snapshot(&self) -> Result<CandidateSnapshot, VerifyError> {
        let outcome = self
            .last
            .ok_or_else(|| VerifyError::Runtime("no access yet".to_string()))?;
        Ok(CandidateSnapshot {
            outcome,
            stats: self.stats,
        })
    }
}

/// Hands out a fresh [`ModelCache`] per geometry, optionally faulty
#[derive(Default)]
pub struct ModelSource {
    pub instantiated: usize,
    pub flip_at: Option<usize>,
}

impl CandidateSource for ModelSource {
    type Instance<'a> = ModelCache;

    fn instantiate(&mut self, geometry: Geometry) -> Result<Self::Instance<'_>, VerifyError> {
        self.instantiated += 1;
        Ok(match self.flip_at {
            Some(index) => ModelCache::flipping_at(geometry, index),
            None => ModelCache::new(geometry),
        })
    }
}

/// A reference backed by [`ModelCache`], counting how often it was asked
#[derive(Default)]
pub struct ModelReference {
    pub observed: usize,
}

impl Reference for ModelReference {
    fn observe(
        &mut self,
        geometry: Geometry,
        _trace_path: &Path,
        records: &[AccessRecord],
    ) -> Result<RunObservation, VerifyError> {
        self.observed += 1;
        replay(&mut ModelCache::new(geometry), geometry, records, ReplayOptions::default())
    }
}
