use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{EphemerisSource, Planet};

/// Lock-free ledger of planet position lookups, per planet and per source.
///
/// One ledger is created per propagation and filled by the force model.
#[derive(Debug, Default)]
pub struct EphemerisUsage {
    counts: [[AtomicU64; 2]; 8],
}

impl EphemerisUsage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one lookup; returns the number of earlier lookups for the same pair.
    pub fn record(&self, planet: Planet, source: EphemerisSource) -> u64 {
        self.counts[planet.index()][source.index()].fetch_add(1, Ordering::Relaxed)
    }

    pub fn count(&self, planet: Planet, source: EphemerisSource) -> u64 {
        self.counts[planet.index()][source.index()].load(Ordering::Relaxed)
    }

    pub fn report(&self) -> EphemerisUsageReport {
        let mut lookups = BTreeMap::new();
        for planet in Planet::ALL {
            for source in [EphemerisSource::Precise, EphemerisSource::Analytic] {
                let n = self.count(planet, source);
                if n > 0 {
                    lookups
                        .entry(planet)
                        .or_insert_with(BTreeMap::new)
                        .insert(source, n);
                }
            }
        }
        EphemerisUsageReport { lookups }
    }
}

/// Snapshot of an [`EphemerisUsage`], attached to N-body results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EphemerisUsageReport {
    pub lookups: BTreeMap<Planet, BTreeMap<EphemerisSource, u64>>,
}

impl EphemerisUsageReport {
    /// Distinct sources that served at least one lookup.
    pub fn sources(&self) -> Vec<EphemerisSource> {
        let mut sources: Vec<EphemerisSource> = self
            .lookups
            .values()
            .flat_map(|per_source| per_source.keys().copied())
            .collect();
        sources.sort();
        sources.dedup();
        sources
    }

    /// Whether the propagation used positions of different precision.
    pub fn is_mixed(&self) -> bool {
        self.sources().len() > 1
    }
}

/// `jupiter: precise 1200, analytic 13; saturn: precise 1213`
impl fmt::Display for EphemerisUsageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.lookups.is_empty() {
            return f.write_str("no planet lookups");
        }
        let per_planet = self.lookups.iter().map(|(planet, per_source)| {
            let counts = per_source
                .iter()
                .map(|(source, n)| format!("{source} {n}"))
                .join(", ");
            format!("{}: {counts}", planet.name())
        });
        write!(f, "{}", per_planet.format("; "))
    }
}
