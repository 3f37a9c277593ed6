//! # Comet records and catalog
//!
//! A [`CometRecord`] is what the catalog feed provides for one object: its identifiers,
//! its orbit class and, when known, its orbital elements. The [`Catalog`] is the
//! in-memory designation → record index used by the batch layer to resolve requests.
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cometprop_errors::CometPropError;
use crate::constants::Designation;
use crate::orbit_type::KeplerianElements;

/// IAU comet orbit class, the letter before the slash of a designation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OrbitClass {
    /// Non-periodic.
    #[default]
    C,
    /// Periodic (period below 200 years or confirmed by several passages).
    P,
    /// Defunct or disappeared.
    D,
    /// No meaningful orbit computed.
    X,
    /// Interstellar.
    I,
    /// Asteroid on a cometary orbit.
    A,
}

impl OrbitClass {
    /// Class encoded in a designation such as `1P/Halley` or `C/2020 F3`.
    pub fn from_designation(designation: &str) -> Option<Self> {
        let prefix = designation.split('/').next()?;
        if prefix.len() == designation.len() {
            return None;
        }
        prefix
            .trim_start_matches(|c: char| c.is_ascii_digit())
            .parse()
            .ok()
    }
}

impl FromStr for OrbitClass {
    type Err = CometPropError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "C" | "c" => Ok(OrbitClass::C),
            "P" | "p" => Ok(OrbitClass::P),
            "D" | "d" => Ok(OrbitClass::D),
            "X" | "x" => Ok(OrbitClass::X),
            "I" | "i" => Ok(OrbitClass::I),
            "A" | "a" => Ok(OrbitClass::A),
            other => Err(CometPropError::InvalidRequest(format!(
                "unknown orbit class '{other}'"
            ))),
        }
    }
}

impl fmt::Display for OrbitClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            OrbitClass::C => "C",
            OrbitClass::P => "P",
            OrbitClass::D => "D",
            OrbitClass::X => "X",
            OrbitClass::I => "I",
            OrbitClass::A => "A",
        };
        f.write_str(letter)
    }
}

/// One catalogued comet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CometRecord {
    pub designation: Designation,
    pub name: String,
    pub periodic_number: Option<u32>,
    pub orbit_class: OrbitClass,
    pub elements: Option<KeplerianElements>,
}

impl CometRecord {
    /// A record whose class is read from the designation (`C` when absent).
    pub fn new(
        designation: impl Into<Designation>,
        name: impl Into<String>,
        elements: Option<KeplerianElements>,
    ) -> Self {
        let designation = designation.into();
        let orbit_class = OrbitClass::from_designation(&designation).unwrap_or_default();
        let periodic_number = designation
            .split('/')
            .next()
            .map(|prefix| prefix.trim_end_matches(|c: char| c.is_ascii_alphabetic()))
            .and_then(|digits| digits.parse().ok());
        CometRecord {
            designation,
            name: name.into(),
            periodic_number,
            orbit_class,
            elements,
        }
    }

    pub fn is_periodic(&self) -> bool {
        self.orbit_class == OrbitClass::P && self.periodic_number.is_some()
    }

    pub fn is_hyperbolic(&self) -> bool {
        self.elements
            .as_ref()
            .is_some_and(|elements| elements.eccentricity() > 1.0)
    }

    /// `"1P/Halley (Halley)"`-style label; just the designation when the name adds nothing.
    pub fn full_name(&self) -> String {
        if !self.name.is_empty() && self.name != self.designation {
            format!("{} ({})", self.designation, self.name)
        } else {
            self.designation.clone()
        }
    }
}

impl fmt::Display for CometRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.periodic_number {
            Some(number) => write!(f, "{number}{}/{}", self.orbit_class, self.name),
            None => write!(f, "{}", self.designation),
        }
    }
}

/// Summary counts of a [`Catalog`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CatalogStatistics {
    pub total: usize,
    pub periodic: usize,
    pub hyperbolic: usize,
    pub with_elements: usize,
    pub mean_eccentricity: f64,
}

/// In-memory catalog keyed by designation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    records: BTreeMap<Designation, CometRecord>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a record; returns the record it replaced.
    pub fn insert(&mut self, record: CometRecord) -> Option<CometRecord> {
        self.records.insert(record.designation.clone(), record)
    }

    pub fn get(&self, designation: &str) -> Option<&CometRecord> {
        self.records.get(designation)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in designation order.
    pub fn iter(&self) -> impl Iterator<Item = &CometRecord> {
        self.records.values()
    }

    /// Split `designations` into known records and unknown designations.
    pub fn resolve<'a>(
        &'a self,
        designations: &'a [String],
    ) -> (Vec<&'a CometRecord>, Vec<&'a str>) {
        let mut found = Vec::new();
        let mut missing = Vec::new();
        for designation in designations {
            match self.get(designation) {
                Some(record) => found.push(record),
                None => missing.push(designation.as_str()),
            }
        }
        (found, missing)
    }

    pub fn periodic(&self) -> impl Iterator<Item = &CometRecord> {
        self.iter().filter(|record| record.is_periodic())
    }

    pub fn hyperbolic(&self) -> impl Iterator<Item = &CometRecord> {
        self.iter().filter(|record| record.is_hyperbolic())
    }

    /// Case-insensitive substring search on name and designation.
    pub fn search(&self, query: &str) -> Vec<&CometRecord> {
        let query = query.to_lowercase();
        self.iter()
            .filter(|record| {
                record.name.to_lowercase().contains(&query)
                    || record.designation.to_lowercase().contains(&query)
            })
            .collect()
    }

    pub fn statistics(&self) -> CatalogStatistics {
        let eccentricities: Vec<f64> = self
            .iter()
            .filter_map(|record| record.elements.as_ref().map(|e| e.eccentricity()))
            .collect();
        let mean_eccentricity = if eccentricities.is_empty() {
            0.0
        } else {
            eccentricities.iter().sum::<f64>() / eccentricities.len() as f64
        };
        CatalogStatistics {
            total: self.len(),
            periodic: self.periodic().count(),
            hyperbolic: self.hyperbolic().count(),
            with_elements: eccentricities.len(),
            mean_eccentricity,
        }
    }
}

impl FromIterator<CometRecord> for Catalog {
    fn from_iter<T: IntoIterator<Item = CometRecord>>(iter: T) -> Self {
        let mut catalog = Catalog::new();
        for record in iter {
            catalog.insert(record);
        }
        catalog
    }
}

#[cfg(test)]
mod catalog_test {
    use super::*;
    use crate::constants::J2000_JD;

    fn halley() -> CometRecord {
        let elements =
            KeplerianElements::from_perihelion(0.586, 0.967, 162.26, 58.42, 111.33, 2446467.395)
                .unwrap();
        CometRecord::new("1P/Halley", "Halley", Some(elements))
    }

    fn oumuamua() -> CometRecord {
        let elements =
            KeplerianElements::from_perihelion(0.2553, 1.2011, 122.74, 24.6, 241.7, 2458006.0)
                .unwrap();
        CometRecord::new("1I/2017 U1", "'Oumuamua", Some(elements))
    }

    #[test]
    fn test_designation_parsing() {
        let record = halley();
        assert_eq!(record.orbit_class, OrbitClass::P);
        assert_eq!(record.periodic_number, Some(1));
        assert!(record.is_periodic());
        assert_eq!(record.to_string(), "1P/Halley");
        assert_eq!(record.full_name(), "1P/Halley (Halley)");

        let record = CometRecord::new("C/2020 F3", "NEOWISE", None);
        assert_eq!(record.orbit_class, OrbitClass::C);
        assert_eq!(record.periodic_number, None);
        assert!(!record.is_periodic());
        assert_eq!(record.to_string(), "C/2020 F3");

        assert_eq!(OrbitClass::from_designation("2I/Borisov"), Some(OrbitClass::I));
        assert_eq!(OrbitClass::from_designation("Halley"), None);
        assert!("Q".parse::<OrbitClass>().is_err());
    }

    #[test]
    fn test_catalog_queries() {
        let elements =
            KeplerianElements::from_degrees(J2000_JD, 3.0, 0.5, 10.0, 80.0, 40.0, 0.0).unwrap();
        let catalog: Catalog = [
            halley(),
            oumuamua(),
            CometRecord::new("C/2020 F3", "NEOWISE", None),
            CometRecord::new("2P/Encke", "Encke", Some(elements)),
        ]
        .into_iter()
        .collect();

        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog.periodic().count(), 2);
        assert_eq!(catalog.hyperbolic().count(), 1);
        assert_eq!(catalog.search("neo").len(), 1);
        assert_eq!(catalog.search("1p/").len(), 1);

        let stats = catalog.statistics();
        assert_eq!(stats.with_elements, 3);
        assert!((stats.mean_eccentricity - (0.967 + 1.2011 + 0.5) / 3.0).abs() < 1e-12);

        let wanted = vec!["2P/Encke".to_string(), "3D/Biela".to_string()];
        let (found, missing) = catalog.resolve(&wanted);
        assert_eq!(found.len(), 1);
        assert_eq!(missing, vec!["3D/Biela"]);
    }
}
