use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::cometprop_errors::CometPropError;
use crate::constants::GAUSS_GRAV_SQUARED;

/// Perturbing planets, identified by their NAIF barycentre id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Planet {
    Mercury = 1,
    Venus = 2,
    #[serde(alias = "earth", alias = "emb")]
    EarthMoon = 3,
    Mars = 4,
    Jupiter = 5,
    Saturn = 6,
    Uranus = 7,
    Neptune = 8,
}

impl Planet {
    pub const ALL: [Planet; 8] = [
        Planet::Mercury,
        Planet::Venus,
        Planet::EarthMoon,
        Planet::Mars,
        Planet::Jupiter,
        Planet::Saturn,
        Planet::Uranus,
        Planet::Neptune,
    ];

    pub fn from_id(id: i32) -> Result<Self, CometPropError> {
        match id {
            1 => Ok(Planet::Mercury),
            2 => Ok(Planet::Venus),
            3 => Ok(Planet::EarthMoon),
            4 => Ok(Planet::Mars),
            5 => Ok(Planet::Jupiter),
            6 => Ok(Planet::Saturn),
            7 => Ok(Planet::Uranus),
            8 => Ok(Planet::Neptune),
            _ => Err(CometPropError::InvalidRequest(format!(
                "invalid planetary barycentre id: {id}"
            ))),
        }
    }

    /// NAIF id of the planetary system barycentre.
    pub fn to_id(&self) -> i32 {
        *self as i32
    }

    /// Dense index in `0..8`, in [`Planet::ALL`] order.
    pub fn index(&self) -> usize {
        (*self as usize) - 1
    }

    /// Planet-system to Sun mass ratio.
    pub fn mass_ratio(&self) -> f64 {
        match self {
            Planet::Mercury => 1.6601e-7,
            Planet::Venus => 2.4478383e-6,
            Planet::EarthMoon => 3.0404326e-6,
            Planet::Mars => 3.2271514e-7,
            Planet::Jupiter => 9.5479194e-4,
            Planet::Saturn => 2.8588567e-4,
            Planet::Uranus => 4.3662440e-5,
            Planet::Neptune => 5.1513890e-5,
        }
    }

    /// Gravitational parameter `μ☉ · m/M☉` in AU³/day².
    pub fn gm(&self) -> f64 {
        GAUSS_GRAV_SQUARED * self.mass_ratio()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Planet::Mercury => "mercury",
            Planet::Venus => "venus",
            Planet::EarthMoon => "earth_moon",
            Planet::Mars => "mars",
            Planet::Jupiter => "jupiter",
            Planet::Saturn => "saturn",
            Planet::Uranus => "uranus",
            Planet::Neptune => "neptune",
        }
    }
}

impl From<Planet> for i32 {
    fn from(planet: Planet) -> Self {
        planet.to_id()
    }
}

impl TryFrom<i32> for Planet {
    type Error = CometPropError;

    fn try_from(id: i32) -> Result<Self, Self::Error> {
        Planet::from_id(id)
    }
}

impl FromStr for Planet {
    type Err = CometPropError;

    /// Case-insensitive planet name; `earth`, `emb` and `earth-moon` all map to the
    /// Earth–Moon barycentre.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mercury" => Ok(Planet::Mercury),
            "venus" => Ok(Planet::Venus),
            "earth" | "emb" | "earth_moon" | "earth-moon" => Ok(Planet::EarthMoon),
            "mars" => Ok(Planet::Mars),
            "jupiter" => Ok(Planet::Jupiter),
            "saturn" => Ok(Planet::Saturn),
            "uranus" => Ok(Planet::Uranus),
            "neptune" => Ok(Planet::Neptune),
            other => Err(CometPropError::InvalidRequest(format!(
                "unknown perturbing body: {other}"
            ))),
        }
    }
}

impl fmt::Display for Planet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Planet::Mercury => "Mercury",
            Planet::Venus => "Venus",
            Planet::EarthMoon => "Earth-Moon Barycenter",
            Planet::Mars => "Mars",
            Planet::Jupiter => "Jupiter",
            Planet::Saturn => "Saturn",
            Planet::Uranus => "Uranus",
            Planet::Neptune => "Neptune",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod test_planet {
    use super::*;

    #[test]
    fn test_planet_ids() {
        for planet in Planet::ALL {
            assert_eq!(Planet::from_id(planet.to_id()).unwrap(), planet);
            assert_eq!(Planet::ALL[planet.index()], planet);
        }
        assert_eq!(i32::from(Planet::Jupiter), 5);
        assert!(Planet::try_from(9).is_err());
    }

    #[test]
    fn test_planet_from_str() {
        assert_eq!("Jupiter".parse::<Planet>().unwrap(), Planet::Jupiter);
        assert_eq!(" SATURN ".parse::<Planet>().unwrap(), Planet::Saturn);
        assert_eq!("earth".parse::<Planet>().unwrap(), Planet::EarthMoon);
        assert!("pluto".parse::<Planet>().is_err());
    }

    #[test]
    fn test_planet_gm() {
        approx::assert_relative_eq!(
            Planet::Jupiter.gm(),
            2.825345e-7,
            max_relative = 1e-6
        );
        assert_eq!(format!("{}", Planet::EarthMoon), "Earth-Moon Barycenter");
        assert_eq!(
            serde_json::to_string(&Planet::EarthMoon).unwrap(),
            "\"earth_moon\""
        );
    }
}
