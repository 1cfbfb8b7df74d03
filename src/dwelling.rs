use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SetupError;
use crate::ids::{DwellingId, HouseholdId, Occupancy, ZoneId};
use crate::store::{EntityStore, MarketEntity};

/// Closed set of dwelling types. Each carries the land it needs per unit and
/// the frictional vacancy the market runs at when it is in balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DwellingType {
    /// Single-family detached
    #[serde(rename = "SFD")]
    SingleFamilyDetached,
    /// Single-family attached
    #[serde(rename = "SFA")]
    SingleFamilyAttached,
    /// Multi-family, 2 to 4 units
    #[serde(rename = "MF234")]
    MultiFamilySmall,
    /// Multi-family, 5 or more units
    #[serde(rename = "MF5plus")]
    MultiFamilyLarge,
    /// Mobile home
    #[serde(rename = "MH")]
    MobileHome,
}

impl DwellingType {
    pub const ALL: [DwellingType; 5] = [
        DwellingType::SingleFamilyDetached,
        DwellingType::SingleFamilyAttached,
        DwellingType::MultiFamilySmall,
        DwellingType::MultiFamilyLarge,
        DwellingType::MobileHome,
    ];

    pub const COUNT: usize = Self::ALL.len();

    pub fn index(self) -> usize {
        match self {
            DwellingType::SingleFamilyDetached => 0,
            DwellingType::SingleFamilyAttached => 1,
            DwellingType::MultiFamilySmall => 2,
            DwellingType::MultiFamilyLarge => 3,
            DwellingType::MobileHome => 4,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            DwellingType::SingleFamilyDetached => "SFD",
            DwellingType::SingleFamilyAttached => "SFA",
            DwellingType::MultiFamilySmall => "MF234",
            DwellingType::MultiFamilyLarge => "MF5plus",
            DwellingType::MobileHome => "MH",
        }
    }

    /// Acres of developable land one unit consumes.
    pub fn area_per_unit(self) -> f64 {
        match self {
            DwellingType::SingleFamilyDetached => 0.2,
            DwellingType::SingleFamilyAttached => 0.1,
            DwellingType::MultiFamilySmall => 0.05,
            DwellingType::MultiFamilyLarge => 0.02,
            DwellingType::MobileHome => 0.15,
        }
    }

    pub fn structural_vacancy(self) -> f64 {
        match self {
            DwellingType::SingleFamilyDetached => 0.01,
            DwellingType::SingleFamilyAttached => 0.03,
            DwellingType::MultiFamilySmall => 0.05,
            DwellingType::MultiFamilyLarge => 0.05,
            DwellingType::MobileHome => 0.03,
        }
    }
}

impl FromStr for DwellingType {
    type Err = SetupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        DwellingType::ALL
            .into_iter()
            .find(|t| t.code().eq_ignore_ascii_case(code))
            .ok_or_else(|| SetupError::UnknownDwellingType(code.to_string()))
    }
}

impl fmt::Display for DwellingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dwelling {
    id: DwellingId,
    zone: ZoneId,
    pub dwelling_type: DwellingType,
    pub bedrooms: u8,
    pub quality: u8,
    pub price: f64,
    pub year_built: i32,
    pub coordinate: Option<(f64, f64)>,
    pub occupant: Occupancy<HouseholdId>,
}

impl Dwelling {
    pub fn new(
        id: DwellingId,
        zone: ZoneId,
        dwelling_type: DwellingType,
        bedrooms: u8,
        quality: u8,
        price: f64,
        year_built: i32,
    ) -> Self {
        Self {
            id,
            zone,
            dwelling_type,
            bedrooms,
            quality,
            price,
            year_built,
            coordinate: None,
            occupant: Occupancy::Vacant,
        }
    }

    pub fn with_occupant(mut self, household: HouseholdId) -> Self {
        self.occupant = Occupancy::Occupied(household);
        self
    }

    pub fn with_coordinate(mut self, x: f64, y: f64) -> Self {
        self.coordinate = Some((x, y));
        self
    }

    pub fn id(&self) -> DwellingId {
        self.id
    }

    pub fn zone(&self) -> ZoneId {
        self.zone
    }
}

impl MarketEntity for Dwelling {
    type Id = DwellingId;

    fn id(&self) -> DwellingId {
        self.id
    }

    fn zone(&self) -> ZoneId {
        self.zone
    }

    fn is_vacant(&self) -> bool {
        self.occupant.is_vacant()
    }
}

pub type DwellingStore = EntityStore<Dwelling>;
