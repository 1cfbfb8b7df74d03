//! Remaining developable capacity per zone, and which dwelling types may be
//! built there.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::dwelling::DwellingType;
use crate::error::SetupError;
use crate::geo::GeoData;
use crate::ids::ZoneId;

const ZONE_COLUMN: &str = "zone";
const CAPACITY_COLUMN: &str = "capacity";
const TABLE_NAME: &str = "development constraints";

/// Unit the ledger counts in. Fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityMode {
    /// Whole dwelling units; each consumption removes one unit.
    Units,
    /// Developable acres; consumption removes the supplied acreage.
    Area,
}

impl FromStr for CapacityMode {
    type Err = SetupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "units" => Ok(CapacityMode::Units),
            "area" => Ok(CapacityMode::Area),
            other => Err(SetupError::InvalidMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct ZoneDevelopment {
    capacity: f64,
    allowed: [bool; DwellingType::COUNT],
}

#[derive(Debug, Clone)]
pub struct DevelopmentLedger {
    mode: CapacityMode,
    zones: BTreeMap<ZoneId, ZoneDevelopment>,
}

impl DevelopmentLedger {
    pub fn new(mode: CapacityMode) -> Self {
        Self {
            mode,
            zones: BTreeMap::new(),
        }
    }

    /// Parses a comma-separated constraints table. The header must carry
    /// `zone` and `capacity`; every other column names a dwelling type and
    /// holds `1`/`0` (or `true`/`false`). Zones absent from the table get no
    /// capacity and allow no type.
    pub fn from_table(mode: CapacityMode, text: &str, geo: &GeoData) -> Result<Self, SetupError> {
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(n, l)| (n + 1, l.trim()))
            .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'));

        let header: Vec<&str> = match lines.next() {
            Some((_, line)) => line.split(',').map(str::trim).collect(),
            None => Vec::new(),
        };
        let column = |name: &str| {
            header
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
                .ok_or_else(|| SetupError::MissingColumn {
                    table: TABLE_NAME.to_string(),
                    column: name.to_string(),
                })
        };
        let zone_col = column(ZONE_COLUMN)?;
        let capacity_col = column(CAPACITY_COLUMN)?;
        let mut type_cols = Vec::new();
        for (idx, name) in header.iter().enumerate() {
            if idx != zone_col && idx != capacity_col {
                type_cols.push((idx, name.parse::<DwellingType>()?));
            }
        }

        let mut ledger = DevelopmentLedger::new(mode);
        for (line_no, line) in lines {
            let cells: Vec<&str> = line.split(',').map(str::trim).collect();
            let cell = |idx: usize| {
                cells.get(idx).copied().ok_or_else(|| SetupError::InvalidValue {
                    column: header[idx].to_string(),
                    value: String::new(),
                    line: line_no,
                })
            };
            let invalid = |idx: usize, value: &str| SetupError::InvalidValue {
                column: header[idx].to_string(),
                value: value.to_string(),
                line: line_no,
            };

            let raw_zone = cell(zone_col)?;
            let zone = ZoneId(raw_zone.parse::<u32>().map_err(|_| invalid(zone_col, raw_zone))?);
            geo.require_zone(zone)?;
            let raw_capacity = cell(capacity_col)?;
            let capacity: f64 = raw_capacity
                .parse()
                .ok()
                .filter(|c: &f64| c.is_finite() && *c >= 0.0)
                .ok_or_else(|| invalid(capacity_col, raw_capacity))?;

            let mut allowed = [false; DwellingType::COUNT];
            for (idx, dwelling_type) in &type_cols {
                let raw = cell(*idx)?;
                allowed[dwelling_type.index()] = parse_flag(raw).ok_or_else(|| invalid(*idx, raw))?;
            }
            if ledger
                .zones
                .insert(zone, ZoneDevelopment { capacity, allowed })
                .is_some()
            {
                return Err(SetupError::DuplicateZone(zone));
            }
        }
        Ok(ledger)
    }

    pub fn mode(&self) -> CapacityMode {
        self.mode
    }

    /// Units or acres still available, depending on the mode.
    pub fn available_capacity(&self, zone: ZoneId) -> f64 {
        self.zones.get(&zone).map_or(0.0, |z| z.capacity)
    }

    pub fn set_capacity(&mut self, zone: ZoneId, capacity: f64) {
        self.zones.entry(zone).or_default().capacity = capacity.max(0.0);
    }

    pub fn allow(&mut self, zone: ZoneId, dwelling_type: DwellingType, allowed: bool) {
        self.zones.entry(zone).or_default().allowed[dwelling_type.index()] = allowed;
    }

    pub fn is_type_allowed(&self, zone: ZoneId, dwelling_type: DwellingType) -> bool {
        self.zones
            .get(&zone)
            .is_some_and(|z| z.allowed[dwelling_type.index()])
    }

    /// Records one construction. Unit mode always removes a single unit and
    /// ignores `acres`; area mode removes `acres`.
    pub fn consume(&mut self, zone: ZoneId, acres: f64) {
        let amount = match self.mode {
            CapacityMode::Units => 1.0,
            CapacityMode::Area => acres,
        };
        self.take(zone, amount);
    }

    /// Records construction of `units` dwellings of one type.
    pub fn consume_for(&mut self, zone: ZoneId, dwelling_type: DwellingType, units: u32) {
        match self.mode {
            CapacityMode::Units => self.take(zone, f64::from(units)),
            CapacityMode::Area => self.take(zone, units_to_area(dwelling_type, units)),
        }
    }

    /// Whether `units` dwellings of the type fit into the zone right now.
    pub fn can_build(&self, zone: ZoneId, dwelling_type: DwellingType, units: u32) -> bool {
        if !self.is_type_allowed(zone, dwelling_type) {
            return false;
        }
        let needed = match self.mode {
            CapacityMode::Units => f64::from(units),
            CapacityMode::Area => units_to_area(dwelling_type, units),
        };
        self.available_capacity(zone) >= needed
    }

    fn take(&mut self, zone: ZoneId, amount: f64) {
        let Some(entry) = self.zones.get_mut(&zone) else {
            warn!(zone = %zone, amount, "construction in a zone without development capacity");
            return;
        };
        if amount > entry.capacity {
            warn!(
                zone = %zone,
                amount,
                remaining = entry.capacity,
                "development capacity overdrawn, clamping at zero"
            );
        }
        entry.capacity = (entry.capacity - amount).max(0.0);
    }
}

pub fn units_to_area(dwelling_type: DwellingType, units: u32) -> f64 {
    dwelling_type.area_per_unit() * f64::from(units)
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Zone;
    use crate::ids::RegionId;

    fn geo() -> GeoData {
        GeoData::new((1..=3).map(|id| Zone {
            id: ZoneId(id),
            region: RegionId(1),
            area_acres: 100.0,
        }))
        .unwrap()
    }

    const TABLE: &str = "zone,capacity,SFD,SFA,MF234,MF5plus,MH\n\
                         1,3,1,1,0,0,0\n\
                         2,12.5,0,0,1,1,0\n";

    #[test]
    fn table_loads_masks_and_defaults_missing_zones() {
        let ledger = DevelopmentLedger::from_table(CapacityMode::Units, TABLE, &geo()).unwrap();
        assert!(ledger.is_type_allowed(ZoneId(1), DwellingType::SingleFamilyDetached));
        assert!(!ledger.is_type_allowed(ZoneId(1), DwellingType::MultiFamilyLarge));
        assert!(ledger.is_type_allowed(ZoneId(2), DwellingType::MultiFamilyLarge));
        for t in DwellingType::ALL {
            assert!(!ledger.is_type_allowed(ZoneId(3), t));
        }
        assert_eq!(ledger.available_capacity(ZoneId(3)), 0.0);
    }

    #[test]
    fn unit_mode_decrements_by_one() {
        let mut ledger = DevelopmentLedger::from_table(CapacityMode::Units, TABLE, &geo()).unwrap();
        ledger.consume(ZoneId(1), 40.0);
        assert_eq!(ledger.available_capacity(ZoneId(1)), 2.0);
        ledger.consume_for(ZoneId(1), DwellingType::SingleFamilyDetached, 5);
        assert_eq!(ledger.available_capacity(ZoneId(1)), 0.0);
    }

    #[test]
    fn area_mode_decrements_by_acreage() {
        let mut ledger = DevelopmentLedger::from_table(CapacityMode::Area, TABLE, &geo()).unwrap();
        ledger.consume(ZoneId(2), 2.5);
        assert_eq!(ledger.available_capacity(ZoneId(2)), 10.0);
        assert!(ledger.can_build(ZoneId(2), DwellingType::MultiFamilyLarge, 500));
        assert!(!ledger.can_build(ZoneId(2), DwellingType::MultiFamilyLarge, 501));
        ledger.consume_for(ZoneId(2), DwellingType::MultiFamilyLarge, 100);
        assert!((ledger.available_capacity(ZoneId(2)) - 8.0).abs() < 1e-9);
    }

    #[test]
    fn ledger_built_by_hand() {
        let mut ledger = DevelopmentLedger::new(CapacityMode::Units);
        assert_eq!(ledger.mode(), CapacityMode::Units);
        assert!(!ledger.can_build(ZoneId(1), DwellingType::MobileHome, 1));
        ledger.set_capacity(ZoneId(1), 1.0);
        ledger.allow(ZoneId(1), DwellingType::MobileHome, true);
        assert!(ledger.can_build(ZoneId(1), DwellingType::MobileHome, 1));
        assert!(!ledger.can_build(ZoneId(1), DwellingType::MobileHome, 2));
        ledger.allow(ZoneId(1), DwellingType::MobileHome, false);
        assert!(!ledger.is_type_allowed(ZoneId(1), DwellingType::MobileHome));
    }

    #[test]
    fn overdraw_clamps_at_zero() {
        let mut ledger = DevelopmentLedger::from_table(CapacityMode::Area, TABLE, &geo()).unwrap();
        ledger.consume(ZoneId(1), 10.0);
        assert_eq!(ledger.available_capacity(ZoneId(1)), 0.0);
        assert!((units_to_area(DwellingType::SingleFamilyDetached, 5) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn missing_column_aborts() {
        let err = DevelopmentLedger::from_table(CapacityMode::Units, "zone,SFD\n1,1\n", &geo())
            .unwrap_err();
        assert!(matches!(err, SetupError::MissingColumn { column, .. } if column == "capacity"));
    }

    #[test]
    fn unknown_type_column_aborts() {
        let err = DevelopmentLedger::from_table(CapacityMode::Units, "zone,capacity,IGLOO\n", &geo())
            .unwrap_err();
        assert!(matches!(err, SetupError::UnknownDwellingType(code) if code == "IGLOO"));
    }

    #[test]
    fn unknown_zone_aborts() {
        let err = DevelopmentLedger::from_table(CapacityMode::Units, "zone,capacity\n9,1\n", &geo())
            .unwrap_err();
        assert!(matches!(err, SetupError::UnknownZone(ZoneId(9))));
    }
}
