//! Zone system: every zone belongs to exactly one region.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::SetupError;
use crate::ids::{RegionId, ZoneId};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: ZoneId,
    pub region: RegionId,
    pub area_acres: f64,
}

/// Read-only zone/region hierarchy shared by every market component.
#[derive(Debug, Clone, Default)]
pub struct GeoData {
    zones: BTreeMap<ZoneId, Zone>,
    regions: BTreeMap<RegionId, Vec<ZoneId>>,
}

impl GeoData {
    pub fn new(zones: impl IntoIterator<Item = Zone>) -> Result<Self, SetupError> {
        let mut geo = GeoData::default();
        for zone in zones {
            if geo.zones.insert(zone.id, zone).is_some() {
                return Err(SetupError::DuplicateZone(zone.id));
            }
            geo.regions.entry(zone.region).or_default().push(zone.id);
        }
        Ok(geo)
    }

    pub fn zone(&self, id: ZoneId) -> Option<&Zone> {
        self.zones.get(&id)
    }

    pub fn region_of(&self, zone: ZoneId) -> Option<RegionId> {
        self.zones.get(&zone).map(|z| z.region)
    }

    pub fn zones_in(&self, region: RegionId) -> &[ZoneId] {
        self.regions.get(&region).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn zones(&self) -> impl Iterator<Item = &Zone> {
        self.zones.values()
    }

    pub fn region_ids(&self) -> impl Iterator<Item = RegionId> + '_ {
        self.regions.keys().copied()
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    pub fn require_zone(&self, zone: ZoneId) -> Result<RegionId, SetupError> {
        self.region_of(zone).ok_or(SetupError::UnknownZone(zone))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(id: u32, region: u32) -> Zone {
        Zone {
            id: ZoneId(id),
            region: RegionId(region),
            area_acres: 100.0,
        }
    }

    #[test]
    fn zones_group_into_regions() {
        let geo = GeoData::new([zone(1, 10), zone(2, 10), zone(3, 20)]).unwrap();
        assert_eq!(geo.region_of(ZoneId(2)), Some(RegionId(10)));
        assert_eq!(geo.zones_in(RegionId(10)), &[ZoneId(1), ZoneId(2)]);
        assert!(geo.zones_in(RegionId(99)).is_empty());
        assert_eq!(geo.region_count(), 2);
    }

    #[test]
    fn duplicate_zone_is_rejected() {
        let err = GeoData::new([zone(1, 10), zone(1, 20)]).unwrap_err();
        assert!(matches!(err, SetupError::DuplicateZone(ZoneId(1))));
    }
}
