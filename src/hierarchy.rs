//! Arena of administrative units linked by parent ids.

use crate::error::{GeolocateError, Result};
use geolocate_types::{AdministrativeUnit, Level, UnitId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Every unit of every level, keyed by `(level, id)`.
///
/// Parent links are plain ids; nothing holds a reference into another unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "HierarchyRepr", try_from = "HierarchyRepr")]
pub struct Hierarchy {
    levels: [BTreeMap<UnitId, AdministrativeUnit>; 3],
}

#[derive(Serialize, Deserialize)]
struct HierarchyRepr {
    units: Vec<AdministrativeUnit>,
}

impl From<Hierarchy> for HierarchyRepr {
    fn from(hierarchy: Hierarchy) -> Self {
        Self {
            units: hierarchy
                .levels
                .into_iter()
                .flat_map(BTreeMap::into_values)
                .collect(),
        }
    }
}

impl TryFrom<HierarchyRepr> for Hierarchy {
    type Error = GeolocateError;

    fn try_from(repr: HierarchyRepr) -> Result<Self> {
        let mut hierarchy = Hierarchy::new();
        for unit in repr.units {
            hierarchy.insert(unit)?;
        }
        Ok(hierarchy)
    }
}

fn slot(level: Level) -> usize {
    match level {
        Level::Country => 0,
        Level::State => 1,
        Level::Municipality => 2,
    }
}

impl Hierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a unit. A second unit with the same level and id is rejected.
    pub fn insert(&mut self, unit: AdministrativeUnit) -> Result<()> {
        let units = &mut self.levels[slot(unit.level)];
        if units.contains_key(&unit.id) {
            return Err(GeolocateError::InvalidInput(format!(
                "duplicate {} id {}",
                unit.level, unit.id
            )));
        }
        units.insert(unit.id, unit);
        Ok(())
    }

    pub fn unit(&self, level: Level, id: UnitId) -> Option<&AdministrativeUnit> {
        self.levels[slot(level)].get(&id)
    }

    pub fn get(&self, level: Level, id: UnitId) -> Result<&AdministrativeUnit> {
        self.unit(level, id)
            .ok_or(GeolocateError::UnitNotFound { level, id })
    }

    /// Units of one level in id order.
    pub fn units(&self, level: Level) -> impl Iterator<Item = &AdministrativeUnit> {
        self.levels[slot(level)].values()
    }

    pub fn len(&self) -> usize {
        self.levels.iter().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.iter().all(BTreeMap::is_empty)
    }

    pub fn count(&self, level: Level) -> usize {
        self.levels[slot(level)].len()
    }

    pub fn set_parent(&mut self, level: Level, id: UnitId, parent: UnitId) -> Result<()> {
        if level.parent().is_none() {
            return Err(GeolocateError::InvalidInput(format!(
                "{} {} cannot have a parent",
                level, id
            )));
        }
        let unit = self.levels[slot(level)]
            .get_mut(&id)
            .ok_or(GeolocateError::UnitNotFound { level, id })?;
        unit.parent_id = Some(parent);
        Ok(())
    }

    /// Parent of a unit, `None` when the unit has no parent link.
    ///
    /// A link to a unit that does not exist is a `BrokenHierarchy` error.
    pub fn parent(&self, unit: &AdministrativeUnit) -> Result<Option<&AdministrativeUnit>> {
        let (Some(parent_id), Some(parent_level)) = (unit.parent_id, unit.level.parent()) else {
            return Ok(None);
        };
        self.unit(parent_level, parent_id).map(Some).ok_or_else(|| {
            GeolocateError::BrokenHierarchy(format!(
                "{} {} points at missing {} {}",
                unit.level, unit.id, parent_level, parent_id
            ))
        })
    }

    /// Ancestors of a unit, nearest first. Stops at the first missing link.
    pub fn ancestors(&self, level: Level, id: UnitId) -> Result<Vec<&AdministrativeUnit>> {
        let mut current = self.get(level, id)?;
        let mut chain = Vec::with_capacity(2);
        while let Some(parent) = self.parent(current)? {
            chain.push(parent);
            current = parent;
        }
        Ok(chain)
    }

    /// Checks that every state and municipality links to an existing unit
    /// one level up and that no country has a parent.
    pub fn validate(&self) -> Result<()> {
        for level in Level::ALL {
            for unit in self.units(level) {
                match (level.parent(), unit.parent_id) {
                    (None, None) => {}
                    (None, Some(parent)) => {
                        return Err(GeolocateError::BrokenHierarchy(format!(
                            "{} {} has parent {}",
                            level, unit.id, parent
                        )));
                    }
                    (Some(_), None) => {
                        return Err(GeolocateError::BrokenHierarchy(format!(
                            "{} {} ({}) has no parent",
                            level, unit.id, unit.name
                        )));
                    }
                    (Some(_), Some(_)) => {
                        self.parent(unit)?;
                    }
                }
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geolocate_types::{BoundingBox, GeometryHandle};

    fn unit(level: Level, id: u64, name: &str, parent: Option<u64>) -> AdministrativeUnit {
        AdministrativeUnit::new(
            UnitId(id),
            level,
            format!("{}-{}", level, id),
            name,
            BoundingBox::new(0.0, 0.0, 1.0, 1.0),
            GeometryHandle(id),
        )
        .with_parent(parent.map(UnitId))
    }

    fn belgium() -> Hierarchy {
        let mut hierarchy = Hierarchy::new();
        hierarchy.insert(unit(Level::Country, 1, "Belgium", None)).unwrap();
        hierarchy.insert(unit(Level::State, 4, "Liège", Some(1))).unwrap();
        hierarchy
            .insert(unit(Level::Municipality, 1, "Liège", Some(4)))
            .unwrap();
        hierarchy
    }

    #[test]
    fn test_ids_are_scoped_per_level() {
        let hierarchy = belgium();
        assert_eq!(hierarchy.len(), 3);
        assert_eq!(hierarchy.get(Level::Country, UnitId(1)).unwrap().name, "Belgium");
        assert_eq!(
            hierarchy.get(Level::Municipality, UnitId(1)).unwrap().level,
            Level::Municipality
        );
        assert!(matches!(
            hierarchy.get(Level::State, UnitId(1)),
            Err(GeolocateError::UnitNotFound { .. })
        ));
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut hierarchy = belgium();
        let result = hierarchy.insert(unit(Level::State, 4, "Again", Some(1)));
        assert!(matches!(result, Err(GeolocateError::InvalidInput(_))));
    }

    #[test]
    fn test_ancestors() {
        let hierarchy = belgium();
        let names: Vec<_> = hierarchy
            .ancestors(Level::Municipality, UnitId(1))
            .unwrap()
            .into_iter()
            .map(|u| (u.level, u.name.as_str()))
            .collect();
        assert_eq!(names, vec![(Level::State, "Liège"), (Level::Country, "Belgium")]);
        assert!(hierarchy.ancestors(Level::Country, UnitId(1)).unwrap().is_empty());
    }

    #[test]
    fn test_validate() {
        let mut hierarchy = belgium();
        assert!(hierarchy.validate().is_ok());

        hierarchy.insert(unit(Level::Municipality, 2, "Orphan", None)).unwrap();
        assert!(matches!(hierarchy.validate(), Err(GeolocateError::BrokenHierarchy(_))));

        hierarchy.set_parent(Level::Municipality, UnitId(2), UnitId(99)).unwrap();
        assert!(matches!(hierarchy.validate(), Err(GeolocateError::BrokenHierarchy(_))));
        assert!(hierarchy.ancestors(Level::Municipality, UnitId(2)).is_err());

        hierarchy.set_parent(Level::Municipality, UnitId(2), UnitId(4)).unwrap();
        assert!(hierarchy.validate().is_ok());
    }

    #[test]
    fn test_country_cannot_get_parent() {
        let mut hierarchy = belgium();
        assert!(hierarchy.set_parent(Level::Country, UnitId(1), UnitId(1)).is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let hierarchy = belgium();
        let json = hierarchy.to_json().unwrap();
        let restored = Hierarchy::from_json_str(&json).unwrap();
        assert_eq!(restored, hierarchy);
    }
}
