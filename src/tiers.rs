//! Sizing tier classification for wells and faults
//!
//! Tier tables map a closed set of tier kinds to sizing parameters and an
//! explicit membership list. Lookup always walks the kinds in their declared
//! order, so the result does not depend on the order a configuration file
//! happens to list them in.

use crate::error::{EntityKind, MeshError, MeshResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A closed set of tier kinds, ordered from most to least restrictive
pub trait TierKind: Copy + Ord + fmt::Display + fmt::Debug + 'static {
    /// Configuration section holding this table
    const SECTION: &'static str;
}

/// Well sizing tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WellTier {
    Critical,
    Standard,
    Marginal,
}

/// Fault sizing tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultTier {
    Major,
    Minor,
}

impl TierKind for WellTier {
    const SECTION: &'static str = "well_tiers";
}

impl TierKind for FaultTier {
    const SECTION: &'static str = "fault_tiers.tiers";
}

impl fmt::Display for WellTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::Standard => write!(f, "standard"),
            Self::Marginal => write!(f, "marginal"),
        }
    }
}

impl fmt::Display for FaultTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Major => write!(f, "major"),
            Self::Minor => write!(f, "minor"),
        }
    }
}

/// Sizing parameters and membership of one tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierSpec {
    /// Target cell size at the entity (m)
    pub cell_size: f64,
    /// Influence radius (wells) or buffer distance (faults) (m)
    #[serde(alias = "influence_radius", alias = "buffer_distance")]
    pub influence: f64,
    /// Names explicitly assigned to this tier
    #[serde(default)]
    pub members: Vec<String>,
}

impl TierSpec {
    /// Create a tier with no members
    #[must_use]
    pub const fn new(cell_size: f64, influence: f64) -> Self {
        Self {
            cell_size,
            influence,
            members: Vec::new(),
        }
    }

    /// Add member names
    #[must_use]
    pub fn with_members<I, S>(mut self, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.members.extend(members.into_iter().map(Into::into));
        self
    }

    fn contains(&self, name: &str) -> bool {
        self.members.iter().any(|m| m == name)
    }
}

/// Tier table keyed by tier kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TierTable<K: Ord> {
    tiers: BTreeMap<K, TierSpec>,
}

impl<K: TierKind> Default for TierTable<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: TierKind> TierTable<K> {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self {
            tiers: BTreeMap::new(),
        }
    }

    /// Insert or replace a tier
    #[must_use]
    pub fn with_tier(mut self, kind: K, spec: TierSpec) -> Self {
        self.tiers.insert(kind, spec);
        self
    }

    /// Sizing parameters for a tier, if configured
    #[must_use]
    pub fn get(&self, kind: K) -> Option<&TierSpec> {
        self.tiers.get(&kind)
    }

    /// Number of configured tiers
    #[must_use]
    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    /// Whether no tier is configured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// First tier (in declared order) whose membership list contains `name`
    #[must_use]
    pub fn find_member(&self, name: &str) -> Option<(K, &TierSpec)> {
        self.tiers
            .iter()
            .find(|(_, spec)| spec.contains(name))
            .map(|(kind, spec)| (*kind, spec))
    }

    /// Check sizing parameters of every tier
    pub fn validate(&self) -> MeshResult<()> {
        for (kind, spec) in &self.tiers {
            if !(spec.cell_size.is_finite() && spec.cell_size > 0.0) {
                return Err(MeshError::invalid_input(format!(
                    "{}.{kind}.cell_size must be positive, got {}",
                    K::SECTION,
                    spec.cell_size
                )));
            }
            if !(spec.influence.is_finite() && spec.influence >= 0.0) {
                return Err(MeshError::invalid_input(format!(
                    "{}.{kind}.influence must be non-negative, got {}",
                    K::SECTION,
                    spec.influence
                )));
            }
        }
        Ok(())
    }
}

/// Fault tier table plus the rules for faults not explicitly listed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultTierTable {
    /// Major/minor tiers
    pub tiers: TierTable<FaultTier>,
    /// Unlisted faults with a multiplier below this value are major
    #[serde(default = "default_major_threshold")]
    pub major_multiplier_threshold: f64,
    /// Fail on unlisted, non-inferable faults instead of falling back to minor
    #[serde(default)]
    pub strict: bool,
}

const fn default_major_threshold() -> f64 {
    crate::defaults::DEFAULT_MAJOR_MULTIPLIER_THRESHOLD
}

impl Default for FaultTierTable {
    fn default() -> Self {
        Self {
            tiers: TierTable::new(),
            major_multiplier_threshold: default_major_threshold(),
            strict: false,
        }
    }
}

impl FaultTierTable {
    /// Wrap a tier table with default inference rules
    #[must_use]
    pub fn new(tiers: TierTable<FaultTier>) -> Self {
        Self {
            tiers,
            ..Self::default()
        }
    }

    /// Enable or disable fail-fast for unlisted faults
    #[must_use]
    pub const fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Set the sealing threshold used to infer the major tier
    #[must_use]
    pub const fn with_major_threshold(mut self, threshold: f64) -> Self {
        self.major_multiplier_threshold = threshold;
        self
    }
}

/// How a tier was chosen for an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierSource {
    /// Listed in the tier's membership
    Explicit,
    /// Fault inferred as major from its transmissibility multiplier
    InferredFromSealing,
    /// Fault assigned to the minor tier because nothing else matched
    Fallback,
}

/// Result of classifying one entity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierAssignment<K> {
    pub tier: K,
    pub cell_size: f64,
    pub influence: f64,
    pub source: TierSource,
}

/// Resolves wells and faults to sizing tiers
#[derive(Debug, Clone, Copy)]
pub struct TierClassifier<'a> {
    wells: &'a TierTable<WellTier>,
    faults: &'a FaultTierTable,
}

impl<'a> TierClassifier<'a> {
    /// Create a classifier over the configured tables
    pub fn new(wells: &'a TierTable<WellTier>, faults: &'a FaultTierTable) -> MeshResult<Self> {
        wells.validate()?;
        faults.tiers.validate()?;
        Ok(Self { wells, faults })
    }

    /// Classify a well; unlisted wells are a configuration error
    pub fn classify_well(&self, name: &str) -> MeshResult<TierAssignment<WellTier>> {
        let (tier, spec) = self.wells.find_member(name).ok_or_else(|| {
            MeshError::unclassified(EntityKind::Well, name, format!("{}.<tier>.members", WellTier::SECTION))
        })?;
        Ok(TierAssignment {
            tier,
            cell_size: spec.cell_size,
            influence: spec.influence,
            source: TierSource::Explicit,
        })
    }

    /// Classify a fault by membership, then by sealing capacity, then by fallback
    pub fn classify_fault(
        &self,
        name: &str,
        transmissibility_multiplier: f64,
    ) -> MeshResult<TierAssignment<FaultTier>> {
        if let Some((tier, spec)) = self.faults.tiers.find_member(name) {
            return Ok(TierAssignment {
                tier,
                cell_size: spec.cell_size,
                influence: spec.influence,
                source: TierSource::Explicit,
            });
        }

        let (tier, source) = if transmissibility_multiplier < self.faults.major_multiplier_threshold {
            (FaultTier::Major, TierSource::InferredFromSealing)
        } else if self.faults.strict {
            return Err(MeshError::unclassified(
                EntityKind::Fault,
                name,
                format!("{}.<tier>.members", FaultTier::SECTION),
            ));
        } else {
            log::warn!(
                "Fault '{name}' is not listed in any tier and multiplier {transmissibility_multiplier} \
                 is above {}; falling back to the minor tier",
                self.faults.major_multiplier_threshold
            );
            (FaultTier::Minor, TierSource::Fallback)
        };

        let spec = self.faults.tiers.get(tier).ok_or_else(|| {
            MeshError::configuration(
                format!("fault tier '{tier}' required by fault '{name}'"),
                format!("{}.{tier}", FaultTier::SECTION),
            )
        })?;

        Ok(TierAssignment {
            tier,
            cell_size: spec.cell_size,
            influence: spec.influence,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn well_table() -> TierTable<WellTier> {
        TierTable::new()
            .with_tier(WellTier::Standard, TierSpec::new(150.0, 400.0).with_members(["P2", "SHARED"]))
            .with_tier(WellTier::Critical, TierSpec::new(50.0, 300.0).with_members(["P1", "SHARED"]))
    }

    fn fault_table() -> FaultTierTable {
        FaultTierTable::new(
            TierTable::new()
                .with_tier(FaultTier::Major, TierSpec::new(40.0, 200.0).with_members(["F1"]))
                .with_tier(FaultTier::Minor, TierSpec::new(100.0, 100.0)),
        )
    }

    #[test]
    fn test_well_classification_by_membership() {
        let wells = well_table();
        let faults = fault_table();
        let classifier = TierClassifier::new(&wells, &faults).unwrap();

        let p1 = classifier.classify_well("P1").unwrap();
        assert_eq!(p1.tier, WellTier::Critical);
        assert_relative_eq!(p1.cell_size, 50.0);
        assert_relative_eq!(p1.influence, 300.0);

        let p2 = classifier.classify_well("P2").unwrap();
        assert_eq!(p2.tier, WellTier::Standard);
    }

    #[test]
    fn test_declared_order_wins_over_insertion_order() {
        let wells = well_table();
        let faults = fault_table();
        let classifier = TierClassifier::new(&wells, &faults).unwrap();
        // Listed in both; critical is declared first.
        assert_eq!(classifier.classify_well("SHARED").unwrap().tier, WellTier::Critical);
    }

    #[test]
    fn test_unlisted_well_fails() {
        let wells = well_table();
        let faults = fault_table();
        let classifier = TierClassifier::new(&wells, &faults).unwrap();
        let err = classifier.classify_well("GHOST").unwrap_err();
        assert!(matches!(err, MeshError::UnclassifiedEntity { kind: EntityKind::Well, .. }));
        assert!(err.to_string().contains("GHOST"));
    }

    #[test]
    fn test_fault_inferred_from_sealing() {
        let wells = well_table();
        let faults = fault_table();
        let classifier = TierClassifier::new(&wells, &faults).unwrap();
        let f = classifier.classify_fault("F9", 0.001).unwrap();
        assert_eq!(f.tier, FaultTier::Major);
        assert_eq!(f.source, TierSource::InferredFromSealing);
    }

    #[test]
    fn test_fault_fallback_and_strict() {
        let wells = well_table();
        let faults = fault_table();
        let classifier = TierClassifier::new(&wells, &faults).unwrap();
        let f = classifier.classify_fault("F9", 0.8).unwrap();
        assert_eq!(f.tier, FaultTier::Minor);
        assert_eq!(f.source, TierSource::Fallback);

        let strict = fault_table().with_strict(true);
        let classifier = TierClassifier::new(&wells, &strict).unwrap();
        assert!(classifier.classify_fault("F9", 0.8).is_err());
        assert_eq!(classifier.classify_fault("F1", 0.8).unwrap().tier, FaultTier::Major);
    }

    #[test]
    fn test_missing_fallback_tier_is_configuration_error() {
        let wells = well_table();
        let faults = FaultTierTable::new(
            TierTable::new().with_tier(FaultTier::Major, TierSpec::new(40.0, 200.0)),
        );
        let classifier = TierClassifier::new(&wells, &faults).unwrap();
        let err = classifier.classify_fault("F9", 0.9).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_invalid_tier_size_rejected() {
        let wells = TierTable::new().with_tier(WellTier::Critical, TierSpec::new(0.0, 10.0));
        let faults = fault_table();
        assert!(TierClassifier::new(&wells, &faults).is_err());
    }

    #[test]
    fn test_tier_table_json_keys() {
        let json = r#"{"critical": {"cell_size": 50.0, "influence_radius": 300.0, "members": ["P1"]}}"#;
        let table: TierTable<WellTier> = serde_json::from_str(json).unwrap();
        assert_relative_eq!(table.get(WellTier::Critical).unwrap().influence, 300.0);
    }
}
