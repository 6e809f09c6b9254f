use tracing::info;

use crate::error::{Error, Result};
use crate::feature::{FeatureSet, POWER_KEY};

/// Attribute predicate selecting one class of power infrastructure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFilter {
    pub name: &'static str,
    pub attribute: &'static str,
    pub values: &'static [&'static str],
}

/// `power=substation`
pub const SUBSTATIONS: FeatureFilter = FeatureFilter {
    name: "substation",
    attribute: POWER_KEY,
    values: &["substation"],
};

/// `power=line|minor_line|cable`
pub const TRANSMISSION: FeatureFilter = FeatureFilter {
    name: "transmission",
    attribute: POWER_KEY,
    values: &["line", "minor_line", "cable"],
};

impl FeatureFilter {
    pub fn matches(&self, value: &str) -> bool {
        self.values.contains(&value)
    }

    /// Keep the records whose attribute value is accepted, in order.
    ///
    /// A non-empty set where no record carries the attribute at all is treated
    /// as a broken extraction and reported as [`Error::Filter`].
    pub fn apply(&self, features: &FeatureSet) -> Result<FeatureSet> {
        if !features.is_empty() && !features.has_attribute(self.attribute) {
            return Err(Error::Filter(format!(
                "attribute '{}' missing from all {} extracted features",
                self.attribute,
                features.len()
            )));
        }

        let selected: Vec<_> = features
            .iter()
            .filter(|f| {
                f.attributes
                    .get_str(self.attribute)
                    .is_some_and(|v| self.matches(v))
            })
            .cloned()
            .collect();

        info!(
            "Filtered {} {} features out of {}",
            selected.len(),
            self.name,
            features.len()
        );
        Ok(FeatureSet::new(features.crs.clone(), selected))
    }
}

pub fn filter_substations(features: &FeatureSet) -> Result<FeatureSet> {
    SUBSTATIONS.apply(features)
}

pub fn filter_transmission_lines(features: &FeatureSet) -> Result<FeatureSet> {
    TRANSMISSION.apply(features)
}
