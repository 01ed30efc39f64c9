use std::fmt;

use serde::Deserialize;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Company,
    Shareholder,
}

impl EntityKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Company => "Company",
            Self::Shareholder => "Shareholder",
        }
    }
}

/// A company or shareholder record as delivered by the registry. The graph only
/// ever holds clones of these; it never edits them.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub kind: EntityKind,
    #[serde(default, rename = "countryCode")]
    pub country_code: Option<String>,
    #[serde(default)]
    pub stocks: Option<u64>,
    #[serde(default, rename = "orgnr")]
    pub registry_number: Option<String>,
}

impl Entity {
    pub fn is_company(&self) -> bool {
        self.kind == EntityKind::Company
    }

    /// Percentage of this company's outstanding stock represented by `stake`.
    pub fn share_percent(&self, stake: u64) -> Option<f64> {
        let total = self.stocks.filter(|total| *total > 0)?;
        Some(stake as f64 * 100.0 / total as f64)
    }
}

/// One row of an investor or investment listing: the counter-party and the
/// number of shares involved.
#[derive(Clone, Debug, PartialEq)]
pub struct Ownership {
    pub entity: Entity,
    pub stake: u64,
}

impl Ownership {
    pub fn new(entity: Entity, stake: u64) -> Self {
        Self { entity, stake }
    }
}

#[cfg(test)]
impl Entity {
    pub fn company(id: &str, name: &str, stocks: Option<u64>) -> Self {
        Self {
            id: EntityId::new(id),
            name: name.to_owned(),
            kind: EntityKind::Company,
            country_code: None,
            stocks,
            registry_number: None,
        }
    }

    pub fn shareholder(id: &str, name: &str, country_code: Option<&str>) -> Self {
        Self {
            id: EntityId::new(id),
            name: name.to_owned(),
            kind: EntityKind::Shareholder,
            country_code: country_code.map(str::to_owned),
            stocks: None,
            registry_number: None,
        }
    }
}
