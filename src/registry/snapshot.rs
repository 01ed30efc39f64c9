use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use tracing::debug;

use super::entity::{Entity, EntityId, EntityKind, Ownership};
use super::source::{FetchError, OwnershipSource};

#[derive(Clone, Debug, Deserialize)]
struct RawSnapshot {
    #[serde(default)]
    entities: Vec<Entity>,
    #[serde(default)]
    ownerships: Vec<RawOwnership>,
}

#[derive(Clone, Debug, Deserialize)]
struct RawOwnership {
    year: u16,
    owner: EntityId,
    company: EntityId,
    stocks: u64,
}

/// Shareholder register held in memory, typically loaded from a JSON export.
#[derive(Clone, Debug, Default)]
pub struct RegistrySnapshot {
    entities: HashMap<EntityId, Entity>,
    by_registry_number: HashMap<String, EntityId>,
    ownerships: Vec<RawOwnership>,
}

impl RegistrySnapshot {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read registry snapshot {}", path.display()))?;
        Self::from_json(&raw)
            .with_context(|| format!("failed to parse registry snapshot {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let parsed: RawSnapshot = serde_json::from_str(raw).context("invalid snapshot JSON")?;
        if parsed.entities.is_empty() {
            return Err(anyhow!("registry snapshot contains no entities"));
        }

        let mut snapshot = Self::default();
        for entity in parsed.entities {
            snapshot.insert_entity(entity);
        }
        for row in &parsed.ownerships {
            snapshot.insert_ownership(row.year, &row.owner, &row.company, row.stocks);
        }
        debug!(
            entities = snapshot.entities.len(),
            ownerships = snapshot.ownerships.len(),
            "loaded registry snapshot"
        );
        Ok(snapshot)
    }

    pub fn insert_entity(&mut self, entity: Entity) {
        if entity.is_company()
            && let Some(registry_number) = &entity.registry_number
        {
            self.by_registry_number
                .insert(registry_number.clone(), entity.id.clone());
        }
        self.entities.insert(entity.id.clone(), entity);
    }

    pub fn insert_ownership(&mut self, year: u16, owner: &EntityId, company: &EntityId, stocks: u64) {
        self.ownerships.push(RawOwnership {
            year,
            owner: owner.clone(),
            company: company.clone(),
            stocks,
        });
    }

    fn entity(&self, id: &EntityId) -> Result<Entity, FetchError> {
        self.entities
            .get(id)
            .cloned()
            .ok_or_else(|| FetchError::Upstream(format!("ownership references unknown entity {id}")))
    }

    /// Shareholders that are companies in their own right are listed as owners
    /// of the company record, not of the shareholder record.
    fn company_side_id<'a>(&'a self, entity: &'a Entity) -> Option<&'a EntityId> {
        match entity.kind {
            EntityKind::Company => Some(&entity.id),
            EntityKind::Shareholder => entity
                .registry_number
                .as_ref()
                .and_then(|registry_number| self.by_registry_number.get(registry_number)),
        }
    }

    fn window(
        &self,
        rows: Vec<&RawOwnership>,
        limit: usize,
        skip: usize,
        counter_party: impl Fn(&RawOwnership) -> &EntityId,
    ) -> Result<Vec<Ownership>, FetchError> {
        let mut rows = rows;
        rows.sort_by(|a, b| {
            b.stocks
                .cmp(&a.stocks)
                .then_with(|| counter_party(*a).cmp(counter_party(*b)))
        });

        rows.into_iter()
            .skip(skip)
            .take(limit)
            .map(|row| Ok(Ownership::new(self.entity(counter_party(row))?, row.stocks)))
            .collect()
    }
}

impl OwnershipSource for RegistrySnapshot {
    fn resolve_entity(&self, id: &EntityId) -> Result<Entity, FetchError> {
        self.entities
            .get(id)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(id.to_string()))
    }

    fn resolve_company_by_registry_number(
        &self,
        registry_number: &str,
    ) -> Result<Entity, FetchError> {
        let id = self
            .by_registry_number
            .get(registry_number)
            .ok_or_else(|| FetchError::NotFound(format!("orgnr {registry_number}")))?;
        self.resolve_entity(id)
    }

    fn list_investors(
        &self,
        entity: &Entity,
        year: u16,
        limit: usize,
        skip: usize,
    ) -> Result<Vec<Ownership>, FetchError> {
        let Some(company_id) = self.company_side_id(entity) else {
            return Ok(Vec::new());
        };

        let rows = self
            .ownerships
            .iter()
            .filter(|row| row.year == year && &row.company == company_id)
            .collect::<Vec<_>>();
        self.window(rows, limit, skip, |row| &row.owner)
    }

    fn list_investments(
        &self,
        entity: &Entity,
        year: u16,
        limit: usize,
        skip: usize,
    ) -> Result<Vec<Ownership>, FetchError> {
        let rows = self
            .ownerships
            .iter()
            .filter(|row| row.year == year && row.owner == entity.id)
            .collect::<Vec<_>>();
        self.window(rows, limit, skip, |row| &row.company)
    }
}
