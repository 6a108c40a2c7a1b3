// 📜 Audit Events - append-only log of every contract change
//
// Stores append these next to the change itself; `SqliteStore` writes them
// in the same transaction.

use crate::contract::{Contract, UpdateRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event for audit trail ("every change is an event")
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }

    pub fn contract_created(contract: &Contract) -> Self {
        Event::new(
            "contract_created",
            "contract",
            &contract.id,
            serde_json::json!({
                "property": contract.property,
                "tenant": contract.tenant,
                "initial_rent": contract.initial_rent,
                "update_frequency": contract.update_frequency,
            }),
            &contract.owner,
        )
    }

    pub fn contract_edited(contract: &Contract) -> Self {
        Event::new(
            "contract_edited",
            "contract",
            &contract.id,
            serde_json::json!({
                "version": contract.version,
                "current_rent": contract.current_rent,
            }),
            &contract.owner,
        )
    }

    pub fn contract_retired(contract: &Contract) -> Self {
        Event::new(
            "contract_retired",
            "contract",
            &contract.id,
            serde_json::json!({ "version": contract.version }),
            &contract.owner,
        )
    }

    pub fn rent_escalated(record: &UpdateRecord) -> Self {
        Event::new(
            "rent_escalated",
            "contract",
            &record.contract_id,
            serde_json::json!({
                "record_id": record.id,
                "period_start": record.period_start,
                "period_end": record.period_end,
                "old_rent": record.old_rent,
                "new_rent": record.new_rent,
                "applied_indices": record.applied_indices,
            }),
            &record.updated_by,
        )
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::ContractDraft;
    use rust_decimal::Decimal;

    #[test]
    fn test_contract_events_use_owner_as_actor() {
        let contract = ContractDraft {
            property: "Depto Cabildo".to_string(),
            tenant: "Juan Pérez".to_string(),
            start_date: "2024-01-15".to_string(),
            end_date: "2026-01-14".to_string(),
            initial_rent: Some(Decimal::new(500_000, 0)),
            ..ContractDraft::default()
        }
        .into_contract("owner@example.com")
        .unwrap();

        let created = Event::contract_created(&contract);
        assert_eq!(created.event_type, "contract_created");
        assert_eq!(created.entity_type, "contract");
        assert_eq!(created.entity_id, contract.id);
        assert_eq!(created.actor, "owner@example.com");
        assert_eq!(created.data["property"], "Depto Cabildo");

        let retired = Event::contract_retired(&contract);
        assert_ne!(retired.event_id, created.event_id);
    }
}
