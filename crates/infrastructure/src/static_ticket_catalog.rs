use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use mellon_application::{TicketCatalog, TicketContext};
use mellon_core::{AppError, AppResult};
use serde::Deserialize;

/// Ticket catalog loaded once from a JSON file keyed by ticket id.
#[derive(Clone, Default)]
pub struct StaticTicketCatalog {
    tickets: Vec<TicketContext>,
}

#[derive(Debug, Deserialize)]
struct TicketFields {
    status: String,
    assignee: String,
    summary: String,
    #[serde(rename = "type")]
    ticket_type: String,
    severity: String,
}

impl StaticTicketCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a catalog from already-built tickets.
    #[must_use]
    pub fn new(tickets: Vec<TicketContext>) -> Self {
        Self { tickets }
    }

    /// Parses the `{ "TICKET-101": { ... } }` document format.
    pub fn from_json(document: &str) -> AppResult<Self> {
        let entries: BTreeMap<String, TicketFields> = serde_json::from_str(document)
            .map_err(|error| AppError::Validation(format!("invalid ticket catalog: {error}")))?;

        Ok(Self::new(
            entries
                .into_iter()
                .map(|(ticket_id, fields)| TicketContext {
                    ticket_id,
                    status: fields.status,
                    assignee: fields.assignee,
                    summary: fields.summary,
                    ticket_type: fields.ticket_type,
                    severity: fields.severity,
                })
                .collect(),
        ))
    }

    /// Loads a catalog file.
    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let document = std::fs::read_to_string(path).map_err(|error| {
            AppError::Internal(format!(
                "failed to read ticket catalog '{}': {error}",
                path.display()
            ))
        })?;

        Self::from_json(&document)
    }

    /// Number of known tickets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    /// Returns true when the catalog holds no tickets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }
}

#[async_trait]
impl TicketCatalog for StaticTicketCatalog {
    async fn list_tickets(&self) -> AppResult<Vec<TicketContext>> {
        Ok(self.tickets.clone())
    }
}

#[cfg(test)]
mod tests {
    use mellon_application::TicketCatalog;
    use mellon_core::AppError;

    use super::StaticTicketCatalog;

    #[tokio::test]
    async fn loads_keyed_ticket_document() {
        let catalog = StaticTicketCatalog::from_json(
            r#"{
                "TICKET-900": {"status": "Closed", "assignee": "dev@example.com", "summary": "Footer", "type": "Task", "severity": "Low"},
                "TICKET-101": {"status": "In Progress", "assignee": "jake@example.com", "summary": "CSS typo", "type": "Bug", "severity": "Low"}
            }"#,
        )
        .unwrap_or_else(|_| unreachable!());

        let tickets = catalog.list_tickets().await.unwrap_or_default();
        assert_eq!(tickets.len(), 2);
        assert_eq!(tickets[0].ticket_id, "TICKET-101");
        assert_eq!(tickets[0].ticket_type, "Bug");
        assert_eq!(tickets[1].status, "Closed");
    }

    #[test]
    fn rejects_malformed_document() {
        assert!(matches!(
            StaticTicketCatalog::from_json(r#"["TICKET-101"]"#),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn bundled_example_catalog_parses() {
        let catalog = StaticTicketCatalog::load(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../../config/tickets.example.json"
        ))
        .unwrap_or_else(|_| unreachable!());

        assert_eq!(catalog.len(), 3);
    }
}
