//! Document mapping from tickets to Tantivy documents.

use std::collections::BTreeMap;

use tantivy::schema::OwnedValue;
use tantivy::{doc, TantivyDocument};

use matchmaker_types::Ticket;

use crate::schema::TicketSchema;

/// Convert a Ticket to a Tantivy document.
///
/// Session ids are added once per presence. Properties go into a single JSON
/// object so queries address them as `properties.<key>`.
pub fn ticket_to_doc(schema: &TicketSchema, ticket: &Ticket) -> TantivyDocument {
    let mut document = doc!(
        schema.ticket_id => ticket.ticket_id.clone(),
        schema.party_id => ticket.party_id.clone().unwrap_or_default(),
        schema.query => ticket.query.clone(),
        schema.min_count => ticket.min_count as u64,
        schema.max_count => ticket.max_count as u64,
        schema.count => ticket.count() as u64,
        schema.created_at_ms => ticket.created_at_ms()
    );

    for session_id in ticket.session_ids() {
        document.add_text(schema.session_id, session_id);
    }

    let mut properties: BTreeMap<String, OwnedValue> = BTreeMap::new();
    for (key, value) in &ticket.string_properties {
        properties.insert(key.clone(), OwnedValue::Str(value.clone()));
    }
    for (key, value) in &ticket.numeric_properties {
        properties.insert(key.clone(), OwnedValue::F64(*value));
    }
    document.add_object(schema.properties, properties);

    document
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::build_ticket_schema;
    use matchmaker_types::{Presence, TicketRequest};
    use tantivy::schema::Value;

    fn party_ticket() -> Ticket {
        let request = TicketRequest::party(
            "party-1",
            vec![Presence::new("s1", "u1"), Presence::new("s2", "u2")],
            "+properties.mode:ranked",
            2,
            4,
            2,
        )
        .with_string_property("mode", "ranked")
        .with_numeric_property("rank", 12.0);
        Ticket::new(request, "+properties.mode:ranked".to_string())
    }

    #[test]
    fn test_ticket_to_doc() {
        let schema = build_ticket_schema();
        let ticket = party_ticket();
        let doc = ticket_to_doc(&schema, &ticket);

        let ticket_id = doc
            .get_first(schema.ticket_id)
            .and_then(|v| v.as_str())
            .unwrap();
        assert_eq!(ticket_id, ticket.ticket_id);

        let party_id = doc.get_first(schema.party_id).and_then(|v| v.as_str());
        assert_eq!(party_id, Some("party-1"));

        let count = doc.get_first(schema.count).and_then(|v| v.as_u64());
        assert_eq!(count, Some(2));
    }

    #[test]
    fn test_sessions_are_multi_valued() {
        let schema = build_ticket_schema();
        let doc = ticket_to_doc(&schema, &party_ticket());

        let sessions: Vec<&str> = doc
            .get_all(schema.session_id)
            .filter_map(|v| v.as_str())
            .collect();
        assert_eq!(sessions, vec!["s1", "s2"]);
    }
}
