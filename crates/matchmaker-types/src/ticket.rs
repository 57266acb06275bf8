//! Ticket, entry and group types.
//!
//! A ticket is one matchmaking request made on behalf of a single user or a
//! whole party. Each presence on a ticket becomes one entry in the matched
//! group handed to dispatch.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// A connected user the ticket matches on behalf of.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Presence {
    pub session_id: String,
    pub user_id: String,
    #[serde(default)]
    pub username: String,
}

impl Presence {
    pub fn new(session_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            username: String::new(),
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }
}

/// Raw intake request, validated by the matchmaker before it becomes a
/// [`Ticket`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketRequest {
    /// One presence for a solo ticket, one per member for a party ticket
    pub presences: Vec<Presence>,
    /// Party the presences belong to, if any
    #[serde(default)]
    pub party_id: Option<String>,
    /// Query over other tickets; blank falls back to the configured default
    #[serde(default)]
    pub query: String,
    pub min_count: usize,
    pub max_count: usize,
    pub count_multiple: usize,
    #[serde(default)]
    pub string_properties: BTreeMap<String, String>,
    #[serde(default)]
    pub numeric_properties: BTreeMap<String, f64>,
}

impl TicketRequest {
    /// Request for a single session.
    pub fn solo(
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        query: impl Into<String>,
        min_count: usize,
        max_count: usize,
        count_multiple: usize,
    ) -> Self {
        Self {
            presences: vec![Presence::new(session_id, user_id)],
            party_id: None,
            query: query.into(),
            min_count,
            max_count,
            count_multiple,
            string_properties: BTreeMap::new(),
            numeric_properties: BTreeMap::new(),
        }
    }

    /// Request for a party; every member is matched as one unit.
    pub fn party(
        party_id: impl Into<String>,
        presences: Vec<Presence>,
        query: impl Into<String>,
        min_count: usize,
        max_count: usize,
        count_multiple: usize,
    ) -> Self {
        Self {
            presences,
            party_id: Some(party_id.into()),
            query: query.into(),
            min_count,
            max_count,
            count_multiple,
            string_properties: BTreeMap::new(),
            numeric_properties: BTreeMap::new(),
        }
    }

    pub fn with_party(mut self, party_id: impl Into<String>) -> Self {
        self.party_id = Some(party_id.into());
        self
    }

    pub fn with_string_property(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.string_properties.insert(key.into(), value.into());
        self
    }

    pub fn with_numeric_property(mut self, key: impl Into<String>, value: f64) -> Self {
        self.numeric_properties.insert(key.into(), value);
        self
    }
}

/// A validated, pooled matchmaking request.
///
/// Tickets never change after creation; pass-local state such as interval
/// counters lives with the matchmaker, not on the ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub ticket_id: String,
    pub presences: Vec<Presence>,
    #[serde(default)]
    pub party_id: Option<String>,
    pub query: String,
    pub min_count: usize,
    pub max_count: usize,
    pub count_multiple: usize,
    #[serde(default)]
    pub string_properties: BTreeMap<String, String>,
    #[serde(default)]
    pub numeric_properties: BTreeMap<String, f64>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl Ticket {
    /// Build a ticket from a request with a fresh ULID and the current time.
    ///
    /// `query` is the effective query text (the request's, or the default).
    pub fn new(request: TicketRequest, query: String) -> Self {
        Self {
            ticket_id: Ulid::new().to_string(),
            presences: request.presences,
            party_id: request.party_id.filter(|p| !p.is_empty()),
            query,
            min_count: request.min_count,
            max_count: request.max_count,
            count_multiple: request.count_multiple,
            string_properties: request.string_properties,
            numeric_properties: request.numeric_properties,
            created_at: Utc::now(),
        }
    }

    /// Override the creation time (used for ordering in tests and replays).
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Number of entries this ticket contributes to a group.
    pub fn count(&self) -> usize {
        self.presences.len()
    }

    pub fn session_ids(&self) -> impl Iterator<Item = &str> {
        self.presences.iter().map(|p| p.session_id.as_str())
    }

    pub fn shares_session(&self, other: &Ticket) -> bool {
        let mine: HashSet<&str> = self.session_ids().collect();
        other.session_ids().any(|s| mine.contains(s))
    }

    /// Different tickets owned by the same party. A party joins a group
    /// through one ticket only.
    pub fn party_conflict(&self, other: &Ticket) -> bool {
        self.ticket_id != other.ticket_id
            && self.party_id.is_some()
            && self.party_id == other.party_id
    }

    /// Whether a final group of `size` entries satisfies this ticket.
    pub fn accepts_size(&self, size: usize) -> bool {
        size >= self.min_count
            && size <= self.max_count
            && self.count_multiple > 0
            && size % self.count_multiple == 0
    }

    /// Two-way count range overlap: each side's max reaches the other's min.
    pub fn counts_compatible(&self, other: &Ticket) -> bool {
        self.min_count <= other.max_count && other.min_count <= self.max_count
    }

    pub fn created_at_ms(&self) -> i64 {
        self.created_at.timestamp_millis()
    }

    /// One entry per presence.
    pub fn to_entries(&self) -> Vec<MatchmakerEntry> {
        self.presences
            .iter()
            .map(|presence| MatchmakerEntry {
                ticket_id: self.ticket_id.clone(),
                presence: presence.clone(),
                party_id: self.party_id.clone(),
                string_properties: self.string_properties.clone(),
                numeric_properties: self.numeric_properties.clone(),
                created_at: self.created_at,
            })
            .collect()
    }
}

/// One matched user, as handed to dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchmakerEntry {
    pub ticket_id: String,
    pub presence: Presence,
    #[serde(default)]
    pub party_id: Option<String>,
    #[serde(default)]
    pub string_properties: BTreeMap<String, String>,
    #[serde(default)]
    pub numeric_properties: BTreeMap<String, f64>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// A formed match: entries plus the token the receiving layer uses to
/// establish the game session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedGroup {
    pub token: String,
    pub entries: Vec<MatchmakerEntry>,
}

impl MatchedGroup {
    /// Build a group from its contributing tickets with a fresh token.
    pub fn from_tickets<'a>(tickets: impl IntoIterator<Item = &'a Ticket>) -> Self {
        Self {
            token: Ulid::new().to_string(),
            entries: tickets.into_iter().flat_map(Ticket::to_entries).collect(),
        }
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Distinct ticket ids, in entry order.
    pub fn ticket_ids(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .map(|e| e.ticket_id.as_str())
            .filter(|id| seen.insert(*id))
            .collect()
    }
}
