use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::Path};
use ts_rs::TS;
use utoipa::ToSchema;

// --- Catalog Schemas ---

/// PricePhase
///
/// One pricing window of a ticket (early bird, regular, late...). Active on the
/// half-open interval `[starts_at, ends_at)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PricePhase {
    pub name: String,
    #[ts(type = "string")]
    pub starts_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub ends_at: DateTime<Utc>,
    /// Price in minor currency units.
    pub price_cents: i64,
    pub currency: String,
}

impl PricePhase {
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        self.starts_at <= at && at < self.ends_at
    }
}

/// TicketType
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TicketType {
    pub id: String,
    pub name: String,
    pub phases: Vec<PricePhase>,
}

/// PhaseResolution
///
/// Where a point in time falls relative to a ticket's phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseResolution<'a> {
    /// Sales have not opened yet, or `at` falls in a gap; carries the next phase.
    Upcoming(&'a PricePhase),
    Active(&'a PricePhase),
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PricingError {
    #[error("ticket {0} has no price phases")]
    NoPhases(String),
    #[error("ticket {ticket}: phase {phase} ends before it starts")]
    InvalidWindow { ticket: String, phase: String },
    #[error("ticket {ticket}: phase {phase} has a negative price")]
    NegativePrice { ticket: String, phase: String },
    #[error("ticket {ticket}: phases {first} and {second} overlap")]
    Overlap {
        ticket: String,
        first: String,
        second: String,
    },
    #[error("ticket {0} is defined twice")]
    DuplicateTicket(String),
    #[error("could not load ticket catalog: {0}")]
    Load(String),
}

impl TicketType {
    /// validate
    ///
    /// Sorts phases by start and checks them. Adjacent phases may touch
    /// (`ends_at == next.starts_at`) but not overlap.
    pub fn validate(mut self) -> Result<Self, PricingError> {
        if self.phases.is_empty() {
            return Err(PricingError::NoPhases(self.id));
        }

        self.phases.sort_by_key(|phase| phase.starts_at);

        for phase in &self.phases {
            if phase.starts_at >= phase.ends_at {
                return Err(PricingError::InvalidWindow {
                    ticket: self.id.clone(),
                    phase: phase.name.clone(),
                });
            }
            if phase.price_cents < 0 {
                return Err(PricingError::NegativePrice {
                    ticket: self.id.clone(),
                    phase: phase.name.clone(),
                });
            }
        }

        if let Some(pair) = self
            .phases
            .windows(2)
            .find(|pair| pair[1].starts_at < pair[0].ends_at)
        {
            return Err(PricingError::Overlap {
                ticket: self.id.clone(),
                first: pair[0].name.clone(),
                second: pair[1].name.clone(),
            });
        }

        Ok(self)
    }

    /// resolve_phase
    ///
    /// Assumes phases are sorted, which `validate` guarantees.
    pub fn resolve_phase(&self, at: DateTime<Utc>) -> PhaseResolution<'_> {
        if let Some(active) = self.phases.iter().find(|phase| phase.is_active_at(at)) {
            return PhaseResolution::Active(active);
        }

        match self.phases.iter().find(|phase| phase.starts_at > at) {
            Some(next) => PhaseResolution::Upcoming(next),
            None => PhaseResolution::Closed,
        }
    }
}

// --- Catalog ---

/// TicketCatalog
///
/// Validated, read-only set of ticket types keyed by id.
#[derive(Debug, Clone, Default)]
pub struct TicketCatalog {
    tickets: HashMap<String, TicketType>,
}

impl TicketCatalog {
    pub fn from_tickets(tickets: Vec<TicketType>) -> Result<Self, PricingError> {
        let mut by_id = HashMap::with_capacity(tickets.len());
        for ticket in tickets {
            let ticket = ticket.validate()?;
            if by_id.contains_key(&ticket.id) {
                return Err(PricingError::DuplicateTicket(ticket.id));
            }
            by_id.insert(ticket.id.clone(), ticket);
        }
        Ok(Self { tickets: by_id })
    }

    /// load
    ///
    /// Reads a JSON array of ticket types. A missing file yields an empty catalog.
    pub async fn load(path: &Path) -> Result<Self, PricingError> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No ticket catalog file, starting empty");
                return Ok(Self::default());
            }
            Err(e) => return Err(PricingError::Load(e.to_string())),
        };

        let tickets: Vec<TicketType> =
            serde_json::from_str(&raw).map_err(|e| PricingError::Load(e.to_string()))?;
        let catalog = Self::from_tickets(tickets)?;
        tracing::info!(tickets = catalog.len(), "Ticket catalog loaded");
        Ok(catalog)
    }

    pub fn get(&self, id: &str) -> Option<&TicketType> {
        self.tickets.get(id)
    }

    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }
}

/// PhaseStatus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum PhaseStatus {
    Upcoming,
    Active,
    Closed,
}

/// PriceQuote
///
/// Output schema for `GET /tickets/{ticket_id}/price`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PriceQuote {
    pub ticket_id: String,
    pub status: PhaseStatus,
    pub phase: Option<PricePhase>,
    #[ts(type = "string")]
    pub quoted_at: DateTime<Utc>,
}

impl PriceQuote {
    pub fn for_ticket(ticket: &TicketType, at: DateTime<Utc>) -> Self {
        let (status, phase) = match ticket.resolve_phase(at) {
            PhaseResolution::Active(phase) => (PhaseStatus::Active, Some(phase.clone())),
            PhaseResolution::Upcoming(phase) => (PhaseStatus::Upcoming, Some(phase.clone())),
            PhaseResolution::Closed => (PhaseStatus::Closed, None),
        };

        Self {
            ticket_id: ticket.id.clone(),
            status,
            phase,
            quoted_at: at,
        }
    }
}
