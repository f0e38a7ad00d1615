use chrono::{DateTime, TimeZone, Utc};
use conf_portal::pricing::{
    PhaseResolution, PhaseStatus, PriceQuote, PricePhase, PricingError, TicketCatalog, TicketType,
};
use uuid::Uuid;

fn at(month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, month, day, 0, 0, 0).unwrap()
}

fn phase(name: &str, start: DateTime<Utc>, end: DateTime<Utc>, price_cents: i64) -> PricePhase {
    PricePhase {
        name: name.to_string(),
        starts_at: start,
        ends_at: end,
        price_cents,
        currency: "EUR".to_string(),
    }
}

/// Early bird in March, regular in April, a gap, then late in June.
fn full_pass() -> TicketType {
    TicketType {
        id: "full-pass".to_string(),
        name: "Full conference pass".to_string(),
        // Deliberately out of order; validation sorts.
        phases: vec![
            phase("late", at(6, 1), at(7, 1), 45_000),
            phase("early-bird", at(3, 1), at(4, 1), 25_000),
            phase("regular", at(4, 1), at(5, 1), 35_000),
        ],
    }
    .validate()
    .unwrap()
}

#[test]
fn test_before_sales_open_the_first_phase_is_upcoming() {
    let ticket = full_pass();
    match ticket.resolve_phase(at(2, 15)) {
        PhaseResolution::Upcoming(next) => assert_eq!(next.name, "early-bird"),
        other => panic!("expected upcoming, got {other:?}"),
    }
}

#[test]
fn test_active_phase_is_found() {
    let ticket = full_pass();
    match ticket.resolve_phase(at(3, 20)) {
        PhaseResolution::Active(active) => assert_eq!(active.price_cents, 25_000),
        other => panic!("expected active, got {other:?}"),
    }
}

#[test]
fn test_phase_boundary_belongs_to_the_later_phase() {
    let ticket = full_pass();
    match ticket.resolve_phase(at(4, 1)) {
        PhaseResolution::Active(active) => assert_eq!(active.name, "regular"),
        other => panic!("expected regular, got {other:?}"),
    }
}

#[test]
fn test_gap_between_phases_points_at_the_next_one() {
    let ticket = full_pass();
    match ticket.resolve_phase(at(5, 15)) {
        PhaseResolution::Upcoming(next) => assert_eq!(next.name, "late"),
        other => panic!("expected upcoming late, got {other:?}"),
    }
}

#[test]
fn test_after_last_phase_sales_are_closed() {
    let ticket = full_pass();
    assert_eq!(ticket.resolve_phase(at(7, 1)), PhaseResolution::Closed);
}

#[test]
fn test_validation_rejects_bad_catalogs() {
    let empty = TicketType {
        id: "empty".to_string(),
        name: "Empty".to_string(),
        phases: vec![],
    };
    assert_eq!(empty.validate(), Err(PricingError::NoPhases("empty".to_string())));

    let backwards = TicketType {
        id: "t".to_string(),
        name: "T".to_string(),
        phases: vec![phase("oops", at(5, 1), at(4, 1), 100)],
    };
    assert!(matches!(
        backwards.validate(),
        Err(PricingError::InvalidWindow { .. })
    ));

    let negative = TicketType {
        id: "t".to_string(),
        name: "T".to_string(),
        phases: vec![phase("free-money", at(4, 1), at(5, 1), -1)],
    };
    assert!(matches!(
        negative.validate(),
        Err(PricingError::NegativePrice { .. })
    ));

    let overlapping = TicketType {
        id: "t".to_string(),
        name: "T".to_string(),
        phases: vec![
            phase("a", at(3, 1), at(4, 15), 100),
            phase("b", at(4, 1), at(5, 1), 200),
        ],
    };
    assert_eq!(
        overlapping.validate(),
        Err(PricingError::Overlap {
            ticket: "t".to_string(),
            first: "a".to_string(),
            second: "b".to_string(),
        })
    );
}

#[test]
fn test_catalog_rejects_duplicate_ids() {
    let result = TicketCatalog::from_tickets(vec![full_pass(), full_pass()]);
    assert_eq!(
        result.err(),
        Some(PricingError::DuplicateTicket("full-pass".to_string()))
    );
}

#[test]
fn test_quote_reports_status_and_phase() {
    let ticket = full_pass();

    let quote = PriceQuote::for_ticket(&ticket, at(4, 10));
    assert_eq!(quote.status, PhaseStatus::Active);
    assert_eq!(quote.phase.map(|p| p.price_cents), Some(35_000));

    let closed = PriceQuote::for_ticket(&ticket, at(12, 1));
    assert_eq!(closed.status, PhaseStatus::Closed);
    assert!(closed.phase.is_none());
}

#[tokio::test]
async fn test_catalog_loads_from_json_and_tolerates_missing_file() {
    let missing = std::env::temp_dir().join(format!("conf-portal-missing-{}.json", Uuid::new_v4()));
    assert!(TicketCatalog::load(&missing).await.unwrap().is_empty());

    let path = std::env::temp_dir().join(format!("conf-portal-catalog-{}.json", Uuid::new_v4()));
    tokio::fs::write(&path, serde_json::to_vec(&vec![full_pass()]).unwrap())
        .await
        .unwrap();

    let catalog = TicketCatalog::load(&path).await.unwrap();
    assert_eq!(catalog.len(), 1);
    assert!(catalog.get("full-pass").is_some());

    let _ = tokio::fs::remove_file(&path).await;
}
