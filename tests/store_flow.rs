//! End-to-end tests over the file-backed store.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tempfile::TempDir;

use voluntrack::{
    filter_opportunities, map_pins, patch_from_args, Coordinates, FileStore, FilterCriteria,
    Geocoder, Opportunity, OpportunityDraft, OpportunityPatch, OpportunityStore, Result,
    SessionStore, StoreOptions,
};

/// Knows two neighbourhoods of San Francisco
struct CityGeocoder;

#[async_trait]
impl Geocoder for CityGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<Coordinates>> {
        Ok(match address {
            "Mission District" => Some(Coordinates::new(37.7599, -122.4148)),
            "Sunset District" => Some(Coordinates::new(37.7534, -122.4944)),
            _ => None,
        })
    }
}

struct Fixture {
    _temp_dir: TempDir,
    kv: Arc<FileStore>,
}

impl Fixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let kv = Arc::new(FileStore::new(temp_dir.path().join("data")));
        Self {
            _temp_dir: temp_dir,
            kv,
        }
    }

    fn store(&self) -> OpportunityStore {
        OpportunityStore::new(
            self.kv.clone(),
            Arc::new(CityGeocoder),
            StoreOptions {
                min_load_time: Duration::ZERO,
                ..StoreOptions::default()
            },
        )
    }
}

fn opportunity(id: &str, name: &str, location: &str, categories: &[&str]) -> Opportunity {
    let mut opportunity = Opportunity::new(OpportunityDraft {
        name: name.to_string(),
        location: location.to_string(),
        people_needed: "8".to_string(),
        categories: categories.iter().map(|c| c.to_string()).collect(),
        ..OpportunityDraft::default()
    })
    .expect("valid draft");
    opportunity.id = id.to_string();
    opportunity
}

#[tokio::test]
async fn browse_filter_and_join_across_restarts() {
    let fixture = Fixture::new();

    // An admin publishes three opportunities
    let admin_store = fixture.store();
    admin_store.load(false).await;
    admin_store
        .add(opportunity("1", "Mural painting", "Mission District", &["Arts & Culture"]))
        .await
        .unwrap();
    admin_store
        .add(opportunity("2", "Beach cleanup", "Sunset District", &["Environment"]))
        .await
        .unwrap();
    admin_store
        .add(opportunity("3", "Beach lifeguard", "Somewhere unknown", &["Environment"]))
        .await
        .unwrap();

    // A volunteer opens the app later
    let store = fixture.store();
    let outcome = store.load(false).await;
    assert!(outcome.error.is_none());
    assert_eq!(outcome.opportunities.len(), 3);
    assert_eq!(store.with_coordinates().len(), 2);

    let near_mission = FilterCriteria {
        query: "beach".to_string(),
        categories: vec!["Environment".to_string()],
        max_distance_miles: 10.0,
        user_location: Some(Coordinates::new(37.7599, -122.4148)),
        is_admin_viewer: false,
    };
    let filtered = filter_opportunities(&store.opportunities(), &near_mission);
    let ids: Vec<&str> = filtered.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["2"]);

    let pins = map_pins(&filtered, &store.with_coordinates());
    assert_eq!(pins.len(), 1);

    // Joining updates the counter and the session
    let session = SessionStore::new(fixture.kv.clone());
    session.load().await;
    session.sign_up("2").await.unwrap();
    store.sign_up("2").await.unwrap();

    let reopened = fixture.store();
    reopened.load(false).await;
    assert_eq!(reopened.get("2").unwrap().volunteers_signed_up, 1);
    let state = SessionStore::new(fixture.kv.clone()).load().await;
    assert_eq!(state.signed_up_opportunity_ids, vec!["2".to_string()]);
}

#[tokio::test]
async fn moving_an_opportunity_geocodes_the_new_address() {
    let fixture = Fixture::new();
    let store = fixture.store();
    store.load(false).await;
    store
        .add(opportunity("1", "Soup kitchen", "Mission District", &[]))
        .await
        .unwrap();
    store.load(true).await;
    let placed = store.get("1").unwrap().coordinates;
    assert_eq!(placed, Some(Coordinates::new(37.7599, -122.4148)));

    // Other edits and reloads leave the coordinates alone
    store
        .update("1", OpportunityPatch::volunteers(2))
        .await
        .unwrap();
    store.load(true).await;
    assert_eq!(store.get("1").unwrap().coordinates, placed);

    let patch = patch_from_args(
        None,
        Some("Sunset District".to_string()),
        None,
        None,
        None,
        None,
        false,
        None,
    )
    .unwrap();
    store.update("1", patch).await.unwrap();
    assert!(store.get("1").unwrap().coordinates.is_none());

    let reopened = fixture.store();
    reopened.load(true).await;
    let moved = reopened.get("1").unwrap();
    assert_eq!(moved.location, "Sunset District");
    assert_eq!(moved.coordinates, Some(Coordinates::new(37.7534, -122.4944)));
    assert_eq!(moved.volunteers_signed_up, 2);
}

#[tokio::test]
async fn fresh_store_does_not_clobber_saved_data() {
    let fixture = Fixture::new();
    let first = fixture.store();
    first.load(false).await;
    first
        .add(opportunity("1", "Mural painting", "Mission District", &[]))
        .await
        .unwrap();

    let second = fixture.store();
    assert!(second
        .add(opportunity("2", "Beach cleanup", "Sunset District", &[]))
        .await
        .is_err());

    second.load(false).await;
    second
        .add(opportunity("2", "Beach cleanup", "Sunset District", &[]))
        .await
        .unwrap();
    let outcome = fixture.store().load(false).await;
    assert_eq!(outcome.opportunities.len(), 2);
}

#[tokio::test]
async fn corrupted_file_loads_as_empty() {
    let fixture = Fixture::new();
    std::fs::create_dir_all(fixture.kv.dir()).unwrap();
    std::fs::write(
        fixture.kv.dir().join("volunteer_opportunities.json"),
        "[{\"id\": ",
    )
    .unwrap();

    let store = fixture.store();
    let outcome = store.load(false).await;

    assert!(outcome.opportunities.is_empty());
    assert!(outcome.error.is_some());

    // The next add replaces the garbage
    store
        .add(opportunity("1", "Tree planting", "Sunset District", &[]))
        .await
        .unwrap();
    let outcome = fixture.store().load(false).await;
    assert_eq!(outcome.opportunities.len(), 1);
    assert!(outcome.error.is_none());
}
