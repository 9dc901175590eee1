use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use log::{debug, error, info, trace, warn};
use tokio::task::JoinSet;

use crate::{
    validate_categories, Coordinates, EventBus, Geocoder, KeyValueStore, LoadOutcome, Opportunity,
    OpportunityPatch, Result, StoreError, StoreEvent, OPPORTUNITIES_KEY,
};

/// Message exposed through `error()` when a load fails
pub const LOAD_FAILED_MESSAGE: &str = "Failed to load opportunities";

/// Message exposed through `error()` when a save fails
pub const SAVE_FAILED_MESSAGE: &str = "Failed to save opportunities";

/// Tunables for `OpportunityStore`
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Shortest time a `load` takes, so a loading state stays visible.
    /// Zero disables the floor.
    pub min_load_time: Duration,

    /// Capacity of the event channel
    pub event_capacity: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            min_load_time: Duration::from_millis(800),
            event_capacity: 64,
        }
    }
}

#[derive(Debug, Default)]
struct StoreStatus {
    loading: bool,
    refreshing: bool,
    /// Set once a load has read the stored list
    loaded: bool,
    error: Option<String>,
}

/// Owns the list of opportunities and mirrors it to the key-value store.
///
/// The list is kept most-recent-first. Every mutation writes the whole list
/// back and only then replaces the in-memory copy, so a failed write leaves
/// the last good state in place.
///
/// Operations are not serialized: two overlapping calls each work from the
/// list as it was when they started and the later write wins.
///
/// Mutations are refused with `StoreError::NotLoaded` until a `load` has read
/// the stored list, so a fresh store never overwrites data it has not seen.
#[derive(Clone)]
pub struct OpportunityStore {
    /// Backing storage for the serialized list
    kv: Arc<dyn KeyValueStore>,

    /// Used to backfill missing coordinates during `load`
    geocoder: Arc<dyn Geocoder>,

    /// In-memory list, most recent first
    opportunities: Arc<Mutex<Vec<Opportunity>>>,

    status: Arc<Mutex<StoreStatus>>,

    options: StoreOptions,

    events: EventBus<StoreEvent>,
}

impl OpportunityStore {
    /// Creates an empty store. Nothing is read until `load` is called, and
    /// `add`/`update`/`delete` fail until then.
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        geocoder: Arc<dyn Geocoder>,
        options: StoreOptions,
    ) -> Self {
        let events = EventBus::new(options.event_capacity);
        Self {
            kv,
            geocoder,
            opportunities: Arc::new(Mutex::new(Vec::new())),
            status: Arc::new(Mutex::new(StoreStatus::default())),
            options,
            events,
        }
    }

    /// Reads the stored list, geocodes entries that have a location but no
    /// coordinates, and writes the list back if any of them gained some.
    ///
    /// `force_refresh` only decides which of the `loading`/`refreshing`
    /// flags is raised while the call runs. Failures are reported through
    /// the returned outcome and `error()`, never as an `Err`.
    pub async fn load(&self, force_refresh: bool) -> LoadOutcome {
        info!("Loading opportunities (refresh: {})", force_refresh);
        self.update_status(|s| {
            if force_refresh {
                s.refreshing = true;
            } else {
                s.loading = true;
            }
            s.error = None;
        });

        let floor = tokio::time::sleep(self.options.min_load_time);
        let (_, fetched) = tokio::join!(floor, self.fetch_and_backfill());

        let error = match fetched {
            Ok((loaded, read_error)) => {
                let count = loaded.len();
                self.replace_all(loaded);
                self.update_status(|s| s.loaded = true);
                self.events.publish(StoreEvent::Loaded { count });
                info!("Loaded {} opportunities", count);
                read_error.map(|e| {
                    warn!("Stored opportunities were unreadable: {}", e);
                    LOAD_FAILED_MESSAGE.to_string()
                })
            }
            Err(e) => {
                error!("Error loading opportunities: {}", e);
                Some(LOAD_FAILED_MESSAGE.to_string())
            }
        };

        self.update_status(|s| {
            if force_refresh {
                s.refreshing = false;
            } else {
                s.loading = false;
            }
            if error.is_some() {
                s.error = error.clone();
            }
        });

        LoadOutcome {
            opportunities: self.opportunities(),
            error,
        }
    }

    /// Unparseable data loads as an empty list; the parse error comes back
    /// alongside it. Storage failures are returned as `Err`.
    async fn fetch_and_backfill(&self) -> Result<(Vec<Opportunity>, Option<StoreError>)> {
        let Some(raw) = self.kv.get(OPPORTUNITIES_KEY).await? else {
            debug!("No stored opportunities");
            return Ok((Vec::new(), None));
        };

        let mut opportunities: Vec<Opportunity> = match serde_json::from_str(&raw) {
            Ok(list) => list,
            Err(e) => {
                return Ok((
                    Vec::new(),
                    Some(StoreError::StorageRead {
                        key: OPPORTUNITIES_KEY.to_string(),
                        message: e.to_string(),
                    }),
                ))
            }
        };

        let found = self.geocode_missing(&opportunities).await;
        if !found.is_empty() {
            for (index, coordinates) in &found {
                opportunities[*index].coordinates = Some(*coordinates);
            }
            info!("Geocoded {} opportunities, saving", found.len());
            self.write(&opportunities).await?;
        }

        Ok((opportunities, None))
    }

    /// Looks up every entry that has a location but no coordinates,
    /// concurrently. Returns the successful lookups by list index.
    async fn geocode_missing(&self, opportunities: &[Opportunity]) -> Vec<(usize, Coordinates)> {
        let mut lookups = JoinSet::new();

        for (index, opp) in opportunities.iter().enumerate() {
            if opp.coordinates.is_some() || opp.location.trim().is_empty() {
                continue;
            }
            let geocoder = Arc::clone(&self.geocoder);
            let id = opp.id.clone();
            let location = opp.location.clone();
            lookups.spawn(async move {
                match geocoder.geocode(&location).await {
                    Ok(Some(coordinates)) => Some((index, coordinates)),
                    Ok(None) => {
                        debug!("No coordinates for opportunity {} ({})", id, location);
                        None
                    }
                    Err(e) => {
                        warn!("Geocoding opportunity {} failed: {}", id, e);
                        None
                    }
                }
            });
        }

        let mut found = Vec::new();
        while let Some(joined) = lookups.join_next().await {
            match joined {
                Ok(Some(hit)) => found.push(hit),
                Ok(None) => {}
                Err(e) => error!("Geocoding task failed: {}", e),
            }
        }
        found
    }

    /// Prepends a new opportunity and persists the list.
    pub async fn add(&self, opportunity: Opportunity) -> Result<()> {
        info!("Adding opportunity: {}", opportunity.id);
        self.ensure_loaded()?;

        let mut next = self.opportunities();
        if next.iter().any(|o| o.id == opportunity.id) {
            warn!("Opportunity {} already exists", opportunity.id);
            return Err(StoreError::AlreadyExists { id: opportunity.id });
        }

        let id = opportunity.id.clone();
        next.insert(0, opportunity);
        self.save(next).await?;

        self.events.publish(StoreEvent::Added { id });
        Ok(())
    }

    /// Merges `patch` into the opportunity with this id and persists the list.
    pub async fn update(&self, id: &str, patch: OpportunityPatch) -> Result<()> {
        info!("Updating opportunity: {}", id);
        trace!("Patch: {:?}", patch);
        self.ensure_loaded()?;
        if let Some(categories) = &patch.categories {
            validate_categories(categories)?;
        }

        let mut next = self.opportunities();
        let Some(target) = next.iter_mut().find(|o| o.id == id) else {
            warn!("Cannot update opportunity {}: not found", id);
            return Err(StoreError::NotFound { id: id.to_string() });
        };
        target.apply(patch);

        self.save(next).await?;

        self.events.publish(StoreEvent::Updated { id: id.to_string() });
        Ok(())
    }

    /// Removes the opportunity with this id and persists the rest. An
    /// unknown id leaves the list as it was.
    pub async fn delete(&self, id: &str) -> Result<()> {
        info!("Deleting opportunity: {}", id);
        self.ensure_loaded()?;

        let mut next = self.opportunities();
        let before = next.len();
        next.retain(|o| o.id != id);
        if next.len() == before {
            debug!("Opportunity {} was not in the list", id);
        }

        self.save(next).await?;

        self.events.publish(StoreEvent::Deleted { id: id.to_string() });
        Ok(())
    }

    /// Adds one volunteer to the count. Returns the new count.
    pub async fn sign_up(&self, id: &str) -> Result<u32> {
        let current = self.require(id)?.volunteers_signed_up;
        let count = current.saturating_add(1);
        self.update(id, OpportunityPatch::volunteers(count)).await?;
        Ok(count)
    }

    /// Removes one volunteer from the count, stopping at zero. Returns the
    /// new count.
    pub async fn leave(&self, id: &str) -> Result<u32> {
        let current = self.require(id)?.volunteers_signed_up;
        let count = current.saturating_sub(1);
        self.update(id, OpportunityPatch::volunteers(count)).await?;
        Ok(count)
    }

    /// Snapshot of the in-memory list
    pub fn opportunities(&self) -> Vec<Opportunity> {
        match self.opportunities.lock() {
            Ok(list) => list.clone(),
            Err(e) => {
                error!("Failed to acquire lock on opportunities: {}", e);
                Vec::new()
            }
        }
    }

    /// The opportunities that can be shown on a map
    pub fn with_coordinates(&self) -> Vec<Opportunity> {
        self.opportunities()
            .into_iter()
            .filter(Opportunity::has_coordinates)
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<Opportunity> {
        self.opportunities().into_iter().find(|o| o.id == id)
    }

    pub fn is_loading(&self) -> bool {
        self.read_status(|s| s.loading)
    }

    pub fn is_refreshing(&self) -> bool {
        self.read_status(|s| s.refreshing)
    }

    /// Generic failure message from the last failed load or save
    pub fn error(&self) -> Option<String> {
        self.read_status(|s| s.error.clone())
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn ensure_loaded(&self) -> Result<()> {
        if self.read_status(|s| s.loaded) {
            Ok(())
        } else {
            warn!("Refusing to write opportunities before they were loaded");
            Err(StoreError::NotLoaded)
        }
    }

    fn require(&self, id: &str) -> Result<Opportunity> {
        self.get(id).ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    /// Writes `next` and, once that succeeded, makes it the in-memory list.
    async fn save(&self, next: Vec<Opportunity>) -> Result<()> {
        match self.write(&next).await {
            Ok(()) => {
                self.replace_all(next);
                Ok(())
            }
            Err(e) => {
                error!("Error saving opportunities: {}", e);
                self.update_status(|s| s.error = Some(SAVE_FAILED_MESSAGE.to_string()));
                Err(e)
            }
        }
    }

    async fn write(&self, opportunities: &[Opportunity]) -> Result<()> {
        let json = serde_json::to_string(opportunities)?;
        trace!("Writing {} bytes to {}", json.len(), OPPORTUNITIES_KEY);
        self.kv.set(OPPORTUNITIES_KEY, &json).await
    }

    fn replace_all(&self, next: Vec<Opportunity>) {
        match self.opportunities.lock() {
            Ok(mut list) => *list = next,
            Err(e) => error!("Failed to acquire lock for opportunities update: {}", e),
        }
    }

    fn update_status(&self, f: impl FnOnce(&mut StoreStatus)) {
        match self.status.lock() {
            Ok(mut status) => f(&mut status),
            Err(e) => warn!("Failed to acquire lock on store status: {}", e),
        }
    }

    fn read_status<T: Default>(&self, f: impl FnOnce(&StoreStatus) -> T) -> T {
        match self.status.lock() {
            Ok(status) => f(&status),
            Err(e) => {
                warn!("Failed to acquire lock on store status: {}", e);
                T::default()
            }
        }
    }
}
