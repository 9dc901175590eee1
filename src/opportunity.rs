//! Core data structures for the voluntrack application.
//!
//! This module contains the Opportunity record as it is persisted, the draft
//! used to create one, and the partial patch used to edit one.
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{Result, StoreError, CATEGORIES};

/// A latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Represents a single volunteer opportunity in our system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Opportunity {
    /// Unique identifier, the creation time in milliseconds
    pub id: String,
    /// Display title
    pub name: String,
    /// Free text description
    #[serde(default)]
    pub description: String,
    /// Free text address, geocoded lazily
    pub location: String,
    /// How many volunteers are wanted, as entered
    #[serde(default)]
    pub people_needed: String,
    /// When the event happens, as entered
    #[serde(default)]
    pub date_time: String,
    /// Local device image reference
    #[serde(default)]
    pub image_uri: Option<String>,
    /// Number of volunteers who joined
    #[serde(default)]
    pub volunteers_signed_up: u32,
    /// Set once geocoding of `location` succeeds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    /// Interest tags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
}

impl Opportunity {
    /// Creates a new opportunity from a validated draft.
    ///
    /// The id is the current time in milliseconds. Two opportunities created
    /// in the same millisecond get the same id; `OpportunityStore::add`
    /// rejects the second one.
    pub fn new(draft: OpportunityDraft) -> Result<Self> {
        draft.validate()?;

        let id = Utc::now().timestamp_millis().to_string();

        Ok(Opportunity {
            id,
            name: draft.name.trim().to_string(),
            description: draft.description,
            location: draft.location.trim().to_string(),
            people_needed: draft.people_needed,
            date_time: draft.date_time,
            image_uri: draft.image_uri,
            volunteers_signed_up: 0,
            coordinates: None,
            categories: non_empty(draft.categories),
        })
    }

    pub fn has_coordinates(&self) -> bool {
        self.coordinates.is_some()
    }

    /// True if any of this opportunity's categories is in `selected`
    pub fn in_any_category(&self, selected: &[String]) -> bool {
        self.categories
            .as_ref()
            .is_some_and(|own| own.iter().any(|c| selected.contains(c)))
    }

    /// Shallow merge: fields left `None` in the patch keep their value.
    pub fn apply(&mut self, patch: OpportunityPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(location) = patch.location {
            self.location = location;
        }
        if let Some(people_needed) = patch.people_needed {
            self.people_needed = people_needed;
        }
        if let Some(date_time) = patch.date_time {
            self.date_time = date_time;
        }
        if let Some(image_uri) = patch.image_uri {
            self.image_uri = image_uri;
        }
        if let Some(count) = patch.volunteers_signed_up {
            self.volunteers_signed_up = count;
        }
        if let Some(coordinates) = patch.coordinates {
            self.coordinates = coordinates;
        }
        if let Some(categories) = patch.categories {
            self.categories = non_empty(categories);
        }
    }
}

/// Form input for a new opportunity
#[derive(Debug, Clone, Default)]
pub struct OpportunityDraft {
    pub name: String,
    pub description: String,
    pub location: String,
    pub people_needed: String,
    pub date_time: String,
    pub image_uri: Option<String>,
    pub categories: Vec<String>,
}

impl OpportunityDraft {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(StoreError::Validation {
                message: "Opportunity name is required".to_string(),
            });
        }
        if self.location.trim().is_empty() {
            return Err(StoreError::Validation {
                message: "Opportunity location is required".to_string(),
            });
        }
        validate_categories(&self.categories)
    }
}

/// Standard spelling of a category, matched case-insensitively
pub fn canonical_category(name: &str) -> Option<&'static str> {
    let name = name.trim();
    CATEGORIES
        .iter()
        .copied()
        .find(|category| category.eq_ignore_ascii_case(name))
}

/// Rejects anything outside `CATEGORIES`
pub fn validate_categories(categories: &[String]) -> Result<()> {
    match categories
        .iter()
        .find(|c| !CATEGORIES.contains(&c.as_str()))
    {
        Some(unknown) => Err(StoreError::Validation {
            message: format!("Unknown category: {}", unknown),
        }),
        None => Ok(()),
    }
}

/// Partial update for an existing opportunity
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpportunityPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub people_needed: Option<String>,
    pub date_time: Option<String>,
    /// `Some(None)` clears the image
    pub image_uri: Option<Option<String>>,
    pub volunteers_signed_up: Option<u32>,
    /// `Some(None)` drops the coordinates so the next load geocodes again
    pub coordinates: Option<Option<Coordinates>>,
    pub categories: Option<Vec<String>>,
}

impl OpportunityPatch {
    pub fn volunteers(count: u32) -> Self {
        Self {
            volunteers_signed_up: Some(count),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn non_empty(categories: Vec<String>) -> Option<Vec<String>> {
    if categories.is_empty() {
        None
    } else {
        Some(categories)
    }
}
