//! Shared types for the voluntrack application.
//!
//! This module contains the Result alias, load and filter inputs/outputs,
//! and the CLI subcommands.
use clap::Subcommand;

use crate::{Coordinates, Opportunity, StoreError, ThemeMode};

/// A specialized Result type for voluntrack operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Key holding the JSON array of opportunities
pub const OPPORTUNITIES_KEY: &str = "volunteer_opportunities";

/// Maximum distance value that means "no distance limit"
pub const NO_DISTANCE_LIMIT_MILES: f64 = 50.0;

/// Standard interest categories, in display order
pub const CATEGORIES: [&str; 20] = [
    "Environment",
    "Education",
    "Community",
    "Health",
    "Animals",
    "Arts & Culture",
    "Children & Youth",
    "Seniors",
    "Food & Hunger",
    "Housing & Homelessness",
    "Sports & Recreation",
    "Technology",
    "Disaster Relief",
    "Advocacy & Human Rights",
    "Mental Health",
    "Veterans",
    "LGBTQ+",
    "International Aid",
    "Faith-Based",
    "Environmental Justice",
];

/// What a `load` call produced
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    /// The in-memory list after the load, the previous list on failure
    pub opportunities: Vec<Opportunity>,
    /// Generic failure message for display, if the load failed
    pub error: Option<String>,
}

/// Inputs of the filter engine
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCriteria {
    /// Case-insensitive substring of the name
    pub query: String,
    /// Any-of category selection, empty means no category filter
    pub categories: Vec<String>,
    /// Values below `NO_DISTANCE_LIMIT_MILES` enable the distance filter
    pub max_distance_miles: f64,
    /// Where the viewer is, if known
    pub user_location: Option<Coordinates>,
    /// Admins only get the text filter
    pub is_admin_viewer: bool,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            query: String::new(),
            categories: Vec::new(),
            max_distance_miles: NO_DISTANCE_LIMIT_MILES,
            user_location: None,
            is_admin_viewer: false,
        }
    }
}

/// Available subcommands for the voluntrack application
#[derive(Subcommand)]
pub enum Commands {
    /// List opportunities with optional filtering
    List {
        /// Only show opportunities whose name contains this text
        query: Option<String>,

        /// Categories to filter by (comma-separated, any-of)
        #[clap(short, long)]
        category: Option<String>,

        /// Maximum distance in miles (50 means no limit)
        #[clap(short = 'd', long, default_value_t = NO_DISTANCE_LIMIT_MILES)]
        max_distance: f64,

        /// Your latitude, for distance filtering
        #[clap(long, requires = "lon", allow_hyphen_values = true)]
        lat: Option<f64>,

        /// Your longitude, for distance filtering
        #[clap(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,

        /// Only show opportunities that can be placed on a map
        #[clap(short, long)]
        map: bool,

        /// Format output as JSON
        #[clap(short, long)]
        json: bool,
    },

    /// View an opportunity by ID
    View {
        /// ID of the opportunity to view
        id: String,

        /// Format output as raw JSON
        #[clap(short, long)]
        json: bool,
    },

    /// Create a new opportunity (admin only)
    Create {
        /// Name of the opportunity
        #[clap(short, long)]
        name: String,

        /// Address of the opportunity
        #[clap(short, long)]
        location: String,

        /// Description text
        #[clap(short = 'D', long, default_value = "")]
        description: String,

        /// Number of volunteers needed
        #[clap(short, long, default_value = "")]
        people_needed: String,

        /// Date and time, free text
        #[clap(short = 't', long, default_value = "")]
        date_time: String,

        /// Image reference
        #[clap(short, long)]
        image: Option<String>,

        /// Categories (comma-separated)
        #[clap(short, long)]
        categories: Option<String>,
    },

    /// Edit an existing opportunity (admin only)
    Edit {
        /// ID of the opportunity to edit
        id: String,

        #[clap(short, long)]
        name: Option<String>,

        #[clap(short, long)]
        location: Option<String>,

        #[clap(short = 'D', long)]
        description: Option<String>,

        #[clap(short, long)]
        people_needed: Option<String>,

        #[clap(short = 't', long)]
        date_time: Option<String>,

        /// New image reference
        #[clap(short, long, conflicts_with = "clear_image")]
        image: Option<String>,

        /// Remove the image
        #[clap(long)]
        clear_image: bool,

        /// Replace categories (comma-separated, empty clears them)
        #[clap(short, long)]
        categories: Option<String>,
    },

    /// Delete an opportunity by ID (admin only)
    Delete {
        /// ID of the opportunity to delete
        id: String,

        /// Skip confirmation prompt
        #[clap(short, long)]
        force: bool,
    },

    /// Sign up for an opportunity
    SignUp {
        /// ID of the opportunity to join
        id: String,
    },

    /// Leave an opportunity you signed up for
    Leave {
        /// ID of the opportunity to leave
        id: String,
    },

    /// List the opportunities you signed up for
    Mine {
        /// Format output as JSON
        #[clap(short, long)]
        json: bool,
    },

    /// Reload opportunities and geocode missing locations
    Refresh,

    /// Show the standard categories
    Categories,

    /// Show or change the profile
    Profile {
        /// Set the display name
        #[clap(short, long)]
        username: Option<String>,

        /// Grant or revoke admin rights
        #[clap(short, long)]
        admin: Option<bool>,

        /// Set the profile image reference
        #[clap(short, long, conflicts_with = "clear_image")]
        image: Option<String>,

        /// Remove the profile image
        #[clap(long)]
        clear_image: bool,

        /// Set the theme
        #[clap(long, value_enum, conflicts_with = "toggle_theme")]
        theme: Option<ThemeMode>,

        /// Switch between light and dark
        #[clap(long)]
        toggle_theme: bool,
    },

    /// Configuration management
    Config {
        /// Reset configuration to defaults
        #[clap(short, long)]
        reset: bool,
    },
}
