//! Filtering and projections over an in-memory list of opportunities.
//!
//! Everything here is pure and synchronous; callers recompute the views
//! whenever the list or the criteria change.
use std::collections::HashSet;

use log::trace;

use crate::{Coordinates, FilterCriteria, Opportunity, NO_DISTANCE_LIMIT_MILES};

/// Mean Earth radius used by the distance filter
pub const EARTH_RADIUS_MILES: f64 = 3959.0;

/// Great-circle distance between two points, in miles.
pub fn haversine_miles(from: Coordinates, to: Coordinates) -> f64 {
    let d_lat = (to.latitude - from.latitude).to_radians();
    let d_lon = (to.longitude - from.longitude).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + from.latitude.to_radians().cos()
            * to.latitude.to_radians().cos()
            * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_MILES * c
}

/// Applies, in order: name search, admin bypass, category filter,
/// distance filter. Input order is preserved.
pub fn filter_opportunities(
    opportunities: &[Opportunity],
    criteria: &FilterCriteria,
) -> Vec<Opportunity> {
    let query = criteria.query.trim().to_lowercase();

    // The distance filter only runs below the "no limit" value and when we
    // know where the viewer is
    let distance_origin = criteria
        .user_location
        .filter(|_| criteria.max_distance_miles < NO_DISTANCE_LIMIT_MILES);

    let filtered: Vec<Opportunity> = opportunities
        .iter()
        .filter(|opp| query.is_empty() || opp.name.to_lowercase().contains(&query))
        .filter(|opp| {
            if criteria.is_admin_viewer {
                return true;
            }

            if !criteria.categories.is_empty() && !opp.in_any_category(&criteria.categories) {
                return false;
            }

            match (distance_origin, opp.coordinates) {
                (None, _) => true,
                (Some(_), None) => false,
                (Some(origin), Some(coords)) => {
                    haversine_miles(origin, coords) <= criteria.max_distance_miles
                }
            }
        })
        .cloned()
        .collect();

    trace!(
        "Filtered {} opportunities down to {}",
        opportunities.len(),
        filtered.len()
    );
    filtered
}

/// The entries of `filtered` that also appear in `with_coordinates`,
/// matched by id.
pub fn map_pins(filtered: &[Opportunity], with_coordinates: &[Opportunity]) -> Vec<Opportunity> {
    let placeable: HashSet<&str> = with_coordinates.iter().map(|o| o.id.as_str()).collect();

    filtered
        .iter()
        .filter(|opp| placeable.contains(opp.id.as_str()))
        .cloned()
        .collect()
}

/// The opportunities whose id is in `signed_up_ids`, in list order.
pub fn signed_up(opportunities: &[Opportunity], signed_up_ids: &[String]) -> Vec<Opportunity> {
    opportunities
        .iter()
        .filter(|opp| signed_up_ids.contains(&opp.id))
        .cloned()
        .collect()
}
