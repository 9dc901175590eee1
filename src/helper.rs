use crate::{canonical_category, OpportunityDraft, OpportunityPatch, Result, StoreError};

// Helper method for parsing categories into their standard spelling
pub fn parse_categories(categories: Option<String>) -> Result<Vec<String>> {
    let Some(categories) = categories else {
        return Ok(Vec::new());
    };

    categories
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|name| {
            canonical_category(name)
                .map(str::to_string)
                .ok_or_else(|| StoreError::Validation {
                    message: format!(
                        "Unknown category '{}' (run `voluntrack categories` for the list)",
                        name
                    ),
                })
        })
        .collect()
}

/// Builds a draft from CLI arguments
pub fn draft_from_args(
    name: String,
    location: String,
    description: String,
    people_needed: String,
    date_time: String,
    image: Option<String>,
    categories: Option<String>,
) -> Result<OpportunityDraft> {
    Ok(OpportunityDraft {
        name,
        description,
        location,
        people_needed,
        date_time,
        image_uri: image,
        categories: parse_categories(categories)?,
    })
}

/// Builds a patch from CLI arguments; `clear_image` wins over `image`.
/// A new location drops the old coordinates.
#[allow(clippy::too_many_arguments)]
pub fn patch_from_args(
    name: Option<String>,
    location: Option<String>,
    description: Option<String>,
    people_needed: Option<String>,
    date_time: Option<String>,
    image: Option<String>,
    clear_image: bool,
    categories: Option<String>,
) -> Result<OpportunityPatch> {
    let image_uri = if clear_image {
        Some(None)
    } else {
        image.map(Some)
    };
    let coordinates = location.as_ref().map(|_| None);
    let categories = match categories {
        Some(c) => Some(parse_categories(Some(c))?),
        None => None,
    };

    Ok(OpportunityPatch {
        name,
        description,
        location,
        people_needed,
        date_time,
        image_uri,
        coordinates,
        categories,
        ..OpportunityPatch::default()
    })
}

/// First non-empty line, cut at `max_len` characters
pub fn preview(text: &str, max_len: usize) -> String {
    let first_line = text
        .lines()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("")
        .trim();

    if first_line.chars().count() <= max_len {
        first_line.to_string()
    } else {
        let cut: String = first_line.chars().take(max_len).collect();
        format!("{}...", cut)
    }
}
