use std::{
    io::{stdin, stdout, Write},
    path::PathBuf,
};

use log::{debug, info, warn};

use crate::{
    draft_from_args, filter_opportunities, map_pins, parse_categories, patch_from_args, preview,
    signed_up, Commands, Config, Coordinates, FilterCriteria, Opportunity, OpportunityStore,
    Result, SessionState, SessionStore, StoreError, ThemeMode, CATEGORIES,
};

/// CLI Application handler - processes CLI commands and interfaces with the stores
pub struct App {
    /// The opportunity store backend
    store: OpportunityStore,

    /// Profile, admin flag and sign-ups of this device's user
    session: SessionStore,

    /// Application configuration
    config: Config,

    /// Where `config` was read from, if given on the command line
    config_path: Option<PathBuf>,

    /// Whether to display verbose output
    verbose: bool,
}

impl App {
    /// Create a new CLI application with the given stores and config
    pub fn new(
        store: OpportunityStore,
        session: SessionStore,
        config: Config,
        config_path: Option<PathBuf>,
        verbose: bool,
    ) -> Self {
        Self {
            store,
            session,
            config,
            config_path,
            verbose,
        }
    }

    /// Run the CLI application with the given command
    pub async fn run(&self, command: Commands) -> Result<()> {
        if self.verbose {
            self.log_store_events();
        }

        self.session.load().await;

        match command {
            Commands::Config { reset } => return self.handle_config(reset),
            Commands::Categories => {
                for category in CATEGORIES {
                    println!("{}", category);
                }
                return Ok(());
            }
            Commands::Profile {
                username,
                admin,
                image,
                clear_image,
                theme,
                toggle_theme,
            } => {
                return self
                    .handle_profile(username, admin, image, clear_image, theme, toggle_theme)
                    .await
            }
            _ => {}
        }

        let outcome = self.store.load(matches!(command, Commands::Refresh)).await;
        if let Some(message) = &outcome.error {
            eprintln!("{}", console::style(message).red());
        }

        match command {
            Commands::List {
                query,
                category,
                max_distance,
                lat,
                lon,
                map,
                json,
            } => {
                let user_location = match (lat, lon) {
                    (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
                    _ => None,
                };
                let criteria = FilterCriteria {
                    query: query.unwrap_or_default(),
                    categories: parse_categories(category)?,
                    max_distance_miles: max_distance,
                    user_location,
                    is_admin_viewer: self.session.state().is_admin,
                };
                let results = self.list(&criteria, map);
                self.display_opportunities(&results, json)?;
            }

            Commands::View { id, json } => self.handle_view(&id, json)?,

            Commands::Create {
                name,
                location,
                description,
                people_needed,
                date_time,
                image,
                categories,
            } => {
                self.require_admin("create opportunities")?;
                let draft = draft_from_args(
                    name,
                    location,
                    description,
                    people_needed,
                    date_time,
                    image,
                    categories,
                )?;
                let opportunity = Opportunity::new(draft)?;
                let id = opportunity.id.clone();
                self.store.add(opportunity).await?;
                println!("Opportunity created with ID: {}", id);
                println!("Its location will be placed on the map at the next refresh.");
            }

            Commands::Edit {
                id,
                name,
                location,
                description,
                people_needed,
                date_time,
                image,
                clear_image,
                categories,
            } => {
                self.require_admin("edit opportunities")?;
                let patch = patch_from_args(
                    name,
                    location,
                    description,
                    people_needed,
                    date_time,
                    image,
                    clear_image,
                    categories,
                )?;
                if patch.is_empty() {
                    return Err(StoreError::ApplicationError {
                        message: "Nothing to change; pass at least one field".to_string(),
                    });
                }
                let moved = patch.location.is_some();
                self.store.update(&id, patch).await?;
                println!("Opportunity {} updated successfully", id);
                if moved {
                    println!("Its new location will be placed on the map at the next refresh.");
                }
            }

            Commands::Delete { id, force } => self.handle_delete(&id, force).await?,

            Commands::SignUp { id } => self.handle_sign_up(&id).await?,

            Commands::Leave { id } => self.handle_leave(&id).await?,

            Commands::Mine { json } => {
                let mine = self.my_opportunities();
                self.display_opportunities(&mine, json)?;
            }

            Commands::Refresh => {
                let placed = self.store.with_coordinates().len();
                println!(
                    "Loaded {} opportunities, {} with map coordinates",
                    outcome.opportunities.len(),
                    placed
                );
            }

            Commands::Config { .. } | Commands::Profile { .. } | Commands::Categories => {}
        }

        Ok(())
    }

    /// Filtered view, optionally narrowed to what can be placed on a map
    pub fn list(&self, criteria: &FilterCriteria, map_only: bool) -> Vec<Opportunity> {
        let filtered = filter_opportunities(&self.store.opportunities(), criteria);
        if map_only {
            map_pins(&filtered, &self.store.with_coordinates())
        } else {
            filtered
        }
    }

    /// The opportunities this device's user signed up for
    pub fn my_opportunities(&self) -> Vec<Opportunity> {
        let state = self.session.state();
        signed_up(&self.store.opportunities(), &state.signed_up_opportunity_ids)
    }

    fn require_admin(&self, action: &str) -> Result<()> {
        if self.session.state().is_admin {
            Ok(())
        } else {
            Err(StoreError::PermissionDenied {
                message: format!("only admins can {}", action),
            })
        }
    }

    fn find(&self, id: &str) -> Result<Opportunity> {
        self.store
            .get(id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    /// Records the sign-up on the session first, then bumps the count. If
    /// the count cannot be saved the session entry is taken back out.
    pub async fn handle_sign_up(&self, id: &str) -> Result<()> {
        let opportunity = self.find(id)?;

        if !self.session.sign_up(id).await? {
            println!("You are already signed up for '{}'", opportunity.name);
            return Ok(());
        }

        match self.store.sign_up(id).await {
            Ok(count) => {
                info!("Signed up for {}", id);
                println!(
                    "Signed up for '{}' ({} / {} volunteers)",
                    opportunity.name, count, opportunity.people_needed
                );
                Ok(())
            }
            Err(e) => {
                warn!("Rolling back sign-up for {}: {}", id, e);
                if let Err(rollback) = self.session.leave(id).await {
                    warn!("Failed to roll back sign-up for {}: {}", id, rollback);
                }
                Err(e)
            }
        }
    }

    pub async fn handle_leave(&self, id: &str) -> Result<()> {
        let opportunity = self.find(id)?;

        if !self.session.leave(id).await? {
            println!("You are not signed up for '{}'", opportunity.name);
            return Ok(());
        }

        match self.store.leave(id).await {
            Ok(count) => {
                info!("Left {}", id);
                println!(
                    "You left '{}' ({} / {} volunteers)",
                    opportunity.name, count, opportunity.people_needed
                );
                Ok(())
            }
            Err(e) => {
                warn!("Rolling back leave for {}: {}", id, e);
                if let Err(rollback) = self.session.sign_up(id).await {
                    warn!("Failed to roll back leave for {}: {}", id, rollback);
                }
                Err(e)
            }
        }
    }

    fn handle_view(&self, id: &str, json: bool) -> Result<()> {
        let opportunity = self.find(id)?;

        if json {
            println!("{}", serde_json::to_string_pretty(&opportunity)?);
            return Ok(());
        }

        let state = self.session.state();
        println!("{}", console::style(&opportunity.name).bold());
        println!("ID:        {}", opportunity.id);
        println!("Where:     {}", opportunity.location);
        if let Some(coords) = opportunity.coordinates {
            println!(
                "           ({:.5}, {:.5})",
                coords.latitude, coords.longitude
            );
        }
        println!("When:      {}", opportunity.date_time);
        println!("{}", volunteer_ratio(&opportunity));
        if let Some(categories) = &opportunity.categories {
            println!("Categories: {}", console::style(categories.join(", ")).cyan());
        }
        if let Some(image) = &opportunity.image_uri {
            println!("Image:     {}", image);
        }
        if !opportunity.description.is_empty() {
            println!("\n{}", opportunity.description);
        }
        if state.is_signed_up(&opportunity.id) {
            println!("\n{}", console::style("You are signed up").green());
        }

        Ok(())
    }

    async fn handle_delete(&self, id: &str, force: bool) -> Result<()> {
        self.require_admin("delete opportunities")?;

        // Step 1: Fetch the opportunity to be deleted
        let opportunity = self.find(id)?;

        // Step 2: Show details and prompt for confirmation (unless force flag is set)
        if !force {
            println!("You are about to delete the following opportunity:");
            println!("ID:       {}", opportunity.id);
            println!("Name:     {}", opportunity.name);
            println!("Location: {}", opportunity.location);
            println!("{}", volunteer_ratio(&opportunity));

            println!("\nThis action cannot be undone!");
            print!("Are you sure you want to delete this opportunity? [y/N]: ");
            stdout().flush().map_err(StoreError::Io)?;

            let mut input = String::new();
            stdin().read_line(&mut input).map_err(StoreError::Io)?;

            let input = input.trim().to_lowercase();
            if input != "y" && input != "yes" {
                println!("Deletion cancelled.");
                return Ok(());
            }
        }

        // Step 3: Delete the opportunity
        self.store.delete(id).await?;

        // Step 4: Forget a sign-up for it on this device
        if self.session.state().is_signed_up(id) {
            if let Err(e) = self.session.leave(id).await {
                warn!("Failed to drop sign-up for deleted opportunity {}: {}", id, e);
            }
        }

        println!(
            "Opportunity '{}' ({}) has been permanently deleted.",
            opportunity.name, opportunity.id
        );
        Ok(())
    }

    async fn handle_profile(
        &self,
        username: Option<String>,
        admin: Option<bool>,
        image: Option<String>,
        clear_image: bool,
        theme: Option<ThemeMode>,
        toggle_theme: bool,
    ) -> Result<()> {
        if let Some(name) = username {
            let name = name.trim();
            if name.is_empty() {
                return Err(StoreError::Validation {
                    message: "Username cannot be empty".to_string(),
                });
            }
            self.session.set_username(name).await?;
        }
        if let Some(admin) = admin {
            self.session.set_is_admin(admin).await?;
        }
        if clear_image {
            self.session.set_profile_image_uri(None).await?;
        } else if let Some(image) = image {
            self.session.set_profile_image_uri(Some(&image)).await?;
        }
        if let Some(theme) = theme {
            self.session.set_theme_mode(theme).await?;
        } else if toggle_theme {
            self.session.toggle_theme().await?;
        }

        display_profile(&self.session.state());
        Ok(())
    }

    fn handle_config(&self, reset: bool) -> Result<()> {
        if reset {
            let path = Config::default().save(self.config_path.as_deref())?;
            println!("Configuration reset to defaults at {}", path.display());
            return Ok(());
        }

        let mut shown = self.config.clone();
        if shown.geocoding_api_key.is_some() {
            shown.geocoding_api_key = Some("********".to_string());
        }
        println!("{}", serde_json::to_string_pretty(&shown)?);
        Ok(())
    }

    /// Display opportunities in the requested format
    fn display_opportunities(&self, opportunities: &[Opportunity], json: bool) -> Result<()> {
        if opportunities.is_empty() {
            println!("No opportunities found matching the criteria.");
            return Ok(());
        }

        if json {
            println!("{}", serde_json::to_string_pretty(opportunities)?);
            return Ok(());
        }

        let signed_up_ids = self.session.state().signed_up_opportunity_ids;

        // Use terminal width for formatting if available
        let term_width = terminal_size::terminal_size()
            .map(|(w, _)| w.0 as usize)
            .unwrap_or(80);

        for (i, opportunity) in opportunities.iter().enumerate() {
            if i > 0 {
                println!("{}", "-".repeat(term_width.min(50)));
            }

            println!("ID: {} | {}", opportunity.id, opportunity.date_time);
            let mut title = console::style(&opportunity.name).bold().to_string();
            if signed_up_ids.contains(&opportunity.id) {
                title.push_str(&format!(" {}", console::style("(joined)").green()));
            }
            println!("{}", title);
            println!("{} | {}", opportunity.location, volunteer_ratio(opportunity));

            if let Some(categories) = &opportunity.categories {
                let tags = categories
                    .iter()
                    .map(|c| format!("#{}", c))
                    .collect::<Vec<_>>()
                    .join(" ");
                println!("{}", console::style(tags).cyan());
            }

            let summary = preview(&opportunity.description, 100);
            if !summary.is_empty() {
                println!("\n{}", summary);
            }
        }

        println!(
            "\nFound {} opportunit{}",
            opportunities.len(),
            if opportunities.len() == 1 { "y" } else { "ies" }
        );
        Ok(())
    }

    fn log_store_events(&self) {
        let mut events = self.store.subscribe();
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                debug!("Store event: {:?}", event);
            }
        });
    }
}

fn volunteer_ratio(opportunity: &Opportunity) -> String {
    let needed = if opportunity.people_needed.trim().is_empty() {
        "?"
    } else {
        opportunity.people_needed.trim()
    };
    format!(
        "Volunteers: {} / {}",
        opportunity.volunteers_signed_up, needed
    )
}

fn display_profile(state: &SessionState) {
    println!("Username: {}", console::style(&state.username).bold());
    println!("Admin:    {}", if state.is_admin { "yes" } else { "no" });
    println!(
        "Image:    {}",
        state.profile_image_uri.as_deref().unwrap_or("(none)")
    );
    println!("Theme:    {}", state.theme_mode);
    println!(
        "Joined:   {} opportunit{}",
        state.signed_up_opportunity_ids.len(),
        if state.signed_up_opportunity_ids.len() == 1 { "y" } else { "ies" }
    );
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use async_trait::async_trait;

    use super::*;
    use crate::{Geocoder, KeyValueStore, MemoryStore, StoreOptions, OPPORTUNITIES_KEY};

    struct NoGeocoder;

    const OAKLAND: Coordinates = Coordinates {
        latitude: 37.8044,
        longitude: -122.2712,
    };
    const NEW_YORK: Coordinates = Coordinates {
        latitude: 40.7128,
        longitude: -74.006,
    };

    /// Knows the two cities the edit test moves between
    struct CityGeocoder;

    #[async_trait]
    impl Geocoder for CityGeocoder {
        async fn geocode(&self, address: &str) -> Result<Option<Coordinates>> {
            Ok(match address {
                "Oakland, CA" => Some(OAKLAND),
                "New York, NY" => Some(NEW_YORK),
                _ => None,
            })
        }
    }

    #[async_trait]
    impl Geocoder for NoGeocoder {
        async fn geocode(&self, _address: &str) -> Result<Option<Coordinates>> {
            Ok(None)
        }
    }

    fn app() -> (Arc<MemoryStore>, App) {
        let kv = Arc::new(MemoryStore::new());
        (kv.clone(), app_with(kv.clone(), kv))
    }

    fn app_with(opportunity_kv: Arc<MemoryStore>, session_kv: Arc<MemoryStore>) -> App {
        let store = OpportunityStore::new(
            opportunity_kv,
            Arc::new(NoGeocoder),
            StoreOptions {
                min_load_time: Duration::ZERO,
                ..StoreOptions::default()
            },
        );
        let session = SessionStore::new(session_kv);
        App::new(store, session, Config::default(), None, false)
    }

    fn create(name: &str, categories: Option<&str>) -> Commands {
        Commands::Create {
            name: name.to_string(),
            location: "Oakland, CA".to_string(),
            description: String::new(),
            people_needed: "5".to_string(),
            date_time: "Saturday".to_string(),
            image: None,
            categories: categories.map(str::to_string),
        }
    }

    async fn make_admin(app: &App) {
        app.run(Commands::Profile {
            username: None,
            admin: Some(true),
            image: None,
            clear_image: false,
            theme: None,
            toggle_theme: false,
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn create_requires_admin() {
        let (kv, app) = app();

        let result = app.run(create("Beach Cleanup", None)).await;

        assert!(matches!(result, Err(StoreError::PermissionDenied { .. })));
        assert_eq!(kv.get(OPPORTUNITIES_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn admin_creates_and_volunteer_signs_up() {
        let (_, app) = app();
        make_admin(&app).await;
        app.run(create("Beach Cleanup", Some("Environment"))).await.unwrap();
        let id = app.store.opportunities()[0].id.clone();

        app.run(Commands::SignUp { id: id.clone() }).await.unwrap();
        app.run(Commands::SignUp { id: id.clone() }).await.unwrap();

        assert_eq!(app.store.get(&id).unwrap().volunteers_signed_up, 1);
        assert_eq!(app.my_opportunities().len(), 1);

        app.run(Commands::Leave { id: id.clone() }).await.unwrap();
        app.run(Commands::Leave { id: id.clone() }).await.unwrap();

        assert_eq!(app.store.get(&id).unwrap().volunteers_signed_up, 0);
        assert!(app.my_opportunities().is_empty());
    }

    #[tokio::test]
    async fn failed_count_update_rolls_back_the_sign_up() {
        let opportunity_kv = Arc::new(MemoryStore::new());
        let app = app_with(opportunity_kv.clone(), Arc::new(MemoryStore::new()));
        make_admin(&app).await;
        app.run(create("Food Drive", None)).await.unwrap();
        let id = app.store.opportunities()[0].id.clone();

        // Session writes go through, the list write does not
        opportunity_kv.fail_writes(true);
        let result = app.handle_sign_up(&id).await;

        assert!(matches!(result, Err(StoreError::StorageWrite { .. })));
        assert!(!app.session.state().is_signed_up(&id));
        assert_eq!(app.store.get(&id).unwrap().volunteers_signed_up, 0);
    }

    #[tokio::test]
    async fn edit_and_forced_delete() {
        let (_, app) = app();
        make_admin(&app).await;
        app.run(create("Food Drive", None)).await.unwrap();
        let id = app.store.opportunities()[0].id.clone();
        app.run(Commands::SignUp { id: id.clone() }).await.unwrap();

        app.run(Commands::Edit {
            id: id.clone(),
            name: Some("Winter Food Drive".to_string()),
            location: None,
            description: None,
            people_needed: None,
            date_time: None,
            image: None,
            clear_image: false,
            categories: Some("Food & Hunger".to_string()),
        })
        .await
        .unwrap();

        let edited = app.store.get(&id).unwrap();
        assert_eq!(edited.name, "Winter Food Drive");
        assert_eq!(edited.categories, Some(vec!["Food & Hunger".to_string()]));
        assert_eq!(edited.volunteers_signed_up, 1);

        app.run(Commands::Delete {
            id: id.clone(),
            force: true,
        })
        .await
        .unwrap();

        assert!(app.store.get(&id).is_none());
        assert!(!app.session.state().is_signed_up(&id));
    }

    #[tokio::test]
    async fn list_uses_the_session_admin_flag() {
        let (_, app) = app();
        make_admin(&app).await;
        app.run(create("Park cleanup", Some("Environment"))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
        app.run(create("Park tour", None)).await.unwrap();

        let criteria = FilterCriteria {
            query: "park".to_string(),
            categories: vec!["Environment".to_string()],
            ..FilterCriteria::default()
        };

        assert_eq!(app.list(&criteria, false).len(), 1);

        let admin_view = FilterCriteria {
            is_admin_viewer: true,
            ..criteria
        };
        assert_eq!(app.list(&admin_view, false).len(), 2);
        // Nothing was geocoded
        assert!(app.list(&admin_view, true).is_empty());
    }

    #[tokio::test]
    async fn moving_an_opportunity_replaces_its_pin() {
        let kv = Arc::new(MemoryStore::new());
        let store = OpportunityStore::new(
            kv.clone(),
            Arc::new(CityGeocoder),
            StoreOptions {
                min_load_time: Duration::ZERO,
                ..StoreOptions::default()
            },
        );
        let app = App::new(store, SessionStore::new(kv), Config::default(), None, false);
        make_admin(&app).await;
        app.run(create("Food Drive", None)).await.unwrap();
        app.run(Commands::Refresh).await.unwrap();
        let id = app.store.opportunities()[0].id.clone();
        assert_eq!(app.store.get(&id).unwrap().coordinates, Some(OAKLAND));

        app.run(Commands::Edit {
            id: id.clone(),
            name: None,
            location: Some("New York, NY".to_string()),
            description: None,
            people_needed: None,
            date_time: None,
            image: None,
            clear_image: false,
            categories: None,
        })
        .await
        .unwrap();
        assert!(app.store.get(&id).unwrap().coordinates.is_none());

        app.run(Commands::Refresh).await.unwrap();
        assert_eq!(app.store.get(&id).unwrap().coordinates, Some(NEW_YORK));

        let near_new_york = FilterCriteria {
            max_distance_miles: 10.0,
            user_location: Some(NEW_YORK),
            ..FilterCriteria::default()
        };
        assert_eq!(app.list(&near_new_york, true).len(), 1);
    }

    #[tokio::test]
    async fn unknown_categories_are_rejected() {
        let (kv, app) = app();
        make_admin(&app).await;

        let create_result = app.run(create("Beach Cleanup", Some("Enviroment"))).await;
        let list_result = app
            .run(Commands::List {
                query: None,
                category: Some("Gardening".to_string()),
                max_distance: crate::NO_DISTANCE_LIMIT_MILES,
                lat: None,
                lon: None,
                map: false,
                json: false,
            })
            .await;

        assert!(matches!(create_result, Err(StoreError::Validation { .. })));
        assert!(matches!(list_result, Err(StoreError::Validation { .. })));
        assert_eq!(kv.get(OPPORTUNITIES_KEY).await.unwrap(), None);
        app.run(Commands::Categories).await.unwrap();
    }

    #[tokio::test]
    async fn edit_without_fields_is_rejected() {
        let (_, app) = app();
        make_admin(&app).await;

        let result = app
            .run(Commands::Edit {
                id: "1".to_string(),
                name: None,
                location: None,
                description: None,
                people_needed: None,
                date_time: None,
                image: None,
                clear_image: false,
                categories: None,
            })
            .await;

        assert!(matches!(result, Err(StoreError::ApplicationError { .. })));
    }

    #[test]
    fn ratio_handles_missing_capacity() {
        let mut opportunity = Opportunity::new(crate::OpportunityDraft {
            name: "x".to_string(),
            location: "y".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(volunteer_ratio(&opportunity), "Volunteers: 0 / ?");

        opportunity.people_needed = "12".to_string();
        opportunity.volunteers_signed_up = 3;
        assert_eq!(volunteer_ratio(&opportunity), "Volunteers: 3 / 12");
    }
}
