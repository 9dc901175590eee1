//! Per-device user session: profile, admin flag, sign-ups and theme.
//!
//! Each field lives under its own key in the key-value store. Loading never
//! fails; anything missing or unreadable keeps its default.
use std::{
    fmt,
    str::FromStr,
    sync::{Arc, Mutex},
};

use clap::ValueEnum;
use log::{debug, error, info, warn};

use crate::{KeyValueStore, Result, StoreError};

pub const USERNAME_KEY: &str = "userName";
pub const PROFILE_IMAGE_KEY: &str = "profileImageUri";
pub const IS_ADMIN_KEY: &str = "isAdmin";
pub const SIGNED_UP_KEY: &str = "signedUpOpportunities";
pub const THEME_KEY: &str = "appThemeMode";

pub const DEFAULT_USERNAME: &str = "User";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ThemeMode {
    #[default]
    Light,
    Dark,
}

impl ThemeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ThemeMode::Light => "light",
            ThemeMode::Dark => "dark",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            ThemeMode::Light => ThemeMode::Dark,
            ThemeMode::Dark => ThemeMode::Light,
        }
    }
}

impl fmt::Display for ThemeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThemeMode {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "light" => Ok(ThemeMode::Light),
            "dark" => Ok(ThemeMode::Dark),
            other => Err(StoreError::Validation {
                message: format!("Unknown theme mode: {}", other),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub username: String,
    pub profile_image_uri: Option<String>,
    pub is_admin: bool,
    pub signed_up_opportunity_ids: Vec<String>,
    pub theme_mode: ThemeMode,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            username: DEFAULT_USERNAME.to_string(),
            profile_image_uri: None,
            is_admin: false,
            signed_up_opportunity_ids: Vec::new(),
            theme_mode: ThemeMode::Light,
        }
    }
}

impl SessionState {
    pub fn is_signed_up(&self, opportunity_id: &str) -> bool {
        self.signed_up_opportunity_ids
            .iter()
            .any(|id| id == opportunity_id)
    }
}

/// Loads and saves the session. Setters write first and only update the
/// cached state once the write went through.
#[derive(Clone)]
pub struct SessionStore {
    kv: Arc<dyn KeyValueStore>,
    state: Arc<Mutex<SessionState>>,
}

impl SessionStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            state: Arc::new(Mutex::new(SessionState::default())),
        }
    }

    pub fn state(&self) -> SessionState {
        match self.state.lock() {
            Ok(state) => state.clone(),
            Err(e) => {
                error!("Failed to acquire lock on session state: {}", e);
                SessionState::default()
            }
        }
    }

    pub async fn load(&self) -> SessionState {
        let mut loaded = SessionState::default();

        if let Some(username) = self.read(USERNAME_KEY).await {
            loaded.username = username;
        }
        loaded.profile_image_uri = self.read(PROFILE_IMAGE_KEY).await;
        if let Some(is_admin) = self.read(IS_ADMIN_KEY).await {
            loaded.is_admin = is_admin == "true";
        }
        if let Some(raw) = self.read(SIGNED_UP_KEY).await {
            match serde_json::from_str::<Vec<String>>(&raw) {
                Ok(ids) => loaded.signed_up_opportunity_ids = ids,
                Err(e) => warn!("Ignoring unreadable {}: {}", SIGNED_UP_KEY, e),
            }
        }
        if let Some(raw) = self.read(THEME_KEY).await {
            match raw.parse() {
                Ok(mode) => loaded.theme_mode = mode,
                Err(e) => warn!("Ignoring stored theme: {}", e),
            }
        }

        info!(
            "Loaded session for {} (admin: {}, {} sign-ups)",
            loaded.username,
            loaded.is_admin,
            loaded.signed_up_opportunity_ids.len()
        );
        self.replace(loaded.clone());
        loaded
    }

    pub async fn set_username(&self, username: &str) -> Result<()> {
        self.kv.set(USERNAME_KEY, username).await?;
        self.modify(|s| s.username = username.to_string());
        Ok(())
    }

    /// `None` removes the stored image
    pub async fn set_profile_image_uri(&self, uri: Option<&str>) -> Result<()> {
        match uri {
            Some(uri) => self.kv.set(PROFILE_IMAGE_KEY, uri).await?,
            None => self.kv.remove(PROFILE_IMAGE_KEY).await?,
        }
        self.modify(|s| s.profile_image_uri = uri.map(str::to_string));
        Ok(())
    }

    pub async fn set_is_admin(&self, is_admin: bool) -> Result<()> {
        self.kv
            .set(IS_ADMIN_KEY, if is_admin { "true" } else { "false" })
            .await?;
        self.modify(|s| s.is_admin = is_admin);
        Ok(())
    }

    pub async fn set_theme_mode(&self, mode: ThemeMode) -> Result<()> {
        self.kv.set(THEME_KEY, mode.as_str()).await?;
        self.modify(|s| s.theme_mode = mode);
        Ok(())
    }

    pub async fn toggle_theme(&self) -> Result<ThemeMode> {
        let next = self.state().theme_mode.toggled();
        self.set_theme_mode(next).await?;
        Ok(next)
    }

    /// Records the sign-up. Returns false if it was already recorded.
    pub async fn sign_up(&self, opportunity_id: &str) -> Result<bool> {
        let mut ids = self.state().signed_up_opportunity_ids;
        if ids.iter().any(|id| id == opportunity_id) {
            debug!("Already signed up for {}", opportunity_id);
            return Ok(false);
        }
        ids.push(opportunity_id.to_string());
        self.save_signed_up(ids).await?;
        Ok(true)
    }

    /// Drops the sign-up. Returns false if there was none.
    pub async fn leave(&self, opportunity_id: &str) -> Result<bool> {
        let mut ids = self.state().signed_up_opportunity_ids;
        let before = ids.len();
        ids.retain(|id| id != opportunity_id);
        if ids.len() == before {
            debug!("Not signed up for {}", opportunity_id);
            return Ok(false);
        }
        self.save_signed_up(ids).await?;
        Ok(true)
    }

    async fn save_signed_up(&self, ids: Vec<String>) -> Result<()> {
        let json = serde_json::to_string(&ids)?;
        self.kv.set(SIGNED_UP_KEY, &json).await?;
        self.modify(|s| s.signed_up_opportunity_ids = ids);
        Ok(())
    }

    async fn read(&self, key: &str) -> Option<String> {
        match self.kv.get(key).await {
            Ok(value) => value,
            Err(e) => {
                error!("Error loading {}: {}", key, e);
                None
            }
        }
    }

    fn modify(&self, f: impl FnOnce(&mut SessionState)) {
        match self.state.lock() {
            Ok(mut state) => f(&mut state),
            Err(e) => warn!("Failed to acquire lock for session update: {}", e),
        }
    }

    fn replace(&self, state: SessionState) {
        self.modify(|s| *s = state);
    }
}
