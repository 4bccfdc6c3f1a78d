use crate::dao::models::{ChangeEvent, GameSettingEntity};

/// In-memory view of the game settings owned by the sync component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsState {
    settings: Vec<GameSettingEntity>,
    loading: bool,
    error: Option<String>,
}

/// Immutable copy of [`SettingsState`] published to observers after every mutation.
pub type SettingsSnapshot = SettingsState;

impl Default for SettingsState {
    /// Nothing has been fetched yet, so the state starts out loading.
    fn default() -> Self {
        Self {
            settings: Vec::new(),
            loading: true,
            error: None,
        }
    }
}

impl SettingsState {
    /// Rows in the order they were loaded or inserted.
    pub fn settings(&self) -> &[GameSettingEntity] {
        &self.settings
    }

    /// Whether a fetch is in flight.
    pub fn loading(&self) -> bool {
        self.loading
    }

    /// User-facing message describing the last failed operation.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Enter the loading state and forget any previous error.
    pub fn begin_loading(&mut self) {
        self.loading = true;
        self.error = None;
    }

    /// Leave the loading state, keeping any error.
    pub fn finish_loading(&mut self) {
        self.loading = false;
    }

    /// Forget the last error.
    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Record a user-facing error message.
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    /// Swap in a freshly loaded list verbatim.
    pub fn replace(&mut self, settings: Vec<GameSettingEntity>) {
        self.settings = settings;
    }

    /// `false` for unknown games.
    pub fn is_enabled(&self, game_name: &str) -> bool {
        self.position(game_name)
            .and_then(|idx| self.settings.get(idx))
            .is_some_and(|setting| setting.is_enabled)
    }

    /// Set the flag of the row named `game_name`; returns whether a row matched.
    pub fn patch(&mut self, game_name: &str, is_enabled: bool, updated_at: &str) -> bool {
        match self
            .settings
            .iter_mut()
            .find(|setting| setting.game_name == game_name)
        {
            Some(setting) => {
                setting.is_enabled = is_enabled;
                setting.updated_at = updated_at.to_string();
                true
            }
            None => false,
        }
    }

    /// Merge a change notification into the list, keyed by game name.
    pub fn apply_change(&mut self, event: ChangeEvent) {
        match event {
            ChangeEvent::Delete { game_name } => {
                if let Some(idx) = game_name.as_deref().and_then(|name| self.position(name)) {
                    self.settings.remove(idx);
                }
            }
            ChangeEvent::Insert(row) | ChangeEvent::Update(row) => {
                match self.position(&row.game_name) {
                    Some(idx) => {
                        if let Some(slot) = self.settings.get_mut(idx) {
                            *slot = row;
                        }
                    }
                    None => self.settings.push(row),
                }
            }
        }
    }

    fn position(&self, game_name: &str) -> Option<usize> {
        self.settings
            .iter()
            .position(|setting| setting.game_name == game_name)
    }
}
