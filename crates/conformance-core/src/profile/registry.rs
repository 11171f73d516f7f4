//! Registry of named profiles.
//!
//! The registry is an explicit value handed to the engine at construction.
//! It is read-only once built, so it can be shared across threads freely.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::path::Path;

use super::{builtin, Profile, ProfileError};

/// Profiles keyed by name.
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    profiles: BTreeMap<String, Profile>,
}

impl ProfileRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in profiles.
    pub fn with_builtins() -> Self {
        let profiles = builtin::all()
            .into_iter()
            .map(|profile| (profile.name.clone(), profile))
            .collect();
        Self { profiles }
    }

    /// Validate and add a profile. Names must be unique.
    pub fn register(&mut self, profile: Profile) -> Result<&Profile, ProfileError> {
        profile.validate()?;

        match self.profiles.entry(profile.name.clone()) {
            Entry::Occupied(_) => Err(ProfileError::DuplicateProfile(profile.name)),
            Entry::Vacant(slot) => {
                tracing::debug!(
                    profile = %profile.name,
                    rules = profile.rule_set.rules.len(),
                    weight = profile.rule_set.total_weight,
                    "Registered profile"
                );
                Ok(&*slot.insert(profile))
            }
        }
    }

    /// Load a profile file and register it.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<&Profile, ProfileError> {
        let profile = Profile::from_file(path)?;
        self.register(profile)
    }

    pub fn get(&self, name: &str) -> Option<&Profile> {
        self.profiles.get(name)
    }

    /// Profile names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.values()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
