//! The scoring engine: a profile registry plus name-based dispatch.

use std::path::Path;

use crate::candidate::Candidate;
use crate::profile::{Profile, ProfileRegistry};
use crate::report::Report;
use crate::EngineError;

/// Scores candidates against the profiles of an explicit registry.
#[derive(Debug, Clone)]
pub struct Engine {
    registry: ProfileRegistry,
}

impl Engine {
    pub fn new(registry: ProfileRegistry) -> Self {
        Self { registry }
    }

    /// Built-in profiles plus every profile file in `paths`.
    pub fn with_profile_files<P: AsRef<Path>>(
        paths: impl IntoIterator<Item = P>,
    ) -> Result<Self, EngineError> {
        let mut registry = ProfileRegistry::with_builtins();
        for path in paths {
            registry.load_file(path)?;
        }
        Ok(Self::new(registry))
    }

    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    /// Look up a profile by name.
    pub fn profile(&self, name: &str) -> Result<&Profile, EngineError> {
        self.registry
            .get(name)
            .ok_or_else(|| EngineError::UnknownProfile(name.to_string()))
    }

    /// Score `candidate` against the named profile.
    ///
    /// Only an unknown profile name is an error; everything about the
    /// candidate itself is reported inside the returned [`Report`].
    pub fn score<'a>(
        &self,
        profile: &str,
        candidate: impl Into<Candidate<'a>>,
    ) -> Result<Report, EngineError> {
        Ok(self.profile(profile)?.score(candidate))
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(ProfileRegistry::with_builtins())
    }
}
