use std::path::Path;
use tracing::debug;

use super::{Validate, ValidationError};

/// Script bundles (`.ts4script`) are recognised but their contents are not
/// inspected; every bundle passes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScriptValidator;

impl Validate for ScriptValidator {
    fn validate(&self, path: &Path) -> Result<(), ValidationError> {
        debug!(path = %path.display(), "script bundle contents are not inspected");
        Ok(())
    }
}
