//! Build system detection from marker files.

use std::path::Path;

use tracing::debug;

use crate::build_system::BuildSystem;
use crate::error::DetectError;

/// Project-local configuration file. Not supported yet; its presence
/// fails detection even when a build marker is also present.
pub const CONFIG_FILE: &str = ".ukigumo.yml";

/// Pick the build system for `dir`.
///
/// Checked in order: [`CONFIG_FILE`], `Build.PL`, `Makefile.PL`.
pub fn detect(dir: &Path) -> Result<BuildSystem, DetectError> {
    let config = dir.join(CONFIG_FILE);
    if config.exists() {
        return Err(DetectError::UnsupportedConfig { path: config });
    }

    for system in [BuildSystem::ModuleBuild, BuildSystem::MakeMaker] {
        if dir.join(system.marker()).exists() {
            debug!(dir = %dir.display(), build_system = system.name(), "Detected build system");
            return Ok(system);
        }
    }

    Err(DetectError::UnknownProjectType {
        dir: dir.to_path_buf(),
    })
}
