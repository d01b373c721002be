//! Supported build systems and their step tables.

use serde::{Deserialize, Serialize};

use crate::status::Status;

/// One command in a build system's pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// Executable name or path.
    pub program: &'static str,

    /// Arguments passed to the executable.
    pub args: &'static [&'static str],

    /// Status reported when this step fails.
    pub on_failure: Status,
}

impl Step {
    const fn new(program: &'static str, args: &'static [&'static str], on_failure: Status) -> Self {
        Self {
            program,
            args,
            on_failure,
        }
    }

    /// Full command line, for logs and error messages.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program)
            .chain(self.args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

const MODULE_BUILD_STEPS: [Step; 3] = [
    Step::new("perl", &["Build.PL"], Status::NotApplicable),
    Step::new("./Build", &[], Status::NotApplicable),
    Step::new("./Build", &["test"], Status::Fail),
];

const MAKE_MAKER_STEPS: [Step; 3] = [
    Step::new("perl", &["Makefile.PL"], Status::NotApplicable),
    Step::new("make", &[], Status::NotApplicable),
    Step::new("make", &["test"], Status::Fail),
];

/// Build systems ukigumo knows how to drive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BuildSystem {
    /// Perl project using Module::Build (`Build.PL`).
    ModuleBuild,

    /// Perl project using ExtUtils::MakeMaker (`Makefile.PL`).
    MakeMaker,
}

impl BuildSystem {
    pub fn name(&self) -> &'static str {
        match self {
            BuildSystem::ModuleBuild => "module_build",
            BuildSystem::MakeMaker => "make_maker",
        }
    }

    /// Marker file whose presence selects this build system.
    pub fn marker(&self) -> &'static str {
        match self {
            BuildSystem::ModuleBuild => "Build.PL",
            BuildSystem::MakeMaker => "Makefile.PL",
        }
    }

    /// Ordered steps; each runs only if the previous one succeeded.
    pub fn steps(&self) -> &'static [Step] {
        match self {
            BuildSystem::ModuleBuild => &MODULE_BUILD_STEPS,
            BuildSystem::MakeMaker => &MAKE_MAKER_STEPS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_system_names() {
        assert_eq!(BuildSystem::ModuleBuild.name(), "module_build");
        assert_eq!(BuildSystem::MakeMaker.name(), "make_maker");
    }

    #[test]
    fn test_module_build_steps() {
        let lines: Vec<String> = BuildSystem::ModuleBuild
            .steps()
            .iter()
            .map(Step::command_line)
            .collect();
        assert_eq!(lines, vec!["perl Build.PL", "./Build", "./Build test"]);
    }

    #[test]
    fn test_make_maker_steps() {
        let lines: Vec<String> = BuildSystem::MakeMaker
            .steps()
            .iter()
            .map(Step::command_line)
            .collect();
        assert_eq!(lines, vec!["perl Makefile.PL", "make", "make test"]);
    }

    #[test]
    fn test_only_test_step_reports_fail() {
        for system in [BuildSystem::ModuleBuild, BuildSystem::MakeMaker] {
            let steps = system.steps();
            let (last, setup) = steps.split_last().unwrap();
            assert_eq!(last.on_failure, Status::Fail);
            assert!(setup.iter().all(|s| s.on_failure == Status::NotApplicable));
        }
    }
}
