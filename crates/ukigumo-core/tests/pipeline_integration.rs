//! Integration tests for detection + build steps against fixture projects.
//!
//! `perl` and `make` are replaced by shell stand-ins placed first on `PATH`
//! so the tests only need `/bin/sh`.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::Duration;

use tempfile::TempDir;
use ukigumo_core::{BuildSystem, RunError, RunOptions, Status, TestRunner};

const FAKE_PERL: &str = "#!/bin/sh\necho \"perl $*\"\nexec sh \"$@\"\n";

const FAKE_MAKE: &str = "#!/bin/sh
echo \"make $*\"
if [ \"$1\" = \"test\" ]; then exec sh ./t.sh; fi
exit 0
";

const BUILD_PL: &str = "cat > Build <<'EOF'
#!/bin/sh
echo \"Build $*\"
if [ \"$1\" = \"test\" ]; then exec sh ./t.sh; fi
exit 0
EOF
chmod +x Build
";

const PASSING_TESTS: &str = "echo 'ok 1 - passes'\nexit 0\n";
const FAILING_TESTS: &str = "echo 'not ok 1 - fails'\nexit 1\n";

struct Fixture {
    _bin: TempDir,
    project: TempDir,
    options: RunOptions,
}

impl Fixture {
    fn new() -> Self {
        let bin = tempfile::tempdir().expect("bin dir");
        write_executable(bin.path(), "perl", FAKE_PERL);
        write_executable(bin.path(), "make", FAKE_MAKE);

        let path = format!(
            "{}:{}",
            bin.path().display(),
            std::env::var("PATH").unwrap_or_default()
        );
        let options = RunOptions::default()
            .with_command_timeout(Some(Duration::from_secs(30)))
            .with_env("PATH", path);

        Self {
            _bin: bin,
            project: tempfile::tempdir().expect("project dir"),
            options,
        }
    }

    fn write(&self, name: &str, content: &str) -> &Self {
        fs::write(self.project.path().join(name), content).expect("write fixture");
        self
    }

    fn dir(&self) -> &Path {
        self.project.path()
    }
}

fn write_executable(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    fs::write(&path, content).expect("write script");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod");
}

fn section_offsets(log: &str, needles: &[&str]) -> Vec<usize> {
    needles
        .iter()
        .map(|n| log.find(n).unwrap_or_else(|| panic!("missing {:?} in log:\n{}", n, log)))
        .collect()
}

/// Test: Build.PL project where every step exits 0
#[tokio::test]
async fn test_module_build_success() {
    let fx = Fixture::new();
    fx.write("Build.PL", BUILD_PL).write("t.sh", PASSING_TESTS);

    let outcome = TestRunner::run(fx.dir(), &fx.options).await;

    assert_eq!(outcome.status, Status::Success);
    assert_eq!(outcome.build_system, Some(BuildSystem::ModuleBuild));
    assert!(outcome.error.is_none(), "{:?}", outcome.error);
    assert!(outcome.succeeded());

    let log = outcome.log_lossy();
    assert_eq!(log.matches("\n++ ").count(), 3, "three sections:\n{}", log);

    let offsets = section_offsets(&log, &["perl Build.PL", "Build \n", "Build test", "ok 1 - passes"]);
    assert!(offsets.windows(2).all(|w| w[0] < w[1]), "out of order:\n{}", log);
}

/// Test: Makefile.PL project whose `make test` fails
#[tokio::test]
async fn test_make_maker_test_failure() {
    let fx = Fixture::new();
    fx.write("Makefile.PL", "echo configured\n")
        .write("t.sh", FAILING_TESTS);

    let outcome = TestRunner::run(fx.dir(), &fx.options).await;

    assert_eq!(outcome.status, Status::Fail);
    assert_eq!(outcome.build_system, Some(BuildSystem::MakeMaker));

    let log = outcome.log_lossy();
    let offsets = section_offsets(
        &log,
        &["perl Makefile.PL", "configured", "make \n", "make test", "not ok 1 - fails"],
    );
    assert!(offsets.windows(2).all(|w| w[0] < w[1]), "out of order:\n{}", log);

    match outcome.error {
        Some(RunError::Step { step, .. }) => assert_eq!(step, 3),
        other => panic!("expected step 3 failure, got {:?}", other),
    }
}

/// Test: configure step failure is not a test failure
#[tokio::test]
async fn test_configure_failure_is_not_applicable() {
    let fx = Fixture::new();
    fx.write("Makefile.PL", "echo 'missing prerequisite' >&2\nexit 2\n")
        .write("t.sh", PASSING_TESTS);

    let outcome = TestRunner::run(fx.dir(), &fx.options).await;

    assert_eq!(outcome.status, Status::NotApplicable);
    let log = outcome.log_lossy();
    assert!(log.contains("missing prerequisite"));
    assert!(!log.contains("make test"), "later steps must not run:\n{}", log);
    assert_eq!(log.matches("\n++ ").count(), 1);
}

/// Test: build step failure is not a test failure
#[tokio::test]
async fn test_build_failure_is_not_applicable() {
    let fx = Fixture::new();
    fx.write("Build.PL", "echo 'no Build generated'\n")
        .write("t.sh", PASSING_TESTS);

    let outcome = TestRunner::run(fx.dir(), &fx.options).await;

    assert_eq!(outcome.status, Status::NotApplicable);
    match outcome.error {
        Some(RunError::Step { step, .. }) => assert_eq!(step, 2),
        other => panic!("expected step 2 failure, got {:?}", other),
    }
}

/// Test: .ukigumo.yml short-circuits before any command
#[tokio::test]
async fn test_config_file_is_unsupported() {
    let fx = Fixture::new();
    fx.write(".ukigumo.yml", "script: prove -lr t\n")
        .write("Build.PL", BUILD_PL)
        .write("t.sh", PASSING_TESTS);

    let outcome = TestRunner::run(fx.dir(), &fx.options).await;

    assert_eq!(outcome.status, Status::NotApplicable);
    assert!(outcome.log.is_empty());
    assert!(!fx.dir().join("Build").exists(), "no build command may run");
    let message = outcome.error.expect("error").to_string();
    assert!(message.contains("not supported"), "{}", message);
}

/// Test: hung test step is killed and reported as a timeout
#[tokio::test]
async fn test_hung_step_times_out() {
    let fx = Fixture::new();
    fx.write("Makefile.PL", "exit 0\n")
        .write("t.sh", "echo started\nexec sleep 30\n");
    let options = fx
        .options
        .clone()
        .with_command_timeout(Some(Duration::from_millis(500)));

    let outcome = TestRunner::run(fx.dir(), &options).await;

    assert_eq!(outcome.status, Status::Timeout);
    assert!(outcome.log_lossy().contains("timed out"));
}

/// Test: unchanged project yields the same status on every run
#[tokio::test]
async fn test_rerun_is_deterministic() {
    let fx = Fixture::new();
    fx.write("Makefile.PL", "exit 0\n").write("t.sh", FAILING_TESTS);

    let first = TestRunner::run(fx.dir(), &fx.options).await;
    let second = TestRunner::run(fx.dir(), &fx.options).await;

    assert_eq!(first.status, Status::Fail);
    assert_eq!(first.status, second.status);
}
