//! Command-line entry point for test binaries.
//!
//! A test target built with `harness = false` hands its suites to
//! [`main`]:
//!
//! ```no_run
//! fn main() {
//!     treetest::cli::main(|framework| {
//!         framework.describe("math", |d| {
//!             d.test("adds", |t| {
//!                 t.expect(1 + 1).to_equal(2);
//!             });
//!         })
//!     });
//! }
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::core::aggregate::AggregatedResult;
use crate::core::errors::EngineError;
use crate::exit_codes;
use crate::framework::Framework;
use crate::io::config::{FrameworkConfig, load_config};
use crate::logging;

#[derive(Debug, Parser)]
#[command(name = "treetest", version, about = "Run describe/test suites")]
pub struct Cli {
    /// Overwrite mismatching snapshots instead of failing.
    #[arg(short = 'u', long)]
    pub update_snapshots: bool,

    /// Snapshot directory (relative paths resolve against the project dir).
    #[arg(long, value_name = "DIR")]
    pub snapshot_dir: Option<PathBuf>,

    /// TOML config file. Flags override its values.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print the aggregated result as JSON on stdout.
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Build the effective config: file (or defaults), then flags.
    pub fn resolve_config(&self) -> Result<FrameworkConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => FrameworkConfig::default(),
        };
        self.apply(&mut config);
        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    pub fn apply(&self, config: &mut FrameworkConfig) {
        if self.update_snapshots {
            config.update_snapshots = true;
        }
        if let Some(dir) = &self.snapshot_dir {
            config.snapshot_dir = dir.clone();
        }
    }
}

/// Parse arguments, register suites, run them, and exit the process.
pub fn main(register: impl FnOnce(&Framework<'static>) -> Result<(), EngineError>) -> ! {
    logging::init();
    let code = run_cli(&Cli::parse(), register);
    std::process::exit(code)
}

/// Everything [`main`] does except parsing and exiting. Returns an exit code.
pub fn run_cli(
    cli: &Cli,
    register: impl FnOnce(&Framework<'static>) -> Result<(), EngineError>,
) -> i32 {
    match execute(cli, register) {
        Ok(aggregate) if aggregate.success() => exit_codes::OK,
        Ok(_) => exit_codes::FAILED,
        Err(err) => {
            eprintln!("{err:#}");
            exit_codes::INVALID
        }
    }
}

fn execute(
    cli: &Cli,
    register: impl FnOnce(&Framework<'static>) -> Result<(), EngineError>,
) -> Result<AggregatedResult> {
    let config = cli.resolve_config()?;
    let framework = Framework::new(config);
    register(&framework).context("register suites")?;
    let outcome = framework.run().context("run suites")?;
    let aggregate = outcome.aggregate;
    if cli.json {
        println!("{}", aggregate.to_json()?);
    } else {
        println!("{}", summary_line(&aggregate));
    }
    Ok(aggregate)
}

fn summary_line(aggregate: &AggregatedResult) -> String {
    let mut line = format!(
        "tests: {} passed, {} failed, {} skipped; suites: {} passed, {} failed, {} skipped",
        aggregate.tests_passed,
        aggregate.tests_failed,
        aggregate.tests_skipped,
        aggregate.suites_passed,
        aggregate.suites_failed,
        aggregate.suites_skipped,
    );
    if let Some(snapshots) = aggregate.snapshots {
        line.push_str(&format!(
            "; snapshots: {} added, {} updated, {} removed, {} total",
            snapshots.added, snapshots.updated, snapshots.removed, snapshots.total
        ));
    }
    line
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;
    use std::fs;

    use super::*;
    use crate::io::config::write_config;
    use crate::test_support::TestProject;

    #[test]
    fn parses_flags() {
        let cli = Cli::try_parse_from(["treetest", "-u", "--snapshot-dir", "snaps", "--json"])
            .expect("parse");
        assert!(cli.update_snapshots);
        assert_eq!(cli.snapshot_dir, Some(PathBuf::from("snaps")));
        assert!(cli.json);
        assert!(cli.config.is_none());
    }

    #[test]
    fn flags_override_config_file() {
        let project = TestProject::new().expect("project");
        let path = project.path().join("treetest.toml");
        let mut stored = project.config();
        stored.max_num_mock_calls = 5;
        write_config(&path, &stored).expect("write config");

        let args = [
            OsString::from("treetest"),
            OsString::from("--update-snapshots"),
            OsString::from("--config"),
            path.clone().into_os_string(),
        ];
        let cli = Cli::try_parse_from(args).expect("parse");
        let config = cli.resolve_config().expect("config");
        assert!(config.update_snapshots);
        assert_eq!(config.max_num_mock_calls, 5);
        assert_eq!(config.project_dir, project.path());
    }

    #[test]
    fn invalid_config_file_is_reported() {
        let project = TestProject::new().expect("project");
        let path = project.path().join("treetest.toml");
        fs::write(&path, "max_num_mock_calls = 0\n").expect("write");
        let cli = Cli {
            update_snapshots: false,
            snapshot_dir: None,
            config: Some(path),
            json: false,
        };
        assert_eq!(run_cli(&cli, |_| Ok(())), exit_codes::INVALID);
    }

    #[test]
    fn exit_code_reflects_outcome() {
        let project = TestProject::new().expect("project");
        let path = project.path().join("treetest.toml");
        write_config(&path, &project.config()).expect("write config");
        let cli = Cli {
            update_snapshots: false,
            snapshot_dir: None,
            config: Some(path),
            json: true,
        };

        let passing = run_cli(&cli, |framework| {
            framework.describe("ok", |d| {
                d.test("passes", |t| {
                    t.expect(true).to_be_true();
                });
            })
        });
        assert_eq!(passing, exit_codes::OK);

        let failing = run_cli(&cli, |framework| {
            framework.describe("bad", |d| {
                d.test("fails", |t| {
                    t.expect(1).to_equal(2);
                });
            })
        });
        assert_eq!(failing, exit_codes::FAILED);
    }

    #[test]
    fn summary_line_includes_snapshot_counts() {
        let mut aggregate = AggregatedResult {
            tests_passed: 2,
            tests_failed: 1,
            ..AggregatedResult::default()
        };
        assert_eq!(
            summary_line(&aggregate),
            "tests: 2 passed, 1 failed, 0 skipped; suites: 0 passed, 0 failed, 0 skipped"
        );
        aggregate.snapshots = Some(crate::core::aggregate::SnapshotSummary {
            added: 1,
            total: 1,
            ..Default::default()
        });
        assert!(summary_line(&aggregate).ends_with("snapshots: 1 added, 0 updated, 0 removed, 1 total"));
    }
}
