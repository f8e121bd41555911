//! Demonstration suite exercising every verdict the engine can produce.
//!
//! Run it against any directory: `gradebox-selftest -d . -v`.

use anyhow::{Context, Result};
use gradebox::{CheckSpec, Outcome, Suite};
use std::time::Duration;

fn suite() -> Suite {
    let mut suite = Suite::new();
    suite
        .expect_file("Cargo.toml")
        .register_init(|| {
            log::info!("selftest init");
            Ok(())
        })
        .register_check(
            CheckSpec::new("builds", 5, || Ok(Outcome::Pass)).description("trivially passes"),
        )
        .register_check(
            CheckSpec::new("runs", 5, || Ok(Outcome::Pass))
                .description("passes once builds passed")
                .depends_on("builds"),
        )
        .register_check(
            CheckSpec::new("manifest", 5, || {
                let raw = std::fs::read_to_string("Cargo.toml").context("reading Cargo.toml")?;
                if raw.contains("[package]") {
                    Ok(Outcome::Pass)
                } else {
                    Ok(Outcome::fail("Cargo.toml has no [package] table"))
                }
            })
            .description("reads the submission manifest")
            .requires_file("Cargo.toml"),
        )
        .register_check(
            CheckSpec::new("edge_cases", 10, || {
                Ok(Outcome::partial(6, "two edge cases failed"))
            })
            .description("awards partial credit"),
        )
        .register_check(
            CheckSpec::new("hangs", 10, || {
                std::thread::sleep(Duration::from_secs(5));
                Ok(Outcome::Pass)
            })
            .description("overruns its timeout")
            .timeout(Duration::from_secs(1)),
        )
        .register_check(
            CheckSpec::new("crashes", 5, || -> Result<Outcome> {
                let values: Vec<u32> = Vec::new();
                Ok(Outcome::points(values[3]))
            })
            .description("panics inside the body"),
        )
        .register_check(
            CheckSpec::new("after_crash", 5, || Ok(Outcome::Pass))
                .description("skipped because crashes did not pass")
                .depends_on("crashes"),
        );
    suite
}

fn main() -> Result<()> {
    gradebox::cli::run(suite())
}
