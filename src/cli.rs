use crate::config::config::HarnessConfig;
use crate::core::registry::Suite;
use crate::scoring::harness::Harness;
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(
    author,
    version,
    about = "Grade a submission with a registered check suite",
    long_about = None
)]
pub struct Cli {
    /// Path to the submission repository
    #[arg(short, long, value_name = "PATH")]
    pub dir: Option<PathBuf>,
    /// List all checks without running them
    #[arg(short, long)]
    pub list: bool,
    /// Log check progress and print the final report
    #[arg(short, long)]
    pub verbose: bool,
    /// Report file (relative paths resolve against --dir)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
    /// JSON configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Append run events as JSON lines to this file
    #[arg(long, value_name = "FILE")]
    pub journal: Option<PathBuf>,
}

impl Cli {
    /// Defaults, then the config file, then `GRADEBOX_*` variables, then flags.
    pub fn resolve_config(&self) -> Result<HarnessConfig> {
        let base = match &self.config {
            Some(path) => HarnessConfig::load(path)?,
            None => HarnessConfig::default(),
        };
        let config = base.apply_env()?;
        let config = self.apply_flags(config);
        config.validate()?;
        Ok(config)
    }

    fn apply_flags(&self, mut config: HarnessConfig) -> HarnessConfig {
        if let Some(dir) = &self.dir {
            config.submission_dir = dir.clone();
        }
        if let Some(output) = &self.output {
            config.output_file = output.clone();
        }
        if let Some(journal) = &self.journal {
            config.journal_file = Some(journal.clone());
        }
        if self.verbose {
            config.verbose = true;
        }
        config
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "info" } else { "warn" };
    let env = env_logger::Env::default().default_filter_or(default_filter);
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init();
}

/// Entry point for grading binaries: parse the command line and run `suite`
/// with the submission directory as the working directory of every check.
pub fn run(suite: Suite) -> Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;
    init_logging(config.verbose);
    if cli.list {
        return grade(suite, true, config);
    }
    let config = enter_submission_dir(config)?;
    grade(suite, false, config)
}

/// Like [`run`] with pre-parsed arguments. The working directory is left alone.
pub fn run_with(suite: Suite, cli: Cli) -> Result<()> {
    let config = cli.resolve_config()?;
    init_logging(config.verbose);
    grade(suite, cli.list, config)
}

/// Pin every path to an absolute one, then chdir into the submission.
fn enter_submission_dir(mut config: HarnessConfig) -> Result<HarnessConfig> {
    let dir = config
        .submission_dir
        .canonicalize()
        .with_context(|| format!("invalid path: {}", config.submission_dir.display()))?;
    let cwd = std::env::current_dir().context("cannot determine working directory")?;

    config.output_file = config.resolved_output();
    if !config.output_file.is_absolute() {
        config.output_file = cwd.join(&config.output_file);
    }
    if let Some(journal) = config.journal_file.take() {
        config.journal_file = Some(if journal.is_absolute() { journal } else { cwd.join(journal) });
    }
    config.submission_dir = dir;

    std::env::set_current_dir(&config.submission_dir)
        .with_context(|| format!("cannot enter {}", config.submission_dir.display()))?;
    Ok(config)
}

fn grade(suite: Suite, list: bool, config: HarnessConfig) -> Result<()> {
    if list {
        for listing in suite.registry().listing() {
            println!("{listing}");
        }
        return Ok(());
    }

    if !config.submission_dir.is_dir() {
        anyhow::bail!("invalid path: {}", config.submission_dir.display());
    }

    let harness = Harness::new(config);
    let report = harness.run(suite).context("grading run failed")?;
    println!(
        "Output written to: {}",
        harness.config().resolved_output().display()
    );
    println!("Score: {}/{}", report.score(), report.full_score());
    Ok(())
}
