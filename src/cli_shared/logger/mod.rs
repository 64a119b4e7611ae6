// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::str::FromStr as _;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::Layered;
use tracing_subscriber::{EnvFilter, Registry, prelude::*, reload};

use crate::cli_shared::cli::LogConfig;
use crate::utils::misc::LoggingColor;

type Filtered = Layered<reload::Layer<EnvFilter, Registry>, Registry>;

/// Targets `LogSetLevelRegex` can match besides those that already carry a directive.
const KNOWN_TARGETS: &[&str] = &[
    "lily",
    "lily::chain",
    "lily::cli",
    "lily::daemon",
    "lily::datasource",
    "lily::indexer",
    "lily::jobs",
    "lily::queue",
    "lily::rpc",
    "lily::schedule",
    "lily::storage",
    "lily::tasks",
    "jsonrpsee",
    "hyper",
    "sqlx",
];

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("invalid level {0:?}")]
    InvalidLevel(String),
    #[error(transparent)]
    InvalidRegex(#[from] regex::Error),
    #[error(transparent)]
    InvalidDirective(#[from] tracing_subscriber::filter::ParseError),
    #[error("failed to reload log filter: {0}")]
    Reload(#[from] reload::Error),
}

#[derive(Debug)]
struct Directives {
    /// Directives the filter starts from, `RUST_LOG` when set.
    base: String,
    targets: BTreeMap<String, LevelFilter>,
}

impl Directives {
    fn to_filter_string(&self) -> String {
        std::iter::once(self.base.clone())
            .chain(
                self.targets
                    .iter()
                    .map(|(target, level)| format!("{target}={level}")),
            )
            .filter(|it| !it.is_empty())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Changes the active log filter at runtime.
#[derive(Clone)]
pub struct LogHandle {
    reload: Option<reload::Handle<EnvFilter, Registry>>,
    directives: Arc<Mutex<Directives>>,
}

impl LogHandle {
    /// A handle that tracks directives without a subscriber behind it.
    pub fn detached(base: &str, config: &LogConfig) -> Self {
        Self {
            reload: None,
            directives: Arc::new(Mutex::new(Directives {
                base: base.to_owned(),
                targets: config
                    .filters
                    .iter()
                    .map(|f| (f.module.clone(), f.level))
                    .collect(),
            })),
        }
    }

    pub fn filter(&self) -> Result<EnvFilter, LogError> {
        Ok(EnvFilter::builder().parse(self.directives.lock().to_filter_string())?)
    }

    /// The active directives, base directives first.
    pub fn list(&self) -> Vec<String> {
        let directives = self.directives.lock();
        directives
            .base
            .split(',')
            .filter(|it| !it.is_empty())
            .map(str::to_owned)
            .chain(
                directives
                    .targets
                    .iter()
                    .map(|(target, level)| format!("{target}={level}")),
            )
            .collect()
    }

    pub fn set_level(&self, target: &str, level: &str) -> Result<(), LogError> {
        let level = parse_level(level)?;
        self.apply(|targets| {
            targets.insert(target.to_owned(), level);
        })
    }

    /// Sets `level` on every known target matching `pattern` and returns how many changed.
    pub fn set_level_regex(&self, pattern: &str, level: &str) -> Result<usize, LogError> {
        let level = parse_level(level)?;
        let regex = regex::Regex::new(pattern)?;
        let mut changed = 0;
        self.apply(|targets| {
            let known: BTreeSet<String> = KNOWN_TARGETS
                .iter()
                .map(|it| it.to_string())
                .chain(targets.keys().cloned())
                .filter(|it| regex.is_match(it))
                .collect();
            for target in known {
                if targets.insert(target, level).is_none_or(|old| old != level) {
                    changed += 1;
                }
            }
        })?;
        Ok(changed)
    }

    fn apply(&self, change: impl FnOnce(&mut BTreeMap<String, LevelFilter>)) -> Result<(), LogError> {
        let mut directives = self.directives.lock();
        let mut targets = directives.targets.clone();
        change(&mut targets);
        let candidate = Directives {
            base: directives.base.clone(),
            targets,
        };
        let filter = EnvFilter::builder().parse(candidate.to_filter_string())?;
        if let Some(reload) = &self.reload {
            reload.reload(filter)?;
        }
        *directives = candidate;
        Ok(())
    }
}

fn parse_level(level: &str) -> Result<LevelFilter, LogError> {
    LevelFilter::from_str(level).map_err(|_| LogError::InvalidLevel(level.to_owned()))
}

/// Installs the global subscriber: a console layer and, with `log_dir`, hourly rolling files.
/// Both share one reloadable filter.
pub fn setup_logger(color: LoggingColor, log_dir: Option<&Path>, config: &LogConfig) -> LogHandle {
    let mut handle = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(env) => LogHandle::detached(&env, &LogConfig { filters: vec![] }),
        Err(_) => LogHandle::detached("info", config),
    };
    let filter = handle.filter().unwrap_or_else(|e| {
        eprintln!("ignoring invalid log filter: {e}");
        EnvFilter::new("info")
    });
    let (filter, reload) = reload::Layer::new(filter);
    handle.reload = Some(reload);

    let mut layers: Vec<Box<dyn tracing_subscriber::layer::Layer<Filtered> + Send + Sync>> =
        // console logger
        vec![Box::new(
            tracing_subscriber::fmt::Layer::new().with_ansi(color.coloring_enabled()),
        )];

    // file logger
    if let Some(log_dir) = log_dir {
        let file_appender = tracing_appender::rolling::hourly(log_dir, "lily.log");
        layers.push(Box::new(
            tracing_subscriber::fmt::Layer::new()
                .with_ansi(false)
                .with_writer(file_appender),
        ));
    }

    if tracing_subscriber::registry()
        .with(filter)
        .with(layers)
        .try_init()
        .is_err()
    {
        tracing::debug!("global subscriber already installed");
    }
    handle
}

/// Log warnings to stderr. Used by commands that talk to a daemon.
pub fn setup_minimal_logger() {
    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(s) => EnvFilter::new(s),
        Err(_) => EnvFilter::new("warn"),
    };
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::Layer::new()
                .with_ansi(LoggingColor::Auto.coloring_enabled())
                .with_writer(std::io::stderr)
                .with_filter(filter),
        )
        .try_init();
}
