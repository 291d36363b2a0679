use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Registry, prelude::*};

#[derive(Debug, Clone, Copy, Default)]
pub struct LogOptions {
    /// Lower the default level from `info` to `trace`.
    pub verbose: bool,
    /// One JSON object per line instead of human-readable text.
    pub json:    bool,
}

/// Install the global subscriber. Logs go to stderr.
///
/// `RUST_LOG` takes precedence over the level chosen by `verbose`.
pub fn setup_logger(opts: LogOptions) -> Result<(), TryInitError> {
    let filter = get_env_filter(default_env_filter(opts.verbose));
    let layer: Box<dyn tracing_subscriber::layer::Layer<Registry> + Send + Sync> = if opts.json {
        Box::new(
            tracing_subscriber::fmt::Layer::new()
                .json()
                .with_writer(std::io::stderr)
                .with_filter(filter),
        )
    } else {
        Box::new(
            tracing_subscriber::fmt::Layer::new()
                .with_writer(std::io::stderr)
                .with_filter(filter),
        )
    };

    tracing_subscriber::registry().with(layer).try_init()
}

/// Returns an [`EnvFilter`] from `RUST_LOG`, or `def` when it is unset.
fn get_env_filter(def: EnvFilter) -> EnvFilter {
    use std::env::{
        self,
        VarError::{NotPresent, NotUnicode},
    };
    match env::var(EnvFilter::DEFAULT_ENV) {
        Ok(s) => EnvFilter::new(s),
        Err(NotPresent) => def,
        Err(NotUnicode(_)) => EnvFilter::default(),
    }
}

fn default_env_filter(verbose: bool) -> EnvFilter {
    let level = if verbose { "trace" } else { "info" };
    let default_directives = [level, "hyper=warn", "hyper_util=warn", "h2=warn", "reqwest=warn"];
    EnvFilter::try_new(default_directives.join(",")).unwrap_or_else(|_| EnvFilter::new(level))
}

#[test]
fn test_default_env_filter() {
    let _did_not_panic = default_env_filter(false);
    let _did_not_panic = default_env_filter(true);
}
