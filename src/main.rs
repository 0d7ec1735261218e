use email_splitter::config::Config;
use email_splitter::error::PipelineError;
use email_splitter::pipeline::Pipeline;
use email_splitter::validation::dnsmx::DnsMxLookup;
use email_splitter::validation::resolver::MxResolver;
use std::error::Error;
use std::fs::File;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Email List Splitter Entry Point
///
/// Validates every address of a CSV file and splits the rows into:
/// - `GOOD_FILE`: rows whose address passed the syntax and MX checks
/// - `BAD_FILE`: rows with invalid syntax, a domain without mail servers,
///   or a lookup error
///
/// # Configuration
/// - Environment variables, loaded from `.env` file (if present); see
///   [`Config`] for the full list
/// - Log level via `RUST_LOG` (defaults to `info`)
///
/// Ctrl-C stops reading the input; rows already read are still validated and
/// written before the process exits.
#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "run failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let config = Config::from_env()?;

    let input = open(&config.input_file, |path| File::open(path))?;

    let lookup = DnsMxLookup::new(config.dns_timeout, config.dns_attempts, config.implicit_mx);
    let resolver = Arc::new(MxResolver::new(lookup, config.free_providers.clone()));
    let pipeline = Pipeline::new(config.pipeline(), resolver);

    let shutdown = pipeline.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing rows already read");
            shutdown.request();
        }
    });

    let (good_file, bad_file) = (config.good_file.clone(), config.bad_file.clone());
    let output = pipeline
        .run_with(input, move || {
            let good = open(&good_file, |path| File::create(path))?;
            let bad = open(&bad_file, |path| File::create(path))?;
            Ok((good, bad))
        })
        .await?;

    info!(
        input = %config.input_file.display(),
        good = %config.good_file.display(),
        bad = %config.bad_file.display(),
        "output written"
    );
    println!("{}", serde_json::to_string_pretty(&output.summary)?);
    Ok(())
}

fn open<F>(path: &Path, opener: F) -> Result<File, PipelineError>
where
    F: FnOnce(&Path) -> std::io::Result<File>,
{
    opener(path).map_err(|source| PipelineError::Open {
        path: path.to_path_buf(),
        source,
    })
}
