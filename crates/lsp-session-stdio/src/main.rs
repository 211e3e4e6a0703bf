//! Language server speaking LSP over stdin and stdout.
//!
//! The binary loads its configuration, installs structured logging on stderr,
//! and runs the session loop with an in-memory document store until the
//! client sends `exit` or closes the stream.

mod documents;
mod telemetry;

use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use lsp_session::{Connection, SessionError, SessionOptions};
use lsp_session_config::Config;
use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;
use tracing::info;

use crate::documents::{DocumentHandler, DocumentStore};
use crate::telemetry::TelemetryError;

const SERVER_TARGET: &str = "lsp_session_stdio";

/// Failures that stop the server before or during the session.
#[derive(Debug, Error)]
enum LaunchError {
    #[error("failed to load configuration: {0}")]
    Configuration(#[source] Arc<OrthoError>),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error("failed to prepare stdin: {0}")]
    Input(#[source] io::Error),
    #[error("session ended abnormally: {0}")]
    Session(#[from] SessionError),
}

fn main() -> ExitCode {
    match launch() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            drop(writeln!(io::stderr().lock(), "lsp-session-stdio: {error}"));
            ExitCode::FAILURE
        }
    }
}

fn launch() -> Result<(), LaunchError> {
    let config = Config::load().map_err(LaunchError::Configuration)?;
    let _telemetry = telemetry::initialise(&config)?;
    let options = session_options(&config);
    info!(
        target: SERVER_TARGET,
        max_content_length = options.max_content_length,
        reply_to_rejected = options.reply_to_rejected,
        "starting language server on stdio"
    );

    let store = serve(options)?;
    info!(
        target: SERVER_TARGET,
        open_documents = store.len(),
        "session closed"
    );
    Ok(())
}

fn session_options(config: &Config) -> SessionOptions {
    SessionOptions {
        max_content_length: config.max_content_length(),
        reply_to_rejected: config.reply_to_rejected(),
    }
}

/// Reads stdin through an unbuffered duplicate of its descriptor so that
/// `poll(2)` sees every byte not yet consumed by the frame reader.
#[cfg(unix)]
fn serve(options: SessionOptions) -> Result<DocumentStore, LaunchError> {
    use std::fs::File;
    use std::os::fd::AsFd;

    use lsp_session::PollReadiness;

    let input = io::stdin()
        .as_fd()
        .try_clone_to_owned()
        .map(File::from)
        .map_err(LaunchError::Input)?;
    let readiness = PollReadiness::new(input.try_clone().map_err(LaunchError::Input)?);
    let mut connection = Connection::with_readiness(input, io::stdout().lock(), readiness)
        .with_options(options);
    Ok(connection.run(&DocumentHandler, DocumentStore::default())?)
}

#[cfg(not(unix))]
fn serve(options: SessionOptions) -> Result<DocumentStore, LaunchError> {
    let mut connection =
        Connection::new(io::stdin().lock(), io::stdout().lock()).with_options(options);
    Ok(connection.run(&DocumentHandler, DocumentStore::default())?)
}
