// Entrypoint for the CLI application.
// - Installs logging (RUST_LOG, default `warn`) on stderr.
// - Resolves credentials from the environment or the credentials file,
//   prompting when neither has them, then hands the client to the menu.
// - Pass `--json` to print raw payloads instead of tables.

use tonie_cli::credentials::{default_sources, resolve_credentials};
use tonie_cli::{ui, ClientSettings, TonieClient, TonieError};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let json = std::env::args().skip(1).any(|a| a == "--json");

    let credentials = match resolve_credentials(&default_sources()) {
        Ok(creds) => creds,
        Err(TonieError::Authentication(details)) => {
            tracing::warn!(reason = %details.message, "no usable stored credentials");
            ui::prompt_credentials()?
        }
        Err(e) => return Err(e.into()),
    };

    let api = TonieClient::with_settings(credentials, ClientSettings::from_env())?;
    ui::main_menu(api, json)?;
    Ok(())
}
