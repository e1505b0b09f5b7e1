// Library root
// -----------
// Client library for the Tonie Cloud API plus the pieces the `tonie`
// binary builds on.
//
// Module responsibilities:
// - `api`: `TonieClient`, endpoint calls, the three-step audio upload and
//   the chapter helpers (shuffle, clear, set).
// - `session`: OAuth2 password grant; keeps the bearer token in memory.
// - `error`: `TonieError` and the HTTP status classifier.
// - `models`: request/response payloads with their wire names.
// - `settings`: endpoints, client id, timeout and upload limit.
// - `credentials`: explicit, environment and file credential sources.
// - `presets`: named action lists stored as YAML and replayed in bulk.
// - `output` / `ui`: terminal rendering and the interactive menu.
pub mod api;
pub mod credentials;
pub mod error;
pub mod models;
pub mod output;
pub mod presets;
pub mod session;
pub mod settings;
pub mod ui;

pub use api::TonieClient;
pub use error::{ErrorDetails, Result, TonieError};
pub use session::Credentials;
pub use settings::ClientSettings;
