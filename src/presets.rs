// Presets: named lists of actions (shuffle, clear, upload) kept in a YAML
// file and replayed against a household. A failing action is recorded and
// the run moves on to the next one.

use crate::api::TonieClient;
use crate::error::TonieError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Target value that applies an action to every Creative Tonie.
pub const ALL_TONIES: &str = "all";

#[derive(Debug, Error)]
pub enum PresetError {
    #[error("preset '{0}' not found")]
    NotFound(String),
    #[error("cannot access preset file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid preset file: {0}")]
    Parse(#[from] serde_yaml_ng::Error),
    #[error("{0}")]
    Action(String),
    #[error(transparent)]
    Api(#[from] TonieError),
}

pub type PresetResult<T> = std::result::Result<T, PresetError>;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Preset {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub actions: Vec<PresetAction>,
}

/// One step of a preset. `kind` stays a string so an unknown type fails
/// that step at run time instead of the whole file at load time.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PresetAction {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub household: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
struct PresetFile {
    #[serde(default)]
    presets: BTreeMap<String, Preset>,
}

/// What a successful action touched, by tonie or file name.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActionOutput {
    Shuffled(Vec<String>),
    Cleared(Vec<String>),
    Uploaded(Vec<String>),
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ActionStatus {
    Success { result: ActionOutput },
    Error { error: String },
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ActionReport {
    pub action: String,
    pub target: Option<String>,
    #[serde(flatten)]
    pub status: ActionStatus,
}

impl ActionReport {
    pub fn is_success(&self) -> bool {
        matches!(self.status, ActionStatus::Success { .. })
    }
}

/// `<config_dir>/tonie-api/presets.yaml`, if a config dir exists.
pub fn default_presets_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tonie-api").join("presets.yaml"))
}

/// The preset file on disk. A missing file reads as no presets.
#[derive(Debug, Clone)]
pub struct PresetStore {
    path: PathBuf,
}

impl PresetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        PresetStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> PresetResult<BTreeMap<String, Preset>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path).map_err(|source| self.io_error(source))?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        let file: PresetFile = serde_yaml_ng::from_str(&content)?;
        Ok(file.presets)
    }

    pub fn save(&self, presets: &BTreeMap<String, Preset>) -> PresetResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }
        let file = PresetFile {
            presets: presets.clone(),
        };
        let content = serde_yaml_ng::to_string(&file)?;
        fs::write(&self.path, content).map_err(|source| self.io_error(source))
    }

    pub fn get(&self, name: &str) -> PresetResult<Preset> {
        self.load()?
            .remove(name)
            .ok_or_else(|| PresetError::NotFound(name.to_string()))
    }

    /// Add or replace a preset.
    pub fn create(&self, name: &str, description: &str, actions: Vec<PresetAction>) -> PresetResult<()> {
        let mut presets = self.load()?;
        presets.insert(
            name.to_string(),
            Preset {
                description: description.to_string(),
                actions,
            },
        );
        self.save(&presets)
    }

    pub fn delete(&self, name: &str) -> PresetResult<()> {
        let mut presets = self.load()?;
        if presets.remove(name).is_none() {
            return Err(PresetError::NotFound(name.to_string()));
        }
        self.save(&presets)
    }

    fn io_error(&self, source: std::io::Error) -> PresetError {
        PresetError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

/// Load `name` from `store` and run it.
pub fn run_named_preset(
    api: &mut TonieClient,
    store: &PresetStore,
    name: &str,
) -> PresetResult<Vec<ActionReport>> {
    let preset = store.get(name)?;
    run_preset(api, &preset)
}

/// Run every action; actions without a `household` use the first one.
/// Only failing to resolve that default household aborts the run.
pub fn run_preset(api: &mut TonieClient, preset: &Preset) -> PresetResult<Vec<ActionReport>> {
    let default_household = api.first_household_id()?;
    Ok(run_actions(api, &default_household, &preset.actions))
}

pub fn run_actions(
    api: &mut TonieClient,
    default_household: &str,
    actions: &[PresetAction],
) -> Vec<ActionReport> {
    actions
        .iter()
        .enumerate()
        .map(|(i, action)| {
            let household = action.household.as_deref().unwrap_or(default_household);
            debug!(step = i + 1, kind = %action.kind, "running preset action");
            let status = match execute(api, household, action) {
                Ok(result) => ActionStatus::Success { result },
                Err(e) => {
                    warn!(step = i + 1, kind = %action.kind, error = %e, "preset action failed");
                    ActionStatus::Error { error: e.to_string() }
                }
            };
            ActionReport {
                action: action.kind.clone(),
                target: action.target.clone(),
                status,
            }
        })
        .collect()
}

fn execute(api: &mut TonieClient, household: &str, action: &PresetAction) -> PresetResult<ActionOutput> {
    let target = || {
        action
            .target
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| PresetError::Action(format!("{} action needs a target", action.kind)))
    };
    match action.kind.as_str() {
        "shuffle" => shuffle(api, household, target()?),
        "clear" => clear(api, household, target()?),
        "upload" => {
            let target = target()?;
            let source = action
                .source
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| PresetError::Action("upload action needs a source".into()))?;
            upload(api, household, target, source)
        }
        other => Err(PresetError::Action(format!("unknown action type: {other}"))),
    }
}

fn shuffle(api: &mut TonieClient, household: &str, target: &str) -> PresetResult<ActionOutput> {
    if target != ALL_TONIES {
        let tonie = api.shuffle_chapters(household, target)?;
        return Ok(ActionOutput::Shuffled(vec![tonie.name]));
    }
    let mut shuffled = Vec::new();
    for tonie in api.get_creative_tonies(household)? {
        if tonie.chapters.len() >= 2 {
            api.shuffle_chapters(household, &tonie.id)?;
            shuffled.push(tonie.name);
        }
    }
    Ok(ActionOutput::Shuffled(shuffled))
}

fn clear(api: &mut TonieClient, household: &str, target: &str) -> PresetResult<ActionOutput> {
    if target != ALL_TONIES {
        let tonie = api.clear_chapters(household, target)?;
        return Ok(ActionOutput::Cleared(vec![tonie.name]));
    }
    let mut cleared = Vec::new();
    for tonie in api.get_creative_tonies(household)? {
        if !tonie.chapters.is_empty() {
            api.clear_chapters(household, &tonie.id)?;
            cleared.push(tonie.name);
        }
    }
    Ok(ActionOutput::Cleared(cleared))
}

fn upload(api: &mut TonieClient, household: &str, target: &str, source: &str) -> PresetResult<ActionOutput> {
    if target == ALL_TONIES {
        return Err(PresetError::Action("upload needs a single tonie id, not 'all'".into()));
    }
    let source = expand_home(source);
    let files = audio_files(&source)?;
    let mut uploaded = Vec::new();
    for file in files {
        api.upload_audio_file(&file, household, target, None)?;
        uploaded.push(file_name(&file));
    }
    Ok(ActionOutput::Uploaded(uploaded))
}

fn expand_home(source: &str) -> PathBuf {
    match (source.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(source),
    }
}

/// A single file, or the `.mp3`/`.m4a` files of a directory sorted by path.
fn audio_files(source: &Path) -> PresetResult<Vec<PathBuf>> {
    if source.is_file() {
        return Ok(vec![source.to_path_buf()]);
    }
    if !source.is_dir() {
        return Err(PresetError::Action(format!("source not found: {}", source.display())));
    }
    let entries = fs::read_dir(source).map_err(|e| PresetError::Io {
        path: source.to_path_buf(),
        source: e,
    })?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| matches!(p.extension().and_then(|e| e.to_str()), Some("mp3" | "m4a")))
        .collect();
    files.sort();
    Ok(files)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Credentials;
    use crate::settings::ClientSettings;

    const SAMPLE: &str = r#"
presets:
  evening:
    description: Fresh order every night
    actions:
      - type: shuffle
        target: all
      - type: upload
        target: CF1
        source: ~/audio/stories
        household: h2
  wipe:
    actions:
      - type: clear
        target: CF9
"#;

    // Nothing in these tests reaches the network; the address is unroutable.
    fn offline_client() -> TonieClient {
        let settings = ClientSettings::default()
            .with_api_base_url("http://127.0.0.1:9/v2")
            .with_token_url("http://127.0.0.1:9/token");
        TonieClient::with_settings(Credentials::new("kid@example.com", "pw"), settings).unwrap()
    }

    fn action(kind: &str, target: Option<&str>, source: Option<&str>) -> PresetAction {
        PresetAction {
            kind: kind.to_string(),
            target: target.map(str::to_string),
            household: None,
            source: source.map(str::to_string),
        }
    }

    #[test]
    fn parses_preset_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = PresetStore::new(dir.path().join("presets.yaml"));
        fs::write(store.path(), SAMPLE).unwrap();

        let presets = store.load().unwrap();
        assert_eq!(presets.len(), 2);
        let evening = &presets["evening"];
        assert_eq!(evening.description, "Fresh order every night");
        assert_eq!(evening.actions[0], action("shuffle", Some("all"), None));
        assert_eq!(evening.actions[1].household.as_deref(), Some("h2"));
        assert_eq!(presets["wipe"].description, "");
    }

    #[test]
    fn missing_or_empty_file_has_no_presets() {
        let dir = tempfile::tempdir().unwrap();
        let store = PresetStore::new(dir.path().join("presets.yaml"));
        assert!(store.load().unwrap().is_empty());
        fs::write(store.path(), "").unwrap();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn broken_yaml_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = PresetStore::new(dir.path().join("presets.yaml"));
        fs::write(store.path(), "presets: [unclosed").unwrap();
        assert!(matches!(store.load(), Err(PresetError::Parse(_))));
    }

    #[test]
    fn create_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = PresetStore::new(dir.path().join("nested").join("presets.yaml"));
        store
            .create("morning", "wake up", vec![action("clear", Some("CF1"), None)])
            .unwrap();

        let preset = store.get("morning").unwrap();
        assert_eq!(preset.description, "wake up");
        assert_eq!(preset.actions.len(), 1);

        store.delete("morning").unwrap();
        assert!(matches!(store.get("morning"), Err(PresetError::NotFound(_))));
        assert!(matches!(store.delete("morning"), Err(PresetError::NotFound(_))));
    }

    #[test]
    fn failing_actions_are_collected_not_fatal() {
        let mut api = offline_client();
        let actions = vec![
            action("explode", Some("CF1"), None),
            action("shuffle", None, None),
            action("upload", Some("CF1"), None),
            action("upload", Some("CF1"), Some("/no/such/dir")),
            action("upload", Some(ALL_TONIES), Some("/tmp")),
        ];
        let reports = run_actions(&mut api, "h1", &actions);

        assert_eq!(reports.len(), 5);
        assert!(reports.iter().all(|r| !r.is_success()));
        let errors: Vec<String> = reports
            .iter()
            .map(|r| match &r.status {
                ActionStatus::Error { error } => error.clone(),
                ActionStatus::Success { .. } => String::new(),
            })
            .collect();
        assert_eq!(errors[0], "unknown action type: explode");
        assert_eq!(errors[1], "shuffle action needs a target");
        assert_eq!(errors[2], "upload action needs a source");
        assert!(errors[3].starts_with("source not found"));
        assert!(errors[4].contains("not 'all'"));
        assert!(!api.session().has_token());
    }

    #[test]
    fn directory_source_lists_audio_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.mp3", "a.m4a", "notes.txt", "c.MP3"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        let names: Vec<String> = audio_files(dir.path())
            .unwrap()
            .iter()
            .map(|p| file_name(p))
            .collect();
        assert_eq!(names, ["a.m4a", "b.mp3"]);
    }

    #[test]
    fn report_serializes_flat() {
        let report = ActionReport {
            action: "clear".into(),
            target: Some("CF1".into()),
            status: ActionStatus::Success {
                result: ActionOutput::Cleared(vec!["Bedtime".into()]),
            },
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "action": "clear",
                "target": "CF1",
                "status": "success",
                "result": {"cleared": ["Bedtime"]}
            })
        );
    }
}
