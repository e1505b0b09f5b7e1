// API client module: a blocking HTTP client for the Tonie Cloud API.
// It owns the token session, maps every response through the error
// classifier and implements the three-step audio upload
// (request slot, post to storage, add chapter).

use crate::error::{check_response, ErrorDetails, Result, TonieError};
use crate::models::{
    ChapterRef, Config, CreativeTonie, CreativeTonieUpdate, FileUploadRequest, Household,
    NewChapter, User,
};
use crate::session::{Credentials, TokenSession};
use crate::settings::ClientSettings;
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::blocking::{multipart, Client, Response};
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use tracing::{debug, warn};

/// Client for one account. Calls take `&mut self` because the first
/// authenticated request acquires the token; share across threads only
/// behind your own lock.
#[derive(Debug)]
pub struct TonieClient {
    http: Client,
    base_url: String,
    session: TokenSession,
    upload_limit: Option<u64>,
}

impl TonieClient {
    /// Client against the production endpoints.
    pub fn new(credentials: Credentials) -> Result<Self> {
        Self::with_settings(credentials, ClientSettings::default())
    }

    /// Fails fast on empty credentials; no request is made until first use.
    pub fn with_settings(credentials: Credentials, settings: ClientSettings) -> Result<Self> {
        if !credentials.is_complete() {
            return Err(TonieError::authentication("username and password are required"));
        }
        let mut builder = Client::builder();
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;
        let session = TokenSession::new(http.clone(), &settings, credentials);
        Ok(TonieClient {
            http,
            base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            session,
            upload_limit: settings.max_upload_bytes,
        })
    }

    pub fn session(&self) -> &TokenSession {
        &self.session
    }

    /// Force the password grant now instead of on the first request.
    pub fn acquire_token(&mut self) -> Result<()> {
        self.session.acquire_token()
    }

    fn send(&mut self, method: Method, path: &str, body: Option<&impl serde::Serialize>) -> Result<Response> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, path, "api request");
        let mut req = self.http.request(method, &url);
        if let Some(body) = body {
            req = req.json(body);
        }
        let req = self.session.authorize(req)?;
        check_response(req.send()?)
    }

    fn get_json<T: DeserializeOwned>(&mut self, path: &str) -> Result<T> {
        let res = self.send(Method::GET, path, None::<&()>)?;
        parse_json(res)
    }

    pub fn get_me(&mut self) -> Result<User> {
        self.get_json("/me")
    }

    pub fn get_config(&mut self) -> Result<Config> {
        self.get_json("/config")
    }

    pub fn get_households(&mut self) -> Result<Vec<Household>> {
        self.get_json("/households")
    }

    /// Id of the first household on the account.
    pub fn first_household_id(&mut self) -> Result<String> {
        self.get_households()?
            .into_iter()
            .next()
            .map(|h| h.id)
            .ok_or_else(|| TonieError::not_found("no households found"))
    }

    pub fn get_creative_tonies(&mut self, household_id: &str) -> Result<Vec<CreativeTonie>> {
        self.get_json(&format!("/households/{household_id}/creativetonies"))
    }

    pub fn get_creative_tonie(&mut self, household_id: &str, tonie_id: &str) -> Result<CreativeTonie> {
        self.get_json(&tonie_path(household_id, tonie_id))
    }

    /// PATCH with only the fields set in `update`.
    pub fn update_creative_tonie(
        &mut self,
        household_id: &str,
        tonie_id: &str,
        update: &CreativeTonieUpdate,
    ) -> Result<CreativeTonie> {
        let res = self.send(Method::PATCH, &tonie_path(household_id, tonie_id), Some(update))?;
        checked_snapshot(parse_json(res)?)
    }

    pub fn rename_creative_tonie(
        &mut self,
        household_id: &str,
        tonie_id: &str,
        name: &str,
    ) -> Result<CreativeTonie> {
        let update = CreativeTonieUpdate {
            name: Some(name.to_string()),
            ..Default::default()
        };
        self.update_creative_tonie(household_id, tonie_id, &update)
    }

    /// Append one chapter referencing an uploaded file id (or content token).
    pub fn add_chapter(
        &mut self,
        household_id: &str,
        tonie_id: &str,
        file_id: &str,
        title: &str,
    ) -> Result<CreativeTonie> {
        let body = NewChapter {
            title: title.to_string(),
            file: file_id.to_string(),
        };
        let path = format!("{}/chapters", tonie_path(household_id, tonie_id));
        let res = self.send(Method::POST, &path, Some(&body))?;
        checked_snapshot(parse_json(res)?)
    }

    /// Configured upload limit, else `Config.maxBytes` read fresh from `/config`.
    pub fn upload_limit(&mut self) -> Result<u64> {
        match self.upload_limit {
            Some(limit) => Ok(limit),
            None => Ok(self.get_config()?.max_bytes),
        }
    }

    /// Ask for a one-time pre-signed storage slot. Oversized files are
    /// rejected locally before the slot is requested.
    pub fn request_file_upload(&mut self, file_name: &str, file_size: u64) -> Result<FileUploadRequest> {
        let limit = self.upload_limit()?;
        if file_size > limit {
            return Err(TonieError::validation(format!(
                "{file_name} is {file_size} bytes, limit is {limit} bytes"
            )));
        }
        debug!(file_name, file_size, "requesting upload slot");
        let res = self.send(Method::POST, "/file", None::<&()>)?;
        parse_json(res)
    }

    /// POST the file to object storage with the server-issued policy fields.
    pub fn upload_to_s3(&self, file_path: &Path, upload: &FileUploadRequest) -> Result<()> {
        if !file_path.is_file() {
            return Err(TonieError::validation(format!(
                "file not found: {}",
                file_path.display()
            )));
        }
        let key = upload
            .request
            .fields
            .get("key")
            .cloned()
            .ok_or_else(|| TonieError::validation("upload policy has no key field"))?;

        let open_err = |e: std::io::Error| TonieError::validation(format!("cannot open {}: {e}", file_path.display()));
        let file = File::open(file_path).map_err(open_err)?;
        let len = file.metadata().map_err(open_err)?.len();

        // Policy fields first; storage backends read the file part last.
        // Keys contain '/', which must reach the backend unescaped.
        let mut form = multipart::Form::new().percent_encode_noop();
        for (name, value) in &upload.request.fields {
            form = form.text(name.clone(), value.clone());
        }
        // A sized part lets the form send Content-Length; storage refuses chunked bodies.
        let part = multipart::Part::reader_with_length(file, len).file_name(key);
        form = form.part("file", part);

        debug!(file_id = %upload.file_id, "uploading to storage");
        let res = self.http.post(&upload.request.url).multipart(form).send()?;
        let status = res.status();
        if !(status.is_success() || status.is_redirection()) {
            return Err(TonieError::Server(ErrorDetails {
                message: format!("storage upload failed (HTTP {})", status.as_u16()),
                status: Some(status.as_u16()),
                body: res.text().ok().filter(|b| !b.is_empty()),
                retry_after: None,
            }));
        }
        debug!(file_id = %upload.file_id, "upload complete");
        Ok(())
    }

    /// Request slot, upload, add chapter. If the last step fails the stored
    /// object is orphaned; retry the whole call, each call gets a new slot.
    pub fn upload_audio_file(
        &mut self,
        file_path: &Path,
        household_id: &str,
        tonie_id: &str,
        title: Option<&str>,
    ) -> Result<CreativeTonie> {
        let meta = std::fs::metadata(file_path)
            .ok()
            .filter(|m| m.is_file())
            .ok_or_else(|| TonieError::validation(format!("file not found: {}", file_path.display())))?;
        let file_name = file_path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("audio");
        let title = match title {
            Some(t) => t.to_string(),
            None => default_title(file_path),
        };

        let upload = self.request_file_upload(file_name, meta.len())?;
        self.upload_to_s3(file_path, &upload)?;
        self.add_chapter(household_id, tonie_id, &upload.file_id, &title)
    }

    /// Replace the chapter order with a uniformly random permutation.
    pub fn shuffle_chapters(&mut self, household_id: &str, tonie_id: &str) -> Result<CreativeTonie> {
        let tonie = self.get_creative_tonie(household_id, tonie_id)?;
        if tonie.chapters.len() < 2 {
            return Ok(tonie);
        }
        let chapters = shuffled_refs(&tonie, &mut rand::thread_rng());
        self.patch_chapters(household_id, tonie_id, chapters)
    }

    /// Remove every chapter. Irreversible.
    pub fn clear_chapters(&mut self, household_id: &str, tonie_id: &str) -> Result<CreativeTonie> {
        self.patch_chapters(household_id, tonie_id, Vec::new())
    }

    /// Keep exactly `chapter_ids`, in that order. Unknown ids fail with
    /// `NotFound` before anything is sent.
    pub fn set_chapters<S: AsRef<str>>(
        &mut self,
        household_id: &str,
        tonie_id: &str,
        chapter_ids: &[S],
    ) -> Result<CreativeTonie> {
        let tonie = self.get_creative_tonie(household_id, tonie_id)?;
        let chapters = select_chapters(&tonie, chapter_ids)?;
        self.patch_chapters(household_id, tonie_id, chapters)
    }

    fn patch_chapters(
        &mut self,
        household_id: &str,
        tonie_id: &str,
        chapters: Vec<ChapterRef>,
    ) -> Result<CreativeTonie> {
        let update = CreativeTonieUpdate {
            chapters: Some(chapters),
            ..Default::default()
        };
        self.update_creative_tonie(household_id, tonie_id, &update)
    }
}

fn tonie_path(household_id: &str, tonie_id: &str) -> String {
    format!("/households/{household_id}/creativetonies/{tonie_id}")
}

fn parse_json<T: DeserializeOwned>(res: Response) -> Result<T> {
    let body = res.bytes()?;
    Ok(serde_json::from_slice(&body)?)
}

fn checked_snapshot(tonie: CreativeTonie) -> Result<CreativeTonie> {
    if !tonie.is_consistent() {
        warn!(
            tonie_id = %tonie.id,
            chapters_present = tonie.chapters_present,
            chapters = tonie.chapters.len(),
            "stale tonie snapshot, re-fetch before further edits"
        );
    }
    Ok(tonie)
}

fn default_title(file_path: &Path) -> String {
    file_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Chapter")
        .to_string()
}

pub(crate) fn shuffled_refs<R: Rng + ?Sized>(tonie: &CreativeTonie, rng: &mut R) -> Vec<ChapterRef> {
    let mut chapters: Vec<ChapterRef> = tonie.chapters.iter().map(ChapterRef::from).collect();
    chapters.shuffle(rng);
    chapters
}

pub(crate) fn select_chapters<S: AsRef<str>>(tonie: &CreativeTonie, ids: &[S]) -> Result<Vec<ChapterRef>> {
    let mut seen = HashSet::new();
    ids.iter()
        .map(|id| {
            let id = id.as_ref();
            if !seen.insert(id) {
                return Err(TonieError::validation(format!("chapter {id} listed twice")));
            }
            tonie
                .chapter(id)
                .map(ChapterRef::from)
                .ok_or_else(|| TonieError::not_found(format!("chapter {id} not on tonie {}", tonie.id)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chapter;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    fn tonie_with(ids: &[&str]) -> CreativeTonie {
        CreativeTonie {
            id: "CF1".into(),
            household_id: "h1".into(),
            name: "Test".into(),
            image_url: String::new(),
            seconds_remaining: 0.0,
            seconds_present: 0.0,
            chapters_remaining: 99,
            chapters_present: ids.len() as i64,
            transcoding: false,
            last_update: None,
            chapters: ids
                .iter()
                .map(|id| Chapter {
                    id: id.to_string(),
                    title: format!("title {id}"),
                    file: format!("ContentToken:{id}"),
                    seconds: 10.0,
                    transcoding: false,
                })
                .collect(),
        }
    }

    #[test]
    fn shuffle_keeps_chapter_set() {
        let tonie = tonie_with(&["a", "b", "c", "d"]);
        let mut rng = StdRng::seed_from_u64(7);
        let mut out = shuffled_refs(&tonie, &mut rng);
        out.sort_by(|x, y| x.id.cmp(&y.id));
        let expected: Vec<ChapterRef> = tonie.chapters.iter().map(ChapterRef::from).collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn shuffle_is_roughly_uniform() {
        let tonie = tonie_with(&["a", "b", "c"]);
        let mut rng = StdRng::seed_from_u64(42);
        let runs = 6000;
        let mut counts: HashMap<String, usize> = HashMap::new();
        for _ in 0..runs {
            let order: String = shuffled_refs(&tonie, &mut rng).iter().map(|c| c.id.as_str()).collect();
            *counts.entry(order).or_default() += 1;
        }
        assert_eq!(counts.len(), 6);
        // Expected 1000 each; the bound is far outside normal variance.
        for (order, n) in counts {
            assert!((800..=1200).contains(&n), "{order} seen {n} times");
        }
    }

    #[test]
    fn select_keeps_caller_order() {
        let tonie = tonie_with(&["a", "b", "c"]);
        let picked = select_chapters(&tonie, &["c", "a"]).unwrap();
        let ids: Vec<&str> = picked.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["c", "a"]);
        assert_eq!(picked[0].file, "ContentToken:c");
    }

    #[test]
    fn select_rejects_unknown_and_duplicate_ids() {
        let tonie = tonie_with(&["a", "b"]);
        assert!(matches!(select_chapters(&tonie, &["a", "zz"]), Err(TonieError::NotFound(_))));
        assert!(matches!(select_chapters(&tonie, &["a", "a"]), Err(TonieError::Validation(_))));
    }

    #[test]
    fn default_title_strips_extension() {
        assert_eq!(default_title(Path::new("/music/Lullaby.mp3")), "Lullaby");
        assert_eq!(default_title(Path::new("story")), "story");
    }

    #[test]
    fn empty_credentials_fail_fast() {
        let err = TonieClient::new(Credentials::new("", "")).unwrap_err();
        assert!(matches!(err, TonieError::Authentication(_)));
    }
}
