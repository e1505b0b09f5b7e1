// Payload types for the Tonie Cloud API.
// Wire names are camelCase; every struct declares the mapping once through
// serde attributes so decoding and encoding share the same table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Current account, from `GET /me`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    pub uuid: String,
    pub email: String,
}

/// Backend limits, from `GET /config`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub locales: Vec<String>,
    pub unicode_locales: Vec<String>,
    pub max_chapters: i64,
    pub max_seconds: i64,
    pub max_bytes: u64,
    pub accepts: Vec<String>,
    pub stage_warning: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paypal_client_id: Option<String>,
    pub sso_enabled: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HouseholdAccess {
    Owner,
    Member,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Household {
    pub id: String,
    pub name: String,
    pub owner_name: String,
    pub access: HouseholdAccess,
    pub can_leave: bool,
}

/// One track on a Creative Tonie.
///
/// `file` is kept as an opaque string: an uploaded file id, an existing
/// content blob, or a `ContentToken:` reference all round-trip verbatim.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Chapter {
    pub id: String,
    pub title: String,
    pub file: String,
    #[serde(default)]
    pub seconds: f64,
    #[serde(default)]
    pub transcoding: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreativeTonie {
    pub id: String,
    pub household_id: String,
    pub name: String,
    pub image_url: String,
    pub seconds_remaining: f64,
    pub seconds_present: f64,
    pub chapters_remaining: i64,
    pub chapters_present: i64,
    pub transcoding: bool,
    #[serde(default)]
    pub last_update: Option<DateTime<Utc>>,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
}

impl CreativeTonie {
    /// A snapshot whose counter disagrees with its chapter list is stale.
    pub fn is_consistent(&self) -> bool {
        usize::try_from(self.chapters_present).map_or(false, |n| n == self.chapters.len())
    }

    pub fn chapter(&self, id: &str) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.id == id)
    }
}

/// Pre-signed object-storage POST policy. `fields` must be submitted as-is.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UploadRequestDetails {
    pub url: String,
    pub fields: HashMap<String, String>,
}

/// Response of `POST /file`; single use.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileUploadRequest {
    pub file_id: String,
    pub request: UploadRequestDetails,
}

/// Chapter as sent back in a PATCH: only the identifying fields.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChapterRef {
    pub id: String,
    pub title: String,
    pub file: String,
}

impl From<&Chapter> for ChapterRef {
    fn from(chapter: &Chapter) -> Self {
        ChapterRef {
            id: chapter.id.clone(),
            title: chapter.title.clone(),
            file: chapter.file.clone(),
        }
    }
}

/// Partial update for `PATCH /households/{hid}/creativetonies/{tid}`.
/// Unset fields are left out of the body and keep their server value.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct CreativeTonieUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapters: Option<Vec<ChapterRef>>,
}

/// Body for `POST .../chapters`.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct NewChapter {
    pub title: String,
    pub file: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_tonie() -> serde_json::Value {
        json!({
            "id": "CF1",
            "householdId": "h1",
            "name": "Bedtime",
            "imageUrl": "https://example.com/t.png",
            "secondsRemaining": 5000.0,
            "secondsPresent": 400.0,
            "chaptersRemaining": 97,
            "chaptersPresent": 2,
            "transcoding": false,
            "lastUpdate": "2024-01-15T10:30:00Z",
            "chapters": [
                {"id": "c1", "title": "One", "file": "ContentToken:abc123", "seconds": 200.0, "transcoding": false},
                {"id": "c2", "title": "Two", "file": "file-2", "seconds": 200.0, "transcoding": false}
            ]
        })
    }

    #[test]
    fn parses_creative_tonie() {
        let tonie: CreativeTonie = serde_json::from_value(sample_tonie()).unwrap();
        assert_eq!(tonie.household_id, "h1");
        assert_eq!(tonie.chapters.len(), 2);
        assert!(tonie.last_update.is_some());
        assert!(tonie.is_consistent());
        assert_eq!(tonie.chapter("c2").map(|c| c.file.as_str()), Some("file-2"));
    }

    #[test]
    fn missing_last_update_is_none() {
        let mut value = sample_tonie();
        value.as_object_mut().unwrap().remove("lastUpdate");
        let tonie: CreativeTonie = serde_json::from_value(value).unwrap();
        assert_eq!(tonie.last_update, None);
    }

    #[test]
    fn stale_snapshot_is_inconsistent() {
        let mut value = sample_tonie();
        value["chaptersPresent"] = json!(3);
        let tonie: CreativeTonie = serde_json::from_value(value).unwrap();
        assert!(!tonie.is_consistent());
    }

    #[test]
    fn config_tolerates_missing_paypal_id() {
        let config: Config = serde_json::from_value(json!({
            "locales": ["de", "en"],
            "unicodeLocales": ["de-DE", "en-US"],
            "maxChapters": 99,
            "maxSeconds": 5400,
            "maxBytes": 536870912,
            "accepts": ["audio/mpeg"],
            "stageWarning": false,
            "ssoEnabled": true
        }))
        .unwrap();
        assert_eq!(config.max_bytes, 536_870_912);
        assert_eq!(config.paypal_client_id, None);
    }

    #[test]
    fn household_access_is_lowercase() {
        let household: Household = serde_json::from_value(json!({
            "id": "h1", "name": "Home", "ownerName": "Sam", "access": "member", "canLeave": true
        }))
        .unwrap();
        assert_eq!(household.access, HouseholdAccess::Member);
        assert_eq!(serde_json::to_value(&household).unwrap()["ownerName"], "Sam");
    }

    #[test]
    fn content_token_survives_update_body() {
        let tonie: CreativeTonie = serde_json::from_value(sample_tonie()).unwrap();
        let update = CreativeTonieUpdate {
            chapters: Some(tonie.chapters.iter().map(ChapterRef::from).collect()),
            ..Default::default()
        };
        let body = serde_json::to_string(&update).unwrap();
        assert!(body.contains(r#""file":"ContentToken:abc123""#));
        assert!(!body.contains("name"));
    }

    #[test]
    fn upload_request_uses_file_id_alias() {
        let req: FileUploadRequest = serde_json::from_value(json!({
            "fileId": "f-1",
            "request": {"url": "https://bucket", "fields": {"key": "uploads/f-1.mp3", "policy": "p"}}
        }))
        .unwrap();
        assert_eq!(req.file_id, "f-1");
        assert_eq!(req.request.fields["key"], "uploads/f-1.mp3");
    }
}
