//! Tonie cloud client
//!
//! Thin REST client for the Tonie cloud: password login against the Tonies
//! Keycloak realm, creative-tonie listing across all households, and the
//! two-phase chapter upload (register the file, stream it to the returned
//! Amazon S3 form, then patch the tonie's chapter list).
//!
//! Everything here is optional from the application's point of view; the
//! front ends only call in when the bootstrap capability probe reported
//! credentials.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::models::{AppError, AppResult};
use crate::core::secrets::TonieCredentials;

const TOKEN_URL: &str =
    "https://login.tonies.com/auth/realms/tonies/protocol/openid-connect/token";
const API_BASE: &str = "https://api.tonie.cloud/v2";
const CLIENT_ID: &str = "my-tonies";

#[derive(Debug, Clone, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Household {
    pub id: String,
    pub name: String,
}

/// One chapter on a creative tonie. `file` carries the cloud-side file id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TonieChapter {
    pub id: String,
    pub title: String,
    pub file: String,
    pub seconds: f64,
    pub transcoding: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreativeTonie {
    pub id: String,
    pub household_id: String,
    pub name: String,
    pub seconds_remaining: f64,
    pub seconds_present: f64,
    pub chapters_remaining: u32,
    pub chapters_present: u32,
    pub chapters: Vec<TonieChapter>,
}

#[derive(Debug, Clone, Deserialize)]
struct FileUploadRequest {
    #[serde(rename = "fileId")]
    file_id: String,
    request: PresignedPost,
}

/// Presigned Amazon S3 POST form returned by the file registration call.
#[derive(Debug, Clone, Deserialize)]
struct PresignedPost {
    url: String,
    fields: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct ChapterPatch<'a> {
    chapters: &'a [TonieChapter],
}

/// Authenticated session against the Tonie cloud.
pub struct TonieClient {
    http: reqwest::Client,
    token: String,
}

impl TonieClient {
    /// Password login. The mytonies client has no secret; the realm issues
    /// a bearer token directly.
    pub async fn login(credentials: &TonieCredentials) -> AppResult<Self> {
        let http = reqwest::Client::new();
        let params = [
            ("grant_type", "password"),
            ("client_id", CLIENT_ID),
            ("username", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
        ];
        let response = http.post(TOKEN_URL).form(&params).send().await?;
        if !response.status().is_success() {
            return Err(AppError::Tonie(format!(
                "Tonie login failed with HTTP {} (check TONIE_USERNAME / TONIE_PASSWORD)",
                response.status()
            )));
        }
        let token: TokenResponse = response.json().await?;
        debug!("Tonie login succeeded");
        Ok(Self {
            http,
            token: token.access_token,
        })
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .get(format!("{}{}", API_BASE, path))
            .bearer_auth(&self.token)
    }

    pub async fn households(&self) -> AppResult<Vec<Household>> {
        let response = self.get("/households").send().await?.error_for_status()?;
        Ok(response.json().await?)
    }

    /// All creative tonies across every household on the account.
    pub async fn creative_tonies(&self) -> AppResult<Vec<CreativeTonie>> {
        let mut tonies = Vec::new();
        for household in self.households().await? {
            let path = format!("/households/{}/creativetonies", household.id);
            let response = self.get(&path).send().await?.error_for_status()?;
            let mut batch: Vec<CreativeTonie> = response.json().await?;
            tonies.append(&mut batch);
        }
        Ok(tonies)
    }

    /// Upload one audio file as a new chapter. Registers the file, streams
    /// it to S3 via the presigned form, then patches the tonie with the
    /// existing chapters plus the new one.
    pub async fn upload_chapter(
        &self,
        tonie: &CreativeTonie,
        title: &str,
        file_path: &Path,
    ) -> AppResult<CreativeTonie> {
        let upload: FileUploadRequest = self
            .http
            .post(format!("{}/file", API_BASE))
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let bytes = tokio::fs::read(file_path).await?;
        let file_name = file_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "chapter.mp3".to_string());

        // Field order matters for S3 POST policies: "file" must come last.
        let mut form = reqwest::multipart::Form::new();
        for (key, value) in &upload.request.fields {
            if let Some(text) = value.as_str() {
                form = form.text(key.clone(), text.to_string());
            }
        }
        form = form.part(
            "file",
            reqwest::multipart::Part::bytes(bytes)
                .file_name(file_name)
                .mime_str("audio/mpeg")
                .map_err(|e| AppError::Tonie(format!("Invalid upload content type: {}", e)))?,
        );

        let response = self
            .http
            .post(&upload.request.url)
            .multipart(form)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AppError::Tonie(format!(
                "File upload to storage failed with HTTP {}",
                response.status()
            )));
        }

        let mut chapters = tonie.chapters.clone();
        chapters.push(TonieChapter {
            id: String::new(),
            title: title.to_string(),
            file: upload.file_id,
            seconds: 0.0,
            transcoding: false,
        });
        let updated = self
            .patch_chapters(&tonie.household_id, &tonie.id, &chapters)
            .await?;
        info!("Uploaded \"{}\" to tonie \"{}\"", title, tonie.name);
        Ok(updated)
    }

    /// Replace the tonie's chapter list wholesale. Used for renames and
    /// reordering as well as uploads.
    pub async fn patch_chapters(
        &self,
        household_id: &str,
        tonie_id: &str,
        chapters: &[TonieChapter],
    ) -> AppResult<CreativeTonie> {
        let path = format!(
            "{}/households/{}/creativetonies/{}",
            API_BASE, household_id, tonie_id
        );
        let response = self
            .http
            .patch(&path)
            .bearer_auth(&self.token)
            .json(&ChapterPatch { chapters })
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}

/// Comma-separated id list from `TONIE_CREATIVE_TONIE_IDS`, falling back to
/// the single-value `TONIE_CREATIVE_TONIE_ID`.
pub fn load_tonie_target_ids_from_env() -> Vec<String> {
    if let Ok(ids) = std::env::var("TONIE_CREATIVE_TONIE_IDS") {
        let parsed = parse_target_ids(&ids);
        if !parsed.is_empty() {
            return parsed;
        }
    }
    match std::env::var("TONIE_CREATIVE_TONIE_ID") {
        Ok(id) if !id.trim().is_empty() => vec![id.trim().to_string()],
        _ => Vec::new(),
    }
}

/// Name-based target from `TONIE_CREATIVE_TONIE_NAME`, consulted only
/// when no id is configured anywhere.
pub fn load_tonie_target_name_from_env() -> Option<String> {
    std::env::var("TONIE_CREATIVE_TONIE_NAME")
        .ok()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
}

pub fn parse_target_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .map(|id| id.to_string())
        .collect()
}

/// Pick the upload target from the account's tonies. An explicit id or
/// name that matches nothing is an error; with neither configured, the
/// first tonie is used.
pub fn select_target<'a>(
    tonies: &'a [CreativeTonie],
    id: Option<&str>,
    name: Option<&str>,
) -> AppResult<&'a CreativeTonie> {
    if tonies.is_empty() {
        return Err(AppError::Tonie(
            "No creative tonies found on this account".to_string(),
        ));
    }

    if let Some(id) = id {
        return tonies.iter().find(|t| t.id == id).ok_or_else(|| {
            AppError::Tonie(format!("No creative tonie with id {} on this account", id))
        });
    }

    if let Some(name) = name {
        return tonies
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| {
                let available: Vec<&str> = tonies.iter().map(|t| t.name.as_str()).collect();
                AppError::Tonie(format!(
                    "No creative tonie named \"{}\" (available: {})",
                    name,
                    available.join(", ")
                ))
            });
    }

    Ok(&tonies[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tonie(id: &str, name: &str) -> CreativeTonie {
        CreativeTonie {
            id: id.to_string(),
            household_id: "hh-1".to_string(),
            name: name.to_string(),
            seconds_remaining: 3000.0,
            seconds_present: 600.0,
            chapters_remaining: 90,
            chapters_present: 2,
            chapters: Vec::new(),
        }
    }

    #[test]
    fn test_parse_target_ids() {
        assert_eq!(parse_target_ids("a,b , c,,"), vec!["a", "b", "c"]);
        assert!(parse_target_ids("  ,").is_empty());
    }

    #[test]
    fn test_select_target_by_id() {
        let tonies = vec![tonie("t1", "Red"), tonie("t2", "Blue")];
        assert_eq!(select_target(&tonies, Some("t2"), None).unwrap().id, "t2");
        assert!(select_target(&tonies, Some("missing"), None).is_err());
    }

    #[test]
    fn test_select_target_by_name_case_insensitive() {
        let tonies = vec![tonie("t1", "Red"), tonie("t2", "Blue")];
        assert_eq!(
            select_target(&tonies, None, Some("blue")).unwrap().id,
            "t2"
        );
        let err = select_target(&tonies, None, Some("Green")).unwrap_err();
        assert!(err.to_string().contains("Red"));
    }

    #[test]
    fn test_select_target_defaults_to_first() {
        let tonies = vec![tonie("t1", "Red"), tonie("t2", "Blue")];
        assert_eq!(select_target(&tonies, None, None).unwrap().id, "t1");
        assert!(select_target(&[], None, None).is_err());
    }

    #[test]
    fn test_creative_tonie_deserializes_camel_case() {
        let json = r#"{
            "id": "t1",
            "householdId": "hh-9",
            "name": "Bedtime",
            "secondsRemaining": 4741.5,
            "secondsPresent": 658.5,
            "chaptersRemaining": 97,
            "chaptersPresent": 3,
            "chapters": [
                {"id": "c1", "title": "Story", "file": "f1", "seconds": 120.0, "transcoding": false}
            ]
        }"#;
        let parsed: CreativeTonie = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.household_id, "hh-9");
        assert_eq!(parsed.chapters_present, 3);
        assert_eq!(parsed.chapters[0].title, "Story");
        assert!(!parsed.chapters[0].transcoding);
    }
}
