//! Portfolio API Client
//!
//! Single data-access path to the remote Portfolio store, shared by the
//! wizard's final submission and the editor's per-section mutations:
//! - Aggregate creation and whole-document replacement
//! - Fetch by owning user (404 means "no portfolio yet")
//! - Per-section add/update/delete, skills, social links and about text
//! - CV attachment and generation, and the user's subscription

use crate::error::{ServiceError, ServiceResult};
use crate::portfolio_tools::types::{
    CreatePortfolioRequest, CvFile, CvRequest, GeneratedCv, Portfolio, Section, SectionEntry,
    SocialLinks, Subscription,
};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

/// Everything except the RFC 3986 unreserved characters.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

/// Everything the wizard and the editor need from the remote store.
pub trait PortfolioApi {
    fn create_portfolio(&self, request: &CreatePortfolioRequest<'_>) -> ServiceResult<Portfolio>;

    /// `Ok(None)` when the user has no portfolio yet.
    fn fetch_for_user(&self, user_id: &str) -> ServiceResult<Option<Portfolio>>;

    fn replace_portfolio(&self, portfolio: &Portfolio) -> ServiceResult<Portfolio>;

    fn mutate(&self, portfolio_id: &str, mutation: &Mutation) -> ServiceResult<Portfolio>;

    fn generate_cv(&self, request: &CvRequest<'_>) -> ServiceResult<GeneratedCv>;

    fn user_subscription(&self) -> ServiceResult<Subscription>;
}

/// One granular change to a persisted portfolio. Each maps to exactly one
/// request; the response carries the whole updated document.
#[derive(Clone, Debug, PartialEq)]
pub enum Mutation {
    Add(SectionEntry),
    Update { index: usize, entry: SectionEntry },
    Delete { section: Section, index: usize },
    AddSkill(String),
    RemoveSkill(String),
    SocialLinks(SocialLinks),
    About(String),
    AttachCv(CvFile),
}

impl Mutation {
    pub fn route(&self, portfolio_id: &str) -> (&'static str, String) {
        let base = format!("/api/portfolios/{}", encode_segment(portfolio_id));
        match self {
            Mutation::Add(entry) => ("POST", format!("{base}/{}", entry.section())),
            Mutation::Update { index, entry } => {
                ("PUT", format!("{base}/{}/{index}", entry.section()))
            }
            Mutation::Delete { section, index } => ("DELETE", format!("{base}/{section}/{index}")),
            Mutation::AddSkill(_) => ("POST", format!("{base}/skills")),
            Mutation::RemoveSkill(skill) => {
                ("DELETE", format!("{base}/skills/{}", encode_segment(skill)))
            }
            Mutation::SocialLinks(_) => ("PUT", format!("{base}/social-links")),
            Mutation::About(_) => ("PUT", format!("{base}/about")),
            Mutation::AttachCv(_) => (
                "PUT",
                format!("/api/portfolios/update-cv/{}", encode_segment(portfolio_id)),
            ),
        }
    }

    pub fn body(&self) -> ServiceResult<Option<Value>> {
        let body = match self {
            Mutation::Add(entry) | Mutation::Update { entry, .. } => Some(serde_json::to_value(entry)?),
            Mutation::Delete { .. } | Mutation::RemoveSkill(_) => None,
            Mutation::AddSkill(skill) => Some(json!({ "skill": skill })),
            Mutation::SocialLinks(links) => Some(json!({ "socialLinks": links })),
            Mutation::About(about) => Some(json!({ "about": about })),
            Mutation::AttachCv(cv_file) => Some(json!({ "cvFile": cv_file })),
        };
        Ok(body)
    }

    /// Acknowledgement shown once the server confirms the change.
    pub fn describe(&self) -> String {
        match self {
            Mutation::Add(entry) => format!("{} added", entry.section().label()),
            Mutation::Update { entry, .. } => format!("{} updated", entry.section().label()),
            Mutation::Delete { section, .. } => format!("{} deleted", section.label()),
            Mutation::AddSkill(skill) => format!("Skill \"{skill}\" added"),
            Mutation::RemoveSkill(skill) => format!("Skill \"{skill}\" removed"),
            Mutation::SocialLinks(_) => "Social links updated".to_string(),
            Mutation::About(_) => "About section updated".to_string(),
            Mutation::AttachCv(cv_file) => format!("CV \"{}\" attached", cv_file.filename),
        }
    }
}

/// Percent-encode one URL path segment.
pub fn encode_segment(raw: &str) -> String {
    utf8_percent_encode(raw, PATH_SEGMENT).to_string()
}

/// Human-readable reason from an error body (`{message}` or `{error}`).
pub fn error_message(status: u16, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            ["message", "error"]
                .iter()
                .find_map(|key| value.get(key).and_then(Value::as_str).map(str::to_string))
        })
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| format!("Request failed with HTTP {status}"))
}

/// Turn a raw response into its JSON body, mapping non-2xx statuses and
/// `success: false` bodies onto the error taxonomy.
pub fn decode_envelope(status: u16, body: &str) -> ServiceResult<Value> {
    if !(200..300).contains(&status) {
        let message = error_message(status, body);
        return Err(if status == 404 {
            ServiceError::NotFound(message)
        } else {
            ServiceError::Rejected { status, message }
        });
    }

    let value: Value = serde_json::from_str(body)?;
    if value.get("success").and_then(Value::as_bool) == Some(false) {
        return Err(ServiceError::Rejected {
            status,
            message: error_message(status, body),
        });
    }
    Ok(value)
}

/// Accepts both `{ success, portfolio }` envelopes and bare documents.
pub fn decode_portfolio(status: u16, body: &str) -> ServiceResult<Portfolio> {
    let value = decode_envelope(status, body)?;
    match value.get("portfolio") {
        Some(Value::Null) => Err(ServiceError::NotFound(
            "Response did not include a portfolio".to_string(),
        )),
        Some(portfolio) => Ok(Portfolio::deserialize(portfolio)?),
        None => Ok(serde_json::from_value(value)?),
    }
}

/// Fetch-by-user response. A 404 means the user has not built a portfolio
/// yet, which is not an error.
pub fn decode_user_portfolio(status: u16, body: &str) -> ServiceResult<Option<Portfolio>> {
    match decode_portfolio(status, body) {
        Ok(portfolio) => Ok(Some(portfolio)),
        Err(ServiceError::NotFound(message)) => {
            debug!(%message, "no portfolio for user");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

fn decode_as<T: DeserializeOwned>(status: u16, body: &str) -> ServiceResult<T> {
    let value = decode_envelope(status, body)?;
    Ok(serde_json::from_value(value)?)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioConfig {
    pub base_url: String,
    pub api_token: Option<String>,
    pub timeout_secs: u64,
}

/// Blocking HTTP client for the Portfolio API.
pub struct PortfolioClient {
    base_url: String,
    api_token: Option<String>,
    agent: ureq::Agent,
}

impl PortfolioClient {
    pub fn new(config: PortfolioConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build();
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.filter(|token| !token.trim().is_empty()),
            agent,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: &str, path: &str) -> ureq::Request {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.agent.request(method, &url);

        if let Some(api_token) = &self.api_token {
            request = request.set("Authorization", &format!("Bearer {}", api_token));
        }

        request
    }

    /// One round trip. Error statuses are returned as data so the decoders
    /// can classify them; only transport failures become errors here.
    fn send(&self, method: &str, path: &str, body: Option<&Value>) -> ServiceResult<(u16, String)> {
        info!(method, path, "portfolio api request");
        let request = self.request(method, path);
        let result = match body {
            Some(body) => request.send_json(body),
            None => request.call(),
        };

        let response = match result {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(transport)) => {
                warn!(method, path, %transport, "portfolio api unreachable");
                return Err(ServiceError::Network(format!(
                    "Failed to reach {}{}: {}",
                    self.base_url, path, transport
                )));
            }
        };

        let status = response.status();
        let text = response
            .into_string()
            .map_err(|e| ServiceError::Network(format!("Failed to read response: {}", e)))?;
        debug!(status, bytes = text.len(), "portfolio api response");
        Ok((status, text))
    }
}

impl PortfolioApi for PortfolioClient {
    fn create_portfolio(&self, request: &CreatePortfolioRequest<'_>) -> ServiceResult<Portfolio> {
        let body = serde_json::to_value(request)?;
        let (status, text) = self.send("POST", "/api/portfolios", Some(&body))?;
        decode_portfolio(status, &text)
    }

    fn fetch_for_user(&self, user_id: &str) -> ServiceResult<Option<Portfolio>> {
        let path = format!("/api/portfolios/user/{}", encode_segment(user_id));
        let (status, text) = self.send("GET", &path, None)?;
        decode_user_portfolio(status, &text)
    }

    fn replace_portfolio(&self, portfolio: &Portfolio) -> ServiceResult<Portfolio> {
        let path = format!("/api/portfolios/{}", encode_segment(&portfolio.id));
        let body = serde_json::to_value(portfolio)?;
        let (status, text) = self.send("PUT", &path, Some(&body))?;
        decode_portfolio(status, &text)
    }

    fn mutate(&self, portfolio_id: &str, mutation: &Mutation) -> ServiceResult<Portfolio> {
        let (method, path) = mutation.route(portfolio_id);
        let body = mutation.body()?;
        let (status, text) = self.send(method, &path, body.as_ref())?;
        decode_portfolio(status, &text)
    }

    fn generate_cv(&self, request: &CvRequest<'_>) -> ServiceResult<GeneratedCv> {
        let body = serde_json::to_value(request)?;
        let (status, text) = self.send("POST", "/api/portfolios/generate-cv", Some(&body))?;
        let value = decode_envelope(status, &text)?;
        let download_url = value
            .get("downloadUrl")
            .and_then(Value::as_str)
            .ok_or_else(|| ServiceError::Other("CV response did not include a download URL".to_string()))?
            .to_string();
        let portfolio = decode_portfolio(status, &text)?;
        Ok(GeneratedCv {
            download_url,
            portfolio,
        })
    }

    fn user_subscription(&self) -> ServiceResult<Subscription> {
        let (status, text) = self.send("GET", "/api/subscriptions/user-subscription", None)?;
        decode_as(status, &text)
    }
}

/// Helper function to create a Portfolio client from a connection string
pub fn create_portfolio_client(
    connection_string: &str,
    api_token: Option<String>,
    timeout_secs: u64,
) -> ServiceResult<PortfolioClient> {
    let connection_string = connection_string.trim();
    if connection_string.is_empty() {
        return Err(ServiceError::Other("Portfolio API URL cannot be empty".to_string()));
    }
    // Accept "localhost:5000" as well as full URLs
    let base_url = if connection_string.starts_with("http") {
        connection_string.to_string()
    } else {
        format!("http://{}", connection_string)
    };

    Ok(PortfolioClient::new(PortfolioConfig {
        base_url,
        api_token,
        timeout_secs,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portfolio_tools::types::ProjectRecord;

    fn portfolio_json() -> String {
        json!({
            "success": true,
            "portfolio": { "_id": "p1", "skills": ["JavaScript"] }
        })
        .to_string()
    }

    #[test]
    fn test_client_creation() {
        let client = PortfolioClient::new(PortfolioConfig {
            base_url: "http://localhost:5000/".to_string(),
            api_token: Some("test-token".to_string()),
            timeout_secs: 5,
        });
        assert_eq!(client.base_url, "http://localhost:5000");
        assert_eq!(client.api_token, Some("test-token".to_string()));
    }

    #[test]
    fn test_connection_string_parsing() {
        let client = create_portfolio_client("localhost:5000", None, 30).unwrap();
        assert_eq!(client.base_url(), "http://localhost:5000");

        let client2 = create_portfolio_client("https://jobs.example.com", Some(" ".to_string()), 30).unwrap();
        assert_eq!(client2.base_url(), "https://jobs.example.com");
        assert_eq!(client2.api_token, None);

        assert!(create_portfolio_client("  ", None, 30).is_err());
    }

    #[test]
    fn test_mutation_routes() {
        let project = SectionEntry::Project(ProjectRecord {
            id: None,
            title: "Board".to_string(),
            description: String::new(),
            technologies: vec![],
            link: String::new(),
            image: String::new(),
        });
        assert_eq!(
            Mutation::Add(project.clone()).route("p1"),
            ("POST", "/api/portfolios/p1/projects".to_string())
        );
        assert_eq!(
            Mutation::Update { index: 2, entry: project }.route("p1"),
            ("PUT", "/api/portfolios/p1/projects/2".to_string())
        );
        assert_eq!(
            Mutation::Delete { section: Section::Education, index: 0 }.route("p1"),
            ("DELETE", "/api/portfolios/p1/education/0".to_string())
        );
        assert_eq!(
            Mutation::RemoveSkill("C++".to_string()).route("p1"),
            ("DELETE", "/api/portfolios/p1/skills/C%2B%2B".to_string())
        );
        assert_eq!(
            Mutation::SocialLinks(SocialLinks::default()).route("p1").1,
            "/api/portfolios/p1/social-links"
        );
        assert_eq!(
            Mutation::AttachCv(CvFile::default()).route("p1"),
            ("PUT", "/api/portfolios/update-cv/p1".to_string())
        );
    }

    #[test]
    fn test_mutation_bodies() {
        assert_eq!(
            Mutation::AddSkill("Rust".to_string()).body().unwrap(),
            Some(json!({ "skill": "Rust" }))
        );
        assert_eq!(Mutation::RemoveSkill("Rust".to_string()).body().unwrap(), None);
        assert_eq!(
            Mutation::About("Hi".to_string()).body().unwrap(),
            Some(json!({ "about": "Hi" }))
        );
        let cv_file = CvFile {
            filename: "resume.pdf".to_string(),
            path: "/uploads/resumes/resume.pdf".to_string(),
            file_type: "application/pdf".to_string(),
            ..Default::default()
        };
        assert_eq!(
            Mutation::AttachCv(cv_file).body().unwrap(),
            Some(json!({
                "cvFile": {
                    "filename": "resume.pdf",
                    "path": "/uploads/resumes/resume.pdf",
                    "fileType": "application/pdf"
                }
            }))
        );
    }

    #[test]
    fn test_decode_envelope_and_bare_document() {
        let portfolio = decode_portfolio(201, &portfolio_json()).unwrap();
        assert_eq!(portfolio.skills, vec!["JavaScript".to_string()]);

        let bare = decode_portfolio(200, r#"{"_id":"p2"}"#).unwrap();
        assert_eq!(bare.id, "p2");
    }

    #[test]
    fn test_decode_error_taxonomy() {
        let not_found = decode_portfolio(404, r#"{"success":false,"message":"No portfolio found for this user"}"#);
        assert!(matches!(not_found, Err(ServiceError::NotFound(_))));

        match decode_portfolio(400, r#"{"success":false,"error":"Cast to date failed"}"#) {
            Err(ServiceError::Rejected { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "Cast to date failed");
            }
            other => panic!("unexpected result: {other:?}"),
        }

        match decode_portfolio(502, "<html>Bad gateway</html>") {
            Err(ServiceError::Rejected { message, .. }) => {
                assert_eq!(message, "Request failed with HTTP 502")
            }
            other => panic!("unexpected result: {other:?}"),
        }

        let soft_failure = decode_portfolio(200, r#"{"success":false,"message":"A portfolio already exists for this user"}"#);
        assert!(matches!(soft_failure, Err(ServiceError::Rejected { status: 200, .. })));
    }

    #[test]
    fn test_missing_user_portfolio_is_not_an_error() {
        let missing = decode_user_portfolio(
            404,
            r#"{"success":false,"message":"No portfolio found for this user","isPortfolioMissing":true}"#,
        );
        assert_eq!(missing.unwrap(), None);

        let found = decode_user_portfolio(200, &portfolio_json()).unwrap();
        assert_eq!(found.map(|p| p.id), Some("p1".to_string()));

        match decode_user_portfolio(500, r#"{"success":false,"message":"Server error"}"#) {
            Err(ServiceError::Rejected { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "Server error");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_populated_certificates_decode() {
        let body = json!({
            "success": true,
            "portfolio": {
                "_id": "p1",
                "certificates": [{
                    "_id": "c1",
                    "user": "u1",
                    "course": "k1",
                    "courseName": "Rust 101",
                    "skills": ["Rust"]
                }]
            }
        })
        .to_string();
        let portfolio = decode_user_portfolio(200, &body).unwrap().unwrap();
        assert_eq!(portfolio.certificates.len(), 1);
        assert_eq!(portfolio.certificates[0].title(), "Rust 101");
        assert_eq!(portfolio.certificates[0].id(), Some("c1"));
    }

    #[test]
    fn test_subscription_defaults_to_free() {
        let subscription: Subscription = decode_as(200, r#"{"details":null}"#).unwrap();
        assert_eq!(subscription.subscription, "Free");
        assert_eq!(subscription.expiry_date, None);
    }

    #[test]
    fn test_encode_segment() {
        assert_eq!(encode_segment("Node.js"), "Node.js");
        assert_eq!(encode_segment("C#"), "C%23");
        assert_eq!(encode_segment("Machine Learning"), "Machine%20Learning");
        assert_eq!(encode_segment("Résumé"), "R%C3%A9sum%C3%A9");
    }
}
