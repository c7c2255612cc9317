use chrono::{DateTime, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use ulid::Ulid;

/// A rejected sub-form. Never leaves the client.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
    pub field: Option<String>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field: None,
        }
    }

    pub fn on_field(field: &str, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field: Some(field.to_string()),
        }
    }
}

/// Parse either a plain calendar date or a full RFC 3339 timestamp, which is
/// what the document store hands back for stored dates.
pub fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.date_naive())
        .map_err(|_| format!("Invalid date '{raw}', expected YYYY-MM-DD"))
}

pub mod flexible_date {
    use chrono::NaiveDate;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::parse_date;

    pub fn serialize<S: Serializer>(date: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&date.format("%Y-%m-%d").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(d)?;
        parse_date(&raw).map_err(D::Error::custom)
    }

    pub mod option {
        use chrono::NaiveDate;
        use serde::de::Error as _;
        use serde::{Deserialize, Deserializer, Serializer};

        use super::super::parse_date;

        pub fn serialize<S: Serializer>(date: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
            match date {
                Some(date) => s.serialize_str(&date.format("%Y-%m-%d").to_string()),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
            match Option::<String>::deserialize(d)? {
                Some(raw) if !raw.trim().is_empty() => {
                    parse_date(&raw).map(Some).map_err(D::Error::custom)
                }
                _ => Ok(None),
            }
        }
    }
}

/// Missing and `null` strings both become empty.
fn nullable<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

fn nullable_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    Ok(Option::<Vec<String>>::deserialize(d)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Validated sub-records
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EducationRecord {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub school: String,
    pub degree: String,
    pub field_of_study: String,
    #[serde(with = "flexible_date")]
    pub start_date: NaiveDate,
    #[serde(default, with = "flexible_date::option")]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub currently_enrolled: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub description: String,
    #[serde(default, deserialize_with = "nullable")]
    pub location: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceRecord {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub company: String,
    pub position: String,
    #[serde(with = "flexible_date")]
    pub start_date: NaiveDate,
    #[serde(default, with = "flexible_date::option")]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub currently_working: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub description: String,
    #[serde(default, deserialize_with = "nullable")]
    pub location: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    #[serde(default, deserialize_with = "nullable")]
    pub description: String,
    #[serde(default, deserialize_with = "nullable_list")]
    pub technologies: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub link: String,
    #[serde(default, deserialize_with = "nullable")]
    pub image: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRecord {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    #[serde(default, deserialize_with = "nullable")]
    pub description: String,
    #[serde(default, deserialize_with = "nullable_list")]
    pub skills: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub certificate_url: String,
}

/// A course certificate issued by the platform, as populated from its own
/// collection when a portfolio is fetched by user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedCertificate {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub course_name: String,
    #[serde(default, deserialize_with = "nullable_list")]
    pub skills: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Value>,
}

/// Certificates come back embedded, as populated issued certificates, or as
/// bare references to a separate certificate document. Variant order matters:
/// an issued certificate has no `title`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortfolioCertificate {
    Embedded(CertificateRecord),
    Issued(IssuedCertificate),
    Linked(String),
}

impl PortfolioCertificate {
    pub fn id(&self) -> Option<&str> {
        match self {
            PortfolioCertificate::Embedded(record) => record.id.as_deref(),
            PortfolioCertificate::Issued(issued) => Some(&issued.id),
            PortfolioCertificate::Linked(id) => Some(id),
        }
    }

    pub fn title(&self) -> &str {
        match self {
            PortfolioCertificate::Embedded(record) => &record.title,
            PortfolioCertificate::Issued(issued) if !issued.course_name.trim().is_empty() => {
                &issued.course_name
            }
            PortfolioCertificate::Issued(_) => "(issued certificate)",
            PortfolioCertificate::Linked(_) => "(linked certificate)",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SocialLinks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
}

impl SocialLinks {
    pub fn slots(&self) -> [(&'static str, Option<&str>); 4] {
        [
            ("linkedin", self.linkedin.as_deref()),
            ("github", self.github.as_deref()),
            ("website", self.website.as_deref()),
            ("twitter", self.twitter.as_deref()),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.slots()
            .iter()
            .all(|(_, url)| url.is_none_or(|u| u.trim().is_empty()))
    }
}

// ---------------------------------------------------------------------------
// Raw sub-form inputs (what a user or a draft file provides)
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct EducationInput {
    pub school: String,
    pub degree: String,
    pub field_of_study: String,
    /// `YYYY-MM-DD`
    pub start_date: String,
    pub end_date: Option<String>,
    pub currently_enrolled: bool,
    pub description: String,
    pub location: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ExperienceInput {
    pub company: String,
    pub position: String,
    /// `YYYY-MM-DD`
    pub start_date: String,
    pub end_date: Option<String>,
    pub currently_working: bool,
    pub description: String,
    pub location: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectInput {
    pub title: String,
    pub description: String,
    pub technologies: Vec<String>,
    pub link: String,
    pub image: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct CertificateInput {
    pub title: String,
    pub description: String,
    pub skills: Vec<String>,
    pub certificate_url: String,
}

/// Draft file accepted by `submit --draft`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct DraftFile {
    pub education: Vec<EducationInput>,
    pub experience: Vec<ExperienceInput>,
    pub projects: Vec<ProjectInput>,
    pub skills: Vec<String>,
    pub certificates: Vec<CertificateInput>,
    pub social_links: SocialLinks,
    pub about: Option<String>,
}

// ---------------------------------------------------------------------------
// Draft
// ---------------------------------------------------------------------------

/// Ordered draft collection. Every entry gets a client-side id on admission so
/// it can be addressed without relying on its position. Serializes as a plain
/// sequence of records; the ids never leave the client.
#[derive(Clone, Debug, PartialEq)]
pub struct Entries<T> {
    items: Vec<(Ulid, T)>,
}

impl<T> Default for Entries<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> Entries<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn push(&mut self, record: T) -> Ulid {
        let id = Ulid::new();
        self.items.push((id, record));
        id
    }

    pub fn remove(&mut self, index: usize) -> Option<T> {
        if index < self.items.len() {
            Some(self.items.remove(index).1)
        } else {
            None
        }
    }

    pub fn remove_id(&mut self, id: Ulid) -> Option<T> {
        let index = self.items.iter().position(|(entry_id, _)| *entry_id == id)?;
        self.remove(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter().map(|(_, record)| record)
    }

    pub fn ids(&self) -> impl Iterator<Item = Ulid> + '_ {
        self.items.iter().map(|(id, _)| *id)
    }
}

impl<T: Serialize> Serialize for Entries<T> {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(self.iter())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardDraft {
    pub education: Entries<EducationRecord>,
    pub experience: Entries<ExperienceRecord>,
    pub projects: Entries<ProjectRecord>,
    pub skills: Entries<String>,
    pub certificates: Entries<CertificateRecord>,
    pub social_links: SocialLinks,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePortfolioRequest<'a> {
    pub user_id: &'a str,
    #[serde(flatten)]
    pub draft: &'a WizardDraft,
}

// ---------------------------------------------------------------------------
// Persisted portfolio
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserRef {
    Id(String),
    Populated {
        #[serde(rename = "_id")]
        id: String,
    },
}

impl UserRef {
    pub fn id(&self) -> &str {
        match self {
            UserRef::Id(id) | UserRef::Populated { id } => id,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CvFile {
    #[serde(deserialize_with = "nullable")]
    pub filename: String,
    #[serde(deserialize_with = "nullable")]
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_date: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "nullable")]
    pub file_type: String,
}

impl CvFile {
    pub fn is_present(&self) -> bool {
        !self.filename.trim().is_empty() || !self.path.trim().is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Portfolio {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cv_file: Option<CvFile>,
    #[serde(default)]
    pub education: Vec<EducationRecord>,
    #[serde(default)]
    pub experience: Vec<ExperienceRecord>,
    #[serde(default, deserialize_with = "nullable_list")]
    pub skills: Vec<String>,
    #[serde(default)]
    pub projects: Vec<ProjectRecord>,
    #[serde(default)]
    pub certificates: Vec<PortfolioCertificate>,
    #[serde(default, deserialize_with = "nullable")]
    pub about: String,
    #[serde(default)]
    pub social_links: SocialLinks,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Portfolio {
    pub fn has_cv(&self) -> bool {
        self.cv_file.as_ref().is_some_and(CvFile::is_present)
    }

    pub fn owner_id(&self) -> Option<&str> {
        self.user_id.as_ref().map(UserRef::id)
    }

    pub fn section_len(&self, section: Section) -> usize {
        match section {
            Section::Education => self.education.len(),
            Section::Experience => self.experience.len(),
            Section::Projects => self.projects.len(),
            Section::Certificates => self.certificates.len(),
        }
    }

    /// Server id of the entry at `index`, if it has one.
    pub fn entry_id(&self, section: Section, index: usize) -> Option<&str> {
        match section {
            Section::Education => self.education.get(index)?.id.as_deref(),
            Section::Experience => self.experience.get(index)?.id.as_deref(),
            Section::Projects => self.projects.get(index)?.id.as_deref(),
            Section::Certificates => self.certificates.get(index)?.id(),
        }
    }

    pub fn position_of(&self, section: Section, id: &str) -> Option<usize> {
        (0..self.section_len(section)).find(|&index| self.entry_id(section, index) == Some(id))
    }
}

/// Repeated sub-record collections addressable on the remote document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Education,
    Experience,
    Projects,
    Certificates,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Education => "education",
            Section::Experience => "experience",
            Section::Projects => "projects",
            Section::Certificates => "certificates",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Section::Education => "Education",
            Section::Experience => "Experience",
            Section::Projects => "Project",
            Section::Certificates => "Certificate",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Section {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "education" => Ok(Section::Education),
            "experience" => Ok(Section::Experience),
            "projects" | "project" => Ok(Section::Projects),
            "certificates" | "certificate" => Ok(Section::Certificates),
            _ => Err(format!("Unknown section: {s}")),
        }
    }
}

/// A validated record bound for one section.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SectionEntry {
    Education(EducationRecord),
    Experience(ExperienceRecord),
    Project(ProjectRecord),
    Certificate(CertificateRecord),
}

impl SectionEntry {
    pub fn section(&self) -> Section {
        match self {
            SectionEntry::Education(_) => Section::Education,
            SectionEntry::Experience(_) => Section::Experience,
            SectionEntry::Project(_) => Section::Projects,
            SectionEntry::Certificate(_) => Section::Certificates,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfo {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CvRequest<'a> {
    pub user_id: &'a str,
    pub personal_info: &'a PersonalInfo,
    pub education: &'a [EducationRecord],
    pub experience: &'a [ExperienceRecord],
    pub skills: &'a [String],
    pub certificates: &'a [PortfolioCertificate],
    pub projects: &'a [ProjectRecord],
}

impl<'a> CvRequest<'a> {
    pub fn from_portfolio(user_id: &'a str, personal_info: &'a PersonalInfo, portfolio: &'a Portfolio) -> Self {
        Self {
            user_id,
            personal_info,
            education: &portfolio.education,
            experience: &portfolio.experience,
            skills: &portfolio.skills,
            certificates: &portfolio.certificates,
            projects: &portfolio.projects,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GeneratedCv {
    pub download_url: String,
    pub portfolio: Portfolio,
}

fn free_tier() -> String {
    "Free".to_string()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    #[serde(default = "free_tier")]
    pub subscription: String,
    #[serde(default)]
    pub details: Value,
    #[serde(default)]
    pub expiry_date: Option<DateTime<Utc>>,
}

impl Subscription {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date.is_some_and(|expiry| expiry <= now)
    }
}
