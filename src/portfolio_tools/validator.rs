use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

use crate::portfolio_tools::types::{
    parse_date, CertificateInput, CertificateRecord, EducationInput, EducationRecord,
    ExperienceInput, ExperienceRecord, ProjectInput, ProjectRecord, SocialLinks, ValidationError,
};

static HTTP_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://[^\s/$.?#][^\s]*$").expect("static url pattern"));

pub fn is_http_url(url: &str) -> bool {
    HTTP_URL.is_match(url.trim())
}

/// Collects blank required fields so one message can name all of them.
struct Required<'a> {
    missing: Vec<&'a str>,
}

impl<'a> Required<'a> {
    fn new() -> Self {
        Self {
            missing: Vec::new(),
        }
    }

    fn take(&mut self, field: &'a str, value: &str) -> String {
        let value = value.trim();
        if value.is_empty() {
            self.missing.push(field);
        }
        value.to_string()
    }

    fn finish(self) -> Result<(), ValidationError> {
        match self.missing.as_slice() {
            [] => Ok(()),
            [field] => Err(ValidationError::on_field(
                field,
                format!("Please fill in all required fields: {field}"),
            )),
            fields => Err(ValidationError::new(format!(
                "Please fill in all required fields: {}",
                fields.join(", ")
            ))),
        }
    }
}

fn date_field(field: &str, raw: &str) -> Result<NaiveDate, ValidationError> {
    parse_date(raw).map_err(|err| ValidationError::on_field(field, err))
}

/// While the entry is ongoing the end date is dropped; otherwise it is
/// required and must not precede the start date.
fn end_date_rule(
    start: NaiveDate,
    end: Option<&str>,
    ongoing: bool,
) -> Result<Option<NaiveDate>, ValidationError> {
    if ongoing {
        return Ok(None);
    }
    let raw = end
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .ok_or_else(|| ValidationError::on_field("endDate", "End date is required unless the entry is ongoing"))?;
    let end = date_field("endDate", raw)?;
    if end < start {
        return Err(ValidationError::on_field(
            "endDate",
            format!("End date {end} is before start date {start}"),
        ));
    }
    Ok(Some(end))
}

pub fn validate_education(input: &EducationInput) -> Result<EducationRecord, ValidationError> {
    let mut required = Required::new();
    let school = required.take("school", &input.school);
    let degree = required.take("degree", &input.degree);
    let field_of_study = required.take("fieldOfStudy", &input.field_of_study);
    let start_raw = required.take("startDate", &input.start_date);
    required.finish()?;

    let start_date = date_field("startDate", &start_raw)?;
    let end_date = end_date_rule(start_date, input.end_date.as_deref(), input.currently_enrolled)?;

    Ok(EducationRecord {
        id: None,
        school,
        degree,
        field_of_study,
        start_date,
        end_date,
        currently_enrolled: input.currently_enrolled,
        description: input.description.trim().to_string(),
        location: input.location.trim().to_string(),
    })
}

pub fn validate_experience(input: &ExperienceInput) -> Result<ExperienceRecord, ValidationError> {
    let mut required = Required::new();
    let company = required.take("company", &input.company);
    let position = required.take("position", &input.position);
    let start_raw = required.take("startDate", &input.start_date);
    required.finish()?;

    let start_date = date_field("startDate", &start_raw)?;
    let end_date = end_date_rule(start_date, input.end_date.as_deref(), input.currently_working)?;

    Ok(ExperienceRecord {
        id: None,
        company,
        position,
        start_date,
        end_date,
        currently_working: input.currently_working,
        description: input.description.trim().to_string(),
        location: input.location.trim().to_string(),
    })
}

/// A single tag (technology, certificate skill, portfolio skill). Blank and
/// case-insensitive duplicates are rejected.
pub fn validate_tag<'a>(
    field: &str,
    tag: &str,
    existing: impl IntoIterator<Item = &'a str>,
) -> Result<String, ValidationError> {
    let tag = tag.trim();
    if tag.is_empty() {
        return Err(ValidationError::on_field(field, format!("{field} entry cannot be empty")));
    }
    if existing.into_iter().any(|t| t.eq_ignore_ascii_case(tag)) {
        return Err(ValidationError::on_field(
            field,
            format!("\"{tag}\" has already been added"),
        ));
    }
    Ok(tag.to_string())
}

fn validate_tags(field: &str, tags: &[String]) -> Result<Vec<String>, ValidationError> {
    let mut accepted: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = validate_tag(field, tag, accepted.iter().map(String::as_str))?;
        accepted.push(tag);
    }
    Ok(accepted)
}

pub fn validate_project(input: &ProjectInput) -> Result<ProjectRecord, ValidationError> {
    let mut required = Required::new();
    let title = required.take("title", &input.title);
    required.finish()?;

    Ok(ProjectRecord {
        id: None,
        title,
        description: input.description.trim().to_string(),
        technologies: validate_tags("technologies", &input.technologies)?,
        link: input.link.trim().to_string(),
        image: input.image.trim().to_string(),
    })
}

pub fn validate_certificate(input: &CertificateInput) -> Result<CertificateRecord, ValidationError> {
    let mut required = Required::new();
    let title = required.take("title", &input.title);
    required.finish()?;

    let certificate_url = input.certificate_url.trim().to_string();
    if !certificate_url.is_empty() && !is_http_url(&certificate_url) {
        return Err(ValidationError::on_field(
            "certificateUrl",
            format!("Certificate URL '{certificate_url}' must start with http:// or https://"),
        ));
    }

    Ok(CertificateRecord {
        id: None,
        title,
        description: input.description.trim().to_string(),
        skills: validate_tags("skills", &input.skills)?,
        certificate_url,
    })
}

/// Blank slots are cleared; anything else must be an http(s) URL.
pub fn validate_social_links(links: &SocialLinks) -> Result<SocialLinks, ValidationError> {
    let normalise = |slot: &str, url: &Option<String>| -> Result<Option<String>, ValidationError> {
        match url.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(url) if is_http_url(url) => Ok(Some(url.to_string())),
            Some(url) => Err(ValidationError::on_field(
                slot,
                format!("{slot} link '{url}' must start with http:// or https://"),
            )),
        }
    };

    Ok(SocialLinks {
        linkedin: normalise("linkedin", &links.linkedin)?,
        github: normalise("github", &links.github)?,
        website: normalise("website", &links.website)?,
        twitter: normalise("twitter", &links.twitter)?,
    })
}
