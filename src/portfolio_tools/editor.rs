use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

use crate::error::{ServiceError, ServiceResult};
use crate::portfolio_tools::client::{Mutation, PortfolioApi};
use crate::portfolio_tools::types::{
    CvFile, CvRequest, PersonalInfo, Portfolio, Section, SectionEntry, SocialLinks,
    ValidationError,
};
use crate::portfolio_tools::validator::{validate_social_links, validate_tag};

/// Addresses an existing entry either by position or by its server `_id`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntryRef {
    Index(usize),
    Id(String),
}

impl FromStr for EntryRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("Entry reference cannot be empty".to_string());
        }
        Ok(match s.parse::<usize>() {
            Ok(index) => EntryRef::Index(index),
            Err(_) => EntryRef::Id(s.to_string()),
        })
    }
}

impl fmt::Display for EntryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryRef::Index(index) => write!(f, "#{index}"),
            EntryRef::Id(id) => write!(f, "id {id}"),
        }
    }
}

/// Transient confirmation of the last successful mutation.
#[derive(Clone, Debug, PartialEq)]
pub struct Notice {
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Keeps a local copy of a persisted portfolio in sync with the server. The
/// copy is only ever replaced by what the server returns.
pub struct PortfolioEditor<'a, A: PortfolioApi + ?Sized> {
    api: &'a A,
    portfolio: Portfolio,
    require_cv: bool,
    notice: Option<Notice>,
}

impl<'a, A: PortfolioApi + ?Sized> PortfolioEditor<'a, A> {
    pub fn new(api: &'a A, portfolio: Portfolio, require_cv: bool) -> Self {
        Self {
            api,
            portfolio,
            require_cv,
            notice: None,
        }
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn into_portfolio(self) -> Portfolio {
        self.portfolio
    }

    pub fn take_notice(&mut self) -> Option<Notice> {
        self.notice.take()
    }

    /// Resolve a reference to a position in the current snapshot.
    pub fn resolve(&self, section: Section, entry: &EntryRef) -> ServiceResult<usize> {
        let len = self.portfolio.section_len(section);
        match entry {
            EntryRef::Index(index) if *index < len => Ok(*index),
            EntryRef::Index(index) => Err(ServiceError::StaleEntry(format!(
                "{section} has {len} entries, no index {index}"
            ))),
            EntryRef::Id(id) => self.portfolio.position_of(section, id).ok_or_else(|| {
                ServiceError::StaleEntry(format!("no {section} entry with id {id}"))
            }),
        }
    }

    fn check_gate(&self, section: Section) -> ServiceResult<()> {
        let gated = matches!(section, Section::Education | Section::Experience);
        if self.require_cv && gated && !self.portfolio.has_cv() {
            return Err(ServiceError::GateClosed(format!(
                "Attach or generate a CV before adding {section}"
            )));
        }
        Ok(())
    }

    fn apply(&mut self, mutation: Mutation) -> ServiceResult<&Portfolio> {
        let description = mutation.describe();
        match self.api.mutate(&self.portfolio.id, &mutation) {
            Ok(updated) => {
                info!(portfolio_id = %updated.id, "{description}");
                self.replace(updated, description);
                Ok(&self.portfolio)
            }
            Err(error) => {
                warn!(portfolio_id = %self.portfolio.id, %error, "mutation rejected; local copy unchanged");
                Err(error)
            }
        }
    }

    fn replace(&mut self, portfolio: Portfolio, message: String) {
        self.portfolio = portfolio;
        self.notice = Some(Notice {
            message,
            at: Utc::now(),
        });
    }

    pub fn add_entry(&mut self, entry: SectionEntry) -> ServiceResult<&Portfolio> {
        self.check_gate(entry.section())?;
        self.apply(Mutation::Add(entry))
    }

    pub fn update_entry(&mut self, target: &EntryRef, entry: SectionEntry) -> ServiceResult<&Portfolio> {
        let index = self.resolve(entry.section(), target)?;
        self.apply(Mutation::Update { index, entry })
    }

    pub fn remove_entry(&mut self, section: Section, target: &EntryRef) -> ServiceResult<&Portfolio> {
        let index = self.resolve(section, target)?;
        self.apply(Mutation::Delete { section, index })
    }

    pub fn add_skill(&mut self, skill: &str) -> ServiceResult<&Portfolio> {
        let skill = validate_tag("skills", skill, self.portfolio.skills.iter().map(String::as_str))?;
        self.apply(Mutation::AddSkill(skill))
    }

    /// Removal is keyed by the skill itself, never by its position.
    pub fn remove_skill(&mut self, skill: &str) -> ServiceResult<&Portfolio> {
        let skill = skill.trim();
        if !self.portfolio.skills.iter().any(|s| s == skill) {
            return Err(ServiceError::StaleEntry(format!("skill \"{skill}\" is not in the portfolio")));
        }
        self.apply(Mutation::RemoveSkill(skill.to_string()))
    }

    pub fn set_social_links(&mut self, links: &SocialLinks) -> ServiceResult<&Portfolio> {
        let links = validate_social_links(links)?;
        self.apply(Mutation::SocialLinks(links))
    }

    pub fn set_about(&mut self, about: &str) -> ServiceResult<&Portfolio> {
        self.apply(Mutation::About(about.trim().to_string()))
    }

    /// Record an already hosted CV file on the portfolio. Opens the CV gate.
    pub fn attach_cv(&mut self, cv_file: CvFile) -> ServiceResult<&Portfolio> {
        if !cv_file.is_present() {
            return Err(ValidationError::on_field("cvFile", "A CV needs a filename or a path").into());
        }
        self.apply(Mutation::AttachCv(cv_file))
    }

    /// Ask the server to render a CV from the current collections. Returns the
    /// download URL; the snapshot now carries the `cvFile`.
    pub fn generate_cv(&mut self, user_id: &str, personal_info: &PersonalInfo) -> ServiceResult<String> {
        let request = CvRequest::from_portfolio(user_id, personal_info, &self.portfolio);
        let generated = self.api.generate_cv(&request)?;
        info!(portfolio_id = %generated.portfolio.id, "CV generated");
        self.replace(generated.portfolio, "CV generated".to_string());
        Ok(generated.download_url)
    }

    pub fn refresh(&mut self, user_id: &str) -> ServiceResult<&Portfolio> {
        let portfolio = self
            .api
            .fetch_for_user(user_id)?
            .ok_or_else(|| ServiceError::NotFound(format!("No portfolio for user {user_id}")))?;
        self.portfolio = portfolio;
        Ok(&self.portfolio)
    }

    /// Whole-document update.
    pub fn replace_document(&mut self, portfolio: &Portfolio) -> ServiceResult<&Portfolio> {
        if portfolio.id != self.portfolio.id {
            return Err(ServiceError::StaleEntry(format!(
                "document {} is not portfolio {}",
                portfolio.id, self.portfolio.id
            )));
        }
        let updated = self.api.replace_portfolio(portfolio)?;
        info!(portfolio_id = %updated.id, "portfolio replaced");
        self.replace(updated, "Portfolio updated".to_string());
        Ok(&self.portfolio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portfolio_tools::testing::{FakeApi, persisted};
    use crate::portfolio_tools::types::{EducationInput, ProjectInput};
    use crate::portfolio_tools::validator::{validate_education, validate_project};

    fn education() -> SectionEntry {
        SectionEntry::Education(
            validate_education(&EducationInput {
                school: "Night College".to_string(),
                degree: "MSc".to_string(),
                field_of_study: "Data".to_string(),
                start_date: "2023-01-01".to_string(),
                currently_enrolled: true,
                ..Default::default()
            })
            .unwrap(),
        )
    }

    fn project(title: &str) -> SectionEntry {
        SectionEntry::Project(
            validate_project(&ProjectInput {
                title: title.to_string(),
                ..Default::default()
            })
            .unwrap(),
        )
    }

    #[test]
    fn test_entry_ref_parsing() {
        assert_eq!("2".parse::<EntryRef>(), Ok(EntryRef::Index(2)));
        assert_eq!("66a1f0".parse::<EntryRef>(), Ok(EntryRef::Id("66a1f0".to_string())));
        assert!(" ".parse::<EntryRef>().is_err());
    }

    #[test]
    fn test_success_replaces_snapshot_and_records_notice() {
        let api = FakeApi::default();
        let portfolio = persisted(&api);
        let mut editor = PortfolioEditor::new(&api, portfolio, false);

        editor.add_entry(project("CLI")).unwrap();
        assert_eq!(editor.portfolio().projects.len(), 2);
        assert_eq!(editor.portfolio(), &api.stored().unwrap());
        assert_eq!(editor.take_notice().unwrap().message, "Project added");
        assert!(editor.take_notice().is_none());
    }

    #[test]
    fn test_skill_removal_is_keyed_and_server_confirmed() {
        let api = FakeApi::default();
        let portfolio = persisted(&api);
        let mut editor = PortfolioEditor::new(&api, portfolio, false);
        editor.add_skill("Python").unwrap();
        assert_eq!(editor.portfolio().skills, vec!["JavaScript", "Python"]);

        api.reject_with(Some(500));
        assert!(editor.remove_skill("JavaScript").is_err());
        assert_eq!(editor.portfolio().skills, vec!["JavaScript", "Python"]);

        api.reject_with(None);
        editor.remove_skill("JavaScript").unwrap();
        assert_eq!(editor.portfolio().skills, vec!["Python"]);
        assert_eq!(
            api.calls().last().map(String::as_str),
            Some(format!("DELETE /api/portfolios/{}/skills/JavaScript", editor.portfolio().id).as_str())
        );
    }

    #[test]
    fn test_duplicate_skill_never_reaches_server() {
        let api = FakeApi::default();
        let portfolio = persisted(&api);
        let mut editor = PortfolioEditor::new(&api, portfolio, false);
        let before = api.calls().len();
        assert!(matches!(editor.add_skill("javascript"), Err(ServiceError::Validation(_))));
        assert_eq!(api.calls().len(), before);
    }

    #[test]
    fn test_cv_gate_only_when_enabled() {
        let api = FakeApi::default();
        let portfolio = persisted(&api);

        let mut gated = PortfolioEditor::new(&api, portfolio.clone(), true);
        assert!(matches!(gated.add_entry(education()), Err(ServiceError::GateClosed(_))));
        // projects are never gated
        gated.add_entry(project("Gate-free")).unwrap();

        let mut open = PortfolioEditor::new(&api, api.stored().unwrap(), false);
        open.add_entry(education()).unwrap();
        assert_eq!(open.portfolio().education.len(), 2);
    }

    #[test]
    fn test_cv_generation_opens_the_gate() {
        let api = FakeApi::default();
        let portfolio = persisted(&api);
        let mut editor = PortfolioEditor::new(&api, portfolio, true);

        let info = PersonalInfo {
            first_name: "Sam".to_string(),
            last_name: "Lee".to_string(),
            ..Default::default()
        };
        let url = editor.generate_cv("u1", &info).unwrap();
        assert!(url.ends_with("cv_u1.pdf"));
        assert!(editor.portfolio().has_cv());
        editor.add_entry(education()).unwrap();
    }

    #[test]
    fn test_stale_references_are_rejected_locally() {
        let api = FakeApi::default();
        let portfolio = persisted(&api);
        let project_id = portfolio.projects[0].id.clone().unwrap();
        let mut editor = PortfolioEditor::new(&api, portfolio, false);
        let before = api.calls().len();

        assert!(matches!(
            editor.remove_entry(Section::Projects, &EntryRef::Index(3)),
            Err(ServiceError::StaleEntry(_))
        ));
        assert!(matches!(
            editor.remove_entry(Section::Projects, &EntryRef::Id("gone".to_string())),
            Err(ServiceError::StaleEntry(_))
        ));
        assert!(matches!(editor.remove_skill("Cobol"), Err(ServiceError::StaleEntry(_))));
        assert_eq!(api.calls().len(), before);

        let id = EntryRef::Id(project_id);
        editor.remove_entry(Section::Projects, &id).unwrap();
        assert!(editor.portfolio().projects.is_empty());
        assert!(matches!(
            editor.remove_entry(Section::Projects, &id),
            Err(ServiceError::StaleEntry(_))
        ));
    }

    #[test]
    fn test_update_by_id_sends_resolved_index() {
        let api = FakeApi::default();
        let portfolio = persisted(&api);
        let mut editor = PortfolioEditor::new(&api, portfolio, false);
        editor.add_entry(project("Second")).unwrap();
        let second_id = editor.portfolio().projects[1].id.clone().unwrap();

        editor
            .update_entry(&EntryRef::Id(second_id), project("Second, renamed"))
            .unwrap();
        assert_eq!(editor.portfolio().projects[1].title, "Second, renamed");
        assert!(api.calls().last().unwrap().ends_with("/projects/1"));
    }

    #[test]
    fn test_network_failure_leaves_snapshot() {
        let api = FakeApi::default();
        let portfolio = persisted(&api);
        let mut editor = PortfolioEditor::new(&api, portfolio.clone(), false);

        api.go_offline(true);
        let err = editor.set_about("New bio").unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(editor.portfolio(), &portfolio);
        assert!(editor.take_notice().is_none());
    }

    #[test]
    fn test_attached_cv_opens_the_gate() {
        let api = FakeApi::default();
        let portfolio = persisted(&api);
        let mut editor = PortfolioEditor::new(&api, portfolio, true);
        assert!(matches!(editor.add_entry(education()), Err(ServiceError::GateClosed(_))));

        let sent = api.calls().len();
        assert!(matches!(editor.attach_cv(CvFile::default()), Err(ServiceError::Validation(_))));
        assert_eq!(api.calls().len(), sent);

        let cv_file = CvFile {
            filename: "resume.pdf".to_string(),
            path: "/uploads/resumes/resume.pdf".to_string(),
            file_type: "application/pdf".to_string(),
            ..Default::default()
        };
        editor.attach_cv(cv_file.clone()).unwrap();
        assert_eq!(editor.portfolio().cv_file.as_ref(), Some(&cv_file));
        assert_eq!(editor.take_notice().unwrap().message, "CV \"resume.pdf\" attached");
        let expected = format!("PUT /api/portfolios/update-cv/{}", editor.portfolio().id);
        assert_eq!(api.calls().last(), Some(&expected));

        editor.add_entry(education()).unwrap();
        assert_eq!(editor.portfolio().education.len(), 2);
    }

    #[test]
    fn test_refresh_and_whole_document_replace() {
        let api = FakeApi::default();
        let portfolio = persisted(&api);
        let mut editor = PortfolioEditor::new(&api, portfolio.clone(), false);

        let mut document = portfolio.clone();
        document.about = "Rewritten".to_string();
        editor.replace_document(&document).unwrap();
        assert_eq!(editor.portfolio().about, "Rewritten");

        let mut other = portfolio.clone();
        other.id = "someone-else".to_string();
        assert!(matches!(editor.replace_document(&other), Err(ServiceError::StaleEntry(_))));

        let mut behind = PortfolioEditor::new(&api, portfolio, false);
        assert_eq!(behind.refresh("u1").unwrap().about, "Rewritten");
        assert!(matches!(behind.refresh("nobody"), Err(ServiceError::NotFound(_))));
    }

    #[test]
    fn test_links_validated_before_sending() {
        let api = FakeApi::default();
        let portfolio = persisted(&api);
        let mut editor = PortfolioEditor::new(&api, portfolio, false);
        let bad = SocialLinks {
            github: Some("github.com/x".to_string()),
            ..Default::default()
        };
        assert!(editor.set_social_links(&bad).is_err());

        let good = SocialLinks {
            github: Some("https://github.com/x".to_string()),
            ..Default::default()
        };
        editor.set_social_links(&good).unwrap();
        assert_eq!(editor.portfolio().social_links, good);
    }
}
