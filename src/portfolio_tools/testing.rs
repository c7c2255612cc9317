//! In-memory stand-in for the Portfolio API used by unit tests.

use std::cell::{Cell, RefCell};

use serde_json::{Value, json};

use crate::error::{ServiceError, ServiceResult};
use crate::portfolio_tools::client::{Mutation, PortfolioApi};
use crate::portfolio_tools::types::{
    CreatePortfolioRequest, CvFile, CvRequest, DraftFile, EducationInput, ExperienceInput,
    GeneratedCv, Portfolio, PortfolioCertificate, ProjectInput, Section, SectionEntry,
    Subscription,
};

#[derive(Default)]
pub struct FakeApi {
    stored: RefCell<Option<Portfolio>>,
    calls: RefCell<Vec<String>>,
    offline: Cell<bool>,
    reject_status: Cell<Option<u16>>,
    next_id: Cell<u32>,
    subscription: RefCell<Option<Subscription>>,
}

impl FakeApi {
    pub fn with_portfolio(portfolio: Portfolio) -> Self {
        let api = Self::default();
        api.stored.replace(Some(portfolio));
        api
    }

    pub fn with_subscription(subscription: Subscription) -> Self {
        let api = Self::default();
        api.subscription.replace(Some(subscription));
        api
    }

    pub fn go_offline(&self, offline: bool) {
        self.offline.set(offline);
    }

    pub fn reject_with(&self, status: Option<u16>) {
        self.reject_status.set(status);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn stored(&self) -> Option<Portfolio> {
        self.stored.borrow().clone()
    }

    fn record(&self, method: &str, path: &str) -> ServiceResult<()> {
        self.calls.borrow_mut().push(format!("{method} {path}"));
        if self.offline.get() {
            return Err(ServiceError::Network("connection refused".to_string()));
        }
        if let Some(status) = self.reject_status.get() {
            return Err(ServiceError::Rejected {
                status,
                message: "simulated failure".to_string(),
            });
        }
        Ok(())
    }

    fn fresh_id(&self, prefix: &str) -> String {
        let next = self.next_id.get() + 1;
        self.next_id.set(next);
        format!("{prefix}-{next}")
    }

    fn not_found(what: &str) -> ServiceError {
        ServiceError::NotFound(format!("{what} not found"))
    }

    fn with_id(&self, entry: SectionEntry) -> SectionEntry {
        let id = Some(self.fresh_id(entry.section().as_str()));
        match entry {
            SectionEntry::Education(mut r) => {
                r.id = id;
                SectionEntry::Education(r)
            }
            SectionEntry::Experience(mut r) => {
                r.id = id;
                SectionEntry::Experience(r)
            }
            SectionEntry::Project(mut r) => {
                r.id = id;
                SectionEntry::Project(r)
            }
            SectionEntry::Certificate(mut r) => {
                r.id = id;
                SectionEntry::Certificate(r)
            }
        }
    }

    fn place(portfolio: &mut Portfolio, index: Option<usize>, entry: SectionEntry) -> ServiceResult<()> {
        fn put<T>(items: &mut Vec<T>, index: Option<usize>, item: T) -> ServiceResult<()> {
            match index {
                None => items.push(item),
                Some(i) if i < items.len() => items[i] = item,
                Some(_) => return Err(FakeApi::not_found("Entry")),
            }
            Ok(())
        }
        match entry {
            SectionEntry::Education(r) => put(&mut portfolio.education, index, r),
            SectionEntry::Experience(r) => put(&mut portfolio.experience, index, r),
            SectionEntry::Project(r) => put(&mut portfolio.projects, index, r),
            SectionEntry::Certificate(r) => {
                put(&mut portfolio.certificates, index, PortfolioCertificate::Embedded(r))
            }
        }
    }

    fn delete(portfolio: &mut Portfolio, section: Section, index: usize) -> ServiceResult<()> {
        if index >= portfolio.section_len(section) {
            return Err(Self::not_found("Entry"));
        }
        match section {
            Section::Education => drop(portfolio.education.remove(index)),
            Section::Experience => drop(portfolio.experience.remove(index)),
            Section::Projects => drop(portfolio.projects.remove(index)),
            Section::Certificates => drop(portfolio.certificates.remove(index)),
        }
        Ok(())
    }
}

impl PortfolioApi for FakeApi {
    fn create_portfolio(&self, request: &CreatePortfolioRequest<'_>) -> ServiceResult<Portfolio> {
        self.record("POST", "/api/portfolios")?;
        if request.draft.education.iter().next().is_none() {
            return Err(ServiceError::Rejected {
                status: 400,
                message: "Portfolio must include education".to_string(),
            });
        }

        let mut value = serde_json::to_value(request)?;
        value["_id"] = json!(self.fresh_id("portfolio"));
        for section in ["education", "experience", "projects", "certificates"] {
            if let Some(items) = value.get_mut(section).and_then(Value::as_array_mut) {
                for item in items {
                    item["_id"] = json!(self.fresh_id(section));
                }
            }
        }
        let portfolio: Portfolio = serde_json::from_value(value)?;
        self.stored.replace(Some(portfolio.clone()));
        Ok(portfolio)
    }

    fn fetch_for_user(&self, user_id: &str) -> ServiceResult<Option<Portfolio>> {
        self.record("GET", &format!("/api/portfolios/user/{user_id}"))?;
        Ok(self
            .stored()
            .filter(|portfolio| portfolio.owner_id() == Some(user_id)))
    }

    fn replace_portfolio(&self, portfolio: &Portfolio) -> ServiceResult<Portfolio> {
        self.record("PUT", &format!("/api/portfolios/{}", portfolio.id))?;
        self.stored.replace(Some(portfolio.clone()));
        Ok(portfolio.clone())
    }

    fn mutate(&self, portfolio_id: &str, mutation: &Mutation) -> ServiceResult<Portfolio> {
        let (method, path) = mutation.route(portfolio_id);
        self.record(method, &path)?;

        let mut portfolio = self
            .stored()
            .filter(|p| p.id == portfolio_id)
            .ok_or_else(|| Self::not_found("Portfolio"))?;
        match mutation {
            Mutation::Add(entry) => Self::place(&mut portfolio, None, self.with_id(entry.clone()))?,
            Mutation::Update { index, entry } => {
                Self::place(&mut portfolio, Some(*index), entry.clone())?
            }
            Mutation::Delete { section, index } => Self::delete(&mut portfolio, *section, *index)?,
            Mutation::AddSkill(skill) => {
                if !portfolio.skills.contains(skill) {
                    portfolio.skills.push(skill.clone());
                }
            }
            Mutation::RemoveSkill(skill) => portfolio.skills.retain(|s| s != skill),
            Mutation::SocialLinks(links) => portfolio.social_links = links.clone(),
            Mutation::About(about) => portfolio.about = about.clone(),
            Mutation::AttachCv(cv_file) => portfolio.cv_file = Some(cv_file.clone()),
        }
        self.stored.replace(Some(portfolio.clone()));
        Ok(portfolio)
    }

    fn generate_cv(&self, request: &CvRequest<'_>) -> ServiceResult<GeneratedCv> {
        self.record("POST", "/api/portfolios/generate-cv")?;
        let mut portfolio = self
            .stored()
            .filter(|p| p.owner_id() == Some(request.user_id))
            .ok_or_else(|| Self::not_found("Portfolio"))?;
        let filename = format!("cv_{}.pdf", request.user_id);
        let download_url = format!("http://localhost:5000/uploads/resumes/{filename}");
        portfolio.cv_file = Some(CvFile {
            path: format!("/uploads/resumes/{filename}"),
            filename,
            download_url: Some(download_url.clone()),
            upload_date: None,
            file_type: "application/pdf".to_string(),
        });
        self.stored.replace(Some(portfolio.clone()));
        Ok(GeneratedCv {
            download_url,
            portfolio,
        })
    }

    fn user_subscription(&self) -> ServiceResult<Subscription> {
        self.record("GET", "/api/subscriptions/user-subscription")?;
        self.subscription
            .borrow()
            .clone()
            .ok_or_else(|| Self::not_found("Subscription"))
    }
}

/// A complete, valid draft: one education, experience, project and skill.
pub fn sample_draft_file() -> DraftFile {
    DraftFile {
        education: vec![EducationInput {
            school: "State University".to_string(),
            degree: "BSc".to_string(),
            field_of_study: "CS".to_string(),
            start_date: "2018-09-01".to_string(),
            end_date: Some("2022-06-01".to_string()),
            currently_enrolled: false,
            ..Default::default()
        }],
        experience: vec![ExperienceInput {
            company: "Acme".to_string(),
            position: "Developer".to_string(),
            start_date: "2022-07-01".to_string(),
            currently_working: true,
            ..Default::default()
        }],
        projects: vec![ProjectInput {
            title: "Job board".to_string(),
            technologies: vec!["React".to_string(), "Node".to_string()],
            ..Default::default()
        }],
        skills: vec!["JavaScript".to_string()],
        ..Default::default()
    }
}

/// A persisted portfolio owned by `u1`, built through the fake's own create path.
pub fn persisted(api: &FakeApi) -> Portfolio {
    let wizard = crate::portfolio_tools::wizard::PortfolioWizard::replay(&sample_draft_file())
        .expect("sample draft is valid");
    wizard.submit(api, "u1").expect("fake accepts sample draft")
}
