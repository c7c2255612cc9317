use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::error::{ServiceError, ServiceResult};
use crate::portfolio_tools::client::PortfolioApi;
use crate::portfolio_tools::types::{
    CertificateInput, CertificateRecord, CreatePortfolioRequest, DraftFile, EducationInput,
    ExperienceInput, Portfolio, ProjectInput, ProjectRecord, SocialLinks, ValidationError,
    WizardDraft,
};
use crate::portfolio_tools::validator::{
    validate_certificate, validate_education, validate_experience, validate_project,
    validate_social_links, validate_tag,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WizardStep {
    Education = 1,
    Experience = 2,
    Projects = 3,
    Skills = 4,
    SocialLinks = 5,
    About = 6,
    Certificates = 7,
}

impl WizardStep {
    pub const ALL: [WizardStep; 7] = [
        WizardStep::Education,
        WizardStep::Experience,
        WizardStep::Projects,
        WizardStep::Skills,
        WizardStep::SocialLinks,
        WizardStep::About,
        WizardStep::Certificates,
    ];

    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn from_number(number: u8) -> Option<Self> {
        Self::ALL.get(usize::from(number).checked_sub(1)?).copied()
    }

    pub fn title(self) -> &'static str {
        match self {
            WizardStep::Education => "Education",
            WizardStep::Experience => "Experience",
            WizardStep::Projects => "Projects",
            WizardStep::Skills => "Skills",
            WizardStep::SocialLinks => "Social Links",
            WizardStep::About => "About",
            WizardStep::Certificates => "Certificates",
        }
    }

    /// Steps that need at least one admitted entry before moving on.
    pub fn is_gated(self) -> bool {
        matches!(
            self,
            WizardStep::Education | WizardStep::Experience | WizardStep::Projects | WizardStep::Skills
        )
    }

    pub fn is_last(self) -> bool {
        self == WizardStep::Certificates
    }

    pub fn next(self) -> Option<Self> {
        Self::from_number(self.number() + 1)
    }

    pub fn prev(self) -> Self {
        Self::from_number(self.number().saturating_sub(1)).unwrap_or(WizardStep::Education)
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Step {} of {}: {}", self.number(), Self::ALL.len(), self.title())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WizardError {
    #[error("Add at least one {} entry before continuing", .0.title().to_lowercase())]
    StepIncomplete(WizardStep),
    #[error("{} is the last step", .0.title())]
    NoNextStep(WizardStep),
    #[error("{entry} entries belong to the {} step, not {}", .expected.title(), .current.title())]
    WrongStep {
        entry: &'static str,
        expected: WizardStep,
        current: WizardStep,
    },
    #[error("The portfolio can only be submitted from the final step (currently on {})", .0.title())]
    NotAtFinalStep(WizardStep),
}

/// Ordered tag sub-list edited one tag at a time inside a sub-form.
#[derive(Clone, Debug, PartialEq)]
pub struct TagList {
    field: &'static str,
    tags: Vec<String>,
}

impl TagList {
    pub fn new(field: &'static str) -> Self {
        Self {
            field,
            tags: Vec::new(),
        }
    }

    pub fn add(&mut self, tag: &str) -> Result<(), ValidationError> {
        let tag = validate_tag(self.field, tag, self.tags.iter().map(String::as_str))?;
        self.tags.push(tag);
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Option<String> {
        (index < self.tags.len()).then(|| self.tags.remove(index))
    }

    pub fn as_slice(&self) -> &[String] {
        &self.tags
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProjectForm {
    pub title: String,
    pub description: String,
    pub link: String,
    pub image: String,
    pub technologies: TagList,
}

impl Default for ProjectForm {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            link: String::new(),
            image: String::new(),
            technologies: TagList::new("technologies"),
        }
    }
}

impl ProjectForm {
    /// Loads a whole input, adding its technologies one by one.
    pub fn from_input(input: &ProjectInput) -> Result<Self, ValidationError> {
        let mut form = Self {
            title: input.title.clone(),
            description: input.description.clone(),
            link: input.link.clone(),
            image: input.image.clone(),
            ..Default::default()
        };
        for technology in &input.technologies {
            form.technologies.add(technology)?;
        }
        Ok(form)
    }

    pub fn build(&self) -> Result<ProjectRecord, ValidationError> {
        validate_project(&ProjectInput {
            title: self.title.clone(),
            description: self.description.clone(),
            technologies: self.technologies.as_slice().to_vec(),
            link: self.link.clone(),
            image: self.image.clone(),
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CertificateForm {
    pub title: String,
    pub description: String,
    pub certificate_url: String,
    pub skills: TagList,
}

impl Default for CertificateForm {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            certificate_url: String::new(),
            skills: TagList::new("skills"),
        }
    }
}

impl CertificateForm {
    pub fn from_input(input: &CertificateInput) -> Result<Self, ValidationError> {
        let mut form = Self {
            title: input.title.clone(),
            description: input.description.clone(),
            certificate_url: input.certificate_url.clone(),
            ..Default::default()
        };
        for skill in &input.skills {
            form.skills.add(skill)?;
        }
        Ok(form)
    }

    pub fn build(&self) -> Result<CertificateRecord, ValidationError> {
        validate_certificate(&CertificateInput {
            title: self.title.clone(),
            description: self.description.clone(),
            skills: self.skills.as_slice().to_vec(),
            certificate_url: self.certificate_url.clone(),
        })
    }
}

/// Sub-form output offered to the step that owns it.
#[derive(Clone, Debug, PartialEq)]
pub enum EntryInput {
    Education(EducationInput),
    Experience(ExperienceInput),
    Project(ProjectForm),
    Skill(String),
    Certificate(CertificateForm),
}

impl EntryInput {
    pub fn step(&self) -> WizardStep {
        match self {
            EntryInput::Education(_) => WizardStep::Education,
            EntryInput::Experience(_) => WizardStep::Experience,
            EntryInput::Project(_) => WizardStep::Projects,
            EntryInput::Skill(_) => WizardStep::Skills,
            EntryInput::Certificate(_) => WizardStep::Certificates,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            EntryInput::Education(_) => "Education",
            EntryInput::Experience(_) => "Experience",
            EntryInput::Project(_) => "Project",
            EntryInput::Skill(_) => "Skill",
            EntryInput::Certificate(_) => "Certificate",
        }
    }
}

/// A submission that did not produce a portfolio. The wizard comes back
/// untouched so the user can retry.
#[derive(Debug)]
pub struct SubmitFailure {
    pub wizard: PortfolioWizard,
    pub error: ServiceError,
}

/// Step-sequenced draft builder. Nothing reaches the remote store until
/// [`PortfolioWizard::submit`].
#[derive(Clone, Debug, PartialEq)]
pub struct PortfolioWizard {
    step: WizardStep,
    draft: WizardDraft,
    project_form: ProjectForm,
    certificate_form: CertificateForm,
}

impl Default for PortfolioWizard {
    fn default() -> Self {
        Self::new()
    }
}

impl PortfolioWizard {
    pub fn new() -> Self {
        Self {
            step: WizardStep::Education,
            draft: WizardDraft::default(),
            project_form: ProjectForm::default(),
            certificate_form: CertificateForm::default(),
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn draft(&self) -> &WizardDraft {
        &self.draft
    }

    /// Number of admitted entries for collection steps, `None` for scalar steps.
    pub fn entry_count(&self, step: WizardStep) -> Option<usize> {
        match step {
            WizardStep::Education => Some(self.draft.education.len()),
            WizardStep::Experience => Some(self.draft.experience.len()),
            WizardStep::Projects => Some(self.draft.projects.len()),
            WizardStep::Skills => Some(self.draft.skills.len()),
            WizardStep::Certificates => Some(self.draft.certificates.len()),
            WizardStep::SocialLinks | WizardStep::About => None,
        }
    }

    pub fn can_advance(&self) -> bool {
        !self.step.is_last() && (!self.step.is_gated() || self.entry_count(self.step).unwrap_or(0) > 0)
    }

    pub fn next_step(&mut self) -> Result<WizardStep, WizardError> {
        let next = self.step.next().ok_or(WizardError::NoNextStep(self.step))?;
        if self.step.is_gated() && self.entry_count(self.step).unwrap_or(0) == 0 {
            debug!(step = self.step.number(), "step gate not met");
            return Err(WizardError::StepIncomplete(self.step));
        }
        self.step = next;
        debug!(step = next.number(), "wizard advanced");
        Ok(next)
    }

    pub fn prev_step(&mut self) -> WizardStep {
        self.step = self.step.prev();
        self.step
    }

    fn expect_step(&self, entry: &'static str, expected: WizardStep) -> Result<(), WizardError> {
        if self.step == expected {
            Ok(())
        } else {
            Err(WizardError::WrongStep {
                entry,
                expected,
                current: self.step,
            })
        }
    }

    /// Validate and admit one entry into the current step's collection. On
    /// failure the draft is left exactly as it was.
    pub fn add_entry(&mut self, input: EntryInput) -> ServiceResult<Ulid> {
        self.expect_step(input.kind(), input.step())?;
        let id = match input {
            EntryInput::Education(input) => self.draft.education.push(validate_education(&input)?),
            EntryInput::Experience(input) => {
                self.draft.experience.push(validate_experience(&input)?)
            }
            EntryInput::Project(form) => self.draft.projects.push(form.build()?),
            EntryInput::Skill(skill) => {
                let skill = validate_tag("skills", &skill, self.draft.skills.iter().map(String::as_str))?;
                self.draft.skills.push(skill)
            }
            EntryInput::Certificate(form) => self.draft.certificates.push(form.build()?),
        };
        debug!(step = self.step.number(), %id, "entry admitted");
        Ok(id)
    }

    /// The project sub-form being filled in on the projects step.
    pub fn project_form(&mut self) -> &mut ProjectForm {
        &mut self.project_form
    }

    pub fn certificate_form(&mut self) -> &mut CertificateForm {
        &mut self.certificate_form
    }

    /// Admit the pending project sub-form and clear it. A rejected form is
    /// kept so it can be corrected.
    pub fn admit_project_form(&mut self) -> ServiceResult<Ulid> {
        let id = self.add_entry(EntryInput::Project(self.project_form.clone()))?;
        self.project_form = ProjectForm::default();
        Ok(id)
    }

    pub fn admit_certificate_form(&mut self) -> ServiceResult<Ulid> {
        let id = self.add_entry(EntryInput::Certificate(self.certificate_form.clone()))?;
        self.certificate_form = CertificateForm::default();
        Ok(id)
    }

    /// Client-side ids of the entries on `step`, in display order.
    pub fn entry_ids(&self, step: WizardStep) -> Vec<Ulid> {
        match step {
            WizardStep::Education => self.draft.education.ids().collect(),
            WizardStep::Experience => self.draft.experience.ids().collect(),
            WizardStep::Projects => self.draft.projects.ids().collect(),
            WizardStep::Skills => self.draft.skills.ids().collect(),
            WizardStep::Certificates => self.draft.certificates.ids().collect(),
            WizardStep::SocialLinks | WizardStep::About => Vec::new(),
        }
    }

    /// Positional removal from the current step's collection. The position is
    /// resolved to the entry's id first. Out of range indexes and scalar steps
    /// are a no-op.
    pub fn remove_entry(&mut self, index: usize) -> bool {
        let removed = match self.entry_ids(self.step).get(index) {
            Some(&id) => self.remove_entry_by_id(id),
            None => false,
        };
        debug!(step = self.step.number(), index, removed, "remove entry");
        removed
    }

    pub fn remove_entry_by_id(&mut self, id: Ulid) -> bool {
        self.draft.education.remove_id(id).is_some()
            || self.draft.experience.remove_id(id).is_some()
            || self.draft.projects.remove_id(id).is_some()
            || self.draft.skills.remove_id(id).is_some()
            || self.draft.certificates.remove_id(id).is_some()
    }

    pub fn set_social_links(&mut self, links: &SocialLinks) -> ServiceResult<()> {
        self.expect_step("Social link", WizardStep::SocialLinks)?;
        self.draft.social_links = validate_social_links(links)?;
        Ok(())
    }

    pub fn set_about(&mut self, about: &str) -> ServiceResult<()> {
        self.expect_step("About", WizardStep::About)?;
        let about = about.trim();
        self.draft.about = (!about.is_empty()).then(|| about.to_string());
        Ok(())
    }

    /// Send the whole draft as one create request. Only allowed from the
    /// final step; on any failure the wizard is handed back unchanged.
    pub fn submit<A: PortfolioApi + ?Sized>(
        self,
        api: &A,
        user_id: &str,
    ) -> Result<Portfolio, SubmitFailure> {
        if !self.step.is_last() {
            let error = WizardError::NotAtFinalStep(self.step).into();
            return Err(SubmitFailure { wizard: self, error });
        }
        if user_id.trim().is_empty() {
            let error = ValidationError::on_field("userId", "A user id is required to create a portfolio").into();
            return Err(SubmitFailure { wizard: self, error });
        }

        let request = CreatePortfolioRequest {
            user_id,
            draft: &self.draft,
        };
        match api.create_portfolio(&request) {
            Ok(portfolio) => {
                info!(portfolio_id = %portfolio.id, "portfolio created");
                Ok(portfolio)
            }
            Err(error) => {
                warn!(%error, "portfolio submission failed; draft kept");
                Err(SubmitFailure { wizard: self, error })
            }
        }
    }

    /// Drive a fresh wizard through every step with a prepared draft, so the
    /// same validation and gates apply as for interactive entry. Ends on the
    /// final step, ready to submit.
    pub fn replay(file: &DraftFile) -> ServiceResult<Self> {
        let mut wizard = Self::new();

        for input in &file.education {
            wizard.add_entry(EntryInput::Education(input.clone()))?;
        }
        wizard.next_step()?;
        for input in &file.experience {
            wizard.add_entry(EntryInput::Experience(input.clone()))?;
        }
        wizard.next_step()?;
        for input in &file.projects {
            wizard.add_entry(EntryInput::Project(ProjectForm::from_input(input)?))?;
        }
        wizard.next_step()?;
        for skill in &file.skills {
            wizard.add_entry(EntryInput::Skill(skill.clone()))?;
        }
        wizard.next_step()?;
        wizard.set_social_links(&file.social_links)?;
        wizard.next_step()?;
        if let Some(about) = &file.about {
            wizard.set_about(about)?;
        }
        wizard.next_step()?;
        for input in &file.certificates {
            wizard.add_entry(EntryInput::Certificate(CertificateForm::from_input(input)?))?;
        }

        Ok(wizard)
    }
}
