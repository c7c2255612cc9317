use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::Utc;
use colored::Colorize;
use dialoguer::theme::ColorfulTheme;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::cli::{Cli, Command, LinksArgs, PersonalInfoArgs, SkillAction};
use crate::error::{ServiceError, ServiceResult};
use crate::metadata::{PKG_NAME, PKG_VERSION};
use crate::portfolio_tools::progress::progress;
use crate::portfolio_tools::types::{
    CertificateInput, DraftFile, EducationInput, ExperienceInput, Portfolio, ProjectInput,
    Section, SectionEntry,
};
use crate::portfolio_tools::validator::{
    validate_certificate, validate_education, validate_experience, validate_project,
};
use crate::portfolio_tools::{
    EntryInput, Landing, PortfolioApi, PortfolioClient, PortfolioEditor, PortfolioWizard,
    WizardStep, create_portfolio_client, open_portfolio,
};
use crate::prompts::{self, StepAction};
use crate::settings::Settings;
use crate::storage::SessionCache;

/// Run one CLI invocation. Every failure ends up as a single red line on
/// stderr and a non-zero exit code.
pub fn run(cli: Cli) -> ExitCode {
    match CommandHandler::new(&cli).and_then(|handler| handler.dispatch(cli.command)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err}", "error:".red().bold());
            if err.is_retryable() {
                eprintln!("{}", "Nothing was changed; re-run the command to retry.".yellow());
            }
            ExitCode::FAILURE
        }
    }
}

pub struct CommandHandler {
    settings: Settings,
    settings_path: Option<PathBuf>,
    theme: ColorfulTheme,
}

impl CommandHandler {
    pub fn new(cli: &Cli) -> ServiceResult<Self> {
        cli.connection.validate().map_err(ServiceError::Other)?;
        let settings_path = cli.connection.settings.clone().or_else(Settings::default_path);
        let saved = match &settings_path {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };
        let settings = cli.connection.resolve(saved);
        settings.validate().map_err(ServiceError::Other)?;
        debug!(base_url = %settings.base_url, "settings resolved");
        Ok(Self {
            settings,
            settings_path,
            theme: ColorfulTheme::default(),
        })
    }

    pub fn dispatch(&self, command: Command) -> ServiceResult<()> {
        match command {
            Command::Version => {
                println!("{PKG_NAME} {PKG_VERSION}");
                Ok(())
            }
            Command::Schema => self.schema(),
            Command::Config => self.config(),
            Command::Wizard => self.wizard(),
            Command::Submit { draft } => self.submit(&draft),
            Command::Status => self.status(),
            Command::Add { section, file } => {
                let entry = read_entry(section, &file)?;
                self.edit(|editor| editor.add_entry(entry).map(drop))
            }
            Command::Update {
                section,
                entry,
                file,
            } => {
                let record = read_entry(section, &file)?;
                self.edit(|editor| editor.update_entry(&entry, record).map(drop))
            }
            Command::Remove { section, entry } => {
                self.edit(|editor| editor.remove_entry(section, &entry).map(drop))
            }
            Command::Skill { action } => match action {
                SkillAction::Add { name } => self.edit(|editor| editor.add_skill(&name).map(drop)),
                SkillAction::Remove { name } => {
                    self.edit(|editor| editor.remove_skill(&name).map(drop))
                }
            },
            Command::Replace { file } => {
                let document: Portfolio = read_json_file(&file)?;
                self.edit(|editor| editor.replace_document(&document).map(drop))
            }
            Command::About { text } => self.edit(|editor| editor.set_about(&text).map(drop)),
            Command::Links(args) => self.links(&args),
            Command::AttachCv(args) => {
                let cv_file = args.into_cv_file(Utc::now());
                self.edit(|editor| editor.attach_cv(cv_file).map(drop))
            }
            Command::GenerateCv(args) => self.generate_cv(args),
            Command::Subscription { refresh } => self.subscription(refresh),
        }
    }

    fn client(&self) -> ServiceResult<PortfolioClient> {
        let client = create_portfolio_client(
            &self.settings.base_url,
            self.settings.api_token.clone(),
            self.settings.timeout_secs,
        )?;
        debug!(base_url = client.base_url(), "portfolio client ready");
        Ok(client)
    }

    fn user_id(&self) -> ServiceResult<&str> {
        self.settings.user_id.as_deref().ok_or_else(|| {
            ServiceError::Other("No user id configured; pass --user-id or run `config`".to_string())
        })
    }

    fn session(&self, user_id: &str) -> SessionCache {
        let path = SessionCache::default_path()
            .unwrap_or_else(|_| std::env::temp_dir().join("portfolio-builder-session.json"));
        let mut session = SessionCache::open(path);
        session.bind_user(user_id);
        session
    }

    fn remember(&self, portfolio: &Portfolio) {
        let Ok(user_id) = self.user_id() else { return };
        let mut session = self.session(user_id);
        session.absorb(portfolio);
        if let Err(err) = session.save() {
            warn!(%err, "could not persist session cache");
        }
    }

    fn schema(&self) -> ServiceResult<()> {
        let schema = schemars::schema_for!(DraftFile);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        Ok(())
    }

    fn config(&self) -> ServiceResult<()> {
        let path = self
            .settings_path
            .clone()
            .ok_or_else(|| ServiceError::Other("No config directory; pass --settings <path>".to_string()))?;
        let current = Settings::load(&path)?;
        let updated = prompts::edit_settings(&self.theme, &current)?;
        updated.validate().map_err(ServiceError::Other)?;
        updated.save(&path)?;
        println!("{} {}", "Saved".green().bold(), path.display());
        Ok(())
    }

    fn submit(&self, draft: &Path) -> ServiceResult<()> {
        let file: DraftFile = read_json_file(draft)?;
        let wizard = PortfolioWizard::replay(&file)?;
        let client = self.client()?;
        let portfolio = wizard
            .submit(&client, self.user_id()?)
            .map_err(|failure| failure.error)?;
        println!("{}", "Portfolio created".green().bold());
        self.remember(&portfolio);
        print_portfolio(&portfolio);
        Ok(())
    }

    fn status(&self) -> ServiceResult<()> {
        let client = self.client()?;
        let user_id = self.user_id()?;
        match open_portfolio(&client, user_id) {
            Ok(Landing::Wizard(_)) => {
                let mut session = self.session(user_id);
                session.forget_portfolio();
                if let Err(err) = session.save() {
                    warn!(%err, "could not persist session cache");
                }
                println!(
                    "{}",
                    format!("No portfolio yet. Run `{PKG_NAME} wizard` to create one.").yellow()
                );
                Ok(())
            }
            Ok(Landing::Editor(portfolio)) => {
                self.remember(&portfolio);
                print_portfolio(&portfolio);
                Ok(())
            }
            Err(err @ ServiceError::Network(_)) => {
                let session = self.session(user_id);
                let Some(cached) = session.cached_portfolio() else {
                    return Err(err);
                };
                eprintln!("{} {err}", "offline:".yellow().bold());
                println!("{}", "Showing the last copy received from the server.".yellow());
                print_portfolio(cached);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Load the user's portfolio, apply one editor operation, report it. When
    /// the server turns the change down, the cached copy is brought up to date
    /// with what the server holds now.
    fn edit<F>(&self, op: F) -> ServiceResult<()>
    where
        F: FnOnce(&mut PortfolioEditor<'_, PortfolioClient>) -> ServiceResult<()>,
    {
        let client = self.client()?;
        let user_id = self.user_id()?;
        let portfolio = self.load_portfolio(&client)?;
        let mut editor = PortfolioEditor::new(&client, portfolio, self.settings.require_cv_for_sections);
        if let Err(err) = op(&mut editor) {
            if matches!(err, ServiceError::Rejected { .. } | ServiceError::NotFound(_)) {
                match editor.refresh(user_id) {
                    Ok(current) => self.remember(current),
                    Err(refresh_err) => debug!(%refresh_err, "could not refresh after rejection"),
                }
            }
            return Err(err);
        }
        if let Some(notice) = editor.take_notice() {
            println!(
                "{} {} {}",
                "✓".green().bold(),
                notice.message.green(),
                notice.at.format("%H:%M:%S").to_string().dimmed()
            );
        }
        let portfolio = editor.into_portfolio();
        self.remember(&portfolio);
        print_portfolio(&portfolio);
        Ok(())
    }

    fn load_portfolio(&self, client: &PortfolioClient) -> ServiceResult<Portfolio> {
        match open_portfolio(client, self.user_id()?)? {
            Landing::Editor(portfolio) => Ok(portfolio),
            Landing::Wizard(_) => Err(ServiceError::NotFound(format!(
                "no portfolio yet; run `{PKG_NAME} wizard` first"
            ))),
        }
    }

    fn links(&self, args: &LinksArgs) -> ServiceResult<()> {
        self.edit(|editor| {
            let links = args.merge_into(&editor.portfolio().social_links);
            editor.set_social_links(&links).map(drop)
        })
    }

    fn generate_cv(&self, args: PersonalInfoArgs) -> ServiceResult<()> {
        let info = if args.is_complete() {
            args.into_personal_info()
        } else {
            prompts::personal_info(&self.theme, args)?
        };
        let user_id = self.user_id()?;
        self.edit(|editor| {
            let url = editor.generate_cv(user_id, &info)?;
            println!("{} {}", "CV ready:".green().bold(), url.underline());
            Ok(())
        })
    }

    fn subscription(&self, refresh: bool) -> ServiceResult<()> {
        let client = self.client()?;
        let mut session = self.session(self.user_id()?);
        if refresh {
            session.invalidate_subscription();
        }
        let plan = session.subscription(Utc::now(), || client.user_subscription())?;
        if let Err(err) = session.save() {
            warn!(%err, "could not persist session cache");
        }

        println!("{} {}", "Plan:".bold(), plan.subscription.cyan());
        match plan.expiry_date {
            Some(expiry) => println!("{} {}", "Expires:".bold(), expiry.format("%Y-%m-%d")),
            None => println!("{} never", "Expires:".bold()),
        }
        Ok(())
    }

    fn wizard(&self) -> ServiceResult<()> {
        let client = self.client()?;
        let user_id = self.user_id()?;
        let mut wizard = match open_portfolio(&client, user_id)? {
            Landing::Wizard(wizard) => wizard,
            Landing::Editor(portfolio) => {
                println!("{}", "You already have a portfolio; use the edit commands instead.".yellow());
                print_portfolio(&portfolio);
                return Ok(());
            }
        };

        loop {
            let step = wizard.step();
            println!("\n{}", step.to_string().cyan().bold());
            print_draft_step(&wizard);

            let has_entries = wizard.entry_count(step).unwrap_or(0) > 0;
            match prompts::step_action(&self.theme, step, has_entries, wizard.can_advance())? {
                StepAction::Add => {
                    if let Err(err) = self.add_interactive(&mut wizard) {
                        eprintln!("{}", err.to_string().red());
                    }
                }
                StepAction::Remove => {
                    let labels = draft_labels(&wizard, step);
                    if let Some(index) = prompts::pick(&self.theme, "Remove which entry?", &labels)? {
                        wizard.remove_entry(index);
                    }
                }
                StepAction::Edit => {
                    if let Err(err) = self.edit_scalar(&mut wizard) {
                        eprintln!("{}", err.to_string().red());
                    }
                }
                StepAction::Next => {
                    if let Err(err) = wizard.next_step() {
                        eprintln!("{}", err.to_string().red());
                    }
                }
                StepAction::Back => {
                    wizard.prev_step();
                }
                StepAction::Submit => match wizard.submit(&client, user_id) {
                    Ok(portfolio) => {
                        println!("{}", "Portfolio created".green().bold());
                        self.remember(&portfolio);
                        print_portfolio(&portfolio);
                        return Ok(());
                    }
                    Err(failure) => {
                        eprintln!("{}", failure.error.to_string().red());
                        if failure.error.is_retryable() {
                            eprintln!("{}", "Your draft is intact; choose Submit again to retry.".yellow());
                        }
                        wizard = failure.wizard;
                    }
                },
                StepAction::Quit => {
                    if prompts::pick(&self.theme, "Discard this draft?", &["Discard"])?.is_some() {
                        return Ok(());
                    }
                }
            }
        }
    }

    fn add_interactive(&self, wizard: &mut PortfolioWizard) -> ServiceResult<()> {
        match wizard.step() {
            WizardStep::Education => {
                wizard.add_entry(EntryInput::Education(prompts::education(&self.theme)?))?;
            }
            WizardStep::Experience => {
                wizard.add_entry(EntryInput::Experience(prompts::experience(&self.theme)?))?;
            }
            WizardStep::Projects => {
                prompts::project(&self.theme, wizard.project_form())?;
                wizard.admit_project_form()?;
            }
            WizardStep::Skills => {
                wizard.add_entry(EntryInput::Skill(prompts::skill(&self.theme)?))?;
            }
            WizardStep::Certificates => {
                prompts::certificate(&self.theme, wizard.certificate_form())?;
                wizard.admit_certificate_form()?;
            }
            WizardStep::SocialLinks | WizardStep::About => return self.edit_scalar(wizard),
        }
        Ok(())
    }

    fn edit_scalar(&self, wizard: &mut PortfolioWizard) -> ServiceResult<()> {
        match wizard.step() {
            WizardStep::SocialLinks => {
                let links = prompts::social_links(&self.theme, &wizard.draft().social_links)?;
                wizard.set_social_links(&links)
            }
            WizardStep::About => {
                let about = prompts::about(&self.theme, wizard.draft().about.as_deref())?;
                wizard.set_about(&about)
            }
            _ => Ok(()),
        }
    }
}

fn read_json_file<T: DeserializeOwned>(path: &Path) -> ServiceResult<T> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Parse and validate one section entry from a JSON file.
fn read_entry(section: Section, path: &Path) -> ServiceResult<SectionEntry> {
    let entry = match section {
        Section::Education => {
            SectionEntry::Education(validate_education(&read_json_file::<EducationInput>(path)?)?)
        }
        Section::Experience => {
            SectionEntry::Experience(validate_experience(&read_json_file::<ExperienceInput>(path)?)?)
        }
        Section::Projects => {
            SectionEntry::Project(validate_project(&read_json_file::<ProjectInput>(path)?)?)
        }
        Section::Certificates => {
            SectionEntry::Certificate(validate_certificate(&read_json_file::<CertificateInput>(path)?)?)
        }
    };
    Ok(entry)
}

fn draft_labels(wizard: &PortfolioWizard, step: WizardStep) -> Vec<String> {
    let draft = wizard.draft();
    match step {
        WizardStep::Education => draft
            .education
            .iter()
            .map(|e| format!("{} at {}", e.degree, e.school))
            .collect(),
        WizardStep::Experience => draft
            .experience
            .iter()
            .map(|e| format!("{} at {}", e.position, e.company))
            .collect(),
        WizardStep::Projects => draft.projects.iter().map(|p| p.title.clone()).collect(),
        WizardStep::Skills => draft.skills.iter().cloned().collect(),
        WizardStep::Certificates => draft.certificates.iter().map(|c| c.title.clone()).collect(),
        WizardStep::SocialLinks | WizardStep::About => Vec::new(),
    }
}

fn print_draft_step(wizard: &PortfolioWizard) {
    let step = wizard.step();
    match step {
        WizardStep::SocialLinks => {
            for (slot, url) in wizard.draft().social_links.slots() {
                println!("  {slot:<9} {}", url.unwrap_or("-").dimmed());
            }
        }
        WizardStep::About => {
            println!("  {}", wizard.draft().about.as_deref().unwrap_or("-").dimmed());
        }
        _ => {
            let labels = draft_labels(wizard, step);
            if labels.is_empty() {
                println!("  {}", "(nothing added yet)".dimmed());
            }
            for (index, label) in labels.iter().enumerate() {
                println!("  {index}. {label}");
            }
        }
    }
}

fn print_portfolio(portfolio: &Portfolio) {
    let summary = progress(portfolio);
    let percentage = format!("{}%", summary.percentage);
    let percentage = if summary.percentage >= 85 {
        percentage.green()
    } else {
        percentage.yellow()
    };
    match portfolio.owner_id() {
        Some(owner) => println!(
            "{} {} {} ({})",
            "Portfolio".bold(),
            portfolio.id,
            format!("of {owner}").dimmed(),
            percentage.bold()
        ),
        None => println!("{} {} ({})", "Portfolio".bold(), portfolio.id, percentage.bold()),
    }

    let section = |name: &str, labels: Vec<String>| {
        println!("{}", name.cyan().bold());
        if labels.is_empty() {
            println!("  {}", "-".dimmed());
        }
        for (index, label) in labels.iter().enumerate() {
            println!("  {index}. {label}");
        }
    };
    section(
        "Education",
        portfolio
            .education
            .iter()
            .map(|e| with_id(format!("{} at {}", e.degree, e.school), e.id.as_deref()))
            .collect(),
    );
    section(
        "Experience",
        portfolio
            .experience
            .iter()
            .map(|e| with_id(format!("{} at {}", e.position, e.company), e.id.as_deref()))
            .collect(),
    );
    section(
        "Projects",
        portfolio
            .projects
            .iter()
            .map(|p| with_id(p.title.clone(), p.id.as_deref()))
            .collect(),
    );
    section(
        "Certificates",
        portfolio
            .certificates
            .iter()
            .map(|c| with_id(c.title().to_string(), c.id()))
            .collect(),
    );
    println!("{} {}", "Skills:".cyan().bold(), portfolio.skills.join(", "));
    if !portfolio.about.is_empty() {
        println!("{} {}", "About:".cyan().bold(), portfolio.about);
    }
    if !portfolio.social_links.is_empty() {
        println!("{}", "Links:".cyan().bold());
        for (slot, url) in portfolio.social_links.slots() {
            if let Some(url) = url.filter(|url| !url.trim().is_empty()) {
                println!("  {slot:<9} {url}");
            }
        }
    }
    if !summary.missing.is_empty() {
        println!("{} {}", "Missing:".yellow(), summary.missing.join(", "));
    }
}

fn with_id(label: String, id: Option<&str>) -> String {
    match id {
        Some(id) => format!("{label} {}", format!("[{id}]").dimmed()),
        None => label,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_read_entry_validates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("entry.json");
        fs::write(&path, r#"{ "title": "CLI", "technologies": ["Rust"] }"#).unwrap();
        match read_entry(Section::Projects, &path).unwrap() {
            SectionEntry::Project(record) => assert_eq!(record.technologies, vec!["Rust"]),
            other => panic!("unexpected entry {other:?}"),
        }

        fs::write(&path, r#"{ "school": "S", "degree": "D", "fieldOfStudy": "F", "startDate": "2020-01-01", "endDate": "2019-01-01" }"#).unwrap();
        assert!(matches!(read_entry(Section::Education, &path), Err(ServiceError::Validation(_))));
    }

    #[test]
    fn test_draft_labels_follow_step() {
        let wizard = PortfolioWizard::replay(&crate::portfolio_tools::testing::sample_draft_file()).unwrap();
        assert_eq!(draft_labels(&wizard, WizardStep::Education), vec!["BSc at State University"]);
        assert_eq!(draft_labels(&wizard, WizardStep::Skills), vec!["JavaScript"]);
        assert!(draft_labels(&wizard, WizardStep::About).is_empty());
    }

    #[test]
    fn test_missing_entry_file_is_io_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(matches!(read_entry(Section::Projects, &missing), Err(ServiceError::IoError(_))));
    }
}
