//! Interactive sub-forms for the wizard, the editor and `config`.

use colored::Colorize;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Select};

use crate::cli::PersonalInfoArgs;
use crate::error::ServiceResult;
use crate::portfolio_tools::types::{EducationInput, ExperienceInput, PersonalInfo, SocialLinks};
use crate::portfolio_tools::wizard::{CertificateForm, ProjectForm, TagList, WizardStep};
use crate::settings::Settings;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepAction {
    Add,
    Remove,
    Edit,
    Next,
    Back,
    Submit,
    Quit,
}

impl StepAction {
    fn label(self) -> &'static str {
        match self {
            StepAction::Add => "Add an entry",
            StepAction::Remove => "Remove an entry",
            StepAction::Edit => "Edit",
            StepAction::Next => "Next step",
            StepAction::Back => "Previous step",
            StepAction::Submit => "Submit portfolio",
            StepAction::Quit => "Quit without saving",
        }
    }
}

/// Actions that make sense on `step`, in menu order.
pub fn actions_for(step: WizardStep, has_entries: bool) -> Vec<StepAction> {
    let mut actions = Vec::new();
    match step {
        WizardStep::SocialLinks | WizardStep::About => actions.push(StepAction::Edit),
        _ => {
            actions.push(StepAction::Add);
            if has_entries {
                actions.push(StepAction::Remove);
            }
        }
    }
    if step.is_last() {
        actions.push(StepAction::Submit);
    } else {
        actions.push(StepAction::Next);
    }
    if step != WizardStep::Education {
        actions.push(StepAction::Back);
    }
    actions.push(StepAction::Quit);
    actions
}

/// `can_advance` only changes the label of "Next step"; choosing it on an
/// incomplete step still reports why the wizard cannot move on.
pub fn step_action(
    theme: &ColorfulTheme,
    step: WizardStep,
    has_entries: bool,
    can_advance: bool,
) -> ServiceResult<StepAction> {
    let actions = actions_for(step, has_entries);
    let labels: Vec<&str> = actions
        .iter()
        .map(|action| match action {
            StepAction::Next if !can_advance => "Next step (add an entry first)",
            action => action.label(),
        })
        .collect();
    let choice = Select::with_theme(theme)
        .with_prompt("What next?")
        .items(&labels[..])
        .default(0)
        .interact()?;
    Ok(actions[choice])
}

fn required(theme: &ColorfulTheme, prompt: &str, current: &str) -> ServiceResult<String> {
    let mut input = Input::<String>::with_theme(theme).with_prompt(prompt);
    if !current.is_empty() {
        input = input.with_initial_text(current);
    }
    Ok(input.interact_text()?)
}

fn optional(theme: &ColorfulTheme, prompt: &str, current: &str) -> ServiceResult<String> {
    let mut input = Input::<String>::with_theme(theme)
        .with_prompt(format!("{prompt} (optional)"))
        .allow_empty(true);
    if !current.is_empty() {
        input = input.with_initial_text(current);
    }
    Ok(input.interact_text()?)
}

fn confirm(theme: &ColorfulTheme, prompt: &str, default: bool) -> ServiceResult<bool> {
    Ok(Confirm::with_theme(theme)
        .with_prompt(prompt)
        .default(default)
        .interact()?)
}

pub fn education(theme: &ColorfulTheme) -> ServiceResult<EducationInput> {
    let school = required(theme, "School", "")?;
    let degree = required(theme, "Degree", "")?;
    let field_of_study = required(theme, "Field of study", "")?;
    let start_date = required(theme, "Start date (YYYY-MM-DD)", "")?;
    let currently_enrolled = confirm(theme, "Currently enrolled?", false)?;
    let end_date = if currently_enrolled {
        None
    } else {
        Some(required(theme, "End date (YYYY-MM-DD)", "")?)
    };
    Ok(EducationInput {
        school,
        degree,
        field_of_study,
        start_date,
        end_date,
        currently_enrolled,
        description: optional(theme, "Description", "")?,
        location: optional(theme, "Location", "")?,
    })
}

pub fn experience(theme: &ColorfulTheme) -> ServiceResult<ExperienceInput> {
    let company = required(theme, "Company", "")?;
    let position = required(theme, "Position", "")?;
    let start_date = required(theme, "Start date (YYYY-MM-DD)", "")?;
    let currently_working = confirm(theme, "Currently working here?", false)?;
    let end_date = if currently_working {
        None
    } else {
        Some(required(theme, "End date (YYYY-MM-DD)", "")?)
    };
    Ok(ExperienceInput {
        company,
        position,
        start_date,
        end_date,
        currently_working,
        description: optional(theme, "Description", "")?,
        location: optional(theme, "Location", "")?,
    })
}

/// Add tags one at a time until an empty line, then offer removals.
fn tags(theme: &ColorfulTheme, noun: &str, list: &mut TagList) -> ServiceResult<()> {
    loop {
        let tag = Input::<String>::with_theme(theme)
            .with_prompt(format!("Add {noun} (empty to finish)"))
            .allow_empty(true)
            .interact_text()?;
        if tag.trim().is_empty() {
            break;
        }
        if let Err(err) = list.add(&tag) {
            eprintln!("{}", err.to_string().red());
        }
    }
    while !list.is_empty() && confirm(theme, &format!("Remove a {noun}?"), false)? {
        if let Some(index) = pick(theme, &format!("Which {noun}?"), list.as_slice())? {
            list.remove(index);
        }
    }
    Ok(())
}

/// Fills the pending project form in place so a rejected form keeps its values.
pub fn project(theme: &ColorfulTheme, form: &mut ProjectForm) -> ServiceResult<()> {
    form.title = required(theme, "Title", &form.title)?;
    form.description = optional(theme, "Description", &form.description)?;
    form.link = optional(theme, "Link", &form.link)?;
    form.image = optional(theme, "Image URL", &form.image)?;
    tags(theme, "technology", &mut form.technologies)
}

pub fn certificate(theme: &ColorfulTheme, form: &mut CertificateForm) -> ServiceResult<()> {
    form.title = required(theme, "Title", &form.title)?;
    form.description = optional(theme, "Description", &form.description)?;
    form.certificate_url = optional(theme, "Certificate URL", &form.certificate_url)?;
    tags(theme, "skill", &mut form.skills)
}

pub fn skill(theme: &ColorfulTheme) -> ServiceResult<String> {
    required(theme, "Skill", "")
}

pub fn social_links(theme: &ColorfulTheme, current: &SocialLinks) -> ServiceResult<SocialLinks> {
    let slot = |name: &str, value: &Option<String>| -> ServiceResult<Option<String>> {
        let url = optional(theme, name, value.as_deref().unwrap_or_default())?;
        Ok(Some(url))
    };
    Ok(SocialLinks {
        linkedin: slot("LinkedIn", &current.linkedin)?,
        github: slot("GitHub", &current.github)?,
        website: slot("Website", &current.website)?,
        twitter: slot("Twitter", &current.twitter)?,
    })
}

pub fn about(theme: &ColorfulTheme, current: Option<&str>) -> ServiceResult<String> {
    optional(theme, "About you", current.unwrap_or_default())
}

/// Choose one of `labels`; `None` when there is nothing to choose or the
/// user backs out.
pub fn pick<T: ToString>(theme: &ColorfulTheme, prompt: &str, labels: &[T]) -> ServiceResult<Option<usize>> {
    if labels.is_empty() {
        return Ok(None);
    }
    let mut items: Vec<String> = labels.iter().map(ToString::to_string).collect();
    items.push("Cancel".to_string());
    let choice = Select::with_theme(theme)
        .with_prompt(prompt)
        .items(&items[..])
        .default(0)
        .interact()?;
    Ok((choice < labels.len()).then_some(choice))
}

/// Ask only for what the flags left out.
pub fn personal_info(theme: &ColorfulTheme, args: PersonalInfoArgs) -> ServiceResult<PersonalInfo> {
    let first_name = match args.first_name {
        Some(name) => name,
        None => required(theme, "First name", "")?,
    };
    let last_name = match args.last_name {
        Some(name) => name,
        None => required(theme, "Last name", "")?,
    };
    let blank_to_none = |value: String| (!value.trim().is_empty()).then_some(value);
    let email = match args.email {
        Some(email) => Some(email),
        None => blank_to_none(optional(theme, "Email", "")?),
    };
    let phone = match args.phone {
        Some(phone) => Some(phone),
        None => blank_to_none(optional(theme, "Phone", "")?),
    };
    let address = match args.address {
        Some(address) => Some(address),
        None => blank_to_none(optional(theme, "Address", "")?),
    };
    Ok(PersonalInfo {
        first_name,
        last_name,
        email,
        phone,
        address,
    })
}

pub fn edit_settings(theme: &ColorfulTheme, current: &Settings) -> ServiceResult<Settings> {
    let base_url = required(theme, "Portfolio API URL", &current.base_url)?;
    let api_token = optional(theme, "API token", current.api_token.as_deref().unwrap_or_default())?;
    let user_id = optional(theme, "User id", current.user_id.as_deref().unwrap_or_default())?;
    let require_cv_for_sections = confirm(
        theme,
        "Require a CV before adding education or experience?",
        current.require_cv_for_sections,
    )?;
    let timeout_secs = Input::<u64>::with_theme(theme)
        .with_prompt("Request timeout (seconds)")
        .default(current.timeout_secs)
        .interact_text()?;

    let blank_to_none = |value: String| (!value.trim().is_empty()).then(|| value.trim().to_string());
    Ok(Settings {
        base_url: base_url.trim().to_string(),
        api_token: blank_to_none(api_token),
        user_id: blank_to_none(user_id),
        require_cv_for_sections,
        timeout_secs,
    })
}
