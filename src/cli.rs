use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};

use crate::metadata::{PKG_DESCRIPTION, PKG_NAME, PKG_VERSION};
use crate::portfolio_tools::types::{CvFile, PersonalInfo, Section, SocialLinks};
use crate::portfolio_tools::EntryRef;
use crate::settings::Settings;

#[derive(Parser, Debug, Clone)]
#[command(name = PKG_NAME)]
#[command(version = PKG_VERSION)]
#[command(about = PKG_DESCRIPTION, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Build a new portfolio step by step
    Wizard,
    /// Replay a JSON draft through the wizard and submit it
    Submit {
        /// Draft file (see `schema` for its shape)
        #[arg(long)]
        draft: PathBuf,
    },
    /// Show the current portfolio and its completion
    Status,
    /// Add an entry to a section from a JSON file
    Add {
        section: Section,
        #[arg(long)]
        file: PathBuf,
    },
    /// Replace an entry, addressed by index or id
    Update {
        section: Section,
        entry: EntryRef,
        #[arg(long)]
        file: PathBuf,
    },
    /// Delete an entry, addressed by index or id
    Remove { section: Section, entry: EntryRef },
    /// Add or remove a skill
    Skill {
        #[command(subcommand)]
        action: SkillAction,
    },
    /// Replace the whole portfolio document from a JSON file
    Replace {
        #[arg(long)]
        file: PathBuf,
    },
    /// Replace the about text
    About { text: String },
    /// Replace the social links
    Links(LinksArgs),
    /// Attach an already uploaded CV file to the portfolio
    AttachCv(AttachCvArgs),
    /// Generate a CV PDF from the portfolio
    GenerateCv(PersonalInfoArgs),
    /// Show the current subscription plan
    Subscription {
        /// Bypass the session cache
        #[arg(long, default_value_t = false)]
        refresh: bool,
    },
    /// Print the JSON Schema of the draft file
    Schema,
    /// Open an interactive config editor for settings.json
    Config,
    /// Print version information
    Version,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SkillAction {
    Add { name: String },
    Remove { name: String },
}

#[derive(Args, Debug, Clone, Default)]
pub struct LinksArgs {
    #[arg(long)]
    pub linkedin: Option<String>,
    #[arg(long)]
    pub github: Option<String>,
    #[arg(long)]
    pub website: Option<String>,
    #[arg(long)]
    pub twitter: Option<String>,
}

impl LinksArgs {
    /// Flags left out keep their current value; an empty flag clears it.
    pub fn merge_into(&self, current: &SocialLinks) -> SocialLinks {
        let pick = |flag: &Option<String>, old: &Option<String>| flag.clone().or_else(|| old.clone());
        SocialLinks {
            linkedin: pick(&self.linkedin, &current.linkedin),
            github: pick(&self.github, &current.github),
            website: pick(&self.website, &current.website),
            twitter: pick(&self.twitter, &current.twitter),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct AttachCvArgs {
    /// Server path of the uploaded file, e.g. /uploads/resumes/cv.pdf
    pub path: String,
    /// Stored file name; defaults to the last path segment
    #[arg(long)]
    pub filename: Option<String>,
    #[arg(long, default_value = "application/pdf")]
    pub file_type: String,
}

impl AttachCvArgs {
    pub fn into_cv_file(self, uploaded_at: DateTime<Utc>) -> CvFile {
        let filename = self.filename.unwrap_or_else(|| {
            self.path
                .rsplit('/')
                .find(|segment| !segment.is_empty())
                .unwrap_or_default()
                .to_string()
        });
        CvFile {
            filename,
            path: self.path,
            download_url: None,
            upload_date: Some(uploaded_at),
            file_type: self.file_type,
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct PersonalInfoArgs {
    #[arg(long)]
    pub first_name: Option<String>,
    #[arg(long)]
    pub last_name: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long)]
    pub address: Option<String>,
}

impl PersonalInfoArgs {
    pub fn is_complete(&self) -> bool {
        self.first_name.is_some() && self.last_name.is_some()
    }

    pub fn into_personal_info(self) -> PersonalInfo {
        PersonalInfo {
            first_name: self.first_name.unwrap_or_default(),
            last_name: self.last_name.unwrap_or_default(),
            email: self.email,
            phone: self.phone,
            address: self.address,
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Portfolio API base URL
    #[arg(long, global = true, env = "PORTFOLIO_API_URL")]
    pub base_url: Option<String>,

    /// Bearer token for the Portfolio API
    #[arg(long, global = true, env = "PORTFOLIO_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    /// User whose portfolio is built or edited
    #[arg(long, global = true, env = "PORTFOLIO_USER_ID")]
    pub user_id: Option<String>,

    /// Require a CV before education/experience can be added
    #[arg(long, global = true, env = "PORTFOLIO_REQUIRE_CV")]
    pub require_cv: Option<bool>,

    /// Request timeout in seconds
    #[arg(long, global = true, env = "PORTFOLIO_TIMEOUT")]
    pub timeout: Option<u64>,

    /// settings.json location
    #[arg(long, global = true, env = "PORTFOLIO_SETTINGS")]
    pub settings: Option<PathBuf>,
}

impl ConnectionArgs {
    /// Layer flags and environment over the persisted settings.
    pub fn resolve(&self, saved: Settings) -> Settings {
        Settings {
            base_url: self.base_url.clone().unwrap_or(saved.base_url),
            api_token: self.api_token.clone().or(saved.api_token),
            user_id: self.user_id.clone().or(saved.user_id),
            require_cv_for_sections: self.require_cv.unwrap_or(saved.require_cv_for_sections),
            timeout_secs: self.timeout.unwrap_or(saved.timeout_secs),
        }
    }

    /// Validate CLI/environment-derived arguments.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(url) = &self.base_url {
            let url = url.trim();
            if url.is_empty() {
                return Err("PORTFOLIO_API_URL cannot be empty".to_string());
            }
            if url.contains(char::is_whitespace) {
                return Err(format!("Invalid PORTFOLIO_API_URL '{url}'"));
            }
        }
        if self.timeout == Some(0) {
            return Err("PORTFOLIO_TIMEOUT must be at least 1 second".to_string());
        }
        if self.user_id.as_deref().is_some_and(|id| id.trim().is_empty()) {
            return Err("PORTFOLIO_USER_ID cannot be blank".to_string());
        }
        Ok(())
    }
}
