pub mod client;
pub mod editor;
pub mod progress;
pub mod types;
pub mod validator;
pub mod wizard;

#[cfg(test)]
pub mod testing;

pub use client::{DEFAULT_BASE_URL, PortfolioApi, PortfolioClient, create_portfolio_client};
pub use editor::{EntryRef, PortfolioEditor};
pub use types::Portfolio;
pub use wizard::{EntryInput, PortfolioWizard, WizardStep};

use tracing::info;

use crate::error::ServiceResult;

/// Where a user lands after the initial fetch.
#[derive(Debug)]
pub enum Landing {
    Wizard(PortfolioWizard),
    Editor(Portfolio),
}

/// A user without a portfolio starts the wizard; that is not an error.
pub fn open_portfolio<A: PortfolioApi + ?Sized>(api: &A, user_id: &str) -> ServiceResult<Landing> {
    match api.fetch_for_user(user_id)? {
        Some(portfolio) => Ok(Landing::Editor(portfolio)),
        None => {
            info!(user_id, "no portfolio yet; starting wizard");
            Ok(Landing::Wizard(PortfolioWizard::new()))
        }
    }
}
