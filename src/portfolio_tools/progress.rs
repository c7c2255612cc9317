use serde::Serialize;

use crate::portfolio_tools::types::Portfolio;

const REQUIRED_WEIGHT: f64 = 85.0;
const BONUS_WEIGHT: f64 = 15.0;

/// Completion indicator for a persisted portfolio. The CV, education and
/// experience share 85%; skills and certificates share the remaining 15%.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub percentage: u8,
    pub completed: usize,
    pub total: usize,
    pub missing: Vec<&'static str>,
}

pub fn progress(portfolio: &Portfolio) -> Progress {
    let required = [
        ("CV", portfolio.has_cv()),
        ("education", !portfolio.education.is_empty()),
        ("experience", !portfolio.experience.is_empty()),
    ];
    let bonus = [
        ("skills", !portfolio.skills.is_empty()),
        ("certificates", !portfolio.certificates.is_empty()),
    ];

    let done = |items: &[(&str, bool)]| items.iter().filter(|(_, present)| *present).count();
    let required_done = done(&required);
    let bonus_done = done(&bonus);

    let score = required_done as f64 / required.len() as f64 * REQUIRED_WEIGHT
        + bonus_done as f64 / bonus.len() as f64 * BONUS_WEIGHT;

    Progress {
        percentage: score.round().clamp(0.0, 100.0) as u8,
        completed: required_done + bonus_done,
        total: required.len() + bonus.len(),
        missing: required
            .iter()
            .chain(bonus.iter())
            .filter(|(_, present)| !present)
            .map(|(name, _)| *name)
            .collect(),
    }
}
