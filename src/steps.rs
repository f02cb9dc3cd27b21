//! Scripted interactions run against a page by the `menubind` binary.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::controller::DropdownController;
use crate::page::PageError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Click the first element matching a CSS selector.
    Click(String),
    /// Let page time pass, firing any timers that come due.
    Wait(Duration),
    /// Call the page's re-initialisation global.
    Reinitialize,
    Dispose,
}

#[derive(Debug, Error)]
pub enum StepError {
    #[error("step is empty")]
    Empty,
    #[error("unknown step `{0}` (expected click:<css>, wait:<ms>, reinit or dispose)")]
    Unknown(String),
    #[error("click step needs a selector")]
    MissingSelector,
    #[error("wait step needs a millisecond count, got `{0}`")]
    InvalidDelay(String),
    #[error(transparent)]
    Page(#[from] PageError),
}

impl FromStr for Step {
    type Err = StepError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(StepError::Empty);
        }

        if let Some(selector) = trimmed.strip_prefix("click:") {
            let selector = selector.trim();
            if selector.is_empty() {
                return Err(StepError::MissingSelector);
            }
            return Ok(Step::Click(selector.to_string()));
        }

        if let Some(millis) = trimmed.strip_prefix("wait:") {
            let millis = millis.trim();
            return millis
                .parse::<u64>()
                .map(|ms| Step::Wait(Duration::from_millis(ms)))
                .map_err(|_| StepError::InvalidDelay(millis.to_string()));
        }

        match trimmed {
            "reinit" => Ok(Step::Reinitialize),
            "dispose" => Ok(Step::Dispose),
            other => Err(StepError::Unknown(other.to_string())),
        }
    }
}

impl Step {
    pub async fn run(&self, controller: &DropdownController) -> Result<(), StepError> {
        let page = controller.page();
        match self {
            Step::Click(selector) => {
                let outcome = page.click_selector(selector)?;
                debug!(
                    target = "steps",
                    selector = %selector,
                    listeners = outcome.listeners_invoked,
                    default_prevented = outcome.default_prevented,
                    "click"
                );
            }
            Step::Wait(delay) => {
                tokio::time::sleep(*delay).await;
                page.run_due_timers();
            }
            Step::Reinitialize => page.call_global(&controller.config().global_entry_point)?,
            Step::Dispose => controller.dispose(),
        }
        Ok(())
    }
}

pub async fn run_steps(controller: &DropdownController, steps: &[Step]) -> Result<(), StepError> {
    for step in steps {
        step.run(controller).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::Page;

    #[test]
    fn parses_steps() {
        assert_eq!(
            "click: #me".parse::<Step>().unwrap(),
            Step::Click("#me".into())
        );
        assert_eq!(
            "wait:250".parse::<Step>().unwrap(),
            Step::Wait(Duration::from_millis(250))
        );
        assert_eq!("reinit".parse::<Step>().unwrap(), Step::Reinitialize);
        assert_eq!(" dispose ".parse::<Step>().unwrap(), Step::Dispose);
    }

    #[test]
    fn rejects_malformed_steps() {
        assert!(matches!("".parse::<Step>(), Err(StepError::Empty)));
        assert!(matches!("click:".parse::<Step>(), Err(StepError::MissingSelector)));
        assert!(matches!(
            "wait:soon".parse::<Step>(),
            Err(StepError::InvalidDelay(value)) if value == "soon"
        ));
        assert!(matches!("hover:#x".parse::<Step>(), Err(StepError::Unknown(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn runs_clicks_and_reports_missing_targets() {
        let page = Page::parse(
            r#"<div class="dropdown"><a id="t" class="dropdown-toggle">t</a><ul id="m" class="dropdown-menu"></ul></div>"#,
        );
        let controller = DropdownController::builder(&page).install();
        let steps = vec![Step::Click("#t".into()), Step::Wait(Duration::from_millis(5))];
        run_steps(&controller, &steps).await.unwrap();
        assert!(crate::dom::has_class(&page.query("#m").unwrap().unwrap(), "show"));

        let missing = Step::Click("#nope".into()).run(&controller).await;
        assert!(matches!(missing, Err(StepError::Page(PageError::NoMatch(_)))));

        Step::Dispose.run(&controller).await.unwrap();
        let reinit = Step::Reinitialize.run(&controller).await;
        assert!(matches!(reinit, Err(StepError::Page(PageError::UnknownGlobal(_)))));
    }
}
