//! The fill workflow behind the trigger: look up entries for the page,
//! pick one, fetch its credential, write it into the detected fields.

use crate::auth::FillCapability;
use crate::detector::{detect, LoginFields};
use crate::dom::{lock_page, NodeId, PageDom, PageError, SharedPage};
use crate::notice::{Notice, UserInterface};
use keefill_protocol::{BusError, CredentialEntry, CredentialsReply, MessageBus, Request};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const HIGHLIGHT_COLOR: &str = "#E8F5E9";
pub const HIGHLIGHT_DURATION: Duration = Duration::from_millis(600);

#[derive(Debug, Error)]
pub enum FillError {
    #[error(transparent)]
    Bus(#[from] BusError),
    #[error(transparent)]
    Page(#[from] PageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    Filled,
    NoFieldDetected,
    /// Vault locked or unreachable.
    Unavailable,
    NoMatchingEntries,
    SelectionCancelled,
    SelectionInvalid,
    RetrievalFailed,
    Failed,
}

impl FillOutcome {
    /// What the user is told. A cancelled selection ends silently.
    pub fn notice(self) -> Option<Notice> {
        let notice = match self {
            FillOutcome::Filled => Notice::success("Credentials filled successfully!"),
            FillOutcome::NoFieldDetected => Notice::error("No password field detected on this page"),
            FillOutcome::Unavailable => {
                Notice::error("Database is locked. Please unlock it from the extension popup.")
            }
            FillOutcome::NoMatchingEntries => {
                Notice::info("No matching login entries found for this site")
            }
            FillOutcome::SelectionCancelled => return None,
            FillOutcome::SelectionInvalid => Notice::error("Invalid selection"),
            FillOutcome::RetrievalFailed => Notice::error("Failed to retrieve credentials"),
            FillOutcome::Failed => Notice::error("An error occurred. Please try again."),
        };
        Some(notice)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Chosen(usize),
    Cancelled,
    Invalid,
}

pub fn selection_prompt(entries: &[CredentialEntry]) -> String {
    let list: Vec<String> = entries
        .iter()
        .enumerate()
        .map(|(i, e)| format!("{}. {} ({})", i + 1, e.title, e.username))
        .collect();
    format!("Multiple logins detected:\n\n{}\n\nEnter number:", list.join("\n"))
}

/// Maps the prompt answer to a zero-based index. Leading digits count, so
/// `"2."` picks the second entry.
pub fn parse_selection(answer: Option<&str>, count: usize) -> Selection {
    let Some(answer) = answer.filter(|a| !a.is_empty()) else {
        return Selection::Cancelled;
    };
    let digits: String = answer
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    match digits.parse::<usize>() {
        Ok(n) if (1..=count).contains(&n) => Selection::Chosen(n - 1),
        _ => Selection::Invalid,
    }
}

/// Runs the workflow. Every failure is folded into an outcome; nothing
/// propagates back to the page.
pub async fn fill_credentials<D, B, U>(
    _capability: FillCapability,
    page: &SharedPage<D>,
    bus: &B,
    ui: &U,
) -> FillOutcome
where
    D: PageDom,
    B: MessageBus + ?Sized,
    U: UserInterface + ?Sized,
{
    match run(page, bus, ui).await {
        Ok(outcome) => {
            debug!(?outcome, "fill finished");
            outcome
        }
        Err(e) => {
            warn!(error = %e, "fill failed");
            FillOutcome::Failed
        }
    }
}

async fn run<D, B, U>(page: &SharedPage<D>, bus: &B, ui: &U) -> Result<FillOutcome, FillError>
where
    D: PageDom,
    B: MessageBus + ?Sized,
    U: UserInterface + ?Sized,
{
    let (fields, url) = {
        let dom = lock_page(page)?;
        (detect(&*dom), dom.url())
    };
    let Some(password_field) = fields.password else {
        return Ok(FillOutcome::NoFieldDetected);
    };

    let found = bus
        .request(Request::SearchEntries { url })
        .await?
        .into_entries();
    if !found.success {
        return Ok(FillOutcome::Unavailable);
    }
    let entry = match found.entries.as_slice() {
        [] => return Ok(FillOutcome::NoMatchingEntries),
        [only] => only,
        many => match parse_selection(ui.prompt(&selection_prompt(many)).as_deref(), many.len()) {
            Selection::Chosen(i) => &many[i],
            Selection::Cancelled => return Ok(FillOutcome::SelectionCancelled),
            Selection::Invalid => return Ok(FillOutcome::SelectionInvalid),
        },
    };

    let credential = bus
        .request(Request::GetCredentials {
            uuid: entry.uuid.clone(),
        })
        .await?
        .into_credentials();
    if !credential.success {
        return Ok(FillOutcome::RetrievalFailed);
    }

    inject(page, fields, password_field, &credential)?;
    info!(entry = %entry.title, "credentials filled");
    Ok(FillOutcome::Filled)
}

fn inject<D: PageDom>(
    page: &SharedPage<D>,
    fields: LoginFields,
    password_field: NodeId,
    credential: &CredentialsReply,
) -> Result<(), PageError> {
    let mut dom = lock_page(page)?;

    let username = credential.username.as_deref().filter(|u| !u.is_empty());
    if let (Some(field), Some(username)) = (fields.username, username) {
        dom.set_value(field, username)?;
        dom.dispatch_input(field)?;
    }

    let Some(password) = credential.password.as_ref().filter(|p| !p.is_empty()) else {
        return Ok(());
    };
    dom.set_value(password_field, password.expose())?;
    dom.dispatch_input(password_field)?;

    // Our own highlight from a fill still inside its window is not the original.
    let previous = dom
        .inline_style(password_field, "background-color")
        .filter(|bg| bg != HIGHLIGHT_COLOR)
        .unwrap_or_default();
    dom.set_style(password_field, "transition", "background 0.3s")?;
    dom.set_style(password_field, "background-color", HIGHLIGHT_COLOR)?;
    drop(dom);

    let page = Arc::clone(page);
    tokio::spawn(async move {
        tokio::time::sleep(HIGHLIGHT_DURATION).await;
        if let Ok(mut dom) = lock_page(&page) {
            // Left alone if another fill already restored it or the page changed it.
            if dom.inline_style(password_field, "background-color").as_deref()
                == Some(HIGHLIGHT_COLOR)
            {
                // The field may be gone by now.
                let _ = dom.set_style(password_field, "background-color", &previous);
            }
        }
    });
    Ok(())
}
