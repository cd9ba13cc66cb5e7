//! Screen state machine: form → loading → result, plus the history browser.
//!
//! The controller owns the history cache and the displayed (input, result)
//! pair. It never awaits; callers run the generation call between
//! [`ViewController::begin_generation`] and [`ViewController::finish_generation`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    gemini::GenerationError,
    history::HistoryCache,
    models::{GenerationResult, HistoryRecord, InputError, ProductDescription},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    Form,
    Loading,
    Result,
    History,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Submit,
    Complete,
    Edit,
    Reset,
    ViewHistory,
    Select,
    EditRecord,
    Back,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Submit => "submit",
            Action::Complete => "complete a generation",
            Action::Edit => "edit",
            Action::Reset => "reset",
            Action::ViewHistory => "open history",
            Action::Select => "select a record",
            Action::EditRecord => "edit a record",
            Action::Back => "go back",
        })
    }
}

#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("a generation is already in progress")]
    Busy,
    #[error("cannot {action} from the {from:?} view")]
    Illegal { from: View, action: Action },
    #[error("history record {0} not found")]
    UnknownRecord(String),
    #[error(transparent)]
    Input(#[from] InputError),
}

/// The banner shown above the form after a failed generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorNotice {
    pub code: &'static str,
    pub message: String,
}

impl From<&GenerationError> for ErrorNotice {
    fn from(err: &GenerationError) -> Self {
        Self {
            code: err.code(),
            message: err.user_message(),
        }
    }
}

/// Everything a client needs to draw the current screen.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub view: View,
    pub current_input: Option<ProductDescription>,
    pub current_result: Option<GenerationResult>,
    /// Values the form is preloaded with; `None` means a blank form.
    pub form_input: Option<ProductDescription>,
    pub error: Option<ErrorNotice>,
    pub credential_missing: bool,
    pub history_count: usize,
    pub max_history: usize,
}

pub struct ViewController {
    view: View,
    history: HistoryCache,
    current_input: Option<ProductDescription>,
    current_result: Option<GenerationResult>,
    form_input: Option<ProductDescription>,
    pending_input: Option<ProductDescription>,
    error: Option<ErrorNotice>,
    credential_missing: bool,
}

impl ViewController {
    pub fn new(history: HistoryCache) -> Self {
        Self {
            view: View::Form,
            history,
            current_input: None,
            current_result: None,
            form_input: None,
            pending_input: None,
            error: None,
            credential_missing: false,
        }
    }

    /// Starts with the credential banner raised, e.g. when no key is configured.
    pub fn with_credential_missing(mut self, missing: bool) -> Self {
        self.credential_missing = missing;
        self
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn history(&self) -> &HistoryCache {
        &self.history
    }

    pub fn current_input(&self) -> Option<&ProductDescription> {
        self.current_input.as_ref()
    }

    pub fn current_result(&self) -> Option<&GenerationResult> {
        self.current_result.as_ref()
    }

    pub fn form_input(&self) -> Option<&ProductDescription> {
        self.form_input.as_ref()
    }

    pub fn error(&self) -> Option<&ErrorNotice> {
        self.error.as_ref()
    }

    pub fn credential_missing(&self) -> bool {
        self.credential_missing
    }

    fn require(&self, allowed: &[View], action: Action) -> Result<(), TransitionError> {
        if self.view == View::Loading && !allowed.contains(&View::Loading) {
            return Err(TransitionError::Busy);
        }
        if allowed.contains(&self.view) {
            Ok(())
        } else {
            Err(TransitionError::Illegal { from: self.view, action })
        }
    }

    /// Form → Loading. Rejects blank submissions without changing state.
    pub fn begin_generation(&mut self, input: ProductDescription) -> Result<(), TransitionError> {
        self.require(&[View::Form], Action::Submit)?;
        input.validate()?;
        info!("⏳ Generation started for '{}'", input.name);
        self.pending_input = Some(input);
        self.error = None;
        self.view = View::Loading;
        Ok(())
    }

    /// Loading → Result on success (archiving the pair), Loading → Form on failure.
    pub fn finish_generation(
        &mut self,
        outcome: Result<GenerationResult, GenerationError>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.require(&[View::Loading], Action::Complete)?;
        let input = self
            .pending_input
            .take()
            .ok_or(TransitionError::Illegal { from: self.view, action: Action::Complete })?;

        match outcome {
            Ok(result) => {
                let record = HistoryRecord::new(self.history.next_stamp(now), input.clone(), result.clone());
                info!("💾 Archived generation {} for '{}'", record.id, input.name);
                self.history.add(record);
                self.current_input = Some(input);
                self.current_result = Some(result);
                self.view = View::Result;
            }
            Err(err) => {
                warn!("Generation for '{}' failed: {}", input.name, err);
                if err == GenerationError::AuthFailure {
                    self.credential_missing = true;
                }
                self.error = Some(ErrorNotice::from(&err));
                self.form_input = Some(input);
                self.view = View::Form;
            }
        }
        Ok(())
    }

    /// Result → Form, preloaded with the displayed input.
    pub fn edit_current(&mut self) -> Result<(), TransitionError> {
        self.require(&[View::Result], Action::Edit)?;
        self.form_input = self.current_input.clone();
        self.view = View::Form;
        Ok(())
    }

    /// Back to a blank form with nothing displayed.
    pub fn reset(&mut self) -> Result<(), TransitionError> {
        self.require(&[View::Form, View::Result], Action::Reset)?;
        self.clear_session();
        Ok(())
    }

    pub fn view_history(&mut self) -> Result<(), TransitionError> {
        self.require(&[View::Form, View::Result], Action::ViewHistory)?;
        self.view = View::History;
        Ok(())
    }

    /// History → Result with the stored pair; no generation call is made.
    pub fn select_record(&mut self, id: &str) -> Result<(), TransitionError> {
        self.require(&[View::History], Action::Select)?;
        let record = self
            .history
            .get(id)
            .ok_or_else(|| TransitionError::UnknownRecord(id.to_string()))?;
        self.current_input = Some(record.input.clone());
        self.current_result = Some(record.result.clone());
        self.view = View::Result;
        Ok(())
    }

    /// History → Form, preloaded with the record's input.
    pub fn edit_record(&mut self, id: &str) -> Result<(), TransitionError> {
        self.require(&[View::History], Action::EditRecord)?;
        let record = self
            .history
            .get(id)
            .ok_or_else(|| TransitionError::UnknownRecord(id.to_string()))?;
        self.form_input = Some(record.input.clone());
        self.view = View::Form;
        Ok(())
    }

    pub fn back(&mut self) -> Result<(), TransitionError> {
        self.require(&[View::History], Action::Back)?;
        self.clear_session();
        Ok(())
    }

    /// Deletes one archived record; the current view is unaffected.
    pub fn delete_record(&mut self, id: &str) -> bool {
        self.history.remove(id)
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// The user re-associated a key through the host's key selector.
    pub fn credential_reselected(&mut self) {
        self.credential_missing = false;
        self.error = None;
    }

    fn clear_session(&mut self) {
        self.current_input = None;
        self.current_result = None;
        self.form_input = None;
        self.error = None;
        self.view = View::Form;
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            view: self.view,
            current_input: self.current_input.clone(),
            current_result: self.current_result.clone(),
            form_input: self.form_input.clone(),
            error: self.error.clone(),
            credential_missing: self.credential_missing,
            history_count: self.history.len(),
            max_history: self.history.capacity(),
        }
    }
}
