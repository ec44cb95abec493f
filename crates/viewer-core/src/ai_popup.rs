//! Summarize/translate popup with latest-response-wins semantics.
//!
//! Every request carries a ticket made of the popup instance and a sequence
//! number within that instance. Opening a new popup or retargeting the
//! translation issues a new ticket, and only a response for the latest ticket
//! is applied; anything older is reported as stale and dropped.

use crate::error::{AiError, ViewerError, ViewerResult};
use crate::services::AiService;
use doc_model::{AiKind, AiPopupState, PaperId, Point, TargetLang};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestTicket {
    pub popup: u64,
    pub seq: u64,
}

/// A summarize or translate call the host must run and report back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiRequest {
    pub ticket: RequestTicket,
    pub kind: AiKind,
    pub text: String,
    pub target_lang: Option<TargetLang>,
}

impl AiRequest {
    pub fn execute(&self, service: &dyn AiService) -> Result<String, AiError> {
        match self.kind {
            AiKind::Summary => service.summarize(&self.text),
            AiKind::Translation => {
                service.translate(&self.text, self.target_lang.unwrap_or_default())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Applied,
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiPopupStatus {
    Loading,
    Ready,
    Errored,
}

/// Text handed to the note editor when the user saves an AI result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteDraft {
    pub paper_id: PaperId,
    pub selected_text: String,
    pub note: String,
}

#[derive(Debug)]
struct OpenPopup {
    instance: u64,
    state: AiPopupState,
}

impl OpenPopup {
    fn ticket(&self) -> RequestTicket {
        RequestTicket { popup: self.instance, seq: self.state.request_seq }
    }

    fn request(&self) -> AiRequest {
        AiRequest {
            ticket: self.ticket(),
            kind: self.state.kind,
            text: self.state.original_text.clone(),
            target_lang: self.state.target_lang,
        }
    }

    /// Moves to Loading under a fresh sequence number.
    fn reissue(&mut self) -> AiRequest {
        self.state.request_seq += 1;
        self.state.is_loading = true;
        self.state.result = None;
        self.state.error = None;
        self.request()
    }
}

#[derive(Debug, Default)]
pub struct AiPopupController {
    popup: Option<OpenPopup>,
    next_instance: u64,
}

impl AiPopupController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_summary(&mut self, paper_id: &PaperId, anchor: Point, text: &str) -> AiRequest {
        self.open(paper_id, anchor, text, AiKind::Summary, None)
    }

    pub fn open_translation(
        &mut self,
        paper_id: &PaperId,
        anchor: Point,
        text: &str,
        target_lang: TargetLang,
    ) -> AiRequest {
        self.open(paper_id, anchor, text, AiKind::Translation, Some(target_lang))
    }

    fn open(
        &mut self,
        paper_id: &PaperId,
        anchor: Point,
        text: &str,
        kind: AiKind,
        target_lang: Option<TargetLang>,
    ) -> AiRequest {
        self.next_instance += 1;

        if let Some(previous) = &self.popup {
            debug!(instance = previous.instance, "replacing open AI popup");
        }

        let popup = self.popup.insert(OpenPopup {
            instance: self.next_instance,
            state: AiPopupState {
                paper_id: paper_id.clone(),
                anchor,
                kind,
                original_text: text.to_owned(),
                result: None,
                is_loading: true,
                error: None,
                target_lang,
                request_seq: 1,
            },
        });

        debug!(paper = %paper_id, instance = popup.instance, ?kind, "opened AI popup");
        popup.request()
    }

    /// Retargets an open translation. Returns `None` when the language is
    /// unchanged or the popup is a summary.
    pub fn set_target_lang(&mut self, target_lang: TargetLang) -> ViewerResult<Option<AiRequest>> {
        let popup = self.popup.as_mut().ok_or(ViewerError::NoPopup)?;

        if popup.state.kind != AiKind::Translation || popup.state.target_lang == Some(target_lang) {
            return Ok(None);
        }

        popup.state.target_lang = Some(target_lang);
        Ok(Some(popup.reissue()))
    }

    /// Re-issues the request of an errored popup.
    pub fn retry(&mut self) -> ViewerResult<Option<AiRequest>> {
        let popup = self.popup.as_mut().ok_or(ViewerError::NoPopup)?;

        if popup.state.error.is_none() || popup.state.is_loading {
            return Ok(None);
        }

        Ok(Some(popup.reissue()))
    }

    /// Applies a response if its ticket is the latest one issued.
    pub fn complete(
        &mut self,
        ticket: RequestTicket,
        result: Result<String, AiError>,
    ) -> Disposition {
        let Some(popup) = self.popup.as_mut().filter(|popup| popup.ticket() == ticket) else {
            debug!(popup = ticket.popup, seq = ticket.seq, "discarding stale AI response");
            return Disposition::Stale;
        };

        popup.state.is_loading = false;
        match result {
            Ok(text) => {
                popup.state.result = Some(text);
                popup.state.error = None;
            }
            Err(error) => {
                warn!(%error, kind = ?popup.state.kind, "AI request failed");
                popup.state.result = None;
                popup.state.error = Some(error.to_string());
            }
        }

        Disposition::Applied
    }

    pub fn close(&mut self) {
        self.popup = None;
    }

    pub fn close_for_paper(&mut self, paper_id: &PaperId) {
        if self.popup.as_ref().is_some_and(|popup| &popup.state.paper_id == paper_id) {
            self.popup = None;
        }
    }

    pub fn state(&self) -> Option<&AiPopupState> {
        self.popup.as_ref().map(|popup| &popup.state)
    }

    pub fn status(&self) -> Option<AiPopupStatus> {
        let state = self.state()?;

        Some(if state.is_loading {
            AiPopupStatus::Loading
        } else if state.error.is_some() {
            AiPopupStatus::Errored
        } else {
            AiPopupStatus::Ready
        })
    }

    pub fn copy_text(&self) -> Option<&str> {
        self.state()?.result.as_deref()
    }

    pub fn note_draft(&self) -> Option<NoteDraft> {
        let state = self.state()?;
        let note = state.result.clone()?;

        Some(NoteDraft {
            paper_id: state.paper_id.clone(),
            selected_text: state.original_text.clone(),
            note,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoService;

    impl AiService for EchoService {
        fn summarize(&self, text: &str) -> Result<String, AiError> {
            Ok(format!("summary of {text}"))
        }

        fn translate(&self, text: &str, target: TargetLang) -> Result<String, AiError> {
            Ok(format!("[{target}] {text}"))
        }
    }

    fn paper() -> PaperId {
        PaperId::from("paper-1")
    }

    #[test]
    fn summary_round_trip_reaches_ready() {
        let mut ai = AiPopupController::new();
        let request = ai.open_summary(&paper(), Point::new(10.0, 20.0), "transformers");
        assert_eq!(ai.status(), Some(AiPopupStatus::Loading));

        let result = request.execute(&EchoService);
        assert_eq!(ai.complete(request.ticket, result), Disposition::Applied);
        assert_eq!(ai.status(), Some(AiPopupStatus::Ready));
        assert_eq!(ai.copy_text(), Some("summary of transformers"));
    }

    #[test]
    fn retargeted_translation_drops_the_earlier_response() {
        let mut ai = AiPopupController::new();
        let korean = ai.open_translation(&paper(), Point::default(), "hello", TargetLang::Ko);
        let english = ai.set_target_lang(TargetLang::En).expect("popup open").expect("new request");

        assert_eq!(english.ticket.popup, korean.ticket.popup);
        assert!(english.ticket.seq > korean.ticket.seq);

        let result = english.execute(&EchoService);
        assert_eq!(ai.complete(english.ticket, result), Disposition::Applied);
        assert_eq!(ai.complete(korean.ticket, korean.execute(&EchoService)), Disposition::Stale);

        let state = ai.state().expect("popup open");
        assert_eq!(state.result.as_deref(), Some("[en] hello"));
        assert_eq!(state.target_lang, Some(TargetLang::En));
        assert!(!state.is_loading);
    }

    #[test]
    fn stale_response_arriving_first_leaves_popup_loading() {
        let mut ai = AiPopupController::new();
        let korean = ai.open_translation(&paper(), Point::default(), "hello", TargetLang::Ko);
        ai.set_target_lang(TargetLang::En).expect("popup open");

        assert_eq!(ai.complete(korean.ticket, Ok("안녕".to_owned())), Disposition::Stale);
        assert_eq!(ai.status(), Some(AiPopupStatus::Loading));
        assert!(ai.copy_text().is_none());
    }

    #[test]
    fn same_language_and_summary_popups_issue_no_request() {
        let mut ai = AiPopupController::new();
        ai.open_translation(&paper(), Point::default(), "hello", TargetLang::Ko);
        assert_eq!(ai.set_target_lang(TargetLang::Ko).expect("popup open"), None);

        ai.open_summary(&paper(), Point::default(), "hello");
        assert_eq!(ai.set_target_lang(TargetLang::En).expect("popup open"), None);

        ai.close();
        assert!(matches!(ai.set_target_lang(TargetLang::En), Err(ViewerError::NoPopup)));
    }

    #[test]
    fn replacing_the_popup_makes_earlier_tickets_stale() {
        let mut ai = AiPopupController::new();
        let first = ai.open_summary(&paper(), Point::default(), "first");
        let second = ai.open_summary(&paper(), Point::default(), "second");

        assert_eq!(first.ticket.seq, second.ticket.seq);
        assert_ne!(first.ticket, second.ticket);
        assert_eq!(ai.complete(first.ticket, Ok("old".to_owned())), Disposition::Stale);
        assert_eq!(ai.state().expect("popup open").original_text, "second");
    }

    #[test]
    fn responses_after_close_are_stale() {
        let mut ai = AiPopupController::new();
        let request = ai.open_summary(&paper(), Point::default(), "text");
        ai.close();

        assert_eq!(ai.complete(request.ticket, Ok("late".to_owned())), Disposition::Stale);
        assert!(ai.state().is_none());
    }

    #[test]
    fn errors_are_shown_and_retry_is_explicit() {
        let mut ai = AiPopupController::new();
        let request = ai.open_summary(&paper(), Point::default(), "text");
        assert_eq!(ai.retry().expect("popup open"), None, "nothing to retry while loading");

        ai.complete(request.ticket, Err(AiError::Network("timed out".to_owned())));
        assert_eq!(ai.status(), Some(AiPopupStatus::Errored));
        let state = ai.state().expect("popup open");
        assert_eq!(state.error.as_deref(), Some("AI request failed: timed out"));
        assert!(state.result.is_none());

        let retry = ai.retry().expect("popup open").expect("retry issued");
        assert_eq!(ai.status(), Some(AiPopupStatus::Loading));
        assert_eq!(ai.complete(retry.ticket, Ok("done".to_owned())), Disposition::Applied);
        assert_eq!(ai.status(), Some(AiPopupStatus::Ready));
    }

    #[test]
    fn note_draft_pairs_result_with_selection() {
        let mut ai = AiPopupController::new();
        let request = ai.open_summary(&paper(), Point::default(), "long passage");
        assert!(ai.note_draft().is_none());

        ai.complete(request.ticket, Ok("short".to_owned()));
        let draft = ai.note_draft().expect("result ready");
        assert_eq!(draft.selected_text, "long passage");
        assert_eq!(draft.note, "short");
        assert_eq!(ai.status(), Some(AiPopupStatus::Ready), "reading does not mutate");
    }

    #[test]
    fn closing_another_paper_keeps_the_popup() {
        let mut ai = AiPopupController::new();
        ai.open_summary(&paper(), Point::default(), "text");

        ai.close_for_paper(&PaperId::from("other"));
        assert!(ai.state().is_some());
        ai.close_for_paper(&paper());
        assert!(ai.state().is_none());
    }
}
