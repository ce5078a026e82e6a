//! Question presentation, answer validation and the feedback delay

use rand::seq::SliceRandom;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::bank::QuestionRecord;
use super::state::RunProgress;
use super::timer::{Scheduler, TimerHandle, TimerKind};
use crate::error::GameError;

/// Message shown after a correct answer
pub const CORRECT_FEEDBACK: &str = "Great job!";
/// Message shown after a wrong answer
pub const WRONG_FEEDBACK: &str = "Keep trying!";

/// Identifies one presentation of one question in one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresentationTicket {
    pub epoch: u32,
    pub serial: u32,
}

/// What the presentation layer shows while answering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionView {
    pub ticket: PresentationTicket,
    pub prompt: String,
    /// Options in this presentation's shuffled order
    pub options: Vec<String>,
}

/// Result of a validated answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub correct: bool,
}

impl Outcome {
    pub fn feedback(&self) -> &'static str {
        if self.correct {
            CORRECT_FEEDBACK
        } else {
            WRONG_FEEDBACK
        }
    }
}

/// A player's selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnswerChoice {
    /// Option text as displayed
    Text(String),
    /// Index into the shuffled options
    Index(usize),
}

#[derive(Debug, Clone)]
struct Presentation {
    view: QuestionView,
    record: QuestionRecord,
    outcome: Option<Outcome>,
    feedback_timer: Option<TimerHandle>,
}

/// Holds at most one question in flight
#[derive(Debug, Clone)]
pub struct QuestionFlow {
    epoch: u32,
    serial: u32,
    active: Option<Presentation>,
}

impl QuestionFlow {
    pub fn new(epoch: u32) -> Self {
        Self {
            epoch,
            serial: 0,
            active: None,
        }
    }

    /// A question is on screen (answered or not)
    pub fn is_presenting(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_view(&self) -> Option<&QuestionView> {
        self.active.as_ref().map(|p| &p.view)
    }

    pub fn is_answered(&self) -> bool {
        self.active.as_ref().is_some_and(|p| p.outcome.is_some())
    }

    /// Put a question on screen with freshly shuffled options
    pub fn present(&mut self, record: QuestionRecord, rng: &mut Pcg32) -> QuestionView {
        self.serial += 1;
        let mut options = record.options.to_vec();
        options.shuffle(rng);

        let view = QuestionView {
            ticket: PresentationTicket {
                epoch: self.epoch,
                serial: self.serial,
            },
            prompt: record.prompt.clone(),
            options,
        };
        self.active = Some(Presentation {
            view: view.clone(),
            record,
            outcome: None,
            feedback_timer: None,
        });
        view
    }

    fn stale(&self, epoch: u32) -> GameError {
        GameError::StaleCallback {
            epoch,
            current: self.epoch,
        }
    }

    /// Validate an answer. Only the first submission per presentation counts.
    ///
    /// On acceptance the progress is updated and the feedback timer armed.
    pub fn submit(
        &mut self,
        ticket: PresentationTicket,
        choice: &AnswerChoice,
        progress: &mut RunProgress,
        scheduler: &mut Scheduler,
        feedback_delay: u64,
    ) -> Result<Outcome, GameError> {
        if ticket.epoch != self.epoch {
            return Err(self.stale(ticket.epoch));
        }
        let current = self.epoch;
        let presentation = self.active.as_mut().ok_or(GameError::NoActiveQuestion)?;
        if presentation.view.ticket != ticket {
            return Err(GameError::StaleCallback {
                epoch: ticket.epoch,
                current,
            });
        }
        if presentation.outcome.is_some() {
            return Err(GameError::AlreadyAnswered);
        }

        let correct = match choice {
            AnswerChoice::Text(text) => presentation.record.is_correct(text),
            AnswerChoice::Index(index) => {
                let text = presentation
                    .view
                    .options
                    .get(*index)
                    .ok_or(GameError::InvalidChoice { index: *index })?;
                presentation.record.is_correct(text)
            }
        };

        let outcome = Outcome { correct };
        progress.record(correct);
        presentation.outcome = Some(outcome);
        presentation.feedback_timer = Some(scheduler.after(TimerKind::FeedbackDelay, feedback_delay));
        Ok(outcome)
    }

    /// Feedback delay elapsed: tear the question down
    pub fn complete(&mut self, handle: TimerHandle) -> Result<(PresentationTicket, Outcome), GameError> {
        let matches = self
            .active
            .as_ref()
            .is_some_and(|p| p.feedback_timer == Some(handle));
        if !matches {
            return Err(self.stale(handle.epoch()));
        }
        let presentation = self.active.take().ok_or(GameError::NoActiveQuestion)?;
        let outcome = presentation.outcome.ok_or(GameError::NoActiveQuestion)?;
        Ok((presentation.view.ticket, outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::bank;
    use rand::SeedableRng;

    fn record() -> QuestionRecord {
        bank::load("Which river?,Nile,Amazon,Yangtze,Danube,Yangtze")
            .expect("valid")
            .remove(0)
    }

    fn setup() -> (QuestionFlow, RunProgress, Scheduler, Pcg32) {
        (
            QuestionFlow::new(0),
            RunProgress::new(5, 10),
            Scheduler::new(0),
            Pcg32::seed_from_u64(11),
        )
    }

    #[test]
    fn test_present_shuffles_a_copy() {
        let (mut flow, _, _, mut rng) = setup();
        let original = record();
        let mut seen_other_order = false;
        for _ in 0..20 {
            let view = flow.present(original.clone(), &mut rng);
            let mut sorted = view.options.clone();
            sorted.sort();
            let mut expected = original.options.to_vec();
            expected.sort();
            assert_eq!(sorted, expected);
            seen_other_order |= view.options != original.options.to_vec();
        }
        assert!(seen_other_order);
        assert_eq!(original, record());
    }

    #[test]
    fn test_first_submission_wins() {
        let (mut flow, mut progress, mut scheduler, mut rng) = setup();
        let view = flow.present(record(), &mut rng);

        let outcome = flow
            .submit(
                view.ticket,
                &AnswerChoice::Text(" Yangtze ".into()),
                &mut progress,
                &mut scheduler,
                60,
            )
            .expect("accepted");
        assert!(outcome.correct);
        assert_eq!(outcome.feedback(), CORRECT_FEEDBACK);

        let again = flow.submit(
            view.ticket,
            &AnswerChoice::Text("Nile".into()),
            &mut progress,
            &mut scheduler,
            60,
        );
        assert!(matches!(again, Err(GameError::AlreadyAnswered)));
        assert_eq!(progress.correct_count, 1);
        assert_eq!(progress.questions_asked, 1);
        assert_eq!(scheduler.pending_count(), 1);
    }

    #[test]
    fn test_wrong_answer_by_index() {
        let (mut flow, mut progress, mut scheduler, mut rng) = setup();
        let view = flow.present(record(), &mut rng);
        let wrong = view
            .options
            .iter()
            .position(|o| o != "Yangtze")
            .expect("has wrong option");

        let outcome = flow
            .submit(view.ticket, &AnswerChoice::Index(wrong), &mut progress, &mut scheduler, 60)
            .expect("accepted");
        assert!(!outcome.correct);
        assert_eq!(progress.correct_count, 0);
        assert_eq!(progress.questions_asked, 1);
    }

    #[test]
    fn test_invalid_index_is_not_scored() {
        let (mut flow, mut progress, mut scheduler, mut rng) = setup();
        let view = flow.present(record(), &mut rng);
        let err = flow
            .submit(view.ticket, &AnswerChoice::Index(9), &mut progress, &mut scheduler, 60)
            .unwrap_err();
        assert!(matches!(err, GameError::InvalidChoice { index: 9 }));
        assert_eq!(progress.questions_asked, 0);
        assert!(!flow.is_answered());
    }

    #[test]
    fn test_stale_tickets_rejected() {
        let (mut flow, mut progress, mut scheduler, mut rng) = setup();
        let first = flow.present(record(), &mut rng);
        let _second = flow.present(record(), &mut rng);

        let err = flow
            .submit(first.ticket, &AnswerChoice::Index(0), &mut progress, &mut scheduler, 60)
            .unwrap_err();
        assert_eq!(err.code(), "STALE_CALLBACK");

        let old_epoch = PresentationTicket { epoch: 7, serial: 2 };
        let err = flow
            .submit(old_epoch, &AnswerChoice::Index(0), &mut progress, &mut scheduler, 60)
            .unwrap_err();
        assert_eq!(err.code(), "STALE_CALLBACK");
        assert_eq!(progress.questions_asked, 0);
    }

    #[test]
    fn test_complete_requires_matching_timer() {
        let (mut flow, mut progress, mut scheduler, mut rng) = setup();
        let view = flow.present(record(), &mut rng);
        let unrelated = scheduler.after(TimerKind::StunRecovery, 5);
        assert!(flow.complete(unrelated).is_err());

        flow.submit(view.ticket, &AnswerChoice::Index(0), &mut progress, &mut scheduler, 2)
            .expect("accepted");
        scheduler.advance_clock();
        scheduler.advance_clock();
        let fired = scheduler.pop_due().expect("feedback due");
        assert_eq!(fired.kind, TimerKind::FeedbackDelay);

        let (ticket, _) = flow.complete(fired.handle).expect("completes");
        assert_eq!(ticket, view.ticket);
        assert!(!flow.is_presenting());
        assert!(flow.complete(fired.handle).is_err());
    }
}
