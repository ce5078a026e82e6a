//! Presentation adapter seam
//!
//! The simulation never draws. A [`Presenter`] receives the events a run
//! produced plus a per-frame [`RunView`]; the native runner uses
//! [`LogPresenter`], the web build renders the same data into the DOM.

use crate::sim::{GameEvent, Run, RunPhase, RunProgress, RunView};

/// Receives run output
pub trait Presenter {
    fn on_event(&mut self, event: &GameEvent);

    /// Called once per rendered frame
    fn on_frame(&mut self, _view: &RunView) {}
}

/// Score readout, e.g. "Correct: 2 / 5"
pub fn score_line(progress: &RunProgress) -> String {
    format!("Correct: {} / {}", progress.correct_count, progress.pass_threshold)
}

/// Banner text for a phase
pub fn phase_banner(phase: RunPhase) -> &'static str {
    match phase {
        RunPhase::NotStarted => "Ready? Press start",
        RunPhase::Playing => "",
        RunPhase::Answering => "Answer the question!",
        RunPhase::Victory => "You made it!",
        RunPhase::Defeated => "Not this time, try again!",
    }
}

/// Victory line with the elapsed run time
pub fn victory_line(elapsed_secs: u64) -> String {
    format!("Finished in {elapsed_secs} s")
}

/// Drain the run's events into a presenter, then hand it the frame view
pub fn present(run: &mut Run, presenter: &mut dyn Presenter) {
    for event in run.drain_events() {
        presenter.on_event(&event);
    }
    presenter.on_frame(&run.view());
}

/// Presenter that writes everything to the log
#[derive(Debug, Default)]
pub struct LogPresenter {
    /// Events seen so far
    pub events_seen: usize,
    /// Last score readout
    pub score: String,
}

impl Presenter for LogPresenter {
    fn on_event(&mut self, event: &GameEvent) {
        self.events_seen += 1;
        match event {
            GameEvent::PhaseChanged { to, .. } => {
                let banner = phase_banner(*to);
                if !banner.is_empty() {
                    log::info!("{banner}");
                }
            }
            GameEvent::Warning { code, message } => log::warn!("[{code}] {message}"),
            GameEvent::ObstacleHit { id } => log::debug!("Hit obstacle {id}"),
            GameEvent::StunEnded => log::debug!("Recovered from stun"),
            GameEvent::BonusCollected { id } => log::debug!("Collected bonus {id}"),
            GameEvent::QuestionPresented(view) => {
                log::info!("Q: {}", view.prompt);
                for (i, option) in view.options.iter().enumerate() {
                    log::info!("   {}. {}", i + 1, option);
                }
            }
            GameEvent::AnswerJudged { message, .. } => log::info!("{message}"),
            GameEvent::ScoreChanged {
                correct,
                pass_threshold,
            } => {
                self.score = format!("Correct: {correct} / {pass_threshold}");
                log::info!("{}", self.score);
            }
            GameEvent::QuestionClosed => {}
            GameEvent::Victory { elapsed_secs } => log::info!("{}", victory_line(*elapsed_secs)),
            GameEvent::Defeat => {}
            GameEvent::OpenLink { url } => log::info!("Feedback form: {url}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GameConfig;
    use crate::sim::bank::tests::sample_table;

    #[test]
    fn test_score_line() {
        let mut progress = RunProgress::new(5, 10);
        progress.record(true);
        progress.record(true);
        progress.record(false);
        assert_eq!(score_line(&progress), "Correct: 2 / 5");
    }

    #[test]
    fn test_victory_line() {
        assert_eq!(victory_line(42), "Finished in 42 s");
    }

    #[test]
    fn test_present_drains_events() {
        let mut run = Run::from_table(GameConfig::default(), &sample_table(10), 2).expect("valid");
        run.start();
        let mut presenter = LogPresenter::default();
        present(&mut run, &mut presenter);
        assert!(presenter.events_seen >= 1);
        assert!(run.drain_events().is_empty());
    }

    #[test]
    fn test_score_event_updates_readout() {
        let mut presenter = LogPresenter::default();
        presenter.on_event(&GameEvent::ScoreChanged {
            correct: 3,
            pass_threshold: 5,
        });
        assert_eq!(presenter.score, "Correct: 3 / 5");
    }
}
