//! Question bank loading and per-run selection

use rand::seq::SliceRandom;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::error::{GameError, RecordFault};

/// Fields per row: prompt, four options, correct answer
pub const FIELDS_PER_RECORD: usize = 6;
/// Options per question
pub const OPTION_COUNT: usize = 4;

/// One multiple-choice question (immutable once loaded)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub prompt: String,
    pub options: [String; OPTION_COUNT],
    pub correct_option: String,
}

impl QuestionRecord {
    /// Whether `selected` is the correct answer (trimmed comparison)
    pub fn is_correct(&self, selected: &str) -> bool {
        selected.trim() == self.correct_option.trim()
    }
}

/// Parse a comma-separated question table.
///
/// Blank lines are skipped. Any other line must have exactly six fields,
/// none empty, and the last field must match exactly one option.
pub fn load(raw: &str) -> Result<Vec<QuestionRecord>, GameError> {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let mut records = Vec::new();

    for (idx, row) in raw.lines().enumerate() {
        if row.trim().is_empty() {
            continue;
        }
        let line = idx + 1;
        let fields: Vec<&str> = row.split(',').map(str::trim).collect();
        if fields.len() != FIELDS_PER_RECORD {
            return Err(GameError::MalformedRecord {
                line,
                fault: RecordFault::FieldCount { found: fields.len() },
            });
        }
        if let Some(index) = fields.iter().position(|f| f.is_empty()) {
            return Err(GameError::MalformedRecord {
                line,
                fault: RecordFault::EmptyField { index },
            });
        }

        let options = [
            fields[1].to_string(),
            fields[2].to_string(),
            fields[3].to_string(),
            fields[4].to_string(),
        ];
        let correct_option = fields[5].to_string();
        match options.iter().filter(|o| **o == correct_option).count() {
            1 => {}
            0 => {
                return Err(GameError::MalformedRecord {
                    line,
                    fault: RecordFault::AnswerNotInOptions,
                });
            }
            _ => {
                return Err(GameError::MalformedRecord {
                    line,
                    fault: RecordFault::AmbiguousAnswer,
                });
            }
        }

        records.push(QuestionRecord {
            prompt: fields[0].to_string(),
            options,
            correct_option,
        });
    }

    log::info!("Loaded {} question records", records.len());
    Ok(records)
}

/// The questions drawn for one run, consumed front to back
#[derive(Debug, Clone, Default)]
pub struct RunQuestionQueue {
    records: Vec<QuestionRecord>,
    requested: usize,
    next: usize,
}

impl RunQuestionQueue {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of questions already handed out
    pub fn consumed(&self) -> usize {
        self.next
    }

    pub fn is_exhausted(&self) -> bool {
        self.next >= self.records.len()
    }

    /// Take the next unconsumed question
    pub fn next_question(&mut self) -> Option<QuestionRecord> {
        let record = self.records.get(self.next)?.clone();
        self.next += 1;
        Some(record)
    }

    pub fn records(&self) -> &[QuestionRecord] {
        &self.records
    }

    /// Warning if the bank could not fill the requested run length
    pub fn shortfall(&self) -> Option<GameError> {
        (self.records.len() < self.requested).then(|| GameError::InsufficientQuestions {
            requested: self.requested,
            available: self.records.len(),
        })
    }
}

/// Shuffle the whole bank and keep the first `count` records
pub fn select_for_run(bank: &[QuestionRecord], count: usize, rng: &mut Pcg32) -> RunQuestionQueue {
    let mut records = bank.to_vec();
    records.shuffle(rng);
    records.truncate(count);

    let queue = RunQuestionQueue {
        records,
        requested: count,
        next: 0,
    };
    if let Some(warning) = queue.shortfall() {
        log::warn!("{warning}; run will ask fewer questions");
    }
    queue
}
