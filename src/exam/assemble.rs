//! Joins segmented questions, answers and figures into the output table.

use std::collections::BTreeMap;

use crate::model::{QuestionBlock, QuestionRecord, QuestionTable};

use super::answer_key::AnswerJoin;

/// Builds the final [`QuestionTable`].
#[derive(Debug, Clone)]
pub struct RecordAssembler {
    question_count: u32,
}

impl RecordAssembler {
    /// Create an assembler for `question_count` questions.
    pub fn new(question_count: u32) -> Self {
        Self { question_count }
    }

    /// One row per block, sorted by number, first block winning on duplicates.
    ///
    /// Answers come from `answers`; figure paths from `figures` keyed by
    /// question number. Absent data stays `None`.
    pub fn assemble<J: AnswerJoin + ?Sized>(
        &self,
        blocks: Vec<QuestionBlock>,
        answers: &J,
        figures: &BTreeMap<u32, String>,
    ) -> QuestionTable {
        let records = blocks
            .into_iter()
            .map(|block| {
                let mut record = QuestionRecord::from_block(block);
                record.answer = answers.answer_for(record.number);
                record.figure = figures.get(&record.number).cloned();
                record
            })
            .collect();

        let table = QuestionTable::new(records, self.question_count);
        log::debug!(
            "Assembled {} rows ({} with figures, {} missing)",
            table.len(),
            table.figure_count(),
            table.missing.len()
        );
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exam::AnswerKey;
    use crate::model::Letter;

    fn block(number: u32, stem: &str) -> QuestionBlock {
        QuestionBlock {
            number,
            stem: stem.to_string(),
            options: [
                "Water".to_string(),
                "Ice".to_string(),
                "Steam".to_string(),
                "Gas".to_string(),
            ],
        }
    }

    #[test]
    fn test_assemble_joins_answers_and_figures() {
        let key = AnswerKey::from_letters(vec![Letter::A, Letter::C]);
        let mut figures = BTreeMap::new();
        figures.insert(2, "figures/q_2_figure.png".to_string());

        let table = RecordAssembler::new(3).assemble(
            vec![block(2, "Second"), block(1, "What is H₂O?")],
            &key,
            &figures,
        );

        assert_eq!(table.len(), 2);
        let first = table.get(1).unwrap();
        assert_eq!(first.question, "What is H₂O?");
        assert_eq!(first.a, "Water");
        assert_eq!(first.answer, Some(Letter::A));
        assert_eq!(first.figure, None);

        let second = table.get(2).unwrap();
        assert_eq!(second.answer, Some(Letter::C));
        assert_eq!(second.figure.as_deref(), Some("figures/q_2_figure.png"));
        assert_eq!(table.missing, vec![3]);
    }

    #[test]
    fn test_answer_outside_key_is_empty() {
        let key = AnswerKey::from_letters(vec![Letter::B]);
        let table = RecordAssembler::new(5).assemble(vec![block(5, "Q")], &key, &BTreeMap::new());
        assert_eq!(table.get(5).unwrap().answer, None);
    }
}
