use std::collections::BTreeMap;

use crate::model::{Mistake, Question, QuestionId};
use crate::time::Timestamp;

/// Attempt number recorded on every mistake of a submitted quiz.
pub const FIRST_ATTEMPT: u32 = 1;

/// Outcome of grading a full pass over a question list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredAttempt {
    pub score: u32,
    pub mistakes: BTreeMap<QuestionId, Mistake>,
}

/// Grade `answers` against `questions` index by index.
///
/// Every question whose slot is empty or holds a wrong option becomes a
/// mistake keyed by the question id. Slots beyond the question list are ignored.
#[must_use]
pub fn score_attempt(questions: &[Question], answers: &[Option<u32>], at: Timestamp) -> ScoredAttempt {
    let mut score = 0_u32;
    let mut mistakes = BTreeMap::new();

    for (index, question) in questions.iter().enumerate() {
        let selected = answers.get(index).copied().flatten();
        if question.is_correct(selected) {
            score = score.saturating_add(1);
        } else {
            mistakes.insert(
                question.id().clone(),
                Mistake {
                    selected_answer: selected,
                    correct_answer: question.correct_answer_index(),
                    attempt: FIRST_ATTEMPT,
                    timestamp: at,
                },
            );
        }
    }

    ScoredAttempt { score, mistakes }
}

/// `round(part / whole * 100)` with halves rounded up; 0 when `whole` is 0.
#[must_use]
pub fn rounded_percent(part: u32, whole: u32) -> u32 {
    if whole == 0 {
        return 0;
    }
    let part = u64::from(part);
    let whole = u64::from(whole);
    u32::try_from((part * 200 + whole) / (whole * 2)).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QuestionDraft;

    fn questions(correct: &[u32]) -> Vec<Question> {
        correct
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                QuestionDraft {
                    id: QuestionId::new(format!("q{}", i + 1)).unwrap(),
                    prompt: format!("Question {}", i + 1),
                    options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                    correct_answer_index: c,
                }
                .validate()
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn scores_partially_answered_attempt() {
        let questions = questions(&[0, 1, 2, 3, 0]);
        let answers = [Some(0), Some(1), Some(1), Some(3), None];
        let at = Timestamp::from_millis(1_000);

        let scored = score_attempt(&questions, &answers, at);

        assert_eq!(scored.score, 3);
        let ids: Vec<_> = scored.mistakes.keys().map(QuestionId::as_str).collect();
        assert_eq!(ids, vec!["q3", "q5"]);

        let wrong = &scored.mistakes[&QuestionId::new("q3").unwrap()];
        assert_eq!(wrong.selected_answer, Some(1));
        assert_eq!(wrong.correct_answer, 2);
        assert_eq!(wrong.attempt, FIRST_ATTEMPT);
        assert_eq!(wrong.timestamp, at);

        let skipped = &scored.mistakes[&QuestionId::new("q5").unwrap()];
        assert_eq!(skipped.selected_answer, None);
    }

    #[test]
    fn short_answer_list_counts_missing_slots_as_mistakes() {
        let questions = questions(&[1, 1]);
        let scored = score_attempt(&questions, &[Some(1)], Timestamp::EPOCH);
        assert_eq!(scored.score, 1);
        assert_eq!(scored.mistakes.len(), 1);
    }

    #[test]
    fn percent_rounds_half_up() {
        assert_eq!(rounded_percent(5, 10), 50);
        assert_eq!(rounded_percent(1, 3), 33);
        assert_eq!(rounded_percent(2, 3), 67);
        assert_eq!(rounded_percent(1, 8), 13);
        assert_eq!(rounded_percent(0, 0), 0);
        assert_eq!(rounded_percent(7, 7), 100);
    }
}
