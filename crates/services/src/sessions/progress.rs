use quiz_core::scoring::rounded_percent;

/// Where the user stands in a session, and which controls are usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    /// 1-based position of the current question.
    pub position: usize,
    pub total: usize,
    pub answered: usize,
    pub percent: u32,
    pub can_go_back: bool,
    pub can_advance: bool,
    pub can_submit: bool,
}

impl SessionProgress {
    pub(crate) fn at(current: usize, answers: &[Option<u32>]) -> Self {
        let total = answers.len();
        let is_last = current + 1 >= total;
        let current_answered = answers.get(current).is_some_and(Option::is_some);
        let position = (current + 1).min(total);

        Self {
            position,
            total,
            answered: answers.iter().filter(|a| a.is_some()).count(),
            percent: rounded_percent(
                u32::try_from(position).unwrap_or(u32::MAX),
                u32::try_from(total).unwrap_or(u32::MAX),
            ),
            can_go_back: current > 0,
            can_advance: current_answered && !is_last,
            can_submit: current_answered && is_last,
        }
    }
}

/// Outcome of a submitted attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptResult {
    pub score: u32,
    pub total: u32,
    pub percentage: u32,
    pub correct: u32,
    pub wrong: u32,
}

impl AttemptResult {
    pub(crate) fn new(score: u32, total: u32) -> Self {
        Self {
            score,
            total,
            percentage: rounded_percent(score, total),
            correct: score,
            wrong: total.saturating_sub(score),
        }
    }
}
