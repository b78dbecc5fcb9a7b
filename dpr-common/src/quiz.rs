//! Adaptive quiz over the problem taxonomy
//!
//! A session walks the tree in a fixed order: top-level questions in declared
//! order, and within an answered branch the first unanswered node found by
//! depth-first pre-order search. Answering with `skip` propagates the value to
//! every unanswered descendant in one step.
//!
//! The structural tree is shared read-only; answers live in a per-session
//! overlay keyed by node id.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::taxonomy::{TaxonomyNode, TaxonomyTree};
use crate::{Error, Result};

/// Quiz lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizState {
    NotStarted,
    InProgress,
    Completed,
}

impl QuizState {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuizState::NotStarted => "not_started",
            QuizState::InProgress => "in_progress",
            QuizState::Completed => "completed",
        }
    }
}

impl fmt::Display for QuizState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded answer, in the order answers were applied
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub question_id: String,
    pub question_label: String,
    pub answer: f64,
    /// Filled by a skip on an ancestor rather than answered directly
    pub was_prefilled: bool,
}

/// Assignments produced by skipping `question` with `value`
///
/// Returns the unanswered strict descendants of `question` in pre-order, each
/// paired with `value`. Pure: the caller merges the result into its answers.
pub fn skip_fill<'a>(
    tree: &'a TaxonomyTree,
    answers: &HashMap<String, f64>,
    question: &str,
    value: f64,
) -> Result<Vec<(&'a str, f64)>> {
    Ok(tree
        .descendants_preorder(question)?
        .into_iter()
        .filter(|id| !answers.contains_key(*id))
        .map(|id| (id, value))
        .collect())
}

/// Next question to ask, or `None` when nothing reachable is unanswered
///
/// Iterates `top_questions` in order. An unanswered top-level question is
/// returned directly; an answered one is searched depth-first through its
/// children in declared order for the first unanswered node. `current` is
/// never returned.
pub fn next_question<'a>(
    tree: &'a TaxonomyTree,
    top_questions: &[String],
    answers: &HashMap<String, f64>,
    current: Option<&str>,
) -> Option<&'a str> {
    for question in top_questions {
        let node = tree.get(question)?;
        if !answers.contains_key(question) && current != Some(question.as_str()) {
            return Some(node.id.as_str());
        }
        if let Some(found) = search_unanswered(tree, node, answers, current) {
            return Some(found);
        }
    }
    None
}

fn search_unanswered<'a>(
    tree: &'a TaxonomyTree,
    node: &'a TaxonomyNode,
    answers: &HashMap<String, f64>,
    current: Option<&str>,
) -> Option<&'a str> {
    for child_id in &node.children {
        let child = tree.get(child_id)?;
        if !answers.contains_key(child_id) && current != Some(child_id.as_str()) {
            return Some(child.id.as_str());
        }
        if let Some(found) = search_unanswered(tree, child, answers, current) {
            return Some(found);
        }
    }
    None
}

/// One user's pass through the quiz
#[derive(Debug, Clone)]
pub struct QuizSession {
    tree: Arc<TaxonomyTree>,
    top_questions: Vec<String>,
    answers: HashMap<String, f64>,
    current_question: Option<String>,
    step: usize,
    history: Vec<HistoryEntry>,
    state: QuizState,
}

impl QuizSession {
    pub fn new(tree: Arc<TaxonomyTree>) -> Self {
        let top_questions = tree
            .top_level_questions()
            .into_iter()
            .map(str::to_string)
            .collect();
        Self {
            tree,
            top_questions,
            answers: HashMap::new(),
            current_question: None,
            step: 0,
            history: Vec::new(),
            state: QuizState::NotStarted,
        }
    }

    pub fn tree(&self) -> &TaxonomyTree {
        &self.tree
    }

    pub fn state(&self) -> QuizState {
        self.state
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn top_questions(&self) -> &[String] {
        &self.top_questions
    }

    /// Number of answerable nodes (every node but the root)
    pub fn total_questions(&self) -> usize {
        self.tree.len().saturating_sub(1)
    }

    pub fn current_question(&self) -> Option<&TaxonomyNode> {
        self.current_question.as_deref().and_then(|id| self.tree.get(id))
    }

    pub fn answer_of(&self, id: &str) -> Option<f64> {
        self.answers.get(id).copied()
    }

    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    /// Record an answer directly on a node
    ///
    /// Bypasses traversal; used to restore or pre-seed a session.
    pub fn set_answer(&mut self, id: &str, value: f64) -> Result<()> {
        self.tree.node(id)?;
        if id == self.tree.root_id() {
            return Err(Error::InvalidInput("the root is not a question".to_string()));
        }
        self.answers.insert(id.to_string(), value);
        Ok(())
    }

    /// Begin the quiz at the first top-level question
    ///
    /// A tree with no questions completes immediately.
    pub fn start(&mut self) -> Result<()> {
        self.require(QuizState::NotStarted, "start")?;

        match self.top_questions.first() {
            Some(first) => {
                self.current_question = Some(first.clone());
                self.state = QuizState::InProgress;
                info!(question = %first, questions = self.total_questions(), "Quiz started");
            }
            None => {
                self.state = QuizState::Completed;
                info!("Quiz started on an empty taxonomy; nothing to ask");
            }
        }
        Ok(())
    }

    /// Answer the current question
    ///
    /// With `skip`, every unanswered descendant of the current question is
    /// first filled with `value` (one prefilled history entry each, pre-order),
    /// then the question itself is recorded. `step` grows by the number of
    /// answers written.
    pub fn answer(&mut self, value: f64, skip: bool) -> Result<()> {
        self.require(QuizState::InProgress, "answer")?;
        if !value.is_finite() {
            return Err(Error::InvalidInput(format!("answer must be finite, got {}", value)));
        }
        let current = self
            .current_question
            .clone()
            .ok_or_else(|| Error::InvalidInput("no question awaiting an answer".to_string()))?;

        if skip {
            let fills: Vec<(String, f64)> = skip_fill(&self.tree, &self.answers, &current, value)?
                .into_iter()
                .map(|(id, v)| (id.to_string(), v))
                .collect();
            debug!(question = %current, filled = fills.len(), "Skip-filling subtree");
            for (id, v) in fills {
                self.record(&id, v, true)?;
            }
        }
        self.record(&current, value, false)?;

        let next = next_question(&self.tree, &self.top_questions, &self.answers, Some(current.as_str()))
            .map(str::to_string);
        if let Some(next) = next {
            debug!(step = self.step, next = %next, "Next question");
            self.current_question = Some(next);
        }

        if next_question(&self.tree, &self.top_questions, &self.answers, None).is_none() {
            debug_assert_eq!(self.answers.len(), self.total_questions());
            self.state = QuizState::Completed;
            info!(step = self.step, "Quiz completed");
        }
        Ok(())
    }

    fn record(&mut self, id: &str, value: f64, was_prefilled: bool) -> Result<()> {
        let node = self.tree.node(id)?;
        self.history.push(HistoryEntry {
            question_id: node.id.clone(),
            question_label: node.label.clone(),
            answer: value,
            was_prefilled,
        });
        self.answers.insert(id.to_string(), value);
        self.step += 1;
        Ok(())
    }

    /// Discard all answers and history, returning to `NotStarted`
    pub fn reset(&mut self) {
        self.answers.clear();
        self.history.clear();
        self.current_question = None;
        self.step = 0;
        self.state = QuizState::NotStarted;
        debug!("Quiz reset");
    }

    /// Mean of the answers on the path from the root's child down to `leaf_id`
    ///
    /// # Errors
    /// `IncompleteAnswer` when a node on the path is unanswered,
    /// `InvalidInput` when `leaf_id` is not a leaf.
    pub fn score_of(&self, leaf_id: &str) -> Result<f64> {
        if !self.tree.is_leaf(leaf_id)? || leaf_id == self.tree.root_id() {
            return Err(Error::InvalidInput(format!("{} is not a leaf question", leaf_id)));
        }
        let path: Vec<&str> = self
            .tree
            .ancestors_of(leaf_id)?
            .into_iter()
            .filter(|id| *id != self.tree.root_id())
            .collect();

        let mut branch_points = 0.0;
        for id in &path {
            branch_points += self.answers.get(*id).ok_or_else(|| {
                Error::IncompleteAnswer(format!("{} (no answer for {})", leaf_id, id))
            })?;
        }
        Ok(branch_points / path.len() as f64)
    }

    /// Scores of every eligible leaf, in tree pre-order
    ///
    /// A leaf is eligible when it holds a non-negative answer and its whole
    /// ancestor chain is answered.
    pub fn leaf_scores(&self) -> Vec<(String, f64)> {
        self.tree
            .preorder()
            .into_iter()
            .filter(|n| n.is_leaf() && n.id != self.tree.root_id())
            .filter(|n| self.answers.get(&n.id).is_some_and(|a| *a >= 0.0))
            .filter_map(|n| self.score_of(&n.id).ok().map(|s| (n.id.clone(), s)))
            .collect()
    }

    fn require(&self, expected: QuizState, operation: &'static str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(Error::InvalidTransition {
                operation,
                state: self.state.as_str(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::ClassRecord;

    fn two_branch_tree() -> Arc<TaxonomyTree> {
        Arc::new(
            TaxonomyTree::build(
                "onto:Problem",
                vec![
                    ClassRecord::new("Q1", Some("onto:Problem"), &["Q1a", "Q1b"]),
                    ClassRecord::new("Q1a", Some("Q1"), &[]),
                    ClassRecord::new("Q1b", Some("Q1"), &[]),
                    ClassRecord::new("Q2", Some("onto:Problem"), &[]),
                ],
            )
            .unwrap(),
        )
    }

    fn deep_tree() -> Arc<TaxonomyTree> {
        Arc::new(
            TaxonomyTree::build(
                "root",
                vec![
                    ClassRecord::new("A", Some("root"), &["A1", "A2"]),
                    ClassRecord::new("A1", Some("A"), &["A1x", "A1y"]),
                    ClassRecord::new("A1x", Some("A1"), &[]),
                    ClassRecord::new("A1y", Some("A1"), &[]),
                    ClassRecord::new("A2", Some("A"), &[]),
                    ClassRecord::new("B", Some("root"), &["B1"]),
                    ClassRecord::new("B1", Some("B"), &[]),
                ],
            )
            .unwrap(),
        )
    }

    fn current_id(session: &QuizSession) -> Option<&str> {
        session.current_question().map(|n| n.id.as_str())
    }

    #[test]
    fn test_quiz_path_scenario() {
        let mut session = QuizSession::new(two_branch_tree());
        session.start().unwrap();
        assert_eq!(session.state(), QuizState::InProgress);
        assert_eq!(current_id(&session), Some("Q1"));

        session.answer(1.0, true).unwrap();
        assert_eq!(session.answer_of("Q1a"), Some(1.0));
        assert_eq!(session.answer_of("Q1b"), Some(1.0));
        assert_eq!(session.answer_of("Q1"), Some(1.0));
        assert_eq!(session.step(), 3);
        assert_eq!(current_id(&session), Some("Q2"));
        assert_eq!(session.state(), QuizState::InProgress);

        session.answer(1.0, false).unwrap();
        assert_eq!(session.state(), QuizState::Completed);
        assert_eq!(session.step(), 4);
    }

    #[test]
    fn test_skip_history_is_preorder_then_question() {
        let mut session = QuizSession::new(deep_tree());
        session.start().unwrap();
        session.answer(0.0, true).unwrap();

        let order: Vec<(&str, bool)> = session
            .history()
            .iter()
            .map(|h| (h.question_id.as_str(), h.was_prefilled))
            .collect();
        assert_eq!(
            order,
            vec![
                ("A1", true),
                ("A1x", true),
                ("A1y", true),
                ("A2", true),
                ("A", false),
            ]
        );
        assert_eq!(session.step(), 5);
        assert_eq!(current_id(&session), Some("B"));
    }

    #[test]
    fn test_descends_into_answered_branch() {
        let mut session = QuizSession::new(deep_tree());
        session.start().unwrap();
        session.answer(1.0, false).unwrap();
        assert_eq!(current_id(&session), Some("A1"));
        session.answer(0.5, false).unwrap();
        assert_eq!(current_id(&session), Some("A1x"));
        session.answer(0.5, false).unwrap();
        assert_eq!(current_id(&session), Some("A1y"));
        session.answer(0.25, false).unwrap();
        assert_eq!(current_id(&session), Some("A2"));
        session.answer(0.0, true).unwrap();
        assert_eq!(current_id(&session), Some("B"));
        session.answer(1.0, true).unwrap();
        assert_eq!(session.state(), QuizState::Completed);
        assert_eq!(session.answered_count(), session.total_questions());
        // The last asked question stays current once nothing remains
        assert_eq!(current_id(&session), Some("B"));
    }

    #[test]
    fn test_skip_fill_leaves_existing_answers() {
        let tree = deep_tree();
        let mut answers = HashMap::new();
        answers.insert("A1x".to_string(), 0.25);
        let fills = skip_fill(&tree, &answers, "A", 1.0).unwrap();
        let ids: Vec<&str> = fills.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec!["A1", "A1y", "A2"]);
        assert!(fills.iter().all(|(_, v)| *v == 1.0));
    }

    #[test]
    fn test_next_question_excludes_current() {
        let tree = deep_tree();
        let top: Vec<String> = vec!["A".into(), "B".into()];
        let answers = HashMap::new();
        assert_eq!(next_question(&tree, &top, &answers, None), Some("A"));
        assert_eq!(next_question(&tree, &top, &answers, Some("A")), Some("A1"));
    }

    #[test]
    fn test_identical_answers_give_identical_sessions() {
        let tree = deep_tree();
        let script = [(1.0, false), (0.0, true), (0.75, false), (1.0, true)];
        let mut first = QuizSession::new(tree.clone());
        let mut second = QuizSession::new(tree);
        first.start().unwrap();
        second.start().unwrap();
        for (value, skip) in script {
            first.answer(value, skip).unwrap();
            second.answer(value, skip).unwrap();
            assert_eq!(first.history(), second.history());
            assert_eq!(current_id(&first), current_id(&second));
        }
    }

    #[test]
    fn test_transitions_are_guarded() {
        let mut session = QuizSession::new(two_branch_tree());
        assert!(matches!(
            session.answer(1.0, false),
            Err(Error::InvalidTransition { operation: "answer", .. })
        ));
        session.start().unwrap();
        assert!(matches!(
            session.start(),
            Err(Error::InvalidTransition { operation: "start", .. })
        ));
        session.answer(1.0, true).unwrap();
        session.answer(1.0, true).unwrap();
        assert_eq!(session.state(), QuizState::Completed);
        assert!(session.answer(1.0, false).is_err());

        session.reset();
        assert_eq!(session.state(), QuizState::NotStarted);
        assert_eq!(session.step(), 0);
        assert!(session.history().is_empty());
        assert_eq!(session.answer_of("Q1"), None);
        session.start().unwrap();
        assert_eq!(current_id(&session), Some("Q1"));
    }

    #[test]
    fn test_non_finite_answer_rejected() {
        let mut session = QuizSession::new(two_branch_tree());
        session.start().unwrap();
        assert!(matches!(session.answer(f64::NAN, false), Err(Error::InvalidInput(_))));
        assert_eq!(session.step(), 0);
    }

    #[test]
    fn test_empty_taxonomy_completes_on_start() {
        let mut session = QuizSession::new(Arc::new(TaxonomyTree::empty("onto:Problem")));
        session.start().unwrap();
        assert_eq!(session.state(), QuizState::Completed);
        assert!(session.current_question().is_none());
    }

    #[test]
    fn test_score_scenario() {
        let tree = Arc::new(
            TaxonomyTree::build(
                "root",
                vec![
                    ClassRecord::new("P", Some("root"), &["L"]),
                    ClassRecord::new("L", Some("P"), &[]),
                ],
            )
            .unwrap(),
        );
        let mut session = QuizSession::new(tree);
        session.set_answer("P", 1.0).unwrap();
        session.set_answer("L", 0.5).unwrap();
        assert_eq!(session.score_of("L").unwrap(), 0.75);
    }

    #[test]
    fn test_score_requires_full_chain() {
        let mut session = QuizSession::new(deep_tree());
        session.set_answer("A1x", 1.0).unwrap();
        session.set_answer("A", 1.0).unwrap();
        assert!(matches!(session.score_of("A1x"), Err(Error::IncompleteAnswer(_))));
        assert!(matches!(session.score_of("A1"), Err(Error::InvalidInput(_))));
        assert!(session.leaf_scores().is_empty());
    }

    #[test]
    fn test_scores_stay_in_unit_interval() {
        let scale = [0.0, 0.25, 0.5, 0.75, 1.0];
        let tree = deep_tree();
        for (i, a) in scale.iter().enumerate() {
            for b in &scale {
                let mut session = QuizSession::new(tree.clone());
                session.start().unwrap();
                session.answer(*a, false).unwrap();
                session.answer(*b, true).unwrap();
                session.answer(scale[(i + 2) % scale.len()], true).unwrap();
                session.answer(*b, true).unwrap();
                assert_eq!(session.state(), QuizState::Completed);
                for (_, score) in session.leaf_scores() {
                    assert!((0.0..=1.0).contains(&score));
                }
            }
        }
    }

    #[test]
    fn test_negative_answers_are_not_eligible() {
        let mut session = QuizSession::new(two_branch_tree());
        session.start().unwrap();
        session.answer(1.0, false).unwrap();
        session.answer(-1.0, false).unwrap();
        session.answer(0.5, false).unwrap();
        session.answer(1.0, false).unwrap();
        assert_eq!(session.state(), QuizState::Completed);
        let scores = session.leaf_scores();
        assert_eq!(scores, vec![("Q1b".to_string(), 0.75), ("Q2".to_string(), 1.0)]);
    }
}
