//! End-to-end engine scenarios across taxonomy, quiz, selector and ranking

use std::sync::Arc;

use dpr_common::ranking;
use dpr_common::{ClassRecord, QuizSession, QuizState, SelectorFilterEngine, TaggedItem, TaxonomyTree};

fn problem_tree() -> Arc<TaxonomyTree> {
    Arc::new(
        TaxonomyTree::build(
            "root",
            vec![
                ClassRecord::new("root", None, &["P", "Q"]),
                ClassRecord::new("P", Some("root"), &["L", "M"]),
                ClassRecord::new("L", Some("P"), &[]),
                ClassRecord::new("M", Some("P"), &[]),
                ClassRecord::new("Q", Some("root"), &[]),
            ],
        )
        .unwrap(),
    )
}

#[test]
fn test_completed_quiz_ranks_leaves() {
    let mut session = QuizSession::new(problem_tree());
    session.start().unwrap();
    for value in [1.0, 0.5, 1.0, 0.0] {
        session.answer(value, false).unwrap();
    }
    assert_eq!(session.state(), QuizState::Completed);

    let ranked = ranking::rank(session.leaf_scores());
    let summary: Vec<(&str, f64, &str)> = ranked
        .iter()
        .map(|e| (e.key.as_str(), e.score, e.label))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("M", 1.0, "Extremely recommended"),
            ("L", 0.75, "Highly recommended"),
            ("Q", 0.0, "Not recommended"),
        ]
    );
}

#[test]
fn test_identical_answers_give_identical_sessions() {
    let tree = problem_tree();
    let mut a = QuizSession::new(Arc::clone(&tree));
    let mut b = QuizSession::new(tree);
    a.start().unwrap();
    b.start().unwrap();

    for (value, skip) in [(0.5, false), (0.25, true), (1.0, false), (0.0, false)] {
        a.answer(value, skip).unwrap();
        b.answer(value, skip).unwrap();
        assert_eq!(a.history(), b.history());
        assert_eq!(
            a.current_question().map(|n| &n.id),
            b.current_question().map(|n| &n.id)
        );
    }
    assert_eq!(a.state(), QuizState::Completed);
}

#[test]
fn test_selector_filter_over_shared_tree() {
    let tree = Arc::new(
        TaxonomyTree::build(
            "root",
            vec![
                ClassRecord::new("root", None, &["A", "B"]),
                ClassRecord::new("A", Some("root"), &["A1"]),
                ClassRecord::new("A1", Some("A"), &[]),
                ClassRecord::new("B", Some("root"), &[]),
            ],
        )
        .unwrap(),
    );
    let items = vec![
        TaggedItem::new("k1", "First", &["A1"]),
        TaggedItem::new("k2", "Second", &["B"]),
    ];

    let mut first = SelectorFilterEngine::new(Arc::clone(&tree));
    let second = SelectorFilterEngine::new(tree);
    first.select("root", "A").unwrap();

    let keys: Vec<&str> = first.filter(&items, "").iter().map(|i| i.key.as_str()).collect();
    assert_eq!(keys, vec!["k1"]);
    assert_eq!(second.filter(&items, "").len(), 2);
}
