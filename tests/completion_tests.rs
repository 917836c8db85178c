use undograph::UndoGraph;


use budget_models::{Budget, BudgetItem};

#[test]
fn test_completions_match_prefix() {
    let graph = UndoGraph::open_in_memory().expect("graph");
    let mut first = BudgetItem::new("budget item test", 1.5);
    let mut second = BudgetItem::new("budget item test2", 2.1);
    graph.save(&mut first).expect("save");
    graph.save(&mut second).expect("save");

    let hits = graph
        .completions::<BudgetItem>("label", "budget i")
        .expect("completions");
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0], "budget item test");
    assert_eq!(hits[1], "budget item test2");

    let misses = graph
        .completions::<BudgetItem>("label", "budget in")
        .expect("completions");
    assert!(misses.is_empty());
}

#[test]
fn test_completions_are_scoped_by_type_and_property() {
    let graph = UndoGraph::open_in_memory().expect("graph");
    let mut item = BudgetItem::new("budget item test", 1.5);
    graph.save(&mut item).expect("save");

    let wrong_property = graph
        .completions::<BudgetItem>("memo", "budget")
        .expect("completions");
    assert!(wrong_property.is_empty());

    let wrong_type = graph
        .completions::<Budget>("label", "budget")
        .expect("completions");
    assert!(wrong_type.is_empty());
}

#[test]
fn test_reindexing_same_label_keeps_one_row() {
    let graph = UndoGraph::open_in_memory().expect("graph");
    let mut item = BudgetItem::new("repeat", 1.0);
    graph.save(&mut item).expect("save");
    item.budgeted = 2.0;
    graph.save(&mut item).expect("update");

    let hits = graph
        .completions::<BudgetItem>("label", "rep")
        .expect("completions");
    assert_eq!(hits, vec!["repeat".to_string()]);
}

#[test]
fn test_completion_prefix_wildcards_are_literal() {
    let graph = UndoGraph::open_in_memory().expect("graph");
    graph
        .index_completion::<BudgetItem>("label", "100% wool")
        .expect("index");
    graph
        .index_completion::<BudgetItem>("label", "100 grams")
        .expect("index");

    let hits = graph
        .completions::<BudgetItem>("label", "100%")
        .expect("completions");
    assert_eq!(hits, vec!["100% wool".to_string()]);
}
