use undograph::UndoGraph;


use budget_models::{Budget, BudgetItem};

#[test]
fn test_save_and_retrieve_two_items() {
    let graph = UndoGraph::open_in_memory().expect("graph");
    let mut first = BudgetItem::new("budget item test", 1.5);
    let mut second = BudgetItem::new("budget item test2", 2.1);
    graph.save(&mut first).expect("save first");
    graph.save(&mut second).expect("save second");

    let items: Vec<BudgetItem> = graph.retrieve().expect("retrieve");
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].label, "budget item test");
    assert_eq!(items[1].label, "budget item test2");
}

#[test]
fn test_save_assigns_monotonic_ids() {
    let graph = UndoGraph::open_in_memory().expect("graph");
    let mut first = BudgetItem::new("a", 1.0);
    let mut second = BudgetItem::new("b", 2.0);
    graph.save(&mut first).expect("save");
    graph.save(&mut second).expect("save");
    let first_id = first.id.expect("id assigned");
    let second_id = second.id.expect("id assigned");
    assert!(first_id < second_id);
}

#[test]
fn test_retrieve_page_windows_by_insertion_order() {
    let graph = UndoGraph::open_in_memory().expect("graph");
    for idx in 0..5 {
        let mut item = BudgetItem::new(&format!("item {idx}"), idx as f64);
        graph.save(&mut item).expect("save");
    }
    let window: Vec<BudgetItem> = graph.retrieve_page(1, 2).expect("page");
    assert_eq!(window.len(), 2);
    assert_eq!(window[0].label, "item 1");
    assert_eq!(window[1].label, "item 2");
}

#[test]
fn test_retrieve_by_id_round_trips() {
    let graph = UndoGraph::open_in_memory().expect("graph");
    let mut item = BudgetItem::new("solo", 9.75);
    graph.save(&mut item).expect("save");
    let id = item.id.expect("id");
    let loaded: BudgetItem = graph.retrieve_by_id(id).expect("query").expect("found");
    assert_eq!(loaded.label, "solo");
    assert_eq!(loaded.budgeted, 9.75);
    assert_eq!(loaded.id, Some(id));
}

#[test]
fn test_retrieve_by_id_rejects_wrong_type() {
    let graph = UndoGraph::open_in_memory().expect("graph");
    let mut item = BudgetItem::new("typed", 1.0);
    graph.save(&mut item).expect("save");
    let id = item.id.expect("id");
    let as_budget: Option<Budget> = graph.retrieve_by_id(id).expect("query");
    assert!(as_budget.is_none());
}

#[test]
fn test_retrieve_of_unknown_type_is_empty() {
    let graph = UndoGraph::open_in_memory().expect("graph");
    let budgets: Vec<Budget> = graph.retrieve().expect("retrieve");
    assert!(budgets.is_empty());
}

#[test]
fn test_related_resolves_edges_in_insertion_order() {
    let graph = UndoGraph::open_in_memory().expect("graph");
    let mut first = BudgetItem::new("one", 1.0);
    let mut second = BudgetItem::new("two", 2.0);
    graph.save(&mut first).expect("save");
    graph.save(&mut second).expect("save");

    let mut budget = Budget::new("2020-04-14 01:40:59 +0000", 3.6);
    graph.save(&mut budget).expect("save budget");
    budget.items = vec![first, second];
    graph.save(&mut budget).expect("save edges");

    let related: Vec<BudgetItem> = graph.related(budget.id, "items").expect("related");
    assert_eq!(related.len(), 2);
    assert_eq!(related[0].label, "one");
    assert_eq!(related[1].label, "two");
}

#[test]
fn test_related_on_unsaved_record_is_empty() {
    let graph = UndoGraph::open_in_memory().expect("graph");
    let related: Vec<BudgetItem> = graph.related(None, "items").expect("related");
    assert!(related.is_empty());
}

#[test]
fn test_related_item_requires_exactly_one() {
    let graph = UndoGraph::open_in_memory().expect("graph");
    let mut first = BudgetItem::new("one", 1.0);
    let mut second = BudgetItem::new("two", 2.0);
    graph.save(&mut first).expect("save");
    graph.save(&mut second).expect("save");

    let mut budget = Budget::new("2020-04-14 01:40:59 +0000", 3.6);
    graph.save(&mut budget).expect("save budget");

    let none: Option<BudgetItem> = graph.related_item(budget.id, "items").expect("zero");
    assert!(none.is_none());

    budget.items = vec![first.clone()];
    graph.save(&mut budget).expect("one edge");
    let one: Option<BudgetItem> = graph.related_item(budget.id, "items").expect("one");
    assert_eq!(one.expect("item").label, "one");

    budget.items = vec![first, second];
    graph.save(&mut budget).expect("two edges");
    let two: Option<BudgetItem> = graph.related_item(budget.id, "items").expect("two");
    assert!(two.is_none());
}

#[test]
fn test_delete_removes_vertex_and_edges() {
    let graph = UndoGraph::open_in_memory().expect("graph");
    let mut item = BudgetItem::new("doomed", 1.0);
    graph.save(&mut item).expect("save");

    let mut budget = Budget::new("2020-04-14 01:40:59 +0000", 3.6);
    budget.items = vec![item.clone()];
    graph.save(&mut budget).expect("save budget");

    graph.delete(&item).expect("delete");
    let items: Vec<BudgetItem> = graph.retrieve().expect("retrieve");
    assert!(items.is_empty());
    let related: Vec<BudgetItem> = graph.related(budget.id, "items").expect("related");
    assert!(related.is_empty(), "no dangling edges");
}

#[test]
fn test_delete_of_unsaved_record_is_noop() {
    let graph = UndoGraph::open_in_memory().expect("graph");
    let item = BudgetItem::new("ghost", 1.0);
    graph.delete(&item).expect("delete");
    assert_eq!(graph.transaction_count().expect("count"), 0);
}
