use std::sync::Arc;

use gdstore::construct::{Canon, Entity};
use gdstore::error::GdstoreError;
use gdstore::memory::MemoryTransport;
use gdstore::query::QuerySpec;
use gdstore::store::Store;
use gdstore::Value;
use pretty_assertions::assert_eq;

fn setup(first_id: i64) -> (Arc<MemoryTransport>, Store) {
    gdstore::init_tracing();
    let memory = Arc::new(MemoryTransport::starting_at(first_id));
    let store = Store::new(memory.clone());
    (memory, store)
}

fn person() -> Entity {
    Entity::new(Canon::new(None, "person"))
}

#[tokio::test]
async fn save_assigns_an_id_and_load_finds_it() {
    let (_, store) = setup(123);
    let barry = person().make([("name", Value::from("Barry")), ("age", Value::from(41))]);
    let saved = store.save(barry).await.expect("saved");
    assert_eq!(saved.id(), Some("123"));

    let loaded = store
        .load(&person(), QuerySpec::new().with("id", "123"))
        .await
        .expect("loaded")
        .expect("present");
    assert_eq!(loaded, saved);
    assert_eq!(loaded.get("name"), Some(Value::Text("Barry".into())));

    let by_field = store
        .load(&person(), QuerySpec::new().with("name", "Barry"))
        .await
        .expect("loaded");
    assert_eq!(by_field.and_then(|e| e.id().map(str::to_string)), Some("123".to_string()));
}

#[tokio::test]
async fn load_of_nothing_is_none() {
    let (_, store) = setup(1);
    let loaded = store.load(&person(), QuerySpec::new().with("id", "9")).await.expect("no error");
    assert_eq!(loaded, None);
}

#[tokio::test]
async fn saving_again_updates_the_same_record() {
    let (memory, store) = setup(1);
    let mut saved = store.save(person().make([("name", Value::from("Ann"))])).await.expect("saved");
    saved.set("name", "Anna");
    let updated = store.save(saved.clone()).await.expect("updated");
    assert_eq!(updated.id(), saved.id());
    assert_eq!(memory.len("person"), 1);
    let commits = memory.commits().expect("commits");
    assert_eq!(commits[1].mutation.update.len(), 1);
    let loaded = store.load(&person(), QuerySpec::new()).await.expect("loaded").expect("present");
    assert_eq!(loaded.get("name"), Some(Value::Text("Anna".into())));
}

#[tokio::test]
async fn explicit_id_is_used_and_consumed() {
    let (_, store) = setup(1);
    let mut entity = person().make([("name", Value::from("Cy"))]);
    entity.set_explicit_id("cy-1");
    let saved = store.save(entity).await.expect("saved");
    assert_eq!(saved.id(), Some("cy-1"));
    assert_eq!(saved.explicit_id(), None);

    let mut clash = person().make([("name", Value::from("Other"))]);
    clash.set_explicit_id("cy-1");
    match store.save(clash).await {
        Err(GdstoreError::Transport { status, .. }) => assert_eq!(status, Some(409)),
        other => panic!("expected a conflict, got {:?}", other),
    }
}

#[tokio::test]
async fn remove_all_deletes_in_one_batch() {
    let (memory, store) = setup(1);
    for name in ["a", "b", "c"] {
        store.save(person().make([("group", Value::from("x")), ("name", Value::from(name))])).await.expect("saved");
    }
    store.save(person().make([("group", Value::from("y"))])).await.expect("saved");

    let removed = store
        .remove(&person(), QuerySpec::new().with("group", "x").all())
        .await
        .expect("removed");
    assert_eq!(removed.len(), 3);
    assert_eq!(memory.len("person"), 1);
    let commits = memory.commits().expect("commits");
    let last = commits.last().expect("a commit");
    assert_eq!(last.mutation.delete, removed);
    assert_eq!(commits.iter().filter(|c| !c.mutation.delete.is_empty()).count(), 1);
}

#[tokio::test]
async fn remove_without_all_takes_one() {
    let (memory, store) = setup(1);
    for _ in 0..3 {
        store.save(person().make([("group", Value::from("x"))])).await.expect("saved");
    }
    let removed = store.remove(&person(), QuerySpec::new().with("group", "x")).await.expect("removed");
    assert_eq!(removed.len(), 1);
    assert_eq!(memory.len("person"), 2);

    let commits_before = memory.commits().expect("commits").len();
    let removed = store.remove(&person(), QuerySpec::new().with("group", "none")).await.expect("removed");
    assert!(removed.is_empty());
    assert_eq!(memory.commits().expect("commits").len(), commits_before);
}

#[tokio::test]
async fn list_sorts_pages_and_projects() {
    let (_, store) = setup(1);
    for (name, age) in [("d", 40), ("a", 10), ("c", 30), ("b", 20)] {
        store
            .save(person().make([("name", Value::from(name)), ("age", Value::from(age))]))
            .await
            .expect("saved");
    }
    let all = store.list(&person(), QuerySpec::new()).await.expect("listed");
    assert_eq!(all.len(), 4);

    let page = store
        .list(&person(), QuerySpec::new().sort("age", 1).skip(1).limit(2))
        .await
        .expect("listed");
    let names: Vec<Value> = page.iter().filter_map(|e| e.get("name")).collect();
    assert_eq!(names, vec![Value::from("b"), Value::from("c")]);

    let descending = store.list(&person(), QuerySpec::new().sort("age", -1)).await.expect("listed");
    assert_eq!(descending[0].get("age"), Some(Value::Number(40.0)));

    let projected = store
        .list(&person(), QuerySpec::new().with("age", 30).fields(["name"]))
        .await
        .expect("listed");
    assert_eq!(projected.len(), 1);
    assert_eq!(projected[0].field_names(), vec!["name"]);

    let none = store.list(&person(), QuerySpec::new().with("age", 99)).await.expect("listed");
    assert!(none.is_empty());
}

#[tokio::test]
async fn closed_store_refuses_work() {
    let (_, store) = setup(1);
    assert_eq!(store.name(), "google-data-store");
    assert_eq!(store.native().expect("open").name(), "memory");
    store.close().expect("closed");
    assert!(store.is_closed());
    assert!(matches!(store.save(person()).await, Err(GdstoreError::Closed)));
    assert!(matches!(store.list(&person(), QuerySpec::new()).await, Err(GdstoreError::Closed)));
    assert!(matches!(store.native(), Err(GdstoreError::Closed)));
    // closing twice is harmless
    store.close().expect("closed again");
}

#[tokio::test]
async fn duplicate_keys_in_one_insert_batch_conflict() {
    use gdstore::persist::build_save;
    use gdstore::Transport;

    let (memory, _) = setup(1);
    let mut first = person().make([("name", Value::from("first"))]);
    first.set_explicit_id("dup");
    let mut second = person().make([("name", Value::from("second"))]);
    second.set_explicit_id("dup");
    let transaction = memory.begin_transaction(Default::default()).await.expect("begun");
    let mut request = build_save(&first, "person", &transaction);
    request.mutation.insert.extend(build_save(&second, "person", &transaction).mutation.insert);
    match memory.commit(request).await {
        Err(GdstoreError::Transport { status, .. }) => assert_eq!(status, Some(409)),
        other => panic!("expected a conflict, got {:?}", other),
    }
    assert_eq!(memory.len("person"), 0);
    assert!(memory.commits().expect("commits").is_empty());
}
