use dbobject::{Criteria, CriteriaNode, EntityState, Error, ResolvePolicy, Value, data_layer::Row};
use dbobject_tests::{
    MemoryDataLayer,
    fixtures::{self, Author, Book, BookMeta},
};

fn author(db: &mut MemoryDataLayer, name: &str, email: Option<&str>) -> Value {
    db.insert_row("author", Row::new().with("name", name).with("email", email))
        .expect("Failed to insert author")
        .expect("No key generated")
}

fn book(db: &mut MemoryDataLayer, title: &str, author_id: impl Into<Value>, meta: Value) -> Value {
    db.insert_row(
        "book",
        Row::new()
            .with("title", title)
            .with("author_id", author_id)
            .with("meta", meta),
    )
    .expect("Failed to insert book")
    .expect("No key generated")
}

fn encoded(meta: &BookMeta) -> Value {
    Value::Bytes(rmp_serde::to_vec_named(meta).expect("Failed to encode meta"))
}

#[tokio::test]
async fn test_by_id() {
    let (context, mut db) = fixtures::library(ResolvePolicy::Degrade).await;
    let id = author(&mut db, "Ursula", Some("ursula@example.com"));

    let record = context
        .by_id::<Author>(&mut db, id, &[])
        .await
        .expect("Failed to read author")
        .expect("Author not found");

    assert_eq!(record.state(), EntityState::Persisted);
    assert_eq!(
        record.model(),
        &Author {
            id: 1,
            name: "Ursula".to_string(),
            email: Some("ursula@example.com".to_string()),
        }
    );
    assert_eq!(
        db.executed_sql(),
        vec!["SELECT `id`, `name`, `email` FROM `author` WHERE `id` = ? LIMIT 1"]
    );

    let missing = context
        .by_id::<Author>(&mut db, 42, &[])
        .await
        .expect("Failed to read author");
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_all() {
    let (context, mut db) = fixtures::library(ResolvePolicy::Degrade).await;

    for name in ["Ursula", "Terry", "Iain"] {
        author(&mut db, name, None);
    }

    let authors = context.all::<Author>(&mut db, &[]).await;
    assert!(authors.is_complete());

    let names = authors
        .into_result()
        .expect("Failed to read authors")
        .into_iter()
        .map(|e| e.into_inner().name)
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["Ursula", "Terry", "Iain"]);

    let counters = context.all::<fixtures::Counter>(&mut db, &[]).await;
    assert!(counters.is_complete());
    assert!(counters.items.is_empty());
}

#[tokio::test]
async fn test_selection_compiles_criteria() {
    let (context, mut db) = fixtures::library(ResolvePolicy::Degrade).await;

    author(&mut db, "Ursula", Some("ursula@example.com"));
    author(&mut db, "Terry", None);
    author(&mut db, "Iain", None);
    author(&mut db, "Terry", Some("terry@example.com"));

    let criteria = Criteria::new()
        .add("name", "Terry")
        .or(Criteria::new().add("email", "@null").add("id", 3));

    let selected = context
        .selection::<Author>(&mut db, &criteria, &[])
        .await
        .into_result()
        .expect("Failed to select authors");

    // The nested group is bracketed, so Ursula and the second Terry are excluded.
    assert_eq!(
        selected.iter().map(|e| e.id).collect::<Vec<_>>(),
        vec![2]
    );
    assert_eq!(
        db.executed_sql(),
        vec![
            "SELECT `id`, `name`, `email` FROM `author` WHERE `name` = ? AND ( `email` IS NULL OR `id` = ? )"
        ]
    );
}

#[tokio::test]
async fn test_selection_limit() {
    let (context, mut db) = fixtures::library(ResolvePolicy::Degrade).await;

    for name in ["Ursula", "Terry", "Iain"] {
        author(&mut db, name, Some("someone@example.com"));
    }

    let criteria = Criteria::new().add("email", "@not_null").limit(2);
    let selected = context.selection::<Author>(&mut db, &criteria, &[]).await;

    assert!(selected.is_complete());
    assert_eq!(selected.items.len(), 2);
    assert_eq!(
        db.executed_sql(),
        vec!["SELECT `id`, `name`, `email` FROM `author` WHERE `email` IS NOT NULL LIMIT 2"]
    );

    let twice = Criteria::new().limit(1).limit(2);
    let rejected = context.selection::<Author>(&mut db, &twice, &[]).await;
    assert!(matches!(rejected.error, Some(Error::DuplicateLimit)));

    let unknown = Criteria::new().add("@order", "name");
    let rejected = context.selection::<Author>(&mut db, &unknown, &[]).await;
    assert!(matches!(rejected.error, Some(Error::UnknownCriteriaKeyword(_))));
}

#[tokio::test]
async fn test_select_tree() {
    let (context, mut db) = fixtures::library(ResolvePolicy::Degrade).await;

    author(&mut db, "Ursula", None);
    author(&mut db, "Terry", None);

    let tree = CriteriaNode::equals("name", "Ursula");
    let selected = context
        .select::<Author>(&mut db, &tree, &[])
        .await
        .into_result()
        .expect("Failed to select authors");

    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].name, "Ursula");
}

#[tokio::test]
async fn test_extra_args_pick_the_constructor() {
    let (context, mut db) = fixtures::library(ResolvePolicy::Degrade).await;
    let id = author(&mut db, "Terry", None);

    // The row overwrites every mapped field, whatever the constructor filled in.
    let record = context
        .by_id::<Author>(&mut db, id.clone(), &[Value::from("placeholder@example.com")])
        .await
        .expect("Failed to read author")
        .expect("Author not found");
    assert_eq!(record.email, None);

    let result = context.by_id::<Author>(&mut db, id, &[Value::Integer(1)]).await;
    assert!(
        matches!(result, Err(Error::NoMatchingConstructor(message)) if message == "dbobject_tests::fixtures::Author(INTEGER)")
    );
}

#[tokio::test]
async fn test_references_are_resolved() {
    let (context, mut db) = fixtures::library(ResolvePolicy::Degrade).await;

    let ursula = author(&mut db, "Ursula", None);
    book(&mut db, "The Dispossessed", ursula, Value::Null);
    book(&mut db, "Anonymous", Value::Null, Value::Null);

    let books = context
        .all::<Book>(&mut db, &[])
        .await
        .into_result()
        .expect("Failed to read books");

    assert_eq!(
        books[0].author.as_ref().map(|e| e.name.as_str()),
        Some("Ursula")
    );
    assert!(books[0].created_at.is_some());
    assert!(!books[0].published);
    assert_eq!(books[1].author, None);
}

#[tokio::test]
async fn test_dangling_reference_degrades() {
    let (context, mut db) = fixtures::library(ResolvePolicy::Degrade).await;
    let id = book(&mut db, "Orphan", 99, Value::Null);

    let record = context
        .by_id::<Book>(&mut db, id, &[])
        .await
        .expect("Failed to read book")
        .expect("Book not found");

    assert_eq!(record.title, "Orphan");
    assert_eq!(record.author, None);
}

#[tokio::test]
async fn test_dangling_reference_aborts() {
    let (context, mut db) = fixtures::library(ResolvePolicy::Abort).await;
    let id = book(&mut db, "Orphan", 99, Value::Null);

    let result = context.by_id::<Book>(&mut db, id, &[]).await;
    assert!(matches!(
        result,
        Err(Error::MissingRow { table: "author", .. })
    ));
}

#[tokio::test]
async fn test_serialized_fields() {
    let meta = BookMeta {
        pages: 387,
        tags: vec!["anarchism".to_string(), "physics".to_string()],
    };

    let (context, mut db) = fixtures::library(ResolvePolicy::Degrade).await;
    let good = book(&mut db, "The Dispossessed", Value::Null, encoded(&meta));
    let bad = book(&mut db, "Corrupt", Value::Null, Value::Bytes(vec![0xc1]));

    let record = context
        .by_id::<Book>(&mut db, good, &[])
        .await
        .expect("Failed to read book")
        .expect("Book not found");
    assert_eq!(record.meta.as_ref(), Some(&meta));

    let record = context
        .by_id::<Book>(&mut db, bad, &[])
        .await
        .expect("Failed to read book")
        .expect("Book not found");
    assert_eq!(record.meta, None);

    let (context, mut db) = fixtures::library(ResolvePolicy::Abort).await;
    let bad = book(&mut db, "Corrupt", Value::Null, Value::Bytes(vec![0xc1]));

    let result = context.by_id::<Book>(&mut db, bad, &[]).await;
    assert!(matches!(result, Err(Error::Serialization(_))));
}

#[tokio::test]
async fn test_partial_results() {
    let (context, mut db) = fixtures::library(ResolvePolicy::Abort).await;

    let ursula = author(&mut db, "Ursula", None);
    book(&mut db, "The Dispossessed", ursula.clone(), Value::Null);
    book(&mut db, "Orphan", 99, Value::Null);
    book(&mut db, "The Lathe of Heaven", ursula, Value::Null);

    let books = context.all::<Book>(&mut db, &[]).await;

    assert!(!books.is_complete());
    assert_eq!(
        books.items.iter().map(|e| e.title.as_str()).collect::<Vec<_>>(),
        vec!["The Dispossessed"]
    );
    assert!(matches!(books.error, Some(Error::MissingRow { .. })));
}

#[tokio::test]
async fn test_failed_query_returns_no_items() {
    let (context, mut db) = fixtures::library(ResolvePolicy::Degrade).await;
    author(&mut db, "Ursula", None);

    db.fail_next_matching("FROM `author`");
    let authors = context.all::<Author>(&mut db, &[]).await;

    assert!(authors.items.is_empty());
    assert!(matches!(authors.error, Some(Error::QueryExecution(_))));

    let authors = context.all::<Author>(&mut db, &[]).await;
    assert!(authors.is_complete());
    assert_eq!(authors.items.len(), 1);
}
