use dbobject::{Context, Entity, Error, Mapping, Value, schema};
use dbobject_tests::fixtures::{self, Author, Book};

#[derive(Default)]
struct Ghost {
    id: i64,
}

impl Entity for Ghost {
    const TABLE_NAME: &'static str = "ghost";

    fn map(mapping: &mut Mapping<Self>) {
        mapping
            .column("id", "id", |m| &m.id, |m| &mut m.id)
            .default_constructor();
    }
}

#[derive(Default)]
struct Nicknamed {
    id: i64,
    nickname: String,
}

impl Entity for Nicknamed {
    const TABLE_NAME: &'static str = "author";

    fn map(mapping: &mut Mapping<Self>) {
        mapping
            .column("id", "id", |m| &m.id, |m| &mut m.id)
            .column("nickname", "nickname", |m| &m.nickname, |m| &mut m.nickname)
            .default_constructor();
    }
}

#[derive(Default)]
struct PackedName {
    id: i64,
    name: Option<Vec<String>>,
}

impl Entity for PackedName {
    const TABLE_NAME: &'static str = "author";

    fn map(mapping: &mut Mapping<Self>) {
        mapping
            .column("id", "id", |m| &m.id, |m| &mut m.id)
            .serialized("name", "name", |m| &m.name, |m| &mut m.name)
            .default_constructor();
    }
}

/// Maps `author` without its key column.
#[derive(Default)]
struct Keyless {
    name: String,
}

impl Entity for Keyless {
    const TABLE_NAME: &'static str = "author";

    fn map(mapping: &mut Mapping<Self>) {
        mapping
            .column("name", "name", |m| &m.name, |m| &mut m.name)
            .default_constructor();
    }
}

#[tokio::test]
async fn test_register_builds_query_templates() {
    dbobject_tests::init_tracing();

    let mut db = fixtures::database();
    let mut context = Context::new();

    let registry = context
        .register::<Book>(&mut db)
        .await
        .expect("Failed to register Book");

    assert_eq!(
        registry.select_all_sql(),
        "SELECT `id`, `title`, `author_id`, `meta`, `published`, `created_at` FROM `book`"
    );
    assert_eq!(
        registry.select_by_id_sql(),
        "SELECT `id`, `title`, `author_id`, `meta`, `published`, `created_at` FROM `book` WHERE `id` = ? LIMIT 1"
    );
    assert_eq!(registry.primary_key().descriptor.column_name, "id");
    assert!(context.is_registered::<Book>());
    assert!(!context.is_registered::<Author>());
}

#[tokio::test]
async fn test_register_reads_column_metadata() {
    let mut db = fixtures::database();
    let mut context = Context::new();

    let registry = context
        .register::<Book>(&mut db)
        .await
        .expect("Failed to register Book");

    let descriptor = |column: &str| {
        registry
            .descriptors()
            .find(|e| e.column_name == column)
            .cloned()
            .expect("Column not bound")
    };

    let author = descriptor("author_id");
    assert!(author.nullable);
    assert!(author.reference_type.is_some());
    assert!(author.is_resolved());

    let meta = descriptor("meta");
    assert_eq!(meta.column_datatype, "blob");
    assert!(meta.serialize_type.is_some());

    assert!(!descriptor("title").nullable);
    assert!(!descriptor("published").nullable);
    // The database fills in `NULL` timestamps itself.
    assert!(descriptor("created_at").nullable);
    assert!(descriptor("id").is_primary_key);
}

#[tokio::test]
async fn test_catalog_lookups_are_scoped_to_the_database() {
    let mut db = fixtures::database();
    let mut context = Context::new();

    context
        .register::<Author>(&mut db)
        .await
        .expect("Failed to register Author");

    let lookup = &db.statements()[0];
    assert!(lookup.sql().contains("`information_schema`.`COLUMNS`"));
    assert_eq!(
        lookup.binds(),
        &[Value::from(fixtures::DATABASE), Value::from("author")]
    );
    assert!(db.executed_sql().is_empty());

    let keys = schema::primary_key_columns(&mut db, "author")
        .await
        .expect("Failed to read primary key");
    assert_eq!(keys, vec!["id".to_string()]);
}

#[tokio::test]
async fn test_register_twice_fails() {
    let mut db = fixtures::database();
    let mut context = Context::new();

    context
        .register::<Author>(&mut db)
        .await
        .expect("Failed to register Author");

    let result = context.register::<Author>(&mut db).await;
    assert!(matches!(result, Err(Error::AlreadyRegistered(_))));
}

#[tokio::test]
async fn test_unknown_table_fails() {
    let mut db = fixtures::database();
    let mut context = Context::new();

    let result = context.register::<Ghost>(&mut db).await;
    assert!(matches!(result, Err(Error::Schema(_))));
    assert!(!context.is_registered::<Ghost>());
}

#[tokio::test]
async fn test_mapping_must_fit_the_table() {
    let mut db = fixtures::database();
    let mut context = Context::new();

    let unknown = context.register::<Nicknamed>(&mut db).await;
    assert!(matches!(unknown, Err(Error::Binding(message)) if message.contains("nickname")));

    let not_a_blob = context.register::<PackedName>(&mut db).await;
    assert!(matches!(not_a_blob, Err(Error::Binding(message)) if message.contains("blob")));

    let keyless = context.register::<Keyless>(&mut db).await;
    assert!(matches!(keyless, Err(Error::Binding(message)) if message.contains("primary key")));
}

#[tokio::test]
async fn test_reads_require_registration() {
    let mut db = fixtures::database();
    let context = Context::new();

    let by_id = context.by_id::<Author>(&mut db, 1, &[]).await;
    assert!(matches!(by_id, Err(Error::Unregistered(_))));

    let all = context.all::<Author>(&mut db, &[]).await;
    assert!(all.items.is_empty());
    assert!(matches!(all.error, Some(Error::Unregistered(_))));
}
