use chrono::NaiveDateTime;
use dbobject::{
    Context, Entity, FieldValue, Mapping, Record, ResolvePolicy, Value, ValueKind,
};
use dbobject_tests::fixtures::{self, BookMeta};

#[derive(Entity, Debug, Default, Clone, PartialEq)]
#[dbobject(table = "author")]
struct Writer {
    id: i64,
    #[dbobject(column = "name")]
    pen_name: String,
    email: Option<String>,
    #[dbobject(skip)]
    visits: u32,
}

#[derive(Entity, Debug, Default)]
#[dbobject(table = "book", constructors = "titled")]
struct Novel {
    id: i64,
    title: String,
    #[dbobject(column = "author_id", references)]
    writer: Option<Writer>,
    #[dbobject(serializes)]
    meta: Option<BookMeta>,
    published: bool,
    created_at: Option<NaiveDateTime>,
}

fn titled(mapping: &mut Mapping<Novel>) {
    mapping
        .constructor(&[ValueKind::Text], |args| {
            Ok(Novel {
                title: String::from_value(args[0].clone())?,
                ..Novel::default()
            })
        })
        .default_constructor();
}

#[derive(Entity, Debug, Default)]
struct Counter {
    id: i64,
}

#[test]
fn test_derived_mapping() {
    assert_eq!(Writer::TABLE_NAME, "author");
    assert_eq!(Counter::TABLE_NAME, "counter");

    let writer = Mapping::<Writer>::of();
    let columns = writer
        .columns()
        .iter()
        .map(|e| (e.column_name, e.field_name))
        .collect::<Vec<_>>();
    assert_eq!(
        columns,
        vec![("id", "id"), ("name", "pen_name"), ("email", "email")]
    );
    assert_eq!(writer.constructors().len(), 1);

    let novel = Mapping::<Novel>::of();
    let kinds = novel
        .columns()
        .iter()
        .map(|e| (e.column_name, e.reference_type.is_some(), e.serialize_type.is_some()))
        .collect::<Vec<_>>();
    assert_eq!(
        kinds,
        vec![
            ("id", false, false),
            ("title", false, false),
            ("author_id", true, false),
            ("meta", false, true),
            ("published", false, false),
            ("created_at", false, false),
        ]
    );
    assert_eq!(
        novel
            .constructors()
            .iter()
            .map(|e| e.params().to_vec())
            .collect::<Vec<_>>(),
        vec![vec![ValueKind::Text], vec![]]
    );
}

#[tokio::test]
async fn test_derived_entities_round_trip_through_the_database() {
    dbobject_tests::init_tracing();

    let mut db = fixtures::database();
    let mut context = Context::new().with_policy(ResolvePolicy::Abort);

    context
        .register::<Writer>(&mut db)
        .await
        .expect("Failed to register Writer");
    context
        .register::<Novel>(&mut db)
        .await
        .expect("Failed to register Novel");
    context
        .register::<Counter>(&mut db)
        .await
        .expect("Failed to register Counter");

    let mut writer = Record::new(Writer {
        pen_name: "Le Guin".to_string(),
        visits: 7,
        ..Writer::default()
    });
    assert!(context.persist(&mut db, &mut writer).await);
    // Unmapped fields keep their in-memory value.
    assert_eq!(writer.visits, 7);

    let meta = BookMeta {
        pages: 160,
        tags: vec!["novella".to_string()],
    };

    let mut novel = Record::new(Novel {
        title: "The Word for World Is Forest".to_string(),
        writer: Some(writer.model().clone()),
        meta: Some(meta.clone()),
        published: true,
        ..Novel::default()
    });
    assert!(context.persist(&mut db, &mut novel).await);

    let read = context
        .by_id::<Novel>(&mut db, novel.id, &[Value::from("ignored")])
        .await
        .expect("Failed to read novel")
        .expect("Novel not found");

    assert_eq!(read.title, "The Word for World Is Forest");
    assert!(read.published);
    assert_eq!(read.meta.as_ref(), Some(&meta));
    assert_eq!(read.created_at, novel.created_at);

    let read_writer = read.writer.as_ref().expect("Writer not resolved");
    assert_eq!(read_writer.pen_name, "Le Guin");
    assert_eq!(read_writer.visits, 0);
}
