//! A small library schema with hand-written mappings, shared by the integration tests.

use chrono::NaiveDateTime;
use dbobject::{Context, Entity, FieldValue, Mapping, ResolvePolicy, ValueKind};
use serde::{Deserialize, Serialize};

use crate::MemoryDataLayer;

pub const DATABASE: &str = "library";

pub const DDL: &str = r"
CREATE TABLE author (
    id INT AUTO_INCREMENT PRIMARY KEY,
    name VARCHAR(255) NOT NULL,
    email VARCHAR(255) NULL
);

CREATE TABLE book (
    id INT AUTO_INCREMENT PRIMARY KEY,
    title VARCHAR(255) NOT NULL,
    author_id INT NULL,
    meta BLOB NULL,
    published TINYINT(1) NOT NULL DEFAULT 0,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE counter (
    id INT AUTO_INCREMENT PRIMARY KEY
);
";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Author {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
}

impl Entity for Author {
    const TABLE_NAME: &'static str = "author";

    fn map(mapping: &mut Mapping<Self>) {
        mapping
            .column("id", "id", |m| &m.id, |m| &mut m.id)
            .column("name", "name", |m| &m.name, |m| &mut m.name)
            .column("email", "email", |m| &m.email, |m| &mut m.email)
            .default_constructor()
            .constructor(&[ValueKind::Text], |args| {
                Ok(Self {
                    email: Option::<String>::from_value(args[0].clone())?,
                    ..Self::default()
                })
            });
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookMeta {
    pub pages: u32,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: Option<Author>,
    pub meta: Option<BookMeta>,
    pub published: bool,
    pub created_at: Option<NaiveDateTime>,
}

impl Entity for Book {
    const TABLE_NAME: &'static str = "book";

    fn map(mapping: &mut Mapping<Self>) {
        mapping
            .column("id", "id", |m| &m.id, |m| &mut m.id)
            .column("title", "title", |m| &m.title, |m| &mut m.title)
            .reference("author_id", "author", |m| &m.author, |m| &mut m.author)
            .serialized("meta", "meta", |m| &m.meta, |m| &mut m.meta)
            .column("published", "published", |m| &m.published, |m| {
                &mut m.published
            })
            .column("created_at", "created_at", |m| &m.created_at, |m| {
                &mut m.created_at
            })
            .default_constructor();
    }
}

/// A table with nothing but its generated key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Counter {
    pub id: i64,
}

impl Entity for Counter {
    const TABLE_NAME: &'static str = "counter";

    fn map(mapping: &mut Mapping<Self>) {
        mapping
            .column("id", "id", |m| &m.id, |m| &mut m.id)
            .default_constructor();
    }
}

/// A fresh database holding the library schema.
///
/// # Panics
///
/// If the schema cannot be parsed.
#[must_use]
#[allow(clippy::expect_used)]
pub fn database() -> MemoryDataLayer {
    MemoryDataLayer::from_ddl(DATABASE, DDL).expect("Failed to create library schema")
}

/// A database and a context with every library entity registered.
///
/// # Panics
///
/// If an entity fails to register.
#[allow(clippy::expect_used)]
pub async fn library(policy: ResolvePolicy) -> (Context, MemoryDataLayer) {
    crate::init_tracing();

    let mut db = database();
    let mut context = Context::new().with_policy(policy);

    context
        .register::<Author>(&mut db)
        .await
        .expect("Failed to register Author");
    context
        .register::<Book>(&mut db)
        .await
        .expect("Failed to register Book");
    context
        .register::<Counter>(&mut db)
        .await
        .expect("Failed to register Counter");

    db.clear_log();

    (context, db)
}
