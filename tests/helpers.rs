mod common;

use common::{memory_db, row_count};
use rowkit::db::{Column, SqlType, TableShape};
use rowkit::{Entity, Profile, RowkitError, User, Value, WhereMode};
use sqlx::sqlite::SqliteRow;
use std::collections::HashSet;

#[tokio::test]
async fn insert_writes_back_assigned_key() {
    let db = memory_db(WhereMode::Lenient).await;
    let mut user = User::new("Alice", "alice@example.com", 30);
    assert_eq!(user.id, 0);

    db.insert(&mut user).await.expect("insert");
    assert!(user.id > 0);

    let users: Vec<User> = db.get_all("").await.expect("get_all");
    assert_eq!(users, vec![user]);
}

#[tokio::test]
async fn sequential_inserts_get_distinct_keys() {
    let db = memory_db(WhereMode::Lenient).await;
    let mut ids = HashSet::new();
    for i in 0..10 {
        let mut user = User::new(format!("user{i}"), format!("user{i}@example.com"), 20 + i);
        db.insert(&mut user).await.expect("insert");
        assert!(ids.insert(user.id), "key {} handed out twice", user.id);
    }
    assert_eq!(row_count(&db, "users").await, 10);
}

#[tokio::test]
async fn keys_are_not_reused_after_removal() {
    let db = memory_db(WhereMode::Lenient).await;
    let mut first = User::new("First", "first@example.com", 1);
    db.insert(&mut first).await.expect("insert");

    sqlx::query("DELETE FROM users")
        .execute(db.pool())
        .await
        .expect("delete");

    let mut second = User::new("Second", "second@example.com", 2);
    db.insert(&mut second).await.expect("insert");
    assert!(second.id > first.id);
}

#[tokio::test]
async fn get_all_loads_has_one_relation() {
    let db = memory_db(WhereMode::Lenient).await;
    let mut user = User::new("Alice", "alice@example.com", 30);
    db.insert(&mut user).await.expect("insert user");
    let mut profile = Profile::new("ali", "likes tea", user.id);
    db.insert(&mut profile).await.expect("insert profile");

    let with: Vec<User> = db.get_all("Profile").await.expect("with relation");
    assert_eq!(with.len(), 1);
    assert_eq!(with[0].profile.as_ref(), Some(&profile));

    let without: Vec<User> = db.get_all("").await.expect("without relation");
    assert_eq!(without.len(), 1);
    assert_eq!(without[0].id, user.id);
    assert!(without[0].profile.is_none());
}

#[tokio::test]
async fn get_all_leaves_relation_empty_without_match() {
    let db = memory_db(WhereMode::Lenient).await;
    db.insert(&mut User::new("Loner", "loner@example.com", 50))
        .await
        .expect("insert");

    let users: Vec<User> = db.get_all("Profile").await.expect("get_all");
    assert_eq!(users.len(), 1);
    assert!(users[0].profile.is_none());
}

#[tokio::test]
async fn get_all_rejects_unknown_relation() {
    let db = memory_db(WhereMode::Lenient).await;
    let err = db
        .get_all::<User>("NoSuchRelation")
        .await
        .expect_err("unknown relation must fail");
    assert!(matches!(
        err,
        RowkitError::UnknownRelation { ref entity, ref relation }
            if entity == "User" && relation == "NoSuchRelation"
    ));

    // Relation names are matched exactly.
    assert!(db.get_all::<User>("profile").await.is_err());
    assert!(db.get_all::<Profile>("User").await.is_err());
}

// person_id carries no UNIQUE constraint; the join yields one owner row per profile.
#[tokio::test]
async fn several_profiles_may_reference_one_user() {
    let db = memory_db(WhereMode::Lenient).await;
    let mut user = User::new("Multi", "multi@example.com", 33);
    db.insert(&mut user).await.expect("insert user");
    for name in ["first", "second"] {
        db.insert(&mut Profile::new(name, "", user.id))
            .await
            .expect("insert profile");
    }

    let profiles: Vec<Profile> = db.get_all("").await.expect("profiles");
    assert_eq!(profiles.len(), 2);
    assert!(profiles.iter().all(|p| p.person_id == user.id));

    let joined: Vec<User> = db.get_all("Profile").await.expect("joined");
    assert_eq!(joined.len(), 2);
    let names: HashSet<String> = joined
        .into_iter()
        .filter_map(|u| u.profile.map(|p| p.display_name))
        .collect();
    assert_eq!(names, HashSet::from(["first".to_string(), "second".to_string()]));

    let users: Vec<User> = db.get_all("").await.expect("users");
    assert_eq!(users.len(), 1);
}

#[tokio::test]
async fn get_where_returns_matching_row() {
    let db = memory_db(WhereMode::Lenient).await;
    let mut alice = User::new("Alice", "alice@example.com", 30);
    db.insert(&mut alice).await.expect("insert");
    db.insert(&mut User::new("Bob", "bob@example.com", 40))
        .await
        .expect("insert");

    let found: User = db
        .get_where("email = ?", &["alice@example.com".into()])
        .await
        .expect("get_where");
    assert_eq!(found, alice);

    let older: User = db
        .get_where("age > ? AND name <> ?", &[Value::Integer(35), "Alice".into()])
        .await
        .expect("get_where");
    assert_eq!(older.name, "Bob");
}

#[tokio::test]
async fn lenient_get_where_returns_zero_value_on_miss() {
    let db = memory_db(WhereMode::Lenient).await;
    let user: User = db
        .get_where("email = ?", &["nobody@example.com".into()])
        .await
        .expect("lenient miss");
    assert_eq!(user, User::default());
    assert_eq!(user.id, 0);
    assert!(user.name.is_empty() && user.email.is_empty());
    assert_eq!(user.age, 0);
}

#[tokio::test]
async fn lenient_get_where_swallows_query_errors() {
    let db = memory_db(WhereMode::Lenient).await;
    let user: User = db
        .get_where("no_such_column = ?", &[Value::Integer(1)])
        .await
        .expect("lenient error");
    assert_eq!(user, User::default());
}

#[tokio::test]
async fn strict_get_where_surfaces_miss_and_errors() {
    let db = memory_db(WhereMode::Strict).await;
    let miss = db
        .get_where::<User>("email = ?", &["nobody@example.com".into()])
        .await
        .expect_err("strict miss");
    assert!(matches!(miss, RowkitError::NotFound { .. }));

    let broken = db
        .get_where::<User>("no_such_column = ?", &[Value::Integer(1)])
        .await
        .expect_err("strict error");
    assert!(matches!(broken, RowkitError::Query { .. }));
}

#[tokio::test]
async fn find_where_distinguishes_not_found() {
    let db = memory_db(WhereMode::Lenient).await;
    let none = db
        .find_where::<User>("email = ?", &["nobody@example.com".into()])
        .await
        .expect("find_where");
    assert!(none.is_none());

    assert!(
        db.find_where::<User>("no_such_column = 1", &[])
            .await
            .is_err()
    );
}

#[tokio::test]
async fn placeholder_mismatch_fails_in_every_mode() {
    for mode in [WhereMode::Lenient, WhereMode::Strict] {
        let db = memory_db(mode).await;
        let err = db
            .get_where::<User>("email = ? AND age = ?", &["x@example.com".into()])
            .await
            .expect_err("arity mismatch");
        assert!(matches!(
            err,
            RowkitError::PlaceholderMismatch {
                placeholders: 2,
                values: 1,
                ..
            }
        ));
    }
}

#[tokio::test]
async fn numbered_placeholders_bind_one_value_twice() {
    let db = memory_db(WhereMode::Strict).await;
    let mut user = User::new("same", "same", 9);
    db.insert(&mut user).await.expect("insert");

    let found: User = db
        .get_where("email = ?1 OR name = ?1", &["same".into()])
        .await
        .expect("one value fills both slots");
    assert_eq!(found.id, user.id);

    let found: User = db
        .get_where("age = ?2 AND email = ?1", &["same".into(), Value::Integer(9)])
        .await
        .expect("slots bind by number");
    assert_eq!(found.id, user.id);

    let err = db
        .get_where::<User>("email = ?2", &["same".into()])
        .await
        .expect_err("slot 2 has no value");
    assert!(matches!(err, RowkitError::PlaceholderMismatch { .. }), "{err}");
}

/// Declares three columns but hands back only two values.
#[derive(Debug, Default)]
struct Lopsided {
    id: i64,
}

static LOPSIDED_SHAPE: TableShape = TableShape {
    name: "Lopsided",
    table: "lopsided",
    alias: "lopsided",
    columns: &[
        Column::auto_pk("id"),
        Column::new("left_side", SqlType::Text),
        Column::new("right_side", SqlType::Text),
    ],
    relations: &[],
};

impl Entity for Lopsided {
    fn shape() -> &'static TableShape {
        &LOPSIDED_SHAPE
    }

    fn values(&self) -> Vec<Value> {
        vec![self.id.into(), "left".into()]
    }

    fn set_primary_key(&mut self, id: i64) {
        self.id = id;
    }

    fn from_row(_row: &SqliteRow, _prefix: &str) -> Result<Self, sqlx::Error> {
        Ok(Self::default())
    }
}

#[tokio::test]
async fn insert_rejects_value_count_mismatch() {
    let db = memory_db(WhereMode::Lenient).await;
    db.ensure_table::<Lopsided>().await.expect("ensure_table");

    let mut row = Lopsided::default();
    let err = db.insert(&mut row).await.expect_err("short value list");
    assert!(
        matches!(&err, RowkitError::Schema { entity, .. } if entity == "Lopsided"),
        "{err}"
    );
    assert_eq!(row.id, 0);
    assert_eq!(row_count(&db, "lopsided").await, 0);
}
