use crate::db::entity::{
    Column, Entity, Relation, RelationKind, SqlType, TableShape, Value, column_or_default,
};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub age: i64,
    /// Loaded only when the `Profile` relation is requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: i64,
    pub display_name: String,
    pub bio: String,
    /// `users.id` of the owner. Not unique: several profiles may point at one user.
    pub person_id: i64,
}

static USER_SHAPE: TableShape = TableShape {
    name: "User",
    table: "users",
    alias: "user",
    columns: &[
        Column::auto_pk("id"),
        Column::new("name", SqlType::Text),
        Column::new("email", SqlType::Text),
        Column::new("age", SqlType::Integer),
    ],
    relations: &[Relation {
        name: "Profile",
        alias: "profile",
        kind: RelationKind::HasOne,
        target: &PROFILE_SHAPE,
        base_column: "id",
        join_column: "person_id",
    }],
};

static PROFILE_SHAPE: TableShape = TableShape {
    name: "Profile",
    table: "profiles",
    alias: "profile",
    columns: &[
        Column::auto_pk("id"),
        Column::new("display_name", SqlType::Text),
        Column::new("bio", SqlType::Text),
        Column::new("person_id", SqlType::Integer),
    ],
    relations: &[],
};

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>, age: i64) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            age,
            ..Default::default()
        }
    }
}

impl Profile {
    pub fn new(display_name: impl Into<String>, bio: impl Into<String>, person_id: i64) -> Self {
        Self {
            display_name: display_name.into(),
            bio: bio.into(),
            person_id,
            ..Default::default()
        }
    }
}

impl Entity for User {
    fn shape() -> &'static TableShape {
        &USER_SHAPE
    }

    fn values(&self) -> Vec<Value> {
        vec![
            self.id.into(),
            self.name.as_str().into(),
            self.email.as_str().into(),
            self.age.into(),
        ]
    }

    fn set_primary_key(&mut self, id: i64) {
        self.id = id;
    }

    fn from_row(row: &SqliteRow, prefix: &str) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: column_or_default(row, prefix, "id")?,
            name: column_or_default(row, prefix, "name")?,
            email: column_or_default(row, prefix, "email")?,
            age: column_or_default(row, prefix, "age")?,
            profile: None,
        })
    }

    fn attach(&mut self, name: &str, row: &SqliteRow, prefix: &str) -> Result<(), sqlx::Error> {
        match name {
            "Profile" => {
                self.profile = Some(Profile::from_row(row, prefix)?);
                Ok(())
            }
            other => Err(sqlx::Error::Protocol(format!(
                "User cannot attach relation {other}"
            ))),
        }
    }
}

impl Entity for Profile {
    fn shape() -> &'static TableShape {
        &PROFILE_SHAPE
    }

    fn values(&self) -> Vec<Value> {
        vec![
            self.id.into(),
            self.display_name.as_str().into(),
            self.bio.as_str().into(),
            self.person_id.into(),
        ]
    }

    fn set_primary_key(&mut self, id: i64) {
        self.id = id;
    }

    fn from_row(row: &SqliteRow, prefix: &str) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: column_or_default(row, prefix, "id")?,
            display_name: column_or_default(row, prefix, "display_name")?,
            bio: column_or_default(row, prefix, "bio")?,
            person_id: column_or_default(row, prefix, "person_id")?,
        })
    }
}
