// Member/Team fixtures shared by the integration tests.
#![allow(dead_code)]

use quarry::entity::{AssociationDef, ColumnDef, Entity, EntityRow, EntitySchema, Lazy};
use quarry::entity_path;
use quarry::execution::QueryFactory;
use quarry::projection::ProjectionError;
use quarry::sql::Dialect;
use quarry::store::{MemoryStore, SqliteSession};
use quarry::value::{Value, ValueType};

// =============================================================================
// Team
// =============================================================================

static TEAM_COLUMNS: [ColumnDef; 2] = [
    ColumnDef::new("id", ValueType::Int),
    ColumnDef::new("name", ValueType::Text),
];

static TEAM_ASSOCIATIONS: [AssociationDef; 1] = [AssociationDef::one_to_many(
    "members", "member", "id", "team_id",
)];

pub static TEAM: EntitySchema = EntitySchema {
    table: "team",
    key: "id",
    columns: &TEAM_COLUMNS,
    associations: &TEAM_ASSOCIATIONS,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Team {
    pub id: i64,
    pub name: String,
}

impl Team {
    pub fn new(id: i64, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
        }
    }
}

impl Entity for Team {
    fn schema() -> &'static EntitySchema {
        &TEAM
    }

    fn from_row(row: &EntityRow<'_>) -> Result<Self, ProjectionError> {
        Ok(Team {
            id: row.get("id")?,
            name: row.get("name")?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![self.id.into(), self.name.clone().into()]
    }
}

entity_path! {
    pub struct QTeam for Team {
        id: Int = "id",
        name: Text = "name",
    }
}

// =============================================================================
// Member
// =============================================================================

static MEMBER_COLUMNS: [ColumnDef; 4] = [
    ColumnDef::new("id", ValueType::Int),
    ColumnDef::new("username", ValueType::Text).nullable(),
    ColumnDef::new("age", ValueType::Int),
    ColumnDef::new("team_id", ValueType::Int).nullable(),
];

static MEMBER_ASSOCIATIONS: [AssociationDef; 1] =
    [AssociationDef::many_to_one("team", "team", "team_id", "id")];

pub static MEMBER: EntitySchema = EntitySchema {
    table: "member",
    key: "id",
    columns: &MEMBER_COLUMNS,
    associations: &MEMBER_ASSOCIATIONS,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub id: i64,
    pub username: Option<String>,
    pub age: i64,
    pub team_id: Option<i64>,
    pub team: Lazy<Team>,
}

impl Member {
    pub fn new(id: i64, username: Option<&str>, age: i64, team_id: Option<i64>) -> Self {
        Self {
            id,
            username: username.map(str::to_string),
            age,
            team_id,
            team: Lazy::NotLoaded,
        }
    }

    pub fn name(&self) -> &str {
        self.username.as_deref().unwrap_or("<null>")
    }
}

impl Entity for Member {
    fn schema() -> &'static EntitySchema {
        &MEMBER
    }

    fn from_row(row: &EntityRow<'_>) -> Result<Self, ProjectionError> {
        Ok(Member {
            id: row.get("id")?,
            username: row.get("username")?,
            age: row.get("age")?,
            team_id: row.get("team_id")?,
            team: row.association("team")?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            self.id.into(),
            self.username.clone().into(),
            self.age.into(),
            self.team_id.into(),
        ]
    }
}

entity_path! {
    pub struct QMember for Member {
        id: Int = "id",
        username: Text = "username",
        age: Int = "age",
        team_id: Int = "team_id",
    }
}

// =============================================================================
// Seed data
// =============================================================================

/// teamA holds member1 and member2, teamB holds member3 and member4.
pub fn teams() -> Vec<Team> {
    vec![Team::new(1, "teamA"), Team::new(2, "teamB")]
}

pub fn members() -> Vec<Member> {
    vec![
        Member::new(1, Some("member1"), 10, Some(1)),
        Member::new(2, Some("member2"), 20, Some(1)),
        Member::new(3, Some("member3"), 30, Some(2)),
        Member::new(4, Some("member4"), 40, Some(2)),
    ]
}

pub fn seeded_store() -> MemoryStore {
    let mut store = MemoryStore::new();
    store.register::<Team>().register::<Member>();
    for team in teams() {
        store.persist(&team).expect("seed team");
    }
    for member in members() {
        store.persist(&member).expect("seed member");
    }
    store
}

pub fn memory_factory() -> QueryFactory<MemoryStore> {
    QueryFactory::new(seeded_store())
}

pub fn seeded_sqlite() -> SqliteSession {
    let session = SqliteSession::open_in_memory().expect("open sqlite");
    session.create_table::<Team>().expect("create team");
    session.create_table::<Member>().expect("create member");
    for team in teams() {
        session.insert(&team).expect("seed team");
    }
    for member in members() {
        session.insert(&member).expect("seed member");
    }
    session
}

pub fn sqlite_factory() -> QueryFactory<SqliteSession> {
    QueryFactory::new(seeded_sqlite())
}

pub fn usernames(members: &[Member]) -> Vec<&str> {
    members.iter().map(Member::name).collect()
}

/// Parse `sql` with sqlparser for `dialect`, panicking with the SQL on failure.
pub fn assert_valid_sql(sql: &str, dialect: Dialect) {
    use sqlparser::dialect::{MySqlDialect, PostgreSqlDialect, SQLiteDialect};
    use sqlparser::parser::Parser;

    let parser_dialect: Box<dyn sqlparser::dialect::Dialect> = match dialect {
        Dialect::Postgres => Box::new(PostgreSqlDialect {}),
        Dialect::Sqlite => Box::new(SQLiteDialect {}),
        Dialect::MySql => Box::new(MySqlDialect {}),
    };
    if let Err(e) = Parser::parse_sql(&*parser_dialect, sql) {
        panic!("invalid SQL for {:?}: {}\n{}", dialect, e, sql);
    }
}
