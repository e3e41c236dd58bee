#[path = "../common/mod.rs"]
mod common;

use common::*;
use quarry::entity::ColumnDef;
use quarry::prelude::*;

#[derive(Debug, Default, Clone, PartialEq)]
struct MemberDto {
    username: String,
    age: i64,
}

static MEMBER_DTO_FIELDS: [ColumnDef; 2] = [
    ColumnDef::new("username", ValueType::Text),
    ColumnDef::new("age", ValueType::Int),
];

impl FieldTarget for MemberDto {
    fn fields() -> &'static [ColumnDef] {
        &MEMBER_DTO_FIELDS
    }

    fn assign(&mut self, field: &str, value: Value) -> Result<(), ProjectionError> {
        match field {
            "username" => self.username = String::from_value(value)?,
            "age" => self.age = i64::from_value(value)?,
            other => return Err(ProjectionError::UnknownField(other.to_string())),
        }
        Ok(())
    }
}

impl ConstructorTarget for MemberDto {
    fn parameters() -> &'static [ColumnDef] {
        &MEMBER_DTO_FIELDS
    }

    fn construct(args: Vec<Value>) -> Result<Self, ProjectionError> {
        let [username, age]: [Value; 2] =
            args.try_into()
                .map_err(|args: Vec<Value>| ProjectionError::SlotCount {
                    expected: 2,
                    found: args.len(),
                })?;
        Ok(MemberDto {
            username: String::from_value(username)?,
            age: i64::from_value(age)?,
        })
    }
}

impl QueryProjection<(String, i64)> for MemberDto {
    fn project((username, age): (String, i64)) -> Self {
        MemberDto { username, age }
    }
}

/// A DTO whose name is optional, fed by the generated strategy.
#[derive(Debug, PartialEq)]
struct Badge {
    label: Option<String>,
    age: i64,
}

impl QueryProjection<(Option<String>, i64)> for Badge {
    fn project((label, age): (Option<String>, i64)) -> Self {
        Badge { label, age }
    }
}

fn expected_dtos() -> Vec<MemberDto> {
    members()
        .into_iter()
        .map(|m| MemberDto {
            username: m.username.unwrap_or_default(),
            age: m.age,
        })
        .collect()
}

#[test]
fn test_three_strategies_agree() {
    let m = QMember::new("m");
    let mut factory = memory_factory();

    let by_field = select(fields::<MemberDto>([m.username.bind(), m.age.bind()]).unwrap())
        .from(&m)
        .order_by(m.id.asc())
        .build()
        .unwrap();
    let by_constructor =
        select(constructor::<MemberDto>([m.username.bind(), m.age.bind()]).unwrap())
            .from(&m)
            .order_by(m.id.asc())
            .build()
            .unwrap();
    let by_generated = select(generated::<MemberDto, _>((m.username.clone(), m.age.clone())))
        .from(&m)
        .order_by(m.id.asc())
        .build()
        .unwrap();

    // Same select list regardless of strategy
    assert_eq!(by_field.to_sql(Dialect::Postgres), by_generated.to_sql(Dialect::Postgres));

    let a = factory.fetch_list(by_field).unwrap();
    let b = factory.fetch_list(by_constructor).unwrap();
    let c = factory.fetch_list(by_generated).unwrap();

    assert_eq!(a, expected_dtos());
    assert_eq!(a, b);
    assert_eq!(b, c);
}

#[test]
fn test_field_binding_by_alias() {
    let m = QMember::new("m");
    let t = QTeam::new("t");
    let query = select(
        fields::<MemberDto>([t.name.alias("username"), m.age.sum().alias("age")]).unwrap(),
    )
    .from(&m)
    .join(JoinSpec::inner(&m.association("team"), &t))
    .group_by(&t.name)
    .order_by(t.name.asc())
    .build()
    .unwrap();

    assert_eq!(
        memory_factory().fetch_list(query).unwrap(),
        vec![
            MemberDto {
                username: "teamA".into(),
                age: 30,
            },
            MemberDto {
                username: "teamB".into(),
                age: 70,
            },
        ]
    );
}

#[test]
fn test_dto_mismatches_fail_at_build() {
    let m = QMember::new("m");

    // No field named after the column
    assert!(matches!(
        fields::<MemberDto>([m.team_id.bind()]),
        Err(BuildError::ProjectionMismatch(_))
    ));
    // Right name, wrong type
    assert!(matches!(
        fields::<MemberDto>([m.id.alias("username")]),
        Err(BuildError::ProjectionMismatch(_))
    ));
    // Wrong arity
    assert!(matches!(
        constructor::<MemberDto>([m.username.bind()]),
        Err(BuildError::ProjectionMismatch(_))
    ));
    // Wrong order
    assert!(matches!(
        constructor::<MemberDto>([m.age.bind(), m.username.bind()]),
        Err(BuildError::ProjectionMismatch(_))
    ));
}

#[test]
fn test_null_into_non_nullable_field_fails_at_shape() {
    let m = QMember::new("m");
    let mut factory = memory_factory();
    factory
        .session_mut()
        .persist(&Member::new(5, None, 50, None))
        .unwrap();

    let query = select(generated::<MemberDto, _>((m.username.clone(), m.age.clone())))
        .from(&m)
        .filter(m.id.eq(5))
        .build()
        .unwrap();
    assert!(matches!(
        factory.fetch_one(query),
        Err(ExecutionError::Projection(ProjectionError::UnexpectedNull { .. }))
    ));

    let query = select(generated::<Badge, _>((m.username.nullable(), m.age.clone())))
        .from(&m)
        .filter(m.age.goe(40))
        .order_by(m.age.asc())
        .build()
        .unwrap();
    assert_eq!(
        factory.fetch_list(query).unwrap(),
        vec![
            Badge {
                label: Some("member4".into()),
                age: 40,
            },
            Badge {
                label: None,
                age: 50,
            },
        ]
    );
}

#[test]
fn test_generated_strategy_is_query_coupled() {
    let m = QMember::new("m");
    let coupled = select(generated::<MemberDto, _>((m.username.clone(), m.age.clone())))
        .from(&m)
        .build()
        .unwrap();
    let plain = select(fields::<MemberDto>([m.username.bind()]).unwrap())
        .from(&m)
        .build()
        .unwrap();

    assert!(coupled.request().projection.is_query_coupled());
    assert!(!plain.request().projection.is_query_coupled());
}

#[test]
fn test_tuple_reads_entities_and_values() {
    let m = QMember::new("m");
    let t = QTeam::new("t");
    let query = select((m.clone(), t.clone(), m.age.multiply(2)))
        .from(&m)
        .join(JoinSpec::left(&m.association("team"), &t).on(t.name.eq("teamB")))
        .order_by(m.id.asc())
        .build()
        .unwrap();

    let rows = memory_factory().fetch_list(query).unwrap();
    assert_eq!(rows.len(), 4);

    let first = &rows[0];
    assert_eq!(first.len(), 3);
    assert_eq!(first.entity(&m).unwrap().map(|m| m.id), Some(1));
    assert_eq!(first.entity(&t).unwrap(), None);
    assert_eq!(first.get(&m.age.multiply(2)).unwrap(), Some(20));

    let last = &rows[3];
    assert_eq!(last.entity(&t).unwrap(), Some(Team::new(2, "teamB")));

    // Entities not in the select list are reported, not guessed
    let other = QTeam::new("x");
    assert!(matches!(
        first.entity(&other),
        Err(ProjectionError::NotSelected(_))
    ));
}

#[test]
fn test_entity_projection_returns_managed_copy() {
    let m = QMember::new("m");
    let mut factory = memory_factory();
    let third = select_from(&m).filter(m.id.eq(3));

    let first = factory.fetch_one(third.clone().build().unwrap()).unwrap().unwrap();
    let again = factory.fetch_one(third.build().unwrap()).unwrap().unwrap();
    assert_eq!(first, again);
    assert_eq!(first, Member::new(3, Some("member3"), 30, Some(2)));
}
