#[path = "../common/mod.rs"]
mod common;

use common::*;
use quarry::prelude::*;
use quarry::sql::expr::{BinaryOperator, Expr};

#[test]
fn test_untyped_comparison_rejects_mismatched_kinds() {
    let err = Expr::binary(
        Expr::column("m", "age", ValueType::Int),
        BinaryOperator::Eq,
        Expr::literal("ten"),
    )
    .unwrap_err();
    assert_eq!(
        err,
        BuildError::TypeMismatch {
            left: ValueType::Int,
            right: ValueType::Text,
            context: "`=` operands".into(),
        }
    );

    // Numeric kinds compare with each other
    assert!(Expr::binary(
        Expr::column("m", "age", ValueType::Int),
        BinaryOperator::Lt,
        Expr::literal(10.5),
    )
    .is_ok());
}

#[test]
fn test_untyped_arithmetic_and_logic_check_operands() {
    assert!(matches!(
        Expr::binary(Expr::literal("a"), BinaryOperator::Plus, Expr::literal(1)),
        Err(BuildError::TypeMismatch { .. })
    ));
    assert!(matches!(
        Expr::binary(Expr::literal(1), BinaryOperator::And, Expr::literal(true)),
        Err(BuildError::TypeMismatch { .. })
    ));
    assert!(matches!(
        Expr::like(Expr::column("m", "age", ValueType::Int), Expr::literal("1%")),
        Err(BuildError::TypeMismatch { .. })
    ));
    assert!(matches!(
        Expr::between(Expr::literal(5), Expr::literal("a"), Expr::literal(9)),
        Err(BuildError::TypeMismatch { .. })
    ));
    assert!(matches!(
        Predicate::try_from_expr(Expr::literal(3)),
        Err(BuildError::TypeMismatch { .. })
    ));
}

#[test]
fn test_between_is_inclusive() {
    let m = QMember::new("m");
    let mut factory = memory_factory();

    let query = select(m.username.clone())
        .from(&m)
        .filter(m.age.between(20, 30))
        .order_by(m.age.asc())
        .build()
        .unwrap();
    assert_eq!(
        factory.fetch_list(query).unwrap(),
        vec![Some("member2".to_string()), Some("member3".to_string())]
    );

    // Reversed bounds build fine and match nothing
    let query = select(m.username.clone())
        .from(&m)
        .filter(m.age.between(30, 20))
        .build()
        .unwrap();
    assert!(factory.fetch_list(query).unwrap().is_empty());

    let query = select(m.id.clone())
        .from(&m)
        .filter(m.age.not_between(15, 35))
        .order_by(m.id.asc())
        .build()
        .unwrap();
    assert_eq!(factory.fetch_list(query).unwrap(), vec![Some(1), Some(4)]);
}

#[test]
fn test_membership_and_null_checks() {
    let m = QMember::new("m");
    let mut factory = memory_factory();
    factory
        .session_mut()
        .persist(&Member::new(5, None, 50, None))
        .unwrap();

    let ids = |factory: &mut QueryFactory<MemoryStore>, p: Predicate| {
        let query = select(m.id.clone())
            .from(&m)
            .filter(p)
            .order_by(m.id.asc())
            .build()
            .unwrap();
        factory
            .fetch_list(query)
            .unwrap()
            .into_iter()
            .flatten()
            .collect::<Vec<i64>>()
    };

    assert_eq!(ids(&mut factory, m.age.in_list([10, 40])), vec![1, 4]);
    assert_eq!(ids(&mut factory, m.age.not_in([10, 40])), vec![2, 3, 5]);
    assert_eq!(ids(&mut factory, m.username.is_null()), vec![5]);
    assert_eq!(ids(&mut factory, m.team_id.is_not_null()), vec![1, 2, 3, 4]);
    // NULL never equals anything, and its negation is unknown too
    assert_eq!(ids(&mut factory, m.username.eq("member1")), vec![1]);
    assert_eq!(
        ids(&mut factory, m.username.eq("member1").not()),
        vec![2, 3, 4]
    );
    assert!(ids(&mut factory, m.age.in_list(Vec::<i64>::new())).is_empty());
}

#[test]
fn test_string_functions() {
    let m = QMember::new("m");
    let mut factory = memory_factory();

    let label = m
        .username
        .upper()
        .concat("-")
        .concat(m.age.string_value());
    let query = select(label)
        .from(&m)
        .filter(m.username.ends_with("1"))
        .build()
        .unwrap();
    assert_eq!(
        factory.fetch_one(query).unwrap(),
        Some(Some("MEMBER1-10".to_string()))
    );

    let query = select(m.username.length())
        .from(&m)
        .filter(m.username.starts_with("member"))
        .build()
        .unwrap();
    assert_eq!(factory.fetch_list(query).unwrap(), vec![Some(7); 4]);

    let query = select(m.id.clone())
        .from(&m)
        .filter(m.username.like("mem_er_"))
        .build()
        .unwrap();
    assert_eq!(factory.fetch_count(query).unwrap(), 4);
}

#[test]
fn test_contains_escapes_wildcards() {
    let m = QMember::new("m");
    let mut factory = memory_factory();
    factory
        .session_mut()
        .persist(&Member::new(5, Some("50%_off"), 50, None))
        .unwrap();

    let query = select(m.id.clone())
        .from(&m)
        .filter(m.username.contains("%_"))
        .build()
        .unwrap();
    let sql = query.to_sql(Dialect::Postgres);
    assert!(sql.contains("LIKE '%!%!_%' ESCAPE '!'"), "{}", sql);

    assert_eq!(factory.fetch_list(query).unwrap(), vec![Some(5)]);
}

#[test]
fn test_arithmetic_and_constants() {
    let m = QMember::new("m");
    let mut factory = memory_factory();

    let query = select((m.age.multiply(2).add(1), constant("A"), m.age.modulo(3)))
        .from(&m)
        .filter(m.id.eq(4))
        .build()
        .unwrap();
    let row = factory.fetch_one(query).unwrap().unwrap();
    assert_eq!(row.get(&m.age.multiply(2).add(1)).unwrap(), Some(81));
    assert_eq!(row.get(&constant("A")).unwrap(), Some("A".to_string()));
    assert_eq!(row.get(&m.age.modulo(3)).unwrap(), Some(1));

    let query = select(m.age.divide(0)).from(&m).build().unwrap();
    assert!(factory.fetch_list(query).is_err());
}

#[test]
fn test_coalesce_replaces_null() {
    let m = QMember::new("m");
    let mut factory = memory_factory();
    factory
        .session_mut()
        .persist(&Member::new(5, None, 50, None))
        .unwrap();

    let query = select(m.username.coalesce("anonymous"))
        .from(&m)
        .filter(m.id.eq(5))
        .build()
        .unwrap();
    assert_eq!(
        factory.fetch_one(query).unwrap(),
        Some(Some("anonymous".to_string()))
    );
}

#[test]
fn test_simple_case_first_match_wins() {
    let m = QMember::new("m");
    let mut factory = memory_factory();

    let label = m
        .age
        .when(10)
        .then("ten")
        .when(20)
        .then("twenty")
        .when(10)
        .then("shadowed")
        .otherwise("other");
    let query = select(label)
        .from(&m)
        .order_by(m.age.asc())
        .build()
        .unwrap();
    assert_eq!(
        factory.fetch_list(query).unwrap(),
        vec![
            Some("ten".to_string()),
            Some("twenty".to_string()),
            Some("other".to_string()),
            Some("other".to_string()),
        ]
    );
}

#[test]
fn test_searched_case_evaluates_in_order() {
    let m = QMember::new("m");
    let mut factory = memory_factory();

    // Overlapping conditions: 20 satisfies both, the first one wins
    let band = CaseBuilder::when(m.age.loe(20))
        .then(1)
        .when(m.age.loe(30))
        .then(2)
        .otherwise(3);
    let query = select((m.username.clone(), band.clone()))
        .from(&m)
        .order_by(band.desc())
        .order_by(m.username.asc())
        .build()
        .unwrap();

    let rows = factory.fetch_list(query).unwrap();
    let bands: Vec<Option<i64>> = rows.iter().map(|r| r.get(&band).unwrap()).collect();
    let names: Vec<_> = rows.iter().map(|r| r.get(&m.username).unwrap()).collect();
    assert_eq!(bands, vec![Some(3), Some(2), Some(1), Some(1)]);
    assert_eq!(
        names,
        vec![
            Some("member4".to_string()),
            Some("member3".to_string()),
            Some("member1".to_string()),
            Some("member2".to_string()),
        ]
    );

    let no_default = CaseBuilder::when(m.age.gt(100)).then("old").end();
    let query = select(no_default).from(&m).filter(m.id.eq(1)).build().unwrap();
    assert_eq!(factory.fetch_one(query).unwrap(), Some(None));
}
