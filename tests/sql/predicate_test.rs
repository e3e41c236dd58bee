#[path = "../common/mod.rs"]
mod common;

use common::*;
use proptest::prelude::*;
use quarry::prelude::*;
use quarry::sql::predicate::{and, not, or};

/// A small predicate over member age drawn from a handful of shapes.
fn age_predicate() -> impl Strategy<Value = Predicate> {
    let m = QMember::new("m");
    (0usize..5, 0i64..50, 0i64..50).prop_map(move |(shape, a, b)| match shape {
        0 => m.age.lt(a),
        1 => m.age.goe(a),
        2 => m.age.between(a.min(b), a.max(b)),
        3 => m.age.eq(a).or(m.age.eq(b)),
        _ => m.age.in_list([a, b]).not(),
    })
}

fn matching_ids(predicate: impl Into<Option<Predicate>>) -> Vec<i64> {
    let m = QMember::new("m");
    let query = select(m.id.clone())
        .from(&m)
        .filter(predicate)
        .order_by(m.id.asc())
        .build()
        .unwrap();
    memory_factory()
        .fetch_list(query)
        .unwrap()
        .into_iter()
        .flatten()
        .collect()
}

proptest! {
    #[test]
    fn prop_absent_is_identity(p in age_predicate()) {
        prop_assert_eq!(p.clone().and(None), p.clone());
        prop_assert_eq!(p.clone().or(None), p.clone());
        prop_assert_eq!(and(p.clone(), None), Some(p.clone()));
        prop_assert_eq!(or(None, p.clone()), Some(p.clone()));
        prop_assert_eq!(all_of([None, Some(p.clone()), None]), Some(p.clone()));
        prop_assert_eq!(any_of([Some(p.clone()), None]), Some(p));
    }

    #[test]
    fn prop_absent_filter_matches_same_rows(p in age_predicate()) {
        let direct = matching_ids(p.clone());
        let folded = matching_ids(all_of([Some(p.clone()), None]));
        prop_assert_eq!(&direct, &folded);

        let built = PredicateBuilder::new().and(None).and(p).or(None).build();
        prop_assert_eq!(matching_ids(built), direct);
    }
}

#[test]
fn test_empty_composition_is_no_filter() {
    assert_eq!(all_of(Vec::<Option<Predicate>>::new()), None);
    assert_eq!(any_of([None::<Predicate>, None]), None);
    assert_eq!(not(None::<Predicate>), None);
    assert!(!PredicateBuilder::new().and(None).has_value());

    // No filter at all selects every row
    assert_eq!(matching_ids(all_of([None::<Predicate>])), vec![1, 2, 3, 4]);
}

#[test]
fn test_dynamic_search_from_optional_criteria() {
    struct Search<'a> {
        username: Option<&'a str>,
        age_goe: Option<i64>,
        age_loe: Option<i64>,
    }

    fn criteria(m: &QMember, search: &Search<'_>) -> Option<Predicate> {
        all_of([
            search.username.map(|name| m.username.eq(name)),
            search.age_goe.map(|age| m.age.goe(age)),
            search.age_loe.map(|age| m.age.loe(age)),
        ])
    }

    let m = QMember::new("m");
    let cases = [
        (
            Search {
                username: Some("member1"),
                age_goe: Some(10),
                age_loe: None,
            },
            vec![1],
        ),
        (
            Search {
                username: None,
                age_goe: Some(20),
                age_loe: Some(30),
            },
            vec![2, 3],
        ),
        (
            Search {
                username: None,
                age_goe: None,
                age_loe: None,
            },
            vec![1, 2, 3, 4],
        ),
    ];

    for (search, expected) in cases {
        assert_eq!(matching_ids(criteria(&m, &search)), expected);
    }
}

#[test]
fn test_builder_accumulates_like_filter_all() {
    let m = QMember::new("m");
    let criteria = [Some(m.age.gt(10)), None, Some(m.team_id.eq(2))];

    let mut builder = PredicateBuilder::new();
    for c in criteria.iter().cloned() {
        builder = builder.and(c);
    }
    assert!(builder.has_value());
    let accumulated = builder.build();
    assert_eq!(accumulated, all_of(criteria.iter().cloned()));

    let query = select(m.id.clone())
        .from(&m)
        .filter_all(criteria)
        .order_by(m.id.asc())
        .build()
        .unwrap();
    assert_eq!(
        memory_factory().fetch_list(query).unwrap(),
        vec![Some(3), Some(4)]
    );
}

#[test]
fn test_predicate_values_are_reusable() {
    let m = QMember::new("m");
    let adults = m.age.goe(20);

    let first = select_from(&m).filter(adults.clone()).build().unwrap();
    let second = select(m.username.clone())
        .from(&m)
        .filter(adults.clone())
        .build()
        .unwrap();

    assert_eq!(first.request().filter, second.request().filter);
    assert_eq!(first.request().filter.as_ref(), Some(&adults));
}

#[test]
fn test_or_with_and_renders_grouped() {
    let m = QMember::new("m");
    let p = m.age.lt(15).or(m.age.gt(35)).and(m.team_id.is_not_null());
    let sql = p.expr().to_tokens().serialize(Dialect::Postgres);
    assert_eq!(
        sql,
        "((\"m\".\"age\" < 15) OR (\"m\".\"age\" > 35)) AND (\"m\".\"team_id\" IS NOT NULL)"
    );
    assert_eq!(matching_ids(p), vec![1, 4]);
}
