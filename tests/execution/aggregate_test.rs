#[path = "../common/mod.rs"]
mod common;

use common::*;
use quarry::prelude::*;

fn member_ids<P>(query: Query<P>) -> Vec<i64>
where
    P: quarry::projection::Projection<Output = Option<i64>>,
{
    memory_factory()
        .fetch_list(query)
        .unwrap()
        .into_iter()
        .flatten()
        .collect()
}

#[test]
fn test_whole_table_aggregates() {
    let m = QMember::new("m");
    let query = select((
        m.count(),
        m.age.sum(),
        m.age.avg(),
        m.age.max(),
        m.age.min(),
    ))
    .from(&m)
    .build()
    .unwrap();

    let row = memory_factory().fetch_one(query).unwrap().unwrap();
    assert_eq!(row.get(&m.count()).unwrap(), Some(4));
    assert_eq!(row.get(&m.age.sum()).unwrap(), Some(100));
    assert_eq!(row.get(&m.age.avg()).unwrap(), Some(25.0));
    assert_eq!(row.get(&m.age.max()).unwrap(), Some(40));
    assert_eq!(row.get(&m.age.min()).unwrap(), Some(10));
}

#[test]
fn test_group_by_team() {
    let m = QMember::new("m");
    let t = QTeam::new("t");
    let query = select((t.name.clone(), m.age.sum(), m.age.avg(), m.count()))
        .from(&m)
        .join(JoinSpec::inner(&m.association("team"), &t))
        .group_by(&t.name)
        .order_by(t.name.asc())
        .build()
        .unwrap();

    let rows = memory_factory().fetch_list(query).unwrap();
    let summary: Vec<_> = rows
        .iter()
        .map(|r| {
            (
                r.get(&t.name).unwrap(),
                r.get(&m.age.sum()).unwrap(),
                r.get(&m.age.avg()).unwrap(),
                r.get(&m.count()).unwrap(),
            )
        })
        .collect();
    assert_eq!(
        summary,
        vec![
            (Some("teamA".to_string()), Some(30), Some(15.0), Some(2)),
            (Some("teamB".to_string()), Some(70), Some(35.0), Some(2)),
        ]
    );
}

#[test]
fn test_having_filters_groups() {
    let m = QMember::new("m");
    let t = QTeam::new("t");
    let query = select(t.name.clone())
        .from(&m)
        .join(JoinSpec::inner(&m.association("team"), &t))
        .group_by(&t.name)
        .having(m.age.avg().gt(20))
        .build()
        .unwrap();
    assert_eq!(
        memory_factory().fetch_list(query).unwrap(),
        vec![Some("teamB".to_string())]
    );
}

#[test]
fn test_ungrouped_column_is_rejected() {
    let m = QMember::new("m");
    let err = select((m.username.clone(), m.age.max()))
        .from(&m)
        .build()
        .unwrap_err();
    assert!(matches!(err, BuildError::ProjectionMismatch(_)));

    let err = select_from(&m).group_by(&m.team_id).build().unwrap_err();
    assert!(matches!(err, BuildError::ProjectionMismatch(_)));
}

#[test]
fn test_ungrouped_sort_and_having_are_rejected() {
    let m = QMember::new("m");
    let t = QTeam::new("t");
    let per_team = || {
        select((t.name.clone(), m.age.sum()))
            .from(&m)
            .join(JoinSpec::inner(&m.association("team"), &t))
            .group_by(&t.name)
    };

    let err = per_team().order_by(m.username.asc()).build().unwrap_err();
    assert!(matches!(err, BuildError::ProjectionMismatch(msg) if msg.contains("order by")));

    let err = per_team().having(m.age.gt(15)).build().unwrap_err();
    assert!(matches!(err, BuildError::ProjectionMismatch(msg) if msg.contains("having")));

    // Aggregates and expressions over grouped keys are fine anywhere
    let query = per_team()
        .having(t.name.lower().starts_with("team"))
        .order_by(m.age.sum().desc())
        .build()
        .unwrap();
    let totals: Vec<_> = memory_factory()
        .fetch_list(query)
        .unwrap()
        .iter()
        .map(|r| r.get(&m.age.sum()).unwrap())
        .collect();
    assert_eq!(totals, vec![Some(70), Some(30)]);
}

#[test]
fn test_aggregate_over_empty_input() {
    let m = QMember::new("m");
    let mut factory = memory_factory();

    let max = select(m.age.max())
        .from(&m)
        .filter(m.age.gt(100))
        .build()
        .unwrap();
    assert_eq!(factory.fetch_one(max).unwrap(), Some(None));

    let count = select(count_all())
        .from(&m)
        .filter(m.age.gt(100))
        .build()
        .unwrap();
    assert_eq!(factory.fetch_one(count).unwrap(), Some(Some(0)));

    // Grouped requests over no rows have no groups at all
    let grouped = select(m.age.max())
        .from(&m)
        .filter(m.age.gt(100))
        .group_by(&m.team_id)
        .build()
        .unwrap();
    assert_eq!(factory.fetch_list(grouped).unwrap(), Vec::<Option<i64>>::new());
}

#[test]
fn test_count_distinct_skips_nulls() {
    let m = QMember::new("m");
    let mut factory = memory_factory();
    factory
        .session_mut()
        .persist(&Member::new(5, None, 50, None))
        .unwrap();

    let query = select((m.team_id.count_distinct(), m.team_id.count(), count_all()))
        .from(&m)
        .build()
        .unwrap();
    let row = factory.fetch_one(query).unwrap().unwrap();
    assert_eq!(row.get(&m.team_id.count_distinct()).unwrap(), Some(2));
    assert_eq!(row.get(&m.team_id.count()).unwrap(), Some(4));
    assert_eq!(row.get(&count_all()).unwrap(), Some(5));
}

#[test]
fn test_scalar_subquery_comparison() {
    let m = QMember::new("m");
    let sub = QMember::new("sub");

    let oldest = select(sub.age.max()).from(&sub).into_subquery().unwrap();
    let query = select(m.id.clone())
        .from(&m)
        .filter(m.age.eq(oldest))
        .build()
        .unwrap();
    assert_eq!(member_ids(query), vec![4]);

    let average = select(sub.age.avg()).from(&sub).into_subquery().unwrap();
    let query = select(m.id.clone())
        .from(&m)
        .filter(m.age.goe(average))
        .order_by(m.id.asc())
        .build()
        .unwrap();
    assert_eq!(member_ids(query), vec![3, 4]);
}

#[test]
fn test_membership_subquery() {
    let m = QMember::new("m");
    let t = QTeam::new("t");

    let team_a = select(t.id.clone())
        .from(&t)
        .filter(t.name.eq("teamA"))
        .into_subquery()
        .unwrap();
    let query = select(m.id.clone())
        .from(&m)
        .filter(m.team_id.in_subquery(team_a.clone()))
        .order_by(m.id.asc())
        .build()
        .unwrap();
    assert_eq!(member_ids(query), vec![1, 2]);

    let query = select(m.id.clone())
        .from(&m)
        .filter(m.team_id.not_in_subquery(team_a))
        .order_by(m.id.asc())
        .build()
        .unwrap();
    assert_eq!(member_ids(query), vec![3, 4]);
}

#[test]
fn test_correlated_subquery_per_team() {
    let m = QMember::new("m");
    let sub = QMember::new("sub");

    let team_oldest = select(sub.age.max())
        .from(&sub)
        .filter(sub.team_id.eq(m.team_id.clone()))
        .into_subquery()
        .unwrap();
    let query = select(m.id.clone())
        .from(&m)
        .filter(m.age.eq(team_oldest))
        .order_by(m.id.asc())
        .build()
        .unwrap();
    assert_eq!(member_ids(query), vec![2, 4]);
}

#[test]
fn test_subquery_alias_must_not_shadow_outer() {
    let m = QMember::new("m");
    let shadow = QMember::new("m");

    let inner = select(shadow.age.max()).from(&shadow).into_subquery().unwrap();
    let err = select(m.id.clone())
        .from(&m)
        .filter(m.age.eq(inner))
        .build()
        .unwrap_err();
    assert_eq!(err, BuildError::AliasCollision { alias: "m".into() });
}
