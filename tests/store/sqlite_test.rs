#[path = "../common/mod.rs"]
mod common;

use common::*;
use quarry::config::Settings;
use quarry::entity::EntityKey;
use quarry::prelude::*;

#[test]
fn test_paging_with_total() {
    let m = QMember::new("m");
    let query = select_from(&m)
        .order_by(m.username.desc())
        .offset(1)
        .limit(2)
        .build()
        .unwrap();

    let page = sqlite_factory().fetch_counted(query).unwrap();
    assert_eq!(page.total, 4);
    assert_eq!(usernames(&page.items), vec!["member3", "member2"]);
    assert!(page.has_more());
}

#[test]
fn test_offset_only() {
    let m = QMember::new("m");
    let query = select(m.id.clone())
        .from(&m)
        .order_by(m.id.asc())
        .offset(2)
        .build()
        .unwrap();
    assert_eq!(
        sqlite_factory().fetch_list(query).unwrap(),
        vec![Some(3), Some(4)]
    );
}

#[test]
fn test_fetch_one_and_first() {
    let m = QMember::new("m");
    let mut factory = sqlite_factory();

    let many = select_from(&m).filter(m.age.goe(20)).build().unwrap();
    assert!(matches!(
        factory.fetch_one(many),
        Err(ExecutionError::TooManyResults { found: 3 })
    ));

    let youngest = select(m.username.clone())
        .from(&m)
        .order_by(m.age.asc())
        .build()
        .unwrap();
    assert_eq!(
        factory.fetch_first(youngest).unwrap(),
        Some(Some("member1".to_string()))
    );
}

#[test]
fn test_nulls_last_ordering() {
    let m = QMember::new("m");
    let session = seeded_sqlite();
    for member in [
        Member::new(5, None, 100, None),
        Member::new(6, Some("member5"), 100, None),
        Member::new(7, Some("member6"), 100, None),
    ] {
        session.insert(&member).unwrap();
    }

    let query = select_from(&m)
        .filter(m.age.eq(100))
        .order_by(m.age.desc())
        .order_by(m.username.asc().nulls_last())
        .build()
        .unwrap();
    let found = QueryFactory::new(session).fetch_list(query).unwrap();
    assert_eq!(usernames(&found), vec!["member5", "member6", "<null>"]);
}

#[test]
fn test_left_join_on_filter() {
    let m = QMember::new("m");
    let t = QTeam::new("t");
    let query = select((m.username.clone(), t.name.clone()))
        .from(&m)
        .join(JoinSpec::left(&m.association("team"), &t).on(t.name.eq("teamA")))
        .order_by(m.id.asc())
        .build()
        .unwrap();

    let rows = sqlite_factory().fetch_list(query).unwrap();
    let teams: Vec<Option<String>> = rows.iter().map(|r| r.get(&t.name).unwrap()).collect();
    assert_eq!(
        teams,
        vec![Some("teamA".to_string()), Some("teamA".to_string()), None, None]
    );
}

#[test]
fn test_fetch_join_marks_loaded() {
    let m = QMember::new("m");
    let t = QTeam::new("t");
    let mut factory = sqlite_factory();

    let query = select_from(&m)
        .join(JoinSpec::inner(&m.association("team"), &t).fetch())
        .order_by(m.id.asc())
        .build()
        .unwrap();
    let found = factory.fetch_list(query).unwrap();

    assert_eq!(found.len(), 4);
    assert_eq!(found[3].team.get(), Some(&Team::new(2, "teamB")));
    assert!(factory.is_association_loaded(&EntityKey::new("member", 4), "team"));
    assert!(!factory.is_association_loaded(&EntityKey::new("team", 1), "members"));
}

#[test]
fn test_grouped_aggregates() {
    let m = QMember::new("m");
    let t = QTeam::new("t");
    let query = select((t.name.clone(), m.age.sum(), m.age.avg(), m.count()))
        .from(&m)
        .join(JoinSpec::inner(&m.association("team"), &t))
        .group_by(&t.name)
        .having(m.age.avg().gt(20))
        .build()
        .unwrap();

    let row = sqlite_factory().fetch_one(query).unwrap().unwrap();
    assert_eq!(row.get(&t.name).unwrap(), Some("teamB".to_string()));
    assert_eq!(row.get(&m.age.sum()).unwrap(), Some(70));
    assert_eq!(row.get(&m.age.avg()).unwrap(), Some(35.0));
    assert_eq!(row.get(&m.count()).unwrap(), Some(2));
}

#[test]
fn test_correlated_subquery() {
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
    assert_eq!(
        sqlite_factory().fetch_list(query).unwrap(),
        vec![Some(2), Some(4)]
    );
}

#[test]
fn test_bulk_update_and_delete() {
    let m = QMember::new("m");
    let mut factory = sqlite_factory();

    let rename = update(&m)
        .set(&m.username, "X")
        .filter(m.age.lt(28))
        .build()
        .unwrap();
    assert_eq!(factory.execute_update(&rename).unwrap(), 2);

    let older = update(&m).set(&m.age, m.age.add(1)).build().unwrap();
    assert_eq!(factory.execute_update(&older).unwrap(), 4);

    let everyone = select_from(&m).order_by(m.id.asc());
    let found = factory.fetch_list(everyone.clone().build().unwrap()).unwrap();
    assert_eq!(usernames(&found), vec!["X", "X", "member3", "member4"]);
    assert_eq!(found.iter().map(|m| m.age).collect::<Vec<_>>(), vec![11, 21, 31, 41]);

    let purge = delete(&m).filter(m.team_id.eq(2)).build().unwrap();
    assert_eq!(factory.execute_delete(&purge).unwrap(), 2);
    assert_eq!(factory.fetch_count(everyone.build().unwrap()).unwrap(), 2);
}

#[test]
fn test_string_functions_and_case() {
    let m = QMember::new("m");
    let label = m
        .username
        .upper()
        .concat("-")
        .concat(m.age.string_value());
    let band = CaseBuilder::when(m.age.loe(20)).then("junior").otherwise("senior");
    let query = select((label.clone(), band.clone()))
        .from(&m)
        .filter(m.username.contains("er4"))
        .build()
        .unwrap();

    let row = sqlite_factory().fetch_one(query).unwrap().unwrap();
    assert_eq!(row.get(&label).unwrap(), Some("MEMBER4-40".to_string()));
    assert_eq!(row.get(&band).unwrap(), Some("senior".to_string()));
}

#[test]
fn test_open_from_settings() {
    let settings = Settings::from_toml_str(
        "[sqlite]\npath = \":memory:\"\nbusy_timeout_ms = 100\n\n[query]\ndialect = \"sqlite\"",
    )
    .unwrap();
    let session = SqliteSession::open_from_settings(&settings).unwrap();
    session.create_table::<Team>().unwrap();
    for team in teams() {
        session.insert(&team).unwrap();
    }

    let t = QTeam::new("t");
    let query = select(t.name.clone()).from(&t).order_by(t.id.desc()).build().unwrap();
    let mut factory = QueryFactory::with_settings(session, &settings);
    assert_eq!(
        factory.fetch_list(query).unwrap(),
        vec![Some("teamB".to_string()), Some("teamA".to_string())]
    );
}
