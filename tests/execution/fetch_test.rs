#[path = "../common/mod.rs"]
mod common;

use std::time::Duration;

use common::*;
use quarry::config::Settings;
use quarry::prelude::*;
use quarry::store::{Failure, StoreError};

#[test]
fn test_fetch_one_cardinality() {
    let m = QMember::new("m");
    let mut factory = memory_factory();

    let none = select_from(&m).filter(m.age.gt(100)).build().unwrap();
    assert_eq!(factory.fetch_one(none).unwrap(), None);

    let one = select_from(&m).filter(m.username.eq("member2")).build().unwrap();
    assert_eq!(
        factory.fetch_one(one).unwrap(),
        Some(Member::new(2, Some("member2"), 20, Some(1)))
    );

    let many = select_from(&m).filter(m.age.goe(20)).build().unwrap();
    assert!(matches!(
        factory.fetch_one(many),
        Err(ExecutionError::TooManyResults { found: 3 })
    ));
}

#[test]
fn test_fetch_first_takes_head_of_order() {
    let m = QMember::new("m");
    let mut factory = memory_factory();

    let oldest = select(m.username.clone())
        .from(&m)
        .order_by(m.age.desc())
        .build()
        .unwrap();
    assert_eq!(
        factory.fetch_first(oldest).unwrap(),
        Some(Some("member4".to_string()))
    );

    let nobody = select(m.username.clone())
        .from(&m)
        .filter(m.age.lt(0))
        .build()
        .unwrap();
    assert_eq!(factory.fetch_first(nobody).unwrap(), None);

    // An existing smaller limit wins; limit 0 yields nothing
    let empty_page = select(m.username.clone())
        .from(&m)
        .limit(0)
        .build()
        .unwrap();
    assert_eq!(factory.fetch_first(empty_page).unwrap(), None);

    // Offset still applies before the cap
    let second = select(m.id.clone())
        .from(&m)
        .order_by(m.id.asc())
        .offset(1)
        .build()
        .unwrap();
    assert_eq!(factory.fetch_first(second).unwrap(), Some(Some(2)));
}

#[test]
fn test_fetch_counted_pages_and_totals() {
    let m = QMember::new("m");
    let mut factory = memory_factory();

    let query = select_from(&m)
        .order_by(m.username.desc())
        .offset(1)
        .limit(2)
        .build()
        .unwrap();
    let page = factory.fetch_counted(query).unwrap();

    assert_eq!(page.total, 4);
    assert_eq!(page.offset, 1);
    assert_eq!(page.limit, Some(2));
    assert_eq!(usernames(&page.items), vec!["member3", "member2"]);
    assert!(page.has_more());

    let last = select_from(&m)
        .order_by(m.username.desc())
        .offset(3)
        .limit(2)
        .build()
        .unwrap();
    let page = factory.fetch_counted(last).unwrap();
    assert_eq!(page.len(), 1);
    assert!(!page.has_more());

    let beyond = select_from(&m).offset(10).limit(2).build().unwrap();
    let page = factory.fetch_counted(beyond).unwrap();
    assert!(page.is_empty());
    assert_eq!(page.total, 4);
}

#[test]
fn test_fetch_count_ignores_paging_and_order() {
    let m = QMember::new("m");
    let mut factory = memory_factory();

    let paged = select(m.id.clone())
        .from(&m)
        .filter(m.age.gt(10))
        .order_by(m.age.desc())
        .offset(2)
        .limit(1);
    assert_eq!(factory.fetch_count(paged.clone().build().unwrap()).unwrap(), 3);
    assert_eq!(factory.fetch_list(paged.build().unwrap()).unwrap().len(), 1);

    let grouped = select(m.team_id.clone())
        .from(&m)
        .group_by(&m.team_id)
        .limit(1)
        .build()
        .unwrap();
    assert_eq!(factory.fetch_count(grouped).unwrap(), 2);
}

#[test]
fn test_store_failures_pass_through() {
    let m = QMember::new("m");
    let everyone = select_from(&m);
    let query = || everyone.clone().build().unwrap();
    let mut factory = memory_factory();

    factory
        .session_mut()
        .inject_failure(Failure::Timeout(Duration::from_millis(250)));
    let err = factory.fetch_list(query()).unwrap_err();
    assert!(err.is_interrupted());
    assert!(matches!(
        err,
        ExecutionError::Store(StoreError::Timeout(d)) if d == Duration::from_millis(250)
    ));

    factory.session_mut().inject_failure(Failure::Cancelled);
    assert!(factory.fetch_count(query()).unwrap_err().is_interrupted());

    factory
        .session_mut()
        .inject_failure(Failure::Connection("reset by peer".into()));
    let err = factory.fetch_counted(query()).unwrap_err();
    assert!(!err.is_interrupted());
    assert!(matches!(err, ExecutionError::Store(StoreError::Connection(_))));

    // The failure is spent; the next call succeeds
    assert_eq!(factory.fetch_list(query()).unwrap().len(), 4);
}

#[test]
fn test_session_released_after_every_execution() {
    let m = QMember::new("m");
    let first = select_from(&m).limit(1);
    let query = || first.clone().build().unwrap();
    let mut factory = memory_factory();

    factory.fetch_list(query()).unwrap();
    factory.fetch_counted(query()).unwrap();
    factory.session_mut().inject_failure(Failure::Cancelled);
    let _ = factory.fetch_one(query());

    let stats = factory.session().stats();
    assert_eq!(stats.acquired, 3);
    assert_eq!(stats.acquired, stats.released);
    assert_eq!(stats.counts, 1);
}

#[test]
fn test_logged_sql_does_not_change_results() {
    let settings = Settings::from_toml_str("[query]\ndialect = \"mysql\"\nlog_sql = true").unwrap();
    let m = QMember::new("m");
    let query = select(m.username.clone())
        .from(&m)
        .filter(m.username.contains("er1"))
        .build()
        .unwrap();

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .finish();
    let found = tracing::subscriber::with_default(subscriber, || {
        let mut factory = QueryFactory::with_settings(seeded_store(), &settings);
        factory.fetch_list(query)
    })
    .unwrap();
    assert_eq!(found, vec![Some("member1".to_string())]);
}
