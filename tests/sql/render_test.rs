#[path = "../common/mod.rs"]
mod common;

use common::*;
use insta::assert_snapshot;
use quarry::prelude::*;

const DIALECTS: [Dialect; 3] = [Dialect::Postgres, Dialect::Sqlite, Dialect::MySql];

#[test]
fn test_left_join_with_on_filter() {
    let m = QMember::new("m");
    let t = QTeam::new("t");
    let query = select((m.username.clone(), t.name.clone()))
        .from(&m)
        .join(JoinSpec::left(&m.association("team"), &t).on(t.name.eq("teamA")))
        .filter(m.age.gt(15))
        .order_by(m.username.asc().nulls_last())
        .limit(10)
        .offset(5)
        .build()
        .unwrap();

    assert_snapshot!(query.to_sql(Dialect::Postgres), @r#"
    SELECT
      "m"."username",
      "t"."name"
    FROM "member" AS "m"
    LEFT JOIN "team" AS "t" ON ("m"."team_id" = "t"."id") AND ("t"."name" = 'teamA')
    WHERE "m"."age" > 15
    ORDER BY "m"."username" ASC NULLS LAST
    LIMIT 10 OFFSET 5
    "#);

    for dialect in DIALECTS {
        assert_valid_sql(&query.to_sql(dialect), dialect);
    }
}

#[test]
fn test_fetch_join_selects_association_columns() {
    let m = QMember::new("m");
    let t = QTeam::new("t");
    let query = select_from(&m)
        .join(JoinSpec::inner(&m.association("team"), &t).fetch())
        .build()
        .unwrap();

    assert_snapshot!(query.to_sql(Dialect::Postgres), @r#"
    SELECT
      "m"."id",
      "m"."username",
      "m"."age",
      "m"."team_id",
      "t"."id",
      "t"."name"
    FROM "member" AS "m"
    INNER JOIN "team" AS "t" ON "m"."team_id" = "t"."id"
    "#);
}

#[test]
fn test_grouped_aggregate() {
    let m = QMember::new("m");
    let t = QTeam::new("t");
    let query = select((t.name.clone(), m.age.avg(), m.count()))
        .from(&m)
        .join(JoinSpec::inner(&m.association("team"), &t))
        .group_by(&t.name)
        .having(m.age.avg().gt(20))
        .order_by(t.name.asc())
        .build()
        .unwrap();

    assert_snapshot!(query.to_sql(Dialect::Postgres), @r#"
    SELECT
      "t"."name",
      AVG("m"."age"),
      COUNT("m"."id")
    FROM "member" AS "m"
    INNER JOIN "team" AS "t" ON "m"."team_id" = "t"."id"
    GROUP BY "t"."name"
    HAVING AVG("m"."age") > 20
    ORDER BY "t"."name" ASC
    "#);

    for dialect in DIALECTS {
        assert_valid_sql(&query.to_sql(dialect), dialect);
    }
}

#[test]
fn test_count_wraps_unpaged_request() {
    let m = QMember::new("m");
    let query = select(m.id.clone())
        .from(&m)
        .filter(m.age.goe(20))
        .order_by(m.age.desc())
        .limit(2)
        .build()
        .unwrap();

    assert_snapshot!(query.request().to_count_sql(Dialect::Sqlite), @r#"
    SELECT COUNT(*) FROM (
    SELECT
      "m"."id"
    FROM "member" AS "m"
    WHERE "m"."age" >= 20
    ) AS "counted"
    "#);

    for dialect in DIALECTS {
        assert_valid_sql(&query.request().to_count_sql(dialect), dialect);
    }
}

#[test]
fn test_bulk_mutations() {
    let m = QMember::new("m");
    let rename = update(&m)
        .set(&m.username, "X")
        .filter(m.age.lt(28))
        .build()
        .unwrap();
    assert_snapshot!(
        rename.to_sql(Dialect::Postgres),
        @r#"UPDATE "member" AS "m" SET "username" = 'X' WHERE "m"."age" < 28"#
    );

    let older = update(&m).set(&m.age, m.age.add(1)).build().unwrap();
    assert_snapshot!(
        older.to_sql(Dialect::MySql),
        @"UPDATE `member` AS `m` SET `age` = `m`.`age` + 1"
    );

    let purge = delete(&m).filter(m.team_id.is_null()).build().unwrap();
    assert_snapshot!(
        purge.to_sql(Dialect::Sqlite),
        @r#"DELETE FROM "member" AS "m" WHERE "m"."team_id" IS NULL"#
    );

    for dialect in DIALECTS {
        for request in [&rename, &older, &purge] {
            assert_valid_sql(&request.to_sql(dialect), dialect);
        }
    }
}

#[test]
fn test_mysql_emulations() {
    let m = QMember::new("m");
    let query = select(m.username.concat("@").concat(m.age.string_value()))
        .from(&m)
        .filter(m.username.is_not_null())
        .order_by(m.username.desc().nulls_first())
        .offset(3)
        .build()
        .unwrap();

    let sql = query.to_sql(Dialect::MySql);
    assert!(
        sql.contains("CONCAT(CONCAT(`m`.`username`, '@'), CAST(`m`.`age` AS CHAR))"),
        "{}",
        sql
    );
    assert!(sql.contains("ORDER BY `m`.`username` IS NULL DESC, `m`.`username` DESC"));
    assert!(sql.ends_with("LIMIT 18446744073709551615 OFFSET 3"));
    assert_valid_sql(&sql, Dialect::MySql);

    let sql = query.to_sql(Dialect::Sqlite);
    assert!(sql.contains("\"m\".\"username\" || '@'"), "{}", sql);
    assert!(sql.ends_with("LIMIT -1 OFFSET 3"));
    assert_valid_sql(&sql, Dialect::Sqlite);
}

#[test]
fn test_case_and_subqueries_render_valid_sql() {
    let m = QMember::new("m");
    let sub = QMember::new("sub");
    let t = QTeam::new("t");

    let oldest = select(sub.age.max()).from(&sub).into_subquery().unwrap();
    let team_a = select(t.id.clone())
        .from(&t)
        .filter(t.name.eq("teamA"))
        .into_subquery()
        .unwrap();
    let label = m.age.when(10).then("ten").otherwise("other");

    let query = select((m.username.clone(), label.clone()))
        .from(&m)
        .filter(m.age.lt(oldest))
        .filter(m.team_id.in_subquery(team_a))
        .build()
        .unwrap();

    let sql = query.to_sql(Dialect::Postgres);
    assert!(sql.contains("CASE \"m\".\"age\" WHEN 10 THEN 'ten' ELSE 'other' END"));
    assert!(sql.contains("\"m\".\"team_id\" IN (SELECT"));
    for dialect in DIALECTS {
        assert_valid_sql(&query.to_sql(dialect), dialect);
    }
}

#[test]
fn test_boolean_literals_follow_dialect() {
    let m = QMember::new("m");
    let query = select(m.id.clone())
        .from(&m)
        .filter(constant(true).is_true())
        .build()
        .unwrap();

    assert!(query.to_sql(Dialect::Postgres).ends_with("WHERE true = true"));
    assert!(query.to_sql(Dialect::Sqlite).ends_with("WHERE 1 = 1"));
    assert!(query.to_sql(Dialect::MySql).ends_with("WHERE 1 = 1"));
}
