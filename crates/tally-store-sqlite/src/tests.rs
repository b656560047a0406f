//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::NaiveDate;
use tally_core::{
  executor::{Cell, ExecutionErrorKind, ExecutionOutcome, StatementExecutor},
  guard::{ApprovedStatement, Guard},
  schema::{COLUMNS, Category},
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn approved(sql: &str) -> ApprovedStatement {
  Guard::default()
    .inspect(sql)
    .into_result()
    .unwrap_or_else(|r| panic!("guard rejected {sql:?}: {r}"))
}

fn insert(purchased: &str, category: &str, amount: f64, date: &str, payment: Option<&str>) -> ApprovedStatement {
  let payment = payment.map_or_else(|| "NULL".to_owned(), |p| format!("'{p}'"));
  approved(&format!(
    "INSERT INTO Finance (purchased, categorization, amount, date, payment_type) \
     VALUES ('{purchased}', '{category}', {amount:?}, '{date}', {payment})"
  ))
}

async fn inserted_id(s: &SqliteStore, statement: &ApprovedStatement) -> i64 {
  match s.execute(statement).await.unwrap() {
    ExecutionOutcome::Inserted { affected, id } => {
      assert_eq!(affected, 1);
      id
    }
    other => panic!("expected an insert outcome, got {other:?}"),
  }
}

// ─── Inserts ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_then_select_by_id_round_trips() {
  let s = store().await;
  let id = inserted_id(&s, &insert("groceries", "Food", 250.0, "2025-10-21", Some("UPI"))).await;

  let record = s.get_record(id).await.unwrap().expect("record exists");
  assert_eq!(record.id, id);
  assert_eq!(record.purchased, "groceries");
  assert_eq!(record.categorization, Category::Food);
  assert_eq!(record.amount, 250.0);
  assert_eq!(record.date, NaiveDate::from_ymd_opt(2025, 10, 21).unwrap());
  assert_eq!(record.payment_type.as_deref(), Some("UPI"));

  let select = approved(&format!("SELECT * FROM Finance WHERE id = {id}"));
  let ExecutionOutcome::Selected { columns, rows } = s.execute(&select).await.unwrap() else {
    panic!("expected a select outcome");
  };
  assert_eq!(columns, COLUMNS.map(|c| c.name));
  assert_eq!(rows, [vec![
    Cell::Integer(id),
    Cell::Text("groceries".into()),
    Cell::Text("Food".into()),
    Cell::Real(250.0),
    Cell::Text("2025-10-21".into()),
    Cell::Text("UPI".into()),
  ]]);
}

#[tokio::test]
async fn ids_are_assigned_monotonically() {
  let s = store().await;
  let a = inserted_id(&s, &insert("tea", "Food", 3.0, "2025-01-01", None)).await;
  let b = inserted_id(&s, &insert("bus", "Transport", 2.0, "2025-01-01", None)).await;
  assert!(b > a);
}

#[tokio::test]
async fn null_payment_type_reads_back_as_none() {
  let s = store().await;
  let id = inserted_id(&s, &insert("tea", "Food", 3.5, "2025-01-01", None)).await;
  assert_eq!(s.get_record(id).await.unwrap().unwrap().payment_type, None);
}

#[tokio::test]
async fn get_record_missing_returns_none() {
  let s = store().await;
  assert!(s.get_record(99).await.unwrap().is_none());
}

// ─── Selects ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn select_preserves_engine_row_order() {
  let s = store().await;
  for (item, amount) in [("a", 1.0), ("b", 3.0), ("c", 2.0)] {
    inserted_id(&s, &insert(item, "Shopping", amount, "2025-01-01", None)).await;
  }

  let outcome = s
    .execute(&approved("SELECT purchased FROM Finance ORDER BY amount DESC"))
    .await
    .unwrap();
  let ExecutionOutcome::Selected { rows, .. } = outcome else { panic!("expected rows") };
  let items: Vec<_> = rows.into_iter().map(|r| r[0].to_string()).collect();
  assert_eq!(items, ["b", "c", "a"]);
}

#[tokio::test]
async fn empty_select_still_reports_columns() {
  let s = store().await;
  let outcome = s.execute(&approved("SELECT amount FROM Finance")).await.unwrap();
  assert_eq!(
    outcome,
    ExecutionOutcome::Selected { columns: vec!["amount".into()], rows: vec![] }
  );
}

#[tokio::test]
async fn engine_errors_are_classified_as_malformed() {
  let s = store().await;
  let err = s
    .execute(&approved("SELECT no_such_column FROM Finance"))
    .await
    .unwrap_err();
  assert_eq!(err.kind, ExecutionErrorKind::Malformed);
  assert!(!err.is_retryable());
}

#[test]
fn write_statements_fail_the_read_only_check() {
  let conn = rusqlite::Connection::open_in_memory().unwrap();
  crate::schema::init(&conn).unwrap();

  let err = crate::store::select(&conn, "DELETE FROM Finance").unwrap_err();
  assert_eq!(err.kind, ExecutionErrorKind::Malformed);
}

#[test]
fn failed_insert_is_rolled_back() {
  let mut conn = rusqlite::Connection::open_in_memory().unwrap();
  crate::schema::init(&conn).unwrap();

  let err = crate::store::run_statement(
    &mut conn,
    "INSERT INTO Finance (purchased, categorization, amount, date, payment_type) VALUES (NULL, 'Food', 1, '2025-01-01', NULL)",
    tally_core::guard::StatementKind::Insert,
  )
  .unwrap_err();
  assert_eq!(err.kind, ExecutionErrorKind::Constraint);

  let count: i64 = conn.query_row("SELECT COUNT(*) FROM Finance", [], |r| r.get(0)).unwrap();
  assert_eq!(count, 0);
}

#[test]
fn insert_touching_no_rows_is_rolled_back() {
  let mut conn = rusqlite::Connection::open_in_memory().unwrap();
  crate::schema::init(&conn).unwrap();

  let err = crate::store::run_statement(
    &mut conn,
    "INSERT INTO Finance (purchased, categorization, amount, date, payment_type) SELECT purchased, categorization, amount, date, payment_type FROM Finance",
    tally_core::guard::StatementKind::Insert,
  )
  .unwrap_err();
  assert_eq!(err.kind, ExecutionErrorKind::Malformed);
}

// ─── Dashboard queries ───────────────────────────────────────────────────────

#[tokio::test]
async fn recent_returns_newest_first_up_to_limit() {
  let s = store().await;
  for i in 0..7 {
    inserted_id(&s, &insert(&format!("item{i}"), "Other", f64::from(i), "2025-01-01", None)).await;
  }

  let recent = s.recent(5).await.unwrap();
  let names: Vec<_> = recent.iter().map(|r| r.purchased.as_str()).collect();
  assert_eq!(names, ["item6", "item5", "item4", "item3", "item2"]);
}

#[tokio::test]
async fn category_totals_are_summed_largest_first() {
  let s = store().await;
  inserted_id(&s, &insert("tea", "Food", 3.0, "2025-01-01", None)).await;
  inserted_id(&s, &insert("rent", "Utilities", 900.0, "2025-01-01", None)).await;
  inserted_id(&s, &insert("lunch", "Food", 12.0, "2025-01-02", None)).await;

  let totals = s.category_totals().await.unwrap();
  let pairs: Vec<_> = totals.iter().map(|t| (t.category.as_str(), t.total)).collect();
  assert_eq!(pairs, [("Utilities", 900.0), ("Food", 15.0)]);
}

#[tokio::test]
async fn category_totals_on_empty_store() {
  let s = store().await;
  assert!(s.category_totals().await.unwrap().is_empty());
}

#[test]
fn schema_init_is_idempotent_and_versioned() {
  let conn = rusqlite::Connection::open_in_memory().unwrap();
  crate::schema::init(&conn).unwrap();
  crate::schema::init(&conn).unwrap();

  let version: i32 = conn.pragma_query_value(None, "user_version", |r| r.get(0)).unwrap();
  assert_eq!(version, crate::schema::SCHEMA_VERSION);
}
