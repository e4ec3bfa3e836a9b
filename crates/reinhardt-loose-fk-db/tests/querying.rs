//! Loose foreign key predicates executed against SQLite

mod common;

use common::{HOST, StaticFetcher, Table, create_zaaktype, loader, zaak_model, zaaktype_model};
use reinhardt_loose_fk_db::{
	LookupSql, LookupValue, LooseFkConstraint, LooseFkError, LooseFkFilter, LooseFkLookup,
	LooseValue, Record, SqlFragment, SqlParam, Value, virtual_model_factory,
};
use rstest::{fixture, rstest};
use sea_query::{Alias, Order, Query, SqliteQueryBuilder};
use serde_json::json;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::sync::Arc;

const ZT_123: &str = "https://example.com/zt/123";
const ZT_456: &str = "https://example.com/zt/456";

async fn create_pool() -> SqlitePool {
	let pool = SqlitePoolOptions::new()
		.max_connections(1)
		.connect("sqlite::memory:")
		.await
		.expect("Failed to create SQLite pool");

	let zaak = zaak_model();
	let constraint = &zaak.constraints()[0];

	sqlx::query("CREATE TABLE testapp_zaaktype (id INTEGER PRIMARY KEY, name TEXT NOT NULL)")
		.execute(&pool)
		.await
		.unwrap();
	sqlx::query(&format!(
		r#"CREATE TABLE testapp_zaak (
			id INTEGER PRIMARY KEY,
			name TEXT NOT NULL DEFAULT '',
			"_zaaktype_id" INTEGER NULL REFERENCES testapp_zaaktype (id),
			extern_zaaktype TEXT NOT NULL DEFAULT '',
			{}
		)"#,
		constraint.constraint_sql()
	))
	.execute(&pool)
	.await
	.unwrap();

	pool
}

async fn insert_zaaktype(pool: &SqlitePool, id: i64) {
	sqlx::query("INSERT INTO testapp_zaaktype (id, name) VALUES (?, ?)")
		.bind(id)
		.bind(format!("zaaktype {}", id))
		.execute(pool)
		.await
		.unwrap();
}

async fn insert_zaak(
	pool: &SqlitePool,
	id: i64,
	zaaktype: Option<i64>,
	url: &str,
) -> Result<(), sqlx::Error> {
	sqlx::query(r#"INSERT INTO testapp_zaak (id, "_zaaktype_id", extern_zaaktype) VALUES (?, ?, ?)"#)
		.bind(id)
		.bind(zaaktype)
		.bind(url)
		.execute(pool)
		.await
		.map(|_| ())
}

async fn select_ids(pool: &SqlitePool, fragment: &SqlFragment) -> Vec<i64> {
	let sql = format!("SELECT id FROM testapp_zaak WHERE {} ORDER BY id", fragment.sql());
	let mut query = sqlx::query_scalar::<_, i64>(&sql);
	for param in fragment.params() {
		query = match param {
			SqlParam::Null => query.bind(None::<i64>),
			SqlParam::Bool(b) => query.bind(*b),
			SqlParam::Int(i) => query.bind(*i),
			SqlParam::Float(f) => query.bind(*f),
			SqlParam::Text(s) => query.bind(s.clone()),
		};
	}
	query.fetch_all(pool).await.unwrap()
}

async fn select_lookup(pool: &SqlitePool, lookup: &LookupSql) -> Vec<i64> {
	match lookup {
		LookupSql::Sql(fragment) => select_ids(pool, fragment).await,
		LookupSql::Empty => Vec::new(),
	}
}

/// zaak 1 -> local zaaktype 1, zaak 2 -> local zaaktype 2,
/// zaak 3 -> ZT_123, zaak 4 -> ZT_456
async fn populated_pool() -> SqlitePool {
	let pool = create_pool().await;
	insert_zaaktype(&pool, 1).await;
	insert_zaaktype(&pool, 2).await;
	insert_zaak(&pool, 1, Some(1), "").await.unwrap();
	insert_zaak(&pool, 2, Some(2), "").await.unwrap();
	insert_zaak(&pool, 3, None, ZT_123).await.unwrap();
	insert_zaak(&pool, 4, None, ZT_456).await.unwrap();
	pool
}

/// Table with a nullable loose fk: both columns may be empty
async fn create_nullable_pool() -> SqlitePool {
	let pool = create_pool().await;
	let constraint = LooseFkConstraint::new(
		"testapp_besluit",
		"_zaaktype",
		"extern_zaaktype",
		"_zaaktype_id",
		"extern_zaaktype",
		true,
	);
	sqlx::query(&format!(
		r#"CREATE TABLE testapp_besluit (
			id INTEGER PRIMARY KEY,
			"_zaaktype_id" INTEGER NULL REFERENCES testapp_zaaktype (id),
			extern_zaaktype TEXT NOT NULL DEFAULT '',
			{}
		)"#,
		constraint.constraint_sql()
	))
	.execute(&pool)
	.await
	.unwrap();
	pool
}

async fn insert_besluit(
	pool: &SqlitePool,
	id: i64,
	zaaktype: Option<i64>,
	url: &str,
) -> Result<(), sqlx::Error> {
	sqlx::query(r#"INSERT INTO testapp_besluit (id, "_zaaktype_id", extern_zaaktype) VALUES (?, ?, ?)"#)
		.bind(id)
		.bind(zaaktype)
		.bind(url)
		.execute(pool)
		.await
		.map(|_| ())
}

#[fixture]
fn lookup() -> LooseFkLookup {
	LooseFkLookup::for_field(&zaak_model(), "zaaktype").unwrap()
}

#[rstest]
#[tokio::test]
async fn test_constraint_enforces_exactly_one_column() {
	let pool = create_pool().await;
	insert_zaaktype(&pool, 1).await;

	assert!(insert_zaak(&pool, 1, Some(1), "").await.is_ok());
	assert!(insert_zaak(&pool, 2, None, ZT_123).await.is_ok());
	assert!(insert_zaak(&pool, 3, None, "").await.is_err());
	assert!(insert_zaak(&pool, 4, Some(1), ZT_123).await.is_err());
}

#[rstest]
#[tokio::test]
async fn test_constraint_can_be_dropped_and_added() {
	let zaak = zaak_model();
	let constraint = &zaak.constraints()[0];
	let sql = constraint.create_sql("testapp_zaak");
	assert!(sql.contains("ADD CONSTRAINT testapp_zaak__zaaktype_or_extern_zaaktype_filled CHECK"));
	assert!(constraint.remove_sql("testapp_zaak").ends_with("DROP CONSTRAINT testapp_zaak__zaaktype_or_extern_zaaktype_filled"));
}

#[rstest]
#[tokio::test]
async fn test_empty_in_lookup(lookup: LooseFkLookup) {
	let pool = populated_pool().await;
	let result = lookup.is_in(Vec::<LookupValue>::new()).unwrap();

	assert_eq!(result, LookupSql::Empty);
	assert!(select_lookup(&pool, &result).await.is_empty());
}

#[rstest]
#[tokio::test]
async fn test_in_lookup_local_rows(lookup: LooseFkLookup) {
	let pool = populated_pool().await;
	let zaaktypen = Table::default();
	let first = create_zaaktype(&zaaktypen, 1, "local1");
	let second = create_zaaktype(&zaaktypen, 2, "local2");

	let one = lookup.is_in([first.clone()]).unwrap();
	assert_eq!(select_lookup(&pool, &one).await, vec![1]);

	let both = lookup.is_in([first, second]).unwrap();
	assert_eq!(select_lookup(&pool, &both).await, vec![1, 2]);
}

#[rstest]
#[tokio::test]
async fn test_in_lookup_urls(lookup: LooseFkLookup) {
	let pool = populated_pool().await;

	let one = lookup.is_in([ZT_123]).unwrap();
	assert_eq!(select_lookup(&pool, &one).await, vec![3]);

	let both = lookup.is_in([ZT_123, ZT_456]).unwrap();
	assert_eq!(select_lookup(&pool, &both).await, vec![3, 4]);
}

#[rstest]
#[tokio::test]
async fn test_in_lookup_mixed_local_remote(lookup: LooseFkLookup) {
	let pool = populated_pool().await;
	let zaaktypen = Table::default();
	let local = create_zaaktype(&zaaktypen, 1, "local");

	let result = lookup
		.is_in([LookupValue::from(ZT_123), LookupValue::from(local)])
		.unwrap();

	assert_eq!(select_lookup(&pool, &result).await, vec![1, 3]);
}

#[rstest]
#[tokio::test]
async fn test_in_lookup_subquery(lookup: LooseFkLookup) {
	let pool = populated_pool().await;
	let sub = SqlFragment::new("SELECT id FROM testapp_zaaktype WHERE id = ?", vec![SqlParam::Int(2)]);

	assert_eq!(select_ids(&pool, &lookup.in_subquery(sub)).await, vec![2]);
}

#[rstest]
#[tokio::test]
async fn test_exact_lookups(lookup: LooseFkLookup) {
	let pool = populated_pool().await;
	let zaaktypen = Table::default();
	let local = create_zaaktype(&zaaktypen, 2, "local");

	assert_eq!(select_ids(&pool, &lookup.exact(local).unwrap()).await, vec![2]);
	assert_eq!(select_ids(&pool, &lookup.exact(ZT_456).unwrap()).await, vec![4]);
	assert_eq!(select_ids(&pool, &lookup.exact(1).unwrap()).await, vec![1]);
}

#[rstest]
#[tokio::test]
async fn test_lookups_with_virtual_instance(lookup: LooseFkLookup) {
	let pool = populated_pool().await;
	let zaaktypen = Table::default();
	let loader = loader(Arc::new(StaticFetcher::default()), &zaaktypen);
	let payload = json!({"url": ZT_123, "name": "remote"});
	let instance = virtual_model_factory(&zaaktype_model(), &loader)
		.materialize(payload.as_object().cloned().unwrap(), None)
		.unwrap();

	assert_eq!(
		select_ids(&pool, &lookup.exact(instance.clone()).unwrap()).await,
		vec![3]
	);
	assert_eq!(
		select_lookup(&pool, &lookup.is_in([instance]).unwrap()).await,
		vec![3]
	);
}

#[rstest]
#[tokio::test]
async fn test_filter_resolves_local_urls(lookup: LooseFkLookup) {
	let pool = populated_pool().await;
	let zaaktypen = Table::default();
	create_zaaktype(&zaaktypen, 1, "local");
	let fetcher = Arc::new(StaticFetcher::default());
	let filter = LooseFkFilter::new(lookup, loader(fetcher.clone(), &zaaktypen));
	let local_url = format!("http://{}/zaaktypen/1/", HOST);

	let result = filter
		.filter_in(Some(HOST), &[local_url.as_str(), ZT_123])
		.await
		.unwrap();
	assert_eq!(select_lookup(&pool, &result).await, vec![1, 3]);

	let exact = filter.filter_exact(Some(HOST), &local_url).await.unwrap();
	assert_eq!(select_ids(&pool, &exact).await, vec![1]);

	// filtering never fetches remote objects
	assert_eq!(fetcher.calls(), 0);
}

#[rstest]
#[tokio::test]
async fn test_expression_in_sea_query_statement(lookup: LooseFkLookup) {
	let pool = populated_pool().await;
	let expr = lookup.is_in([ZT_123, ZT_456]).unwrap().into_expr();
	let sql = Query::select()
		.column(Alias::new("id"))
		.from(Alias::new("testapp_zaak"))
		.and_where(expr)
		.order_by(Alias::new("id"), Order::Asc)
		.to_string(SqliteQueryBuilder);

	let ids: Vec<i64> = sqlx::query_scalar(&sql).fetch_all(&pool).await.unwrap();
	assert_eq!(ids, vec![3, 4]);
}

#[rstest]
#[tokio::test]
async fn test_nullable_constraint_allows_both_empty() {
	let pool = create_nullable_pool().await;
	insert_zaaktype(&pool, 1).await;

	assert!(insert_besluit(&pool, 1, None, "").await.is_ok());
	assert!(insert_besluit(&pool, 2, Some(1), "").await.is_ok());
	assert!(insert_besluit(&pool, 3, None, ZT_123).await.is_ok());
	assert!(insert_besluit(&pool, 4, Some(1), ZT_123).await.is_err());
}

#[rstest]
#[case(LookupValue::from(Value::Null))]
#[case(LookupValue::from(LooseValue::Absent))]
#[tokio::test]
async fn test_exact_null_matches_only_empty_rows(#[case] rhs: LookupValue) {
	let pool = create_nullable_pool().await;
	insert_zaaktype(&pool, 1).await;
	insert_besluit(&pool, 1, None, "").await.unwrap();
	insert_besluit(&pool, 2, Some(1), "").await.unwrap();
	insert_besluit(&pool, 3, None, ZT_123).await.unwrap();

	let besluit = LooseFkLookup::new("testapp_besluit", "_zaaktype_id", "extern_zaaktype");
	let fragment = besluit.exact(rhs).unwrap();
	let sql = format!("SELECT id FROM testapp_besluit WHERE {} ORDER BY id", fragment.sql());
	let ids: Vec<i64> = sqlx::query_scalar(&sql).fetch_all(&pool).await.unwrap();

	assert_eq!(ids, vec![1]);
}

#[rstest]
#[tokio::test]
async fn test_exact_null_skips_remote_rows(lookup: LooseFkLookup) {
	let pool = populated_pool().await;

	assert!(select_ids(&pool, &lookup.exact(Value::Null).unwrap()).await.is_empty());
}

#[rstest]
fn test_unsaved_local_row_is_rejected(lookup: LooseFkLookup) {
	let unsaved = Arc::new(Record::new(zaaktype_model()));

	assert!(matches!(
		lookup.exact(Arc::clone(&unsaved)),
		Err(LooseFkError::TypeMismatch(_))
	));
	assert!(matches!(
		lookup.is_in([LookupValue::from(ZT_123), LookupValue::from(unsaved)]),
		Err(LooseFkError::TypeMismatch(_))
	));
}
