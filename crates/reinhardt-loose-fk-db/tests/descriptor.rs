//! Reading loose foreign keys pointing at local rows and remote resources

mod common;

use common::{HOST, StaticFetcher, Table, create_zaaktype, loader, zaak_model, zaak_object_model};
use reinhardt_loose_fk_db::{
	LooseFkDescriptor, LooseFkError, LooseValue, Record, Relation, Resolved, Value,
};
use rstest::{fixture, rstest};
use serde_json::json;
use std::sync::Arc;

const REMOTE_ZAAKTYPE: &str = "https://example.com/zaaktypen/123";

#[fixture]
fn zaaktypen() -> Table {
	Table::default()
}

#[fixture]
fn fetcher() -> Arc<StaticFetcher> {
	Arc::new(StaticFetcher::default().with(
		REMOTE_ZAAKTYPE,
		json!({"url": REMOTE_ZAAKTYPE, "name": "remote-b"}),
	))
}

fn zaaktype_descriptor(fetcher: &Arc<StaticFetcher>, zaaktypen: &Table) -> LooseFkDescriptor {
	LooseFkDescriptor::for_field(&zaak_model(), "zaaktype")
		.unwrap()
		.with_loader(loader(fetcher.clone(), zaaktypen))
}

#[rstest]
#[tokio::test]
async fn test_local_fk_returns_the_row(zaaktypen: Table, fetcher: Arc<StaticFetcher>) {
	let zaaktype = create_zaaktype(&zaaktypen, 1, "local");
	let descriptor = zaaktype_descriptor(&fetcher, &zaaktypen);
	let mut zaak = Record::new(zaak_model());
	descriptor.set(&mut zaak, Arc::clone(&zaaktype)).unwrap();

	let value = descriptor.get(&zaak, Some(HOST)).await.unwrap();

	assert_eq!(value, LooseValue::Local(zaaktype));
	assert_eq!(fetcher.calls(), 0);
}

#[rstest]
#[tokio::test]
async fn test_remote_url_returns_virtual_instance(zaaktypen: Table, fetcher: Arc<StaticFetcher>) {
	let descriptor = zaaktype_descriptor(&fetcher, &zaaktypen);
	let mut zaak = Record::new(zaak_model());
	descriptor.set(&mut zaak, REMOTE_ZAAKTYPE).unwrap();

	let value = descriptor.get(&zaak, Some(HOST)).await.unwrap();
	let instance = value.as_virtual().expect("a virtual instance");

	assert_eq!(instance.virtual_type().name(), "VirtualZaakType");
	assert_eq!(instance.get("name"), Some(&Value::Text("remote-b".to_string())));
	assert!(instance.pk().is_none());
	assert!(*instance == REMOTE_ZAAKTYPE);
	assert_eq!(instance.save(), Err(LooseFkError::ForbiddenPersist));
	assert_eq!(fetcher.calls(), 1);
}

#[rstest]
#[tokio::test]
async fn test_same_remote_url_compares_equal(zaaktypen: Table, fetcher: Arc<StaticFetcher>) {
	let descriptor = zaaktype_descriptor(&fetcher, &zaaktypen);
	let mut a = Record::new(zaak_model());
	let mut b = Record::new(zaak_model());
	descriptor.set(&mut a, REMOTE_ZAAKTYPE).unwrap();
	descriptor.set(&mut b, REMOTE_ZAAKTYPE).unwrap();

	// unresolved values compare without fetching
	assert_eq!(descriptor.raw(&a).unwrap(), descriptor.raw(&b).unwrap());
	assert_eq!(fetcher.calls(), 0);

	let resolved_a = descriptor.get(&a, Some(HOST)).await.unwrap();
	let resolved_b = descriptor.get(&b, Some(HOST)).await.unwrap();
	let calls = fetcher.calls();

	assert_eq!(resolved_a, resolved_b);
	assert_eq!(resolved_a, descriptor.raw(&b).unwrap());
	assert!(resolved_a == REMOTE_ZAAKTYPE);
	assert_eq!(fetcher.calls(), calls);
}

#[rstest]
#[tokio::test]
async fn test_local_url_resolves_to_the_row(zaaktypen: Table, fetcher: Arc<StaticFetcher>) {
	let zaaktype = create_zaaktype(&zaaktypen, 7, "local");
	let descriptor = zaaktype_descriptor(&fetcher, &zaaktypen);
	let mut zaak = Record::new(zaak_model());
	descriptor
		.set(&mut zaak, format!("http://{}/zaaktypen/7/", HOST))
		.unwrap();

	let value = descriptor.get(&zaak, Some(HOST)).await.unwrap();

	assert_eq!(value.as_record(), Some(&zaaktype));
	assert_eq!(fetcher.calls(), 0);
}

#[rstest]
#[tokio::test]
async fn test_missing_local_row(zaaktypen: Table, fetcher: Arc<StaticFetcher>) {
	let descriptor = zaaktype_descriptor(&fetcher, &zaaktypen);
	let mut zaak = Record::new(zaak_model());
	descriptor
		.set(&mut zaak, format!("http://{}/zaaktypen/404/", HOST))
		.unwrap();

	let result = descriptor.get(&zaak, Some(HOST)).await;

	assert!(matches!(result, Err(LooseFkError::NotFound(_))));
}

#[rstest]
#[tokio::test]
async fn test_unreachable_remote(zaaktypen: Table, fetcher: Arc<StaticFetcher>) {
	let descriptor = zaaktype_descriptor(&fetcher, &zaaktypen);
	let mut zaak = Record::new(zaak_model());
	descriptor
		.set(&mut zaak, "https://example.com/zaaktypen/404")
		.unwrap();

	let err = descriptor.get(&zaak, Some(HOST)).await.unwrap_err();

	assert_eq!(err.code(), "bad-url");
}

#[rstest]
#[tokio::test]
async fn test_virtual_instance_can_be_assigned(zaaktypen: Table, fetcher: Arc<StaticFetcher>) {
	let descriptor = zaaktype_descriptor(&fetcher, &zaaktypen);
	let mut source = Record::new(zaak_model());
	descriptor.set(&mut source, REMOTE_ZAAKTYPE).unwrap();
	let remote = descriptor.get(&source, Some(HOST)).await.unwrap();

	let mut target = Record::new(zaak_model());
	descriptor.set(&mut target, remote).unwrap();

	assert_eq!(
		target.get("extern_zaaktype"),
		Some(&Value::Text(REMOTE_ZAAKTYPE.to_string()))
	);
	assert!(target.validate_constraints().is_ok());
}

#[rstest]
#[tokio::test]
async fn test_chained_reference_to_local_row(zaaktypen: Table) {
	let zaaktype = create_zaaktype(&zaaktypen, 1, "test");
	let zaak_url = "https://example.com/zaken/123";
	let fetcher = Arc::new(StaticFetcher::default().with(
		zaak_url,
		json!({
			"url": zaak_url,
			"name": "test",
			"zaaktype": format!("http://{}/zaaktypen/1/", HOST),
		}),
	));
	let descriptor = LooseFkDescriptor::for_field(&zaak_object_model(), "zaak")
		.unwrap()
		.with_loader(loader(fetcher.clone(), &zaaktypen));
	let mut zaak_object = Record::new(zaak_object_model());
	descriptor.set(&mut zaak_object, zaak_url).unwrap();

	let zaak = descriptor.get(&zaak_object, Some(HOST)).await.unwrap();
	let zaak = zaak.as_virtual().expect("a remote zaak");
	let relation = zaak.related("zaaktype").await.unwrap();

	assert_eq!(relation, Relation::One(Resolved::Local(zaaktype)));
	assert_eq!(fetcher.calls(), 1);
}

#[rstest]
#[tokio::test]
async fn test_chained_reference_to_remote_resource(zaaktypen: Table) {
	let zaak_url = "https://example.com/zaken/456";
	let fetcher = Arc::new(
		StaticFetcher::default()
			.with(
				zaak_url,
				json!({"url": zaak_url, "name": "test", "zaaktype": REMOTE_ZAAKTYPE}),
			)
			.with(REMOTE_ZAAKTYPE, json!({"url": REMOTE_ZAAKTYPE, "name": "remote-b"})),
	);
	let descriptor = LooseFkDescriptor::for_field(&zaak_object_model(), "zaak")
		.unwrap()
		.with_loader(loader(fetcher.clone(), &zaaktypen));
	let mut zaak_object = Record::new(zaak_object_model());
	descriptor.set(&mut zaak_object, zaak_url).unwrap();

	let zaak = descriptor.get(&zaak_object, Some(HOST)).await.unwrap();
	let relation = zaak
		.as_virtual()
		.expect("a remote zaak")
		.related("zaaktype")
		.await
		.unwrap();
	let zaaktype = relation.one().and_then(Resolved::as_virtual).expect("a remote zaaktype");

	assert!(*zaaktype == REMOTE_ZAAKTYPE);
	assert_eq!(zaaktype.get("name"), Some(&Value::Text("remote-b".to_string())));
	assert_eq!(fetcher.calls(), 2);
}

#[rstest]
#[tokio::test]
async fn test_remote_relations_resolve_lazily(zaaktypen: Table) {
	let zaak_url = "https://example.com/zaken/1";
	let other_url = "https://example.com/zaken/2";
	let fetcher = Arc::new(
		StaticFetcher::default()
			.with(
				zaak_url,
				json!({
					"url": zaak_url,
					"name": "one",
					"_zaaktype": REMOTE_ZAAKTYPE,
					"related_zaken": [other_url],
				}),
			)
			.with(other_url, json!({"url": other_url, "name": "two"}))
			.with(REMOTE_ZAAKTYPE, json!({"url": REMOTE_ZAAKTYPE, "name": "remote-b"})),
	);
	let descriptor = LooseFkDescriptor::for_field(&zaak_object_model(), "zaak")
		.unwrap()
		.with_loader(loader(fetcher.clone(), &zaaktypen));
	let mut zaak_object = Record::new(zaak_object_model());
	descriptor.set(&mut zaak_object, zaak_url).unwrap();

	let zaak = descriptor.get(&zaak_object, Some(HOST)).await.unwrap();
	let zaak = zaak.as_virtual().expect("a remote zaak");
	assert_eq!(fetcher.calls(), 1);

	let related = zaak.related("related_zaken").await.unwrap();
	let related = related.many().expect("a list");
	assert_eq!(related.count(), 1);
	assert!(related.contains_url(other_url));
	assert_eq!(
		related.get().unwrap().get("name"),
		Some(&Value::Text("two".to_string()))
	);

	let zaaktype = zaak.related("_zaaktype").await.unwrap();
	assert_eq!(zaaktype.one().and_then(Resolved::url), Some(REMOTE_ZAAKTYPE));

	// absent relations resolve without fetching
	assert!(zaak.related("zaaktype").await.unwrap().is_none());
	assert_eq!(fetcher.calls(), 3);
}
