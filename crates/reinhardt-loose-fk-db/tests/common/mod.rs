//! Shared models and in-memory resources for the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::RwLock;
use reinhardt_loose_fk_db::{
	Fetch, FieldMeta, JsonObject, Loader, LooseFkError, LooseFkField, LooseFkResult, ModelMeta,
	Record, Value, register_model,
};
use reinhardt_loose_fk_urls::{
	LocatorError, ResourceHandler, ResourceLocator, ResourceRouter, UrlClassifier,
};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const HOST: &str = "testserver.com";

pub fn zaaktype_model() -> Arc<ModelMeta> {
	register_model(ModelMeta::new("ZaakType", "testapp_zaaktype").field(FieldMeta::char("name", 50)))
}

pub fn zaak_model() -> Arc<ModelMeta> {
	zaaktype_model();
	register_model(
		ModelMeta::new("Zaak", "testapp_zaak")
			.field(FieldMeta::char("name", 50))
			.field(FieldMeta::foreign_key("_zaaktype", "ZaakType").null(true).blank(true))
			.field(FieldMeta::url("extern_zaaktype").blank(true))
			.field(FieldMeta::many_to_many("related_zaken", "Zaak"))
			.loose_fk(LooseFkField::new("zaaktype", "_zaaktype", "extern_zaaktype")),
	)
}

pub fn zaak_object_model() -> Arc<ModelMeta> {
	zaak_model();
	register_model(
		ModelMeta::new("ZaakObject", "testapp_zaakobject")
			.field(FieldMeta::char("name", 50))
			.field(FieldMeta::foreign_key("_zaak", "Zaak").null(true).blank(true))
			.field(FieldMeta::url("extern_zaak").blank(true))
			.loose_fk(LooseFkField::new("zaak", "_zaak", "extern_zaak")),
	)
}

/// Rows of one table, queryable through the resource router
#[derive(Clone, Default)]
pub struct Table {
	rows: Arc<RwLock<Vec<Arc<Record>>>>,
}

impl Table {
	pub fn insert(&self, record: Record) -> Arc<Record> {
		let record = Arc::new(record);
		self.rows.write().push(Arc::clone(&record));
		record
	}
}

fn lookup_text(value: Option<&Value>) -> Option<String> {
	match value? {
		Value::Int(i) => Some(i.to_string()),
		Value::Text(s) => Some(s.clone()),
		_ => None,
	}
}

#[async_trait]
impl ResourceHandler<Arc<Record>> for Table {
	async fn query(&self, field: &str, value: &str) -> Result<Vec<Arc<Record>>, LocatorError> {
		Ok(self
			.rows
			.read()
			.iter()
			.filter(|row| {
				let stored = if field == "pk" { row.pk() } else { row.get(field) };
				lookup_text(stored).as_deref() == Some(value)
			})
			.cloned()
			.collect())
	}
}

/// Create and store a zaaktype
pub fn create_zaaktype(table: &Table, pk: i64, name: &str) -> Arc<Record> {
	let record = Record::new(zaaktype_model())
		.with("id", pk)
		.and_then(|r| r.with("name", name))
		.expect("valid zaaktype");
	table.insert(record)
}

pub fn router(zaaktypen: &Table) -> Arc<ResourceRouter<Arc<Record>>> {
	let mut router = ResourceRouter::new();
	router
		.register("zaaktypen", zaaktypen.clone())
		.expect("valid route");
	Arc::new(router)
}

/// Fetcher answering from a fixed set of payloads, counting requests
#[derive(Default)]
pub struct StaticFetcher {
	responses: RwLock<HashMap<String, JsonValue>>,
	calls: AtomicUsize,
}

impl StaticFetcher {
	pub fn with(self, url: &str, payload: JsonValue) -> Self {
		self.responses.write().insert(url.to_string(), payload);
		self
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl Fetch for StaticFetcher {
	async fn fetch(&self, url: &str) -> LooseFkResult<JsonObject> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		match self.responses.read().get(url) {
			Some(JsonValue::Object(object)) => Ok(object.clone()),
			Some(_) => Err(LooseFkError::FetchJson {
				url: url.to_string(),
				reason: "expected a JSON object".to_string(),
			}),
			None => Err(LooseFkError::Fetch {
				url: url.to_string(),
				reason: "status 404 Not Found".to_string(),
			}),
		}
	}
}

/// Loader treating `HOST` as this service
pub fn loader(fetcher: Arc<dyn Fetch>, zaaktypen: &Table) -> Arc<Loader> {
	Arc::new(
		Loader::new(fetcher, UrlClassifier::new(Vec::new(), vec![HOST.to_string()]))
			.with_locator(ResourceLocator::new(router(zaaktypen))),
	)
}
