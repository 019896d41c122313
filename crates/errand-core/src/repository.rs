//! Order repository.
//!
//! Orders live in six buckets, one per service type, each stored under its own
//! key as a JSON array with the most recent order first. Reads are permissive:
//! a missing or malformed bucket reads as empty, and records that do not parse
//! as orders are hidden from callers but kept verbatim in place, so writing a
//! bucket back never drops them. Mutations of a single order run under a
//! per-bucket lock and re-read the bucket inside it, so concurrent writers
//! never lose updates.

use crate::clock::Clock;
use errand_storage::{StorageError, StorageService};
use errand_types::{Order, OrderStatus, ServiceType, StorageKey, MAX_WINDOW_SECONDS};
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// Errors that can occur while writing orders.
#[derive(Debug, Error)]
pub enum StoreError {
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
	#[error("Order {0} already exists")]
	DuplicateId(u64),
	#[error("Order {order_id} does not belong in bucket {bucket}")]
	WrongBucket { order_id: u64, bucket: &'static str },
}

/// Decision returned by an update closure.
pub enum Mutation<T> {
	/// Persist the modified order.
	Commit(T),
	/// Leave the stored order untouched.
	Abort(T),
}

/// One stored record: a parsed order, or JSON that could not be read as one.
#[derive(Serialize)]
#[serde(untagged)]
enum Record {
	Order(Order),
	Unreadable(Value),
}

impl Record {
	fn id(&self) -> Option<u64> {
		match self {
			Record::Order(order) => Some(order.id),
			Record::Unreadable(value) => value.get("id").and_then(Value::as_u64),
		}
	}
}

/// A bucket as read from storage.
#[derive(Default)]
struct Bucket {
	records: Vec<Record>,
	/// Some legacy record was given a deadline while reading.
	migrated: bool,
}

impl Bucket {
	fn into_orders(self) -> Vec<Order> {
		self.records
			.into_iter()
			.filter_map(|record| match record {
				Record::Order(order) => Some(order),
				Record::Unreadable(_) => None,
			})
			.collect()
	}

	fn find_mut(&mut self, id: u64) -> Option<&mut Order> {
		self.records.iter_mut().find_map(|record| match record {
			Record::Order(order) if order.id == id => Some(order),
			_ => None,
		})
	}

	fn ids(&self) -> impl Iterator<Item = u64> + '_ {
		self.records.iter().filter_map(Record::id)
	}

	fn unreadable_count(&self) -> usize {
		self.records
			.iter()
			.filter(|record| matches!(record, Record::Unreadable(_)))
			.count()
	}
}

/// Repository of orders over the key-value store.
pub struct OrderStore {
	storage: Arc<StorageService>,
	clock: Arc<dyn Clock>,
	/// Window given to legacy pending records that carry no countdown.
	legacy_window: u64,
	locks: HashMap<StorageKey, Mutex<()>>,
	/// Serializes writes that must see ids across every bucket. Always taken
	/// before any bucket lock.
	create_lock: Mutex<()>,
}

impl OrderStore {
	pub fn new(storage: Arc<StorageService>, clock: Arc<dyn Clock>, legacy_window: u64) -> Self {
		Self {
			storage,
			clock,
			legacy_window,
			locks: StorageKey::all().map(|key| (key, Mutex::new(()))).collect(),
			create_lock: Mutex::new(()),
		}
	}

	fn lock_for(&self, key: StorageKey) -> &Mutex<()> {
		// Every key is inserted in `new`
		&self.locks[&key]
	}

	/// Reads one bucket, never failing.
	///
	/// Legacy records without a deadline are given one and written back.
	pub async fn load_bucket(&self, service_type: ServiceType) -> Vec<Order> {
		let key = StorageKey::for_service(service_type);
		let _guard = self.lock_for(key).lock().await;
		match self.read_bucket(service_type).await {
			Ok(bucket) => {
				if bucket.migrated {
					if let Err(e) = self.write_bucket(key, &bucket).await {
						tracing::warn!(bucket = key.as_str(), error = %e, "Failed to persist migrated deadlines");
					}
				}
				bucket.into_orders()
			},
			Err(e) => {
				tracing::warn!(bucket = key.as_str(), error = %e, "Failed to read bucket, treating as empty");
				Vec::new()
			},
		}
	}

	/// Replaces the orders of a bucket.
	///
	/// Every order must belong to the bucket's service type and carry an id
	/// no other order uses. Unreadable records already in the bucket are
	/// kept after the new orders.
	pub async fn save_bucket(
		&self,
		service_type: ServiceType,
		orders: &[Order],
	) -> Result<(), StoreError> {
		let key = StorageKey::for_service(service_type);
		let mut seen = HashSet::new();
		for order in orders {
			if order.service_type() != service_type {
				return Err(StoreError::WrongBucket {
					order_id: order.id,
					bucket: key.as_str(),
				});
			}
			if !seen.insert(order.id) {
				return Err(StoreError::DuplicateId(order.id));
			}
		}

		let _create = self.create_lock.lock().await;
		for other in ServiceType::all().filter(|t| *t != service_type) {
			let other_key = StorageKey::for_service(other);
			let _guard = self.lock_for(other_key).lock().await;
			let bucket = self.read_bucket(other).await?;
			if let Some(id) = bucket.ids().find(|id| seen.contains(id)) {
				return Err(StoreError::DuplicateId(id));
			};
		}

		let _guard = self.lock_for(key).lock().await;
		let existing = self.read_bucket(service_type).await?;
		let mut records: Vec<Record> = orders.iter().cloned().map(Record::Order).collect();
		for record in existing.records {
			if let Record::Unreadable(_) = record {
				if let Some(id) = record.id().filter(|id| seen.contains(id)) {
					return Err(StoreError::DuplicateId(id));
				}
				records.push(record);
			}
		}
		self.write_bucket(
			key,
			&Bucket {
				records,
				migrated: false,
			},
		)
		.await
	}

	/// Inserts an order at the head of its bucket.
	pub async fn append_order(&self, order: Order) -> Result<(), StoreError> {
		let _create = self.create_lock.lock().await;
		if self.taken_ids().await?.contains(&order.id) {
			return Err(StoreError::DuplicateId(order.id));
		}
		self.insert_head(order).await
	}

	/// Builds an order with a fresh id and appends it.
	///
	/// The id is unique across every bucket; `build` receives it and returns
	/// the finished order.
	pub async fn create_order<F>(&self, build: F) -> Result<Order, StoreError>
	where
		F: FnOnce(u64) -> Order,
	{
		let _create = self.create_lock.lock().await;
		let taken = self.taken_ids().await?;
		let id = crate::ids::next_order_id(self.clock.now(), &taken);
		let order = build(id);
		self.insert_head(order.clone()).await?;
		Ok(order)
	}

	/// Scans every bucket for an order.
	pub async fn find_by_id(&self, id: u64) -> Option<Order> {
		for service_type in ServiceType::all() {
			if let Some(order) = self
				.load_bucket(service_type)
				.await
				.into_iter()
				.find(|o| o.id == id)
			{
				return Some(order);
			}
		}
		None
	}

	/// All orders, bucket by bucket.
	pub async fn load_all(&self) -> Vec<Order> {
		let mut all = Vec::new();
		for service_type in ServiceType::all() {
			all.extend(self.load_bucket(service_type).await);
		}
		all
	}

	/// Atomically reads, modifies and writes back one order.
	///
	/// Returns `Ok(None)` when no bucket holds the order. The bucket is only
	/// written when `update` returns [`Mutation::Commit`].
	pub async fn update_order_with<F, T>(&self, id: u64, update: F) -> Result<Option<T>, StoreError>
	where
		F: FnOnce(&mut Order) -> Mutation<T>,
	{
		for service_type in ServiceType::all() {
			let key = StorageKey::for_service(service_type);
			let _guard = self.lock_for(key).lock().await;
			let mut bucket = self.read_bucket(service_type).await?;
			let Some(order) = bucket.find_mut(id) else {
				continue;
			};

			return match update(order) {
				Mutation::Commit(result) => {
					self.write_bucket(key, &bucket).await?;
					Ok(Some(result))
				},
				Mutation::Abort(result) => Ok(Some(result)),
			};
		}
		Ok(None)
	}

	/// Ids of every record in every bucket, unreadable ones included.
	///
	/// Callers hold `create_lock`.
	async fn taken_ids(&self) -> Result<HashSet<u64>, StoreError> {
		let mut taken = HashSet::new();
		for service_type in ServiceType::all() {
			let key = StorageKey::for_service(service_type);
			let _guard = self.lock_for(key).lock().await;
			taken.extend(self.read_bucket(service_type).await?.ids());
		}
		Ok(taken)
	}

	/// Callers hold `create_lock` and have checked the id.
	async fn insert_head(&self, order: Order) -> Result<(), StoreError> {
		let key = StorageKey::for_service(order.service_type());
		let _guard = self.lock_for(key).lock().await;
		let mut bucket = self.read_bucket(order.service_type()).await?;
		bucket.records.insert(0, Record::Order(order));
		self.write_bucket(key, &bucket).await
	}

	/// Reads and parses a bucket. Only backend failures are errors.
	async fn read_bucket(&self, service_type: ServiceType) -> Result<Bucket, StorageError> {
		let key = StorageKey::for_service(service_type);
		let raw: Value = match self.storage.retrieve(key.as_str()).await {
			Ok(value) => value,
			Err(StorageError::NotFound) => return Ok(Bucket::default()),
			Err(StorageError::Serialization(e)) => {
				tracing::warn!(bucket = key.as_str(), error = %e, "Malformed bucket, treating as empty");
				return Ok(Bucket::default());
			},
			Err(e) => return Err(e),
		};

		let Value::Array(items) = raw else {
			tracing::warn!(bucket = key.as_str(), "Bucket is not an array, treating as empty");
			return Ok(Bucket::default());
		};

		let now = self.clock.now();
		let mut bucket = Bucket {
			records: Vec::with_capacity(items.len()),
			migrated: false,
		};
		for item in items {
			let Some(mut order) = self.parse_record(service_type, &item) else {
				bucket.records.push(Record::Unreadable(item));
				continue;
			};

			if order.deadline.is_none() && order.status.is_active() {
				let window = match (order.countdown, order.status) {
					(0, OrderStatus::Pending) => self.legacy_window,
					(countdown, _) => countdown,
				};
				if window > MAX_WINDOW_SECONDS {
					tracing::warn!(
						bucket = key.as_str(),
						order_id = order.id,
						countdown = window,
						"Stored countdown out of range, clamping"
					);
				}
				if window > 0 {
					order.set_window(now, window);
					bucket.migrated = true;
				}
			}
			bucket.records.push(Record::Order(order));
		}

		let unreadable = bucket.unreadable_count();
		if unreadable > 0 {
			tracing::warn!(bucket = key.as_str(), count = unreadable, "Keeping unreadable order records as is");
		}
		Ok(bucket)
	}

	/// Parses one stored record, filling fields older records omit.
	fn parse_record(&self, service_type: ServiceType, item: &Value) -> Option<Order> {
		let mut object = item.as_object()?.clone();
		object
			.entry("serviceType")
			.or_insert_with(|| Value::from(service_type.as_str()));
		if !object.contains_key("updatedAt") {
			if let Some(created) = object
				.get("createdAt")
				.or_else(|| object.get("createTime"))
				.cloned()
			{
				object.insert("updatedAt".into(), created);
			}
		}

		serde_json::from_value(Value::Object(object))
			.map_err(|e| {
				tracing::debug!(bucket = StorageKey::for_service(service_type).as_str(), error = %e, "Unreadable order record");
			})
			.ok()
	}

	async fn write_bucket(&self, key: StorageKey, bucket: &Bucket) -> Result<(), StoreError> {
		self.storage.store(key.as_str(), &bucket.records).await?;
		tracing::debug!(
			bucket = key.as_str(),
			count = bucket.records.len(),
			"Saved bucket"
		);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::clock::ManualClock;
	use chrono::{TimeZone, Utc};
	use errand_storage::implementations::memory::MemoryStorage;
	use errand_types::{PayStatus, ServiceDetails};
	use rust_decimal::Decimal;

	fn setup() -> (OrderStore, Arc<StorageService>, Arc<ManualClock>) {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let clock = Arc::new(ManualClock::new(
			Utc.with_ymd_and_hms(2024, 5, 20, 10, 0, 0).unwrap(),
		));
		let store = OrderStore::new(storage.clone(), clock.clone(), 600);
		(store, storage, clock)
	}

	fn order(id: u64, service_type: ServiceType, publisher: &str) -> Order {
		let now = Utc.with_ymd_and_hms(2024, 5, 20, 10, 0, 0).unwrap();
		let mut order = Order {
			id,
			order_no: crate::ids::order_no(service_type, id),
			service_name: service_type.default_service_name().into(),
			price: Decimal::from(3),
			status: OrderStatus::Pending,
			pay_status: PayStatus::Paid,
			publisher_id: publisher.into(),
			publisher_name: publisher.into(),
			acceptor_id: None,
			acceptor_name: None,
			countdown: 0,
			deadline: None,
			accept_deadline: None,
			created_at: now,
			updated_at: now,
			accepted_at: None,
			completed_at: None,
			canceled_at: None,
			details: ServiceDetails::empty(service_type),
		};
		order.set_window(now, 600);
		order
	}

	#[tokio::test]
	async fn test_absent_bucket_is_empty() {
		let (store, _, _) = setup();
		assert!(store.load_bucket(ServiceType::Express).await.is_empty());
		assert!(store.find_by_id(1).await.is_none());
	}

	#[tokio::test]
	async fn test_malformed_bucket_is_empty() {
		let (store, storage, _) = setup();
		storage.store("takeoutOrders", &"not a list").await.unwrap();
		assert!(store.load_bucket(ServiceType::Takeout).await.is_empty());
	}

	#[tokio::test]
	async fn test_malformed_records_are_skipped() {
		let (store, storage, _) = setup();
		let good = serde_json::to_value(order(1, ServiceType::Other, "A")).unwrap();
		storage
			.store("otherOrders", &serde_json::json!([good, {"id": "oops"}, 17]))
			.await
			.unwrap();
		let orders = store.load_bucket(ServiceType::Other).await;
		assert_eq!(orders.len(), 1);
		assert_eq!(orders[0].id, 1);

		// Writing the bucket keeps the records it could not read
		store.append_order(order(2, ServiceType::Other, "A")).await.unwrap();
		let raw: Vec<Value> = storage.retrieve("otherOrders").await.unwrap();
		assert_eq!(raw.len(), 4);
		assert_eq!(raw[0]["id"], 2);
		assert_eq!(raw[1]["id"], 1);
		assert_eq!(raw[2], serde_json::json!({"id": "oops"}));
		assert_eq!(raw[3], serde_json::json!(17));
	}

	#[tokio::test]
	async fn test_app_records_survive_a_write() {
		let (store, storage, clock) = setup();
		storage
			.store(
				"expressOrders",
				&serde_json::json!([{
					"id": 1716172200000u64,
					"orderNo": "DD1716172200000",
					"serviceName": "代取快递",
					"serviceType": "express",
					"createTime": "2024/5/20 10:30:00",
					"price": 2.5,
					"status": "pending",
					"payStatus": "paid",
					"publisherId": "A",
					"publisherName": "Alice",
					"acceptorId": null,
					"pickupAddress": "东门驿站",
					"pickupCode": "3-2-1108",
					"weight": "small",
					"countdown": 600,
					"acceptDeadline": "2024/5/20 10:40:00"
				}, {"id": 9, "status": 42}]),
			)
			.await
			.unwrap();

		let orders = store.load_bucket(ServiceType::Express).await;
		assert_eq!(orders.len(), 1);
		let legacy = &orders[0];
		assert_eq!(legacy.created_at, Utc.with_ymd_and_hms(2024, 5, 20, 2, 30, 0).unwrap());
		assert_eq!(legacy.updated_at, legacy.created_at);
		assert_eq!(legacy.price, Decimal::new(25, 1));
		assert_eq!(legacy.remaining_at(clock.now()), 600);

		store.append_order(order(2, ServiceType::Express, "B")).await.unwrap();
		let raw: Vec<Value> = storage.retrieve("expressOrders").await.unwrap();
		let ids: Vec<u64> = raw.iter().filter_map(|r| r["id"].as_u64()).collect();
		assert_eq!(ids, vec![2, 1716172200000, 9]);
		assert_eq!(raw[2], serde_json::json!({"id": 9, "status": 42}));
		assert_eq!(raw[1]["pickupCode"], "3-2-1108");

		// Ids held by unreadable records are still taken
		let dup = store.append_order(order(9, ServiceType::Takeout, "B")).await;
		assert!(matches!(dup, Err(StoreError::DuplicateId(9))));
	}

	#[tokio::test]
	async fn test_huge_stored_countdown_is_clamped() {
		let (store, storage, _) = setup();
		storage
			.store(
				"takeoutOrders",
				&serde_json::json!([{
					"id": 5,
					"orderNo": "WM5",
					"status": "pending",
					"publisherId": "A",
					"countdown": 10000000000000u64,
					"createTime": "2024/5/20 09:00:00"
				}]),
			)
			.await
			.unwrap();

		let orders = store.load_bucket(ServiceType::Takeout).await;
		assert_eq!(orders.len(), 1);
		assert_eq!(orders[0].countdown, MAX_WINDOW_SECONDS);
		assert!(orders[0].deadline.is_some());
	}

	#[tokio::test]
	async fn test_append_is_most_recent_first() {
		let (store, _, _) = setup();
		store.append_order(order(1, ServiceType::Express, "A")).await.unwrap();
		store.append_order(order(2, ServiceType::Express, "A")).await.unwrap();
		let ids: Vec<u64> = store
			.load_bucket(ServiceType::Express)
			.await
			.iter()
			.map(|o| o.id)
			.collect();
		assert_eq!(ids, vec![2, 1]);

		let dup = store.append_order(order(1, ServiceType::Express, "A")).await;
		assert!(matches!(dup, Err(StoreError::DuplicateId(1))));
	}

	#[tokio::test]
	async fn test_find_by_id_scans_all_buckets() {
		let (store, _, _) = setup();
		store.append_order(order(1, ServiceType::Express, "A")).await.unwrap();
		store.append_order(order(2, ServiceType::CourseBrush, "B")).await.unwrap();
		let found = store.find_by_id(2).await.unwrap();
		assert_eq!(found.service_type(), ServiceType::CourseBrush);
		assert_eq!(store.load_all().await.len(), 2);
	}

	#[tokio::test]
	async fn test_save_bucket_overwrites() {
		let (store, _, _) = setup();
		store.append_order(order(1, ServiceType::Takeout, "A")).await.unwrap();
		store
			.save_bucket(ServiceType::Takeout, &[order(5, ServiceType::Takeout, "A")])
			.await
			.unwrap();
		let orders = store.load_bucket(ServiceType::Takeout).await;
		assert_eq!(orders.len(), 1);
		assert_eq!(orders[0].id, 5);
	}

	#[tokio::test]
	async fn test_save_bucket_checks_orders() {
		let (store, storage, _) = setup();
		store.append_order(order(1, ServiceType::Express, "A")).await.unwrap();
		storage
			.store("takeoutOrders", &serde_json::json!([{"id": 7}]))
			.await
			.unwrap();

		let wrong = store
			.save_bucket(ServiceType::Takeout, &[order(2, ServiceType::Express, "A")])
			.await;
		assert!(matches!(wrong, Err(StoreError::WrongBucket { order_id: 2, .. })));

		let elsewhere = store
			.save_bucket(ServiceType::Takeout, &[order(1, ServiceType::Takeout, "A")])
			.await;
		assert!(matches!(elsewhere, Err(StoreError::DuplicateId(1))));

		let twice = store
			.save_bucket(
				ServiceType::Takeout,
				&[order(3, ServiceType::Takeout, "A"), order(3, ServiceType::Takeout, "A")],
			)
			.await;
		assert!(matches!(twice, Err(StoreError::DuplicateId(3))));

		let clash = store
			.save_bucket(ServiceType::Takeout, &[order(7, ServiceType::Takeout, "A")])
			.await;
		assert!(matches!(clash, Err(StoreError::DuplicateId(7))));

		// Nothing was written by the rejected calls
		assert!(store.load_bucket(ServiceType::Takeout).await.is_empty());
		assert_eq!(store.find_by_id(1).await.unwrap().service_type(), ServiceType::Express);

		store
			.save_bucket(ServiceType::Takeout, &[order(3, ServiceType::Takeout, "A")])
			.await
			.unwrap();
		let raw: Vec<Value> = storage.retrieve("takeoutOrders").await.unwrap();
		assert_eq!(raw.len(), 2);
		assert_eq!(raw[0]["id"], 3);
		assert_eq!(raw[1], serde_json::json!({"id": 7}));
	}

	#[tokio::test]
	async fn test_update_commit_and_abort() {
		let (store, _, _) = setup();
		store.append_order(order(1, ServiceType::Express, "A")).await.unwrap();

		let aborted = store
			.update_order_with(1, |o| {
				o.status = OrderStatus::Canceled;
				Mutation::Abort(())
			})
			.await
			.unwrap();
		assert!(aborted.is_some());
		assert_eq!(store.find_by_id(1).await.unwrap().status, OrderStatus::Pending);

		store
			.update_order_with(1, |o| {
				o.status = OrderStatus::Canceled;
				Mutation::Commit(())
			})
			.await
			.unwrap();
		assert_eq!(store.find_by_id(1).await.unwrap().status, OrderStatus::Canceled);

		let missing = store
			.update_order_with(99, |_| Mutation::Commit(()))
			.await
			.unwrap();
		assert!(missing.is_none());
	}

	#[tokio::test]
	async fn test_concurrent_updates_are_not_lost() {
		let (store, _, _) = setup();
		let store = Arc::new(store);
		store.append_order(order(1, ServiceType::Express, "A")).await.unwrap();
		store.append_order(order(2, ServiceType::Express, "A")).await.unwrap();

		let a = {
			let store = store.clone();
			tokio::spawn(async move {
				store
					.update_order_with(1, |o| {
						o.status = OrderStatus::Canceled;
						Mutation::Commit(())
					})
					.await
			})
		};
		let b = {
			let store = store.clone();
			tokio::spawn(async move {
				store
					.update_order_with(2, |o| {
						o.status = OrderStatus::Expired;
						Mutation::Commit(())
					})
					.await
			})
		};
		a.await.unwrap().unwrap();
		b.await.unwrap().unwrap();

		assert_eq!(store.find_by_id(1).await.unwrap().status, OrderStatus::Canceled);
		assert_eq!(store.find_by_id(2).await.unwrap().status, OrderStatus::Expired);
	}

	#[tokio::test]
	async fn test_legacy_records_get_a_deadline() {
		let (store, storage, clock) = setup();
		storage
			.store(
				"expressOrders",
				&serde_json::json!([{
					"id": 3,
					"orderNo": "DD3",
					"status": "pending",
					"publisherId": "A",
					"countdown": 120,
					"createTime": "2024/5/20 17:00:00"
				}, {
					"id": 4,
					"orderNo": "DD4",
					"status": "pending",
					"publisherId": "A",
					"createdAt": "2024-05-20T09:00:00Z",
					"updatedAt": "2024-05-20T09:00:00Z"
				}]),
			)
			.await
			.unwrap();

		let orders = store.load_bucket(ServiceType::Express).await;
		assert_eq!(orders[0].service_type(), ServiceType::Express);
		assert_eq!(orders[0].created_at, Utc.with_ymd_and_hms(2024, 5, 20, 9, 0, 0).unwrap());
		assert_eq!(orders[0].remaining_at(clock.now()), 120);
		assert_eq!(orders[1].remaining_at(clock.now()), 600);

		// The deadline was persisted, so time keeps counting on later reads
		clock.advance(20);
		let again = store.find_by_id(3).await.unwrap();
		assert_eq!(again.remaining_at(clock.now()), 100);
	}

	#[tokio::test]
	async fn test_create_order_assigns_unique_ids() {
		let (store, _, _) = setup();
		let first = store
			.create_order(|id| order(id, ServiceType::Express, "A"))
			.await
			.unwrap();
		let second = store
			.create_order(|id| order(id, ServiceType::Takeout, "A"))
			.await
			.unwrap();
		assert_ne!(first.id, second.id);
		assert_eq!(second.id, first.id + 1);
	}
}
