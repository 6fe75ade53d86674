use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{Value, json};

use replenish_events::{CreateOrderCommand, InMemoryCommandChannel};
use replenish_infra::store::{InMemoryConnector, InMemoryStore};
use replenish_infra::{BatchProcessor, ProcessorSettings, ReplenishmentStore, StoreConnector, StoreError};
use replenish_processor::app::{AppServices, build_app};
use replenish_replenishment::{Decision, DecisionEngine, ObservabilityRecord, Order, StockEvent};

/// Store whose raw-event writes take `delay`; everything else lands in `inner`.
struct SlowStore {
    inner: Arc<InMemoryStore>,
    delay: Duration,
}

#[async_trait]
impl ReplenishmentStore for SlowStore {
    async fn insert_stock_event(&self, event: &StockEvent) -> Result<(), StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.insert_stock_event(event).await
    }

    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        self.inner.insert_order(order).await
    }

    async fn insert_decision(&self, decision: &Decision) -> Result<(), StoreError> {
        self.inner.insert_decision(decision).await
    }

    async fn insert_observability(&self, record: &ObservabilityRecord) -> Result<(), StoreError> {
        self.inner.insert_observability(record).await
    }

    async fn release(&self) {
        self.inner.release().await
    }
}

struct SlowConnector(Arc<SlowStore>);

#[async_trait]
impl StoreConnector for SlowConnector {
    type Store = Arc<SlowStore>;

    async fn connect(&self) -> Result<Self::Store, StoreError> {
        Ok(self.0.clone())
    }
}

struct TestServer {
    base_url: String,
    store: Arc<InMemoryStore>,
    connector: Arc<InMemoryConnector>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-memory store and channel, ephemeral port.
        let store = InMemoryStore::arc();
        let connector = Arc::new(InMemoryConnector::new(store.clone()));
        let processor = BatchProcessor::new(
            connector.clone(),
            channel(),
            DecisionEngine::default(),
            ProcessorSettings::default(),
        );
        Self::serve(AppServices::new(Arc::new(processor)), store, connector).await
    }

    async fn spawn_slow(delay: Duration) -> Self {
        let store = InMemoryStore::arc();
        let slow = Arc::new(SlowStore {
            inner: store.clone(),
            delay,
        });
        let processor = BatchProcessor::new(
            SlowConnector(slow),
            channel(),
            DecisionEngine::default(),
            ProcessorSettings::default(),
        );
        let connector = Arc::new(InMemoryConnector::new(store.clone()));
        Self::serve(AppServices::new(Arc::new(processor)), store, connector).await
    }

    async fn serve(
        services: AppServices,
        store: Arc<InMemoryStore>,
        connector: Arc<InMemoryConnector>,
    ) -> Self {
        let app = build_app(services);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            store,
            connector,
            handle,
        }
    }

    async fn post_batch(&self, body: Value) -> reqwest::Response {
        reqwest::Client::new()
            .post(format!("{}/v1/stock-events/batch", self.base_url))
            .json(&body)
            .send()
            .await
            .unwrap()
    }
}

fn channel() -> Arc<InMemoryCommandChannel<CreateOrderCommand>> {
    Arc::new(InMemoryCommandChannel::new())
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[tokio::test]
async fn health_reports_ok() {
    let srv = TestServer::spawn().await;

    let res = reqwest::get(format!("{}/health", srv.base_url)).await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn mixed_batch_is_processed_end_to_end() {
    let srv = TestServer::spawn().await;

    let res = srv
        .post_batch(json!([
            {
                "eventId": "evt-ok",
                "hospitalId": "HOSP-01",
                "productCode": "SALINE-500",
                "currentStockUnits": 500,
                "dailyConsumptionUnits": 100,
                "daysOfSupply": 5.0
            },
            "{not json",
            r#"{"eventId":"evt-crit","hospitalId":"HOSP-02","productCode":"GLOVES-M","currentStockUnits":5,"dailyConsumptionUnits":10,"daysOfSupply":0.5}"#
        ]))
        .await;

    assert_eq!(res.status(), StatusCode::OK);
    let report: Value = res.json().await.unwrap();
    assert_eq!(report["store_connected"], true);
    assert_eq!(report["summary"]["total"], 3);
    assert_eq!(report["summary"]["abandoned"], 1);
    assert_eq!(report["summary"]["order_decisions"], 1);
    assert_eq!(report["events"][1]["stage"], "ABANDONED");
    assert_eq!(report["events"][1]["abandon_reason"]["kind"], "decode");
    assert_eq!(report["events"][2]["decision"]["verdict"], "order");
    assert_eq!(report["events"][2]["decision"]["priority"], "URGENT");

    let orders = srv.store.orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(report["events"][2]["order_id"], orders[0].id.as_str());
    assert_eq!(srv.store.observability_records().len(), 3);
}

#[tokio::test]
async fn unreachable_store_still_returns_a_report() {
    let srv = TestServer::spawn().await;
    srv.connector.set_reachable(false);

    let res = srv
        .post_batch(json!([
            {"hospitalId": "HOSP-09", "productCode": "MASK-N95", "daysOfSupply": 0.2}
        ]))
        .await;

    assert_eq!(res.status(), StatusCode::OK);
    let report: Value = res.json().await.unwrap();
    assert_eq!(report["store_connected"], false);
    assert_eq!(report["connection_error"]["kind"], "connection_setup");
    assert_eq!(report["events"][0]["stage"], "OBSERVED");
    assert!(srv.store.stock_events().is_empty());
}

#[tokio::test]
async fn non_array_body_is_rejected() {
    let srv = TestServer::spawn().await;

    let res = srv.post_batch(json!({"hospitalId": "HOSP-01"})).await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_batch");
    assert_eq!(srv.connector.connect_count(), 0);
}

#[tokio::test]
async fn empty_batch_is_accepted() {
    let srv = TestServer::spawn().await;

    let res = srv.post_batch(json!([])).await;

    assert_eq!(res.status(), StatusCode::OK);
    let report: Value = res.json().await.unwrap();
    assert_eq!(report["summary"]["total"], 0);
    assert_eq!(srv.store.release_count(), 1);
}

#[tokio::test]
async fn batch_completes_and_releases_after_client_disconnects() {
    let srv = TestServer::spawn_slow(Duration::from_millis(100)).await;

    let events: Vec<Value> = (0..10)
        .map(|i| json!({"eventId": format!("evt-{i}"), "hospitalId": "HOSP-01", "productCode": "P1", "daysOfSupply": 5.0}))
        .collect();

    let res = reqwest::Client::builder()
        .timeout(Duration::from_millis(250))
        .build()
        .unwrap()
        .post(format!("{}/v1/stock-events/batch", srv.base_url))
        .json(&events)
        .send()
        .await;
    assert!(res.is_err(), "client should give up before the batch ends");

    for _ in 0..100 {
        if srv.store.release_count() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(srv.store.release_count(), 1);
    assert_eq!(srv.store.stock_events().len(), 10);
    assert_eq!(srv.store.decisions().len(), 10);
    assert_eq!(srv.store.observability_records().len(), 10);
}
