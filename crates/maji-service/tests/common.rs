//! Common test utilities for maji integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum_test::TestServer;
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use maji_core::{CheckoutRequestId, MeterId, PaymentRequest, Tariff};
use maji_service::{create_router, AppState, MpesaConfig, ServiceConfig};
use maji_store::{MemoryStore, Store};

/// Bearer token the mocked token endpoint hands out.
pub const TEST_ACCESS_TOKEN: &str = "test-access-token";

/// Shortcode used by the test M-Pesa configuration.
pub const TEST_SHORTCODE: &str = "174379";

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// The store behind the server, for seeding and inspection.
    pub store: Arc<MemoryStore>,
}

impl TestHarness {
    /// Create a harness without M-Pesa credentials.
    pub fn new() -> Self {
        Self::with_config(base_config())
    }

    /// Create a harness whose M-Pesa client talks to `base_url`.
    pub fn with_mpesa(base_url: &str) -> Self {
        Self::with_mpesa_timeout(base_url, Duration::from_secs(5))
    }

    /// Create a harness with an explicit M-Pesa timeout.
    pub fn with_mpesa_timeout(base_url: &str, timeout: Duration) -> Self {
        let mut config = base_config();
        config.mpesa = Some(mpesa_config(base_url, timeout));
        Self::with_config(config)
    }

    /// Create a harness with a custom tariff.
    pub fn with_tariff(tariff: Tariff) -> Self {
        let mut config = base_config();
        config.tariff = tariff;
        Self::with_config(config)
    }

    /// Create a harness from a full configuration.
    pub fn with_config(config: ServiceConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(store.clone(), config);
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self { server, store }
    }

    /// Store a pending payment as if an STK push had been accepted.
    pub fn seed_pending(&self, checkout_request_id: &str, meter: &str, amount: f64) {
        self.store
            .insert_payment(&PaymentRequest::pending(
                CheckoutRequestId::new(checkout_request_id).unwrap(),
                format!("merchant-{checkout_request_id}"),
                None,
                "254712345678".into(),
                amount,
                MeterId::new(meter).unwrap(),
            ))
            .expect("Failed to seed payment");
    }

    /// Post an STK result to the callback URL and check the acknowledgment.
    pub async fn deliver_callback(&self, body: &Value) {
        let response = self.server.post("/webhooks/mpesa").json(body).await;
        response.assert_status_ok();
        let ack: Value = response.json();
        assert_eq!(ack["ResultCode"], 0);
    }

    /// Seed a pending payment and settle it successfully.
    pub async fn fund_meter(&self, checkout_request_id: &str, meter: &str, amount: f64) {
        self.seed_pending(checkout_request_id, meter, amount);
        self.deliver_callback(&success_callback(checkout_request_id, Some(amount)))
            .await;
    }

    /// Fetch a payment from the store.
    pub fn payment(&self, checkout_request_id: &str) -> Option<PaymentRequest> {
        self.store
            .get_payment(&CheckoutRequestId::new(checkout_request_id).unwrap())
            .unwrap()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration with defaults and no M-Pesa.
pub fn base_config() -> ServiceConfig {
    ServiceConfig {
        listen_addr: "127.0.0.1:0".into(),
        ..ServiceConfig::default()
    }
}

/// M-Pesa settings pointing at a mock server.
pub fn mpesa_config(base_url: &str, timeout: Duration) -> MpesaConfig {
    MpesaConfig {
        base_url: base_url.trim_end_matches('/').to_string(),
        consumer_key: "test-consumer-key".into(),
        consumer_secret: "test-consumer-secret".into(),
        shortcode: TEST_SHORTCODE.into(),
        passkey: "test-passkey".into(),
        callback_url: "https://maji.example.com/webhooks/mpesa".into(),
        timeout,
    }
}

/// Mount a token endpoint that always succeeds.
pub async fn mount_token(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/oauth/v1/generate"))
        .and(query_param("grant_type", "client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": TEST_ACCESS_TOKEN,
            "expires_in": "3599"
        })))
        .mount(server)
        .await;
}

/// Body M-Pesa returns for an accepted push.
pub fn accepted_push(checkout_request_id: &str) -> Value {
    json!({
        "MerchantRequestID": format!("merchant-{checkout_request_id}"),
        "CheckoutRequestID": checkout_request_id,
        "ResponseCode": "0",
        "ResponseDescription": "Success. Request accepted for processing",
        "CustomerMessage": "Success. Request accepted for processing"
    })
}

/// A successful STK callback body.
pub fn success_callback(checkout_request_id: &str, amount: Option<f64>) -> Value {
    let mut items = vec![
        json!({ "Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV" }),
        json!({ "Name": "TransactionDate", "Value": 20_240_101_120_000_u64 }),
        json!({ "Name": "PhoneNumber", "Value": 254_712_345_678_u64 }),
    ];
    if let Some(amount) = amount {
        items.insert(0, json!({ "Name": "Amount", "Value": amount }));
    }
    json!({
        "Body": {
            "stkCallback": {
                "MerchantRequestID": format!("merchant-{checkout_request_id}"),
                "CheckoutRequestID": checkout_request_id,
                "ResultCode": 0,
                "ResultDesc": "The service request is processed successfully.",
                "CallbackMetadata": { "Item": items }
            }
        }
    })
}

/// A failed STK callback body.
pub fn failed_callback(checkout_request_id: &str, result_code: i64, desc: &str) -> Value {
    json!({
        "Body": {
            "stkCallback": {
                "MerchantRequestID": format!("merchant-{checkout_request_id}"),
                "CheckoutRequestID": checkout_request_id,
                "ResultCode": result_code,
                "ResultDesc": desc
            }
        }
    })
}

/// Compare two quantities.
pub fn assert_quantity(actual: &Value, expected: f64) {
    let actual = actual.as_f64().expect("quantity is not a number");
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}
