#![allow(dead_code)]

use ngoconnect_client::{MemoryTokenStore, NgoClient, SessionEvent, Settings, TokenRecord};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::TryRecvError};
use wiremock::MockServer;

pub fn signed_in_record(access: &str, refresh: Option<&str>) -> TokenRecord {
    TokenRecord {
        access_token: Some(access.to_string()),
        refresh_token: refresh.map(str::to_string),
        user_email: Some("a@b.com".to_string()),
        user_role: Some("donor".to_string()),
    }
}

pub fn client_for(base_url: &str, record: TokenRecord) -> (NgoClient, Arc<MemoryTokenStore>) {
    let config = Settings::for_base_url(base_url).expect("Failed to load test config");
    let tokens = Arc::new(MemoryTokenStore::with_record(record));
    let client = NgoClient::with_store(config, tokens.clone()).expect("Failed to build client");
    (client, tokens)
}

pub fn client_with(server: &MockServer, record: TokenRecord) -> (NgoClient, Arc<MemoryTokenStore>) {
    client_for(&server.uri(), record)
}

pub fn profile_body() -> Value {
    json!({
        "id": 11,
        "email": "a@b.com",
        "first_name": "Ayesha",
        "last_name": "Begum",
        "role": "donor"
    })
}

pub fn drain(events: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut seen = Vec::new();
    loop {
        match events.try_recv() {
            Ok(event) => seen.push(event),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => return seen,
        }
    }
}
