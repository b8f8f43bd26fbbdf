//! Push transports, failure classification and the wave dispatcher.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use ofd_core::{Recipient, Transport};
use ofd_store::NotifyStore;
use serde_json::{json, Value as JsonValue};
use thiserror::Error;
use tracing::{info, warn};

pub const CRATE_NAME: &str = "ofd-notify";

/// Title/body pair handed to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
}

/// Opaque string-keyed bag passed through to the transports unmodified
/// (routing hints like which in-app screen to open).
pub type CustomData = BTreeMap<String, String>;

/// Per-recipient outcome of one send attempt, batched or individual.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Ok,
    Failed { reason: String },
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("transport returned http status {status}")]
    HttpStatus { status: u16 },
    #[error("malformed transport response: {0}")]
    Response(String),
}

/// Capability interface over heterogeneous push providers. The
/// dispatcher never branches on provider identity, only on whether the
/// transport can carry a multi-recipient call.
#[async_trait]
pub trait PushTransport: Send + Sync {
    fn transport(&self) -> Transport;
    fn supports_batch(&self) -> bool;

    async fn send_one(
        &self,
        address: &str,
        message: &PushMessage,
        data: &CustomData,
    ) -> Result<SendOutcome, TransportError>;

    /// Single-send transports fall back to one call per recipient.
    async fn send_many(
        &self,
        addresses: &[String],
        message: &PushMessage,
        data: &CustomData,
    ) -> Result<Vec<SendOutcome>, TransportError> {
        let mut outcomes = Vec::with_capacity(addresses.len());
        for address in addresses {
            outcomes.push(self.send_one(address, message, data).await?);
        }
        Ok(outcomes)
    }
}

/// How a raw per-recipient failure reason should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The address itself is dead; sanitize it.
    Permanent,
    /// Worth leaving for the next scheduled wave.
    Transient,
    Unknown,
}

const EXPO_PERMANENT: &[&str] = &["devicenotregistered"];
const EXPO_TRANSIENT: &[&str] = &["messagerateexceeded", "internalservererror", "serviceunavailable"];
const FCM_PERMANENT: &[&str] = &[
    "notregistered",
    "invalidregistration",
    "registration-token-not-registered",
    "invalid-registration-token",
];
const FCM_TRANSIENT: &[&str] = &["unavailable", "internalservererror", "quotaexceeded"];

/// Provider-specific failure taxonomy reduced to one outcome, so the
/// sanitization logic stays provider-agnostic.
pub fn classify_failure(transport: Transport, raw_reason: &str) -> FailureClass {
    let reason = raw_reason.to_ascii_lowercase();
    let (permanent, transient) = match transport {
        Transport::Expo => (EXPO_PERMANENT, EXPO_TRANSIENT),
        Transport::Fcm => (FCM_PERMANENT, FCM_TRANSIENT),
    };
    if permanent.iter().any(|needle| reason.contains(needle)) {
        FailureClass::Permanent
    } else if transient.iter().any(|needle| reason.contains(needle)) {
        FailureClass::Transient
    } else {
        FailureClass::Unknown
    }
}

/// Expo push service. Batch-capable; addresses carry the
/// `ExponentPushToken[` prefix.
#[derive(Debug)]
pub struct ExpoTransport {
    client: reqwest::Client,
    push_url: String,
}

impl ExpoTransport {
    pub const DEFAULT_PUSH_URL: &'static str = "https://exp.host/--/api/v2/push/send";

    pub fn new(push_url: String, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().gzip(true).timeout(timeout).build()?;
        Ok(Self { client, push_url })
    }

    fn ticket_outcome(ticket: &JsonValue) -> SendOutcome {
        let status = ticket.get("status").and_then(|v| v.as_str()).unwrap_or("error");
        if status == "ok" {
            return SendOutcome::Ok;
        }
        let reason = ticket
            .get("details")
            .and_then(|d| d.get("error"))
            .and_then(|v| v.as_str())
            .or_else(|| ticket.get("message").and_then(|v| v.as_str()))
            .unwrap_or("unknown expo error")
            .to_string();
        SendOutcome::Failed { reason }
    }
}

#[async_trait]
impl PushTransport for ExpoTransport {
    fn transport(&self) -> Transport {
        Transport::Expo
    }

    fn supports_batch(&self) -> bool {
        true
    }

    async fn send_one(
        &self,
        address: &str,
        message: &PushMessage,
        data: &CustomData,
    ) -> Result<SendOutcome, TransportError> {
        let outcomes = self.send_many(&[address.to_string()], message, data).await?;
        outcomes
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::Response("empty ticket list".to_string()))
    }

    async fn send_many(
        &self,
        addresses: &[String],
        message: &PushMessage,
        data: &CustomData,
    ) -> Result<Vec<SendOutcome>, TransportError> {
        let payload: Vec<JsonValue> = addresses
            .iter()
            .map(|to| {
                json!({
                    "to": to,
                    "title": message.title,
                    "body": message.body,
                    "sound": "default",
                    "data": data,
                })
            })
            .collect();

        let response = self.client.post(&self.push_url).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let body: JsonValue = response.json().await?;
        let tickets = body
            .get("data")
            .and_then(|v| v.as_array())
            .ok_or_else(|| TransportError::Response("missing ticket array".to_string()))?;

        let mut outcomes: Vec<SendOutcome> = tickets.iter().map(Self::ticket_outcome).collect();
        // A short ticket list means the tail of the wave never got a
        // verdict; count those as failures rather than guessing.
        while outcomes.len() < addresses.len() {
            outcomes.push(SendOutcome::Failed {
                reason: "missing ticket".to_string(),
            });
        }
        outcomes.truncate(addresses.len());
        Ok(outcomes)
    }
}

/// Firebase Cloud Messaging over the legacy HTTP endpoint. Single-send
/// only; the dispatcher falls back to per-recipient calls.
#[derive(Debug)]
pub struct FcmTransport {
    client: reqwest::Client,
    send_url: String,
    server_key: String,
}

impl FcmTransport {
    pub const DEFAULT_SEND_URL: &'static str = "https://fcm.googleapis.com/fcm/send";

    pub fn new(send_url: String, server_key: String, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().gzip(true).timeout(timeout).build()?;
        Ok(Self {
            client,
            send_url,
            server_key,
        })
    }
}

#[async_trait]
impl PushTransport for FcmTransport {
    fn transport(&self) -> Transport {
        Transport::Fcm
    }

    fn supports_batch(&self) -> bool {
        false
    }

    async fn send_one(
        &self,
        address: &str,
        message: &PushMessage,
        data: &CustomData,
    ) -> Result<SendOutcome, TransportError> {
        let payload = json!({
            "to": address,
            "priority": "high",
            "notification": {
                "title": message.title,
                "body": message.body,
                "sound": "default",
            },
            "data": data,
        });

        let response = self
            .client
            .post(&self.send_url)
            .header("Authorization", format!("key={}", self.server_key))
            .json(&payload)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let body: JsonValue = response.json().await?;
        let error = body
            .get("results")
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .and_then(|r| r.get("error"))
            .and_then(|v| v.as_str());
        Ok(match error {
            Some(reason) => SendOutcome::Failed {
                reason: reason.to_string(),
            },
            None => SendOutcome::Ok,
        })
    }
}

/// Terminal status of one dispatch wave. A wave is one attempt covering
/// all recipients of one transport; there are no retries within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveStatus {
    /// At least one recipient was delivered to (all or partial success).
    Sent,
    /// Zero successes across a non-empty wave; systemic, not isolated.
    Failed,
}

#[derive(Debug, Clone)]
pub struct WaveReport {
    pub transport: Transport,
    pub status: WaveStatus,
    pub success: usize,
    pub failure: usize,
    pub sanitized: usize,
}

pub fn group_by_transport(recipients: Vec<Recipient>) -> BTreeMap<Transport, Vec<Recipient>> {
    let mut groups: BTreeMap<Transport, Vec<Recipient>> = BTreeMap::new();
    for recipient in recipients {
        groups.entry(recipient.transport).or_default().push(recipient);
    }
    groups
}

pub struct Dispatcher {
    transports: Vec<Arc<dyn PushTransport>>,
    store: Arc<dyn NotifyStore>,
    batch_threshold: usize,
}

impl Dispatcher {
    /// Transports are constructed once at process start and injected
    /// here; the dispatcher holds no global state.
    pub fn new(
        transports: Vec<Arc<dyn PushTransport>>,
        store: Arc<dyn NotifyStore>,
        batch_threshold: usize,
    ) -> Self {
        Self {
            transports,
            store,
            batch_threshold,
        }
    }

    /// Send one wave per transport. Waves are independent: a failure in
    /// one transport's batch never blocks the other's. Recipients whose
    /// send succeeded get their offers stamped as notified; permanently
    /// invalid addresses are cleared.
    pub async fn dispatch<F>(
        &self,
        recipients: Vec<Recipient>,
        shared: &PushMessage,
        personalize: F,
        data: &CustomData,
    ) -> Result<Vec<WaveReport>>
    where
        F: Fn(&Recipient) -> PushMessage,
    {
        let mut reports = Vec::new();
        for (kind, group) in group_by_transport(recipients) {
            let Some(transport) = self.transports.iter().find(|t| t.transport() == kind) else {
                warn!(transport = kind.as_str(), recipients = group.len(), "no transport registered; wave failed");
                reports.push(WaveReport {
                    transport: kind,
                    status: WaveStatus::Failed,
                    success: 0,
                    failure: group.len(),
                    sanitized: 0,
                });
                continue;
            };
            let report = self
                .dispatch_wave(transport.as_ref(), kind, group, shared, &personalize, data)
                .await;
            reports.push(report);
        }
        Ok(reports)
    }

    async fn dispatch_wave<F>(
        &self,
        transport: &dyn PushTransport,
        kind: Transport,
        group: Vec<Recipient>,
        shared: &PushMessage,
        personalize: &F,
        data: &CustomData,
    ) -> WaveReport
    where
        F: Fn(&Recipient) -> PushMessage,
    {
        // Batched APIs cannot personalize per recipient, so the shared
        // title/body is used above the threshold and a personalized
        // body below it.
        let outcomes: Vec<SendOutcome> =
            if transport.supports_batch() && group.len() > self.batch_threshold {
                let addresses: Vec<String> =
                    group.iter().map(|r| r.delivery_address.clone()).collect();
                match transport.send_many(&addresses, shared, data).await {
                    Ok(outcomes) => outcomes,
                    Err(err) => {
                        warn!(transport = kind.as_str(), error = %err, "batched send failed for entire wave");
                        group
                            .iter()
                            .map(|_| SendOutcome::Failed {
                                reason: err.to_string(),
                            })
                            .collect()
                    }
                }
            } else {
                let mut outcomes = Vec::with_capacity(group.len());
                for recipient in &group {
                    let message = personalize(recipient);
                    let outcome = match transport
                        .send_one(&recipient.delivery_address, &message, data)
                        .await
                    {
                        Ok(outcome) => outcome,
                        Err(err) => SendOutcome::Failed {
                            reason: err.to_string(),
                        },
                    };
                    outcomes.push(outcome);
                }
                outcomes
            };

        let mut success = 0usize;
        let mut failure = 0usize;
        let mut sanitized = 0usize;
        let now = Utc::now();
        for (recipient, outcome) in group.iter().zip(&outcomes) {
            match outcome {
                SendOutcome::Ok => {
                    success += 1;
                    if let Err(err) = self.store.mark_offers_notified(recipient.user_id, now).await {
                        warn!(user_id = %recipient.user_id, error = %err, "failed to mark offers notified");
                    }
                }
                SendOutcome::Failed { reason } => {
                    failure += 1;
                    if classify_failure(kind, reason) == FailureClass::Permanent {
                        match self.store.clear_delivery_address(recipient.user_id).await {
                            Ok(()) => {
                                sanitized += 1;
                                info!(user_id = %recipient.user_id, reason, "cleared permanently invalid delivery address");
                            }
                            Err(err) => {
                                warn!(user_id = %recipient.user_id, error = %err, "failed to clear delivery address");
                            }
                        }
                    } else {
                        warn!(user_id = %recipient.user_id, reason, "push delivery failed");
                    }
                }
            }
        }

        let status = if success > 0 {
            WaveStatus::Sent
        } else {
            WaveStatus::Failed
        };
        info!(
            transport = kind.as_str(),
            success, failure, sanitized, "dispatch wave finished"
        );
        WaveReport {
            transport: kind,
            status,
            success,
            failure,
            sanitized,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use ofd_store::MatchMode;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use uuid::Uuid;

    struct MockTransport {
        kind: Transport,
        batch: bool,
        fail_addresses: HashSet<String>,
        fail_reason: String,
        hard_error: bool,
        batch_calls: AtomicUsize,
        single_calls: AtomicUsize,
        sent: Mutex<Vec<(String, PushMessage)>>,
    }

    impl MockTransport {
        fn new(kind: Transport, batch: bool) -> Self {
            Self {
                kind,
                batch,
                fail_addresses: HashSet::new(),
                fail_reason: "Unavailable".to_string(),
                hard_error: false,
                batch_calls: AtomicUsize::new(0),
                single_calls: AtomicUsize::new(0),
                sent: Mutex::new(Vec::new()),
            }
        }

        fn failing(mut self, addresses: &[&str], reason: &str) -> Self {
            self.fail_addresses = addresses.iter().map(|s| s.to_string()).collect();
            self.fail_reason = reason.to_string();
            self
        }

        fn outcome_for(&self, address: &str) -> SendOutcome {
            if self.fail_addresses.contains(address) {
                SendOutcome::Failed {
                    reason: self.fail_reason.clone(),
                }
            } else {
                SendOutcome::Ok
            }
        }
    }

    #[async_trait]
    impl PushTransport for MockTransport {
        fn transport(&self) -> Transport {
            self.kind
        }

        fn supports_batch(&self) -> bool {
            self.batch
        }

        async fn send_one(
            &self,
            address: &str,
            message: &PushMessage,
            _data: &CustomData,
        ) -> Result<SendOutcome, TransportError> {
            if self.hard_error {
                return Err(TransportError::Response("connection reset".to_string()));
            }
            self.single_calls.fetch_add(1, Ordering::SeqCst);
            self.sent
                .lock()
                .unwrap()
                .push((address.to_string(), message.clone()));
            Ok(self.outcome_for(address))
        }

        async fn send_many(
            &self,
            addresses: &[String],
            message: &PushMessage,
            _data: &CustomData,
        ) -> Result<Vec<SendOutcome>, TransportError> {
            if self.hard_error {
                return Err(TransportError::Response("connection reset".to_string()));
            }
            self.batch_calls.fetch_add(1, Ordering::SeqCst);
            let mut sent = self.sent.lock().unwrap();
            for address in addresses {
                sent.push((address.clone(), message.clone()));
            }
            Ok(addresses.iter().map(|a| self.outcome_for(a)).collect())
        }
    }

    #[derive(Default)]
    struct MemNotifyStore {
        notified: Mutex<Vec<Uuid>>,
        cleared: Mutex<Vec<Uuid>>,
    }

    #[async_trait]
    impl NotifyStore for MemNotifyStore {
        async fn eligible_recipients(&self, _mode: MatchMode) -> Result<Vec<Recipient>> {
            Ok(Vec::new())
        }

        async fn mark_offers_notified(&self, user_id: Uuid, _at: DateTime<Utc>) -> Result<()> {
            self.notified.lock().unwrap().push(user_id);
            Ok(())
        }

        async fn clear_delivery_address(&self, user_id: Uuid) -> Result<()> {
            self.cleared.lock().unwrap().push(user_id);
            Ok(())
        }
    }

    fn expo_recipient(n: usize) -> Recipient {
        Recipient::new(Uuid::new_v4(), format!("ExponentPushToken[tok-{n}]"), (n as i64) + 1)
    }

    fn fcm_recipient(address: &str) -> Recipient {
        Recipient::new(Uuid::new_v4(), address.to_string(), 2)
    }

    fn shared_message() -> PushMessage {
        PushMessage {
            title: "Ofertas".to_string(),
            body: "Hay ofertas disponibles hoy".to_string(),
        }
    }

    fn personalize(recipient: &Recipient) -> PushMessage {
        PushMessage {
            title: "Ofertas".to_string(),
            body: format!("Hay {} ofertas para vos", recipient.match_count),
        }
    }

    fn dispatcher(
        transports: Vec<Arc<dyn PushTransport>>,
        store: Arc<MemNotifyStore>,
    ) -> Dispatcher {
        Dispatcher::new(transports, store, 5)
    }

    #[tokio::test]
    async fn batch_capable_transport_batches_above_threshold() {
        let transport = Arc::new(MockTransport::new(Transport::Expo, true));
        let store = Arc::new(MemNotifyStore::default());
        let recipients: Vec<Recipient> = (0..6).map(expo_recipient).collect();
        let user_ids: HashSet<Uuid> = recipients.iter().map(|r| r.user_id).collect();

        let reports = dispatcher(vec![transport.clone()], store.clone())
            .dispatch(recipients, &shared_message(), personalize, &CustomData::new())
            .await
            .unwrap();

        assert_eq!(transport.batch_calls.load(Ordering::SeqCst), 1);
        assert_eq!(transport.single_calls.load(Ordering::SeqCst), 0);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].status, WaveStatus::Sent);
        assert_eq!(reports[0].success, 6);
        let notified: HashSet<Uuid> = store.notified.lock().unwrap().iter().copied().collect();
        assert_eq!(notified, user_ids);
    }

    #[tokio::test]
    async fn wave_with_zero_successes_is_failed() {
        let addresses: Vec<String> = (0..6).map(|n| format!("ExponentPushToken[tok-{n}]")).collect();
        let address_refs: Vec<&str> = addresses.iter().map(String::as_str).collect();
        let transport = Arc::new(
            MockTransport::new(Transport::Expo, true).failing(&address_refs, "MessageRateExceeded"),
        );
        let store = Arc::new(MemNotifyStore::default());
        let recipients: Vec<Recipient> = (0..6).map(expo_recipient).collect();

        let reports = dispatcher(vec![transport], store.clone())
            .dispatch(recipients, &shared_message(), personalize, &CustomData::new())
            .await
            .unwrap();

        assert_eq!(reports[0].status, WaveStatus::Failed);
        assert_eq!(reports[0].success, 0);
        assert_eq!(reports[0].failure, 6);
        assert!(store.notified.lock().unwrap().is_empty());
        // Rate limiting is transient; nothing gets sanitized.
        assert!(store.cleared.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn small_group_sends_individually_with_personalized_body() {
        let transport = Arc::new(MockTransport::new(Transport::Expo, true));
        let store = Arc::new(MemNotifyStore::default());
        let recipients = vec![expo_recipient(0), expo_recipient(2)];

        dispatcher(vec![transport.clone()], store)
            .dispatch(recipients, &shared_message(), personalize, &CustomData::new())
            .await
            .unwrap();

        assert_eq!(transport.batch_calls.load(Ordering::SeqCst), 0);
        assert_eq!(transport.single_calls.load(Ordering::SeqCst), 2);
        let sent = transport.sent.lock().unwrap();
        assert!(sent.iter().any(|(_, m)| m.body == "Hay 1 ofertas para vos"));
        assert!(sent.iter().any(|(_, m)| m.body == "Hay 3 ofertas para vos"));
    }

    #[tokio::test]
    async fn permanent_failure_clears_delivery_address() {
        let dead = "dead-token";
        let transport = Arc::new(
            MockTransport::new(Transport::Fcm, false).failing(&[dead], "NotRegistered"),
        );
        let store = Arc::new(MemNotifyStore::default());
        let bad = fcm_recipient(dead);
        let good = fcm_recipient("live-token");
        let bad_id = bad.user_id;

        let reports = dispatcher(vec![transport], store.clone())
            .dispatch(vec![bad, good], &shared_message(), personalize, &CustomData::new())
            .await
            .unwrap();

        assert_eq!(reports[0].status, WaveStatus::Sent);
        assert_eq!(reports[0].sanitized, 1);
        assert_eq!(*store.cleared.lock().unwrap(), vec![bad_id]);
    }

    #[tokio::test]
    async fn transient_failure_does_not_sanitize() {
        let flaky = "flaky-token";
        let transport = Arc::new(
            MockTransport::new(Transport::Fcm, false).failing(&[flaky], "Unavailable"),
        );
        let store = Arc::new(MemNotifyStore::default());

        let reports = dispatcher(vec![transport], store.clone())
            .dispatch(
                vec![fcm_recipient(flaky)],
                &shared_message(),
                personalize,
                &CustomData::new(),
            )
            .await
            .unwrap();

        assert_eq!(reports[0].status, WaveStatus::Failed);
        assert!(store.cleared.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn transport_waves_fail_independently() {
        let mut broken = MockTransport::new(Transport::Expo, true);
        broken.hard_error = true;
        let broken = Arc::new(broken);
        let healthy = Arc::new(MockTransport::new(Transport::Fcm, false));
        let store = Arc::new(MemNotifyStore::default());

        let recipients = vec![
            expo_recipient(0),
            expo_recipient(1),
            fcm_recipient("live-token"),
        ];
        let reports = dispatcher(vec![broken, healthy], store.clone())
            .dispatch(recipients, &shared_message(), personalize, &CustomData::new())
            .await
            .unwrap();

        let expo = reports.iter().find(|r| r.transport == Transport::Expo).unwrap();
        let fcm = reports.iter().find(|r| r.transport == Transport::Fcm).unwrap();
        assert_eq!(expo.status, WaveStatus::Failed);
        assert_eq!(fcm.status, WaveStatus::Sent);
        assert_eq!(store.notified.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn partial_batch_failure_marks_only_successes_notified() {
        let dead = "ExponentPushToken[dead]";
        let transport = Arc::new(
            MockTransport::new(Transport::Expo, true).failing(&[dead], "DeviceNotRegistered"),
        );
        let store = Arc::new(MemNotifyStore::default());
        let mut recipients: Vec<Recipient> = (0..6).map(expo_recipient).collect();
        recipients[3].delivery_address = dead.to_string();
        recipients[3].transport = Transport::Expo;
        let dead_id = recipients[3].user_id;

        let reports = dispatcher(vec![transport], store.clone())
            .dispatch(recipients, &shared_message(), personalize, &CustomData::new())
            .await
            .unwrap();

        assert_eq!(reports[0].success, 5);
        assert_eq!(reports[0].failure, 1);
        assert_eq!(reports[0].sanitized, 1);
        let notified = store.notified.lock().unwrap();
        assert_eq!(notified.len(), 5);
        assert!(!notified.contains(&dead_id));
        assert_eq!(*store.cleared.lock().unwrap(), vec![dead_id]);
    }

    #[test]
    fn failure_tables_are_provider_specific() {
        assert_eq!(
            classify_failure(Transport::Expo, "DeviceNotRegistered"),
            FailureClass::Permanent
        );
        assert_eq!(
            classify_failure(Transport::Fcm, "messaging/registration-token-not-registered"),
            FailureClass::Permanent
        );
        assert_eq!(
            classify_failure(Transport::Fcm, "InvalidRegistration"),
            FailureClass::Permanent
        );
        assert_eq!(
            classify_failure(Transport::Expo, "MessageRateExceeded"),
            FailureClass::Transient
        );
        assert_eq!(
            classify_failure(Transport::Fcm, "Unavailable"),
            FailureClass::Transient
        );
        assert_eq!(
            classify_failure(Transport::Expo, "something new"),
            FailureClass::Unknown
        );
    }
}
