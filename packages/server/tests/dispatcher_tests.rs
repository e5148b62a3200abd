//! Dispatcher behavior against in-memory collaborators: window decisions,
//! template resolution, terminal failure handling, at-most-once marking.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use server_core::domains::messaging::{Dispatcher, DispatcherPolicy, FailurePolicy};
use server_core::kernel::test_dependencies::{
    due_message, MockInteractionStore, MockMessagingGateway, MockScheduledMessageStore,
    MockTemplateRegistry,
};
use server_core::kernel::MessageContent;

struct Fixture {
    store: Arc<MockScheduledMessageStore>,
    registry: Arc<MockTemplateRegistry>,
    interactions: Arc<MockInteractionStore>,
    gateway: Arc<MockMessagingGateway>,
}

impl Fixture {
    fn dispatcher(&self) -> Dispatcher {
        self.dispatcher_with_policy(DispatcherPolicy::default())
    }

    fn dispatcher_with_policy(&self, policy: DispatcherPolicy) -> Dispatcher {
        Dispatcher::new(
            self.store.clone(),
            self.registry.clone(),
            self.interactions.clone(),
            self.gateway.clone(),
            policy,
        )
    }
}

fn fixture(
    store: MockScheduledMessageStore,
    registry: MockTemplateRegistry,
    interactions: MockInteractionStore,
    gateway: MockMessagingGateway,
) -> Fixture {
    Fixture {
        store: Arc::new(store),
        registry: Arc::new(registry),
        interactions: Arc::new(interactions),
        gateway: Arc::new(gateway),
    }
}

#[tokio::test]
async fn freeform_sent_inside_interaction_window() {
    let brand_id = Uuid::new_v4();
    let trip_id = Uuid::new_v4();
    let msg = due_message(brand_id, trip_id, "+31611111111");
    let msg_id = msg.message.id;

    let f = fixture(
        MockScheduledMessageStore::new().with_message(msg),
        MockTemplateRegistry::new(),
        MockInteractionStore::new().with_interaction(
            trip_id,
            "+31611111111",
            Utc::now() - Duration::hours(1),
        ),
        MockMessagingGateway::new(),
    );

    let report = f.dispatcher().dispatch_due_messages().await.unwrap();

    assert_eq!(report.processed, 1);
    assert_eq!(report.successful, 1);
    assert_eq!(report.failed, 0);

    let sent = f.gateway.sent_messages();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "+31611111111");
    assert_eq!(sent[0].content, MessageContent::Body("Hi!".to_string()));

    let stored = f.store.message(msg_id).unwrap();
    assert!(stored.message.is_sent);
    assert!(stored.message.sent_at.is_some());
}

#[tokio::test]
async fn template_required_but_missing_is_terminal_without_send() {
    let brand_id = Uuid::new_v4();
    let trip_id = Uuid::new_v4();
    let msg = due_message(brand_id, trip_id, "+31611111111");
    let msg_id = msg.message.id;

    // No interaction history, no registered template
    let f = fixture(
        MockScheduledMessageStore::new().with_message(msg),
        MockTemplateRegistry::new(),
        MockInteractionStore::new(),
        MockMessagingGateway::new(),
    );

    let report = f.dispatcher().dispatch_due_messages().await.unwrap();

    assert_eq!(report.processed, 1);
    assert_eq!(report.failed, 1);
    assert!(report.results[0]
        .error
        .as_deref()
        .unwrap()
        .contains("template"));

    // Gateway never invoked, message still marked sent
    assert_eq!(f.gateway.send_count(), 0);
    assert!(f.store.message(msg_id).unwrap().message.is_sent);
}

#[tokio::test]
async fn second_pass_processes_nothing() {
    let brand_id = Uuid::new_v4();
    let trip_id = Uuid::new_v4();

    let f = fixture(
        MockScheduledMessageStore::new()
            .with_message(due_message(brand_id, trip_id, "+31611111111"))
            .with_message(due_message(brand_id, trip_id, "+31622222222")),
        MockTemplateRegistry::new(),
        MockInteractionStore::new()
            .with_interaction(trip_id, "+31611111111", Utc::now() - Duration::hours(2))
            .with_interaction(trip_id, "+31622222222", Utc::now() - Duration::hours(2)),
        MockMessagingGateway::new(),
    );

    let first = f.dispatcher().dispatch_due_messages().await.unwrap();
    assert_eq!(first.processed, 2);
    assert_eq!(f.store.unsent_count(), 0);

    let second = f.dispatcher().dispatch_due_messages().await.unwrap();
    assert_eq!(second.processed, 0);
    assert_eq!(f.gateway.send_count(), 2);
}

#[tokio::test]
async fn window_just_closed_requires_template() {
    let brand_id = Uuid::new_v4();
    let trip_id = Uuid::new_v4();
    let msg = due_message(brand_id, trip_id, "+31611111111");

    let f = fixture(
        MockScheduledMessageStore::new().with_message(msg),
        MockTemplateRegistry::new().with_template(
            "scheduled_reminder",
            None,
            "HX00000000000000000000000000000001",
            vec![],
        ),
        MockInteractionStore::new().with_interaction(
            trip_id,
            "+31611111111",
            Utc::now() - Duration::hours(24) - Duration::seconds(1),
        ),
        MockMessagingGateway::new(),
    );

    let report = f.dispatcher().dispatch_due_messages().await.unwrap();

    assert_eq!(report.successful, 1);
    let sent = f.gateway.sent_messages();
    assert!(matches!(
        &sent[0].content,
        MessageContent::Template { content_sid, .. }
            if content_sid == "HX00000000000000000000000000000001"
    ));
}

#[tokio::test]
async fn window_still_open_permits_freeform() {
    let brand_id = Uuid::new_v4();
    let trip_id = Uuid::new_v4();
    let msg = due_message(brand_id, trip_id, "+31611111111");

    let f = fixture(
        MockScheduledMessageStore::new().with_message(msg),
        MockTemplateRegistry::new(),
        MockInteractionStore::new().with_interaction(
            trip_id,
            "+31611111111",
            Utc::now() - Duration::hours(23) - Duration::minutes(59),
        ),
        MockMessagingGateway::new(),
    );

    let report = f.dispatcher().dispatch_due_messages().await.unwrap();

    assert_eq!(report.successful, 1);
    assert_eq!(
        f.gateway.sent_messages()[0].content,
        MessageContent::Body("Hi!".to_string())
    );
}

#[tokio::test]
async fn missing_recipient_is_terminal() {
    let brand_id = Uuid::new_v4();
    let trip_id = Uuid::new_v4();
    let mut msg = due_message(brand_id, trip_id, "+31611111111");
    msg.message.recipient_phone = None;
    msg.trip_phone = None;
    let msg_id = msg.message.id;

    let f = fixture(
        MockScheduledMessageStore::new().with_message(msg),
        MockTemplateRegistry::new(),
        MockInteractionStore::new(),
        MockMessagingGateway::new(),
    );

    let report = f.dispatcher().dispatch_due_messages().await.unwrap();

    assert_eq!(report.failed, 1);
    assert!(report.results[0]
        .error
        .as_deref()
        .unwrap()
        .contains("recipient"));
    assert_eq!(f.gateway.send_count(), 0);
    assert!(f.store.message(msg_id).unwrap().message.is_sent);
}

#[tokio::test]
async fn trip_phone_used_when_no_explicit_recipient() {
    let brand_id = Uuid::new_v4();
    let trip_id = Uuid::new_v4();
    let mut msg = due_message(brand_id, trip_id, "+31611111111");
    msg.message.recipient_phone = None;
    msg.trip_phone = Some("+31633333333".to_string());

    let f = fixture(
        MockScheduledMessageStore::new().with_message(msg),
        MockTemplateRegistry::new(),
        MockInteractionStore::new().with_interaction(
            trip_id,
            "+31633333333",
            Utc::now() - Duration::hours(1),
        ),
        MockMessagingGateway::new(),
    );

    let report = f.dispatcher().dispatch_due_messages().await.unwrap();

    assert_eq!(report.successful, 1);
    assert!(f.gateway.was_sent_to("+31633333333"));
}

#[tokio::test]
async fn gateway_failure_is_recorded_and_terminal() {
    let brand_id = Uuid::new_v4();
    let trip_id = Uuid::new_v4();
    let msg = due_message(brand_id, trip_id, "+31611111111");
    let msg_id = msg.message.id;

    let f = fixture(
        MockScheduledMessageStore::new().with_message(msg),
        MockTemplateRegistry::new(),
        MockInteractionStore::new().with_interaction(
            trip_id,
            "+31611111111",
            Utc::now() - Duration::hours(1),
        ),
        MockMessagingGateway::new().with_failure("Twilio returned an error"),
    );

    let report = f.dispatcher().dispatch_due_messages().await.unwrap();

    assert_eq!(report.failed, 1);
    assert!(report.results[0]
        .error
        .as_deref()
        .unwrap()
        .contains("Twilio"));

    // Marked sent anyway: a failed dispatch is never re-attempted
    assert!(f.store.message(msg_id).unwrap().message.is_sent);

    let second = f.dispatcher().dispatch_due_messages().await.unwrap();
    assert_eq!(second.processed, 0);
}

#[tokio::test]
async fn retry_policy_leaves_failed_messages_unsent() {
    let brand_id = Uuid::new_v4();
    let trip_id = Uuid::new_v4();
    let msg = due_message(brand_id, trip_id, "+31611111111");
    let msg_id = msg.message.id;

    let f = fixture(
        MockScheduledMessageStore::new().with_message(msg),
        MockTemplateRegistry::new(),
        MockInteractionStore::new().with_interaction(
            trip_id,
            "+31611111111",
            Utc::now() - Duration::hours(1),
        ),
        MockMessagingGateway::new().with_failure("Twilio returned an error"),
    );

    let policy = DispatcherPolicy {
        on_failure: FailurePolicy::Retry,
        ..DispatcherPolicy::default()
    };

    let report = f
        .dispatcher_with_policy(policy)
        .dispatch_due_messages()
        .await
        .unwrap();

    assert_eq!(report.failed, 1);
    assert!(!f.store.message(msg_id).unwrap().message.is_sent);
}

#[tokio::test]
async fn one_failure_does_not_abort_the_batch() {
    let brand_id = Uuid::new_v4();
    let trip_id = Uuid::new_v4();

    let mut broken = due_message(brand_id, trip_id, "+31611111111");
    broken.message.recipient_phone = None;
    // Scheduled earlier so it is processed first
    broken.message.scheduled_date = broken.message.scheduled_date - Duration::days(1);

    let healthy = due_message(brand_id, trip_id, "+31622222222");

    let f = fixture(
        MockScheduledMessageStore::new()
            .with_message(broken)
            .with_message(healthy),
        MockTemplateRegistry::new(),
        MockInteractionStore::new().with_interaction(
            trip_id,
            "+31622222222",
            Utc::now() - Duration::hours(1),
        ),
        MockMessagingGateway::new(),
    );

    let report = f.dispatcher().dispatch_due_messages().await.unwrap();

    assert_eq!(report.processed, 2);
    assert_eq!(report.successful, 1);
    assert_eq!(report.failed, 1);
    assert!(f.gateway.was_sent_to("+31622222222"));
}

#[tokio::test]
async fn brand_template_wins_over_global() {
    let brand_id = Uuid::new_v4();
    let trip_id = Uuid::new_v4();
    let mut msg = due_message(brand_id, trip_id, "+31611111111");
    msg.message.template_name = Some("trip_update".to_string());

    let f = fixture(
        MockScheduledMessageStore::new().with_message(msg),
        MockTemplateRegistry::new()
            .with_template("trip_update", None, "HX0000000000000000000000000000glob", vec![])
            .with_template(
                "trip_update",
                Some(brand_id),
                "HX000000000000000000000000000brand",
                vec![],
            ),
        MockInteractionStore::new(),
        MockMessagingGateway::new(),
    );

    let report = f.dispatcher().dispatch_due_messages().await.unwrap();

    assert_eq!(report.successful, 1);
    assert!(matches!(
        &f.gateway.sent_messages()[0].content,
        MessageContent::Template { content_sid, .. }
            if content_sid == "HX000000000000000000000000000brand"
    ));
}

#[tokio::test]
async fn named_but_unresolvable_template_falls_back_to_freeform_inside_window() {
    let brand_id = Uuid::new_v4();
    let trip_id = Uuid::new_v4();
    let mut msg = due_message(brand_id, trip_id, "+31611111111");
    msg.message.template_name = Some("nonexistent".to_string());

    let f = fixture(
        MockScheduledMessageStore::new().with_message(msg),
        MockTemplateRegistry::new(),
        MockInteractionStore::new().with_interaction(
            trip_id,
            "+31611111111",
            Utc::now() - Duration::hours(1),
        ),
        MockMessagingGateway::new(),
    );

    let report = f.dispatcher().dispatch_due_messages().await.unwrap();

    assert_eq!(report.successful, 1);
    assert_eq!(
        f.gateway.sent_messages()[0].content,
        MessageContent::Body("Hi!".to_string())
    );
}

#[tokio::test]
async fn template_variables_are_sanitized_and_filtered_to_slots() {
    let brand_id = Uuid::new_v4();
    let trip_id = Uuid::new_v4();
    let mut msg = due_message(brand_id, trip_id, "+31611111111");
    msg.message.template_name = Some("trip_update".to_string());
    msg.message.template_variables = Some(json!({
        "1": "  Grand   Hotel\nAmsterdam ",
        "2": "   ",
        "unknown": "dropped",
    }));

    let f = fixture(
        MockScheduledMessageStore::new().with_message(msg),
        MockTemplateRegistry::new().with_template(
            "trip_update",
            None,
            "HX00000000000000000000000000000001",
            vec!["1", "2"],
        ),
        MockInteractionStore::new(),
        MockMessagingGateway::new(),
    );

    let report = f.dispatcher().dispatch_due_messages().await.unwrap();
    assert_eq!(report.successful, 1);

    let sent = f.gateway.sent_messages();
    let MessageContent::Template { variables, .. } = &sent[0].content else {
        panic!("expected template send");
    };

    assert_eq!(variables.len(), 1);
    assert_eq!(variables["1"], "Grand Hotel Amsterdam");
}

#[tokio::test]
async fn same_day_future_message_is_left_for_a_later_pass() {
    let brand_id = Uuid::new_v4();
    let trip_id = Uuid::new_v4();
    let mut msg = due_message(brand_id, trip_id, "+31611111111");

    // Scheduled later today: selected by the date-level query but not yet due
    let future = Utc::now() + Duration::hours(2);
    msg.message.scheduled_date = future.date_naive();
    msg.message.scheduled_time = future.time();
    let msg_id = msg.message.id;

    let f = fixture(
        MockScheduledMessageStore::new().with_message(msg),
        MockTemplateRegistry::new(),
        MockInteractionStore::new(),
        MockMessagingGateway::new(),
    );

    let report = f.dispatcher().dispatch_due_messages().await.unwrap();

    assert_eq!(report.processed, 0);
    assert_eq!(f.gateway.send_count(), 0);
    assert!(!f.store.message(msg_id).unwrap().message.is_sent);
}
