use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use mellon_core::AppError;
use mellon_domain::{AuditAction, GrantState, RiskLevel};

use crate::test_support::{
    FakeAuditRepository, FakeGrantRepository, FakeIdentityDirectory, FakeNotificationChannel,
    FakeRiskOracle, FakeTicketCatalog, ManualClock, OracleBehavior, epoch, principal,
};
use crate::{
    ApprovalGateway, GrantPolicy, GrantRegistry, InteractionCallback, RevocationHandler,
    RevocationScheduler, RiskAssessment, RiskClassifierAdapter,
};

use super::{IntakeMode, RequestOrchestrator};

struct Stack {
    orchestrator: RequestOrchestrator,
    registry: GrantRegistry,
    gateway: ApprovalGateway,
    channel: Arc<FakeNotificationChannel>,
    directory: Arc<FakeIdentityDirectory>,
    audit: Arc<FakeAuditRepository>,
    clock: Arc<ManualClock>,
}

fn stack(oracle: OracleBehavior, channel: FakeNotificationChannel, mode: IntakeMode) -> Stack {
    let clock = ManualClock::starting_at(epoch());
    let directory = Arc::new(FakeIdentityDirectory::default());
    let audit = Arc::new(FakeAuditRepository::default());
    let channel = Arc::new(channel);
    let registry = GrantRegistry::new(
        directory.clone(),
        RevocationScheduler::new(clock.clone()),
        audit.clone(),
        Arc::new(FakeGrantRepository::default()),
        clock.clone(),
    );
    let classifier = RiskClassifierAdapter::new(
        Arc::new(FakeRiskOracle::new(oracle)),
        Arc::new(FakeTicketCatalog::default().with_ticket("TICKET-101", "alice")),
        GrantPolicy::default(),
        Duration::from_secs(5),
    );
    let orchestrator = RequestOrchestrator::new(
        registry.clone(),
        classifier,
        channel.clone(),
        clock.clone(),
        mode,
    );
    let gateway = ApprovalGateway::new(registry.clone(), Duration::from_millis(2500));

    Stack {
        orchestrator,
        registry,
        gateway,
        channel,
        directory,
        audit,
        clock,
    }
}

fn low_risk(minutes: i64) -> OracleBehavior {
    OracleBehavior::Answer(RiskAssessment {
        ticket_reference: Some("TICKET-101".to_owned()),
        risk_level: RiskLevel::Low,
        rationale: "ticket assigned to requester".to_owned(),
        recommended_duration_minutes: Some(minutes),
    })
}

#[tokio::test]
async fn blank_intent_is_rejected_without_registration() {
    let stack = stack(low_risk(60), FakeNotificationChannel::default(), IntakeMode::Inline);

    let result = stack.orchestrator.submit(principal("alice"), "   ").await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert!(stack.channel.sent().await.is_empty());
}

#[tokio::test]
async fn inline_submit_classifies_and_notifies() {
    let stack = stack(low_risk(60), FakeNotificationChannel::default(), IntakeMode::Inline);

    let request_id = stack
        .orchestrator
        .submit(principal("alice"), "fixing TICKET-101")
        .await;

    let Ok(request_id) = request_id else {
        panic!("submit should succeed: {request_id:?}");
    };
    let sent = stack.channel.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].request_id, request_id);
    assert_eq!(sent[0].correlation_token(), request_id.to_string());
    assert_eq!(sent[0].risk_level, RiskLevel::Low);
    assert_eq!(sent[0].ticket_reference.as_deref(), Some("TICKET-101"));

    let stored = stack.registry.request(request_id).await;
    assert!(stored.is_ok_and(|stored| stored.decision.is_some() && stored.grant_id.is_none()));
}

#[tokio::test]
async fn background_submit_returns_before_classification_finishes() {
    let stack = stack(
        OracleBehavior::Hang,
        FakeNotificationChannel::default(),
        IntakeMode::Background,
    );

    let submitted = tokio::time::timeout(
        Duration::from_millis(500),
        stack.orchestrator.submit(principal("alice"), "TICKET-101"),
    )
    .await;

    assert!(matches!(submitted, Ok(Ok(_))));
    assert!(stack.channel.sent().await.is_empty());
}

#[tokio::test]
async fn classifier_failure_still_notifies_high_risk() {
    let stack = stack(
        OracleBehavior::Fail,
        FakeNotificationChannel::default(),
        IntakeMode::Inline,
    );

    assert!(
        stack
            .orchestrator
            .submit(principal("bob"), "need prod for reasons")
            .await
            .is_ok()
    );

    let sent = stack.channel.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].risk_level, RiskLevel::High);
    assert_eq!(sent[0].rationale, "classifier unavailable");
    assert_eq!(
        sent[0].recommended_duration,
        GrantPolicy::default().failsafe_duration()
    );
}

#[tokio::test]
async fn notification_failure_leaves_request_pending() {
    let stack = stack(
        low_risk(60),
        FakeNotificationChannel::failing(),
        IntakeMode::Inline,
    );

    let request_id = stack
        .orchestrator
        .submit(principal("alice"), "TICKET-101")
        .await;

    let Ok(request_id) = request_id else {
        panic!("submit should succeed even when notification fails");
    };
    assert_eq!(stack.registry.grant_for_request(request_id).await, Ok(None));
}

#[tokio::test]
async fn low_risk_request_is_granted_and_later_revoked() {
    let stack = stack(low_risk(30), FakeNotificationChannel::default(), IntakeMode::Inline);
    let Ok(request_id) = stack
        .orchestrator
        .submit(principal("alice"), "fixing TICKET-101")
        .await
    else {
        panic!("submit should succeed");
    };

    let reply = stack
        .gateway
        .handle_callback(InteractionCallback {
            action_id: Some("approve_request".to_owned()),
            correlation_token: Some(request_id.to_string()),
            actor_identity: Some("bob".to_owned()),
        })
        .await;
    assert!(reply.text.contains("ACCESS GRANTED"));
    assert!(stack.directory.is_member("alice").await);
    let active = stack.registry.grant_for_request(request_id).await.ok().flatten();
    assert_eq!(
        active.and_then(|grant| grant.expires_at()),
        Some(epoch() + TimeDelta::minutes(30))
    );

    let handler: Arc<dyn RevocationHandler> = Arc::new(stack.registry.clone());
    stack.clock.advance(TimeDelta::minutes(29));
    assert!(
        stack
            .registry
            .scheduler()
            .fire_due(handler.clone())
            .await
            .is_empty()
    );
    assert!(stack.directory.is_member("alice").await);

    stack.clock.advance(TimeDelta::minutes(1) + TimeDelta::seconds(1));
    assert_eq!(
        stack.registry.scheduler().fire_due(handler).await.len(),
        1
    );

    assert!(!stack.directory.is_member("alice").await);
    assert_eq!(stack.directory.remove_calls().await, 1);
    let grant = stack.registry.grant_for_request(request_id).await.ok().flatten();
    assert_eq!(grant.map(|grant| grant.state()), Some(GrantState::Revoked));

    let entries = stack.audit.entries().await;
    assert_eq!(
        entries.iter().map(|entry| entry.action).collect::<Vec<_>>(),
        vec![AuditAction::Granted, AuditAction::Revoked]
    );
    assert!(entries[0].timestamp <= entries[1].timestamp);
    assert!(entries.iter().all(|entry| entry.principal.as_str() == "alice"));
}

#[tokio::test]
async fn denied_request_never_touches_directory() {
    let stack = stack(
        OracleBehavior::Answer(RiskAssessment {
            ticket_reference: None,
            risk_level: RiskLevel::High,
            rationale: "no ticket referenced".to_owned(),
            recommended_duration_minutes: Some(15),
        }),
        FakeNotificationChannel::default(),
        IntakeMode::Inline,
    );
    let Ok(request_id) = stack
        .orchestrator
        .submit(principal("bob"), "need prod")
        .await
    else {
        panic!("submit should succeed");
    };

    let reply = stack
        .gateway
        .handle_callback(InteractionCallback {
            action_id: Some("deny_request".to_owned()),
            correlation_token: Some(request_id.to_string()),
            actor_identity: Some("carol".to_owned()),
        })
        .await;

    assert!(reply.text.contains("DENIED BY CAROL"));
    assert_eq!(stack.directory.add_calls().await, 0);
    assert_eq!(stack.registry.scheduler().pending_count().await, 0);
    let entries = stack.audit.entries().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, AuditAction::Denied);
}

#[test]
fn intake_mode_parses_config_values() {
    assert_eq!("inline".parse::<IntakeMode>(), Ok(IntakeMode::Inline));
    assert_eq!(" Background ".parse::<IntakeMode>(), Ok(IntakeMode::Background));
    assert!("queued".parse::<IntakeMode>().is_err());
}
