//! Calendar sync engine behaviour under provider failures.

mod common;

use common::{CALENDAR_ID, CalendarCall, TestContext, agenda_input, at};
use fems::actions::create_agenda;
use rusqlite::params;
use fems::error::Error;
use fems::store::Store;
use fems::sync::MAX_MESSAGE_CHARS;
use fems::types::{Agenda, SyncLogStatus, SyncOperation, SyncStatus};

async fn synced_agenda(ctx: &TestContext, title: &str) -> Agenda {
    let room = ctx.add_room(&format!("{title} Room"));
    create_agenda(
        &ctx.state,
        ctx.session(),
        agenda_input(title, &room, at(10, 0), at(11, 0)),
    )
    .await
    .into_result()
    .unwrap()
}

fn log_entries(ctx: &TestContext, agenda_id: &str) -> Vec<(SyncOperation, SyncLogStatus)> {
    ctx.store
        .list_sync_logs(agenda_id)
        .unwrap()
        .into_iter()
        .map(|l| (l.operation, l.status))
        .collect()
}

#[tokio::test]
async fn test_create_sends_event_to_configured_calendar() {
    let ctx = TestContext::new();
    let agenda = synced_agenda(&ctx, "Senate Meeting").await;

    assert_eq!(agenda.sync_status, SyncStatus::Synced);
    assert!(agenda.last_sync_attempt.is_some());

    match &ctx.calendar.calls()[0] {
        CalendarCall::Insert { calendar_id, event } => {
            assert_eq!(calendar_id, CALENDAR_ID);
            assert_eq!(event.summary, "Senate Meeting");
            assert_eq!(event.color_id, "5");
            assert_eq!(event.start.time_zone, "Asia/Jakarta");
            assert_eq!(event.start.date_time, "2026-03-02T17:00:00+07:00");
            assert_eq!(event.extended_properties.private.agenda_id, agenda.id);
        }
        other => panic!("expected insert, got {other:?}"),
    }

    assert_eq!(
        log_entries(&ctx, &agenda.id),
        vec![(SyncOperation::Create, SyncLogStatus::Success)]
    );
}

#[tokio::test]
async fn test_update_recreates_vanished_event() {
    let ctx = TestContext::new();
    let agenda = synced_agenda(&ctx, "Senate Meeting").await;
    assert_eq!(agenda.google_event_id.as_deref(), Some("evt-1"));

    ctx.calendar.fail_next(404, "Not Found");
    let details = ctx.store.get_agenda_details(&agenda.id).unwrap().unwrap();
    let event_id = ctx.state.calendar.update(&details).await.unwrap();
    assert_eq!(event_id, "evt-2");

    let stored = ctx.store.get_agenda(&agenda.id).unwrap().unwrap();
    assert_eq!(stored.google_event_id.as_deref(), Some("evt-2"));
    assert_eq!(stored.sync_status, SyncStatus::Synced);

    let entries = log_entries(&ctx, &agenda.id);
    assert!(entries.contains(&(SyncOperation::Update, SyncLogStatus::NotFound)));
    assert_eq!(
        entries.last(),
        Some(&(SyncOperation::Create, SyncLogStatus::Success))
    );
}

#[tokio::test]
async fn test_update_without_event_redirects_to_create() {
    let ctx = TestContext::new();
    ctx.calendar.fail_next(400, "Invalid attendee");
    let agenda = synced_agenda(&ctx, "Senate Meeting").await;
    assert_eq!(agenda.sync_status, SyncStatus::Failed);

    let details = ctx.store.get_agenda_details(&agenda.id).unwrap().unwrap();
    ctx.state.calendar.update(&details).await.unwrap();

    let entries = log_entries(&ctx, &agenda.id);
    assert!(entries.contains(&(SyncOperation::Update, SyncLogStatus::RedirectedToCreate)));
    let stored = ctx.store.get_agenda(&agenda.id).unwrap().unwrap();
    assert_eq!(stored.sync_status, SyncStatus::Synced);
    assert_eq!(stored.sync_error, None);
}

#[tokio::test]
async fn test_rate_limit_is_retried_then_recorded_truncated() {
    let ctx = TestContext::new();
    let agenda = synced_agenda(&ctx, "Senate Meeting").await;

    let message = "Rate Limit Exceeded ".repeat(20);
    for _ in 0..3 {
        ctx.calendar.fail_next(429, &message);
    }

    let details = ctx.store.get_agenda_details(&agenda.id).unwrap().unwrap();
    let err = ctx.state.calendar.update(&details).await.unwrap_err();
    match err {
        Error::CalendarSync(e) => {
            assert_eq!(e.operation, SyncOperation::Update);
            assert_eq!(e.status, Some(429));
        }
        other => panic!("unexpected error: {other}"),
    }

    // One insert, then the first attempt and two retries.
    assert_eq!(ctx.calendar.calls().len(), 4);

    let stored = ctx.store.get_agenda(&agenda.id).unwrap().unwrap();
    assert_eq!(stored.sync_status, SyncStatus::RateLimited);
    let sync_error = stored.sync_error.unwrap();
    assert_eq!(sync_error.chars().count(), MAX_MESSAGE_CHARS);

    let logs = ctx.store.list_sync_logs(&agenda.id).unwrap();
    let failed = logs.last().unwrap();
    assert_eq!(failed.status, SyncLogStatus::Failed);
    assert!(failed.message.as_ref().unwrap().chars().count() <= MAX_MESSAGE_CHARS);
}

#[tokio::test]
async fn test_forbidden_is_auth_error_without_retry() {
    let ctx = TestContext::new();
    let agenda = synced_agenda(&ctx, "Senate Meeting").await;

    ctx.calendar.fail_next(403, "Insufficient Permission");
    let details = ctx.store.get_agenda_details(&agenda.id).unwrap().unwrap();
    assert!(ctx.state.calendar.update(&details).await.is_err());

    assert_eq!(ctx.calendar.calls().len(), 2);
    let stored = ctx.store.get_agenda(&agenda.id).unwrap().unwrap();
    assert_eq!(stored.sync_status, SyncStatus::AuthError);
    assert_eq!(stored.sync_error.as_deref(), Some("Insufficient Permission"));
}

#[tokio::test]
async fn test_server_error_recovers_within_retries() {
    let ctx = TestContext::new();
    let room = ctx.add_room("Boardroom");

    ctx.calendar.fail_next(503, "Backend Error");
    let agenda = create_agenda(
        &ctx.state,
        ctx.session(),
        agenda_input("Senate Meeting", &room, at(10, 0), at(11, 0)),
    )
    .await
    .into_result()
    .unwrap();

    assert_eq!(agenda.sync_status, SyncStatus::Synced);
    assert_eq!(ctx.calendar.inserts(), 2);
}

#[tokio::test]
async fn test_delete_without_event_is_skipped() {
    let ctx = TestContext::new();
    let mut agenda = synced_agenda(&ctx, "Senate Meeting").await;
    agenda.google_event_id = None;
    agenda.sync_status = SyncStatus::Deleted;

    ctx.state.calendar.delete(&agenda).await.unwrap();

    assert_eq!(ctx.calendar.deletes(), 0);
    assert_eq!(
        log_entries(&ctx, &agenda.id).last(),
        Some(&(SyncOperation::Delete, SyncLogStatus::Skipped))
    );
}

#[tokio::test]
async fn test_delete_of_vanished_event_counts_as_deleted() {
    let ctx = TestContext::new();
    let agenda = synced_agenda(&ctx, "Senate Meeting").await;

    ctx.calendar.fail_next(404, "Not Found");
    ctx.state.calendar.delete(&agenda).await.unwrap();

    let stored = ctx.store.get_agenda(&agenda.id).unwrap().unwrap();
    assert_eq!(stored.sync_status, SyncStatus::Deleted);
    assert_eq!(stored.google_event_id, None);
    assert_eq!(
        log_entries(&ctx, &agenda.id).last(),
        Some(&(SyncOperation::Delete, SyncLogStatus::NotFound))
    );
}

#[tokio::test]
async fn test_missing_calendar_setting_fails_sync() {
    let ctx = TestContext::unconfigured();
    let agenda = synced_agenda(&ctx, "Senate Meeting").await;

    assert!(ctx.calendar.calls().is_empty());
    assert_eq!(agenda.sync_status, SyncStatus::Failed);
    assert_eq!(
        agenda.sync_error.as_deref(),
        Some("invalid configuration: No Google Calendar configured")
    );
}

#[tokio::test]
async fn test_retry_sweep_resyncs_failed_agendas() {
    let ctx = TestContext::new();

    ctx.calendar.fail_next(400, "Bad Request");
    let failed = synced_agenda(&ctx, "Senate Meeting").await;
    assert_eq!(failed.sync_status, SyncStatus::Failed);

    let doomed = synced_agenda(&ctx, "Budget Review").await;
    ctx.calendar.fail_next(400, "Bad Request");
    assert!(ctx.state.calendar.delete(&doomed).await.is_err());

    let healthy = synced_agenda(&ctx, "Curriculum Review").await;

    let retried = ctx.state.calendar.retry_sync_failures(10).await.unwrap();
    assert_eq!(retried, 2);

    let failed = ctx.store.get_agenda(&failed.id).unwrap().unwrap();
    assert_eq!(failed.sync_status, SyncStatus::Synced);
    assert!(failed.google_event_id.is_some());

    let doomed = ctx.store.get_agenda(&doomed.id).unwrap().unwrap();
    assert_eq!(doomed.sync_status, SyncStatus::Deleted);

    let healthy = ctx.store.get_agenda(&healthy.id).unwrap().unwrap();
    assert_eq!(healthy.sync_status, SyncStatus::Synced);
    assert_eq!(
        log_entries(&ctx, &healthy.id),
        vec![(SyncOperation::Create, SyncLogStatus::Success)]
    );
}

#[tokio::test]
async fn test_retry_sweep_logs_failures() {
    let ctx = TestContext::new();

    ctx.calendar.fail_next(400, "Bad Request");
    let agenda = synced_agenda(&ctx, "Senate Meeting").await;

    ctx.calendar.fail_next(400, "Still Bad");
    let retried = ctx.state.calendar.retry_sync_failures(10).await.unwrap();
    assert_eq!(retried, 0);

    assert_eq!(
        log_entries(&ctx, &agenda.id).last(),
        Some(&(SyncOperation::Retry, SyncLogStatus::Failed))
    );
}

#[tokio::test]
async fn test_failed_recreate_is_reported_as_update_recreate() {
    let ctx = TestContext::new();
    let agenda = synced_agenda(&ctx, "Senate Meeting").await;

    ctx.calendar.fail_next(404, "Not Found");
    for _ in 0..3 {
        ctx.calendar.fail_next(500, "Backend Error");
    }

    let details = ctx.store.get_agenda_details(&agenda.id).unwrap().unwrap();
    let err = ctx.state.calendar.update(&details).await.unwrap_err();
    match err {
        Error::CalendarSync(e) => {
            assert_eq!(e.operation, SyncOperation::UpdateRecreate);
            assert_eq!(e.agenda_id, agenda.id);
            assert_eq!(e.status, Some(500));
        }
        other => panic!("unexpected error: {other}"),
    }

    let entries = log_entries(&ctx, &agenda.id);
    assert_eq!(
        entries[entries.len() - 3..],
        [
            (SyncOperation::Update, SyncLogStatus::NotFound),
            (SyncOperation::Create, SyncLogStatus::Failed),
            (SyncOperation::UpdateRecreate, SyncLogStatus::Failed),
        ]
    );

    let stored = ctx.store.get_agenda(&agenda.id).unwrap().unwrap();
    assert_eq!(stored.google_event_id, None);
    assert_eq!(stored.sync_status, SyncStatus::Failed);
}

#[tokio::test]
async fn test_retry_sweep_survives_unreadable_agenda() {
    let ctx = TestContext::new();
    let ani = ctx.lecturer("Ani");

    let room = ctx.add_room("Boardroom");
    let mut input = agenda_input("Thesis Defense", &room, at(8, 0), at(9, 0));
    input.access_all_dosen = false;
    input.access_dosen = Some(vec![ani.id.clone()]);
    ctx.calendar.fail_next(403, "Insufficient Permission");
    let broken = create_agenda(&ctx.state, ctx.session(), input)
        .await
        .into_result()
        .unwrap();

    ctx.calendar.fail_next(403, "Insufficient Permission");
    let healthy = synced_agenda(&ctx, "Senate Meeting").await;
    assert_eq!(healthy.sync_status, SyncStatus::AuthError);

    // A grantee row the store cannot decode makes the first agenda unreadable.
    ctx.raw_connection()
        .execute(
            "UPDATE users SET role = 'GUEST' WHERE id = ?1",
            params![ani.id],
        )
        .unwrap();

    let retried = ctx.state.calendar.retry_sync_failures(10).await.unwrap();
    assert_eq!(retried, 1);

    assert_eq!(
        log_entries(&ctx, &broken.id).last(),
        Some(&(SyncOperation::Retry, SyncLogStatus::Failed))
    );
    let healthy = ctx.store.get_agenda(&healthy.id).unwrap().unwrap();
    assert_eq!(healthy.sync_status, SyncStatus::Synced);
}
