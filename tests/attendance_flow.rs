mod common;

use common::*;
use rust_decimal_macros::dec;

use sitecrew::biometric::ScanInput;
use sitecrew::error::{AppError, ErrorKind};
use sitecrew::model::attendance::AttendanceStatus;
use sitecrew::model::fingerprint::MatchResult;
use sitecrew::service::attendance::{CheckAction, FingerprintCheck, ManualCheck};

fn scan(data: &str) -> FingerprintCheck {
    FingerprintCheck {
        worker_id: 1,
        site_id: SITE,
        device_id: DEVICE,
        scan: ScanInput {
            template_data: data.into(),
            quality: 88,
        },
        finger: None,
        hand: None,
    }
}

fn manual(worker_id: u64) -> ManualCheck {
    ManualCheck {
        worker_id,
        site_id: SITE,
        method: None,
        notes: None,
    }
}

#[actix_web::test]
async fn late_arrival_with_overtime_day() {
    let h = harness();

    h.clock.set(at(15, 8, 5));
    let check_in = h.attendance.fingerprint_check(scan(TEMPLATE_DATA)).await.unwrap();
    assert_eq!(check_in.action, CheckAction::CheckIn);
    assert_eq!(check_in.record.status, AttendanceStatus::Present);
    assert_eq!(check_in.record.attendance_date, jan(15));

    h.clock.set(at(15, 17, 10));
    let check_out = h.attendance.fingerprint_check(scan(TEMPLATE_DATA)).await.unwrap();
    assert_eq!(check_out.action, CheckAction::CheckOut);
    assert_eq!(check_out.record.total_hours, dec!(9.08));
    assert_eq!(check_out.record.regular_hours, dec!(8));
    assert_eq!(check_out.record.overtime_hours, dec!(1.08));
    assert_eq!(check_out.record.status, AttendanceStatus::Overtime);
    assert!(check_out.record.fingerprint_verified);

    let logs = h.store.fingerprint_logs();
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().all(|l| l.match_score == 100 && l.template_id == Some(100)));
}

#[actix_web::test]
async fn completed_day_ignores_further_scans() {
    let h = harness();
    h.attendance.fingerprint_check(scan(TEMPLATE_DATA)).await.unwrap();
    h.clock.set(at(15, 16, 30));
    let done = h.attendance.fingerprint_check(scan(TEMPLATE_DATA)).await.unwrap().record;

    for minute in [31, 45, 59] {
        h.clock.set(at(15, 16, minute));
        let again = h.attendance.fingerprint_check(scan(TEMPLATE_DATA)).await.unwrap();
        assert_eq!(again.action, CheckAction::AlreadyCompleted);
        assert_eq!(again.record, done);
    }
    assert_eq!(h.store.attendance_records(), vec![done]);
}

#[actix_web::test]
async fn foreign_finger_is_rejected_and_audited() {
    let h = harness();

    let err = h
        .attendance
        .fingerprint_check(scan("XXXXXXXXXXXXXXXXXXXXXXXXXXXXX"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::FingerprintRejected {
            result: MatchResult::NoMatch,
            ..
        }
    ));
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);

    assert!(h.store.attendance_records().is_empty());
    let logs = h.store.fingerprint_logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].match_result, MatchResult::NoMatch);
}

/// Each loser read the day before the winner's write landed, so it decides
/// on an outdated view and only the store's key or guard stops it.
#[actix_web::test]
async fn check_in_that_lost_the_create_race_is_refused() {
    let h = harness();
    let winner = h.attendance.manual_check_in(manual(1)).await.unwrap();
    assert_eq!(winner.action, CheckAction::CheckIn);

    h.clock.set(at(15, 8, 1));
    h.store.queue_stale_attendance(None);
    let err = h.attendance.manual_check_in(manual(1)).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::AlreadyCheckedIn {
            worker_id: 1,
            site_id: SITE
        }
    ));

    h.store.queue_stale_attendance(None);
    let err = h
        .attendance
        .fingerprint_check(scan(TEMPLATE_DATA))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    assert_eq!(h.store.attendance_records(), vec![winner.record]);
}

#[actix_web::test]
async fn check_out_that_lost_the_guard_race_is_refused() {
    let h = harness();
    let open = h.attendance.manual_check_in(manual(1)).await.unwrap().record;

    h.clock.set(at(15, 17, 0));
    let winner = h.attendance.manual_check_out(manual(1)).await.unwrap();
    assert_eq!(winner.action, CheckAction::CheckOut);
    assert_eq!(winner.record.total_hours, dec!(9));

    h.clock.set(at(15, 17, 30));
    h.store.queue_stale_attendance(Some(open.clone()));
    let err = h.attendance.manual_check_out(manual(1)).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::AlreadyCheckedOut {
            worker_id: 1,
            site_id: SITE
        }
    ));

    h.store.queue_stale_attendance(Some(open));
    let err = h
        .attendance
        .fingerprint_check(scan(TEMPLATE_DATA))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    assert_eq!(h.store.attendance_records(), vec![winner.record]);
}

#[actix_web::test]
async fn workers_are_independent() {
    let h = harness();
    h.store.insert_worker(worker(2));

    h.attendance.manual_check_in(manual(1)).await.unwrap();
    h.attendance.manual_check_in(manual(2)).await.unwrap();

    h.clock.set(at(15, 11, 0));
    let early = h.attendance.manual_check_out(manual(2)).await.unwrap();
    assert_eq!(early.record.status, AttendanceStatus::EarlyDeparture);

    let still_on_shift = h.attendance.manual_check_in(manual(1)).await.unwrap_err();
    assert!(matches!(still_on_shift, AppError::AlreadyCheckedIn { worker_id: 1, .. }));
}
