#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use rust_decimal_macros::dec;

use sitecrew::biometric::{ByteSimilarityScorer, MatchPolicy};
use sitecrew::clock::FixedClock;
use sitecrew::model::fingerprint::{Finger, FingerprintDevice, FingerprintTemplate, Hand};
use sitecrew::model::job_type::JobType;
use sitecrew::model::site::ConstructionSite;
use sitecrew::model::worker::{Worker, WorkerStatus};
use sitecrew::service::{AttendanceService, PaymentService, PayrollService};
use sitecrew::store::MemoryStore;

pub const SITE: u64 = 10;
pub const DEVICE: u64 = 4;
pub const MASON: u64 = 3;
pub const TEMPLATE_DATA: &str = "MNT:0412:77a9:13f0:9bc2:5e11";

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<FixedClock>,
    pub attendance: AttendanceService,
    pub payroll: PayrollService,
    pub payment: PaymentService,
}

pub fn jan(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
}

pub fn at(day: u32, h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, h, m, 0).unwrap()
}

pub fn worker(id: u64) -> Worker {
    Worker {
        id,
        employee_id: format!("CW-{id:04}"),
        first_name: "Crew".into(),
        last_name: format!("Member {id}"),
        status: WorkerStatus::Active,
        assigned_site_id: Some(SITE),
        job_type_id: Some(MASON),
    }
}

/// One 08:00-17:00 site with an online terminal, a mason job type at
/// 15000/day, and worker 1 enrolled on the right index finger.
pub fn harness() -> Harness {
    let clock = Arc::new(FixedClock::new(at(15, 8, 0)));
    let store = Arc::new(MemoryStore::with_clock(clock.clone()));
    store.insert_site(ConstructionSite {
        id: SITE,
        name: "Riverside Tower".into(),
        working_hours_start: "08:00".into(),
        working_hours_end: "17:00".into(),
        standard_hours_per_day: dec!(8),
        overtime_rate_multiplier: dec!(1.5),
        is_active: true,
    });
    store.insert_job_type(JobType {
        id: MASON,
        name: "Mason".into(),
        category: "SKILLED".into(),
        base_daily_rate: dec!(15000),
        overtime_multiplier: dec!(1.5),
    });
    store.insert_device(FingerprintDevice {
        id: DEVICE,
        name: "North gate".into(),
        site_id: Some(SITE),
        is_active: true,
        is_online: true,
    });
    store.insert_worker(worker(1));
    store.insert_template(FingerprintTemplate {
        id: 100,
        worker_id: 1,
        finger: Finger::Index,
        hand: Hand::Right,
        template_data: TEMPLATE_DATA.into(),
        quality_score: 85,
        is_active: true,
        created_at: at(1, 0, 0) - Duration::days(30),
    });

    let attendance = AttendanceService::new(
        store.clone(),
        Arc::new(ByteSimilarityScorer),
        clock.clone(),
        MatchPolicy::default(),
    );
    let payroll = PayrollService::new(store.clone(), clock.clone());
    let payment = PaymentService::new(store.clone(), clock.clone());

    Harness {
        store,
        clock,
        attendance,
        payroll,
        payment,
    }
}
