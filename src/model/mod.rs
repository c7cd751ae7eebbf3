pub mod attendance;
pub mod fingerprint;
pub mod job_type;
pub mod payroll;
pub mod role;
pub mod site;
pub mod worker;
