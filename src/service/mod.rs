pub mod attendance;
pub mod payment;
pub mod payroll;
pub mod transition;

pub use attendance::AttendanceService;
pub use payment::PaymentService;
pub use payroll::PayrollService;
