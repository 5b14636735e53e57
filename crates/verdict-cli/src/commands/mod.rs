pub mod analyze;
pub mod check_module;
pub mod check_report;
pub mod correct;
pub mod dispatch;
pub mod select;
pub mod shared;
