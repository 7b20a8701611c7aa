pub mod appointments;
pub mod auth;
pub mod config;
pub mod departments;
pub mod employees;
pub mod ids;
pub mod medical_records;
pub mod notices;
pub mod password;
pub mod patients;
pub mod payroll;
pub mod prescriptions;
pub mod provisioning;
pub mod query;
pub mod reports;
pub mod scope;
pub mod session;
