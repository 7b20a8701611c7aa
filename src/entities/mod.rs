pub mod appointments;
pub mod departments;
pub mod employees;
pub mod enums;
pub mod medical_records;
pub mod notices;
pub mod patients;
pub mod payroll;
pub mod prescriptions;
pub mod users;
