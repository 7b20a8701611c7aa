pub mod employees;
pub mod patients;
pub mod users;
