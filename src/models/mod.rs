pub mod job;
pub mod missing_person;
pub mod report;
