// src/db/queries/mod.rs
pub mod approval;
pub mod dashboard;
pub mod outpass;
pub mod student;
