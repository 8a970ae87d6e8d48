//! JSON-lines operation scripts: reading steps, running them and reporting outcomes.

pub mod command_reader;
pub mod outcome_writer;
pub mod runner;
