// Presentation layer - Command line surface and run summary
pub mod cli;
pub mod report;
