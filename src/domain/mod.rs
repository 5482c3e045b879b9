// Domain layer - Plain data types shared by every layer
pub mod dashboard;
pub mod render;
pub mod telemetry;
pub mod variable;
