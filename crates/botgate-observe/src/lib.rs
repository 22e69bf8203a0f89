//! Observability setup for botgate: structured logging and optional
//! OpenTelemetry span export.

pub mod tracing_setup;
