//! Render system integration tests

mod frame_scheduling;
