//! Crate-level unit and behavioural tests for the session loop.

pub(crate) mod support;
mod unit;
