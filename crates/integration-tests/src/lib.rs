//! End-to-end tests for the conversation engine live under `tests/`.
