//! Cross-stage tests with in-memory collaborators.
