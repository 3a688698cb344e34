//! Unit tests - single components exercised through the public API, no store involved

mod model_definition_tests;
mod read_query_tests;
