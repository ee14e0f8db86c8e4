// Gateway file to expose integration tests from the integration/ subdirectory
// Each test file in integration/ needs to be included here

mod common;

#[path = "integration/test_build_and_query.rs"]
mod test_build_and_query;

#[path = "integration/test_build_failures.rs"]
mod test_build_failures;

#[path = "integration/test_corruption.rs"]
mod test_corruption;

#[path = "integration/test_settings.rs"]
mod test_settings;
