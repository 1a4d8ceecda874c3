pub mod dependency_tests;
pub mod version_tests;
