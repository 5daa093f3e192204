pub mod plugin_tests;
pub mod session_tests;
