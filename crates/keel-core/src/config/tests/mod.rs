pub mod parameters_tests;
