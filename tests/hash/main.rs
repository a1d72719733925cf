// Test entry point for hash tests
// All hash-related integration tests organized here

mod output_tests;
mod reference_tests;
mod scan_tests;
