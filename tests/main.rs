/*!
 * Main test entry point for the cineglot test suite
 */

// Import common test utilities
pub mod common;

// Import integration tests
mod integration {
    // End-to-end translation pipeline tests
    pub mod pipeline_tests;

    // Cache tiering and in-flight deduplication tests
    pub mod cache_tests;
}
