pub mod common;
mod listing_tests;
mod task_queue_tests;
