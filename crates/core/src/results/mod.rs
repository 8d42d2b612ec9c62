pub mod aggregator;
pub mod result_table;
pub mod schema;
