pub mod schema;
pub mod seed;
