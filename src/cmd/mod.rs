pub mod income;
pub mod prices;
pub mod schema;
