pub mod occurrence;
pub mod row;
pub mod series;
pub mod time;
