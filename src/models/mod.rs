pub mod fit;
pub mod profile;
pub mod report;
pub mod series;
pub mod weather;
