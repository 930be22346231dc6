pub mod cache;
pub mod dataset;
pub mod fit_service;
pub mod fitting;
pub mod irradiance;
pub mod pv_system;
pub mod solar_position;
pub mod weather_service;
