pub mod config;
pub mod coordinates;
pub mod hifi_time;
pub mod time_utils;
pub mod vector_math;
