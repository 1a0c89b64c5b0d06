pub mod capture;
pub mod chime;
pub mod clip;
