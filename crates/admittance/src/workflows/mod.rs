pub mod admittance;
pub mod sheets;
