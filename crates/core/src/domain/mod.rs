pub mod holdings;
pub mod portfolio;
