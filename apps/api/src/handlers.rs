pub mod audit;
pub mod grants;
pub mod health;
pub mod slack;
