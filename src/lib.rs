pub mod assembler;
pub mod catalog;
pub mod configuration;
pub mod mangadex;
pub mod mangadex_client;
pub mod models;
pub mod pages;
pub mod run;
pub mod worker;

pub use configuration::Settings;
pub use models::Cli;
pub use run::run;
