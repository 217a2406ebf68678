pub mod alert_engine;
pub mod detection;
pub mod fusion;
pub mod history;
pub mod monitor;
pub mod notify;
pub mod oracle;
pub mod registry;
