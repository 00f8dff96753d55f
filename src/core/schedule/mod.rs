pub mod cron;
pub mod scheduler_service;
pub mod trigger;
