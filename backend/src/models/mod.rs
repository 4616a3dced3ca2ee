pub mod company;
pub mod execution;
pub mod notification;
pub mod payment;
pub mod plan;
pub mod subscription;
pub mod system_setting;
pub mod user;
pub mod webhook_log;
