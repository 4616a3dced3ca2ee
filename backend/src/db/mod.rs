pub mod company_repository;
pub mod execution_repository;
pub mod notification_repository;
pub mod payment_repository;
pub mod plan_repository;
pub mod postgres_company_repository;
pub mod postgres_execution_repository;
pub mod postgres_notification_repository;
pub mod postgres_payment_repository;
pub mod postgres_plan_repository;
pub mod postgres_processed_event_repository;
pub mod postgres_settings_repository;
pub mod postgres_subscription_repository;
pub mod postgres_user_repository;
pub mod postgres_webhook_log_repository;
pub mod processed_event_repository;
pub mod settings_repository;
pub mod subscription_repository;
pub mod user_repository;
pub mod webhook_log_repository;

#[cfg(test)]
pub mod mock_db;
