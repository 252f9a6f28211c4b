//! Notification service: a read-only projection of confirmed purchases, fed
//! by the core service over the notification channel.

pub mod app;
pub mod projection;
