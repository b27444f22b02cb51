pub mod broadcast;

pub use broadcast::BroadcastNotificationChannel;
