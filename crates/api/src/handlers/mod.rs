pub mod videos;
pub mod webhooks;
