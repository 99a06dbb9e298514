pub mod analytics;
pub mod conversation;
pub mod escalation;
pub mod intent;
pub mod knowledge;
pub mod order;
pub mod outbound;
pub mod product;
pub mod vision;
