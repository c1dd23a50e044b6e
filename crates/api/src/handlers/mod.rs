pub mod callback;
pub mod dispatch;
pub mod health;
