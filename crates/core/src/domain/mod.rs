pub mod booking;
pub mod conversation;
pub mod room;
