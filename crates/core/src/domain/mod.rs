pub mod call;
pub mod credential;
pub mod menu;
pub mod order;
pub mod restaurant;
