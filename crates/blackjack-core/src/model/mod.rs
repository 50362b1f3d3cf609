pub mod action;
pub mod card;
pub mod hand;
pub mod payout;
pub mod player;
pub mod rank;
pub mod round;
pub mod settlement;
pub mod shoe;
