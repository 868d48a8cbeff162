pub mod password;
pub mod phone;
pub mod raffle;
pub mod twiml;

pub use password::*;
pub use phone::*;
pub use raffle::RaffleNumberPolicy;
