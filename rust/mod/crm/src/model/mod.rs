mod business;
mod contact;
mod customer;
mod deal;
mod import;

pub use business::*;
pub use contact::*;
pub use customer::*;
pub use deal::*;
pub use import::*;
