mod onboarding;
mod profile;
mod session;
mod user;

pub use onboarding::*;
pub use profile::*;
pub use session::*;
pub use user::*;
