mod invite;
mod user;
mod workspace;

pub use invite::*;
pub use user::*;
pub use workspace::*;
