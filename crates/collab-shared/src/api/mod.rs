mod auth;
mod invites;
mod workspaces;

pub use auth::*;
pub use invites::*;
pub use workspaces::*;
