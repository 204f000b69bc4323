// Wire and storage models shared by the wizard, the session and the backend client.

pub mod requests;
pub mod responses;

pub use requests::{DatabaseCredentials, NewUser, OwnerUser, SqlFile};
pub use responses::{Role, User};
