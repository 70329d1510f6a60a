pub mod check;
pub use self::check::check;

pub mod forward_auth;
pub use self::forward_auth::forward_auth;

pub mod health;
pub use self::health::health;
