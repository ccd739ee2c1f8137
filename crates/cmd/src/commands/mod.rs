pub mod check;
pub mod explore;
pub mod fetch;
pub mod init;
pub mod peek;

pub use check::{CheckArgs, check_command};
pub use explore::{ExploreArgs, explore_command};
pub use fetch::{FetchArgs, fetch_command};
pub use init::init_command;
pub use peek::{PeekArgs, peek_command};
