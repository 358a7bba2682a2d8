pub mod buddy;
pub mod friends;
pub mod profiles;
pub mod session_browse;
pub mod sessions;
pub mod users;

pub use buddy::{BuddyCandidate, BuddyMarker, BuddyTabCounts};
pub use friends::{FriendRequestRow, FriendRequestStatus, FriendshipRow};
pub use profiles::{ProfileRole, ProfileRow};
pub use session_browse::{SessionBrowseRow, SessionMarker};
pub use sessions::{SessionRequestRow, SessionRequestStatus, TutoringSessionRow};
pub use users::UsersRow;
