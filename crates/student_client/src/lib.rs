//! Client side of the student assignment page: tag filter URL state,
//! per-assignment solved status, aggregate progress and the assignment list,
//! kept consistent through a page-scoped notification bus.

pub mod assignment_list;
pub mod bus;
pub mod config;
pub mod howsolved;
pub mod page;
pub mod progress;
pub mod query_state;
pub mod transport;

pub use assignment_list::{AssignmentListRefresher, AssignmentListView};
pub use bus::{NotificationBus, NotificationEvent, Subscription};
pub use howsolved::{HowSolvedError, HowSolvedView, HowSolvedWidget, UserNotifier};
pub use page::StudentPage;
pub use progress::{AssignmentProgress, ProgressBarTier, ProgressPoller, ProgressView};
pub use query_state::{FilterQuery, FilterTerm, Navigator, TagFilter};
pub use transport::{HttpTransport, StudentTransport, TransportError};

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
