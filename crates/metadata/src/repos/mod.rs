//! Repository traits for metadata operations.

pub mod agents;
pub mod bootstrap;
pub mod quota;
pub mod reviews;
pub mod skills;
pub mod sync_state;
pub mod tokens;
pub mod users;
pub mod votes;

pub use agents::AgentRepo;
pub use bootstrap::BootstrapRepo;
pub use quota::RateLimitRepo;
pub use reviews::ReviewRepo;
pub use skills::SkillRepo;
pub use sync_state::{BackfillRepo, SyncStateRepo};
pub use tokens::TokenRepo;
pub use users::UserRepo;
pub use votes::VoteRepo;
