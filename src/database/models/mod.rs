pub mod account;
pub mod audit;
pub mod feature;
pub mod membership;
pub mod organization;
pub mod session;

pub use account::{AdminAccount, UserAccount};
pub use audit::AuditLogEntry;
pub use feature::{FeatureFlag, FeatureLimit, FeatureOverride, PlanFeature};
pub use membership::Membership;
pub use organization::{Organization, PlanTier};
pub use session::SessionRecord;
