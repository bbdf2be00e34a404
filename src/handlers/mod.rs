pub mod group_invite;
pub mod meal_analysis;

pub use group_invite::{GroupInviteHandler, GroupInviteRequest, InviteError};
pub use meal_analysis::{AnalysisError, AnalyzeMealRequest, MealAnalysisHandler};
