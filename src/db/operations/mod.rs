pub mod mastery;
pub mod objects;
pub mod theta;
pub mod usage;

pub use mastery::{fetch_mastery, fetch_mastery_for_learner, upsert_mastery, MasteryPatch};
pub use objects::{
    attach_object_to_goal, fetch_collocations, fetch_object, fetch_objects_for_goal,
    insert_collocation, insert_object,
};
pub use theta::{fetch_theta_profile, upsert_theta_profile};
pub use usage::{load_usage_space, load_usage_spaces_for_learner, save_usage_space};
