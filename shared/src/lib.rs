pub mod constants;
pub mod meal_record;
pub mod shared_wheel;
pub mod stats;
pub mod validation;
pub mod wheel_prefs;
