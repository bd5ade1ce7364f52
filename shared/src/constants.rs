pub const FILLER_LABEL: &str = "Random Adventure";

pub const MAX_NAME_LENGTH: usize = 60;
pub const MAX_PRICE: u32 = 1_000_000;

pub const INVALID_DATE_ERROR: &str = "Date must be formatted as YYYY-MM-DD";
pub const INVALID_NAME_ERROR: &str = "Name must be between 1 and 60 characters";
pub const INVALID_IMAGE_ERROR: &str = "Image must be a base64 data URL";
pub const NOTHING_TO_SPIN_ERROR: &str = "No shops to spin. Add a shop to the wheel first";

// Morandi palette used by clients for category slices and wheel segments
pub const BREAKFAST_COLOR: &str = "#D5A6A3";
pub const LUNCH_COLOR: &str = "#ABB6A4";
pub const DINNER_COLOR: &str = "#9DA8B5";
pub const SNACKS_COLOR: &str = "#B8A7B5";
