// Storage and API constants (no magic values)

/// Key of the fallback blob (JSON object: shift id -> shift)
pub const FALLBACK_SHIFTS_KEY: &str = "shift_swap_mvp_v2";

/// Key of the cached worker identity
pub const IDENTITY_KEY: &str = "shift_swap_my_id";
