pub fn default_timeout_sec() -> u64 {
    60
}

pub fn default_max_memory_kb() -> u64 {
    // ~2GB, matching the solver's historical ceiling
    2_048_000
}

pub fn default_heuristics() -> Vec<String> {
    vec!["lama".to_string()]
}

pub fn default_mixed_heuristics() -> Vec<String> {
    vec![
        "ff2".to_string(),
        "cea2".to_string(),
        "fd-autotune-1".to_string(),
        "fd-autotune-2".to_string(),
    ]
}

pub fn default_poll_interval_ms() -> u64 {
    200
}
