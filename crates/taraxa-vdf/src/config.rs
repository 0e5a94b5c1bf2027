//! Chain-wide VDF sortition configuration.
//!
//! Field-for-field mirror of the upstream `VdfConfig` struct: the
//! selection threshold and omit threshold bound the VRF ticket that
//! decides whether a VDF is skipped, is "stale", or gets a normal
//! difficulty; `lambda_bound` caps the Wesolowski time parameter.

#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct VdfConfig {
    pub threshold_selection: u16,
    pub threshold_vdf_omit: u16,
    pub difficulty_min: u16,
    pub difficulty_max: u16,
    pub difficulty_stale: u16,
    pub lambda_bound: u16,
}

impl Default for VdfConfig {
    fn default() -> Self {
        Self {
            threshold_selection: u16::MAX / 2,
            threshold_vdf_omit: u16::MAX / 20,
            difficulty_min: 16,
            difficulty_max: 22,
            difficulty_stale: 20,
            lambda_bound: 1500,
        }
    }
}
