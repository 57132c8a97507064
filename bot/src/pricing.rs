use common::env_config::BotConfig;

/// Stars charged per plan tier. The tier is derived from the plan name only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StarsPricing {
    pub basic: u32,
    pub vip: u32,
}

impl StarsPricing {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            basic: config.stars_basic_amount,
            vip: config.stars_vip_amount,
        }
    }

    pub fn amount_for(&self, plan_name: &str) -> u32 {
        if is_vip(plan_name) { self.vip } else { self.basic }
    }
}

pub fn is_vip(plan_name: &str) -> bool {
    plan_name.trim().eq_ignore_ascii_case("vip")
}
