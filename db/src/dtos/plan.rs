pub struct PlanCreateRequest {
    pub bot_id: i64,
    pub name: String,
    pub price_cents: i64,
    pub interval: String,
}
