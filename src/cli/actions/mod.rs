pub mod server;

#[derive(Debug)]
pub enum Action {
    Server {
        port: u16,
        dsn: Option<String>,
        cooldown_seconds: u64,
        min_codes: u8,
        max_codes: u8,
    },
}
