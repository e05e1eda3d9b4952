/// Ticks in one Minecraft day as the plugin reports them.
pub const DAY_LENGTH_TICKS: i64 = 23000;
pub const NIGHTFALL_TICKS: i64 = 13000;

pub fn day_phase(server_time: i64) -> &'static str {
  if server_time.rem_euclid(DAY_LENGTH_TICKS) >= NIGHTFALL_TICKS {
    "Night"
  } else {
    "Day"
  }
}

/// Drops the section sign the game uses for color codes.
pub fn strip_formatting(motd: &str) -> String {
  motd.replace('\u{00A7}', "")
}
