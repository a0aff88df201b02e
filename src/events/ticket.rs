use rand::{distributions::Alphanumeric, Rng};
use time::OffsetDateTime;

/// Random suffix length; at roughly 30 bits of entropy it keeps codes
/// minted within the same millisecond from colliding.
const SUFFIX_LEN: usize = 5;

/// Mints a globally unique ticket code from the current millisecond
/// timestamp and a random alphanumeric suffix.
pub fn mint() -> String {
    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(char::from)
        .collect();
    format!("TICKET-{millis}-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn code_has_expected_shape() {
        let code = mint();
        let parts: Vec<&str> = code.splitn(3, '-').collect();
        assert_eq!(parts[0], "TICKET");
        assert!(parts[1].parse::<i128>().is_ok(), "timestamp part: {code}");
        assert_eq!(parts[2].len(), SUFFIX_LEN);
        assert!(parts[2].chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn rapid_mints_stay_unique() {
        let codes: HashSet<String> = (0..1000).map(|_| mint()).collect();
        assert_eq!(codes.len(), 1000);
    }
}
