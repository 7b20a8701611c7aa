use chrono::Utc;
use rand::Rng;

/// Kind of human-readable identifier handed out during provisioning.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdKind {
    Patient,
    Employee,
    Doctor,
}

impl IdKind {
    pub fn prefix(self) -> &'static str {
        match self {
            IdKind::Patient => "PAT",
            IdKind::Employee => "EMP",
            IdKind::Doctor => "DOC",
        }
    }
}

/// Source of profile and doctor identifiers. Uniqueness is finally enforced by
/// the database; a colliding value fails the surrounding transaction.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self, kind: IdKind) -> String;
}

/// `<prefix><epoch millis><4 hex digits>`, e.g. `PAT1718000000000A3F9`.
pub struct TimestampIdGenerator;

impl IdGenerator for TimestampIdGenerator {
    fn next_id(&self, kind: IdKind) -> String {
        let millis = Utc::now().timestamp_millis();
        let suffix: u16 = rand::thread_rng().gen();
        format!("{}{}{:04X}", kind.prefix(), millis, suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn identifiers_carry_their_prefix() {
        let ids = TimestampIdGenerator;
        assert!(ids.next_id(IdKind::Patient).starts_with("PAT"));
        assert!(ids.next_id(IdKind::Employee).starts_with("EMP"));
        assert!(ids.next_id(IdKind::Doctor).starts_with("DOC"));
    }

    #[test]
    fn identifiers_in_the_same_millisecond_rarely_collide() {
        let ids = TimestampIdGenerator;
        let generated: HashSet<String> = (0..50).map(|_| ids.next_id(IdKind::Patient)).collect();
        assert!(generated.len() > 40);
    }
}
